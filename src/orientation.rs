//! Tablet-mode decision from the two accelerometers.
//!
//! Each accelerometer yields a tilt angle in its X-Z plane; the difference
//! between base and screen angles approximates the hinge opening. Entering and
//! leaving tablet mode use separate angular bands so the decision does not
//! flap around the clamshell (~180°) and folded (~0°/360°) positions.

use crate::sensors::AccelSample;

/// Below this X or Z magnitude the screen is too close to vertical to trust.
pub const MIN_SIGNAL: f64 = 3.0;

/// Tilt of one accelerometer in the X-Z plane, in degrees within `(-180, 180]`.
///
/// A zero vector (`x = z = 0`) yields `0.0`.
pub fn xz_angle(sample: &AccelSample) -> f64 {
    let angle = -sample.x.atan2(sample.z).to_degrees();
    // `+ 0.0` turns -0.0 into 0.0.
    if angle <= -180.0 { angle + 360.0 } else { angle + 0.0 }
}

/// Hinge angle from the two tilt angles, unwrapping the case where the base
/// has wrapped past -180° relative to the screen.
pub fn hinge_angle(screen_angle: f64, base_angle: f64) -> f64 {
    let diff = base_angle - screen_angle;
    if diff < 0.0 && base_angle < 0.0 && screen_angle > 0.0 {
        diff + 360.0
    } else {
        diff
    }
}

/// Whether the screen reading is strong enough to act on.
pub fn has_signal(screen: &AccelSample) -> bool {
    screen.x.abs() > MIN_SIGNAL || screen.z.abs() > MIN_SIGNAL
}

/// Applies the hysteresis bands to a hinge angle.
///
/// Returns the new tablet-mode state when it changes, `None` otherwise.
pub fn transition(tablet_mode: bool, angle: f64) -> Option<bool> {
    // Two adjoining entry bands: folded past ~300°, or nearly closed backwards.
    let enter = (angle > 0.0 && 360.0 - angle < 60.0) || (angle < 10.0 && angle > -60.0);
    let exit = angle > 10.0 && angle < 180.0;

    match tablet_mode {
        false if enter => Some(true),
        true if exit => Some(false),
        _ => None,
    }
}

/// Everything computed for one pair of readings, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub screen_angle: f64,
    pub base_angle: f64,
    pub hinge_angle: f64,
    /// New tablet-mode state, if it changes.
    pub transition: Option<bool>,
}

/// Runs the whole decision for one pair of readings.
pub fn evaluate(tablet_mode: bool, screen: &AccelSample, base: &AccelSample) -> Evaluation {
    let screen_angle = xz_angle(screen);
    let base_angle = xz_angle(base);
    let hinge = hinge_angle(screen_angle, base_angle);
    Evaluation {
        screen_angle,
        base_angle,
        hinge_angle: hinge,
        transition: if has_signal(screen) {
            transition(tablet_mode, hinge)
        } else {
            None
        },
    }
}
