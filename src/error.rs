//! Error types shared by the hardware-facing modules.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::sensors::Axis;

/// Errors raised while talking to accelerometers, input devices and uinput.
///
/// Every variant is fatal to the control loop; the only non-error outcome of
/// a failed wait is an interrupted poll, which is modelled by
/// [`PollOutcome::Interrupted`](crate::input::lid::PollOutcome::Interrupted).
#[derive(Debug, Error)]
pub enum Error {
    #[error("accelerometer iio:device{0} is not available")]
    DeviceUnavailable(u8),

    #[error("cannot read {}: {reason}", path.display())]
    ReadFailure { path: PathBuf, reason: String },

    #[error("cannot open {axis} axis of iio:device{device}: {source}")]
    AxisOpenFailure {
        device: u8,
        axis: Axis,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {axis} axis of iio:device{device}: {reason}")]
    AxisReadFailure {
        device: u8,
        axis: Axis,
        reason: String,
    },

    #[error("cannot enable the base accelerometer iio:device{device}: {reason}")]
    EnableFailure { device: u8, reason: String },

    #[error("cannot read chassis identity from {}: {reason}", path.display())]
    ChassisUnreadable { path: PathBuf, reason: String },

    #[error("unsupported laptop model: {0}")]
    UnsupportedModel(String),

    #[error("cannot find input device '{0}'")]
    DeviceNotFound(String),

    #[error("virtual switch setup failed ({step}): {source}")]
    SwitchSetupFailure {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot write switch {what}: {reason}")]
    SwitchEmitFailure { what: &'static str, reason: String },

    #[error("lid {0}")]
    PollFailure(String),
}

impl Error {
    pub(crate) fn setup(step: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::SwitchSetupFailure { step, source }
    }
}

/// Result alias for the hardware layer.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_name_the_failing_piece() {
        let err = Error::AxisReadFailure {
            device: 1,
            axis: Axis::Z,
            reason: "got 0 bytes".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot read z axis of iio:device1: got 0 bytes"
        );

        let err = Error::UnsupportedModel("ThinkPad".into());
        assert_eq!(err.to_string(), "unsupported laptop model: ThinkPad");
    }

    #[test]
    fn setup_errors_keep_the_step_and_cause() {
        let cause = io::Error::from(io::ErrorKind::PermissionDenied);
        let err = Error::setup("open uinput")(cause);
        let msg = err.to_string();
        assert!(msg.starts_with("virtual switch setup failed (open uinput)"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
