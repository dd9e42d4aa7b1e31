//! Laptop device abstraction and profile selection.

use log::{debug, info};

use crate::{
    accel_sensors::iio::{BASE_ACCEL, Platform, SCREEN_ACCEL},
    error::{Error, Result},
    sensors::{AccelSample, AccelSource},
};

/// Uniform access to the two accelerometers of a convertible.
///
/// A device is only reachable after its profile's `create` succeeded and must
/// not be read after `destroy`.
#[cfg_attr(test, mockall::automock)]
pub trait LaptopDevice {
    /// Reads the accelerometer in the screen half.
    fn read_screen(&mut self) -> Result<AccelSample>;

    /// Reads the accelerometer in the keyboard half.
    fn read_base(&mut self) -> Result<AccelSample>;

    /// Releases both accelerometers.
    fn destroy(&mut self);
}

/// Per-model strategy for locating and enabling the accelerometers.
///
/// # Example
///
/// ```no_run
/// use accel_tablet_moded::accel_sensors::iio::Platform;
/// use accel_tablet_moded::drivers::PROFILES;
/// use accel_tablet_moded::laptop_device::{select_profile, DeviceProfile, LaptopDevice};
///
/// let platform = Platform::default();
/// let chassis = platform.identify_chassis()?;
/// let mut device = select_profile(&PROFILES, &chassis)?.create(&platform)?;
/// let screen = device.read_screen()?;
/// println!("screen: {screen:?}");
/// device.destroy();
/// # Ok::<(), accel_tablet_moded::error::Error>(())
/// ```
pub trait DeviceProfile {
    type Device: LaptopDevice;

    /// Human-readable model name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the DMI product name belongs to this model.
    fn identify(&self, chassis: &str) -> bool;

    /// Enables whatever is dormant and opens both accelerometers.
    fn create(&self, platform: &Platform) -> Result<Self::Device>;
}

/// Returns the first profile of `registry` that claims `chassis`.
///
/// Order matters: matchers are not guaranteed to be mutually exclusive.
pub fn select_profile<'a, P: DeviceProfile>(registry: &'a [P], chassis: &str) -> Result<&'a P> {
    registry
        .iter()
        .inspect(|p| debug!("Checking if the device is a {}", p.name()))
        .find(|p| p.identify(chassis))
        .inspect(|p| info!("Laptop model '{chassis}' matched profile {}", p.name()))
        .ok_or_else(|| Error::UnsupportedModel(chassis.to_string()))
}

/// Screen and base accelerometer pair, the device every profile produces.
#[derive(Debug)]
pub struct AccelPair<S: AccelSource> {
    screen: S,
    base: S,
    destroyed: bool,
}

impl<S: AccelSource> AccelPair<S> {
    /// Opens the screen channel, then the base channel.
    ///
    /// When the base channel fails the screen channel is closed before the
    /// error is returned.
    pub fn open_with<F>(mut open: F) -> Result<Self>
    where
        F: FnMut(u8) -> Result<S>,
    {
        let mut screen = open(SCREEN_ACCEL)?;
        let base = match open(BASE_ACCEL) {
            Ok(base) => base,
            Err(e) => {
                screen.close();
                return Err(e);
            }
        };
        Ok(Self {
            screen,
            base,
            destroyed: false,
        })
    }
}

impl<S: AccelSource> LaptopDevice for AccelPair<S> {
    fn read_screen(&mut self) -> Result<AccelSample> {
        self.screen.read()
    }

    fn read_base(&mut self) -> Result<AccelSample> {
        self.base.read()
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.screen.close();
        self.base.close();
        self.destroyed = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::Cell, rc::Rc};

    /// Accelerometer that counts how often it was closed.
    #[derive(Debug)]
    pub(crate) struct CountingAccel {
        sample: AccelSample,
        closes: Rc<Cell<usize>>,
    }

    impl AccelSource for CountingAccel {
        fn read(&mut self) -> Result<AccelSample> {
            Ok(self.sample)
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    /// Profile that records whether `create` ran.
    #[derive(Debug)]
    struct MockProfile {
        name: &'static str,
        model: &'static str,
        created: Cell<usize>,
    }

    impl MockProfile {
        fn new(name: &'static str, model: &'static str) -> Self {
            Self {
                name,
                model,
                created: Cell::new(0),
            }
        }
    }

    impl DeviceProfile for MockProfile {
        type Device = MockLaptopDevice;

        fn name(&self) -> &'static str {
            self.name
        }

        fn identify(&self, chassis: &str) -> bool {
            chassis == self.model
        }

        fn create(&self, _platform: &Platform) -> Result<Self::Device> {
            self.created.set(self.created.get() + 1);
            Ok(MockLaptopDevice::new())
        }
    }

    #[test]
    fn selects_first_matching_profile_only() {
        let registry = [
            MockProfile::new("first", "Alpha"),
            MockProfile::new("second", "Beta"),
        ];

        let profile = select_profile(&registry, "Beta").unwrap();
        assert_eq!(profile.name(), "second");
        profile.create(&Platform::default()).unwrap();

        assert_eq!(registry[0].created.get(), 0);
        assert_eq!(registry[1].created.get(), 1);
    }

    #[test]
    fn earlier_profile_wins_on_overlap() {
        let registry = [
            MockProfile::new("generic", "Gamma"),
            MockProfile::new("specific", "Gamma"),
        ];
        assert_eq!(select_profile(&registry, "Gamma").unwrap().name(), "generic");
    }

    #[test]
    fn unknown_model_is_unsupported() {
        let registry = [MockProfile::new("first", "Alpha")];
        let err = select_profile(&registry, "Omega").unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(ref m) if m == "Omega"));
    }

    #[test]
    fn failed_base_open_closes_screen() {
        let closes = Rc::new(Cell::new(0));
        let mut opened = 0;

        let result = AccelPair::open_with(|device| {
            opened += 1;
            if device == BASE_ACCEL {
                return Err(Error::DeviceUnavailable(device));
            }
            Ok(CountingAccel {
                sample: AccelSample::default(),
                closes: closes.clone(),
            })
        });

        assert!(matches!(result, Err(Error::DeviceUnavailable(BASE_ACCEL))));
        assert_eq!(opened, 2);
        assert_eq!(closes.get(), 1);
        assert_eq!(Rc::strong_count(&closes), 1, "a channel handle leaked");
    }

    #[test]
    fn failed_screen_open_opens_nothing_else() {
        let mut opened = 0;
        let result = AccelPair::<CountingAccel>::open_with(|device| {
            opened += 1;
            Err(Error::DeviceUnavailable(device))
        });
        assert!(matches!(result, Err(Error::DeviceUnavailable(SCREEN_ACCEL))));
        assert_eq!(opened, 1);
    }

    #[test]
    fn pair_routes_reads_and_destroys_once() {
        let closes = Rc::new(Cell::new(0));
        let mut pair = AccelPair::open_with(|device| {
            Ok(CountingAccel {
                sample: AccelSample::new(device as f64, 0.0, 0.0),
                closes: closes.clone(),
            })
        })
        .unwrap();

        assert_eq!(pair.read_screen().unwrap().x, 0.0);
        assert_eq!(pair.read_base().unwrap().x, 1.0);

        pair.destroy();
        pair.destroy();
        assert_eq!(closes.get(), 2);
    }
}
