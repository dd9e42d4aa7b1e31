use std::process::Command;

use log::{debug, info, warn};

use crate::{
    accel_sensors::iio::{BASE_ACCEL, IioAccel, Platform, SCREEN_ACCEL},
    error::{Error, Result},
    laptop_device::{AccelPair, DeviceProfile},
};

/// Chuwi MiniBook 8.
///
/// Both BMC150 accelerometers are normally registered at boot. When the base
/// one is missing, reloading the I2C driver module usually brings it back.
#[derive(Debug, Clone)]
pub struct MiniBook8 {
    module: &'static str,
}

impl Default for MiniBook8 {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniBook8 {
    pub const fn new() -> Self {
        Self {
            module: "bmc150_accel_i2c",
        }
    }

    fn modprobe(&self, args: &[&str]) -> Result<bool> {
        Command::new("modprobe")
            .args(args)
            .arg(self.module)
            .status()
            .map(|status| status.success())
            .map_err(|e| Error::EnableFailure {
                device: BASE_ACCEL,
                reason: format!("cannot run modprobe {}: {e}", args.join(" ")),
            })
    }

    fn enable_base(&self, platform: &Platform) -> Result<()> {
        info!("Enabling the base accelerometer by reloading {}", self.module);
        if !self.modprobe(&["-r"])? {
            warn!("Unloading {} failed, loading it anyway", self.module);
        }
        if !self.modprobe(&[])? {
            return Err(Error::EnableFailure {
                device: BASE_ACCEL,
                reason: format!("cannot load {}", self.module),
            });
        }
        platform.settle();

        if !platform.is_available(BASE_ACCEL) {
            return Err(Error::EnableFailure {
                device: BASE_ACCEL,
                reason: format!("still absent after reloading {}", self.module),
            });
        }
        Ok(())
    }
}

impl DeviceProfile for MiniBook8 {
    type Device = AccelPair<IioAccel>;

    fn name(&self) -> &'static str {
        "MiniBook 8"
    }

    fn identify(&self, chassis: &str) -> bool {
        chassis == "MiniBook"
    }

    fn create(&self, platform: &Platform) -> Result<Self::Device> {
        debug!("Creating the {} device", self.name());
        if !platform.is_available(SCREEN_ACCEL) {
            return Err(Error::DeviceUnavailable(SCREEN_ACCEL));
        }
        if !platform.is_available(BASE_ACCEL) {
            self.enable_base(platform)?;
        }
        debug!("Base accelerometer is enabled");
        AccelPair::open_with(|device| IioAccel::open(platform, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{accel_sensors::iio::tests::fake_iio, laptop_device::LaptopDevice};
    use pretty_assertions::assert_eq;
    use std::{fs, time::Duration};
    use tempfile::TempDir;

    #[test]
    fn identifies_exact_name_only() {
        let profile = MiniBook8::new();
        assert!(profile.identify("MiniBook"));
        assert!(!profile.identify("MiniBook X"));
        assert!(!profile.identify("MiniBook 8"));
    }

    #[test]
    fn opens_both_preinstalled_accelerometers() {
        let tmp = TempDir::new().unwrap();
        fake_iio(tmp.path(), 0, "0.5", ["2", "4", "6"]);
        fake_iio(tmp.path(), 1, "0.25", ["4", "8", "12"]);
        let platform = Platform::new(tmp.path(), Duration::ZERO);

        let mut device = MiniBook8::new().create(&platform).unwrap();
        assert_eq!(device.read_screen().unwrap().y, 2.0);
        assert_eq!(device.read_base().unwrap().y, 2.0);
        device.destroy();
    }

    #[test]
    fn broken_base_channel_fails_creation() {
        let tmp = TempDir::new().unwrap();
        fake_iio(tmp.path(), 0, "1", ["1", "1", "1"]);
        fake_iio(tmp.path(), 1, "1", ["1", "1", "1"]);
        fs::remove_file(tmp.path().join("bus/iio/devices/iio:device1/in_accel_y_raw")).unwrap();
        let platform = Platform::new(tmp.path(), Duration::ZERO);

        let err = MiniBook8::new().create(&platform).unwrap_err();
        assert!(matches!(err, Error::AxisOpenFailure { device: 1, .. }));
    }
}
