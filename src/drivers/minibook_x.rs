use log::{debug, info};

use crate::{
    accel_sensors::iio::{BASE_ACCEL, IioAccel, Platform, SCREEN_ACCEL},
    error::{Error, Result},
    laptop_device::{AccelPair, DeviceProfile},
};

/// Chuwi MiniBook X.
///
/// Firmware leaves the base accelerometer (an MXC4005 at 0x15) unregistered.
/// It sits on the I2C adapter one below the screen accelerometer's, so it is
/// instantiated by hand through that adapter's `new_device` file.
#[derive(Debug, Clone)]
pub struct MiniBookX {
    driver: &'static str,
    address: u16,
    bus_offset: u8,
}

impl Default for MiniBookX {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniBookX {
    pub const fn new() -> Self {
        Self {
            driver: "mxc4005",
            address: 0x15,
            bus_offset: 1,
        }
    }

    fn enable_base(&self, platform: &Platform) -> Result<()> {
        info!("Enabling the base accelerometer");
        let bus = platform.i2c_port(SCREEN_ACCEL)?.saturating_sub(self.bus_offset);
        platform.instantiate_i2c_device(bus, self.driver, self.address)?;
        platform.settle();

        if !platform.is_available(BASE_ACCEL) {
            return Err(Error::EnableFailure {
                device: BASE_ACCEL,
                reason: format!("{} did not appear on i2c-{bus}", self.driver),
            });
        }
        Ok(())
    }
}

impl DeviceProfile for MiniBookX {
    type Device = AccelPair<IioAccel>;

    fn name(&self) -> &'static str {
        "MiniBook X"
    }

    fn identify(&self, chassis: &str) -> bool {
        chassis.starts_with("MiniBook X")
    }

    fn create(&self, platform: &Platform) -> Result<Self::Device> {
        debug!("Creating the {} device", self.name());
        if !platform.is_available(SCREEN_ACCEL) {
            return Err(Error::DeviceUnavailable(SCREEN_ACCEL));
        }
        if !platform.is_available(BASE_ACCEL) {
            self.enable_base(platform)?;
        }
        AccelPair::open_with(|device| IioAccel::open(platform, device))
    }
}
