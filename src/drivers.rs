//! Supported chassis profiles.

pub mod minibook_8;
pub mod minibook_x;

use crate::{
    accel_sensors::iio::{IioAccel, Platform},
    error::Result,
    laptop_device::{AccelPair, DeviceProfile},
};

pub use minibook_8::MiniBook8;
pub use minibook_x::MiniBookX;

/// Closed set of chassis families this daemon knows how to drive.
#[derive(Debug, Clone)]
pub enum Profile {
    MiniBookX(MiniBookX),
    MiniBook8(MiniBook8),
}

/// Registry scanned in order at startup; the first match wins.
pub static PROFILES: [Profile; 2] = [
    Profile::MiniBookX(MiniBookX::new()),
    Profile::MiniBook8(MiniBook8::new()),
];

impl DeviceProfile for Profile {
    type Device = AccelPair<IioAccel>;

    fn name(&self) -> &'static str {
        match self {
            Profile::MiniBookX(p) => p.name(),
            Profile::MiniBook8(p) => p.name(),
        }
    }

    fn identify(&self, chassis: &str) -> bool {
        match self {
            Profile::MiniBookX(p) => p.identify(chassis),
            Profile::MiniBook8(p) => p.identify(chassis),
        }
    }

    fn create(&self, platform: &Platform) -> Result<Self::Device> {
        match self {
            Profile::MiniBookX(p) => p.create(platform),
            Profile::MiniBook8(p) => p.create(platform),
        }
    }
}
