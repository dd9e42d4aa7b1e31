//! Industrial I/O accelerometers exposed through sysfs.
//!
//! Each accelerometer lives under `bus/iio/devices/iio:device<N>` and exposes
//! `in_accel_scale` plus one `in_accel_<axis>_raw` attribute per axis. The
//! attribute files are kept open and rewound after every read.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::PathBuf,
    thread,
    time::Duration,
};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    sensors::{AccelSample, AccelSource, Axis},
};

/// IIO index of the accelerometer in the screen half.
pub const SCREEN_ACCEL: u8 = 0;
/// IIO index of the accelerometer in the keyboard half.
pub const BASE_ACCEL: u8 = 1;

const DMI_PRODUCT_NAME: &str = "devices/virtual/dmi/id/product_name";

/// Sysfs view of the machine: where the attributes live and how long the
/// kernel needs to bind a freshly requested driver.
#[derive(Debug, Clone)]
pub struct Platform {
    root: PathBuf,
    settle_delay: Duration,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("/sys", Duration::from_secs(1))
    }
}

impl Platform {
    pub fn new(root: impl Into<PathBuf>, settle_delay: Duration) -> Self {
        Self {
            root: root.into(),
            settle_delay,
        }
    }

    pub fn iio_device_path(&self, device: u8) -> PathBuf {
        self.root
            .join("bus/iio/devices")
            .join(format!("iio:device{device}"))
    }

    fn scale_path(&self, device: u8) -> PathBuf {
        self.iio_device_path(device).join("in_accel_scale")
    }

    fn axis_path(&self, device: u8, axis: Axis) -> PathBuf {
        self.iio_device_path(device)
            .join(format!("in_accel_{axis}_raw"))
    }

    pub fn chassis_path(&self) -> PathBuf {
        self.root.join(DMI_PRODUCT_NAME)
    }

    pub fn is_available(&self, device: u8) -> bool {
        fs::metadata(self.iio_device_path(device)).is_ok()
    }

    /// Reads the DMI product name, without the trailing newline.
    pub fn identify_chassis(&self) -> Result<String> {
        let path = self.chassis_path();
        let content = fs::read_to_string(&path).map_err(|e| Error::ChassisUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        match content.lines().next() {
            Some(line) if !line.is_empty() => Ok(line.to_string()),
            _ => Err(Error::ChassisUnreadable {
                path,
                reason: "empty product name".into(),
            }),
        }
    }

    pub fn read_scale(&self, device: u8) -> Result<f64> {
        let path = self.scale_path(device);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DeviceUnavailable(device),
            _ => Error::ReadFailure {
                path: path.clone(),
                reason: e.to_string(),
            },
        })?;
        text.trim().parse::<f64>().map_err(|e| Error::ReadFailure {
            path,
            reason: format!("invalid scale '{}': {e}", text.trim()),
        })
    }

    /// Number of the I2C adapter the given IIO device hangs off.
    pub fn i2c_port(&self, device: u8) -> Result<u8> {
        let link = fs::read_link(self.iio_device_path(device)).map_err(|e| {
            Error::EnableFailure {
                device,
                reason: format!("cannot resolve iio:device{device}: {e}"),
            }
        })?;
        parse_i2c_port(&link.to_string_lossy()).ok_or_else(|| Error::EnableFailure {
            device,
            reason: format!("no i2c adapter in {}", link.display()),
        })
    }

    /// Asks the I2C core to instantiate `driver` at `address` on `bus`.
    pub fn instantiate_i2c_device(&self, bus: u8, driver: &str, address: u16) -> Result<()> {
        let path = self
            .root
            .join("bus/i2c/devices")
            .join(format!("i2c-{bus}"))
            .join("new_device");
        info!("Requesting {driver} at {address:#04x} on i2c-{bus}");
        OpenOptions::new()
            .write(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{driver} {address:#04x}"))
            .map_err(|e| Error::EnableFailure {
                device: BASE_ACCEL,
                reason: format!("cannot write {}: {e}", path.display()),
            })
    }

    /// Gives the kernel time to bind a driver after a topology change.
    pub fn settle(&self) {
        debug!("Waiting {:?} for the kernel to bind the driver", self.settle_delay);
        thread::sleep(self.settle_delay);
    }
}

/// Extracts `N` from the first `/i2c-N` component of a sysfs device path.
fn parse_i2c_port(link: &str) -> Option<u8> {
    let (_, rest) = link.split_once("/i2c-")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).take(3).collect();
    digits.parse().ok()
}

/// Scale-corrected accelerometer channel backed by IIO sysfs attributes.
#[derive(Debug)]
pub struct IioAccel {
    device: u8,
    scale: f64,
    axes: Option<[File; 3]>,
}

impl IioAccel {
    /// Reads the scale first, then opens the x, y and z attributes in order.
    pub fn open(platform: &Platform, device: u8) -> Result<Self> {
        let scale = platform.read_scale(device)?;
        let open_axis = |axis: Axis| {
            File::open(platform.axis_path(device, axis)).map_err(|source| {
                Error::AxisOpenFailure {
                    device,
                    axis,
                    source,
                }
            })
        };
        // Already opened axes are dropped (closed) when a later one fails.
        let x = open_axis(Axis::X)?;
        let y = open_axis(Axis::Y)?;
        let z = open_axis(Axis::Z)?;

        debug!("Opened iio:device{device} with scale {scale}");
        Ok(Self {
            device,
            scale,
            axes: Some([x, y, z]),
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn read_axis(&self, file: &mut File, axis: Axis) -> Result<f64> {
        let fail = |reason: String| Error::AxisReadFailure {
            device: self.device,
            axis,
            reason,
        };
        let mut buf = [0u8; 32];
        let n = file.read(&mut buf).map_err(|e| fail(e.to_string()))?;
        if n == 0 {
            return Err(fail("got 0 bytes".into()));
        }
        file.seek(SeekFrom::Start(0))
            .map_err(|e| fail(format!("rewind: {e}")))?;

        let text = String::from_utf8_lossy(&buf[..n]);
        text.trim()
            .parse::<f64>()
            .map_err(|e| fail(format!("invalid value '{}': {e}", text.trim())))
    }
}

impl AccelSource for IioAccel {
    fn read(&mut self) -> Result<AccelSample> {
        let mut axes = self
            .axes
            .take()
            .ok_or(Error::DeviceUnavailable(self.device))?;
        let [x, y, z] = &mut axes;
        let raw = self.read_axis(x, Axis::X).and_then(|vx| {
            let vy = self.read_axis(y, Axis::Y)?;
            let vz = self.read_axis(z, Axis::Z)?;
            Ok(AccelSample::new(vx, vy, vz))
        });
        self.axes = Some(axes);
        raw.map(|s| s.scaled(self.scale))
    }

    fn close(&mut self) {
        if self.axes.take().is_some() {
            debug!("Closed iio:device{}", self.device);
        }
    }
}
