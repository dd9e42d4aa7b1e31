//! Accelerometer backends.

pub mod iio;
