//! # accel_tablet_moded
//!
//! A Linux daemon for convertible laptops that lack a hardware tablet-mode
//! switch. It compares the screen and base accelerometers, derives the hinge
//! angle and reports `SW_TABLET_MODE` through a virtual uinput device.
//!
//! ## Features
//!
//! - **Hysteresis**: separate enter and exit bands around the folding points
//! - **Lid Awareness**: tablet mode is forced off while the lid is closed
//! - **Per-Model Profiles**: dormant base accelerometers are enabled at startup
//! - **Graceful Shutdown**: SIGINT and SIGTERM release every handle exactly once
//!
//! ## Architecture
//!
//! - [`ControlLoop`](coordinator::ControlLoop) - Blocking lid/accelerometer loop
//! - [`DeviceProfile`](laptop_device::DeviceProfile) - Per-model accelerometer setup
//! - [`orientation`] - Pure tablet-mode decision
//! - [`Application`](application::Application) - Signal handling around the loop
//!
//! ## Example
//!
//! ```no_run
//! use accel_tablet_moded::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod accel_sensors;
pub mod app_context;
pub mod application;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod drivers;
pub mod error;
pub mod input;
pub mod laptop_device;
pub mod orientation;
pub mod sensors;
