//! Application entry point and builder pattern implementation.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use tokio::{
    signal::unix::{SignalKind, signal},
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, ConfigManager},
    coordinator::HardwareLoop,
};

/// Extra time granted to the control loop after cancellation, on top of one
/// poll timeout and one settle delay.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Main application structure.
///
/// Runs the blocking control loop on a dedicated thread and turns SIGINT and
/// SIGTERM into a cooperative cancellation.
///
/// # Example
///
/// ```no_run
/// use accel_tablet_moded::application::Application;
/// use accel_tablet_moded::config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = config::ConfigManager::load(None).await?;
/// let mut app = Application::builder()
///     .with_config_manager(config_manager)
///     .build()?;
///
/// app.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    config_manager: ConfigManager,
    cancel: CancellationToken,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Token that stops the daemon when cancelled, in addition to signals.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the daemon until a signal arrives or the control loop fails.
    pub async fn run(&mut self) -> Result<()> {
        let config = self.config_manager.get().clone();
        let grace = config.poll_timeout() + config.settle_delay() + SHUTDOWN_GRACE;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        let mut handle = spawn_control_loop(config, self.cancel.clone());

        tokio::select! {
            joined = &mut handle => return flatten(joined),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received SIGINT, initiating graceful shutdown..."),
                Err(e) => warn!("Failed to listen for SIGINT: {e}, shutting down"),
            },
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
            _ = self.cancel.cancelled() => info!("Cancellation requested"),
        }

        self.cancel.cancel();
        match tokio::time::timeout(grace, handle).await {
            Ok(joined) => flatten(joined),
            Err(_) => Err(anyhow!("Control loop did not stop within {grace:?}")),
        }
    }
}

fn spawn_control_loop(config: Config, cancel: CancellationToken) -> JoinHandle<Result<()>> {
    tokio::task::spawn_blocking(move || {
        let mut control = HardwareLoop::initialize(&config).context("Initialization failed")?;
        info!("Initialization complete");
        control.run(&cancel).context("Control loop failed")
    })
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.context("Control loop task panicked")?
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config_manager: Option<ConfigManager>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config_manager: None,
        }
    }

    /// Sets the configuration manager for the application.
    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    /// Builds the Application, with built-in defaults if no configuration
    /// was given.
    pub fn build(self) -> Result<Application> {
        let config_manager = self.config_manager.unwrap_or_default();
        config_manager
            .get()
            .validate()
            .context("Invalid configuration")?;

        Ok(Application {
            config_manager,
            cancel: CancellationToken::new(),
        })
    }
}
