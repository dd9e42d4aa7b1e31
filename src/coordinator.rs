//! Control loop tying the lid switch, the accelerometers and the virtual
//! tablet-mode switch together.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    accel_sensors::iio::{IioAccel, Platform},
    app_context::{AppState, Phase},
    config::Config,
    drivers::PROFILES,
    error::Result,
    input::{
        lid::{LidSource, LidSwitch, PollOutcome},
        uinput::{TabletSwitch, VirtualSwitch},
    },
    laptop_device::{AccelPair, DeviceProfile, LaptopDevice, select_profile},
    orientation,
};

/// The loop wired to real hardware.
pub type HardwareLoop = ControlLoop<LidSwitch, VirtualSwitch, AccelPair<IioAccel>>;

/// Owns every hardware handle for the lifetime of the daemon.
///
/// Handles are released exactly once by [`ControlLoop::shutdown`], whether
/// the loop stopped on cancellation or on an error.
pub struct ControlLoop<L, S, D>
where
    L: LidSource,
    S: TabletSwitch,
    D: LaptopDevice,
{
    lid: L,
    switch: S,
    device: D,
    state: AppState,
    poll_timeout: Duration,
    phase: Phase,
}

impl HardwareLoop {
    /// Acquires the virtual switch, the lid switch and the laptop device from
    /// `config`. See [`ControlLoop::initialize_with`].
    pub fn initialize(config: &Config) -> Result<Self> {
        Self::initialize_with(
            config,
            || VirtualSwitch::create(&config.switch_identity()),
            || {
                let lid = LidSwitch::open_named(&config.input_dir, &config.lid_device)?;
                info!("Using lid switch {}", lid.path().display());
                Ok(lid)
            },
            || open_device(&config.platform()),
        )
    }
}

fn open_device(platform: &Platform) -> Result<AccelPair<IioAccel>> {
    let chassis = platform.identify_chassis()?;
    select_profile(&PROFILES, &chassis)?.create(platform)
}

fn initial_state<L: LidSource>(lid: &L) -> AppState {
    match lid.is_closed() {
        Ok(closed) => {
            info!("Lid is initially {}", if closed { "closed" } else { "open" });
            AppState::with_lid_closed(closed)
        }
        Err(e) => {
            warn!("Cannot query the lid state, assuming open: {e}");
            AppState::default()
        }
    }
}

impl<L, S, D> ControlLoop<L, S, D>
where
    L: LidSource,
    S: TabletSwitch,
    D: LaptopDevice,
{
    /// Acquires the virtual switch, the lid switch and the laptop device, in
    /// that order.
    ///
    /// On failure whatever was already acquired is released in reverse order
    /// and nothing after the failing step is opened.
    pub fn initialize_with<FS, FL, FD>(
        config: &Config,
        open_switch: FS,
        open_lid: FL,
        open_device: FD,
    ) -> Result<Self>
    where
        FS: FnOnce() -> Result<S>,
        FL: FnOnce() -> Result<L>,
        FD: FnOnce() -> Result<D>,
    {
        info!("Control loop {}", Phase::Initializing);
        let mut switch = open_switch()?;

        let mut lid = match open_lid() {
            Ok(lid) => lid,
            Err(e) => {
                switch.destroy();
                return Err(e);
            }
        };

        let device = match open_device() {
            Ok(device) => device,
            Err(e) => {
                lid.close();
                switch.destroy();
                return Err(e);
            }
        };

        let state = if config.query_initial_lid_state {
            initial_state(&lid)
        } else {
            AppState::default()
        };

        Ok(Self::new(lid, switch, device, state, config.poll_timeout()))
    }

    pub fn new(lid: L, switch: S, device: D, state: AppState, poll_timeout: Duration) -> Self {
        Self {
            lid,
            switch,
            device,
            state,
            poll_timeout,
            phase: Phase::Initializing,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs until `cancel` fires or an I/O error occurs, then shuts down.
    ///
    /// Cancellation is checked between iterations, so it takes effect within
    /// one poll timeout.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.phase = Phase::Running;
        info!("Control loop {}", self.phase);

        let result = self.run_until_cancelled(cancel);
        match &result {
            Ok(()) => info!("Control loop cancelled"),
            Err(e) => error!("Control loop stopped: {e}"),
        }

        self.shutdown();
        result
    }

    fn run_until_cancelled(&mut self, cancel: &CancellationToken) -> Result<()> {
        while !cancel.is_cancelled() {
            self.step()?;
        }
        Ok(())
    }

    /// One iteration: wait for lid events, then sample and decide unless the
    /// lid is closed.
    pub fn step(&mut self) -> Result<()> {
        match self.lid.poll(self.poll_timeout)? {
            PollOutcome::Events {
                lid_closed: Some(closed),
            } => self.state.lid_closed = closed,
            PollOutcome::Interrupted => debug!("Lid wait interrupted"),
            PollOutcome::Events { lid_closed: None } | PollOutcome::Timeout => {}
        }

        if self.state.lid_closed {
            if self.state.tablet_mode {
                info!("Lid closed, leaving tablet mode");
                self.set_tablet_mode(false)?;
            }
            return Ok(());
        }

        let screen = self.device.read_screen()?;
        let base = self.device.read_base()?;
        let eval = orientation::evaluate(self.state.tablet_mode, &screen, &base);
        debug!(
            "screen ({:.2}, {:.2}, {:.2}) base ({:.2}, {:.2}, {:.2})",
            screen.x, screen.y, screen.z, base.x, base.y, base.z
        );
        debug!(
            "screen {:.1}° base {:.1}° hinge {:.1}° tablet mode {}",
            eval.screen_angle,
            eval.base_angle,
            eval.hinge_angle,
            eval.transition.unwrap_or(self.state.tablet_mode)
        );

        if let Some(enabled) = eval.transition {
            self.set_tablet_mode(enabled)?;
        }
        Ok(())
    }

    fn set_tablet_mode(&mut self, enabled: bool) -> Result<()> {
        self.switch.set_tablet_mode(enabled)?;
        self.state.tablet_mode = enabled;
        Ok(())
    }

    /// Destroys the virtual switch, closes the lid and destroys the device.
    pub fn shutdown(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }
        self.phase = Phase::ShuttingDown;
        info!("Control loop {}", self.phase);

        self.switch.destroy();
        self.lid.close();
        self.device.destroy();

        self.phase = Phase::Terminated;
        info!("Control loop {}", self.phase);
    }
}
