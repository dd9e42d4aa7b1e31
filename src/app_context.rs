//! State threaded through the control loop.

use std::fmt;

/// Lifecycle phase of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initializing => "initializing",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting down",
            Phase::Terminated => "terminated",
        })
    }
}

/// What the daemon currently believes about the hardware.
///
/// `tablet_mode` mirrors the last value emitted on the virtual switch; the
/// lid starts out open unless the kernel was asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppState {
    pub tablet_mode: bool,
    pub lid_closed: bool,
}

impl AppState {
    pub fn with_lid_closed(lid_closed: bool) -> Self {
        Self {
            tablet_mode: false,
            lid_closed,
        }
    }
}
