//! Lid switch reader.

use std::{
    io,
    os::fd::{AsFd, BorrowedFd},
    path::{Path, PathBuf},
    time::Duration,
};

use evdev::{Device, EventType, InputEvent, SwitchCode};
use log::debug;
use nix::{
    errno::Errno,
    poll::{PollFd, PollFlags, poll},
};

use super::find_input_device;
use crate::error::{Error, Result};

/// Result of one bounded wait on the lid device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived before the timeout.
    Timeout,
    /// A signal interrupted the wait; not an error.
    Interrupted,
    /// At least one event was drained. `lid_closed` is the last lid state
    /// reported, if any lid event was among them.
    Events { lid_closed: Option<bool> },
}

/// Source of lid open/close transitions.
#[cfg_attr(test, mockall::automock)]
pub trait LidSource {
    /// Waits up to `timeout` and drains every event that is ready.
    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome>;

    /// Asks the kernel for the current lid state instead of waiting for an event.
    fn is_closed(&self) -> Result<bool>;

    /// Releases the device. Further polls fail.
    fn close(&mut self);
}

/// Read-only handle on the kernel's lid switch evdev node.
pub struct LidSwitch {
    device: Option<Device>,
    path: PathBuf,
}

impl LidSwitch {
    /// Looks `name` up under `input_dir` and opens it.
    pub fn open_named(input_dir: &Path, name: &str) -> Result<Self> {
        let path = find_input_device(input_dir, name)?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let device = Device::open(path)
            .map_err(|e| Error::DeviceNotFound(format!("{} ({e})", path.display())))?;
        debug!("Opened lid switch {}", path.display());
        Ok(Self {
            device: Some(device),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed_device() -> Error {
    Error::PollFailure("device is closed".into())
}

/// What a single bounded wait observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Timeout,
    Interrupted,
}

fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> Result<Readiness> {
    let millis = u16::try_from(timeout.as_millis()).map_err(|_| {
        Error::PollFailure(format!("timeout of {timeout:?} exceeds {} ms", u16::MAX))
    })?;
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, millis) {
        Ok(0) => return Ok(Readiness::Timeout),
        Ok(_) => {}
        Err(Errno::EINTR) => return Ok(Readiness::Interrupted),
        Err(e) => return Err(Error::PollFailure(format!("poll error: {e}"))),
    }

    let revents = fds[0].revents().unwrap_or(PollFlags::empty());
    if !revents.contains(PollFlags::POLLIN) {
        return Err(Error::PollFailure(format!("device hung up ({revents:?})")));
    }
    Ok(Readiness::Ready)
}

fn is_lid(event: &InputEvent) -> bool {
    event.event_type() == EventType::SWITCH && event.code() == SwitchCode::SW_LID.0
}

/// Last lid state reported in `events`: `Some(true)` for closed.
fn lid_state<I>(events: I) -> Option<bool>
where
    I: IntoIterator<Item = InputEvent>,
{
    events
        .into_iter()
        .filter(is_lid)
        .map(|event| event.value() == 1)
        .inspect(|closed| debug!("Lid {}", if *closed { "closed" } else { "opened" }))
        .last()
}

impl LidSource for LidSwitch {
    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome> {
        let device = self.device.as_mut().ok_or_else(closed_device)?;
        let mut wait = timeout;
        let mut drained = false;
        let mut interrupted = false;
        let mut lid_closed = None;

        loop {
            match wait_readable(device.as_fd(), wait)? {
                Readiness::Timeout => break,
                Readiness::Interrupted => {
                    interrupted = true;
                    break;
                }
                Readiness::Ready => {}
            }
            let batch: Vec<InputEvent> = match device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    interrupted = true;
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(Error::PollFailure(format!("read error: {e}"))),
            };
            if batch.is_empty() {
                break;
            }
            drained = true;
            if let Some(closed) = lid_state(batch) {
                lid_closed = Some(closed);
            }
            // Only the first wait blocks; the rest just drain the queue.
            wait = Duration::ZERO;
        }

        Ok(if drained {
            PollOutcome::Events { lid_closed }
        } else if interrupted {
            PollOutcome::Interrupted
        } else {
            PollOutcome::Timeout
        })
    }

    fn is_closed(&self) -> Result<bool> {
        let device = self.device.as_ref().ok_or_else(closed_device)?;
        device
            .get_switch_state()
            .map(|switches| switches.contains(SwitchCode::SW_LID))
            .map_err(|e| Error::PollFailure(format!("state query error: {e}")))
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("Closed lid switch {}", self.path.display());
        }
    }
}
