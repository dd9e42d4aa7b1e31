//! Virtual `SW_TABLET_MODE` switch created through uinput.

use std::io;

use evdev::{
    AttributeSet, BusType, EventType, InputEvent, InputId, SwitchCode, uinput::VirtualDevice,
};
use log::{debug, info};

use crate::error::{Error, Result};

/// uinput device names are 80 bytes including the terminating NUL.
const MAX_NAME_LEN: usize = 79;

/// Identity the virtual device announces to userspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchIdentity {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for SwitchIdentity {
    fn default() -> Self {
        Self {
            name: "Accelerometer Tablet Mode Virtual Switch".into(),
            vendor: 0x1234,
            product: 0x5678,
            version: 1,
        }
    }
}

impl SwitchIdentity {
    /// The name cut to what uinput accepts, on a character boundary.
    fn device_name(&self) -> &str {
        let mut end = self.name.len().min(MAX_NAME_LEN);
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        &self.name[..end]
    }

    fn input_id(&self) -> InputId {
        InputId::new(BusType::BUS_USB, self.vendor, self.product, self.version)
    }
}

/// Sink for tablet-mode transitions.
#[cfg_attr(test, mockall::automock)]
pub trait TabletSwitch {
    /// Reports the new tablet-mode state to userspace.
    fn set_tablet_mode(&mut self, enabled: bool) -> Result<()>;

    /// Removes the device. Safe to call more than once.
    fn destroy(&mut self);
}

/// Anything that accepts a batch of input events and terminates it with a
/// synchronization report.
pub trait EventSink {
    fn emit(&mut self, events: &[InputEvent]) -> io::Result<()>;
}

impl EventSink for VirtualDevice {
    fn emit(&mut self, events: &[InputEvent]) -> io::Result<()> {
        VirtualDevice::emit(self, events)
    }
}

/// uinput device exposing a single tablet-mode switch.
pub struct VirtualSwitch<D: EventSink = VirtualDevice> {
    device: Option<D>,
}

impl VirtualSwitch {
    /// Opens uinput and registers the switch under `identity`.
    ///
    /// A handle that fails half-way through configuration is closed on return.
    pub fn create(identity: &SwitchIdentity) -> Result<Self> {
        let mut switches = AttributeSet::<SwitchCode>::new();
        switches.insert(SwitchCode::SW_TABLET_MODE);

        let device = VirtualDevice::builder()
            .map_err(Error::setup("open uinput"))?
            .name(identity.device_name())
            .input_id(identity.input_id())
            .with_switches(&switches)
            .map_err(Error::setup("enable SW_TABLET_MODE events"))?
            .build()
            .map_err(Error::setup("create the virtual device"))?;

        info!("Created virtual switch '{}'", identity.device_name());
        Ok(Self::with_sink(device))
    }
}

impl<D: EventSink> VirtualSwitch<D> {
    pub fn with_sink(device: D) -> Self {
        Self {
            device: Some(device),
        }
    }
}

impl<D: EventSink> TabletSwitch for VirtualSwitch<D> {
    fn set_tablet_mode(&mut self, enabled: bool) -> Result<()> {
        let device = self.device.as_mut().ok_or_else(|| Error::SwitchEmitFailure {
            what: "tablet mode event",
            reason: "device destroyed".into(),
        })?;
        let event = InputEvent::new(
            EventType::SWITCH.0,
            SwitchCode::SW_TABLET_MODE.0,
            enabled as i32,
        );
        device
            .emit(&[event])
            .map_err(|e| Error::SwitchEmitFailure {
                what: "tablet mode event",
                reason: e.to_string(),
            })?;
        info!("Tablet mode {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    fn destroy(&mut self) {
        // Closing the uinput handle destroys the kernel device.
        if self.device.take().is_some() {
            debug!("Destroyed virtual switch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};

    /// Records every emitted batch, or fails every write.
    #[derive(Default)]
    struct RecordingSink {
        batches: Rc<RefCell<Vec<Vec<(u16, u16, i32)>>>>,
        broken: bool,
    }

    impl EventSink for RecordingSink {
        fn emit(&mut self, events: &[InputEvent]) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.batches.borrow_mut().push(
                events
                    .iter()
                    .map(|e| (e.event_type().0, e.code(), e.value()))
                    .collect(),
            );
            Ok(())
        }
    }

    #[test]
    fn mode_change_is_one_switch_event_per_batch() {
        let sink = RecordingSink::default();
        let batches = sink.batches.clone();
        let mut switch = VirtualSwitch::with_sink(sink);

        switch.set_tablet_mode(true).unwrap();
        switch.set_tablet_mode(false).unwrap();

        let tablet = (EventType::SWITCH.0, SwitchCode::SW_TABLET_MODE.0);
        assert_eq!(
            *batches.borrow(),
            vec![vec![(tablet.0, tablet.1, 1)], vec![(tablet.0, tablet.1, 0)]]
        );
    }

    #[test]
    fn failed_write_is_an_emit_failure() {
        let mut switch = VirtualSwitch::with_sink(RecordingSink {
            broken: true,
            ..RecordingSink::default()
        });
        assert!(matches!(
            switch.set_tablet_mode(true),
            Err(Error::SwitchEmitFailure { .. })
        ));
    }

    #[test]
    fn destroyed_switch_rejects_events() {
        let sink = RecordingSink::default();
        let batches = sink.batches.clone();
        let mut switch = VirtualSwitch::with_sink(sink);
        switch.destroy();
        switch.destroy();

        assert!(matches!(
            switch.set_tablet_mode(true),
            Err(Error::SwitchEmitFailure { .. })
        ));
        assert!(batches.borrow().is_empty());
        assert_eq!(Rc::strong_count(&batches), 1, "sink was not released");
    }

    #[test]
    fn identity_name_fits_uinput() {
        let identity = SwitchIdentity::default();
        assert_eq!(identity.device_name(), "Accelerometer Tablet Mode Virtual Switch");

        let long = SwitchIdentity {
            name: "x".repeat(200),
            ..SwitchIdentity::default()
        };
        assert_eq!(long.device_name().len(), MAX_NAME_LEN);

        // 78 ASCII bytes then a two-byte character straddling the limit.
        let wide = SwitchIdentity {
            name: format!("{}é", "x".repeat(78)),
            ..SwitchIdentity::default()
        };
        assert_eq!(wide.device_name().len(), 78);
    }

    #[test]
    fn identity_is_announced_on_usb() {
        let id = SwitchIdentity::default().input_id();
        assert_eq!(id.bus_type(), BusType::BUS_USB);
        assert_eq!((id.vendor(), id.product(), id.version()), (0x1234, 0x5678, 1));
    }
}
