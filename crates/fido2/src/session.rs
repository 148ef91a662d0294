use tracing::debug;

use crate::types::{Capabilities, DeviceAttributes, DeviceRecord, Pin};

/// The selected device and what is known about it
///
/// Owned by whoever selected the device and passed by reference into every
/// operation. The PIN lives only as long as this value and is wiped with
/// it; a refresh or another selection ends the session.
#[derive(Debug)]
pub struct SessionState {
    device: DeviceRecord,
    pin: Option<Pin>,
    attributes: DeviceAttributes,
}

impl SessionState {
    pub fn new(device: DeviceRecord, pin: Option<Pin>) -> Self {
        debug!("Session started for {}", device.handle);
        Self {
            device,
            pin,
            attributes: DeviceAttributes::new(),
        }
    }

    pub const fn device(&self) -> &DeviceRecord {
        &self.device
    }

    pub fn handle(&self) -> &str {
        &self.device.handle
    }

    /// The session PIN; the `0000` placeholder counts as none
    pub fn pin(&self) -> Option<&Pin> {
        self.pin.as_ref().filter(|pin| !pin.is_placeholder())
    }

    /// Replace the PIN the user entered for this session
    pub fn enter_pin(&mut self, pin: Pin) {
        self.pin = Some(pin);
    }

    /// Record a PIN the device accepted in a PIN dialog
    pub(crate) fn set_pin(&mut self, pin: Pin) {
        debug!("Session PIN updated for {}", self.device.handle);
        self.pin = Some(pin);
    }

    /// Last fetched attribute snapshot
    pub const fn attributes(&self) -> &DeviceAttributes {
        &self.attributes
    }

    pub(crate) fn set_attributes(&mut self, attributes: DeviceAttributes) {
        self.attributes = attributes;
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::derive(&self.attributes)
    }

    /// End the session, wiping the PIN
    pub fn end(mut self) {
        self.pin = None;
        self.attributes.clear();
        debug!("Session ended for {}", self.device.handle);
    }
}
