//! The boundary to a physical (or simulated) device.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::command::{DeviceCommand, DeviceEvent, DeviceResponse};
use crate::error::TransportError;

/// Identity of a reachable device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable id used by `Start`.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub type EventHandler = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// A duplex channel to one device. Commands and responses are delivered in
/// order; events may arrive at any time, including while `send` is waiting.
///
/// Implementations must deliver every event the device emitted before a
/// response to the handler before `send` returns that response.
pub trait Transport: Send + Sync {
    fn device(&self) -> DeviceInfo;

    /// Send one command and wait for its response. A device-side refusal is
    /// `Ok(DeviceResponse::Rejected(_))`; an `Err` means the link failed.
    fn send(&self, command: &DeviceCommand) -> Result<DeviceResponse, TransportError>;

    /// Install (or with `None` remove) the unsolicited-event handler.
    fn on_notification(&self, handler: Option<EventHandler>);

    /// Release the link. Pending and later `send` calls fail with `Closed`.
    fn close(&self);
}

/// Finds devices and opens transports to them.
pub trait DeviceProvider: Send + Sync {
    /// Start one enumeration. Devices arrive on the receiver as they are
    /// found; the sender is dropped when the scan is over.
    fn scan(&self) -> Receiver<DeviceInfo>;

    /// Open a transport. Fails with `DeviceNotFound` or `ConnectionFailed`.
    fn connect(&self, id: &str) -> crate::Result<Arc<dyn Transport>>;
}
