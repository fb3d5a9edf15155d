//! Wire protocol between a host and a bridged device.
//!
//! A host opens with `Hello` and is answered with `Welcome`. Commands carry
//! a host-chosen sequence number that the matching `Response` echoes back.
//! `Event` frames may arrive at any point, including between a command and
//! its response.

use serde::{Deserialize, Serialize};

use podlink_core::command::{DeviceCommand, DeviceEvent, DeviceResponse};
use podlink_core::transport::DeviceInfo;

/// Messages from host to device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    Hello { client_name: String },
    Command { seq: u64, command: DeviceCommand },
    Goodbye,
}

/// Messages from device to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceMessage {
    Welcome { device: DeviceInfo },
    Response { seq: u64, response: DeviceResponse },
    Event { event: DeviceEvent },
    /// The device side is going away; no more frames follow.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlink_types::{ItemId, ParamId, ParamTarget, ParamValue, PresetId};

    #[test]
    fn command_json_shape() {
        let msg = HostMessage::Command {
            seq: 7,
            command: DeviceCommand::SelectPreset {
                id: PresetId::new(1, 2),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["Command"]["seq"], 7);
        assert!(json["Command"]["command"].get("SelectPreset").is_some());
    }

    #[test]
    fn event_survives_json() {
        let msg = DeviceMessage::Event {
            event: DeviceEvent::Parameter {
                target: ParamTarget::item(ItemId::new(4), ParamId::new(1)),
                value: ParamValue::Number(0.25),
            },
        };
        let text = serde_json::to_string(&msg).unwrap();
        let back: DeviceMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);
    }
}
