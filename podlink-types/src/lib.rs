//! # podlink-types
//!
//! Shared type definitions for podlink.
//! This crate contains the device model (`Pod`), the edits that can be applied
//! to it (`PodAction`), the pure reducers that apply them, and the notification
//! types published to observers. It is used by podlink-core and podlink-net.

pub mod action;
pub mod catalog;
mod notification;
mod param;
pub mod reduce;
pub mod state;
mod validate;

pub use action::*;
pub use catalog::{Catalog, DeviceLayout};
pub use notification::{Notification, NotificationKind, Origin, QueryTarget, SessionPhase};
pub use param::{Param, ParamBound, ParamDef, ParamError, ParamKind, ParamValue};
pub use validate::{check_preset_name, ModelError};

// Re-export all state types at crate root for convenience
pub use state::*;

/// Flat index of an item on the pedal board (amps, cabs and pedals share one space).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(u16);

impl ItemId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }
    pub fn get(self) -> u16 {
        self.0
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a parameter within an item (or within the global board parameters).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ParamId(u16);

impl ParamId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }
    pub fn get(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device set-list (bank) number.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct SetId(u8);

impl SetId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }
    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for SetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a stored preset: the set (bank) it lives in and its index there.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct PresetId {
    pub set: SetId,
    pub index: u8,
}

impl PresetId {
    pub fn new(set: u8, index: u8) -> Self {
        Self {
            set: SetId::new(set),
            index,
        }
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.set, self.index)
    }
}

/// Index of a DT amplifier channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct DtId(u8);

impl DtId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }
    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for DtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Longest preset name the device stores.
pub const PRESET_NAME_MAX: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&ItemId::new(7)).unwrap(), "7");
        let id: PresetId = serde_json::from_str(r#"{"set":3,"index":12}"#).unwrap();
        assert_eq!(id, PresetId::new(3, 12));
        assert_eq!(id.to_string(), "3:12");
    }

    #[test]
    fn notification_survives_json() {
        let n = Notification::device(NotificationKind::DtChanged {
            dt: DtId::new(1),
            setting: DtSetting::Mode(DtMode::Triode),
        });
        let text = serde_json::to_string(&n).unwrap();
        let back: Notification = serde_json::from_str(&text).unwrap();
        assert_eq!(back, n);
    }
}
