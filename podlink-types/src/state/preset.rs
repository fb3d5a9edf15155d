use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{BoardItem, DtChannel, Param, ParamId, PresetId};

/// How much of a stored preset the host knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresetStatus {
    /// Never fetched.
    #[default]
    Unknown,
    /// Name fetched (shallow refresh).
    Named,
    /// Full payload fetched.
    Loaded,
    /// The last fetch failed; whatever was known before is kept.
    Stale,
}

/// Full slot configuration of a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetData {
    pub name: String,
    pub items: Vec<BoardItem>,
    pub board_params: BTreeMap<ParamId, Param>,
    pub dt: Vec<DtChannel>,
}

/// Catalog entry for one stored preset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub status: PresetStatus,
    pub data: Option<PresetData>,
}

/// A device set list: a named ordering of presets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetList {
    pub name: String,
    pub presets: Vec<PresetId>,
}
