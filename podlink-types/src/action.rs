//! Edits to the device model.
//!
//! Every change to a [`Pod`](crate::Pod), whether it comes from a completed
//! host command or from a device notification, is expressed as a
//! [`PodAction`] and applied through [`crate::reduce::reduce_action`].

use serde::{Deserialize, Serialize};

use crate::{
    BoardItem, DtId, DtSetting, ItemId, ParamBound, ParamId, ParamValue, Placement, PresetData,
    PresetId, SetId, SetList,
};

/// Addresses one parameter: either on a board item or a global board parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamTarget {
    Item { item: ItemId, param: ParamId },
    Board { param: ParamId },
}

impl ParamTarget {
    pub fn item(item: ItemId, param: ParamId) -> Self {
        ParamTarget::Item { item, param }
    }

    pub fn board(param: ParamId) -> Self {
        ParamTarget::Board { param }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PodAction {
    // ========================================================================
    // Edit buffer
    // ========================================================================
    SetParam {
        target: ParamTarget,
        value: ParamValue,
    },
    /// `None` clears the override.
    SetParamBound {
        item: ItemId,
        param: ParamId,
        bound: ParamBound,
        value: Option<f32>,
    },
    SetActive {
        item: ItemId,
        active: bool,
    },
    /// Wholesale replacement of an item after a confirmed type change.
    ReplaceItem {
        item: ItemId,
        state: BoardItem,
    },
    /// Device-confirmed placements for every moved item.
    SetLayout {
        placements: Vec<(ItemId, Placement)>,
    },
    SetDt {
        dt: DtId,
        setting: DtSetting,
    },
    RenameCurrent {
        name: String,
    },

    // ========================================================================
    // Preset / set catalog
    // ========================================================================
    /// Replace the edit buffer. `id` is the preset the payload came from, or
    /// `None` when the edit buffer was re-read in place.
    LoadPreset {
        id: Option<PresetId>,
        data: PresetData,
    },
    /// Name of the edit buffer, read without its payload.
    StoreEditName {
        name: String,
    },
    MarkSaved {
        id: PresetId,
        data: PresetData,
    },
    StorePreset {
        id: PresetId,
        data: PresetData,
    },
    StorePresetName {
        id: PresetId,
        name: String,
    },
    MarkPresetStale {
        id: PresetId,
    },
    StoreSetName {
        set: SetId,
        name: String,
    },
    StoreSet {
        set: SetId,
        list: SetList,
    },
    SelectSet {
        set: SetId,
    },
    SelectPreset {
        id: PresetId,
    },
}

impl PodAction {
    /// Whether the action changes the edit buffer relative to what is stored.
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            PodAction::SetParam { .. }
                | PodAction::SetParamBound { .. }
                | PodAction::SetActive { .. }
                | PodAction::ReplaceItem { .. }
                | PodAction::SetLayout { .. }
                | PodAction::SetDt { .. }
                | PodAction::RenameCurrent { .. }
        )
    }
}
