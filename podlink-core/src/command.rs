//! Commands, responses and unsolicited events exchanged with a device.
//!
//! These are the opaque units a [`Transport`](crate::transport::Transport)
//! carries. How they are encoded on the hardware link is the transport's
//! business.

use podlink_types::{
    BoardItem, Catalog, DtId, DtSetting, ItemId, ParamBound, ParamId, ParamTarget, ParamValue,
    Placement, PodAction, PresetData, PresetId, SetId, SetList,
};
use serde::{Deserialize, Serialize};

/// How the dispatcher and the store treat a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Applied to the store at submission, rolled back on failure.
    Value,
    /// Applied to the store on acknowledgement.
    Acknowledged,
    /// Changes board topology or the loaded preset. Applied on
    /// acknowledgement and counted as outstanding until resolved.
    Structural,
    Query,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceCommand {
    QueryCatalog,
    QueryPreset { id: PresetId },
    QueryPresetName { id: PresetId },
    QueryCurrentPreset,
    QueryCurrentPresetName,
    QueryCurrentPresetIndex,
    QueryCurrentSetId,
    QuerySet { set: SetId },
    QuerySetName { set: SetId },

    SetParam { target: ParamTarget, value: ParamValue },
    SetParamBound { item: ItemId, param: ParamId, bound: ParamBound, value: Option<f32> },
    SetActive { item: ItemId, active: bool },
    SetDt { dt: DtId, setting: DtSetting },

    RenamePreset { name: String },

    SetItemType { item: ItemId, category: String, model: String },
    SetPosition { item: ItemId, placement: Placement },
    SelectPreset { id: PresetId },
    StorePreset { id: PresetId, data: PresetData },
}

impl DeviceCommand {
    pub fn class(&self) -> CommandClass {
        match self {
            DeviceCommand::QueryCatalog
            | DeviceCommand::QueryPreset { .. }
            | DeviceCommand::QueryPresetName { .. }
            | DeviceCommand::QueryCurrentPreset
            | DeviceCommand::QueryCurrentPresetName
            | DeviceCommand::QueryCurrentPresetIndex
            | DeviceCommand::QueryCurrentSetId
            | DeviceCommand::QuerySet { .. }
            | DeviceCommand::QuerySetName { .. } => CommandClass::Query,
            DeviceCommand::SetParam { .. }
            | DeviceCommand::SetParamBound { .. }
            | DeviceCommand::SetActive { .. }
            | DeviceCommand::SetDt { .. } => CommandClass::Value,
            DeviceCommand::RenamePreset { .. } => CommandClass::Acknowledged,
            DeviceCommand::SetItemType { .. }
            | DeviceCommand::SetPosition { .. }
            | DeviceCommand::SelectPreset { .. }
            | DeviceCommand::StorePreset { .. } => CommandClass::Structural,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.class() == CommandClass::Structural
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::QueryCatalog => "QueryCatalog",
            DeviceCommand::QueryPreset { .. } => "QueryPreset",
            DeviceCommand::QueryPresetName { .. } => "QueryPresetName",
            DeviceCommand::QueryCurrentPreset => "QueryCurrentPreset",
            DeviceCommand::QueryCurrentPresetName => "QueryCurrentPresetName",
            DeviceCommand::QueryCurrentPresetIndex => "QueryCurrentPresetIndex",
            DeviceCommand::QueryCurrentSetId => "QueryCurrentSetId",
            DeviceCommand::QuerySet { .. } => "QuerySet",
            DeviceCommand::QuerySetName { .. } => "QuerySetName",
            DeviceCommand::SetParam { .. } => "SetParam",
            DeviceCommand::SetParamBound { .. } => "SetParamBound",
            DeviceCommand::SetActive { .. } => "SetActive",
            DeviceCommand::SetDt { .. } => "SetDt",
            DeviceCommand::RenamePreset { .. } => "RenamePreset",
            DeviceCommand::SetItemType { .. } => "SetItemType",
            DeviceCommand::SetPosition { .. } => "SetPosition",
            DeviceCommand::SelectPreset { .. } => "SelectPreset",
            DeviceCommand::StorePreset { .. } => "StorePreset",
        }
    }

    /// The device write for an optimistic edit.
    pub fn for_edit(action: &PodAction) -> Option<Self> {
        let command = match action {
            PodAction::SetParam { target, value } => DeviceCommand::SetParam {
                target: *target,
                value: *value,
            },
            PodAction::SetParamBound { item, param, bound, value } => DeviceCommand::SetParamBound {
                item: *item,
                param: *param,
                bound: *bound,
                value: *value,
            },
            PodAction::SetActive { item, active } => DeviceCommand::SetActive {
                item: *item,
                active: *active,
            },
            PodAction::SetDt { dt, setting } => DeviceCommand::SetDt {
                dt: *dt,
                setting: *setting,
            },
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceResponse {
    Ack,
    Catalog(Catalog),
    Preset(PresetData),
    Name(String),
    PresetIndex(u8),
    SetId(SetId),
    Set(SetList),
    /// The item as the device reset it after a type change.
    Item(BoardItem),
    /// Every placement a position change touched.
    Layout(Vec<(ItemId, Placement)>),
    /// The device refused the command; the link is fine.
    Rejected(String),
}

impl DeviceResponse {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceResponse::Ack => "Ack",
            DeviceResponse::Catalog(_) => "Catalog",
            DeviceResponse::Preset(_) => "Preset",
            DeviceResponse::Name(_) => "Name",
            DeviceResponse::PresetIndex(_) => "PresetIndex",
            DeviceResponse::SetId(_) => "SetId",
            DeviceResponse::Set(_) => "Set",
            DeviceResponse::Item(_) => "Item",
            DeviceResponse::Layout(_) => "Layout",
            DeviceResponse::Rejected(_) => "Rejected",
        }
    }
}

/// Unsolicited change reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    Parameter { target: ParamTarget, value: ParamValue },
    Active { item: ItemId, active: bool },
    ItemReplaced { item: ItemId, state: BoardItem },
    Layout { placements: Vec<(ItemId, Placement)> },
    Dt { dt: DtId, setting: DtSetting },
    /// The edit buffer changed wholesale (footswitch, preset auto-advance).
    PresetLoaded { id: Option<PresetId>, data: PresetData },
    SetSelected { set: SetId },
    ConnectionLost { reason: String },
}

impl DeviceEvent {
    /// The model edit this event stands for. Connection loss has none.
    pub fn to_action(&self) -> Option<PodAction> {
        let action = match self {
            DeviceEvent::Parameter { target, value } => PodAction::SetParam {
                target: *target,
                value: *value,
            },
            DeviceEvent::Active { item, active } => PodAction::SetActive {
                item: *item,
                active: *active,
            },
            DeviceEvent::ItemReplaced { item, state } => PodAction::ReplaceItem {
                item: *item,
                state: state.clone(),
            },
            DeviceEvent::Layout { placements } => PodAction::SetLayout {
                placements: placements.clone(),
            },
            DeviceEvent::Dt { dt, setting } => PodAction::SetDt {
                dt: *dt,
                setting: *setting,
            },
            DeviceEvent::PresetLoaded { id, data } => PodAction::LoadPreset {
                id: *id,
                data: data.clone(),
            },
            DeviceEvent::SetSelected { set } => PodAction::SelectSet { set: *set },
            DeviceEvent::ConnectionLost { .. } => return None,
        };
        Some(action)
    }
}
