//! Change notifications published to the session subscriber.

use serde::{Deserialize, Serialize};

use crate::{
    DtId, DtSetting, ItemId, ParamBound, ParamId, ParamTarget, ParamValue, Placement, Pod,
    PodAction, PresetId, PresetStatus, SetId,
};

/// Who caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// A command issued through the controller (including its rollback).
    Host,
    /// Unsolicited: the front panel, a footswitch, preset auto-advance.
    Device,
}

/// Lifecycle of one device binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Unbound,
    Starting,
    Synchronizing,
    Ready,
    /// A structural command is outstanding.
    Busy,
}

impl SessionPhase {
    pub fn is_bound(&self) -> bool {
        !matches!(self, SessionPhase::Unbound)
    }
}

/// One entry of a batch query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryTarget {
    Preset(PresetId),
    Set(SetId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub origin: Origin,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn host(kind: NotificationKind) -> Self {
        Self { origin: Origin::Host, kind }
    }

    pub fn device(kind: NotificationKind) -> Self {
        Self { origin: Origin::Device, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    ParameterChanged {
        target: ParamTarget,
        value: ParamValue,
        /// The value as the binding surface displays it.
        text: String,
    },
    ParameterRangeChanged {
        item: ItemId,
        param: ParamId,
        bound: ParamBound,
        value: Option<f32>,
    },
    ActiveChanged {
        item: ItemId,
        active: bool,
    },
    ItemTypeChanged {
        item: ItemId,
        category: String,
        model: String,
    },
    LayoutChanged {
        placements: Vec<(ItemId, Placement)>,
    },
    DtChanged {
        dt: DtId,
        setting: DtSetting,
    },
    /// The edit buffer was replaced. `id` is `None` when it was re-read in place.
    PresetLoaded {
        id: Option<PresetId>,
        name: String,
    },
    PresetRenamed {
        name: String,
    },
    PresetSaved {
        id: PresetId,
    },
    PresetRefreshed {
        id: PresetId,
        status: PresetStatus,
    },
    SetRefreshed {
        set: SetId,
        name: String,
    },
    CurrentSetChanged {
        set: SetId,
    },
    CurrentPresetChanged {
        id: PresetId,
    },
    Progress {
        done: usize,
        total: usize,
    },
    PartialQueryFailure {
        failed: Vec<QueryTarget>,
    },
    CommandRolledBack {
        reason: String,
    },
    PhaseChanged(SessionPhase),
    InitDone,
    ConnectionLost {
        reason: String,
    },
}

impl NotificationKind {
    /// What an applied action looks like to a subscriber. `pod` is the model
    /// after the action was reduced.
    pub fn describe(action: &PodAction, pod: &Pod) -> Option<Self> {
        let kind = match action {
            PodAction::SetParam { target, value } => NotificationKind::ParameterChanged {
                target: *target,
                value: *value,
                text: pod.param(*target)?.value_string(),
            },
            PodAction::SetParamBound { item, param, bound, value } => {
                NotificationKind::ParameterRangeChanged {
                    item: *item,
                    param: *param,
                    bound: *bound,
                    value: *value,
                }
            }
            PodAction::SetActive { item, active } => NotificationKind::ActiveChanged {
                item: *item,
                active: *active,
            },
            PodAction::ReplaceItem { item, state } => NotificationKind::ItemTypeChanged {
                item: *item,
                category: state.category.clone(),
                model: state.model.clone(),
            },
            PodAction::SetLayout { placements } => NotificationKind::LayoutChanged {
                placements: placements.clone(),
            },
            PodAction::SetDt { dt, setting } => NotificationKind::DtChanged {
                dt: *dt,
                setting: *setting,
            },
            PodAction::RenameCurrent { name } | PodAction::StoreEditName { name } => {
                NotificationKind::PresetRenamed { name: name.clone() }
            }
            PodAction::LoadPreset { id, data } => NotificationKind::PresetLoaded {
                id: *id,
                name: data.name.clone(),
            },
            PodAction::MarkSaved { id, .. } => NotificationKind::PresetSaved { id: *id },
            PodAction::StorePreset { id, .. }
            | PodAction::StorePresetName { id, .. }
            | PodAction::MarkPresetStale { id } => NotificationKind::PresetRefreshed {
                id: *id,
                status: pod.preset(*id)?.status,
            },
            PodAction::StoreSetName { set, .. } | PodAction::StoreSet { set, .. } => {
                NotificationKind::SetRefreshed {
                    set: *set,
                    name: pod.sets.get(set)?.name.clone(),
                }
            }
            PodAction::SelectSet { set } => NotificationKind::CurrentSetChanged { set: *set },
            PodAction::SelectPreset { id } => NotificationKind::CurrentPresetChanged { id: *id },
        };
        Some(kind)
    }
}
