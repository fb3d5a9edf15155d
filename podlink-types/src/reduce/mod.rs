//! Pure state-mutation reducers for the device model.
//!
//! These functions are the single source of truth for action → model mutations.
//! podlink-core's model store calls into this module for host command
//! completions and device notifications alike.
//!
//! Reducers are pure: they mutate the `Pod` only. They do NOT:
//! - Validate values against the catalog (callers do that before sending)
//! - Publish notifications
//! - Talk to a device

mod board;
mod preset;

pub use board::{is_contiguous, plan_move};

use crate::{Pod, PodAction};

/// Apply an action's mutations to the model.
/// Returns true if the action was handled, false if it addressed something
/// the model does not have (the model is left untouched in that case).
pub fn reduce_action(action: &PodAction, pod: &mut Pod) -> bool {
    let handled = match action {
        PodAction::SetParam { .. }
        | PodAction::SetParamBound { .. }
        | PodAction::SetActive { .. }
        | PodAction::ReplaceItem { .. }
        | PodAction::SetLayout { .. }
        | PodAction::SetDt { .. }
        | PodAction::RenameCurrent { .. } => board::reduce(action, pod),

        PodAction::LoadPreset { .. }
        | PodAction::StoreEditName { .. }
        | PodAction::MarkSaved { .. }
        | PodAction::StorePreset { .. }
        | PodAction::StorePresetName { .. }
        | PodAction::MarkPresetStale { .. }
        | PodAction::StoreSetName { .. }
        | PodAction::StoreSet { .. }
        | PodAction::SelectSet { .. }
        | PodAction::SelectPreset { .. } => preset::reduce(action, pod),
    };
    if handled && action.is_edit() {
        pod.dirty = true;
    }
    handled
}

/// The action that would restore what `action` overwrites, read from the
/// model before `action` is applied. Only defined for single-field edits.
pub fn inverse(action: &PodAction, pod: &Pod) -> Option<PodAction> {
    match action {
        PodAction::SetParam { target, .. } => Some(PodAction::SetParam {
            target: *target,
            value: pod.param(*target)?.value,
        }),
        PodAction::SetParamBound { item, param, bound, .. } => {
            let current = pod.item(*item)?.param(*param)?.bound(*bound);
            Some(PodAction::SetParamBound {
                item: *item,
                param: *param,
                bound: *bound,
                value: current,
            })
        }
        PodAction::SetActive { item, .. } => Some(PodAction::SetActive {
            item: *item,
            active: pod.item(*item)?.active,
        }),
        PodAction::SetDt { dt, setting } => Some(PodAction::SetDt {
            dt: *dt,
            setting: pod.dt(*dt)?.get(setting.field()),
        }),
        _ => None,
    }
}

/// Whether the model currently holds exactly what `action` wrote.
/// Only meaningful for the single-field edits [`inverse`] supports.
pub fn reflects(action: &PodAction, pod: &Pod) -> bool {
    match action {
        PodAction::SetParam { target, value } => {
            pod.param(*target).map(|p| p.value == *value).unwrap_or(false)
        }
        PodAction::SetParamBound { item, param, bound, value } => pod
            .item(*item)
            .and_then(|i| i.param(*param))
            .map(|p| p.bound(*bound) == *value)
            .unwrap_or(false),
        PodAction::SetActive { item, active } => {
            pod.item(*item).map(|i| i.active == *active).unwrap_or(false)
        }
        PodAction::SetDt { dt, setting } => {
            pod.dt(*dt).map(|ch| ch.get(setting.field()) == *setting).unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Catalog, DtClass, DtId, DtSetting, ItemId, ParamId, ParamTarget, ParamValue, PresetId,
        PresetStatus,
    };

    fn pod() -> Pod {
        Pod::new(&Catalog::pod_hd())
    }

    #[test]
    fn edits_mark_dirty() {
        let mut pod = pod();
        assert!(!pod.dirty);
        let action = PodAction::SetActive { item: ItemId::new(4), active: true };
        assert!(reduce_action(&action, &mut pod));
        assert!(pod.dirty);
        assert!(pod.items[4].active);
    }

    #[test]
    fn unknown_item_is_not_handled() {
        let mut pod = pod();
        let before = pod.clone();
        let action = PodAction::SetActive { item: ItemId::new(40), active: true };
        assert!(!reduce_action(&action, &mut pod));
        assert_eq!(pod, before);
    }

    #[test]
    fn inverse_restores_previous_value() {
        let mut pod = pod();
        let target = ParamTarget::item(ItemId::new(0), ParamId::new(0));
        let forward = PodAction::SetParam { target, value: ParamValue::Number(0.9) };
        let undo = inverse(&forward, &pod).unwrap();

        reduce_action(&forward, &mut pod);
        assert!(reflects(&forward, &pod));
        reduce_action(&undo, &mut pod);
        assert_eq!(pod.param(target).unwrap().value, ParamValue::Number(0.5));
        assert!(!reflects(&forward, &pod));
    }

    #[test]
    fn inverse_of_dt_setting() {
        let pod = pod();
        let forward = PodAction::SetDt { dt: DtId::new(0), setting: DtSetting::Class(DtClass::AB) };
        assert_eq!(
            inverse(&forward, &pod),
            Some(PodAction::SetDt { dt: DtId::new(0), setting: DtSetting::Class(DtClass::A) })
        );
    }

    #[test]
    fn load_preset_clears_dirty_and_selects() {
        let catalog = Catalog::pod_hd();
        let mut pod = pod();
        pod.dirty = true;
        let id = PresetId::new(2, 5);
        let data = catalog.blank_preset("Lead");
        assert!(reduce_action(&PodAction::LoadPreset { id: Some(id), data }, &mut pod));
        assert!(!pod.dirty);
        assert_eq!(pod.current_preset, Some(id));
        assert_eq!(pod.current_set, Some(id.set));
        assert_eq!(pod.name, "Lead");
        assert_eq!(pod.preset(id).unwrap().status, PresetStatus::Loaded);
    }
}
