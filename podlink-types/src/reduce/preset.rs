use crate::{Pod, PodAction, Preset, PresetStatus, SetList};

pub(super) fn reduce(action: &PodAction, pod: &mut Pod) -> bool {
    match action {
        PodAction::LoadPreset { id, data } => {
            pod.load_data(data);
            pod.dirty = false;
            if let Some(id) = id {
                pod.current_preset = Some(*id);
                pod.current_set = Some(id.set);
                if let Some(entry) = pod.presets.get_mut(id) {
                    *entry = Preset {
                        name: data.name.clone(),
                        status: PresetStatus::Loaded,
                        data: Some(data.clone()),
                    };
                }
            }
            true
        }
        PodAction::StoreEditName { name } => {
            pod.name = name.clone();
            true
        }
        PodAction::MarkSaved { id, data } => match pod.presets.get_mut(id) {
            Some(entry) => {
                *entry = Preset {
                    name: data.name.clone(),
                    status: PresetStatus::Loaded,
                    data: Some(data.clone()),
                };
                pod.current_preset = Some(*id);
                // edits that landed after the payload was taken stay unsaved
                pod.dirty = pod.live_data() != *data;
                true
            }
            None => false,
        },
        PodAction::StorePreset { id, data } => match pod.presets.get_mut(id) {
            Some(entry) => {
                *entry = Preset {
                    name: data.name.clone(),
                    status: PresetStatus::Loaded,
                    data: Some(data.clone()),
                };
                true
            }
            None => false,
        },
        PodAction::StorePresetName { id, name } => match pod.presets.get_mut(id) {
            Some(entry) => {
                entry.name = name.clone();
                match entry.data.as_mut() {
                    Some(data) if entry.status == PresetStatus::Loaded => data.name = name.clone(),
                    _ => entry.status = PresetStatus::Named,
                }
                true
            }
            None => false,
        },
        PodAction::MarkPresetStale { id } => match pod.presets.get_mut(id) {
            Some(entry) => {
                entry.status = PresetStatus::Stale;
                true
            }
            None => false,
        },
        PodAction::StoreSetName { set, name } => match pod.sets.get_mut(set) {
            Some(list) => {
                list.name = name.clone();
                true
            }
            None => false,
        },
        PodAction::StoreSet { set, list } => {
            // a set may only reference presets the model knows about
            let presets = list
                .presets
                .iter()
                .copied()
                .filter(|id| pod.presets.contains_key(id))
                .collect();
            match pod.sets.get_mut(set) {
                Some(entry) => {
                    *entry = SetList {
                        name: list.name.clone(),
                        presets,
                    };
                    true
                }
                None => false,
            }
        }
        PodAction::SelectSet { set } => {
            if !pod.layout.contains_set(*set) {
                return false;
            }
            pod.current_set = Some(*set);
            true
        }
        PodAction::SelectPreset { id } => {
            if !pod.layout.contains(*id) {
                return false;
            }
            pod.current_preset = Some(*id);
            pod.current_set = Some(id.set);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reduce::reduce_action, Catalog, PresetId, SetId};

    #[test]
    fn set_membership_is_pruned_to_known_presets() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        let list = SetList {
            name: "Gig".to_string(),
            presets: vec![PresetId::new(0, 1), PresetId::new(9, 0), PresetId::new(0, 70)],
        };
        assert!(reduce_action(&PodAction::StoreSet { set: SetId::new(0), list }, &mut pod));
        assert_eq!(pod.sets[&SetId::new(0)].presets, vec![PresetId::new(0, 1)]);
        assert_eq!(pod.sets[&SetId::new(0)].name, "Gig");
    }

    #[test]
    fn stale_keeps_previous_data() {
        let catalog = Catalog::pod_hd();
        let mut pod = Pod::new(&catalog);
        let id = PresetId::new(0, 0);
        reduce_action(&PodAction::StorePreset { id, data: catalog.blank_preset("Clean") }, &mut pod);
        reduce_action(&PodAction::MarkPresetStale { id }, &mut pod);
        let entry = pod.preset(id).unwrap();
        assert_eq!(entry.status, PresetStatus::Stale);
        assert_eq!(entry.name, "Clean");
        assert!(entry.data.is_some());
    }

    #[test]
    fn shallow_name_keeps_loaded_status() {
        let catalog = Catalog::pod_hd();
        let mut pod = Pod::new(&catalog);
        let id = PresetId::new(1, 2);
        reduce_action(&PodAction::StorePresetName { id, name: "Solo".into() }, &mut pod);
        assert_eq!(pod.preset(id).unwrap().status, PresetStatus::Named);

        reduce_action(&PodAction::StorePreset { id, data: catalog.blank_preset("Solo") }, &mut pod);
        reduce_action(&PodAction::StorePresetName { id, name: "Solo 2".into() }, &mut pod);
        let entry = pod.preset(id).unwrap();
        assert_eq!(entry.status, PresetStatus::Loaded);
        assert_eq!(entry.data.as_ref().unwrap().name, "Solo 2");
    }

    #[test]
    fn saved_buffer_clears_dirty_only_when_unchanged() {
        let catalog = Catalog::pod_hd();
        let mut pod = Pod::new(&catalog);
        let id = PresetId::new(0, 3);
        pod.dirty = true;
        let data = pod.live_data();
        assert!(reduce_action(&PodAction::MarkSaved { id, data: data.clone() }, &mut pod));
        assert!(!pod.dirty);
        assert_eq!(pod.current_preset, Some(id));

        pod.dirty = true;
        pod.name = "Changed since".to_string();
        assert!(reduce_action(&PodAction::MarkSaved { id, data: data.clone() }, &mut pod));
        assert!(pod.dirty);
        assert_eq!(pod.preset(id).unwrap().data, Some(data));
    }

    #[test]
    fn select_outside_layout_ignored() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        assert!(!reduce_action(&PodAction::SelectSet { set: SetId::new(8) }, &mut pod));
        assert_eq!(pod.current_set, None);
    }
}
