//! Writes: optimistic value edits, the acknowledged rename, and the
//! structural commands (type change, move, preset load, save).

use std::sync::Arc;

use podlink_types::{
    check_preset_name, DtField, DtId, ItemId, Origin, ParamBound, ParamId, ParamTarget,
    Path, Placement, Pod, PodAction, PresetId,
};

use super::{lock, Session};
use crate::command::{DeviceCommand, DeviceResponse};
use crate::dispatch::{expect_ack, unexpected, Completion};
use crate::error::{PodError, Result};

impl Session {
    // ------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------

    pub fn amp_item(&self, amp: u8) -> Result<ItemId> {
        self.store
            .catalog()
            .layout
            .amp_item(amp)
            .ok_or(PodError::UnknownSlot(ItemId::new(amp as u16 * 2)))
    }

    pub fn cab_item(&self, cab: u8) -> Result<ItemId> {
        self.store
            .catalog()
            .layout
            .cab_item(cab)
            .ok_or(PodError::UnknownSlot(ItemId::new(cab as u16 * 2 + 1)))
    }

    pub fn pedal_item(&self, pedal: u8) -> Result<ItemId> {
        let layout = self.store.catalog().layout;
        layout
            .pedal_item(pedal)
            .ok_or(PodError::UnknownSlot(ItemId::new(
                pedal as u16 + layout.amps as u16 * 2,
            )))
    }

    // ------------------------------------------------------------------
    // Optimistic value edits
    // ------------------------------------------------------------------

    /// Validate and apply an edit to the store, then queue its device write.
    /// Returns once the command is queued; if the device refuses it or the
    /// link fails, the edit is rolled back.
    fn submit_value<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&Pod) -> Result<PodAction>,
    {
        let queued = self.queue_value(build);
        // outside the submit lock
        self.store.flush_notifications();
        queued
    }

    fn queue_value<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(&Pod) -> Result<PodAction>,
    {
        let _order = lock(&self.submit);
        self.check_open()?;

        let (action, undo) = self.store.edit(build)?;
        let Some(command) = DeviceCommand::for_edit(&action) else {
            let err = PodError::InvalidValue(format!("{:?} is not a device write", action));
            self.store.rollback(&action, undo.as_ref(), &err.to_string());
            return Err(err);
        };

        let store = Arc::clone(&self.store);
        let forward = action.clone();
        let revert = undo.clone();
        let complete: Completion = Box::new(move |result| {
            if let Err(e) = result {
                log::warn!(target: "session", "write failed, rolling back: {}", e);
                store.rollback(&forward, revert.as_ref(), &e.to_string());
                store.flush_notifications();
            }
            None
        });
        if let Err(e) = self.dispatcher.submit(command, complete) {
            self.store.rollback(&action, undo.as_ref(), &e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Write a parameter value given as the binding surface's string.
    pub fn set_param(&self, target: ParamTarget, text: &str) -> Result<()> {
        self.submit_value(|pod| {
            let value = pod.decode_value(target, text)?;
            Ok(PodAction::SetParam { target, value })
        })
    }

    /// Write a min or max override. An empty string clears it.
    pub fn set_param_bound(
        &self,
        item: ItemId,
        param: ParamId,
        bound: ParamBound,
        text: &str,
    ) -> Result<()> {
        self.submit_value(|pod| {
            let value = pod.decode_bound(item, param, bound, text)?;
            Ok(PodAction::SetParamBound {
                item,
                param,
                bound,
                value,
            })
        })
    }

    pub fn set_active(&self, item: ItemId, active: bool) -> Result<()> {
        self.submit_value(|pod| {
            pod.check_item(item)?;
            Ok(PodAction::SetActive { item, active })
        })
    }

    /// Write one DT setting on the channel with index `dt`.
    pub fn set_dt(&self, dt: DtId, field: DtField, text: &str) -> Result<()> {
        self.submit_value(|pod| dt_action(pod, dt, field, text))
    }

    /// Write one DT setting on the channel bound to amp slot `amp`.
    pub fn set_dt_for_amp(&self, amp: u8, field: DtField, text: &str) -> Result<()> {
        self.submit_value(|pod| {
            let dt = pod
                .dt_for_amp(amp)
                .ok_or_else(|| PodError::InvalidValue(format!("no DT channel for amp {}", amp)))?;
            dt_action(pod, dt, field, text)
        })
    }

    // ------------------------------------------------------------------
    // Acknowledged
    // ------------------------------------------------------------------

    /// Rename the preset in the edit buffer. Applied once the device acknowledges.
    pub fn rename_current(&self, name: &str) -> Result<()> {
        self.check_open()?;
        check_preset_name(name)?;
        let store = Arc::clone(&self.store);
        let name = name.to_string();
        self.dispatcher.call(
            DeviceCommand::RenamePreset { name: name.clone() },
            move |response| {
                expect_ack(response)?;
                store.apply(Origin::Host, &PodAction::RenameCurrent { name });
                Ok(())
            },
        )
    }

    // ------------------------------------------------------------------
    // Structural
    // ------------------------------------------------------------------

    /// Change an item's type. The device answers with the reset item, which
    /// replaces the local one wholesale.
    pub fn set_item_type(&self, item: ItemId, category: &str, model: &str) -> Result<()> {
        self.check_open()?;
        let catalog = self.store.catalog();
        let (kind, _) = catalog
            .layout
            .slot_of(item)
            .ok_or(PodError::UnknownSlot(item))?;
        catalog.check_type(kind, category, model)?;

        let store = Arc::clone(&self.store);
        self.dispatcher.call(
            DeviceCommand::SetItemType {
                item,
                category: category.to_string(),
                model: model.to_string(),
            },
            move |response| match response {
                DeviceResponse::Item(state) => {
                    store.apply(Origin::Host, &PodAction::ReplaceItem { item, state });
                    Ok(())
                }
                other => Err(unexpected("Item", &other)),
            },
        )
    }

    /// Move an item to `position` on the path with wire code `path`.
    pub fn set_position(&self, item: ItemId, position: u16, path: u8) -> Result<()> {
        self.check_open()?;
        let path = Path::from_code(path)
            .ok_or_else(|| PodError::InvalidValue(format!("unknown path code {}", path)))?;
        let placement = Placement::new(position, path);
        self.pod().check_placement(item, placement)?;

        let store = Arc::clone(&self.store);
        self.dispatcher.call(
            DeviceCommand::SetPosition { item, placement },
            move |response| match response {
                DeviceResponse::Layout(placements) => {
                    if store.apply_layout(Origin::Host, placements) {
                        Ok(())
                    } else {
                        Err(PodError::InvalidValue(
                            "device reported a board layout with gaps".to_string(),
                        ))
                    }
                }
                other => Err(unexpected("Layout", &other)),
            },
        )
    }

    /// Load a stored preset into the edit buffer.
    pub fn select_preset(&self, id: PresetId) -> Result<()> {
        self.check_open()?;
        self.pod().check_preset(id)?;

        let store = Arc::clone(&self.store);
        self.dispatcher.call(DeviceCommand::SelectPreset { id }, move |response| match response {
            DeviceResponse::Preset(data) => {
                store.apply(
                    Origin::Host,
                    &PodAction::LoadPreset { id: Some(id), data },
                );
                Ok(())
            }
            other => Err(unexpected("Preset", &other)),
        })
    }

    /// Store the edit buffer into the current preset slot. Fails with
    /// `DeviceBusy` while another structural command is outstanding. The
    /// buffer is read once the save is admitted; anything that changes it
    /// while the store is in flight leaves the pod dirty.
    pub fn save(&self) -> Result<()> {
        self.check_open()?;
        let store = Arc::clone(&self.store);
        self.dispatcher.call_exclusive(|| {
            let pod = self.pod();
            let id = pod
                .current_preset
                .ok_or_else(|| PodError::InvalidValue("no preset is selected".to_string()))?;
            let data = pod.live_data();
            let command = DeviceCommand::StorePreset {
                id,
                data: data.clone(),
            };
            Ok((command, move |response: DeviceResponse| -> Result<()> {
                expect_ack(response)?;
                store.apply(Origin::Host, &PodAction::MarkSaved { id, data });
                Ok(())
            }))
        })
    }
}

fn dt_action(pod: &Pod, dt: DtId, field: DtField, text: &str) -> Result<PodAction> {
    if pod.dt(dt).is_none() {
        return Err(PodError::InvalidValue(format!("no DT channel {}", dt)));
    }
    let setting = field.parse(text).ok_or_else(|| {
        PodError::InvalidValue(format!("'{}' is not a valid DT {}", text, field.name()))
    })?;
    Ok(PodAction::SetDt { dt, setting })
}
