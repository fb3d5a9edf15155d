//! Reads from the device folded into the model store.
//!
//! `full = false` refreshes identity and names, `full = true` also fetches
//! payloads. Batches keep going past a failed item: a preset that cannot be
//! read is marked stale and reported once at the end with
//! `PartialQueryFailure`. Only a lost link aborts a batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use podlink_types::{
    Notification, NotificationKind, Origin, PodAction, PresetId, QueryTarget, SetId,
};

use super::Session;
use crate::command::{DeviceCommand, DeviceResponse};
use crate::dispatch::unexpected;
use crate::error::{PodError, Result};
use crate::store::ModelStore;

/// Outcome of a batch refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryReport {
    pub refreshed: usize,
    pub failed: Vec<QueryTarget>,
}

impl QueryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The number of refreshed items, or `PartialQueryFailure` naming the
    /// ones that could not be read.
    pub fn into_result(self) -> Result<usize> {
        if self.failed.is_empty() {
            Ok(self.refreshed)
        } else {
            Err(PodError::PartialQueryFailure {
                failed: self.failed,
            })
        }
    }
}

fn fold(store: &ModelStore, action: PodAction) {
    store.apply(Origin::Host, &action);
}

impl Session {
    // ------------------------------------------------------------------
    // Catalog (fetched once at bind time)
    // ------------------------------------------------------------------

    pub fn amp_types(&self) -> Vec<String> {
        self.store.catalog().amp_types()
    }

    pub fn cab_types(&self) -> Vec<String> {
        self.store.catalog().cab_types()
    }

    pub fn pedal_types(&self) -> BTreeMap<String, Vec<String>> {
        self.store.catalog().pedal_types()
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    pub fn query_all_presets(&self, full: bool) -> Result<QueryReport> {
        self.check_open()?;
        let targets = self
            .store
            .catalog()
            .layout
            .preset_ids()
            .map(QueryTarget::Preset)
            .collect();
        self.run_batch("presets", targets, full)
    }

    pub fn query_all_sets(&self, full: bool) -> Result<QueryReport> {
        self.check_open()?;
        let targets = self
            .store
            .catalog()
            .layout
            .set_ids()
            .map(QueryTarget::Set)
            .collect();
        self.run_batch("sets", targets, full)
    }

    fn run_batch(&self, what: &str, targets: Vec<QueryTarget>, full: bool) -> Result<QueryReport> {
        let total = targets.len();
        log::debug!(target: "query", "refreshing {} {}", total, what);
        let mut report = QueryReport::default();

        for (done, target) in targets.into_iter().enumerate() {
            let result = match target {
                QueryTarget::Preset(id) => self.fetch_preset(id, full),
                QueryTarget::Set(set) => self.fetch_set(set, full),
            };
            match result {
                Ok(()) => report.refreshed += 1,
                Err(e) if e.is_fatal() => {
                    log::warn!(target: "query", "{} refresh aborted after {}/{}: {}", what, done, total, e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!(target: "query", "could not read {:?}: {}", target, e);
                    self.mark_stale(target);
                    report.failed.push(target);
                }
            }
            self.notifier.publish(Notification::host(NotificationKind::Progress {
                done: done + 1,
                total,
            }));
        }

        if !report.failed.is_empty() {
            self.notifier
                .publish(Notification::host(NotificationKind::PartialQueryFailure {
                    failed: report.failed.clone(),
                }));
        }
        log::debug!(
            target: "query",
            "{} refresh done: {} ok, {} failed",
            what,
            report.refreshed,
            report.failed.len()
        );
        Ok(report)
    }

    fn mark_stale(&self, target: QueryTarget) {
        if let QueryTarget::Preset(id) = target {
            fold(&self.store, PodAction::MarkPresetStale { id });
        }
    }

    // ------------------------------------------------------------------
    // Single items
    // ------------------------------------------------------------------

    /// Refresh one stored preset. A failed read marks it stale.
    pub fn query_preset(&self, full: bool, set: u8, index: u8) -> Result<()> {
        self.check_open()?;
        let id = PresetId::new(set, index);
        self.pod().check_preset(id)?;
        match self.fetch_preset(id, full) {
            Err(e) if !e.is_fatal() => {
                log::warn!(target: "query", "could not read preset {}: {}", id, e);
                self.mark_stale(QueryTarget::Preset(id));
                Err(e)
            }
            other => other,
        }
    }

    fn fetch_preset(&self, id: PresetId, full: bool) -> Result<()> {
        let store = Arc::clone(&self.store);
        if full {
            self.dispatcher
                .call(DeviceCommand::QueryPreset { id }, move |response| match response {
                    DeviceResponse::Preset(data) => {
                        fold(&store, PodAction::StorePreset { id, data });
                        Ok(())
                    }
                    other => Err(unexpected("Preset", &other)),
                })
        } else {
            self.dispatcher
                .call(DeviceCommand::QueryPresetName { id }, move |response| match response {
                    DeviceResponse::Name(name) => {
                        fold(&store, PodAction::StorePresetName { id, name });
                        Ok(())
                    }
                    other => Err(unexpected("Name", &other)),
                })
        }
    }

    fn fetch_set(&self, set: SetId, full: bool) -> Result<()> {
        let store = Arc::clone(&self.store);
        if full {
            self.dispatcher
                .call(DeviceCommand::QuerySet { set }, move |response| match response {
                    DeviceResponse::Set(list) => {
                        fold(&store, PodAction::StoreSet { set, list });
                        Ok(())
                    }
                    other => Err(unexpected("Set", &other)),
                })
        } else {
            self.dispatcher
                .call(DeviceCommand::QuerySetName { set }, move |response| match response {
                    DeviceResponse::Name(name) => {
                        fold(&store, PodAction::StoreSetName { set, name });
                        Ok(())
                    }
                    other => Err(unexpected("Name", &other)),
                })
        }
    }

    // ------------------------------------------------------------------
    // Edit buffer and selection
    // ------------------------------------------------------------------

    /// Re-read the edit buffer: its name, or with `full` the whole payload
    /// (which discards unsaved local edits).
    pub fn query_current_preset(&self, full: bool) -> Result<()> {
        self.check_open()?;
        let store = Arc::clone(&self.store);
        if full {
            self.dispatcher
                .call(DeviceCommand::QueryCurrentPreset, move |response| match response {
                    DeviceResponse::Preset(data) => {
                        fold(&store, PodAction::LoadPreset { id: None, data });
                        Ok(())
                    }
                    other => Err(unexpected("Preset", &other)),
                })
        } else {
            self.dispatcher
                .call(DeviceCommand::QueryCurrentPresetName, move |response| match response {
                    DeviceResponse::Name(name) => {
                        fold(&store, PodAction::StoreEditName { name });
                        Ok(())
                    }
                    other => Err(unexpected("Name", &other)),
                })
        }
    }

    /// Drop unsaved edits by re-reading the edit buffer from the device.
    pub fn reload_preset(&self) -> Result<()> {
        log::debug!(target: "query", "reloading edit buffer");
        self.query_current_preset(true)
    }

    /// Read which preset is selected. With `full` the set id is read too;
    /// otherwise the index is paired with the set already known locally.
    pub fn query_current_preset_id(&self, full: bool) -> Result<()> {
        self.check_open()?;
        let set = if full {
            Some(self.read_current_set()?)
        } else {
            None
        };

        let store = Arc::clone(&self.store);
        self.dispatcher
            .call(DeviceCommand::QueryCurrentPresetIndex, move |response| match response {
                DeviceResponse::PresetIndex(index) => {
                    let set = set
                        .or(store.snapshot().current_set)
                        .unwrap_or_default();
                    fold(&store, PodAction::SelectPreset { id: PresetId { set, index } });
                    Ok(())
                }
                other => Err(unexpected("PresetIndex", &other)),
            })
    }

    /// Read which set is selected. With `full` that set's name and
    /// membership are refreshed as well.
    pub fn query_current_set_id(&self, full: bool) -> Result<()> {
        self.check_open()?;
        let set = self.read_current_set()?;
        if full {
            self.fetch_set(set, true)?;
        }
        Ok(())
    }

    fn read_current_set(&self) -> Result<SetId> {
        let store = Arc::clone(&self.store);
        self.dispatcher
            .call(DeviceCommand::QueryCurrentSetId, move |response| match response {
                DeviceResponse::SetId(set) => {
                    fold(&store, PodAction::SelectSet { set });
                    Ok(set)
                }
                other => Err(unexpected("SetId", &other)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_into_result() {
        let ok = QueryReport {
            refreshed: 3,
            failed: vec![],
        };
        assert!(ok.is_complete());
        assert_eq!(ok.into_result(), Ok(3));

        let failed = vec![QueryTarget::Preset(PresetId::new(0, 1))];
        let partial = QueryReport {
            refreshed: 1,
            failed: failed.clone(),
        };
        assert!(!partial.is_complete());
        assert_eq!(partial.into_result(), Err(PodError::PartialQueryFailure { failed }));
    }
}
