//! The model store: the single canonical `Pod` of a binding.
//!
//! Every mutation, whether it is a host command completing or a device event,
//! goes through [`ModelStore::apply`] (or its rollback/edit variants). A
//! writer mutex serializes those calls, and the notification describing a
//! change is posted while the writer lock is still held, so subscribers see
//! changes in exactly the order they were applied. Delivery happens after the
//! lock is released.
//!
//! Readers get `Arc<Pod>` snapshots. The writer mutates through
//! `Arc::make_mut`, so a snapshot a caller holds is never changed under it.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use podlink_types::reduce::{inverse, reduce_action, reflects};
use podlink_types::{
    Catalog, ItemId, Notification, NotificationKind, Origin, Placement, Pod, PodAction,
};

use crate::error::Result;
use crate::notify::Notifier;

pub struct ModelStore {
    catalog: Arc<Catalog>,
    pod: RwLock<Arc<Pod>>,
    writer: Mutex<()>,
    notifier: Arc<Notifier>,
}

impl ModelStore {
    pub fn new(catalog: Catalog, notifier: Arc<Notifier>) -> Self {
        let pod = Pod::new(&catalog);
        Self {
            catalog: Arc::new(catalog),
            pod: RwLock::new(Arc::new(pod)),
            writer: Mutex::new(()),
            notifier,
        }
    }

    /// The catalog fetched at bind time. Read-only for the binding's lifetime.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> Arc<Pod> {
        Arc::clone(&self.pod.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reduce `action` into the pod and publish what changed.
    /// Returns false (and publishes nothing) if the action addressed
    /// something the model does not have.
    pub fn apply(&self, origin: Origin, action: &PodAction) -> bool {
        let applied = {
            let _writer = self.lock_writer();
            self.apply_locked(origin, action)
        };
        self.flush_notifications();
        applied
    }

    /// Apply a board layout from the device. A layout that would leave the
    /// board with gaps or duplicate positions is refused, and the current
    /// preset is marked stale since the model no longer matches the device.
    pub fn apply_layout(&self, origin: Origin, placements: Vec<(ItemId, Placement)>) -> bool {
        let applied = {
            let _writer = self.lock_writer();
            let applied = self.apply_locked(origin, &PodAction::SetLayout { placements });
            if !applied {
                log::warn!(target: "store", "refused a layout that breaks board order");
                if let Some(id) = self.snapshot().current_preset {
                    self.apply_locked(origin, &PodAction::MarkPresetStale { id });
                }
            }
            applied
        };
        self.flush_notifications();
        applied
    }

    /// Deliver what [`ModelStore::edit`] and [`ModelStore::rollback`] posted.
    /// Call with no locks held.
    pub fn flush_notifications(&self) {
        self.notifier.flush();
    }

    fn apply_locked(&self, origin: Origin, action: &PodAction) -> bool {
        let kind = {
            let mut slot = self.pod.write().unwrap_or_else(|e| e.into_inner());
            let pod = Arc::make_mut(&mut slot);
            if !reduce_action(action, pod) {
                log::debug!(target: "store", "ignored {:?} edit for unknown target", origin);
                return false;
            }
            NotificationKind::describe(action, pod)
        };
        if let Some(kind) = kind {
            self.notifier.post(Notification { origin, kind });
        }
        true
    }

    /// Build an edit from the current model and apply it in one step.
    /// `build` validates against the pod it is given; nothing is applied if it
    /// fails. Returns the applied action and the action that would undo it.
    /// The notification is posted, not delivered.
    pub fn edit<F>(&self, build: F) -> Result<(PodAction, Option<PodAction>)>
    where
        F: FnOnce(&Pod) -> Result<PodAction>,
    {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        let action = build(&current)?;
        let undo = inverse(&action, &current);
        drop(current);
        self.apply_locked(Origin::Host, &action);
        Ok((action, undo))
    }

    /// Undo an optimistic edit the device did not take. The revert only
    /// happens if the model still holds what `forward` wrote; a later change
    /// (for example a front-panel event) wins otherwise. Like
    /// [`ModelStore::edit`], this only posts.
    pub fn rollback(&self, forward: &PodAction, undo: Option<&PodAction>, reason: &str) {
        let _writer = self.lock_writer();
        if let Some(undo) = undo {
            if reflects(forward, &self.snapshot()) {
                self.apply_locked(Origin::Host, undo);
            } else {
                log::debug!(target: "store", "skipped rollback, value changed since");
            }
        }
        self.notifier.post(Notification::host(NotificationKind::CommandRolledBack {
            reason: reason.to_string(),
        }));
    }
}
