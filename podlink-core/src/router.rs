//! Folds unsolicited device events into the model store.
//!
//! Events go through the same [`ModelStore::apply`] choke point as command
//! completions, tagged [`Origin::Device`] so subscribers can tell them apart
//! from echoes of their own writes.

use podlink_types::Origin;

use crate::command::DeviceEvent;
use crate::store::ModelStore;

/// What the session should do after an event was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Routed {
    Applied,
    Ignored,
    ConnectionLost(String),
}

pub(crate) fn route_event(store: &ModelStore, event: DeviceEvent) -> Routed {
    let event = match event {
        DeviceEvent::ConnectionLost { reason } => return Routed::ConnectionLost(reason),
        DeviceEvent::Layout { placements } => {
            return if store.apply_layout(Origin::Device, placements) {
                Routed::Applied
            } else {
                Routed::Ignored
            };
        }
        other => other,
    };
    match event.to_action() {
        Some(action) if store.apply(Origin::Device, &action) => Routed::Applied,
        _ => {
            log::debug!(target: "notify", "device event for unknown target ignored: {:?}", event);
            Routed::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::notify::Notifier;
    use podlink_types::{Catalog, ItemId, NotificationKind, Path, Placement};
    use std::sync::Arc;

    #[test]
    fn events_are_applied_as_device_changes() {
        let notifier = Arc::new(Notifier::new(NotifyConfig::default()));
        let rx = notifier.subscribe();
        let store = ModelStore::new(Catalog::pod_hd(), notifier);

        let routed = route_event(&store, DeviceEvent::Active { item: ItemId::new(6), active: true });
        assert_eq!(routed, Routed::Applied);
        assert!(store.snapshot().items[6].active);
        let n = rx.try_recv().unwrap();
        assert_eq!(n.origin, Origin::Device);
        assert_eq!(n.kind, NotificationKind::ActiveChanged { item: ItemId::new(6), active: true });
    }

    #[test]
    fn unknown_targets_and_loss() {
        let notifier = Arc::new(Notifier::new(NotifyConfig::default()));
        let store = ModelStore::new(Catalog::pod_hd(), notifier);
        assert_eq!(
            route_event(&store, DeviceEvent::Active { item: ItemId::new(60), active: true }),
            Routed::Ignored
        );
        assert_eq!(
            route_event(
                &store,
                DeviceEvent::Layout { placements: vec![(ItemId::new(1), Placement::new(40, Path::Pre))] }
            ),
            Routed::Ignored
        );
        assert_eq!(
            route_event(&store, DeviceEvent::ConnectionLost { reason: "eof".into() }),
            Routed::ConnectionLost("eof".into())
        );
    }
}
