mod common;

use std::time::Duration;

use podlink_core::command::DeviceCommand;
use podlink_core::PodError;
use podlink_types::{NotificationKind, Origin, PresetId, PresetStatus, SessionPhase, SetId};

#[test]
fn start_synchronizes_and_reports_init_done() {
    let device = common::device(common::DEVICE, common::small_layout());
    let controller = common::controller(&device);
    let rx = controller.subscribe();

    controller.start(common::DEVICE).unwrap();
    assert!(controller.is_started());
    assert_eq!(controller.phase(), SessionPhase::Ready);
    assert_eq!(
        controller.get_current_device().map(|d| d.id),
        Some(common::DEVICE.to_string())
    );

    let kinds = common::kinds(&common::drain(&rx));
    let phases: Vec<SessionPhase> = kinds
        .iter()
        .filter_map(|k| match k {
            NotificationKind::PhaseChanged(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![SessionPhase::Starting, SessionPhase::Synchronizing, SessionPhase::Ready]
    );
    let init = kinds.iter().position(|k| *k == NotificationKind::InitDone).unwrap();
    let ready = kinds
        .iter()
        .position(|k| *k == NotificationKind::PhaseChanged(SessionPhase::Ready))
        .unwrap();
    assert!(init < ready);

    let pod = controller.get_pod().unwrap();
    assert_eq!(pod.presets.len(), 4);
    for (id, preset) in &pod.presets {
        assert_eq!(preset.status, PresetStatus::Named);
        assert_eq!(preset.name, format!("Preset {}-{}", id.set, id.index));
    }
    assert_eq!(pod.sets[&SetId::new(1)].name, "Set 1");
    assert_eq!(pod.current_set, Some(SetId::new(0)));
    assert_eq!(pod.current_preset, Some(PresetId::new(0, 0)));
    assert_eq!(pod.name, "Preset 0-0");
    assert!(!pod.dirty);
}

#[test]
fn initial_sync_order_matches_device_reads() {
    let device = common::device(common::DEVICE, common::small_layout());
    let controller = common::controller(&device);
    controller.start(common::DEVICE).unwrap();

    let sent = device.sent();
    assert_eq!(sent[0], DeviceCommand::QueryCatalog);
    let tail: Vec<&str> = sent[sent.len() - 3..].iter().map(|c| c.name()).collect();
    assert_eq!(
        tail,
        vec!["QueryCurrentSetId", "QueryCurrentPresetIndex", "QueryCurrentPreset"]
    );
}

#[test]
fn start_on_other_device_fails_with_already_bound() {
    let a = common::device("a", common::small_layout());
    let b = common::device("b", common::small_layout());
    let provider = std::sync::Arc::new(podlink_core::sim::SimulatedProvider::new(vec![
        a.clone(),
        b.clone(),
    ]));
    let controller =
        podlink_core::Controller::new(provider, &podlink_core::config::Config::default());

    controller.start("a").unwrap();
    assert_eq!(
        controller.start("b"),
        Err(PodError::AlreadyBound {
            current: "a".to_string()
        })
    );
    // still bound to the first device, untouched
    assert_eq!(controller.get_current_device().map(|d| d.id), Some("a".to_string()));
    assert!(b.sent().is_empty());

    // the same id again is a no-op
    a.clear_wire();
    controller.start("a").unwrap();
    assert!(a.sent().is_empty());
}

#[test]
fn stop_twice_leaves_registry_unbound() {
    let (controller, device, rx) = common::bound(common::small_layout());
    controller.stop();
    controller.stop();

    assert!(!controller.is_started());
    assert_eq!(controller.phase(), SessionPhase::Unbound);
    assert_eq!(controller.get_current_device(), None);
    assert!(device.is_closed());
    assert!(!device.has_handler());

    let kinds = common::kinds(&common::drain(&rx));
    assert_eq!(kinds, vec![NotificationKind::PhaseChanged(SessionPhase::Unbound)]);

    assert_eq!(controller.set_amp_active(0, false), Err(PodError::NotStarted));
    assert!(matches!(controller.query_all_sets(false), Err(PodError::NotStarted)));
}

#[test]
fn rebind_after_stop() {
    let (controller, device, _rx) = common::bound(common::small_layout());
    controller.stop();
    controller.start(common::DEVICE).unwrap();
    assert!(controller.is_started());
    assert!(!device.is_closed());
    controller.set_amp_active(0, false).unwrap();
    controller.flush().unwrap();
    assert!(!device.live().items[0].active);
}

#[test]
fn unplugged_device_unbinds_and_notifies() {
    let (controller, device, rx) = common::bound(common::small_layout());

    device.unplug();

    let lost = common::wait_for(&rx, Duration::from_secs(2), |n| {
        matches!(n.kind, NotificationKind::ConnectionLost { .. })
    })
    .expect("connection lost notification");
    assert_eq!(lost.origin, Origin::Device);
    assert!(!controller.is_started());
    assert!(common::wait_until(Duration::from_secs(2), || !device.has_handler()));
    assert_eq!(controller.phase(), SessionPhase::Unbound);
    assert_eq!(controller.get_pod().map(|_| ()), Err(PodError::NotStarted));
}

#[test]
fn transport_failure_rolls_back_and_unbinds() {
    let (controller, device, rx) = common::bound(common::small_layout());
    let before = controller.get_pod().unwrap();
    assert!(before.items[0].active);

    device.disconnect_when(|c| matches!(c, DeviceCommand::SetActive { .. }));
    // optimistic: accepted at queue admission
    controller.set_amp_active(0, false).unwrap();

    let lost = common::wait_for(&rx, Duration::from_secs(2), |n| {
        matches!(n.kind, NotificationKind::ConnectionLost { .. })
    });
    assert!(lost.is_some());
    assert!(common::wait_until(Duration::from_secs(2), || !controller.is_started()));
    assert!(common::wait_until(Duration::from_secs(2), || device.is_closed()));
    assert_eq!(controller.set_amp_active(0, false), Err(PodError::NotStarted));
}

#[test]
fn rollback_precedes_connection_lost() {
    let (controller, device, rx) = common::bound(common::small_layout());
    device.disconnect_when(|c| matches!(c, DeviceCommand::SetActive { .. }));
    controller.set_amp_active(1, false).unwrap();

    let mut seen = Vec::new();
    while let Some(n) = common::wait_for(&rx, Duration::from_secs(2), |_| true) {
        let done = matches!(n.kind, NotificationKind::ConnectionLost { .. });
        seen.push(n.kind);
        if done {
            break;
        }
    }
    let rolled_back = seen
        .iter()
        .position(|k| matches!(k, NotificationKind::CommandRolledBack { .. }))
        .expect("rollback notification");
    let lost = seen
        .iter()
        .position(|k| matches!(k, NotificationKind::ConnectionLost { .. }))
        .unwrap();
    assert!(rolled_back < lost);
    // optimistic value and its revert
    assert!(seen.contains(&NotificationKind::ActiveChanged {
        item: podlink_types::ItemId::new(2),
        active: false
    }));
    assert!(seen.contains(&NotificationKind::ActiveChanged {
        item: podlink_types::ItemId::new(2),
        active: true
    }));
}

#[test]
fn failed_initial_sync_leaves_unbound() {
    let device = common::device(common::DEVICE, common::small_layout());
    device.disconnect_when(|c| matches!(c, DeviceCommand::QueryCurrentSetId));
    let controller = common::controller(&device);
    let rx = controller.subscribe();

    let result = controller.start(common::DEVICE);
    assert!(matches!(result, Err(PodError::TransportError(_))), "{:?}", result);
    assert!(!controller.is_started());
    let kinds = common::kinds(&common::drain(&rx));
    assert_eq!(
        kinds.last(),
        Some(&NotificationKind::PhaseChanged(SessionPhase::Unbound))
    );
    assert!(!kinds.contains(&NotificationKind::InitDone));

    // the device works again after the fault is cleared
    device.clear_faults();
    controller.start(common::DEVICE).unwrap();
    assert_eq!(controller.phase(), SessionPhase::Ready);
}
