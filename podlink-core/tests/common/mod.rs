#![allow(dead_code)]
//! Test harness utilities for podlink-core integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use podlink_core::config::Config;
use podlink_core::controller::Controller;
use podlink_core::sim::{SimulatedDevice, SimulatedProvider};
use podlink_types::{Catalog, DeviceLayout, Notification, NotificationKind};

pub const DEVICE: &str = "pod-1";

/// Two sets of two presets, two amp/cab pairs and four pedals.
pub fn small_layout() -> DeviceLayout {
    DeviceLayout {
        sets: 2,
        presets_per_set: 2,
        amps: 2,
        pedals: 4,
    }
}

pub fn device(id: &str, layout: DeviceLayout) -> Arc<SimulatedDevice> {
    SimulatedDevice::with_catalog(id, "POD HD", Catalog::pod_hd_with_layout(layout))
}

/// A controller over one simulated device, not yet started.
pub fn controller(device: &Arc<SimulatedDevice>) -> Controller {
    let provider = Arc::new(SimulatedProvider::new(vec![Arc::clone(device)]));
    Controller::new(provider, &Config::default())
}

/// A controller bound to a fresh simulated device, with the subscriber
/// queue drained past the initial synchronization.
pub fn bound(layout: DeviceLayout) -> (Controller, Arc<SimulatedDevice>, Receiver<Notification>) {
    let device = device(DEVICE, layout);
    let controller = controller(&device);
    let rx = controller.subscribe();
    controller.start(DEVICE).unwrap();
    drain(&rx);
    device.clear_wire();
    (controller, device, rx)
}

/// Everything queued right now.
pub fn drain(rx: &Receiver<Notification>) -> Vec<Notification> {
    rx.try_iter().collect()
}

pub fn kinds(notifications: &[Notification]) -> Vec<NotificationKind> {
    notifications.iter().map(|n| n.kind.clone()).collect()
}

/// Receive until `pred` matches or the timeout passes.
pub fn wait_for<F>(rx: &Receiver<Notification>, timeout: Duration, pred: F) -> Option<Notification>
where
    F: Fn(&Notification) -> bool,
{
    let deadline = Instant::now() + timeout;
    while let Ok(n) = rx.recv_deadline(deadline) {
        if pred(&n) {
            return Some(n);
        }
    }
    None
}

/// Poll `cond` until it holds or the timeout passes.
pub fn wait_until<F>(timeout: Duration, cond: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
