//! Device registry: enumeration and the lifecycle of the one bound device.
//!
//! The registry owns a single slot holding the current [`Session`]. `start`
//! and `stop` are serialized against each other; a link failure empties the
//! slot from whichever thread noticed it and tears the session down on a
//! separate thread, so the dispatcher worker never waits on itself.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use podlink_types::{Notification, NotificationKind};

use crate::config::SessionConfig;
use crate::error::{PodError, Result};
use crate::notify::Notifier;
use crate::session::{lock, FaultHook, Session};
use crate::transport::{DeviceInfo, DeviceProvider};

pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    provider: Arc<dyn DeviceProvider>,
    notifier: Arc<Notifier>,
    config: SessionConfig,
    slot: Mutex<Option<Arc<Session>>>,
    /// Serializes `start` and `stop`.
    lifecycle: Mutex<()>,
    generation: AtomicU64,
    /// Generation of the last session whose link failed.
    faulted: AtomicU64,
}

impl DeviceRegistry {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        notifier: Arc<Notifier>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                provider,
                notifier,
                config,
                slot: Mutex::new(None),
                lifecycle: Mutex::new(()),
                generation: AtomicU64::new(0),
                faulted: AtomicU64::new(0),
            }),
        }
    }

    /// Enumerate reachable devices. Nothing is scanned until the result is
    /// iterated, and every iteration scans again.
    pub fn list_devices(&self) -> DeviceScan {
        DeviceScan {
            provider: Arc::clone(&self.inner.provider),
            timeout: self.inner.config.discovery_timeout,
        }
    }

    /// Bind to device `id` and run the initial synchronization. Binding the
    /// device that is already bound succeeds without doing anything.
    pub fn start(&self, id: &str) -> Result<()> {
        let _lifecycle = lock(&self.inner.lifecycle);
        if let Some(current) = self.current() {
            if current.device().id == id {
                log::debug!(target: "registry", "{} is already bound", id);
                return Ok(());
            }
            return Err(PodError::AlreadyBound {
                current: current.device().id.clone(),
            });
        }

        log::info!(target: "registry", "starting {}", id);
        let transport = self.inner.provider.connect(id)?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let on_fault: FaultHook = Arc::new(move |generation, reason| {
            if let Some(registry) = registry.upgrade() {
                registry.connection_lost(generation, reason);
            }
        });

        let session = Session::open(
            transport,
            generation,
            Arc::clone(&self.inner.notifier),
            self.inner.config,
            on_fault,
        )?;

        // the link may have dropped after synchronization but before the
        // session was visible to the fault hook
        if self.inner.faulted.load(Ordering::SeqCst) == generation {
            session.shutdown();
            return Err(PodError::ConnectionFailed(format!(
                "lost {} while binding",
                id
            )));
        }
        *lock(&self.inner.slot) = Some(session);
        log::info!(target: "registry", "{} started", id);
        Ok(())
    }

    /// Release the bound device, waiting for the in-flight command. A no-op
    /// when nothing is bound.
    pub fn stop(&self) {
        let _lifecycle = lock(&self.inner.lifecycle);
        let session = lock(&self.inner.slot).take();
        match session {
            Some(session) => {
                log::info!(target: "registry", "stopping {}", session.device().id);
                session.shutdown();
            }
            None => log::debug!(target: "registry", "stop: nothing bound"),
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        lock(&self.inner.slot).clone()
    }

    /// The bound session, or `NotStarted`.
    pub fn session(&self) -> Result<Arc<Session>> {
        self.current().ok_or(PodError::NotStarted)
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner.slot).is_some()
    }

    pub fn current_device(&self) -> Option<DeviceInfo> {
        self.current().map(|s| s.device().clone())
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RegistryInner {
    fn connection_lost(&self, generation: u64, reason: String) {
        self.faulted.store(generation, Ordering::SeqCst);
        let session = {
            let mut slot = lock(&self.slot);
            match slot.as_ref() {
                Some(s) if s.generation() == generation => slot.take(),
                _ => None,
            }
        };
        let Some(session) = session else {
            log::debug!(target: "registry", "stale link failure for generation {}", generation);
            return;
        };

        log::warn!(target: "registry", "lost {}: {}", session.device().id, reason);
        self.notifier
            .publish(Notification::device(NotificationKind::ConnectionLost { reason }));

        let spawned = thread::Builder::new()
            .name("podlink-teardown".to_string())
            .spawn(move || session.shutdown());
        if let Err(e) = spawned {
            log::error!(target: "registry", "could not spawn teardown thread: {}", e);
        }
    }
}

/// A restartable enumeration of reachable devices.
#[derive(Clone)]
pub struct DeviceScan {
    provider: Arc<dyn DeviceProvider>,
    timeout: Duration,
}

impl DeviceScan {
    pub fn iter(&self) -> DeviceIter {
        DeviceIter {
            provider: Arc::clone(&self.provider),
            timeout: self.timeout,
            scan: None,
            seen: HashSet::new(),
        }
    }
}

impl IntoIterator for DeviceScan {
    type Item = DeviceInfo;
    type IntoIter = DeviceIter;

    fn into_iter(self) -> DeviceIter {
        self.iter()
    }
}

impl IntoIterator for &DeviceScan {
    type Item = DeviceInfo;
    type IntoIter = DeviceIter;

    fn into_iter(self) -> DeviceIter {
        self.iter()
    }
}

/// One pass over a [`DeviceScan`]. Ends when the provider finishes or the
/// discovery timeout passes, whichever is first.
pub struct DeviceIter {
    provider: Arc<dyn DeviceProvider>,
    timeout: Duration,
    scan: Option<(Receiver<DeviceInfo>, Instant)>,
    seen: HashSet<String>,
}

impl Iterator for DeviceIter {
    type Item = DeviceInfo;

    fn next(&mut self) -> Option<DeviceInfo> {
        let provider = &self.provider;
        let timeout = self.timeout;
        let (rx, deadline) = self.scan.get_or_insert_with(|| {
            log::debug!(target: "registry", "scanning for devices");
            (provider.scan(), Instant::now() + timeout)
        });
        loop {
            let device = rx.recv_deadline(*deadline).ok()?;
            if self.seen.insert(device.id.clone()) {
                return Some(device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::sim::{SimulatedDevice, SimulatedProvider};
    use podlink_types::{Catalog, DeviceLayout};

    fn small(id: &str) -> Arc<SimulatedDevice> {
        let layout = DeviceLayout {
            sets: 1,
            presets_per_set: 2,
            amps: 1,
            pedals: 2,
        };
        SimulatedDevice::with_catalog(id, id, Catalog::pod_hd_with_layout(layout))
    }

    fn registry(devices: Vec<Arc<SimulatedDevice>>) -> DeviceRegistry {
        let provider = Arc::new(SimulatedProvider::new(devices));
        let notifier = Arc::new(Notifier::new(NotifyConfig::default()));
        DeviceRegistry::new(provider, notifier, SessionConfig::default())
    }

    #[test]
    fn scan_is_lazy_and_restartable() {
        let registry = registry(vec![small("a"), small("b")]);
        let scan = registry.list_devices();
        let first: Vec<String> = scan.iter().map(|d| d.id).collect();
        let second: Vec<String> = (&scan).into_iter().map(|d| d.id).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(second, first);
    }

    #[test]
    fn unknown_device_is_not_found() {
        let registry = registry(vec![small("a")]);
        assert_eq!(registry.start("zzz"), Err(PodError::DeviceNotFound("zzz".into())));
        assert!(!registry.is_started());
        assert!(matches!(registry.session(), Err(PodError::NotStarted)));
    }

    #[test]
    fn refused_connection_fails() {
        let device = small("a");
        device.refuse_connections(true);
        let registry = registry(vec![device]);
        assert!(matches!(registry.start("a"), Err(PodError::ConnectionFailed(_))));
        assert_eq!(registry.current_device(), None);
    }

    #[test]
    fn start_same_device_twice_is_noop() {
        let registry = registry(vec![small("a")]);
        registry.start("a").unwrap();
        let generation = registry.session().unwrap().generation();
        registry.start("a").unwrap();
        assert_eq!(registry.session().unwrap().generation(), generation);
        assert_eq!(registry.current_device().map(|d| d.id), Some("a".to_string()));
        registry.stop();
        assert!(!registry.is_started());
    }
}
