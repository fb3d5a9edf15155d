//! One device binding: its transport, model store and dispatcher.
//!
//! A session is constructed by the registry on `Start` and torn down on
//! `Stop` or when the link fails. Nothing in it outlives the binding except
//! the notifier, which belongs to the controller.

mod edit;
mod query;

pub use query::QueryReport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use podlink_types::{Notification, NotificationKind, Pod, SessionPhase};

use crate::command::{DeviceCommand, DeviceResponse};
use crate::config::SessionConfig;
use crate::dispatch::{DispatchHooks, Dispatcher};
use crate::error::{PodError, Result};
use crate::notify::Notifier;
use crate::router::{route_event, Routed};
use crate::store::ModelStore;
use crate::transport::{DeviceInfo, Transport};

/// Called with the session generation and a reason when the link fails.
pub(crate) type FaultHook = Arc<dyn Fn(u64, String) + Send + Sync>;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// The phase of a binding, published on every change.
pub(crate) struct PhaseCell {
    phase: Mutex<SessionPhase>,
    notifier: Arc<Notifier>,
}

impl PhaseCell {
    fn new(notifier: Arc<Notifier>) -> Self {
        Self {
            phase: Mutex::new(SessionPhase::Unbound),
            notifier,
        }
    }

    pub(crate) fn get(&self) -> SessionPhase {
        *lock(&self.phase)
    }

    /// Change the phase and post the change.
    fn update(&self, next: SessionPhase) {
        let mut phase = lock(&self.phase);
        if *phase != next {
            log::debug!(target: "session", "phase {:?} -> {:?}", *phase, next);
            *phase = next;
            self.notifier
                .post(Notification::host(NotificationKind::PhaseChanged(next)));
        }
    }

    fn set(&self, next: SessionPhase) {
        self.update(next);
        self.notifier.flush();
    }

    /// Ready and Busy follow the dispatcher's structural count. Other phases
    /// are left alone. Runs under the dispatcher's transition lock, so the
    /// change is only posted; the dispatcher's settle hook delivers it.
    fn busy(&self, busy: bool) {
        let current = self.get();
        match (current, busy) {
            (SessionPhase::Ready, true) => self.update(SessionPhase::Busy),
            (SessionPhase::Busy, false) => self.update(SessionPhase::Ready),
            _ => {}
        }
    }
}

pub struct Session {
    device: DeviceInfo,
    generation: u64,
    transport: Arc<dyn Transport>,
    store: Arc<ModelStore>,
    dispatcher: Dispatcher,
    notifier: Arc<Notifier>,
    phase: Arc<PhaseCell>,
    /// Held while an optimistic edit is applied and queued, so store order
    /// and wire order agree.
    submit: Mutex<()>,
    config: SessionConfig,
    closed: AtomicBool,
}

impl Session {
    /// Bind to the device behind `transport`: fetch its catalog, start the
    /// dispatcher and run the initial synchronization.
    pub(crate) fn open(
        transport: Arc<dyn Transport>,
        generation: u64,
        notifier: Arc<Notifier>,
        config: SessionConfig,
        on_fault: FaultHook,
    ) -> Result<Arc<Session>> {
        let device = transport.device();
        let phase = Arc::new(PhaseCell::new(Arc::clone(&notifier)));
        phase.set(SessionPhase::Starting);
        log::info!(target: "session", "binding {} ({})", device.id, device.name);

        let catalog = match transport.send(&DeviceCommand::QueryCatalog) {
            Ok(DeviceResponse::Catalog(catalog)) => Ok(catalog),
            Ok(DeviceResponse::Rejected(reason)) => Err(PodError::ConnectionFailed(reason)),
            Ok(other) => Err(PodError::ConnectionFailed(format!(
                "expected catalog, got {}",
                other.name()
            ))),
            Err(e) => Err(PodError::ConnectionFailed(e.to_string())),
        };
        let catalog = match catalog {
            Ok(catalog) => catalog,
            Err(e) => {
                transport.close();
                phase.set(SessionPhase::Unbound);
                return Err(e);
            }
        };
        log::debug!(target: "session", "{} runs firmware {}", device.id, catalog.firmware);

        let store = Arc::new(ModelStore::new(catalog, Arc::clone(&notifier)));

        let event_store = Arc::clone(&store);
        let event_fault = Arc::clone(&on_fault);
        transport.on_notification(Some(Arc::new(move |event| {
            if let Routed::ConnectionLost(reason) = route_event(&event_store, event) {
                event_fault(generation, reason);
            }
        })));

        let busy_phase = Arc::clone(&phase);
        let settle = Arc::clone(&notifier);
        let hooks = DispatchHooks {
            on_busy: Box::new(move |busy| busy_phase.busy(busy)),
            on_settled: Box::new(move || settle.flush()),
            on_fault: Box::new(move |err| on_fault(generation, err.to_string())),
        };
        let dispatcher = match Dispatcher::spawn(Arc::clone(&transport), hooks) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                transport.on_notification(None);
                transport.close();
                phase.set(SessionPhase::Unbound);
                return Err(PodError::ConnectionFailed(e.to_string()));
            }
        };

        let session = Arc::new(Session {
            device,
            generation,
            transport,
            store,
            dispatcher,
            notifier,
            phase,
            submit: Mutex::new(()),
            config,
            closed: AtomicBool::new(false),
        });

        session.phase.set(SessionPhase::Synchronizing);
        if let Err(e) = session.synchronize() {
            log::error!(target: "session", "initial sync with {} failed: {}", session.device.id, e);
            session.shutdown();
            return Err(e);
        }
        session.phase.set(SessionPhase::Ready);
        Ok(session)
    }

    /// Initial full refresh. Individual failures are tolerated; a lost link
    /// aborts.
    fn synchronize(&self) -> Result<()> {
        let steps: [(&str, &dyn Fn() -> Result<()>); 5] = [
            ("sets", &|| self.query_all_sets(false).map(|_| ())),
            ("presets", &|| self.query_all_presets(false).map(|_| ())),
            ("current set", &|| self.query_current_set_id(false)),
            ("current preset id", &|| self.query_current_preset_id(false)),
            ("current preset", &|| self.query_current_preset(true)),
        ];
        for (name, step) in steps {
            match step() {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::warn!(target: "session", "sync of {} incomplete: {}", name, e),
            }
        }
        self.notifier.publish(Notification::host(NotificationKind::InitDone));
        log::info!(target: "session", "{} synchronized", self.device.id);
        Ok(())
    }

    /// Release the binding: cancel queued commands, wait for the in-flight
    /// one, then close the transport. Idempotent.
    pub(crate) fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained = self.dispatcher.stop(self.config.drain_timeout);
        self.transport.on_notification(None);
        self.transport.close();
        if !drained {
            // closing the link unblocks the in-flight send
            self.dispatcher.join();
        }
        self.phase.set(SessionPhase::Unbound);
        log::info!(target: "session", "released {}", self.device.id);
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pod(&self) -> Arc<Pod> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Wait until every command submitted so far has resolved.
    pub fn flush(&self) -> Result<()> {
        self.dispatcher.flush()
    }

    pub fn structural_outstanding(&self) -> usize {
        self.dispatcher.structural_outstanding()
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() || self.dispatcher.is_stopped() {
            Err(PodError::DeviceStopped)
        } else {
            Ok(())
        }
    }
}
