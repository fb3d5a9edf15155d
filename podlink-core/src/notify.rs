//! Delivery of notifications to the single subscriber.
//!
//! The subscriber slot is owned by the controller and outlives device
//! bindings. Publishing is split in two: [`Notifier::post`] appends to an
//! ordered outbox and may be called under any lock, [`Notifier::flush`]
//! moves the outbox into the subscriber's bounded queue and is called with
//! no locks held. What happens when that queue is full is set by
//! [`Backpressure`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use podlink_types::Notification;

use crate::config::{Backpressure, NotifyConfig};

pub type NotifyHandler = Box<dyn Fn(Notification) + Send + 'static>;

struct Subscriber {
    tx: Sender<Notification>,
    /// Kept only under drop-oldest, to evict from the head of a full queue.
    evict: Option<Receiver<Notification>>,
    /// Thread running a callback subscriber.
    handler_thread: Option<ThreadId>,
}

pub struct Notifier {
    config: NotifyConfig,
    slot: Mutex<Option<Subscriber>>,
    outbox: Mutex<VecDeque<Notification>>,
    /// Held by the one thread moving the outbox into the queue.
    delivery: Mutex<()>,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
            outbox: Mutex::new(VecDeque::new()),
            delivery: Mutex::new(()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscriber>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn outbox(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channel(&self) -> (Sender<Notification>, Receiver<Notification>, Option<Receiver<Notification>>) {
        let (tx, rx) = crossbeam_channel::bounded(self.config.capacity);
        let evict = match self.config.backpressure {
            Backpressure::DropOldest => Some(rx.clone()),
            Backpressure::Block => None,
        };
        (tx, rx, evict)
    }

    /// Register a queue subscriber, replacing any previous one.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx, evict) = self.channel();
        *self.slot() = Some(Subscriber {
            tx,
            evict,
            handler_thread: None,
        });
        log::debug!(target: "notify", "subscriber registered");
        rx
    }

    /// Register a callback subscriber, replacing any previous one. The
    /// callback runs on its own thread, fed from the bounded queue, and may
    /// call back into the controller: notifications its own calls raise are
    /// queued behind the one it is handling. `None` unregisters.
    pub fn set_handler(self: &Arc<Self>, handler: Option<NotifyHandler>) {
        let Some(handler) = handler else {
            self.unsubscribe();
            return;
        };
        let (tx, rx, evict) = self.channel();
        let notifier = Arc::downgrade(self);
        let spawned = thread::Builder::new()
            .name("podlink-notify".to_string())
            .spawn(move || {
                for notification in rx.iter() {
                    handler(notification);
                    // hand over what the handler's own calls left behind
                    if let Some(notifier) = notifier.upgrade() {
                        notifier.flush();
                    }
                }
            });
        match spawned {
            Ok(worker) => {
                *self.slot() = Some(Subscriber {
                    tx,
                    evict,
                    handler_thread: Some(worker.thread().id()),
                });
                log::debug!(target: "notify", "handler registered");
            }
            Err(e) => {
                log::error!(target: "notify", "could not start notification thread: {}", e);
                self.unsubscribe();
            }
        }
    }

    pub fn unsubscribe(&self) {
        if self.slot().take().is_some() {
            log::debug!(target: "notify", "subscriber removed");
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot().is_some()
    }

    /// Queue a notification behind everything posted before it. Nothing
    /// reaches the subscriber until the next [`Notifier::flush`].
    pub fn post(&self, notification: Notification) {
        self.outbox().push_back(notification);
    }

    /// [`Notifier::post`] then [`Notifier::flush`].
    pub fn publish(&self, notification: Notification) {
        self.post(notification);
        self.flush();
    }

    /// Deliver posted notifications in posting order. Under
    /// [`Backpressure::Block`] this waits for room in the queue, so it must
    /// not be called while holding a lock the subscriber could need. If
    /// another thread is already delivering, that thread takes ours too.
    pub fn flush(&self) {
        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            let stalled = self.drain_outbox();
            drop(guard);
            // re-check: a post may have lost the race for the guard
            if stalled || self.outbox().is_empty() {
                return;
            }
        }
    }

    /// Returns true if delivery stopped at a full queue.
    fn drain_outbox(&self) -> bool {
        loop {
            let Some(notification) = self.outbox().pop_front() else {
                return false;
            };
            if let Err(notification) = self.deliver(notification) {
                self.outbox().push_front(notification);
                return true;
            }
        }
    }

    /// Hand one notification to the subscriber, if any. A callback
    /// subscriber's own thread never waits on its own queue: the
    /// notification is handed back and stays posted.
    fn deliver(&self, notification: Notification) -> Result<(), Notification> {
        let (tx, evict, own_thread) = match self.slot().as_ref() {
            Some(sub) => (
                sub.tx.clone(),
                sub.evict.clone(),
                sub.handler_thread == Some(thread::current().id()),
            ),
            None => return Ok(()),
        };

        match evict {
            Some(evict) => {
                let mut pending = notification;
                loop {
                    match tx.try_send(pending) {
                        Ok(()) => return Ok(()),
                        Err(TrySendError::Full(n)) => {
                            if evict.try_recv().is_ok() {
                                log::trace!(target: "notify", "queue full, dropped oldest");
                            }
                            pending = n;
                        }
                        Err(TrySendError::Disconnected(_)) => return Ok(()),
                    }
                }
            }
            None if own_thread => match tx.try_send(notification) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(n)) => Err(n),
                Err(TrySendError::Disconnected(_)) => {
                    self.release(&tx);
                    Ok(())
                }
            },
            None => {
                if tx.send(notification).is_err() {
                    // receiver dropped by the subscriber
                    self.release(&tx);
                }
                Ok(())
            }
        }
    }

    fn release(&self, stale: &Sender<Notification>) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|s| s.tx.same_channel(stale)) {
            *slot = None;
            log::debug!(target: "notify", "subscriber went away");
        }
    }
}
