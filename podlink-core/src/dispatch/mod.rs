//! Command dispatcher: one ordered stream of commands per binding.
//!
//! Commands are queued on a channel and sent by a single worker thread,
//! stop-and-wait: the next command is not sent until the previous one has
//! been answered and its completion has run. Completions run on the worker,
//! so a command's effect on the store is applied before anything the next
//! command causes, and before the command stops counting as outstanding.

mod worker;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::command::{DeviceCommand, DeviceResponse};
use crate::error::{PodError, Result, TransportError};
use crate::transport::Transport;

/// Runs on the worker once the command has resolved, while the command still
/// counts as outstanding. The returned step, if any, runs after it no longer
/// does.
pub type Completion = Box<dyn FnOnce(Result<DeviceResponse>) -> Option<Settled> + Send + 'static>;

/// Second half of a [`Completion`].
pub type Settled = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum Job {
    Command {
        command: DeviceCommand,
        complete: Completion,
        /// Whether this job holds one unit of the structural count.
        structural: bool,
    },
    Barrier(Sender<()>),
    Shutdown,
}

/// Hooks the dispatcher calls from its worker thread.
pub struct DispatchHooks {
    /// Called with `true` when the first structural command is admitted and
    /// `false` when the last one resolves.
    pub on_busy: Box<dyn Fn(bool) + Send + Sync>,
    /// Called after every admission or release of a structural command,
    /// with no dispatcher lock held.
    pub on_settled: Box<dyn Fn() + Send + Sync>,
    /// Called once, after the link failed and the queue was cancelled.
    pub on_fault: Box<dyn Fn(TransportError) + Send + Sync>,
}

impl DispatchHooks {
    pub fn none() -> Self {
        Self {
            on_busy: Box::new(|_| {}),
            on_settled: Box::new(|| {}),
            on_fault: Box::new(|_| {}),
        }
    }
}

pub(crate) struct Shared {
    stopped: AtomicBool,
    structural: AtomicUsize,
    /// Held across a change of the structural count and its `on_busy` call,
    /// so hooks observe transitions in the order they happened.
    transition: Mutex<()>,
    hooks: DispatchHooks,
}

impl Shared {
    fn transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit_structural(&self) {
        {
            let _t = self.transition();
            if self.structural.fetch_add(1, Ordering::SeqCst) == 0 {
                (self.hooks.on_busy)(true);
            }
        }
        (self.hooks.on_settled)();
    }

    /// Admit only if nothing structural is outstanding.
    fn admit_exclusive(&self) -> bool {
        let admitted = {
            let _t = self.transition();
            let admitted = self
                .structural
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if admitted {
                (self.hooks.on_busy)(true);
            }
            admitted
        };
        if admitted {
            (self.hooks.on_settled)();
        }
        admitted
    }

    fn release_structural(&self) {
        {
            let _t = self.transition();
            if self.structural.fetch_sub(1, Ordering::SeqCst) == 1 {
                (self.hooks.on_busy)(false);
            }
        }
        (self.hooks.on_settled)();
    }
}

pub struct Dispatcher {
    tx: Sender<Job>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    done: Receiver<()>,
}

impl Dispatcher {
    pub fn spawn(transport: Arc<dyn Transport>, hooks: DispatchHooks) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (done_tx, done) = crossbeam_channel::bounded(0);
        let shared = Arc::new(Shared {
            stopped: AtomicBool::new(false),
            structural: AtomicUsize::new(0),
            transition: Mutex::new(()),
            hooks,
        });
        let thread_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("podlink-dispatch".to_string())
            .spawn(move || {
                worker::run(rx, transport, thread_shared);
                drop(done_tx);
            })?;
        Ok(Self {
            tx,
            shared,
            worker: Mutex::new(Some(worker)),
            done,
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Number of structural commands admitted and not yet resolved.
    pub fn structural_outstanding(&self) -> usize {
        self.shared.structural.load(Ordering::SeqCst)
    }

    /// Queue a command. `complete` runs on the worker with the outcome;
    /// device refusals arrive as `DeviceRejected`.
    pub fn submit(&self, command: DeviceCommand, complete: Completion) -> Result<()> {
        let structural = command.is_structural();
        if structural {
            self.shared.admit_structural();
        }
        self.enqueue(command, complete, structural)
    }

    /// Queue a structural command only if no other structural command is
    /// outstanding. The check and the admission are one atomic step; `build`
    /// runs after admission, so what it reads cannot be changed by another
    /// structural command before this one is sent.
    pub fn submit_exclusive<C>(&self, build: C) -> Result<()>
    where
        C: FnOnce() -> Result<(DeviceCommand, Completion)>,
    {
        if !self.shared.admit_exclusive() {
            return Err(PodError::DeviceBusy);
        }
        match build() {
            Ok((command, complete)) => self.enqueue(command, complete, true),
            Err(e) => {
                self.shared.release_structural();
                Err(e)
            }
        }
    }

    fn enqueue(&self, command: DeviceCommand, complete: Completion, structural: bool) -> Result<()> {
        if self.is_stopped() {
            if structural {
                self.shared.release_structural();
            }
            return Err(PodError::DeviceStopped);
        }
        log::trace!(target: "dispatch", "queued {}", command.name());
        let job = Job::Command {
            command,
            complete,
            structural,
        };
        if let Err(crossbeam_channel::SendError(job)) = self.tx.send(job) {
            if let Job::Command { structural: true, .. } = job {
                self.shared.release_structural();
            }
            return Err(PodError::DeviceStopped);
        }
        Ok(())
    }

    /// Queue a command and wait for `fold` to run on its response. Returns
    /// once the command no longer counts as outstanding.
    pub fn call<R, F>(&self, command: DeviceCommand, fold: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(DeviceResponse) -> Result<R> + Send + 'static,
    {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.submit(command, wait_for(reply, fold))?;
        rx.recv().unwrap_or(Err(PodError::DeviceStopped))
    }

    /// [`Dispatcher::call`] through [`Dispatcher::submit_exclusive`]. `build`
    /// returns the command together with the fold for its response.
    pub fn call_exclusive<R, C, F>(&self, build: C) -> Result<R>
    where
        R: Send + 'static,
        C: FnOnce() -> Result<(DeviceCommand, F)>,
        F: FnOnce(DeviceResponse) -> Result<R> + Send + 'static,
    {
        let (reply, rx) = crossbeam_channel::bounded(1);
        self.submit_exclusive(move || {
            build().map(|(command, fold)| (command, wait_for(reply, fold)))
        })?;
        rx.recv().unwrap_or(Err(PodError::DeviceStopped))
    }

    /// Wait until every command submitted before this call has resolved.
    pub fn flush(&self) -> Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Job::Barrier(tx))
            .map_err(|_| PodError::DeviceStopped)?;
        rx.recv().map_err(|_| PodError::DeviceStopped)
    }

    /// Cancel queued commands and stop the worker. The in-flight command, if
    /// any, is allowed to finish for up to `drain_timeout`. Returns false if
    /// it did not. Idempotent.
    pub fn stop(&self, drain_timeout: Duration) -> bool {
        self.shared.stopped.store(true, Ordering::SeqCst);
        let _ = self.tx.send(Job::Shutdown);

        let drained = !matches!(
            self.done.recv_timeout(drain_timeout),
            Err(crossbeam_channel::RecvTimeoutError::Timeout)
        );
        if drained {
            if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
                if worker.join().is_err() {
                    log::error!(target: "dispatch", "dispatch worker panicked");
                }
            }
        } else {
            log::warn!(target: "dispatch", "in-flight command did not finish within {:?}", drain_timeout);
        }
        drained
    }

    /// Join a worker that [`Dispatcher::stop`] left running.
    pub fn join(&self) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = worker.join();
        }
    }
}

fn wait_for<R, F>(reply: Sender<Result<R>>, fold: F) -> Completion
where
    R: Send + 'static,
    F: FnOnce(DeviceResponse) -> Result<R> + Send + 'static,
{
    Box::new(move |result| {
        let folded = result.and_then(fold);
        let settled: Settled = Box::new(move || {
            let _ = reply.send(folded);
        });
        Some(settled)
    })
}

/// Expect a bare acknowledgement.
pub fn expect_ack(response: DeviceResponse) -> Result<()> {
    match response {
        DeviceResponse::Ack => Ok(()),
        other => Err(unexpected("Ack", &other)),
    }
}

pub(crate) fn unexpected(expected: &'static str, got: &DeviceResponse) -> PodError {
    log::warn!(target: "dispatch", "expected {} response, got {}", expected, got.name());
    PodError::UnexpectedResponse { expected }
}
