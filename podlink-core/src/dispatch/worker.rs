use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::{Completion, Job, Shared};
use crate::command::DeviceResponse;
use crate::error::{PodError, Result};
use crate::transport::Transport;

pub(super) fn run(rx: Receiver<Job>, transport: Arc<dyn Transport>, shared: Arc<Shared>) {
    log::debug!(target: "dispatch", "worker started for {}", transport.device().id);
    while let Ok(job) = rx.recv() {
        match job {
            Job::Shutdown => break,
            Job::Barrier(done) => {
                let _ = done.send(());
            }
            Job::Command {
                command,
                complete,
                structural,
            } => {
                if shared.stopped.load(Ordering::SeqCst) {
                    resolve(&shared, structural, complete, Err(PodError::DeviceStopped));
                    continue;
                }

                log::trace!(target: "dispatch", "-> {}", command.name());
                match transport.send(&command) {
                    Ok(DeviceResponse::Rejected(reason)) => {
                        log::warn!(target: "dispatch", "{} rejected: {}", command.name(), reason);
                        resolve(&shared, structural, complete, Err(PodError::DeviceRejected(reason)));
                    }
                    Ok(response) => {
                        log::trace!(target: "dispatch", "<- {} for {}", response.name(), command.name());
                        resolve(&shared, structural, complete, Ok(response));
                    }
                    Err(err) => {
                        log::error!(target: "dispatch", "{} failed: {}", command.name(), err);
                        shared.stopped.store(true, Ordering::SeqCst);
                        resolve(
                            &shared,
                            structural,
                            complete,
                            Err(PodError::TransportError(err.clone())),
                        );
                        let shutdown = cancel_queued(&rx, &shared);
                        (shared.hooks.on_fault)(err);
                        if shutdown {
                            break;
                        }
                    }
                }
            }
        }
    }
    cancel_queued(&rx, &shared);
    log::debug!(target: "dispatch", "worker stopped");
}

/// Commit the outcome, then stop counting the command as outstanding, then
/// wake whoever waits on it.
fn resolve(shared: &Shared, structural: bool, complete: Completion, result: Result<DeviceResponse>) {
    let settled = complete(result);
    if structural {
        shared.release_structural();
    }
    if let Some(settled) = settled {
        settled();
    }
}

/// Fail every queued command with `DeviceStopped`. Returns whether a
/// shutdown request was among them.
fn cancel_queued(rx: &Receiver<Job>, shared: &Shared) -> bool {
    let mut shutdown = false;
    let mut cancelled = 0usize;
    for job in rx.try_iter() {
        match job {
            Job::Command {
                complete,
                structural,
                ..
            } => {
                resolve(shared, structural, complete, Err(PodError::DeviceStopped));
                cancelled += 1;
            }
            Job::Barrier(done) => {
                let _ = done.send(());
            }
            Job::Shutdown => shutdown = true,
        }
    }
    if cancelled > 0 {
        log::debug!(target: "dispatch", "cancelled {} queued commands", cancelled);
    }
    shutdown
}
