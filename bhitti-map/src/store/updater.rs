//! Background updater for one map store.
//!
//! Each store owns a named worker thread fed through a depth-1
//! `crossbeam_channel`. Submitting while a frame is still pending pulls the
//! pending frame back out of the channel (drop-oldest), so at most one frame
//! waits and the submitter never blocks.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};

use crate::config::ScanSettings;
use crate::core::FrameSample;

use super::map_store::StoreShared;

/// Result of an asynchronous submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submitted {
    /// Queued behind nothing
    Queued,
    /// Queued, displacing a frame that had not started yet
    ReplacedPending,
    /// The store is shut down; the frame was dropped
    Closed,
}

/// A frame waiting for the updater.
pub(crate) struct Job {
    pub(crate) frame: Arc<FrameSample>,
    pub(crate) settings: Arc<ScanSettings>,
    pub(crate) generation: u64,
}

#[derive(Debug, Default)]
struct ProgressState {
    submitted: u64,
    finished: u64,
}

/// Counts submitted versus finished jobs so callers can wait for quiescence.
///
/// A job is finished when it is applied, skipped as stale, or dropped from
/// the queue.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    state: Mutex<ProgressState>,
    idle: Condvar,
}

impl Progress {
    pub(crate) fn begin(&self) {
        self.state.lock().submitted += 1;
    }

    pub(crate) fn finish(&self) {
        let mut state = self.state.lock();
        state.finished += 1;
        if state.finished >= state.submitted {
            self.idle.notify_all();
        }
    }

    /// Wait until every submitted job is finished. Returns false on timeout.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.finished < state.submitted {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.finished >= state.submitted;
            }
        }
        true
    }
}

/// Handle to a store's updater thread.
pub(crate) struct Updater {
    tx: Option<Sender<Job>>,
    pending: Receiver<Job>,
    thread: Option<JoinHandle<()>>,
}

impl Updater {
    /// Spawn the worker thread for `shared`.
    pub(crate) fn spawn(shared: Arc<StoreShared>) -> io::Result<Self> {
        let (tx, rx) = bounded::<Job>(1);
        let worker_rx = rx.clone();
        let name = format!("{}-map-updater", shared.policy.name);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::worker_loop(shared, worker_rx))?;

        debug!("Started {}", name);
        Ok(Self {
            tx: Some(tx),
            pending: rx,
            thread: Some(thread),
        })
    }

    /// Hand a frame to the worker, displacing a pending one if needed.
    pub(crate) fn submit(&self, job: Job, shared: &StoreShared) -> Submitted {
        let Some(tx) = &self.tx else {
            shared.record_dropped();
            return Submitted::Closed;
        };

        shared.progress.begin();
        let mut job = job;
        let mut replaced = false;
        loop {
            match tx.try_send(job) {
                Ok(()) => {
                    return if replaced {
                        Submitted::ReplacedPending
                    } else {
                        Submitted::Queued
                    };
                }
                Err(TrySendError::Full(returned)) => {
                    job = returned;
                    // The worker may take the pending job first; then the
                    // next try_send succeeds without displacing anything.
                    if let Ok(stale) = self.pending.try_recv() {
                        debug!(
                            "[{}] Dropped pending frame {}",
                            shared.policy.name, stale.frame.id
                        );
                        shared.record_dropped();
                        shared.progress.finish();
                        replaced = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    shared.record_dropped();
                    shared.progress.finish();
                    return Submitted::Closed;
                }
            }
        }
    }

    /// True while the worker accepts frames
    pub(crate) fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Stop accepting frames, let the worker drain the queue, and join it.
    pub(crate) fn stop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Map updater thread panicked");
        }
    }

    fn worker_loop(shared: Arc<StoreShared>, rx: Receiver<Job>) {
        let mut applied = 0u64;
        let mut stale = 0u64;

        while let Ok(job) = rx.recv() {
            match shared.apply(&job.frame, &job.settings, Some(job.generation)) {
                Some(_) => applied += 1,
                None => stale += 1,
            }
            shared.progress.finish();
        }

        info!(
            "[{}] Map updater exiting ({} frames applied, {} stale)",
            shared.policy.name, applied, stale
        );
    }
}

impl Drop for Updater {
    fn drop(&mut self) {
        self.stop();
    }
}
