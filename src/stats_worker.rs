//! Off-thread evaluation of live stats.
//!
//! Requests and responses are plain value snapshots passed over channels, so
//! nothing mutable is shared with the worker. Responses are applied "last
//! wins" within the current generation; stopping or restarting a session
//! bumps the generation so anything still in flight is ignored.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::metrics::{self, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRequest {
    pub generation: u64,
    pub seq: u64,
    pub total_typed: usize,
    pub correct_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl StatsRequest {
    pub fn evaluate(&self) -> StatsResponse {
        StatsResponse {
            generation: self.generation,
            seq: self.seq,
            snapshot: metrics::compute(
                self.total_typed,
                self.correct_count,
                self.started_at,
                self.now,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsResponse {
    pub generation: u64,
    pub seq: u64,
    pub snapshot: StatsSnapshot,
}

/// Background thread answering [`StatsRequest`]s
pub struct StatsWorker {
    tx: Option<Sender<StatsRequest>>,
    rx: Receiver<StatsResponse>,
    handle: Option<JoinHandle<()>>,
}

impl StatsWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<StatsRequest>();
        let (resp_tx, resp_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("copycat-stats".into())
            .spawn(move || {
                for request in req_rx {
                    if resp_tx.send(request.evaluate()).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            tx: Some(req_tx),
            rx: resp_rx,
            handle: Some(handle),
        })
    }

    /// Hands the request back if the worker is gone
    pub fn request(&self, request: StatsRequest) -> Result<(), StatsRequest> {
        match &self.tx {
            Some(tx) => tx.send(request).map_err(|e| e.0),
            None => Err(request),
        }
    }

    pub fn try_recv(&self) -> Result<StatsResponse, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<StatsResponse, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for StatsWorker {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Produces the live [`StatsSnapshot`], on the worker when one is running
/// and synchronously otherwise.
pub struct StatsPublisher {
    worker: Option<StatsWorker>,
    generation: u64,
    seq: u64,
    applied_seq: u64,
    latest: StatsSnapshot,
}

impl std::fmt::Debug for StatsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsPublisher")
            .field("async", &self.is_async())
            .field("generation", &self.generation)
            .field("seq", &self.seq)
            .field("latest", &self.latest)
            .finish()
    }
}

impl StatsPublisher {
    pub fn sync() -> Self {
        Self {
            worker: None,
            generation: 0,
            seq: 0,
            applied_seq: 0,
            latest: StatsSnapshot::default(),
        }
    }

    /// Uses a background worker, or falls back to [`StatsPublisher::sync`]
    /// when the thread cannot be spawned.
    pub fn with_worker() -> Self {
        let mut publisher = Self::sync();
        match StatsWorker::spawn() {
            Ok(worker) => publisher.worker = Some(worker),
            Err(e) => warn!(error = %e, "stats worker unavailable, computing inline"),
        }
        publisher
    }

    pub fn is_async(&self) -> bool {
        self.worker.is_some()
    }

    pub fn latest(&self) -> StatsSnapshot {
        self.latest
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget everything in flight and show `snapshot` right away
    pub fn reset(&mut self, snapshot: StatsSnapshot) {
        self.generation += 1;
        self.seq = 0;
        self.applied_seq = 0;
        self.latest = snapshot;
    }

    /// Ask for fresh stats. Returns the new snapshot when it was computed
    /// inline.
    pub fn request(
        &mut self,
        total_typed: usize,
        correct_count: usize,
        started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<StatsSnapshot> {
        self.seq += 1;
        let request = StatsRequest {
            generation: self.generation,
            seq: self.seq,
            total_typed,
            correct_count,
            started_at,
            now,
        };

        let request = match &self.worker {
            Some(worker) => match worker.request(request) {
                Ok(()) => return None,
                Err(request) => {
                    warn!("stats worker disconnected, computing inline");
                    self.worker = None;
                    request
                }
            },
            None => request,
        };

        self.apply(request.evaluate()).then_some(self.latest)
    }

    /// Apply a response unless it belongs to an older generation or is older
    /// than what is already shown.
    pub fn apply(&mut self, response: StatsResponse) -> bool {
        if response.generation != self.generation || response.seq <= self.applied_seq {
            debug!(
                generation = response.generation,
                seq = response.seq,
                "dropping stale stats response"
            );
            return false;
        }
        self.applied_seq = response.seq;
        self.latest = response.snapshot;
        true
    }

    /// Drain worker responses. Returns the snapshot if it changed.
    pub fn poll(&mut self) -> Option<StatsSnapshot> {
        let mut changed = false;
        loop {
            let next = match &self.worker {
                Some(worker) => worker.try_recv(),
                None => break,
            };
            match next {
                Ok(response) => changed |= self.apply(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("stats worker exited, computing inline");
                    self.worker = None;
                    break;
                }
            }
        }
        changed.then_some(self.latest)
    }

    /// Block up to `timeout` for the next worker response and apply it
    pub fn wait(&mut self, timeout: Duration) -> Option<StatsSnapshot> {
        let response = self.worker.as_ref()?.recv_timeout(timeout).ok()?;
        self.apply(response).then_some(self.latest)
    }
}
