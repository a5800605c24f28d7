//! # Terrain Worker Pool
//!
//! Fixed pool of OS threads serving terrain generation requests.
//!
//! ## Protocol
//!
//! Every request is a typed [`WorkerRequest`] tagged with a [`RequestId`].
//! Workers answer with the matching [`WorkerResponse`] variant; a collector
//! thread routes each reply back to the task awaiting it.
//!
//! ```text
//! submit() ──▶ job queue ──▶ worker 0..N ──▶ reply queue ──▶ collector
//!    │                                                          │
//!    └──────────── PendingReply (oneshot) ◀────────────────────┘
//! ```
//!
//! Workers only return plain data. Committing it to a cache is always the
//! caller's job.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use terravox_shared::{ColumnKey, ColumnResult, Patch, PatchKey, TerrainGenerator};
use tokio::sync::oneshot;

use crate::error::{TerrainError, TerrainResult};

/// Correlates a reply with its request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// A request for a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerRequest {
    /// Generate one patch.
    GeneratePatch(PatchKey),
    /// Top ground voxel of one column.
    PeakPosition(ColumnKey),
    /// Top ground voxels of many columns, in order.
    BlockBatch(Vec<ColumnKey>),
}

impl WorkerRequest {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GeneratePatch(_) => "generate_patch",
            Self::PeakPosition(_) => "peak_position",
            Self::BlockBatch(_) => "block_batch",
        }
    }
}

/// A worker's answer.
#[derive(Clone, Debug)]
pub enum WorkerResponse {
    /// Answer to `GeneratePatch`.
    Patch(Arc<Patch>),
    /// Answer to `PeakPosition`.
    Peak(ColumnResult),
    /// Answer to `BlockBatch`.
    Blocks(Vec<ColumnResult>),
}

type Reply = TerrainResult<WorkerResponse>;

struct Envelope {
    id: RequestId,
    request: WorkerRequest,
}

enum Job {
    Run(Envelope),
    Shutdown,
}

/// Worker pool counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Requests handed to the pool.
    pub submitted: AtomicU64,
    /// Requests answered successfully.
    pub completed: AtomicU64,
    /// Requests answered with an error.
    pub failed: AtomicU64,
}

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>>;

/// Awaitable reply to one submitted request.
#[derive(Debug)]
pub struct PendingReply {
    id: RequestId,
    receiver: oneshot::Receiver<Reply>,
}

impl PendingReply {
    /// Id of the request this reply answers.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns the worker's error, or `WorkerUnavailable` if the pool shut
    /// down before answering.
    pub async fn wait(self) -> TerrainResult<WorkerResponse> {
        self.receiver
            .await
            .unwrap_or(Err(TerrainError::WorkerUnavailable))
    }

    /// Waits for a `Patch` reply.
    ///
    /// # Errors
    ///
    /// As [`PendingReply::wait`], or `Protocol` on a mismatched reply.
    pub async fn patch(self) -> TerrainResult<Arc<Patch>> {
        match self.wait().await? {
            WorkerResponse::Patch(patch) => Ok(patch),
            other => Err(mismatch("patch", &other)),
        }
    }

    /// Waits for a `Peak` reply.
    ///
    /// # Errors
    ///
    /// As [`PendingReply::wait`], or `Protocol` on a mismatched reply.
    pub async fn peak(self) -> TerrainResult<ColumnResult> {
        match self.wait().await? {
            WorkerResponse::Peak(result) => Ok(result),
            other => Err(mismatch("peak", &other)),
        }
    }

    /// Waits for a `Blocks` reply.
    ///
    /// # Errors
    ///
    /// As [`PendingReply::wait`], or `Protocol` on a mismatched reply.
    pub async fn blocks(self) -> TerrainResult<Vec<ColumnResult>> {
        match self.wait().await? {
            WorkerResponse::Blocks(results) => Ok(results),
            other => Err(mismatch("blocks", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &WorkerResponse) -> TerrainError {
    TerrainError::Protocol(format!("expected {expected} reply, got {got:?}"))
}

/// Fixed-size terrain worker pool.
pub struct WorkerPool {
    jobs: Sender<Job>,
    pending: PendingMap,
    next_id: AtomicU64,
    stats: Arc<PoolStats>,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `threads` workers (minimum 1) serving `generator`.
    ///
    /// # Errors
    ///
    /// Returns `WorkerUnavailable` if a thread cannot be spawned.
    pub fn new(
        generator: Arc<dyn TerrainGenerator>,
        patch_size: u32,
        threads: usize,
    ) -> TerrainResult<Self> {
        let (jobs, job_rx) = unbounded::<Job>();
        let (reply_tx, reply_rx) = unbounded::<(RequestId, Reply)>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let stats = Arc::new(PoolStats::default());

        let collector = {
            let pending = Arc::clone(&pending);
            let stats = Arc::clone(&stats);
            std::thread::Builder::new()
                .name("terrain-collector".to_string())
                .spawn(move || collect(&reply_rx, &pending, &stats))
                .map_err(|_| TerrainError::WorkerUnavailable)?
        };

        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let generator = Arc::clone(&generator);
            let job_rx = job_rx.clone();
            let reply_tx = reply_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("terrain-worker-{index}"))
                .spawn(move || serve(&*generator, patch_size, &job_rx, &reply_tx))
                .map_err(|_| TerrainError::WorkerUnavailable)?;
            workers.push(handle);
        }

        tracing::info!("terrain worker pool started with {} threads", workers.len());

        Ok(Self {
            jobs,
            pending,
            next_id: AtomicU64::new(1),
            stats,
            workers,
            collector: Some(collector),
        })
    }

    /// Hands a request to the pool.
    ///
    /// Never blocks. If the pool is shutting down the reply resolves to
    /// `WorkerUnavailable`.
    pub fn submit(&self, request: WorkerRequest) -> PendingReply {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(id, sender);

        tracing::trace!("submit {} #{}", request.kind(), id.0);
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        if self.jobs.send(Job::Run(Envelope { id, request })).is_err() {
            // dropping the sender resolves the reply to WorkerUnavailable
            self.pending.lock().remove(&id);
        }
        PendingReply { id, receiver }
    }

    /// Pool counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Requests submitted but not yet answered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.jobs.send(Job::Shutdown);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        // every reply sender is gone now, so the collector drains and exits
        if let Some(collector) = self.collector.take() {
            let _ = collector.join();
        }
        tracing::debug!("terrain worker pool stopped");
    }
}

fn serve(
    generator: &dyn TerrainGenerator,
    patch_size: u32,
    jobs: &Receiver<Job>,
    replies: &Sender<(RequestId, Reply)>,
) {
    while let Ok(Job::Run(Envelope { id, request })) = jobs.recv() {
        let reply = catch_unwind(AssertUnwindSafe(|| handle(generator, patch_size, request)))
            .unwrap_or_else(|panic| Err(TerrainError::WorkerPanicked(panic_message(&*panic))));
        if replies.send((id, reply)).is_err() {
            break;
        }
    }
}

fn handle(generator: &dyn TerrainGenerator, patch_size: u32, request: WorkerRequest) -> Reply {
    let response = match request {
        WorkerRequest::GeneratePatch(key) => generator
            .generate_patch(key, patch_size)
            .map(|patch| WorkerResponse::Patch(Arc::new(patch))),
        WorkerRequest::PeakPosition(column) => {
            generator.peak_position(column).map(WorkerResponse::Peak)
        }
        WorkerRequest::BlockBatch(columns) => {
            generator.peak_batch(&columns).map(WorkerResponse::Blocks)
        }
    };
    response.map_err(TerrainError::from)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn collect(replies: &Receiver<(RequestId, Reply)>, pending: &PendingMap, stats: &PoolStats) {
    for (id, reply) in replies {
        let counter = if reply.is_ok() {
            &stats.completed
        } else {
            &stats.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let waiter = pending.lock().remove(&id);
        match waiter {
            // the receiver may have been dropped; nothing to do then
            Some(sender) => {
                let _ = sender.send(reply);
            }
            None => tracing::trace!("reply #{} has no waiter", id.0),
        }
    }
}
