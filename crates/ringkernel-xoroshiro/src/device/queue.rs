//! Asynchronous execution queue.
//!
//! A FIFO of host-side jobs drained by one worker thread, standing in for a
//! device stream: work submitted on the same queue runs in submission order,
//! `submit` never waits for completion, and `synchronize` blocks until the
//! queue is idle.
//!
//! Dropping a queue abandons every job that has not started yet. Buffers those
//! jobs would have written keep unspecified contents.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use crate::error::{Result, RngError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the queue handle and its worker.
struct QueueShared {
    /// Jobs submitted but not yet finished (or skipped).
    pending: Mutex<usize>,
    /// Signalled whenever `pending` drops to zero.
    idle: Condvar,
    /// Set on drop; the worker skips what is left.
    abandoned: AtomicBool,
    /// Jobs run to completion.
    completed: AtomicU64,
}

impl QueueShared {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Ordered, asynchronous execution queue bound to one device.
pub struct ExecutionQueue {
    /// Ordinal of the owning device.
    device_ordinal: usize,
    /// Job channel; `None` once closed.
    sender: Option<Sender<Job>>,
    /// Shared bookkeeping.
    shared: Arc<QueueShared>,
    /// Worker thread.
    worker: Option<JoinHandle<()>>,
}

impl ExecutionQueue {
    /// Create a queue for the device with the given ordinal.
    pub(crate) fn new(device_ordinal: usize) -> Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let shared = Arc::new(QueueShared {
            pending: Mutex::new(0),
            idle: Condvar::new(),
            abandoned: AtomicBool::new(false),
            completed: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("xoroshiro-queue-{}", device_ordinal))
            .spawn(move || run_worker(receiver, worker_shared))
            .map_err(|e| RngError::BackendError(format!("Failed to spawn queue worker: {}", e)))?;

        debug!(device = device_ordinal, "Created execution queue");

        Ok(Self {
            device_ordinal,
            sender: Some(sender),
            shared,
            worker: Some(worker),
        })
    }

    /// Ordinal of the device this queue belongs to.
    pub fn device_ordinal(&self) -> usize {
        self.device_ordinal
    }

    /// Whether the queue still accepts work.
    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Jobs completed since creation.
    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Enqueue a job. Returns as soon as the job is queued.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RngError::InvalidQueue("queue is closed".to_string()))?;

        *self.shared.pending.lock() += 1;
        if sender.send(Box::new(job)).is_err() {
            self.shared.finish_one();
            return Err(RngError::InvalidQueue(
                "queue worker has exited".to_string(),
            ));
        }
        Ok(())
    }

    /// Block until every submitted job has finished.
    pub fn synchronize(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }

    /// Finish outstanding work and stop accepting new jobs.
    pub fn close(&mut self) {
        if let Some(sender) = self.sender.take() {
            drop(sender);
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    error!(device = self.device_ordinal, "Queue worker panicked");
                }
            }
            debug!(device = self.device_ordinal, "Closed execution queue");
        }
    }
}

impl Drop for ExecutionQueue {
    fn drop(&mut self) {
        let outstanding = self.pending();
        if outstanding > 0 {
            warn!(
                device = self.device_ordinal,
                outstanding, "Dropping queue with unfinished work"
            );
        }
        self.shared.abandoned.store(true, Ordering::Release);
        self.close();
    }
}

impl std::fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionQueue")
            .field("device_ordinal", &self.device_ordinal)
            .field("open", &self.is_open())
            .field("pending", &self.pending())
            .finish()
    }
}

fn run_worker(receiver: Receiver<Job>, shared: Arc<QueueShared>) {
    for job in receiver.iter() {
        if shared.abandoned.load(Ordering::Acquire) {
            trace!("Skipping abandoned queue job");
        } else if catch_unwind(AssertUnwindSafe(job)).is_ok() {
            shared.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            error!("Queue job panicked");
        }
        shared.finish_one();
    }
}
