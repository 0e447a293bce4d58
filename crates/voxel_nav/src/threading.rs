//! Fixed worker pool for path requests.
//!
//! Each worker owns its own `crossbeam-channel` queue; submissions are
//! dealt round-robin, so jobs on one worker run FIFO while jobs on
//! different workers may finish in any order.
//!
//! # Usage
//!
//! ```ignore
//! let pool = WorkerPool::new(2)?;
//!
//! // Queue work (non-blocking)
//! pool.submit(move || run_request(request))?;
//!
//! // Drains queued jobs and joins the threads
//! drop(pool);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{self as channel, Receiver, Sender};
use tracing::{debug, error};

use crate::error::{NavError, NavResult};

/// Upper bound on worker threads.
pub const MAX_WORKERS: usize = 16;

/// Boxed unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads with per-worker queues.
pub struct WorkerPool {
  senders: Vec<Sender<Job>>,
  handles: Vec<JoinHandle<()>>,
  next: AtomicUsize,
}

impl WorkerPool {
  /// Spawn `num_workers` threads (clamped to `1..=MAX_WORKERS`).
  pub fn new(num_workers: usize) -> NavResult<Self> {
    let count = num_workers.clamp(1, MAX_WORKERS);
    let mut senders = Vec::with_capacity(count);
    let mut handles = Vec::with_capacity(count);

    for index in 0..count {
      let (sender, receiver) = channel::unbounded::<Job>();
      let handle = std::thread::Builder::new()
        .name(format!("voxel-nav-worker-{index}"))
        .spawn(move || worker_loop(index, receiver))?;
      senders.push(sender);
      handles.push(handle);
    }

    debug!(workers = count, "worker pool started");
    Ok(Self {
      senders,
      handles,
      next: AtomicUsize::new(0),
    })
  }

  #[inline]
  pub fn num_workers(&self) -> usize {
    self.senders.len()
  }

  /// Queue `job` on the next worker in turn. Returns the worker index.
  pub fn submit<F>(&self, job: F) -> NavResult<usize>
  where
    F: FnOnce() + Send + 'static,
  {
    if self.senders.is_empty() {
      return Err(NavError::WorkerPool("pool has shut down".into()));
    }
    let worker = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
    self.submit_to(worker, job)?;
    Ok(worker)
  }

  /// Queue `job` on a specific worker.
  pub fn submit_to<F>(&self, worker: usize, job: F) -> NavResult<()>
  where
    F: FnOnce() + Send + 'static,
  {
    let sender = self
      .senders
      .get(worker)
      .ok_or_else(|| NavError::WorkerPool(format!("no worker {worker}")))?;
    sender
      .send(Box::new(job))
      .map_err(|_| NavError::WorkerPool(format!("worker {worker} has stopped")))
  }

  /// Jobs queued but not yet picked up, over all workers.
  pub fn queued(&self) -> usize {
    self.senders.iter().map(Sender::len).sum()
  }

  /// Stop accepting work, let queued jobs finish, and join every worker.
  pub fn shutdown(&mut self) {
    self.senders.clear();
    for handle in self.handles.drain(..) {
      if handle.join().is_err() {
        error!("worker thread terminated abnormally");
      }
    }
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    self.shutdown();
  }
}

fn worker_loop(index: usize, receiver: Receiver<Job>) {
  for job in receiver.iter() {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
      error!(worker = index, "job panicked");
    }
  }
  debug!(worker = index, "worker stopped");
}

#[cfg(test)]
#[path = "threading_test.rs"]
mod threading_test;
