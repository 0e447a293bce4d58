//! Asynchronous path requests.
//!
//! A request is shared between three parties: the caller holds a
//! [`PathFuture`], one worker runs it, and the engine's update tick delivers
//! the result. Workers only ever write into the request's own scratch path;
//! the caller's path object is touched solely during delivery.
//!
//! ```text
//! Pending ─┬─> Active ─┬─> Complete
//!          │           ├─> Failed
//!          │           ├─> Cancelled
//!          │           └─> Invalidated
//!          ├─> Cancelled
//!          └─> Invalidated
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use glam::DVec3;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};
use web_time::Instant;

use crate::error::NavResult;
use crate::metrics::{LoadMetrics, RequestOutcome};
use crate::pathfinding::{NavigationPath, PathFailureInfo, PathfinderSettings};
use crate::region::RegionSnapshot;
use crate::types::RegionId;
use crate::volume::NavVolume;

/// Lifecycle state of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PathFindStatus {
  Pending = 0,
  Active = 1,
  Complete = 2,
  Failed = 3,
  Cancelled = 4,
  Invalidated = 5,
}

impl PathFindStatus {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => Self::Pending,
      1 => Self::Active,
      2 => Self::Complete,
      3 => Self::Failed,
      4 => Self::Cancelled,
      _ => Self::Invalidated,
    }
  }

  /// No further transitions.
  #[inline]
  pub fn is_terminal(self) -> bool {
    !matches!(self, Self::Pending | Self::Active)
  }

  fn outcome(self) -> RequestOutcome {
    match self {
      Self::Complete => RequestOutcome::Completed,
      Self::Cancelled => RequestOutcome::Cancelled,
      Self::Invalidated => RequestOutcome::Invalidated,
      _ => RequestOutcome::Failed,
    }
  }
}

/// Caller-assigned importance. Recorded and logged; queues stay FIFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestPriority {
  Critical,
  High,
  #[default]
  Normal,
  Low,
}

/// Completion callback, run from the engine's update tick.
pub type PathCallback = Box<dyn FnOnce(PathFindStatus) + Send + 'static>;

// =============================================================================
// Shared state
// =============================================================================

pub(crate) struct RequestState {
  pub(crate) id: u64,
  pub(crate) priority: RequestPriority,
  submitted: Instant,
  pub(crate) volume: Arc<NavVolume>,
  pub(crate) start: DVec3,
  pub(crate) goal: DVec3,
  settings: PathfinderSettings,
  /// Region versions at submission.
  pub(crate) snapshot: RegionSnapshot,

  cancelled: AtomicBool,
  invalidated: AtomicBool,
  status: AtomicU8,

  /// Worker-owned result, moved out on delivery.
  scratch: Mutex<Option<NavigationPath>>,
  failure: Mutex<Option<(String, Option<PathFailureInfo>)>>,

  resolved: Mutex<bool>,
  resolved_cv: Condvar,

  callback: Mutex<Option<PathCallback>>,
  destination: Weak<Mutex<NavigationPath>>,
}

impl RequestState {
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn new(
    id: u64,
    priority: RequestPriority,
    volume: Arc<NavVolume>,
    start: DVec3,
    goal: DVec3,
    settings: PathfinderSettings,
    destination: Weak<Mutex<NavigationPath>>,
    callback: Option<PathCallback>,
  ) -> Self {
    let snapshot = volume.snapshot_regions();
    Self {
      id,
      priority,
      submitted: Instant::now(),
      volume,
      start,
      goal,
      settings,
      snapshot,
      cancelled: AtomicBool::new(false),
      invalidated: AtomicBool::new(false),
      status: AtomicU8::new(PathFindStatus::Pending as u8),
      scratch: Mutex::new(None),
      failure: Mutex::new(None),
      resolved: Mutex::new(false),
      resolved_cv: Condvar::new(),
      callback: Mutex::new(callback),
      destination,
    }
  }

  #[inline]
  pub(crate) fn status(&self) -> PathFindStatus {
    PathFindStatus::from_u8(self.status.load(Ordering::Acquire))
  }

  pub(crate) fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  /// Flag the request as stale. Takes effect before it starts or when it
  /// finishes.
  pub(crate) fn invalidate(&self) {
    self.invalidated.store(true, Ordering::Release);
  }

  /// Whether the request snapshotted any of `regions`.
  pub(crate) fn depends_on(&self, regions: &[RegionId]) -> bool {
    self.snapshot.entries.iter().any(|(id, _)| regions.contains(id))
  }

  /// No region this request depends on changed since submission.
  pub(crate) fn is_current(&self) -> bool {
    !self.invalidated.load(Ordering::Acquire) && self.volume.versions().is_current(&self.snapshot)
  }

  fn resolve(&self, status: PathFindStatus) {
    self.status.store(status as u8, Ordering::Release);
    let mut resolved = self.resolved.lock();
    *resolved = true;
    self.resolved_cv.notify_all();
  }

  /// Downgrade a completed result that went stale before delivery.
  pub(crate) fn demote_to_invalidated(&self) {
    self.scratch.lock().take();
    self.status.store(PathFindStatus::Invalidated as u8, Ordering::Release);
  }

  pub(crate) fn take_result(&self) -> Option<NavigationPath> {
    self.scratch.lock().take()
  }

  pub(crate) fn take_callback(&self) -> Option<PathCallback> {
    self.callback.lock().take()
  }

  pub(crate) fn destination(&self) -> Option<Arc<Mutex<NavigationPath>>> {
    self.destination.upgrade()
  }
}

/// Run `state` on the calling worker and resolve it.
pub(crate) fn execute(state: &RequestState, metrics: &LoadMetrics) {
  execute_with(state, metrics, |state| {
    state.volume.find_path_sync(state.start, state.goal, &state.settings)
  });
}

/// [`execute`] with the search supplied by the caller. A panicking search
/// resolves the request as failed.
fn execute_with<F>(state: &RequestState, metrics: &LoadMetrics, search: F)
where
  F: FnOnce(&RequestState) -> NavResult<NavigationPath>,
{
  if state.cancelled.load(Ordering::Acquire) {
    metrics.request_dropped(RequestOutcome::Cancelled);
    trace!(request = state.id, "cancelled before start");
    state.resolve(PathFindStatus::Cancelled);
    return;
  }
  if state.invalidated.load(Ordering::Acquire) {
    metrics.request_dropped(RequestOutcome::Invalidated);
    trace!(request = state.id, "invalidated before start");
    state.resolve(PathFindStatus::Invalidated);
    return;
  }

  state.status.store(PathFindStatus::Active as u8, Ordering::Release);
  metrics.request_started();
  let started = Instant::now();

  let status = match catch_unwind(AssertUnwindSafe(|| search(state))) {
    Ok(Ok(path)) => {
      if state.cancelled.load(Ordering::Acquire) {
        PathFindStatus::Cancelled
      } else if !state.is_current() {
        PathFindStatus::Invalidated
      } else {
        *state.scratch.lock() = Some(path);
        PathFindStatus::Complete
      }
    }
    Ok(Err(err)) => {
      *state.failure.lock() = Some((err.to_string(), err.failure_info().cloned()));
      PathFindStatus::Failed
    }
    Err(payload) => {
      let message = format!("path search panicked: {}", panic_message(payload.as_ref()));
      error!(request = state.id, %message);
      *state.failure.lock() = Some((message, None));
      PathFindStatus::Failed
    }
  };

  let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
  metrics.request_finished(status.outcome(), elapsed_ms);
  debug!(
    request = state.id,
    priority = ?state.priority,
    ?status,
    elapsed_ms,
    queued_ms = started.duration_since(state.submitted).as_secs_f64() * 1000.0,
    "path request finished"
  );
  state.resolve(status);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "unknown panic"
  }
}

// =============================================================================
// PathFuture
// =============================================================================

/// Handle to an in-flight request.
///
/// Resolves on the worker; the path itself is written into the destination
/// during the engine's next update.
#[derive(Clone)]
pub struct PathFuture {
  state: Arc<RequestState>,
}

impl PathFuture {
  pub(crate) fn new(state: Arc<RequestState>) -> Self {
    Self { state }
  }

  pub fn id(&self) -> u64 {
    self.state.id
  }

  pub fn priority(&self) -> RequestPriority {
    self.state.priority
  }

  pub fn status(&self) -> PathFindStatus {
    self.state.status()
  }

  /// The worker has reached a terminal state.
  pub fn is_resolved(&self) -> bool {
    *self.state.resolved.lock()
  }

  /// Block until resolved.
  pub fn wait(&self) -> PathFindStatus {
    let mut resolved = self.state.resolved.lock();
    while !*resolved {
      self.state.resolved_cv.wait(&mut resolved);
    }
    drop(resolved);
    self.status()
  }

  /// Block until resolved or `timeout` passes. `None` on timeout.
  pub fn wait_timeout(&self, timeout: Duration) -> Option<PathFindStatus> {
    let deadline = std::time::Instant::now() + timeout;
    let mut resolved = self.state.resolved.lock();
    while !*resolved {
      if self.state.resolved_cv.wait_until(&mut resolved, deadline).timed_out() {
        break;
      }
    }
    let done = *resolved;
    drop(resolved);
    done.then(|| self.status())
  }

  /// Ask the request to stop. Honoured before the search starts and
  /// rechecked when it finishes; a running search is not interrupted.
  pub fn cancel(&self) {
    self.state.cancel();
  }

  pub fn failure_info(&self) -> Option<PathFailureInfo> {
    self.state.failure.lock().as_ref().and_then(|(_, info)| info.clone())
  }

  pub fn error_message(&self) -> Option<String> {
    self.state.failure.lock().as_ref().map(|(message, _)| message.clone())
  }
}

impl std::fmt::Debug for PathFuture {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PathFuture")
      .field("id", &self.state.id)
      .field("priority", &self.state.priority)
      .field("status", &self.status())
      .finish()
  }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;
