//! Navigation engine: volume registry, async path requests and the update
//! tick.
//!
//! All object-lifetime work happens in [`NavEngine::update`], called once per
//! tick from the owning thread:
//!
//! ```text
//! update()
//!   ├─ process dirty regions of every volume
//!   ├─ invalidate delivered paths crossing regenerated regions
//!   ├─ deliver finished requests into live destinations, run callbacks
//!   └─ prune dropped destinations
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = NavEngine::new(EngineSettings::default())?;
//! let volume = engine.create_volume(params, oracle)?;
//!
//! let path = Arc::new(Mutex::new(NavigationPath::new()));
//! let future = engine.find_path_async(start, goal, None, RequestPriority::Normal, &path, None)?;
//!
//! // each tick
//! engine.update();
//! if path.lock().is_ready() { /* follow it */ }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glam::DVec3;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::collision::CollisionOracle;
use crate::error::{NavError, NavResult};
use crate::metrics::{LoadMetrics, RequestOutcome};
use crate::octree::GenerationParams;
use crate::pathfinding::{self, NavigationPath, PathfinderSettings};
use crate::region::RegenEvent;
use crate::request::{self, PathCallback, PathFindStatus, PathFuture, RequestPriority, RequestState};
use crate::settings::EngineSettings;
use crate::threading::WorkerPool;
use crate::types::VolumeId;
use crate::volume::NavVolume;

type PendingList = Arc<Mutex<Vec<Arc<RequestState>>>>;

pub struct NavEngine {
  settings: EngineSettings,
  metrics: Arc<LoadMetrics>,
  volumes: RwLock<Vec<Arc<NavVolume>>>,
  /// Volume -> listener handle registered on it.
  listeners: Mutex<FxHashMap<VolumeId, u64>>,
  pending: PendingList,
  regen_events: Arc<Mutex<Vec<RegenEvent>>>,
  delivered: Mutex<Vec<Weak<Mutex<NavigationPath>>>>,
  next_request: AtomicU64,
  pool: WorkerPool,
}

impl NavEngine {
  pub fn new(settings: EngineSettings) -> NavResult<Self> {
    let pool = WorkerPool::new(settings.effective_workers())?;
    info!(workers = pool.num_workers(), "navigation engine started");
    Ok(Self {
      settings,
      metrics: Arc::new(LoadMetrics::new()),
      volumes: RwLock::new(Vec::new()),
      listeners: Mutex::new(FxHashMap::default()),
      pending: Arc::new(Mutex::new(Vec::new())),
      regen_events: Arc::new(Mutex::new(Vec::new())),
      delivered: Mutex::new(Vec::new()),
      next_request: AtomicU64::new(1),
      pool,
    })
  }

  pub fn settings(&self) -> &EngineSettings {
    &self.settings
  }

  pub fn metrics(&self) -> &Arc<LoadMetrics> {
    &self.metrics
  }

  // ===========================================================================
  // Volumes
  // ===========================================================================

  /// Create, generate and register a volume sharing the engine's metrics.
  pub fn create_volume(
    &self,
    params: GenerationParams,
    oracle: Arc<dyn CollisionOracle>,
  ) -> NavResult<Arc<NavVolume>> {
    let volume = Arc::new(NavVolume::with_metrics(params, Arc::clone(&self.metrics)));
    volume.set_oracle(oracle);
    volume.generate()?;
    self.register_volume(Arc::clone(&volume));
    Ok(volume)
  }

  /// Start routing requests and regeneration events for `volume`.
  pub fn register_volume(&self, volume: Arc<NavVolume>) {
    let pending = Arc::downgrade(&self.pending);
    let events = Arc::downgrade(&self.regen_events);
    let handle = volume.add_regen_listener(Arc::new(move |event: &RegenEvent| {
      if let Some(pending) = pending.upgrade() {
        for state in pending.lock().iter() {
          if !state.status().is_terminal() && state.depends_on(&event.regions) {
            state.invalidate();
          }
        }
      }
      if let Some(events) = events.upgrade() {
        events.lock().push(event.clone());
      }
    }));

    self.listeners.lock().insert(volume.id(), handle);
    debug!(volume = volume.id().raw(), "volume registered");
    self.volumes.write().push(volume);
  }

  /// Stop tracking a volume. In-flight requests on it still finish.
  pub fn unregister_volume(&self, id: VolumeId) -> Option<Arc<NavVolume>> {
    let volume = {
      let mut volumes = self.volumes.write();
      let index = volumes.iter().position(|v| v.id() == id)?;
      volumes.remove(index)
    };
    if let Some(handle) = self.listeners.lock().remove(&id) {
      volume.remove_regen_listener(handle);
    }
    debug!(volume = id.raw(), "volume unregistered");
    Some(volume)
  }

  pub fn volumes(&self) -> Vec<Arc<NavVolume>> {
    self.volumes.read().clone()
  }

  /// First registered volume containing `position`.
  pub fn volume_for_position(&self, position: DVec3) -> NavResult<Arc<NavVolume>> {
    self
      .volumes
      .read()
      .iter()
      .find(|v| v.contains(position))
      .cloned()
      .ok_or(NavError::NoVolume(position))
  }

  // ===========================================================================
  // Pathfinding
  // ===========================================================================

  /// Search on the calling thread. `settings` defaults to the engine's.
  pub fn find_path_sync(
    &self,
    start: DVec3,
    goal: DVec3,
    settings: Option<&PathfinderSettings>,
  ) -> NavResult<NavigationPath> {
    let volume = self.volume_for_position(start)?;
    volume.find_path_sync(start, goal, settings.unwrap_or(&self.settings.pathfinder))
  }

  /// Queue a search on the worker pool.
  ///
  /// Start and goal are resolved up front so bad input fails here rather than
  /// on a worker. The result is written into `destination` by a later
  /// [`NavEngine::update`]; if `destination` has been dropped by then the
  /// result is discarded. `destination` is never touched unless the request
  /// completes.
  pub fn find_path_async(
    &self,
    start: DVec3,
    goal: DVec3,
    settings: Option<PathfinderSettings>,
    priority: RequestPriority,
    destination: &Arc<Mutex<NavigationPath>>,
    callback: Option<PathCallback>,
  ) -> NavResult<PathFuture> {
    let volume = self.volume_for_position(start)?;
    {
      let store = volume.store();
      pathfinding::resolve_link(&store, start)?;
      pathfinding::resolve_link(&store, goal)?;
    }

    if self.metrics.should_throttle_new_requests() {
      debug!(
        pending = self.metrics.pending_pathfinds(),
        delay = self.metrics.recommended_delay(),
        "navigation under load, request queued anyway"
      );
    } else if self.metrics.active_pathfinds() >= self.settings.max_concurrent_pathfinds {
      debug!(active = self.metrics.active_pathfinds(), "concurrent request cap reached");
    }

    let id = self.next_request.fetch_add(1, Ordering::Relaxed);
    let state = Arc::new(RequestState::new(
      id,
      priority,
      volume,
      start,
      goal,
      settings.unwrap_or(self.settings.pathfinder),
      Arc::downgrade(destination),
      callback,
    ));

    self.pending.lock().push(Arc::clone(&state));
    self.metrics.request_queued();

    let job = Arc::clone(&state);
    let metrics = Arc::clone(&self.metrics);
    match self.pool.submit(move || request::execute(&job, &metrics)) {
      Ok(worker) => {
        debug!(request = id, ?priority, worker, "path request queued");
        Ok(PathFuture::new(state))
      }
      Err(err) => {
        self.pending.lock().retain(|s| !Arc::ptr_eq(s, &state));
        self.metrics.request_dropped(RequestOutcome::Failed);
        Err(err)
      }
    }
  }

  /// The single delivery point. Returns how many results were written into
  /// live destinations.
  pub fn update(&self) -> usize {
    for volume in self.volumes() {
      if let Err(err) = volume.process_dirty_regions(&self.settings.regen) {
        warn!(volume = volume.id().raw(), %err, "dirty region regeneration failed");
      }
    }

    let events: Vec<RegenEvent> = std::mem::take(&mut *self.regen_events.lock());
    if !events.is_empty() {
      let mut invalidated = 0;
      for weak in self.delivered.lock().iter() {
        let Some(path) = weak.upgrade() else { continue };
        let mut path = path.lock();
        if events.iter().any(|e| path.check_invalidation(&e.regions)) {
          invalidated += 1;
        }
      }
      if invalidated > 0 {
        debug!(paths = invalidated, "delivered paths invalidated by regeneration");
      }
    }

    let finished: Vec<Arc<RequestState>> = {
      let mut pending = self.pending.lock();
      let (done, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(|s| s.status().is_terminal());
      *pending = waiting;
      done
    };

    let mut delivered = 0;
    for state in finished {
      if state.status() == PathFindStatus::Complete && !state.is_current() {
        state.demote_to_invalidated();
      }
      let status = state.status();

      if status == PathFindStatus::Complete {
        match (state.destination(), state.take_result()) {
          (Some(destination), Some(mut result)) => {
            result.set_ready();
            *destination.lock() = result;
            let weak = Arc::downgrade(&destination);
            let mut tracked = self.delivered.lock();
            if !tracked.iter().any(|w| w.ptr_eq(&weak)) {
              tracked.push(weak);
            }
            delivered += 1;
          }
          (None, _) => debug!(request = state.id, "requester dropped, result discarded"),
          (Some(_), None) => warn!(request = state.id, "completed request has no result"),
        }
      }

      if let Some(callback) = state.take_callback() {
        callback(status);
      }
    }

    self.delivered.lock().retain(|weak| weak.strong_count() > 0);
    delivered
  }

  /// Cancel every request not yet delivered. Returns how many were flagged.
  pub fn cancel_all_pending(&self) -> usize {
    let pending = self.pending.lock();
    for state in pending.iter() {
      state.cancel();
    }
    if !pending.is_empty() {
      debug!(count = pending.len(), "pending path requests cancelled");
    }
    pending.len()
  }

  /// Requests submitted but not yet delivered.
  pub fn pending_count(&self) -> usize {
    self.pending.lock().len()
  }

  /// Delivered paths still alive and tracked for invalidation.
  pub fn tracked_path_count(&self) -> usize {
    self.delivered.lock().iter().filter(|w| w.strong_count() > 0).count()
  }

  #[cfg(test)]
  pub(crate) fn pool(&self) -> &WorkerPool {
    &self.pool
  }
}

impl Drop for NavEngine {
  fn drop(&mut self) {
    self.cancel_all_pending();
    self.pool.shutdown();
    for (id, handle) in self.listeners.lock().drain() {
      if let Some(volume) = self.volumes.read().iter().find(|v| v.id() == id) {
        volume.remove_regen_listener(handle);
      }
    }
    info!("navigation engine stopped");
  }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
