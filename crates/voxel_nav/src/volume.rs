//! A navigation volume: one octree, its parameters and its dynamic regions.
//!
//! The store sits behind a reader-writer lock. Pathfinding takes the read
//! side; generation and regeneration take the write side, the asynchronous
//! path only for the final apply.
//!
//! # Usage
//!
//! ```ignore
//! let volume = Arc::new(NavVolume::new(params));
//! volume.set_oracle(oracle);
//! volume.generate()?;
//!
//! volume.request_region_regen(door_region)?;
//! volume.process_dirty_regions(&RegenSettings::default())?; // from the update tick
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::collision::CollisionOracle;
use crate::debug_draw::{DebugDrawSink, NoDebugDraw};
use crate::error::{NavError, NavResult};
use crate::generation;
use crate::metrics::LoadMetrics;
use crate::octree::{Aabb, GenerationParams, OctreeGeometry, OctreeStore, StoreStats};
use crate::pathfinding::{self, NavigationPath, PathfinderSettings};
use crate::persistence;
use crate::region::{self, RegenEvent, RegionSnapshot, RegionVersions};
use crate::settings::RegenSettings;
use crate::types::{RegionId, VolumeId};

/// Called after every completed regeneration.
pub type RegenListener = Arc<dyn Fn(&RegenEvent) + Send + Sync>;

/// Completion hook of [`NavVolume::regenerate_regions_async`].
pub type RegenCallback = Box<dyn FnOnce(NavResult<RegenEvent>) + Send + 'static>;

#[derive(Default)]
struct RegenState {
  /// Region -> first time it was marked dirty.
  dirty: FxHashMap<RegionId, Instant>,
  last_regen: Option<Instant>,
}

pub struct NavVolume {
  id: VolumeId,
  params: RwLock<GenerationParams>,
  store: RwLock<OctreeStore>,
  versions: RegionVersions,
  oracle: RwLock<Option<Arc<dyn CollisionOracle>>>,
  ready: AtomicBool,
  needs_regeneration: AtomicBool,
  regen: Mutex<RegenState>,
  listeners: RwLock<Vec<(u64, RegenListener)>>,
  next_listener: AtomicU64,
  metrics: Arc<LoadMetrics>,
}

impl NavVolume {
  pub fn new(params: GenerationParams) -> Self {
    Self::with_metrics(params, Arc::new(LoadMetrics::new()))
  }

  /// Volume reporting into shared metrics.
  pub fn with_metrics(params: GenerationParams, metrics: Arc<LoadMetrics>) -> Self {
    let geometry = params.geometry();
    Self {
      id: VolumeId::new(),
      params: RwLock::new(params),
      store: RwLock::new(OctreeStore::new(geometry)),
      versions: RegionVersions::new(),
      oracle: RwLock::new(None),
      ready: AtomicBool::new(false),
      needs_regeneration: AtomicBool::new(true),
      regen: Mutex::new(RegenState::default()),
      listeners: RwLock::new(Vec::new()),
      next_listener: AtomicU64::new(1),
      metrics,
    }
  }

  #[inline]
  pub fn id(&self) -> VolumeId {
    self.id
  }

  /// Copy of the current parameters.
  pub fn params(&self) -> GenerationParams {
    self.params.read().clone()
  }

  pub fn geometry(&self) -> OctreeGeometry {
    self.params.read().geometry()
  }

  pub fn bounds(&self) -> Aabb {
    self.geometry().bounds()
  }

  pub fn contains(&self, position: DVec3) -> bool {
    self.bounds().contains_point(position)
  }

  pub fn set_oracle(&self, oracle: Arc<dyn CollisionOracle>) {
    *self.oracle.write() = Some(oracle);
  }

  fn oracle(&self) -> NavResult<Arc<dyn CollisionOracle>> {
    self
      .oracle
      .read()
      .clone()
      .ok_or_else(|| NavError::GenerationMisconfigured("no collision oracle set".into()))
  }

  /// Holds generated or loaded data.
  pub fn is_ready(&self) -> bool {
    self.ready.load(Ordering::Acquire)
  }

  /// Data is missing, was loaded from a legacy format, or the region layout
  /// changed since the last generation.
  pub fn needs_regeneration(&self) -> bool {
    self.needs_regeneration.load(Ordering::Acquire)
  }

  /// Shared read access to the store.
  pub fn store(&self) -> RwLockReadGuard<'_, OctreeStore> {
    self.store.read()
  }

  pub fn versions(&self) -> &RegionVersions {
    &self.versions
  }

  pub fn metrics(&self) -> &Arc<LoadMetrics> {
    &self.metrics
  }

  pub fn stats(&self) -> StoreStats {
    self.store.read().stats()
  }

  pub fn is_position_navigable(&self, position: DVec3) -> bool {
    self.store.read().is_position_navigable(position)
  }

  /// Versions of every registered region.
  pub fn snapshot_regions(&self) -> RegionSnapshot {
    let ids = self.params.read().region_ids();
    self.versions.snapshot(ids)
  }

  // ===========================================================================
  // Generation
  // ===========================================================================

  /// Build the octree from scratch with the configured oracle.
  pub fn generate(&self) -> NavResult<StoreStats> {
    self.generate_with_debug(&NoDebugDraw)
  }

  pub fn generate_with_debug(&self, debug_sink: &dyn DebugDrawSink) -> NavResult<StoreStats> {
    let oracle = self.oracle()?;
    let params = self.params();
    let store = generation::generate(&params, &*oracle, debug_sink)?;
    let stats = store.stats();

    {
      let _scope = self.metrics.write_lock_scope();
      *self.store.write() = store;
    }
    self.versions.bump_epoch();
    self.regen.lock().dirty.clear();
    self.ready.store(true, Ordering::Release);
    self.needs_regeneration.store(false, Ordering::Release);

    info!(volume = self.id.raw(), nodes = stats.nodes, leaves = stats.leaves, "volume generated");
    Ok(stats)
  }

  // ===========================================================================
  // Dynamic regions
  // ===========================================================================

  /// Insert or move a region. A change only takes effect in the topology
  /// after the next [`NavVolume::generate`].
  pub fn add_dynamic_region(&self, id: RegionId, bounds: Aabb) -> bool {
    let changed = self.params.write().add_dynamic_region(id, bounds);
    if changed {
      self.needs_regeneration.store(true, Ordering::Release);
    }
    changed
  }

  pub fn remove_dynamic_region(&self, id: RegionId) -> Option<Aabb> {
    self.regen.lock().dirty.remove(&id);
    self.params.write().remove_dynamic_region(id)
  }

  pub fn clear_dynamic_regions(&self) {
    self.regen.lock().dirty.clear();
    self.params.write().clear_dynamic_regions();
  }

  pub fn dynamic_region_ids(&self) -> Vec<RegionId> {
    self.params.read().region_ids()
  }

  /// Regenerate one region with the configured oracle.
  pub fn regenerate_region(&self, id: RegionId) -> NavResult<RegenEvent> {
    let oracle = self.oracle()?;
    self.regenerate_region_with(id, &*oracle)
  }

  /// Regenerate one region and bump its version under the write lock, then
  /// notify listeners.
  pub fn regenerate_region_with(&self, id: RegionId, oracle: &dyn CollisionOracle) -> NavResult<RegenEvent> {
    let start = Instant::now();
    let params = self.params();
    if params.dynamic_region(id).is_none() {
      return Err(NavError::RegionNotFound(id));
    }

    self.metrics.regen_queued(1);
    let leaves_updated = {
      let _scope = self.metrics.write_lock_scope();
      let mut store = self.store.write();
      let updated = region::regenerate_regions(&mut store, &params, &[id], oracle);
      // Readers see new leaves and the new version together.
      if updated.is_ok() {
        self.versions.bump(id);
      }
      updated
    };
    let leaves_updated = match leaves_updated {
      Ok(n) => n,
      Err(err) => {
        self.metrics.regen_finished(1, 0.0);
        return Err(err);
      }
    };

    let event = RegenEvent {
      regions: vec![id],
      leaves_updated,
      elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    self.metrics.regen_finished(1, event.elapsed_ms);
    self.on_regenerated(&event);
    Ok(event)
  }

  /// Regenerate `ids` in the background.
  ///
  /// Leaves are collected under the read lock and rasterized on rayon in
  /// chunks without any lock; the write lock is taken once to apply. If the
  /// volume was regenerated from scratch in the meantime the results are
  /// discarded and `on_complete` receives [`NavError::Invalidated`].
  pub fn regenerate_regions_async(
    self: &Arc<Self>,
    ids: Vec<RegionId>,
    chunk_size: usize,
    on_complete: Option<RegenCallback>,
  ) -> NavResult<()> {
    let oracle = self.oracle()?;
    let params = self.params();
    let targets = region::collect_regions_leaves(&self.store.read(), &params, &ids)?;
    let epoch = self.versions.epoch();
    let start = Instant::now();
    self.metrics.regen_queued(ids.len());
    debug!(volume = self.id.raw(), regions = ids.len(), leaves = targets.len(), "async regeneration queued");

    let volume = Arc::clone(self);
    rayon::spawn(move || {
      let results = region::rasterize_chunked(&params, &targets, &*oracle, chunk_size);

      let applied = {
        let _scope = volume.metrics.write_lock_scope();
        let mut store = volume.store.write();
        (volume.versions.epoch() == epoch).then(|| {
          let updated = region::apply_results(&mut store, &results);
          for &id in &ids {
            volume.versions.bump(id);
          }
          updated
        })
      };
      let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
      volume.metrics.regen_finished(ids.len(), elapsed_ms);

      let Some(leaves_updated) = applied else {
        warn!(volume = volume.id.raw(), "volume rebuilt during async regeneration, results discarded");
        if let Some(callback) = on_complete {
          callback(Err(NavError::Invalidated));
        }
        return;
      };

      let event = RegenEvent {
        regions: ids,
        leaves_updated,
        elapsed_ms,
      };
      volume.on_regenerated(&event);
      if let Some(callback) = on_complete {
        callback(Ok(event));
      }
    });
    Ok(())
  }

  /// Mark a region for deferred regeneration.
  pub fn request_region_regen(&self, id: RegionId) -> NavResult<()> {
    if self.params.read().dynamic_region(id).is_none() {
      return Err(NavError::RegionNotFound(id));
    }
    self.regen.lock().dirty.entry(id).or_insert_with(Instant::now);
    Ok(())
  }

  pub fn dirty_region_count(&self) -> usize {
    self.regen.lock().dirty.len()
  }

  /// Dispatch one async regeneration for regions dirty long enough.
  ///
  /// Does nothing within `cooldown_secs` of the last regeneration. Returns the
  /// dispatched regions.
  pub fn process_dirty_regions(self: &Arc<Self>, settings: &RegenSettings) -> NavResult<Vec<RegionId>> {
    let now = Instant::now();
    let ready: Vec<RegionId> = {
      let mut regen = self.regen.lock();
      if regen.dirty.is_empty() {
        return Ok(Vec::new());
      }
      if let Some(last) = regen.last_regen {
        if now.duration_since(last).as_secs_f64() < settings.cooldown_secs {
          return Ok(Vec::new());
        }
      }
      let mut ready: Vec<RegionId> = regen
        .dirty
        .iter()
        .filter(|(_, since)| now.duration_since(**since).as_secs_f64() >= settings.dirty_delay_secs)
        .map(|(id, _)| *id)
        .collect();
      ready.sort_unstable();
      for id in &ready {
        regen.dirty.remove(id);
      }
      ready
    };

    if ready.is_empty() {
      return Ok(ready);
    }
    self.regenerate_regions_async(ready.clone(), settings.effective_chunk_size(), None)?;
    Ok(ready)
  }

  /// Register a regeneration listener. Returns a handle for removal.
  pub fn add_regen_listener(&self, listener: RegenListener) -> u64 {
    let handle = self.next_listener.fetch_add(1, Ordering::Relaxed);
    self.listeners.write().push((handle, listener));
    handle
  }

  pub fn remove_regen_listener(&self, handle: u64) {
    self.listeners.write().retain(|(h, _)| *h != handle);
  }

  /// Record a completed regeneration and notify listeners.
  pub fn on_regenerated(&self, event: &RegenEvent) {
    self.regen.lock().last_regen = Some(Instant::now());
    debug!(
      volume = self.id.raw(),
      regions = event.regions.len(),
      leaves = event.leaves_updated,
      elapsed_ms = event.elapsed_ms,
      "regions regenerated"
    );
    let listeners: Vec<RegenListener> = self.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect();
    for listener in listeners {
      listener(event);
    }
  }

  // ===========================================================================
  // Pathfinding
  // ===========================================================================

  /// Search under the read lock. The result records the regions it crosses.
  pub fn find_path_sync(&self, start: DVec3, goal: DVec3, settings: &PathfinderSettings) -> NavResult<NavigationPath> {
    let mut path = {
      let store = self.store.read();
      pathfinding::find_path(&store, start, goal, settings)?
    };
    path.record_traversed_regions(&self.params.read());
    Ok(path)
  }

  // ===========================================================================
  // Persistence
  // ===========================================================================

  pub fn save(&self, path: &Path) -> NavResult<()> {
    let params = self.params();
    let store = self.store.read();
    persistence::save_to_file(path, &store, &params)
  }

  /// Replace the store and parameters with saved data. Returns whether the
  /// data should be regenerated.
  pub fn load(&self, path: &Path) -> NavResult<bool> {
    let loaded = persistence::load_from_file(path, &self.params())?;
    {
      let _scope = self.metrics.write_lock_scope();
      let mut store = self.store.write();
      *self.params.write() = loaded.params;
      *store = loaded.store;
    }
    self.versions.bump_epoch();
    self.regen.lock().dirty.clear();
    self.ready.store(true, Ordering::Release);
    self
      .needs_regeneration
      .store(loaded.needs_regeneration, Ordering::Release);
    Ok(loaded.needs_regeneration)
  }
}

impl std::fmt::Debug for NavVolume {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NavVolume")
      .field("id", &self.id)
      .field("ready", &self.is_ready())
      .field("bounds", &self.bounds())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
