//! Dynamic region regeneration and region versioning.
//!
//! Dynamic regions are force-materialized down to layer 0 during generation,
//! so regenerating one never changes the topology: only leaf masks and the
//! owning layer-0 nodes' `first_child` flip.
//!
//! # Flow
//!
//! ```text
//! collect_region_leaves     (read lock)   layer-0 nodes inside the region
//!          │
//!          ▼
//! rasterize_chunked         (no lock)     64 oracle queries per leaf, rayon
//!          │
//!          ▼
//! apply_results             (write lock)  overwrite masks, fix first_child
//!          │
//!          ▼
//! RegionVersions::bump                    one increment per region
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::warn;

use crate::collision::CollisionOracle;
use crate::constants::LEAF_SUBNODES;
use crate::error::{NavError, NavResult};
use crate::morton;
use crate::octree::{Aabb, GenerationParams, LeafNode, Link, OctreeStore};
pub use crate::types::RegionId;

// =============================================================================
// Versions
// =============================================================================

/// Per-region monotonic counters plus a structural epoch bumped by full
/// regeneration. Used only to detect stale in-flight work.
#[derive(Debug, Default)]
pub struct RegionVersions {
  versions: Mutex<FxHashMap<RegionId, u64>>,
  epoch: AtomicU64,
}

/// Region versions captured at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionSnapshot {
  pub epoch: u64,
  pub entries: SmallVec<[(RegionId, u64); 4]>,
}

impl RegionVersions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current version of `id` (0 if never regenerated).
  pub fn get(&self, id: RegionId) -> u64 {
    self.versions.lock().get(&id).copied().unwrap_or(0)
  }

  /// Increment `id` once, returning the new version.
  pub fn bump(&self, id: RegionId) -> u64 {
    let mut versions = self.versions.lock();
    let version = versions.entry(id).or_insert(0);
    *version += 1;
    *version
  }

  /// Increment the structural epoch (full regeneration or reload).
  pub fn bump_epoch(&self) -> u64 {
    self.epoch.fetch_add(1, Ordering::AcqRel) + 1
  }

  pub fn epoch(&self) -> u64 {
    self.epoch.load(Ordering::Acquire)
  }

  pub fn snapshot(&self, ids: impl IntoIterator<Item = RegionId>) -> RegionSnapshot {
    let versions = self.versions.lock();
    RegionSnapshot {
      epoch: self.epoch(),
      entries: ids
        .into_iter()
        .map(|id| (id, versions.get(&id).copied().unwrap_or(0)))
        .collect(),
    }
  }

  /// Regions whose version moved since `snapshot` was taken.
  pub fn stale_regions(&self, snapshot: &RegionSnapshot) -> Vec<RegionId> {
    let versions = self.versions.lock();
    snapshot
      .entries
      .iter()
      .filter(|(id, version)| versions.get(id).copied().unwrap_or(0) != *version)
      .map(|(id, _)| *id)
      .collect()
  }

  /// Nothing in `snapshot` changed, structure included.
  pub fn is_current(&self, snapshot: &RegionSnapshot) -> bool {
    snapshot.epoch == self.epoch() && self.stale_regions(snapshot).is_empty()
  }
}

/// Regeneration-complete notification.
#[derive(Clone, Debug, PartialEq)]
pub struct RegenEvent {
  pub regions: Vec<RegionId>,
  pub leaves_updated: usize,
  pub elapsed_ms: f64,
}

// =============================================================================
// Leaf collection and rasterization
// =============================================================================

/// A layer-0 node selected for re-rasterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafTarget {
  pub node_index: usize,
  pub code: u64,
}

/// Rasterized leaf waiting to be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafResult {
  pub node_index: usize,
  pub leaf: LeafNode,
}

/// Layer-0 nodes overlapped by `bounds`.
pub fn collect_region_leaves(store: &OctreeStore, bounds: &Aabb) -> Vec<LeafTarget> {
  store
    .geometry()
    .codes_overlapping(0, bounds)
    .into_iter()
    .filter_map(|code| {
      store
        .index_for_code(0, code)
        .map(|node_index| LeafTarget { node_index, code })
    })
    .collect()
}

/// Leaves of several regions, deduplicated and sorted by node index.
pub fn collect_regions_leaves(
  store: &OctreeStore,
  params: &GenerationParams,
  ids: &[RegionId],
) -> NavResult<Vec<LeafTarget>> {
  let mut targets = BTreeSet::new();
  for &id in ids {
    let bounds = params.dynamic_region(id).ok_or(NavError::RegionNotFound(id))?;
    targets.extend(collect_region_leaves(store, bounds));
  }
  Ok(targets.into_iter().collect())
}

/// Rasterize the leaf under the layer-0 node `code`.
///
/// The whole node is tested once first; a clear answer yields an empty mask
/// without any sub-voxel queries.
pub fn rasterize_leaf(params: &GenerationParams, code: u64, oracle: &dyn CollisionOracle) -> LeafNode {
  let geometry = params.geometry();
  let voxel = geometry.voxel_size(0);
  let centre = geometry.node_position(0, code);
  let mut leaf = LeafNode::EMPTY;

  if !oracle.is_leaf_blocked(centre, voxel * 0.5, params.collision_channel, params.agent_radius) {
    return leaf;
  }

  let origin = centre - DVec3::splat(voxel * 0.5);
  let sub_size = voxel * 0.25;
  for sub in 0..LEAF_SUBNODES as u8 {
    let c = morton::decode(sub as u64).as_dvec3();
    let position = origin + c * sub_size + DVec3::splat(sub_size * 0.5);
    if oracle.is_blocked(position, sub_size * 0.5, params.collision_channel, params.agent_radius) {
      leaf.set_blocked(sub);
    }
  }
  leaf
}

/// Rasterize `targets` in chunks of `chunk_size` on the rayon pool.
///
/// Holds no lock; the store is not touched.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "region::rasterize_chunked"))]
pub fn rasterize_chunked(
  params: &GenerationParams,
  targets: &[LeafTarget],
  oracle: &dyn CollisionOracle,
  chunk_size: usize,
) -> Vec<LeafResult> {
  targets
    .par_chunks(chunk_size.max(1))
    .flat_map_iter(|chunk| {
      chunk.iter().map(|target| LeafResult {
        node_index: target.node_index,
        leaf: rasterize_leaf(params, target.code, oracle),
      })
    })
    .collect()
}

/// Write rasterized leaves into the store. Returns the number applied.
///
/// A layer-0 node's `first_child` is valid iff its new mask is non-zero.
pub fn apply_results(store: &mut OctreeStore, results: &[LeafResult]) -> usize {
  let node_count = store.layer(0).len();
  if store.leaves.len() < node_count {
    store.leaves.resize(node_count, LeafNode::EMPTY);
  }

  let mut applied = 0;
  for result in results {
    let Some(node) = store.layers.first_mut().and_then(|l| l.get_mut(result.node_index)) else {
      warn!(index = result.node_index, "regenerated leaf index out of range, skipping");
      continue;
    };
    node.first_child = if result.leaf.is_empty() {
      Link::INVALID
    } else {
      Link::node(0, result.node_index as u32)
    };
    store.leaves[result.node_index] = result.leaf;
    applied += 1;
  }
  applied
}

/// Synchronously re-rasterize every leaf of `ids`. Does not bump versions.
pub fn regenerate_regions(
  store: &mut OctreeStore,
  params: &GenerationParams,
  ids: &[RegionId],
  oracle: &dyn CollisionOracle,
) -> NavResult<usize> {
  let targets = collect_regions_leaves(store, params, ids)?;
  let results: Vec<LeafResult> = targets
    .par_iter()
    .map(|target| LeafResult {
      node_index: target.node_index,
      leaf: rasterize_leaf(params, target.code, oracle),
    })
    .collect();
  Ok(apply_results(store, &results))
}

#[cfg(test)]
#[path = "region_test.rs"]
mod region_test;
