//! A* search over octree links.
//!
//! The open set is a binary min-heap keyed by f-score with an `open` hash
//! set rejecting duplicate insertions. A link is pushed once per stay in the
//! open set; its key is the f-score at insertion time. Popping a link that
//! is already closed is skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use super::path::{NavigationPath, PathFailureInfo, PathPoint};
use super::postprocess;
use super::settings::PathfinderSettings;
use crate::error::{NavError, NavResult};
use crate::octree::{Link, OctreeStore};

/// Iterations between progress traces.
const PROGRESS_INTERVAL: usize = 100;

/// Heap entry ordered so that the lowest f-score pops first.
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
  f_score: f64,
  link: Link,
}

impl PartialEq for OpenEntry {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for OpenEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .f_score
      .total_cmp(&self.f_score)
      .then_with(|| other.link.cmp(&self.link))
  }
}

/// Reusable A* state bound to one store.
///
/// Only ever reads the store; callers hold the volume's read lock for the
/// lifetime of the finder.
pub struct PathFinder<'a> {
  store: &'a OctreeStore,
  settings: PathfinderSettings,

  open_heap: BinaryHeap<OpenEntry>,
  open: FxHashSet<Link>,
  closed: FxHashSet<Link>,
  came_from: FxHashMap<Link, Link>,
  g_score: FxHashMap<Link, f64>,
  neighbours: Vec<Link>,

  goal: Link,
  last_iterations: usize,
}

impl<'a> PathFinder<'a> {
  pub fn new(store: &'a OctreeStore, settings: PathfinderSettings) -> Self {
    Self {
      store,
      settings,
      open_heap: BinaryHeap::new(),
      open: FxHashSet::default(),
      closed: FxHashSet::default(),
      came_from: FxHashMap::default(),
      g_score: FxHashMap::default(),
      neighbours: Vec::with_capacity(32),
      goal: Link::INVALID,
      last_iterations: 0,
    }
  }

  #[inline]
  pub fn settings(&self) -> &PathfinderSettings {
    &self.settings
  }

  /// Iterations used by the most recent search.
  #[inline]
  pub fn last_iterations(&self) -> usize {
    self.last_iterations
  }

  fn reset(&mut self) {
    self.open_heap.clear();
    self.open.clear();
    self.closed.clear();
    self.came_from.clear();
    self.g_score.clear();
    self.last_iterations = 0;
  }

  /// Search from `start` to `goal`, returning the post-processed path
  /// ordered start to goal with its end points pinned to the query
  /// positions.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "pathfinding::find_path"))]
  pub fn find_path(&mut self, start: Link, goal: Link, start_pos: DVec3, goal_pos: DVec3) -> NavResult<NavigationPath> {
    self.reset();
    self.goal = goal;

    self.came_from.insert(start, start);
    self.g_score.insert(start, 0.0);
    let h = self.heuristic(start, goal, Link::INVALID);
    self.open_heap.push(OpenEntry { f_score: h, link: start });
    self.open.insert(start);

    let mut iterations = 0usize;
    let mut duplicate_pops = 0usize;
    let mut current = start;

    while let Some(OpenEntry { link, .. }) = self.open_heap.pop() {
      current = link;
      self.open.remove(&current);

      if !self.closed.insert(current) {
        duplicate_pops += 1;
        continue;
      }

      if current == goal {
        self.last_iterations = iterations;
        debug!(iterations, "path found");
        return Ok(self.build_path(current, start, start_pos, goal_pos));
      }

      self.expand(current);

      if iterations > 0 && iterations % PROGRESS_INTERVAL == 0 {
        trace!(
          iterations,
          heap = self.open_heap.len(),
          closed = self.closed.len(),
          duplicate_pops,
          dist_to_goal = self.distance_to(current, goal_pos),
          "search progress"
        );
      }

      iterations += 1;

      if iterations > self.settings.max_iterations {
        self.last_iterations = iterations;
        let info = self.failure_info(iterations, current, start_pos, goal_pos);
        warn!(
          iterations,
          distance = info.straight_line_distance,
          start = %start,
          goal = %goal,
          last = %current,
          heap = self.open_heap.len(),
          duplicate_pops,
          "pathfinding aborted at iteration limit"
        );
        return Err(NavError::IterationLimitExceeded(Box::new(info)));
      }
    }

    self.last_iterations = iterations;
    debug!(iterations, "open set exhausted without reaching the goal");
    Err(NavError::NoPathFound(Box::new(self.failure_info(
      iterations, current, start_pos, goal_pos,
    ))))
  }

  // ===========================================================================
  // Expansion
  // ===========================================================================

  fn expand(&mut self, current: Link) {
    let mut neighbours = std::mem::take(&mut self.neighbours);
    neighbours.clear();

    let subdivided_leaf = current.layer() == 0 && self.store.get_node(current).is_some_and(|n| n.has_children());
    if subdivided_leaf {
      self.store.get_leaf_neighbours(current, &mut neighbours);
    } else {
      self.store.get_neighbours(current, &mut neighbours);
    }

    for &neighbour in &neighbours {
      if !self.closed.contains(&neighbour) {
        self.process_link(current, neighbour);
      }
    }
    self.neighbours = neighbours;
  }

  fn process_link(&mut self, current: Link, neighbour: Link) {
    if !neighbour.is_valid() {
      return;
    }

    let Some(&current_g) = self.g_score.get(&current) else {
      return;
    };
    let tentative = current_g + self.cost(current, neighbour);
    if tentative >= self.g_score.get(&neighbour).copied().unwrap_or(f64::MAX) {
      return;
    }

    self.came_from.insert(neighbour, current);
    self.g_score.insert(neighbour, tentative);

    if self.open.insert(neighbour) {
      let parent = self.came_from.get(&current).copied().unwrap_or(Link::INVALID);
      let f_score = tentative + self.heuristic(neighbour, self.goal, parent);
      self.open_heap.push(OpenEntry {
        f_score,
        link: neighbour,
      });
    }
  }

  fn cost(&self, from: Link, to: Link) -> f64 {
    if self.settings.use_unit_cost {
      return self.settings.unit_cost;
    }
    match (self.store.link_position(from), self.store.link_position(to)) {
      (Some(a), Some(b)) => a.distance(b),
      _ => f64::MAX,
    }
  }

  /// Weighted estimate from `node` to `target`, `parent` being the link the
  /// search reached `node`'s predecessor from.
  fn heuristic(&self, node: Link, target: Link, parent: Link) -> f64 {
    let weights = &self.settings.heuristic;
    let (Some(node_pos), Some(target_pos)) = (self.store.link_position(node), self.store.link_position(target)) else {
      return 0.0;
    };
    let distance = node_pos.distance(target_pos);

    let mut score = 0.0;
    if weights.euclidean_weight > 0.0 {
      score += distance * weights.euclidean_weight;
    }

    if weights.velocity_weight > 0.0 && parent.is_valid() && parent != node {
      if let Some(parent_pos) = self.store.link_position(parent) {
        let incoming = (node_pos - parent_pos).normalize_or_zero();
        let outgoing = (target_pos - node_pos).normalize_or_zero();
        let penalty = 1.0 - incoming.dot(outgoing);
        score += penalty * weights.velocity_bias * distance * weights.velocity_weight;
      }
    }

    if weights.node_size_weight > 0.0 {
      let layers = self.store.num_layers().max(1) as f64;
      score *= 1.0 - target.layer() as f64 / layers * weights.node_size_weight;
    }

    score * weights.global_weight
  }

  fn distance_to(&self, link: Link, position: DVec3) -> f64 {
    self
      .store
      .link_position(link)
      .map_or(f64::MAX, |p| p.distance(position))
  }

  fn failure_info(&self, iterations: usize, last: Link, start_pos: DVec3, goal_pos: DVec3) -> PathFailureInfo {
    PathFailureInfo {
      iterations,
      last_link: last,
      last_position: self.store.link_position(last),
      start: start_pos,
      goal: goal_pos,
      straight_line_distance: start_pos.distance(goal_pos),
    }
  }

  // ===========================================================================
  // Reconstruction
  // ===========================================================================

  /// Backtrack from `goal`, pin the end points, then post-process.
  fn build_path(&self, goal: Link, start: Link, start_pos: DVec3, goal_pos: DVec3) -> NavigationPath {
    // Target first, start last.
    let mut points = Vec::new();
    let mut current = goal;
    while let Some(&previous) = self.came_from.get(&current) {
      if previous == current {
        break;
      }
      current = previous;
      let position = self.store.link_position(current).unwrap_or(goal_pos);
      points.push(PathPoint::new(position, self.point_layer(current)));
    }

    if points.len() > 1 {
      points[0].position = goal_pos;
      if let Some(last) = points.last_mut() {
        last.position = start_pos;
      }
    } else {
      let layer = points.first().map_or(0, |p| p.layer);
      points = vec![PathPoint::new(goal_pos, layer), PathPoint::new(start_pos, start.layer())];
    }

    let mut path = NavigationPath::new();
    path.debug_voxels = points.clone();
    path.points = postprocess::run(points, self.store.geometry(), &self.settings);
    path
  }

  /// Point layer: sub-voxels 0, unsubdivided layer-0 nodes 1, others `L + 1`.
  fn point_layer(&self, link: Link) -> u8 {
    if link.layer() == 0 {
      match self.store.get_node(link) {
        Some(node) if node.has_children() => 0,
        _ => 1,
      }
    } else {
      link.layer() + 1
    }
  }
}

#[cfg(test)]
#[path = "astar_test.rs"]
mod astar_test;
