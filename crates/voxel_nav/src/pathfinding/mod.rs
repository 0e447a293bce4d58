//! A* pathfinding over the sparse voxel octree.
//!
//! # Module Structure
//!
//! - [`settings`]: `PathfinderSettings`, `HeuristicSettings`
//! - [`path`]: `NavigationPath`, `PathPoint`, `PathFailureInfo`
//! - [`astar`]: `PathFinder` - open heap search and path reconstruction
//! - [`postprocess`]: string pulling, smoothing and culling stages
//!
//! # Usage
//!
//! ```ignore
//! let store = generation::generate(&params, &oracle, &NoDebugDraw)?;
//! let path = pathfinding::find_path(&store, start, goal, &PathfinderSettings::default())?;
//! for point in &path.points {
//!     println!("{} (layer {})", point.position, point.layer);
//! }
//! ```

pub mod astar;
pub mod path;
pub mod postprocess;
pub mod settings;

pub use astar::PathFinder;
pub use path::{NavigationPath, PathFailureInfo, PathPoint};
pub use settings::{HeuristicSettings, PathPointType, PathfinderSettings};

use glam::DVec3;
use tracing::error;

use crate::error::NavResult;
use crate::octree::{Link, OctreeStore};

/// Resolve `position` to a link, logging failures.
pub fn resolve_link(store: &OctreeStore, position: DVec3) -> NavResult<Link> {
  store.link_from_position(position).map_err(|err| {
    error!(%position, %err, "failed to resolve navigation link");
    err
  })
}

/// Find a path between two world positions. The returned path is ready.
pub fn find_path(
  store: &OctreeStore,
  start: DVec3,
  goal: DVec3,
  settings: &PathfinderSettings,
) -> NavResult<NavigationPath> {
  let start_link = resolve_link(store, start)?;
  let goal_link = resolve_link(store, goal)?;
  let mut path = PathFinder::new(store, *settings).find_path(start_link, goal_link, start, goal)?;
  path.set_ready();
  Ok(path)
}
