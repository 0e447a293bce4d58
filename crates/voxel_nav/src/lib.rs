//! voxel_nav - Sparse voxel octree navigation for 3D volumes
//!
//! This crate builds a sparse octree over a bounded volume, marks blocked
//! space at 4×4×4 sub-voxel resolution, and answers A* path queries through
//! the free space. Only regions containing geometry are subdivided, so large
//! open areas cost a single coarse node.
//!
//! # Features
//!
//! - **Generation**: coarse blocking pass, parallel leaf rasterization,
//!   top-down neighbour linking
//! - **Dynamic Regions**: re-rasterize named boxes in place, synchronously or
//!   in lock-free chunks, with per-region versions
//! - **Pathfinding**: A* with a tunable heuristic and a post-processing
//!   pipeline (Chaikin, string pulling, smoothing, collinear culling)
//! - **Async Requests**: fixed worker pool, cancellable futures, stale
//!   results invalidated by region versions
//! - **Persistence**: versioned binary save/load
//!
//! # Example
//!
//! ```ignore
//! use voxel_nav::{generation, pathfinding, GenerationParams, NoDebugDraw, PathfinderSettings};
//!
//! let params = GenerationParams::new(DVec3::ZERO, DVec3::splat(500.0), 4);
//! let store = generation::generate(&params, &my_oracle, &NoDebugDraw)?;
//!
//! let path = pathfinding::find_path(&store, start, goal, &PathfinderSettings::default())?;
//! println!("{} points, length {:.1}", path.len(), path.length());
//! ```

pub mod constants;
pub mod error;
pub mod morton;
pub mod types;

pub use error::{LinkFailureReason, NavError, NavResult};
pub use types::{CollisionChannel, Color, RegionId, VolumeId};

// Host collaborators
pub mod collision;
pub mod debug_draw;
pub use collision::{BoxObstacles, CollisionOracle, OpenSpace};
pub use debug_draw::{DebugDrawFlags, DebugDrawSink, NoDebugDraw};

// Octree storage and generation
pub mod generation;
pub mod octree;
pub use octree::{Aabb, GenerationParams, LeafNode, Link, Node, OctreeGeometry, OctreeStore};

// Dynamic regions
pub mod region;
pub use region::{RegenEvent, RegionSnapshot, RegionVersions};

// A* and path post-processing
pub mod pathfinding;
pub use pathfinding::{
  HeuristicSettings, NavigationPath, PathFailureInfo, PathFinder, PathPoint, PathPointType, PathfinderSettings,
};

// Volumes, requests and the engine
pub mod engine;
pub mod metrics;
pub mod request;
pub mod settings;
pub mod threading;
pub mod volume;
pub use engine::NavEngine;
pub use metrics::{LoadMetrics, LoadSnapshot};
pub use request::{PathCallback, PathFindStatus, PathFuture, RequestPriority};
pub use settings::{EngineSettings, RegenSettings};
pub use threading::WorkerPool;
pub use volume::NavVolume;

// Save/load
pub mod persistence;

#[cfg(test)]
mod test_utils;
