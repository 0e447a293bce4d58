//! Error types for generation, regeneration, pathfinding and persistence.

use glam::DVec3;
use thiserror::Error;

use crate::pathfinding::PathFailureInfo;
use crate::types::RegionId;

/// Why a world position could not be turned into an octree link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkFailureReason {
  /// Position lies outside the volume bounds.
  OutsideVolume,
  /// The octree has not been generated.
  NoData,
  /// Position lies inside a blocked sub-voxel.
  Blocked,
  /// Descent hit a node whose children were missing.
  Unresolved,
}

impl std::fmt::Display for LinkFailureReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      LinkFailureReason::OutsideVolume => "outside volume",
      LinkFailureReason::NoData => "no navigation data",
      LinkFailureReason::Blocked => "inside blocked space",
      LinkFailureReason::Unresolved => "unresolved octree descent",
    };
    f.write_str(s)
  }
}

/// Errors produced by the navigation engine.
#[derive(Debug, Error)]
pub enum NavError {
  /// Generation was requested without a usable collision oracle or with bad parameters
  #[error("generation misconfigured: {0}")]
  GenerationMisconfigured(String),

  /// Referenced dynamic region is not registered on the volume
  #[error("dynamic region {0} not found")]
  RegionNotFound(RegionId),

  /// A query point could not be resolved to a navigable link
  #[error("could not resolve link at {position}: {reason}")]
  LinkResolutionFailure {
    position: DVec3,
    reason: LinkFailureReason,
  },

  /// No registered volume contains the query point
  #[error("no navigation volume contains {0}")]
  NoVolume(DVec3),

  /// The open set emptied before reaching the goal
  #[error("no path found after {} iterations", .0.iterations)]
  NoPathFound(Box<PathFailureInfo>),

  /// The iteration cap was hit before reaching the goal
  #[error("iteration limit exceeded after {} iterations", .0.iterations)]
  IterationLimitExceeded(Box<PathFailureInfo>),

  /// Request was cancelled before it ran
  #[error("path request cancelled")]
  Cancelled,

  /// A dynamic region changed while the request was in flight
  #[error("path request invalidated by dynamic region change")]
  Invalidated,

  // Ambient errors

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] bincode::Error),

  #[error("settings error: {0}")]
  Settings(#[from] toml::de::Error),

  /// Saved data carries a format version newer than this build understands
  #[error("unsupported navigation data format version {found} (newest supported {supported})")]
  UnsupportedFormatVersion { found: u32, supported: u32 },

  /// The worker pool has shut down and can no longer accept work
  #[error("worker pool error: {0}")]
  WorkerPool(String),
}

impl NavError {
  /// Failure diagnostics for search failures.
  pub fn failure_info(&self) -> Option<&PathFailureInfo> {
    match self {
      NavError::NoPathFound(info) | NavError::IterationLimitExceeded(info) => Some(info),
      _ => None,
    }
  }
}

pub type NavResult<T> = Result<T, NavError>;
