//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! worker_threads = 4
//! max_concurrent_pathfinds = 8
//!
//! [regen]
//! chunk_size = 100
//! cooldown_secs = 0.5
//!
//! [pathfinder]
//! max_iterations = 8000
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::NavResult;
use crate::pathfinding::PathfinderSettings;
use crate::threading::MAX_WORKERS;

/// Chunk size bounds for asynchronous regeneration.
pub const MIN_REGEN_CHUNK: usize = 10;
pub const MAX_REGEN_CHUNK: usize = 500;

/// Dynamic region regeneration timing and batching.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegenSettings {
  /// Leaves rasterized per rayon task.
  pub chunk_size: usize,
  /// Quiet period after a dynamic regeneration before dirty regions are processed.
  pub cooldown_secs: f64,
  /// How long a region must have been dirty before it is processed.
  pub dirty_delay_secs: f64,
}

impl RegenSettings {
  pub const DEFAULT: Self = Self {
    chunk_size: 75,
    cooldown_secs: 0.5,
    dirty_delay_secs: 0.25,
  };

  /// Regenerate dirty regions on the next update.
  pub const IMMEDIATE: Self = Self {
    cooldown_secs: 0.0,
    dirty_delay_secs: 0.0,
    ..Self::DEFAULT
  };

  /// Chunk size clamped to its supported range.
  pub fn effective_chunk_size(&self) -> usize {
    self.chunk_size.clamp(MIN_REGEN_CHUNK, MAX_REGEN_CHUNK)
  }
}

impl Default for RegenSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Top-level engine settings.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  pub worker_threads: usize,
  /// Advisory cap on requests running at once; beyond it new requests are
  /// still queued but logged as throttled.
  pub max_concurrent_pathfinds: usize,
  pub regen: RegenSettings,
  /// Settings used when a request does not bring its own.
  pub pathfinder: PathfinderSettings,
}

impl EngineSettings {
  pub const DEFAULT: Self = Self {
    worker_threads: 2,
    max_concurrent_pathfinds: 8,
    regen: RegenSettings::DEFAULT,
    pathfinder: PathfinderSettings::DEFAULT,
  };

  /// Parse settings from TOML text. Missing keys keep their defaults.
  pub fn from_toml_str(text: &str) -> NavResult<Self> {
    Ok(toml::from_str(text)?)
  }

  /// Load settings from a TOML file.
  pub fn load(path: &Path) -> NavResult<Self> {
    let text = std::fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }

  /// Worker count clamped to `1..=MAX_WORKERS`.
  pub fn effective_workers(&self) -> usize {
    self.worker_threads.clamp(1, MAX_WORKERS)
  }
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::NavError;

  #[test]
  fn test_defaults() {
    let settings = EngineSettings::default();
    assert_eq!(settings.worker_threads, 2);
    assert_eq!(settings.max_concurrent_pathfinds, 8);
    assert_eq!(settings.regen.chunk_size, 75);
    assert_eq!(settings.regen.cooldown_secs, 0.5);
    assert_eq!(settings.regen.dirty_delay_secs, 0.25);
  }

  #[test]
  fn test_from_toml() {
    let settings = EngineSettings::from_toml_str(
      r#"
        worker_threads = 64

        [regen]
        chunk_size = 5

        [pathfinder]
        max_iterations = 10
      "#,
    )
    .unwrap();
    assert_eq!(settings.effective_workers(), MAX_WORKERS);
    assert_eq!(settings.regen.effective_chunk_size(), MIN_REGEN_CHUNK);
    assert_eq!(settings.regen.cooldown_secs, 0.5);
    assert_eq!(settings.pathfinder.max_iterations, 10);
    assert!(settings.pathfinder.use_string_pulling);
  }

  #[test]
  fn test_invalid_toml() {
    let err = EngineSettings::from_toml_str("worker_threads = \"many\"").unwrap_err();
    assert!(matches!(err, NavError::Settings(_)));
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nav.toml");
    std::fs::write(&path, "max_concurrent_pathfinds = 3\n").unwrap();
    assert_eq!(EngineSettings::load(&path).unwrap().max_concurrent_pathfinds, 3);
    assert!(matches!(
      EngineSettings::load(&dir.path().join("missing.toml")),
      Err(NavError::Io(_))
    ));
  }
}
