//! Shared identifier and value types.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// =============================================================================
// VolumeId - navigation volume identifier
// =============================================================================

static VOLUME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque navigation volume identifier.
///
/// Generated atomically - guaranteed unique within process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct VolumeId(u64);

impl VolumeId {
  /// Generate a new unique VolumeId.
  pub fn new() -> Self {
    Self(VOLUME_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for VolumeId {
  fn default() -> Self {
    Self::new()
  }
}

// =============================================================================
// RegionId - dynamic region identifier
// =============================================================================

static REGION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Dynamic region identifier.
///
/// Fresh ids come from a process-wide counter. Ids restored from disk go
/// through [`RegionId::restore`], which moves the counter past them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u64);

impl RegionId {
  /// Generate a new unique RegionId.
  pub fn new() -> Self {
    Self(REGION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Rebuild an id from its raw value.
  pub const fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  /// Rebuild a persisted id and keep future [`RegionId::new`] ids clear of it.
  pub fn restore(raw: u64) -> Self {
    REGION_ID_COUNTER.fetch_max(raw.saturating_add(1), Ordering::Relaxed);
    Self(raw)
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl Default for RegionId {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for RegionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "region#{}", self.0)
  }
}

// =============================================================================
// CollisionChannel
// =============================================================================

/// Opaque collision channel forwarded to the collision oracle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct CollisionChannel(pub u8);

// =============================================================================
// Color
// =============================================================================

/// RGBA8 colour for debug drawing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Color {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}

impl Color {
  pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b, a: 255 }
  }

  pub const RED: Color = Color::rgb(255, 0, 0);
  pub const GREEN: Color = Color::rgb(0, 255, 0);
  pub const BLUE: Color = Color::rgb(0, 0, 255);
  pub const CYAN: Color = Color::rgb(0, 255, 255);
  pub const YELLOW: Color = Color::rgb(255, 255, 0);
  pub const ORANGE: Color = Color::rgb(243, 156, 18);
  pub const WHITE: Color = Color::rgb(255, 255, 255);
}

/// Per-layer colours used when drawing voxels and links.
pub const LAYER_COLORS: [Color; 8] = [
  Color::rgb(161, 0, 0),
  Color::rgb(0, 161, 0),
  Color::rgb(0, 0, 161),
  Color::rgb(161, 161, 0),
  Color::rgb(0, 161, 161),
  Color::rgb(161, 0, 161),
  Color::rgb(80, 80, 80),
  Color::rgb(200, 200, 200),
];

/// Colour for a layer index, cycling past the table end.
#[inline]
pub fn layer_color(layer: usize) -> Color {
  LAYER_COLORS[layer % LAYER_COLORS.len()]
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
