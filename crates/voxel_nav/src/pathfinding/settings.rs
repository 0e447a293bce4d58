//! Pathfinder and heuristic settings.

use serde::Deserialize;

/// Where path points are placed inside the nodes they pass through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPointType {
  /// Node or sub-voxel centre.
  #[default]
  NodeCenter,
  /// Same-layer consecutive points meet halfway, flattening diagonal zig-zags.
  Intermediate,
}

/// Weights of the A* heuristic.
///
/// ```text
/// h = global · (euclid·d + velocity·(1 − align)·bias·d) · (1 − goal_layer/num_layers · node_size)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeuristicSettings {
  pub euclidean_weight: f64,
  /// Rewards continuing in the direction the search arrived from.
  pub velocity_weight: f64,
  pub velocity_bias: f64,
  /// Discount favouring coarse (large, empty) targets.
  pub node_size_weight: f64,
  pub global_weight: f64,
}

impl HeuristicSettings {
  pub const DEFAULT: Self = Self {
    euclidean_weight: 1.0,
    velocity_weight: 0.0,
    velocity_bias: 0.5,
    node_size_weight: 1.0,
    global_weight: 10.0,
  };
}

impl Default for HeuristicSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// A* and path post-processing configuration.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathfinderSettings {
  /// Search aborts with `IterationLimitExceeded` past this many pops.
  pub max_iterations: usize,
  /// Every edge costs `unit_cost` instead of its length.
  pub use_unit_cost: bool,
  pub unit_cost: f64,
  pub heuristic: HeuristicSettings,
  pub path_point_type: PathPointType,

  /// Cull points whose turn angle (degrees) is below `optimize_dot_tolerance`.
  pub optimize_path: bool,
  pub optimize_dot_tolerance: f64,

  pub use_string_pulling: bool,
  /// Fraction of a point's voxel size it may deviate from a pulled string.
  pub string_pulling_voxel_threshold: f64,

  pub smooth_positions: bool,
  pub smoothing_factor: f64,
  /// Chaikin corner-cutting passes. 0 disables.
  pub smoothing_iterations: u32,
}

impl PathfinderSettings {
  pub const DEFAULT: Self = Self {
    max_iterations: 5000,
    use_unit_cost: false,
    unit_cost: 1.0,
    heuristic: HeuristicSettings::DEFAULT,
    path_point_type: PathPointType::NodeCenter,
    optimize_path: true,
    optimize_dot_tolerance: f32::EPSILON as f64,
    use_string_pulling: true,
    string_pulling_voxel_threshold: 0.16841,
    smooth_positions: true,
    smoothing_factor: 0.7,
    smoothing_iterations: 0,
  };

  /// Raw A* output: no post-processing stage runs.
  pub const RAW: Self = Self {
    optimize_path: false,
    use_string_pulling: false,
    smooth_positions: false,
    smoothing_iterations: 0,
    ..Self::DEFAULT
  };
}

impl Default for PathfinderSettings {
  fn default() -> Self {
    Self::DEFAULT
  }
}
