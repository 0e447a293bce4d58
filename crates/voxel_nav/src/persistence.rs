//! Binary save/load of generated navigation data.
//!
//! # Format
//!
//! ```text
//! u32 version
//! v0: layers, leaves
//! v1: origin, extents, layers, leaves
//! v2: origin, extents, voxel_power, layers, leaves
//! v3: origin, extents, voxel_power, layers, leaves, dynamic regions
//! ```
//!
//! Every field is bincode encoded. Saving always writes [`FORMAT_VERSION`].
//! Older versions load with the missing fields taken from fallback
//! parameters and are flagged for regeneration.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NavError, NavResult};
use crate::octree::{Aabb, GenerationParams, LeafNode, Node, OctreeStore};
use crate::types::RegionId;

/// Version written by [`save`].
pub const FORMAT_VERSION: u32 = 3;

#[derive(Serialize, Deserialize)]
struct LayoutV0 {
  layers: Vec<Vec<Node>>,
  leaves: Vec<LeafNode>,
}

#[derive(Serialize, Deserialize)]
struct LayoutV1 {
  origin: DVec3,
  extents: DVec3,
  layers: Vec<Vec<Node>>,
  leaves: Vec<LeafNode>,
}

#[derive(Serialize, Deserialize)]
struct LayoutV2 {
  origin: DVec3,
  extents: DVec3,
  voxel_power: u8,
  layers: Vec<Vec<Node>>,
  leaves: Vec<LeafNode>,
}

#[derive(Serialize, Deserialize)]
struct LayoutV3 {
  origin: DVec3,
  extents: DVec3,
  voxel_power: u8,
  layers: Vec<Vec<Node>>,
  leaves: Vec<LeafNode>,
  regions: Vec<(RegionId, Aabb)>,
}

/// Result of [`load`].
#[derive(Debug)]
pub struct LoadedNavData {
  pub store: OctreeStore,
  /// Fallback parameters with every persisted field applied.
  pub params: GenerationParams,
  pub version: u32,
  /// Saved by an older format; should be regenerated rather than trusted.
  pub needs_regeneration: bool,
}

/// Write `store` and the dynamic regions of `params`.
pub fn save<W: Write>(writer: &mut W, store: &OctreeStore, params: &GenerationParams) -> NavResult<()> {
  let geometry = store.geometry();
  let layout = LayoutV3 {
    origin: geometry.origin,
    extents: geometry.extents,
    voxel_power: geometry.voxel_power,
    layers: store.layers.clone(),
    leaves: store.leaves.clone(),
    regions: params.dynamic_regions.iter().map(|(id, b)| (*id, *b)).collect(),
  };
  bincode::serialize_into(&mut *writer, &FORMAT_VERSION)?;
  bincode::serialize_into(&mut *writer, &layout)?;
  writer.flush()?;
  Ok(())
}

/// Read data written by any supported version.
pub fn load<R: Read>(reader: &mut R, fallback: &GenerationParams) -> NavResult<LoadedNavData> {
  let version: u32 = bincode::deserialize_from(&mut *reader)?;
  let mut params = fallback.clone();

  let (layers, leaves) = match version {
    0 => {
      let v: LayoutV0 = bincode::deserialize_from(&mut *reader)?;
      (v.layers, v.leaves)
    }
    1 => {
      let v: LayoutV1 = bincode::deserialize_from(&mut *reader)?;
      params.origin = v.origin;
      params.extents = v.extents;
      (v.layers, v.leaves)
    }
    2 => {
      let v: LayoutV2 = bincode::deserialize_from(&mut *reader)?;
      params.origin = v.origin;
      params.extents = v.extents;
      params.voxel_power = v.voxel_power;
      (v.layers, v.leaves)
    }
    3 => {
      let v: LayoutV3 = bincode::deserialize_from(&mut *reader)?;
      params.origin = v.origin;
      params.extents = v.extents;
      params.voxel_power = v.voxel_power;
      params.dynamic_regions = v
        .regions
        .into_iter()
        .map(|(id, bounds)| (RegionId::restore(id.raw()), bounds))
        .collect();
      (v.layers, v.leaves)
    }
    found => {
      return Err(NavError::UnsupportedFormatVersion {
        found,
        supported: FORMAT_VERSION,
      })
    }
  };

  let needs_regeneration = version < FORMAT_VERSION;
  if needs_regeneration {
    warn!(version, current = FORMAT_VERSION, "loaded legacy navigation data, regeneration recommended");
  }

  let store = OctreeStore::from_parts(params.geometry(), layers, leaves);
  info!(
    version,
    layers = store.num_layers(),
    nodes = store.node_count(),
    leaves = store.leaf_count(),
    "navigation data loaded"
  );

  Ok(LoadedNavData {
    store,
    params,
    version,
    needs_regeneration,
  })
}

/// [`save`] to a file, replacing it.
pub fn save_to_file(path: &Path, store: &OctreeStore, params: &GenerationParams) -> NavResult<()> {
  let mut writer = BufWriter::new(File::create(path)?);
  save(&mut writer, store, params)
}

/// [`load`] from a file.
pub fn load_from_file(path: &Path, fallback: &GenerationParams) -> NavResult<LoadedNavData> {
  let mut reader = BufReader::new(File::open(path)?);
  load(&mut reader, fallback)
}

/// Write data in a legacy layout. Only used to exercise the upgrade path.
#[cfg(test)]
pub(crate) fn save_version<W: Write>(
  writer: &mut W,
  version: u32,
  store: &OctreeStore,
  params: &GenerationParams,
) -> NavResult<()> {
  let g = store.geometry();
  let (layers, leaves) = (store.layers.clone(), store.leaves.clone());
  bincode::serialize_into(&mut *writer, &version)?;
  match version {
    0 => bincode::serialize_into(&mut *writer, &LayoutV0 { layers, leaves })?,
    1 => bincode::serialize_into(
      &mut *writer,
      &LayoutV1 {
        origin: g.origin,
        extents: g.extents,
        layers,
        leaves,
      },
    )?,
    2 => bincode::serialize_into(
      &mut *writer,
      &LayoutV2 {
        origin: g.origin,
        extents: g.extents,
        voxel_power: g.voxel_power,
        layers,
        leaves,
      },
    )?,
    _ => return save(writer, store, params),
  }
  Ok(())
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod persistence_test;
