use std::io::Cursor;

use super::*;
use crate::test_utils::*;

fn saved(version: u32) -> (Vec<u8>, OctreeStore, GenerationParams) {
  let mut params = standard_params();
  params.add_dynamic_region(RegionId::new(), scattered_region());
  let store = build_store(&params, &scattered_obstacles());
  let mut bytes = Vec::new();
  save_version(&mut bytes, version, &store, &params).unwrap();
  (bytes, store, params)
}

/// Current-version data restores the store and every persisted field.
#[test]
fn test_current_version_roundtrip() {
  let (bytes, store, params) = saved(FORMAT_VERSION);
  let loaded = load(&mut Cursor::new(bytes), &GenerationParams::default()).unwrap();

  assert_eq!(loaded.version, FORMAT_VERSION);
  assert!(!loaded.needs_regeneration);
  assert_eq!(loaded.params.origin, params.origin);
  assert_eq!(loaded.params.extents, params.extents);
  assert_eq!(loaded.params.voxel_power, params.voxel_power);
  assert_eq!(loaded.params.dynamic_regions, params.dynamic_regions);
  assert_eq!(loaded.store.leaves(), store.leaves());
  for layer in 0..store.num_layers() as u8 {
    assert_eq!(loaded.store.layer(layer), store.layer(layer));
  }
}

/// Each legacy version carries its fields; the rest come from the fallback.
#[test]
fn test_legacy_versions_use_fallback() {
  let mut fallback = GenerationParams::new(DVec3::splat(7.0), DVec3::splat(900.0), 3);
  fallback.agent_radius = 2.5;

  for version in 0..FORMAT_VERSION {
    let (bytes, store, params) = saved(version);
    let loaded = load(&mut Cursor::new(bytes), &fallback).unwrap();
    assert_eq!(loaded.version, version);
    assert!(loaded.needs_regeneration, "v{} must be flagged", version);
    assert!(loaded.params.dynamic_regions.is_empty(), "regions arrived in v3");
    assert_eq!(loaded.params.agent_radius, 2.5);
    assert_eq!(loaded.store.node_count(), store.node_count());

    let expected_origin = if version >= 1 { params.origin } else { fallback.origin };
    let expected_power = if version >= 2 { params.voxel_power } else { fallback.voxel_power };
    assert_eq!(loaded.params.origin, expected_origin, "v{}", version);
    assert_eq!(loaded.params.voxel_power, expected_power, "v{}", version);
  }
}

#[test]
fn test_future_version_rejected() {
  let mut bytes = Vec::new();
  bincode::serialize_into(&mut bytes, &(FORMAT_VERSION + 1)).unwrap();
  let err = load(&mut Cursor::new(bytes), &GenerationParams::default()).unwrap_err();
  assert!(matches!(
    err,
    NavError::UnsupportedFormatVersion { found, supported } if found == FORMAT_VERSION + 1 && supported == FORMAT_VERSION
  ));
}

#[test]
fn test_truncated_data_fails() {
  let (mut bytes, _, _) = saved(FORMAT_VERSION);
  bytes.truncate(bytes.len() / 2);
  let err = load(&mut Cursor::new(bytes), &GenerationParams::default()).unwrap_err();
  assert!(matches!(err, NavError::Serialization(_)));
}

/// Loaded data answers the same queries as the original.
#[test]
fn test_file_roundtrip_preserves_queries() {
  let (_, store, params) = saved(FORMAT_VERSION);
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("volume.nav");
  save_to_file(&path, &store, &params).unwrap();

  let loaded = load_from_file(&path, &GenerationParams::default()).unwrap();
  for probe in [DVec3::ZERO, DVec3::new(-120.0, 40.0, 80.0), DVec3::new(300.0, -300.0, 10.0)] {
    assert_eq!(
      loaded.store.link_from_position(probe).ok(),
      store.link_from_position(probe).ok(),
      "probe {}",
      probe
    );
  }
}
