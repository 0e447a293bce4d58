//! Navigation benchmarks.
//!
//! - **generation**: full octree build at increasing voxel power
//! - **pathfinding**: synchronous A* with and without post-processing
//! - **regeneration**: re-rasterizing one dynamic region
//! - **neighbours**: leaf-level neighbour enumeration

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use voxel_nav::{
  generation::generate, pathfinding::find_path, region::regenerate_regions, Aabb, BoxObstacles, GenerationParams,
  NoDebugDraw, OpenSpace, PathfinderSettings, RegionId,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Grid of small pillars through the volume.
fn pillars(extent: f64, count: usize) -> BoxObstacles {
  let mut obstacles = BoxObstacles::default();
  let step = extent * 2.0 / (count as f64 + 1.0);
  for i in 1..=count {
    for j in 1..=count {
      let x = -extent + step * i as f64;
      let z = -extent + step * j as f64;
      obstacles.push(Aabb::new(
        DVec3::new(x - 10.0, -extent * 0.8, z - 10.0),
        DVec3::new(x + 10.0, extent * 0.8, z + 10.0),
      ));
    }
  }
  obstacles
}

fn params(power: u8) -> GenerationParams {
  GenerationParams::new(DVec3::ZERO, DVec3::splat(500.0), power)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_generation(c: &mut Criterion) {
  let mut group = c.benchmark_group("generation");
  group.sample_size(10);
  let obstacles = pillars(500.0, 4);

  for power in [3u8, 4, 5] {
    let params = params(power);
    group.bench_with_input(BenchmarkId::new("pillars", power), &params, |b, params| {
      b.iter(|| generate(black_box(params), &obstacles, &NoDebugDraw))
    });
  }
  group.finish();
}

fn bench_pathfinding(c: &mut Criterion) {
  let mut group = c.benchmark_group("pathfinding");
  let params = params(5);
  let store = generate(&params, &pillars(500.0, 4), &NoDebugDraw).expect("generation");
  let start = DVec3::new(-450.0, 0.0, -450.0);
  let goal = DVec3::new(450.0, 0.0, 450.0);

  group.bench_function("default", |b| {
    b.iter(|| find_path(&store, black_box(start), black_box(goal), &PathfinderSettings::DEFAULT))
  });
  group.bench_function("raw", |b| {
    b.iter(|| find_path(&store, black_box(start), black_box(goal), &PathfinderSettings::RAW))
  });
  group.finish();
}

fn bench_regeneration(c: &mut Criterion) {
  let mut group = c.benchmark_group("regeneration");
  group.sample_size(20);
  let mut params = params(5);
  let region = RegionId::new();
  params.add_dynamic_region(region, Aabb::new(DVec3::splat(-150.0), DVec3::splat(150.0)));
  let obstacles = pillars(500.0, 4);
  let mut store = generate(&params, &obstacles, &NoDebugDraw).expect("generation");

  group.bench_function("blocked", |b| {
    b.iter(|| regenerate_regions(&mut store, &params, &[region], &obstacles))
  });
  group.bench_function("clear", |b| {
    b.iter(|| regenerate_regions(&mut store, &params, &[region], &OpenSpace))
  });
  group.finish();
}

fn bench_neighbours(c: &mut Criterion) {
  let params = params(5);
  let store = generate(&params, &pillars(500.0, 4), &NoDebugDraw).expect("generation");
  let link = store
    .link_from_position(DVec3::new(-190.0, 0.0, -190.0))
    .expect("free position beside a pillar");
  let mut neighbours = Vec::with_capacity(32);

  c.bench_function("neighbours/leaf_or_coarse", |b| {
    b.iter(|| {
      neighbours.clear();
      if link.layer() == 0 && store.leaf_for(link).is_some() {
        store.get_leaf_neighbours(black_box(link), &mut neighbours);
      } else {
        store.get_neighbours(black_box(link), &mut neighbours);
      }
      neighbours.len()
    })
  });
}

criterion_group!(
  benches,
  bench_generation,
  bench_pathfinding,
  bench_regeneration,
  bench_neighbours,
);
criterion_main!(benches);
