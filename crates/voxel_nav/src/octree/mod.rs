//! Sparse voxel octree data model.
//!
//! # Layer Convention
//!
//! Layer 0 = finest nodes, layer P = the single root. Layer-0 nodes may own
//! a 4×4×4 leaf of sub-voxels.
//!
//! ```text
//! voxel_size(L) = extents.x / 2^P * 2^(L + 1)
//! ```
//!
//! # Module Structure
//!
//! - [`link`]: `Link` - (layer, node, sub-voxel) address with invalid sentinel
//! - [`node`]: `Node` - code, parent, first child, 6 face neighbours
//! - [`leaf`]: `LeafNode` - 64-bit occupancy mask
//! - [`bounds`]: `Aabb` - double precision boxes
//! - [`config`]: `GenerationParams`, `OctreeGeometry` - coordinate math
//! - [`store`]: `OctreeStore` - sorted layers, neighbour queries, position lookup

pub mod bounds;
pub mod config;
pub mod leaf;
pub mod link;
pub mod node;
pub mod store;

// Re-exports
pub use bounds::Aabb;
pub use config::{GenerationParams, OctreeGeometry, REGION_BOUNDS_TOLERANCE};
pub use leaf::LeafNode;
pub use link::Link;
pub use node::Node;
pub use store::{OctreeStore, StoreStats};
