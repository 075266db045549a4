//! Scanview Data Crate
//!
//! CPU-side data types for scanned point clouds and reconstructed meshes, plus
//! PLY frame loading and Delaunay triangulation. Nothing in here touches a
//! renderer; the types are shared by the reconstruction and playback code in
//! `scanview-core`.

mod error;
pub mod ply;
pub mod triangulation;
pub mod types;

pub use error::DataError;
pub use ply::load_point_cloud_from_ply;
pub use triangulation::{ProjectionPlane, best_projection_plane, triangulate_on_plane, triangulate_points};
pub use types::{Aabb, MeshTexture, Point, PointCloud, ReconstructedMesh};
