//! PLY file loading and parsing

mod loader;

pub use loader::load_point_cloud_from_ply;
