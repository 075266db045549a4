//! Core data types for point clouds and reconstructed meshes.
//!
//! These are CPU-side representations shared by the reconstruction engine,
//! the scene graph and the frame sequence player.

use glam::{Vec2, Vec3};
use image::RgbImage;

use crate::DataError;

/// A simple colored point in 3D space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Position in world space.
    pub position: Vec3,
    /// RGB color (linear, 0-1 range).
    pub color: Vec3,
}

impl Point {
    /// Create a new point with position and color.
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Create a white point at the given position.
    pub fn white(position: Vec3) -> Self {
        Self {
            position,
            color: Vec3::ONE,
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::splat(0.8),
        }
    }
}

/// One captured point-cloud frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().map(|p| p.position)
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_positions(self.positions())
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute bounds from an iterator of positions. Returns `None` when the
    /// iterator is empty.
    pub fn from_positions(positions: impl Iterator<Item = Vec3>) -> Option<Self> {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut count = 0usize;

        for pos in positions {
            min = min.min(pos);
            max = max.max(pos);
            count += 1;
        }

        (count > 0).then_some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Texture atlas produced by the `UvMap` coloring strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTexture {
    pub image: RgbImage,
}

impl MeshTexture {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Get texture dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Result of a reconstruction job: indexed triangle mesh with either
/// per-vertex colors or a UV-mapped texture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructedMesh {
    pub positions: Vec<Vec3>,
    /// Per-vertex RGB colors. Empty when the mesh is textured only.
    pub colors: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    /// Per-vertex texture coordinates, present together with `texture`.
    pub uvs: Option<Vec<Vec2>>,
    pub texture: Option<MeshTexture>,
}

impl ReconstructedMesh {
    pub fn new(positions: Vec<Vec3>, colors: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            colors,
            faces,
            uvs: None,
            texture: None,
        }
    }

    /// Attach UV coordinates and a texture atlas.
    pub fn with_texture(mut self, uvs: Vec<Vec2>, texture: MeshTexture) -> Self {
        self.uvs = Some(uvs);
        self.texture = Some(texture);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_positions(self.positions.iter().copied())
    }

    /// Check buffer consistency: face indices in range, per-vertex attribute
    /// lengths matching the vertex count.
    pub fn validate(&self) -> Result<(), DataError> {
        let count = self.positions.len();
        if !self.colors.is_empty() && self.colors.len() != count {
            return Err(DataError::InvalidMesh(format!(
                "{} colors for {} vertices",
                self.colors.len(),
                count
            )));
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() != count {
                return Err(DataError::InvalidMesh(format!(
                    "{} uvs for {} vertices",
                    uvs.len(),
                    count
                )));
            }
        }
        if self.uvs.is_some() != self.texture.is_some() {
            return Err(DataError::InvalidMesh(
                "uvs and texture must be provided together".to_string(),
            ));
        }
        if let Some((i, face)) = self
            .faces
            .iter()
            .enumerate()
            .find(|(_, face)| face.iter().any(|&idx| idx as usize >= count))
        {
            return Err(DataError::InvalidMesh(format!(
                "face {} references vertex out of range: {:?}",
                i, face
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_creation() {
        let p = Point::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.color, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_aabb_from_positions() {
        let bounds = Aabb::from_positions(
            [
                Vec3::new(-1.0, 0.0, 2.0),
                Vec3::new(3.0, 4.0, -2.0),
                Vec3::new(0.0, -1.0, 0.0),
            ]
            .into_iter(),
        )
        .unwrap();
        assert_eq!(bounds.min, Vec3::new(-1.0, -1.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(bounds.center(), Vec3::new(1.0, 1.5, 0.0));
        assert!(bounds.contains(Vec3::ZERO));
    }

    #[test]
    fn test_aabb_empty() {
        assert!(Aabb::from_positions(std::iter::empty()).is_none());
        assert!(PointCloud::default().bounding_box().is_none());
    }

    #[test]
    fn test_mesh_counts() {
        let mesh = ReconstructedMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            Vec::new(),
            vec![[0, 1, 2], [0, 2, 3]],
        );
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(!mesh.is_textured());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_mesh_validate_out_of_range_face() {
        let mesh = ReconstructedMesh::new(vec![Vec3::ZERO, Vec3::X], Vec::new(), vec![[0, 1, 2]]);
        assert!(matches!(mesh.validate(), Err(DataError::InvalidMesh(_))));
    }

    #[test]
    fn test_mesh_validate_color_mismatch() {
        let mesh = ReconstructedMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::ONE],
            vec![[0, 1, 2]],
        );
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_mesh_textured() {
        let mesh = ReconstructedMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], Vec::new(), vec![[0, 1, 2]])
            .with_texture(
                vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                MeshTexture::new(RgbImage::new(4, 4)),
            );
        assert!(mesh.is_textured());
        assert_eq!(mesh.texture.as_ref().unwrap().dimensions(), (4, 4));
        assert!(mesh.validate().is_ok());
    }
}
