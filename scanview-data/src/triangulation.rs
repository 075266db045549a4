//! Delaunay triangulation for point clouds.
//!
//! Scanned surfaces are close to height fields over one of the principal
//! planes, so a 2D Delaunay triangulation over the plane with the largest
//! spread gives a usable surface for the reference reconstruction engine.

use delaunator::{Point, triangulate};
use glam::Vec3;
use tracing::{debug, warn};

/// Plane onto which points are projected before triangulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPlane {
    XY,
    XZ,
    YZ,
}

impl ProjectionPlane {
    /// Project a position onto this plane's 2D coordinates.
    pub fn project(self, p: Vec3) -> (f32, f32) {
        match self {
            ProjectionPlane::XY => (p.x, p.y),
            ProjectionPlane::XZ => (p.x, p.z),
            ProjectionPlane::YZ => (p.y, p.z),
        }
    }
}

/// Analyze point cloud and determine the best projection plane for triangulation.
///
/// Drops the axis with the smallest extent.
pub fn best_projection_plane(positions: &[Vec3]) -> ProjectionPlane {
    if positions.is_empty() {
        return ProjectionPlane::XY;
    }

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);

    for pos in positions {
        min = min.min(*pos);
        max = max.max(*pos);
    }

    let extent = max - min;

    if extent.z <= extent.x && extent.z <= extent.y {
        ProjectionPlane::XY
    } else if extent.y <= extent.x && extent.y <= extent.z {
        ProjectionPlane::XZ
    } else {
        ProjectionPlane::YZ
    }
}

/// Triangulate points projected onto `plane`.
///
/// Returns a list of triangle index triplets `[i0, i1, i2]`.
pub fn triangulate_on_plane(positions: &[Vec3], plane: ProjectionPlane) -> Vec<[usize; 3]> {
    if positions.len() < 3 {
        warn!("Not enough points for triangulation (need at least 3)");
        return Vec::new();
    }

    let points: Vec<Point> = positions
        .iter()
        .map(|&p| {
            let (x, y) = plane.project(p);
            Point {
                x: x as f64,
                y: y as f64,
            }
        })
        .collect();

    let result = triangulate(&points);

    let triangles: Vec<[usize; 3]> = result
        .triangles
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect();

    debug!(
        "Triangulated {} points into {} triangles (plane: {:?})",
        positions.len(),
        triangles.len(),
        plane
    );

    triangles
}

/// Triangulate points over the plane chosen by [`best_projection_plane`].
pub fn triangulate_points(positions: &[Vec3]) -> Vec<[usize; 3]> {
    triangulate_on_plane(positions, best_projection_plane(positions))
}
