//! Height-field reconstruction engine built on 2D Delaunay triangulation.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use image::{Rgb, RgbImage};
use scanview_data::{
    MeshTexture, PointCloud, ProjectionPlane, ReconstructedMesh, best_projection_plane,
    triangulate_on_plane,
};
use tracing::{debug, info, warn};

use super::{
    ColoringStrategy, MeshingParameters, ProgressReporter, ReconstructionEngine,
    ReconstructionError,
};

/// Voxel edge at `resolution == 1`, in scene units (meters for scans).
pub const DEFAULT_BASE_CELL_SIZE: f32 = 0.001;

const SMOOTHING_WEIGHT: f32 = 0.5;
const UNCOVERED_TEXEL: Rgb<u8> = Rgb([204, 204, 204]);

/// Reference engine for scans that are close to a height field over one of
/// the principal planes.
///
/// Points are decimated on a voxel grid of `resolution * base_cell_size`,
/// triangulated over the best projection plane, trimmed, smoothed and
/// colored. Closed surfaces are not produced.
#[derive(Debug, Clone, Copy)]
pub struct DelaunayEngine {
    base_cell_size: f32,
}

impl Default for DelaunayEngine {
    fn default() -> Self {
        Self {
            base_cell_size: DEFAULT_BASE_CELL_SIZE,
        }
    }
}

impl DelaunayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-positive or non-finite sizes are ignored.
    pub fn with_base_cell_size(mut self, base_cell_size: f32) -> Self {
        if base_cell_size.is_finite() && base_cell_size > 0.0 {
            self.base_cell_size = base_cell_size;
        }
        self
    }

    pub fn base_cell_size(&self) -> f32 {
        self.base_cell_size
    }

    pub fn cell_size(&self, params: &MeshingParameters) -> f32 {
        params.resolution.max(1) as f32 * self.base_cell_size
    }
}

impl ReconstructionEngine for DelaunayEngine {
    #[tracing::instrument(skip_all, fields(points = cloud.len(), resolution = params.resolution))]
    fn reconstruct(
        &self,
        cloud: &PointCloud,
        params: &MeshingParameters,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<ReconstructedMesh, ReconstructionError> {
        progress.checkpoint(0.0)?;
        if params.closed {
            warn!("Closed surfaces are not supported; returning an open height-field surface");
        }

        let (positions, colors) = decimate(cloud, self.cell_size(params));
        debug!(
            "Decimated {} points to {} cells",
            cloud.len(),
            positions.len()
        );
        if positions.len() < 3 {
            return Err(ReconstructionError::InsufficientPoints(positions.len()));
        }
        if u32::try_from(positions.len()).is_err() {
            return Err(ReconstructionError::Engine(format!(
                "{} vertices exceed the index range",
                positions.len()
            )));
        }
        progress.checkpoint(20.0)?;

        let plane = best_projection_plane(&positions);
        let triangles = triangulate_on_plane(&positions, plane);
        progress.checkpoint(50.0)?;

        let triangles = trim_long_triangles(&positions, triangles, params.surface_trimming_amount);
        if triangles.is_empty() {
            return Err(ReconstructionError::EmptyMesh);
        }
        let (mut positions, colors, faces) = compact(&positions, &colors, &triangles);
        progress.checkpoint(60.0)?;

        let neighbors = vertex_neighbors(positions.len(), &faces);
        for pass in 0..params.smoothness {
            positions = laplacian_pass(&positions, &neighbors);
            let fraction = (pass + 1) as f32 / params.smoothness as f32;
            progress.checkpoint(60.0 + 20.0 * fraction)?;
        }

        let mesh = match params.coloring_strategy {
            ColoringStrategy::VertexColor => ReconstructedMesh::new(positions, colors, faces),
            ColoringStrategy::UvMap => {
                let uvs = planar_uvs(&positions, plane);
                let texture = bake_texture(&uvs, &colors, &faces, params.texture_resolution_pixels);
                progress.checkpoint(95.0)?;
                ReconstructedMesh::new(positions, Vec::new(), faces)
                    .with_texture(uvs, MeshTexture::new(texture))
            }
        };

        progress.checkpoint(100.0)?;
        info!(
            "Delaunay surface: {} vertices, {} faces over {:?}",
            mesh.vertex_count(),
            mesh.face_count(),
            plane
        );
        Ok(mesh)
    }
}

#[derive(Default)]
struct Cell {
    position: Vec3,
    color: Vec3,
    count: u32,
}

/// Average points per voxel. Cells come out in key order so the result does
/// not depend on input order.
fn decimate(cloud: &PointCloud, cell_size: f32) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut cells: BTreeMap<(i32, i32, i32), Cell> = BTreeMap::new();
    for point in cloud.points.iter().filter(|p| p.position.is_finite()) {
        let key = (point.position / cell_size).floor().as_ivec3();
        let cell = cells.entry((key.x, key.y, key.z)).or_default();
        cell.position += point.position;
        cell.color += point.color;
        cell.count += 1;
    }

    cells
        .into_values()
        .map(|cell| {
            let n = cell.count as f32;
            (cell.position / n, cell.color / n)
        })
        .unzip()
}

fn longest_edge(positions: &[Vec3], [a, b, c]: [usize; 3]) -> f32 {
    let (pa, pb, pc) = (positions[a], positions[b], positions[c]);
    pa.distance(pb).max(pb.distance(pc)).max(pc.distance(pa))
}

/// Drop triangles whose longest edge exceeds `median * (1 + 10 / amount)`.
/// An amount of zero keeps everything.
fn trim_long_triangles(
    positions: &[Vec3],
    triangles: Vec<[usize; 3]>,
    amount: u32,
) -> Vec<[usize; 3]> {
    if amount == 0 || triangles.is_empty() {
        return triangles;
    }

    let mut lengths: Vec<f32> = triangles
        .iter()
        .map(|&t| longest_edge(positions, t))
        .collect();
    lengths.sort_by(f32::total_cmp);
    let median = lengths[lengths.len() / 2];
    let threshold = median * (1.0 + 10.0 / amount as f32);

    let before = triangles.len();
    let kept: Vec<[usize; 3]> = triangles
        .into_iter()
        .filter(|&t| longest_edge(positions, t) <= threshold)
        .collect();
    debug!(
        "Trimmed {} of {} triangles (threshold {:.5})",
        before - kept.len(),
        before,
        threshold
    );
    kept
}

/// Keep only vertices referenced by `triangles`, remapping indices.
fn compact(
    positions: &[Vec3],
    colors: &[Vec3],
    triangles: &[[usize; 3]],
) -> (Vec<Vec3>, Vec<Vec3>, Vec<[u32; 3]>) {
    let mut remap: Vec<Option<u32>> = vec![None; positions.len()];
    let mut kept_positions = Vec::new();
    let mut kept_colors = Vec::new();

    let faces = triangles
        .iter()
        .map(|triangle| {
            triangle.map(|old| {
                *remap[old].get_or_insert_with(|| {
                    kept_positions.push(positions[old]);
                    kept_colors.push(colors[old]);
                    (kept_positions.len() - 1) as u32
                })
            })
        })
        .collect();

    (kept_positions, kept_colors, faces)
}

fn vertex_neighbors(count: usize, faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
    let mut neighbors = vec![Vec::new(); count];
    for &[a, b, c] in faces {
        for (from, to) in [(a, b), (b, c), (c, a)] {
            neighbors[from as usize].push(to);
            neighbors[to as usize].push(from);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

fn laplacian_pass(positions: &[Vec3], neighbors: &[Vec<u32>]) -> Vec<Vec3> {
    positions
        .iter()
        .zip(neighbors)
        .map(|(&p, adjacent)| {
            if adjacent.is_empty() {
                return p;
            }
            let sum: Vec3 = adjacent.iter().map(|&n| positions[n as usize]).sum();
            let centroid = sum / adjacent.len() as f32;
            p.lerp(centroid, SMOOTHING_WEIGHT)
        })
        .collect()
}

/// UVs from the projection plane, normalized over the projected bounds.
fn planar_uvs(positions: &[Vec3], plane: ProjectionPlane) -> Vec<Vec2> {
    let projected: Vec<Vec2> = positions
        .iter()
        .map(|&p| {
            let (u, v) = plane.project(p);
            Vec2::new(u, v)
        })
        .collect();

    let (min, max) = projected.iter().fold(
        (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
        |(min, max), &p| (min.min(p), max.max(p)),
    );
    let extent = max - min;
    let normalize = |value: f32, low: f32, span: f32| {
        if span > f32::EPSILON {
            ((value - low) / span).clamp(0.0, 1.0)
        } else {
            0.5
        }
    };

    projected
        .into_iter()
        .map(|p| {
            Vec2::new(
                normalize(p.x, min.x, extent.x),
                normalize(p.y, min.y, extent.y),
            )
        })
        .collect()
}

fn to_rgb(color: Vec3) -> Rgb<u8> {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    Rgb([c.x as u8, c.y as u8, c.z as u8])
}

/// Rasterize every face into UV space, interpolating vertex colors.
fn bake_texture(uvs: &[Vec2], colors: &[Vec3], faces: &[[u32; 3]], size: u32) -> RgbImage {
    let size = size.max(1);
    let mut image = RgbImage::from_pixel(size, size, UNCOVERED_TEXEL);
    let scale = (size - 1) as f32;

    for face in faces {
        let [a, b, c] = face.map(|i| i as usize);
        let (pa, pb, pc) = (uvs[a] * scale, uvs[b] * scale, uvs[c] * scale);
        let area = (pb - pa).perp_dot(pc - pa);
        if area.abs() <= f32::EPSILON {
            continue;
        }

        let min = pa.min(pb).min(pc).floor().max(Vec2::ZERO);
        let max = pa.max(pb).max(pc).ceil().min(Vec2::splat(scale));
        for y in min.y as u32..=max.y as u32 {
            for x in min.x as u32..=max.x as u32 {
                let p = Vec2::new(x as f32, y as f32);
                let wa = (pb - p).perp_dot(pc - p) / area;
                let wb = (pc - p).perp_dot(pa - p) / area;
                let wc = 1.0 - wa - wb;
                if wa < -1e-4 || wb < -1e-4 || wc < -1e-4 {
                    continue;
                }
                let color = colors[a] * wa + colors[b] * wb + colors[c] * wc;
                image.put_pixel(x, y, to_rgb(color));
            }
        }
    }
    image
}
