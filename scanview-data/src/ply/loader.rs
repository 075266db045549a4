//! PLY file loading functions

use crate::DataError;
use crate::types::{Point, PointCloud};
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// Face structure for PLY files
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct PlyFace {
    vertex_indices: Vec<i32>,
}

// PLY file structure
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
    #[serde(default, rename = "face", skip_serializing_if = "Vec::is_empty")]
    face: Vec<PlyFace>,
}

fn parse_ply(path: &Path) -> Result<PlyFile, DataError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })
}

fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
        _ => None,
    })
}

fn get_u8(prop: Option<&JsonValue>) -> Option<u8> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n
            .as_u64()
            .map(|u| u as u8)
            .or_else(|| n.as_i64().map(|i| i as u8)),
        _ => None,
    })
}

fn vertex_color(vertex: &HashMap<String, JsonValue>) -> Vec3 {
    if let (Some(r), Some(g), Some(b)) = (
        get_u8(vertex.get("red")),
        get_u8(vertex.get("green")),
        get_u8(vertex.get("blue")),
    ) {
        Vec3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    } else if let (Some(r), Some(g), Some(b)) = (
        get_u8(vertex.get("r")),
        get_u8(vertex.get("g")),
        get_u8(vertex.get("b")),
    ) {
        Vec3::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    } else {
        Point::default().color
    }
}

/// Load one point-cloud frame from a PLY file.
///
/// Positions are required; colors are read from `red/green/blue` (or
/// `r/g/b`) and default to light grey. Faces, if any, are ignored.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_point_cloud_from_ply(path: impl AsRef<Path>) -> Result<PointCloud, DataError> {
    let path = path.as_ref();
    debug!("Loading PLY point cloud from: {}", path.display());

    let ply_data = parse_ply(path)?;

    info!(
        "PLY file parsed: {} vertices, {} faces",
        ply_data.vertex.len(),
        ply_data.face.len()
    );

    let mut points = Vec::with_capacity(ply_data.vertex.len());

    for (index, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |property: &'static str| {
            get_f32(vertex.get(property)).ok_or(DataError::MissingProperty { property, index })
        };
        let position = Vec3::new(coord("x")?, coord("y")?, coord("z")?);

        points.push(Point::new(position, vertex_color(vertex)));
    }

    debug!("Loaded {} points from PLY file", points.len());
    Ok(PointCloud::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("scanview-data-missing-frame.ply");
        let result = load_point_cloud_from_ply(&path);
        assert!(matches!(result, Err(DataError::Io(_))));
    }

    #[test]
    fn test_vertex_color_fallbacks() {
        let mut vertex = HashMap::new();
        assert_eq!(vertex_color(&vertex), Vec3::splat(0.8));

        vertex.insert("r".to_string(), JsonValue::from(255u64));
        vertex.insert("g".to_string(), JsonValue::from(0u64));
        vertex.insert("b".to_string(), JsonValue::from(0u64));
        assert_eq!(vertex_color(&vertex), Vec3::new(1.0, 0.0, 0.0));

        vertex.insert("red".to_string(), JsonValue::from(0u64));
        vertex.insert("green".to_string(), JsonValue::from(255u64));
        vertex.insert("blue".to_string(), JsonValue::from(0u64));
        assert_eq!(vertex_color(&vertex), Vec3::new(0.0, 1.0, 0.0));
    }
}
