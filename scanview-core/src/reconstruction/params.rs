//! Meshing parameters passed to the reconstruction engine.

use serde::{Deserialize, Serialize};

use super::ReconstructionError;

/// Largest texture edge accepted for UV-mapped output.
pub const MAX_TEXTURE_RESOLUTION: u32 = 8192;

/// How surface color is represented on the reconstructed mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColoringStrategy {
    /// Texture atlas addressed by per-vertex UVs.
    #[default]
    UvMap,
    VertexColor,
}

/// Parameters for one reconstruction job. Copied into the job on submission,
/// so later changes by the caller never reach a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingParameters {
    /// Level of detail; smaller is finer.
    pub resolution: u32,
    /// Smoothing passes applied to the surface.
    pub smoothness: u32,
    /// How aggressively low-confidence boundary geometry is trimmed.
    pub surface_trimming_amount: u32,
    /// Whether the mesh must be watertight.
    pub closed: bool,
    pub texture_resolution_pixels: u32,
    pub coloring_strategy: ColoringStrategy,
}

impl Default for MeshingParameters {
    fn default() -> Self {
        Self {
            resolution: 4,
            smoothness: 1,
            surface_trimming_amount: 5,
            closed: true,
            texture_resolution_pixels: 1024,
            coloring_strategy: ColoringStrategy::UvMap,
        }
    }
}

impl MeshingParameters {
    pub fn validate(&self) -> Result<(), ReconstructionError> {
        if self.resolution == 0 {
            return Err(ReconstructionError::InvalidParameters(
                "resolution must be at least 1".to_string(),
            ));
        }
        if self.coloring_strategy == ColoringStrategy::UvMap
            && !(1..=MAX_TEXTURE_RESOLUTION).contains(&self.texture_resolution_pixels)
        {
            return Err(ReconstructionError::InvalidParameters(format!(
                "texture resolution {} outside 1..={}",
                self.texture_resolution_pixels, MAX_TEXTURE_RESOLUTION
            )));
        }
        Ok(())
    }
}
