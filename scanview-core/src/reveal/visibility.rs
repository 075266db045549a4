//! Per-point visibility predicate for the dissolve effect.
//!
//! This is the CPU reference of `shaders/dissolve.wgsl`: the same noise, the
//! same spatial scale and the same comparison. A surface point is kept when
//! its noise value is at or below the reveal parameter.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::noise;

pub const DEFAULT_NOISE_FREQUENCY: f32 = 450.0;
pub const DEFAULT_NOISE_OFFSET: f32 = 0.1;

/// Noise-driven discard test attached to a node's shading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceVisibility {
    /// Spatial frequency applied to world positions before sampling noise.
    pub frequency: f32,
    /// Offset added to world positions before scaling.
    pub offset: f32,
}

impl Default for SurfaceVisibility {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_NOISE_FREQUENCY,
            offset: DEFAULT_NOISE_OFFSET,
        }
    }
}

impl SurfaceVisibility {
    /// Noise value of a world-space point, in `[0, 1]`.
    pub fn noise_value(&self, world_position: Vec3) -> f32 {
        noise::unit((world_position + self.offset) * self.frequency)
    }

    /// Whether the point survives at reveal parameter `t`. Everything is
    /// visible once `t` reaches 1.
    pub fn is_visible(&self, world_position: Vec3, t: f32) -> bool {
        t >= 1.0 || self.noise_value(world_position) <= t
    }

    /// Count the points of `positions` that survive at `t`.
    pub fn count_visible(&self, positions: impl Iterator<Item = Vec3>, t: f32) -> usize {
        positions.filter(|&p| self.is_visible(p, t)).count()
    }
}
