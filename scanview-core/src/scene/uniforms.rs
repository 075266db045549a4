//! GPU-facing shading parameters.

use super::node::{SceneNode, Shading};

/// Uniform block consumed by `shaders/dissolve.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct ShadingUniforms {
    /// Reveal parameter `t` in x; yzw unused.
    pub param: [f32; 4],
    /// Noise frequency in x, position offset in y, 1.0 in z when the discard
    /// test is enabled.
    pub noise: [f32; 4],
}

impl ShadingUniforms {
    pub fn from_shading(shading: &Shading) -> Self {
        let (frequency, offset, enabled) = match &shading.visibility {
            Some(visibility) => (visibility.frequency, visibility.offset, 1.0),
            None => (0.0, 0.0, 0.0),
        };
        Self {
            param: [shading.reveal(), 0.0, 0.0, 0.0],
            noise: [frequency, offset, enabled, 0.0],
        }
    }

    pub fn from_node(node: &SceneNode) -> Self {
        Self::from_shading(&node.shading)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
