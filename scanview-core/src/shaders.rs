//! Shader source code embedded at compile time.
//!
//! The WGSL here is the GPU counterpart of [`crate::reveal::SurfaceVisibility`].
//! It is exposed as a string so a renderer can build its pipeline from it;
//! this crate itself never compiles it.

/// Dissolve fragment shader: discards fragments whose noise value exceeds
/// the reveal parameter in `ShadingUniforms.param.x`.
pub const DISSOLVE_FRAGMENT: &str = include_str!("../shaders/dissolve.wgsl");

/// Entry point of [`DISSOLVE_FRAGMENT`].
pub const DISSOLVE_ENTRY_POINT: &str = "fs_main";
