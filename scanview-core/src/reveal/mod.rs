//! Procedural reveal ("materialize") animation
//!
//! A reconstructed mesh fades in by discarding every surface point whose
//! noise value is above the current reveal parameter `t`. The parameter is
//! driven by a looping piecewise-linear [`RevealTimeline`], which also
//! produces an eased rotation about the mesh's vertical axis.
//!
//! - [`timeline`]: keyframed reveal curve and rotation curve
//! - [`state`]: per-node elapsed time and last sampled values
//! - [`visibility`]: per-point discard predicate (CPU reference of the shader)
//! - [`easing`]: easing curves

pub mod easing;
pub mod state;
pub mod timeline;
pub mod visibility;

pub use easing::Easing;
pub use state::RevealState;
pub use timeline::{Keyframe, RevealSample, RevealTimeline, RotationCurve, TimelineError};
pub use visibility::SurfaceVisibility;
