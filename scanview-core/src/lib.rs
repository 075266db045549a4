//! Scanview Core Crate
//!
//! Presentation-side logic for scanned meshes: a procedural reveal effect
//! for freshly reconstructed meshes and looping playback of recorded
//! point-cloud sequences. Rendering is left to the host; this crate keeps a
//! headless scene graph that a renderer can mirror.
//!
//! ## Modules
//!
//! - [`noise`]: 3D simplex noise driving the dissolve pattern
//! - [`reveal`]: reveal timeline, per-node animation state and visibility test
//! - [`scene`]: scene graph, cross-thread dispatch and shader uniforms
//! - [`reconstruction`]: asynchronous reconstruction jobs and a reference engine
//! - [`sequence`]: frame storage and the sequence player
//! - [`config`]: JSON viewer configuration
//! - [`shaders`]: WGSL source of the dissolve fragment stage

pub mod config;
pub mod noise;
pub mod reconstruction;
pub mod reveal;
pub mod scene;
pub mod sequence;
pub mod shaders;

pub use config::{ConfigError, PlaybackConfig, RevealConfig, ViewerConfig};
pub use reconstruction::{
    ContainerPolicy, DelaunayEngine, JobHandle, JobStatus, MeshingParameters,
    ReconstructionEngine, ReconstructionError, ReconstructionOrchestrator,
};
pub use reveal::{RevealState, RevealTimeline, SurfaceVisibility};
pub use scene::{NodeId, Scene, SceneDispatcher, SceneNode};
pub use sequence::{FrameSequencePlayer, FrameStore, MemorySequenceStore, PlySequenceStore};
