//! Asynchronous mesh reconstruction
//!
//! A [`ReconstructionOrchestrator`] runs a [`ReconstructionEngine`] on a
//! worker thread per job and hands the finished mesh to the presentation
//! thread, where it is attached to the scene with the reveal effect.
//!
//! [`DelaunayEngine`] is a small reference engine so the pipeline can run
//! without an external mesher.

pub mod delaunay;
pub mod engine;
pub mod orchestrator;
pub mod params;

pub use delaunay::DelaunayEngine;
pub use engine::{ProgressReporter, ReconstructionEngine, ReconstructionError};
pub use orchestrator::{
    ContainerPolicy, JobHandle, JobId, JobStatus, ReconstructionOrchestrator, build_reveal_node,
};
pub use params::{ColoringStrategy, MeshingParameters};
