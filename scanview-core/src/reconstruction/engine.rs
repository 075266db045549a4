//! Reconstruction engine interface.

use std::sync::atomic::{AtomicBool, Ordering};

use scanview_data::{DataError, PointCloud, ReconstructedMesh};
use thiserror::Error;

use super::MeshingParameters;
use crate::scene::SceneError;

/// Errors delivered through a job's completion.
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("invalid meshing parameters: {0}")]
    InvalidParameters(String),

    #[error("point cloud is empty")]
    EmptyPointCloud,

    #[error("not enough points to build a surface: {0}")]
    InsufficientPoints(usize),

    #[error("reconstruction produced an empty mesh")]
    EmptyMesh,

    #[error("reconstruction was cancelled")]
    Cancelled,

    #[error("engine failure: {0}")]
    Engine(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(#[from] DataError),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("failed to start reconstruction worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("reconstruction worker panicked")]
    WorkerPanicked,

    #[error("presentation scene is no longer available")]
    SceneUnavailable,
}

/// Progress sink handed to an engine. Forwards percentages to the job's
/// progress callback and exposes the job's cancellation flag.
pub struct ProgressReporter<'a> {
    callback: &'a mut (dyn FnMut(f32) + Send),
    cancel: &'a AtomicBool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: &'a mut (dyn FnMut(f32) + Send), cancel: &'a AtomicBool) -> Self {
        Self { callback, cancel }
    }

    /// Report completion in percent (clamped to `0..=100`). Returns `false`
    /// once the job has been cancelled; engines should stop and return
    /// [`ReconstructionError::Cancelled`] at that point.
    pub fn report(&mut self, percent: f32) -> bool {
        (self.callback)(percent.clamp(0.0, 100.0));
        !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` if the job was cancelled, for use with `?`.
    pub fn checkpoint(&mut self, percent: f32) -> Result<(), ReconstructionError> {
        if self.report(percent) {
            Ok(())
        } else {
            Err(ReconstructionError::Cancelled)
        }
    }
}

/// A surface reconstruction backend.
///
/// `reconstruct` runs on a worker thread. It may call `progress` any number
/// of times and must poll it often enough for cancellation to take effect;
/// there is no preemption.
pub trait ReconstructionEngine: Send + Sync {
    fn reconstruct(
        &self,
        cloud: &PointCloud,
        params: &MeshingParameters,
        progress: &mut ProgressReporter<'_>,
    ) -> Result<ReconstructedMesh, ReconstructionError>;
}
