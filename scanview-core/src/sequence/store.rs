//! Sequential frame storage.

use std::fs;
use std::path::{Path, PathBuf};

use scanview_data::{PointCloud, load_point_cloud_from_ply};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a sequence directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to start frame loader: {0}")]
    Spawn(std::io::Error),
}

/// Ordered source of recorded frames.
pub trait FrameStore: Send {
    /// Read the frame at the cursor and advance. `None` once the sequence is
    /// exhausted (or the next frame cannot be read).
    fn load_next(&mut self) -> Option<PointCloud>;

    /// Move the cursor back to the first frame.
    fn reset(&mut self);

    /// Index of the frame the next [`load_next`](Self::load_next) returns.
    fn position(&self) -> usize;

    /// Location identifying the stored sequence, if it lives on disk.
    fn container_path(&self) -> Option<&Path>;

    /// Delete the whole stored sequence. Later loads return `None`.
    fn delete(&mut self) -> Result<(), SequenceError>;
}

/// Frames stored as `*.ply` files in one directory, played in file name
/// order.
#[derive(Debug)]
pub struct PlySequenceStore {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
    deleted: bool,
}

impl PlySequenceStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SequenceError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(SequenceError::NotADirectory(dir));
        }

        let mut frames = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_ply = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("ply"));
            if is_ply && path.is_file() {
                frames.push(path);
            }
        }
        frames.sort();

        info!("Opened sequence {} with {} frames", dir.display(), frames.len());
        Ok(Self {
            dir,
            frames,
            next: 0,
            deleted: false,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_paths(&self) -> &[PathBuf] {
        &self.frames
    }
}

impl FrameStore for PlySequenceStore {
    fn load_next(&mut self) -> Option<PointCloud> {
        if self.deleted {
            return None;
        }
        let path = self.frames.get(self.next)?;
        match load_point_cloud_from_ply(path) {
            Ok(cloud) => {
                self.next += 1;
                Some(cloud)
            }
            Err(e) => {
                warn!("Failed to read frame {}: {}", path.display(), e);
                None
            }
        }
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn position(&self) -> usize {
        self.next
    }

    fn container_path(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn delete(&mut self) -> Result<(), SequenceError> {
        if self.deleted {
            return Ok(());
        }
        fs::remove_dir_all(&self.dir)?;
        self.deleted = true;
        self.frames.clear();
        self.next = 0;
        info!("Deleted sequence {}", self.dir.display());
        Ok(())
    }
}

/// Frames held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySequenceStore {
    frames: Vec<PointCloud>,
    next: usize,
    path: Option<PathBuf>,
}

impl MemorySequenceStore {
    pub fn new(frames: Vec<PointCloud>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Report `path` as the container path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameStore for MemorySequenceStore {
    fn load_next(&mut self) -> Option<PointCloud> {
        let frame = self.frames.get(self.next)?.clone();
        self.next += 1;
        Some(frame)
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn position(&self) -> usize {
        self.next
    }

    fn container_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn delete(&mut self) -> Result<(), SequenceError> {
        debug!("Dropping {} in-memory frames", self.frames.len());
        self.frames.clear();
        self.next = 0;
        Ok(())
    }
}
