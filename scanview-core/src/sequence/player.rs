//! Looping playback of a recorded frame sequence.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use scanview_data::PointCloud;
use tracing::{debug, info, warn};

use super::{FrameStore, SequenceError};
use crate::scene::{NodeContent, NodeId, Scene, SceneDispatcher, SceneNode};

/// Name given to the node showing the current frame.
pub const FRAME_NODE_NAME: &str = "point cloud";

/// Frames were recorded at a fixed rate; loading faster than this makes
/// playback look sped up.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Snapshot of playback state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameCursor {
    /// Index of the next frame to load.
    pub index: usize,
    /// Index of the frame currently shown, if any.
    pub displayed: Option<usize>,
    pub is_playing: bool,
    pub container_path: Option<PathBuf>,
}

enum LoadRequest {
    /// `generation` is the playback run that asked for the frame, or `None`
    /// for a one-off load.
    Next { generation: Option<u64> },
    Shutdown,
}

struct Shared {
    store: Mutex<Box<dyn FrameStore>>,
    cursor: Mutex<FrameCursor>,
    frame_node: Mutex<Option<NodeId>>,
    active: AtomicBool,
    /// Bumped by every `play`, so a frame requested by an earlier run does
    /// not continue that run after a pause.
    generation: AtomicU64,
    frame_interval: Duration,
}

impl Shared {
    /// Load the next frame, restarting the sequence when it runs out.
    fn load_next(&self) -> Option<(usize, PointCloud)> {
        let mut store = self.store.lock();
        let index = store.position();
        match store.load_next() {
            Some(frame) => {
                self.cursor.lock().index = index + 1;
                Some((index, frame))
            }
            None => {
                debug!("Sequence exhausted after {} frames; restarting", index);
                store.reset();
                self.cursor.lock().index = 0;
                None
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn is_playing(&self) -> bool {
        self.cursor.lock().is_playing
    }

    /// Whether a frame from playback run `generation` should request the
    /// next one.
    fn continues(&self, generation: u64) -> bool {
        let cursor = self.cursor.lock();
        cursor.is_playing && self.generation.load(Ordering::Acquire) == generation
    }
}

/// Plays a [`FrameStore`] into a container node at a fixed cadence.
///
/// Each iteration runs load, wait one frame interval, then hands the frame
/// to the presentation thread, which swaps the displayed node and, while
/// playing, requests the next load. Exhaustion restarts the sequence, so
/// playback loops until [`dismiss`](Self::dismiss).
pub struct FrameSequencePlayer {
    shared: Arc<Shared>,
    requests: mpsc::Sender<LoadRequest>,
    loader: Option<JoinHandle<()>>,
    delete_on_dismiss: bool,
}

impl FrameSequencePlayer {
    pub fn new(
        store: Box<dyn FrameStore>,
        dispatcher: SceneDispatcher,
        container: NodeId,
    ) -> Result<Self, SequenceError> {
        Self::with_frame_interval(store, dispatcher, container, DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_frame_interval(
        store: Box<dyn FrameStore>,
        dispatcher: SceneDispatcher,
        container: NodeId,
        frame_interval: Duration,
    ) -> Result<Self, SequenceError> {
        let cursor = FrameCursor {
            container_path: store.container_path().map(PathBuf::from),
            ..FrameCursor::default()
        };
        let shared = Arc::new(Shared {
            store: Mutex::new(store),
            cursor: Mutex::new(cursor),
            frame_node: Mutex::new(None),
            active: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            frame_interval,
        });

        let (requests, receiver) = mpsc::channel();
        let loader_shared = Arc::clone(&shared);
        let loader_requests = requests.clone();
        let loader = thread::Builder::new()
            .name("frame-loader".to_string())
            .spawn(move || {
                run_loader(loader_shared, receiver, loader_requests, dispatcher, container)
            })
            .map_err(SequenceError::Spawn)?;

        Ok(Self {
            shared,
            requests,
            loader: Some(loader),
            delete_on_dismiss: true,
        })
    }

    /// Whether [`dismiss`](Self::dismiss) deletes the stored sequence.
    /// Defaults to `true`.
    pub fn set_delete_on_dismiss(&mut self, delete: bool) {
        self.delete_on_dismiss = delete;
    }

    /// Load the next frame on the calling thread, bypassing the loader.
    /// Returns `None` on exhaustion, after which the sequence starts over.
    pub fn load_next(&self) -> Option<PointCloud> {
        self.shared.load_next().map(|(_, frame)| frame)
    }

    /// Load and show one frame without starting playback.
    pub fn show_first_frame(&self) {
        self.request(None);
    }

    /// Start looping playback. No-op while already playing.
    pub fn play(&self) {
        let generation = {
            let mut cursor = self.shared.cursor.lock();
            if cursor.is_playing {
                return;
            }
            cursor.is_playing = true;
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        };
        info!("Starting sequence playback");
        self.request(Some(generation));
    }

    /// Stop requesting frames after the one in flight.
    pub fn pause(&self) {
        self.shared.cursor.lock().is_playing = false;
    }

    /// Tap behaviour: start playback when stopped, dismiss when playing.
    pub fn toggle(&mut self, scene: &mut Scene) -> Result<(), SequenceError> {
        if self.shared.is_playing() {
            self.dismiss(scene)
        } else {
            self.play();
            Ok(())
        }
    }

    pub fn cursor(&self) -> FrameCursor {
        self.shared.cursor.lock().clone()
    }

    pub fn is_dismissed(&self) -> bool {
        !self.shared.is_active()
    }

    /// Stop playback, wait for the in-flight load, delete the stored
    /// sequence and remove the displayed frame. Must run on the thread that
    /// owns `scene`. Later calls do nothing.
    pub fn dismiss(&mut self, scene: &mut Scene) -> Result<(), SequenceError> {
        if !self.shared.is_active() {
            return Ok(());
        }
        info!("Dismissing sequence playback");
        self.stop_loader();

        if let Some(node) = self.shared.frame_node.lock().take() {
            scene.remove(node);
        }
        self.shared.cursor.lock().displayed = None;

        if self.delete_on_dismiss {
            // The loader has been joined, so no read can race the delete.
            self.shared.store.lock().delete()?;
        }
        Ok(())
    }

    fn request(&self, generation: Option<u64>) {
        if !self.shared.is_active() {
            debug!("Ignoring frame request after dismissal");
            return;
        }
        if self.requests.send(LoadRequest::Next { generation }).is_err() {
            warn!("Frame loader has stopped");
        }
    }

    fn stop_loader(&mut self) {
        self.shared.active.store(false, Ordering::Release);
        self.shared.cursor.lock().is_playing = false;
        let _ = self.requests.send(LoadRequest::Shutdown);
        if let Some(loader) = self.loader.take() {
            if loader.join().is_err() {
                warn!("Frame loader panicked");
            }
        }
    }
}

impl Drop for FrameSequencePlayer {
    fn drop(&mut self) {
        self.stop_loader();
    }
}

impl std::fmt::Debug for FrameSequencePlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSequencePlayer")
            .field("cursor", &self.cursor())
            .field("dismissed", &self.is_dismissed())
            .finish_non_exhaustive()
    }
}

fn run_loader(
    shared: Arc<Shared>,
    receiver: mpsc::Receiver<LoadRequest>,
    requests: mpsc::Sender<LoadRequest>,
    dispatcher: SceneDispatcher,
    container: NodeId,
) {
    while let Ok(LoadRequest::Next { generation }) = receiver.recv() {
        if !shared.is_active() {
            break;
        }

        let frame = shared.load_next();
        thread::sleep(shared.frame_interval);

        let task_shared = Arc::clone(&shared);
        let task_requests = requests.clone();
        let dispatched = dispatcher.dispatch(move |scene: &mut Scene| {
            swap_frame(scene, &task_shared, container, frame);
            let Some(generation) = generation else {
                return;
            };
            if task_shared.is_active() && task_shared.continues(generation) {
                let _ = task_requests.send(LoadRequest::Next {
                    generation: Some(generation),
                });
            }
        });
        if !dispatched {
            warn!("Scene is gone; stopping frame loader");
            break;
        }
    }
    debug!("Frame loader finished");
}

/// Replace the displayed frame node. Runs on the presentation thread.
fn swap_frame(
    scene: &mut Scene,
    shared: &Shared,
    container: NodeId,
    frame: Option<(usize, PointCloud)>,
) {
    if !shared.is_active() {
        return;
    }
    let Some((index, cloud)) = frame else {
        return;
    };

    let mut frame_node = shared.frame_node.lock();
    if let Some(previous) = frame_node.take() {
        scene.remove(previous);
    }

    let node = SceneNode::new(NodeContent::PointCloud(Arc::new(cloud))).with_name(FRAME_NODE_NAME);
    match scene.add_child(container, node) {
        Ok(id) => {
            *frame_node = Some(id);
            shared.cursor.lock().displayed = Some(index);
        }
        Err(e) => warn!("Cannot show frame {}: {}", index, e),
    }
}
