//! Hand-off of work from background threads to the presentation thread.

use std::sync::mpsc;

use tracing::debug;

use super::Scene;

/// A unit of work that runs on the presentation thread with the scene.
pub type SceneTask = Box<dyn FnOnce(&mut Scene) + Send + 'static>;

/// Cloneable, thread-safe handle for queueing [`SceneTask`]s.
#[derive(Clone)]
pub struct SceneDispatcher {
    sender: mpsc::Sender<SceneTask>,
}

impl SceneDispatcher {
    pub(crate) fn new(sender: mpsc::Sender<SceneTask>) -> Self {
        Self { sender }
    }

    /// Queue `task` for the next [`Scene::process_pending`]. Returns `false`
    /// if the scene has been dropped; the task is discarded in that case.
    pub fn dispatch<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut Scene) + Send + 'static,
    {
        match self.sender.send(Box::new(task)) {
            Ok(()) => true,
            Err(_) => {
                debug!("Scene dropped; discarding dispatched task");
                false
            }
        }
    }
}

impl std::fmt::Debug for SceneDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneDispatcher").finish_non_exhaustive()
    }
}
