//! Scene graph owned by the presentation thread.

use std::collections::BTreeMap;
use std::sync::mpsc;

use glam::Mat4;
use thiserror::Error;
use tracing::{debug, warn};

use super::dispatch::{SceneDispatcher, SceneTask};
use super::node::{NodeId, SceneNode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown scene node {0}")]
    UnknownNode(NodeId),
}

/// Node arena with a single root.
///
/// Nodes are keyed by [`NodeId`] in a `BTreeMap`, so iteration (and therefore
/// animation order) follows creation order.
pub struct Scene {
    nodes: BTreeMap<NodeId, SceneNode>,
    root: NodeId,
    next_id: u64,
    sender: mpsc::Sender<SceneTask>,
    receiver: mpsc::Receiver<SceneTask>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene containing only the root node.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        let root = NodeId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, SceneNode::empty().with_name("root"));
        Self {
            nodes,
            root,
            next_id: 1,
            sender,
            receiver,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Handle for queueing work from other threads.
    pub fn dispatcher(&self) -> SceneDispatcher {
        SceneDispatcher::new(self.sender.clone())
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// First node (in creation order) with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name() == Some(name))
            .map(|(&id, _)| id)
    }

    /// Attach `node` under `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: SceneNode) -> Result<NodeId, SceneError> {
        let id = NodeId(self.next_id);
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(SceneError::UnknownNode(parent))?;
        parent_node.children.push(id);
        self.next_id += 1;

        node.parent = Some(parent);
        node.children.clear();
        self.nodes.insert(id, node);
        debug!("Added {} under {}", id, parent);
        Ok(id)
    }

    /// Remove a node and its whole subtree. Returns the removed node itself
    /// (with its children list emptied). The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        if id == self.root {
            warn!("Refusing to remove the scene root");
            return None;
        }
        let mut node = self.nodes.remove(&id)?;

        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&child| child != id);
        }

        let mut pending = std::mem::take(&mut node.children);
        while let Some(child) = pending.pop() {
            if let Some(mut removed) = self.nodes.remove(&child) {
                pending.append(&mut removed.children);
            }
        }

        node.parent = None;
        debug!("Removed {}", id);
        Some(node)
    }

    /// Remove every child of `id`. Returns how many direct children were
    /// removed.
    pub fn clear_children(&mut self, id: NodeId) -> usize {
        let children = self.children(id).to_vec();
        children
            .into_iter()
            .filter_map(|child| self.remove(child))
            .count()
    }

    /// World transform of a node: the product of its ancestors' local
    /// transforms and its own.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(&p)) {
            matrix = parent.transform.matrix() * matrix;
            node = parent;
        }
        Some(matrix)
    }

    /// Number of the node's surface points that survive its shading's
    /// discard test this frame.
    pub fn visible_point_count(&self, id: NodeId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        let world = self.world_matrix(id)?;
        Some(
            node.content
                .local_points()
                .filter(|&p| node.shading.is_visible(world.transform_point3(p)))
                .count(),
        )
    }

    /// Nodes that currently run a reveal animation.
    pub fn animating_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.reveal.is_some())
            .map(|(&id, _)| id)
    }

    /// Run tasks queued through dispatchers. Tasks queued while this runs are
    /// left for the next call. Returns the number of tasks executed.
    pub fn process_pending(&mut self) -> usize {
        let tasks: Vec<SceneTask> = self.receiver.try_iter().collect();
        let count = tasks.len();
        for task in tasks {
            task(self);
        }
        count
    }

    /// One presentation frame: run pending tasks, then advance every reveal
    /// animation by `dt` seconds. Nodes attached by those tasks are shown at
    /// their starting state and only advance from the next tick.
    pub fn tick(&mut self, dt: f64) {
        let attached_from = NodeId(self.next_id);
        self.process_pending();
        for (_, node) in self.nodes.range_mut(..attached_from) {
            node.advance_reveal(dt);
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}
