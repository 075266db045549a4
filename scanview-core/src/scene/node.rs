//! Scene nodes: content, transform and shading.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use scanview_data::{PointCloud, ReconstructedMesh};

use crate::reveal::{RevealState, SurfaceVisibility};

/// Shading parameter that carries the reveal value `t`.
pub const REVEAL_PARAMETER: &str = "reveal";

/// Stable identifier of a node inside one [`Scene`](super::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What a node renders.
#[derive(Debug, Clone, Default)]
pub enum NodeContent {
    /// Grouping node without geometry.
    #[default]
    Empty,
    Mesh(Arc<ReconstructedMesh>),
    PointCloud(Arc<PointCloud>),
}

impl NodeContent {
    /// Local-space surface points: mesh vertices or cloud points.
    pub fn local_points(&self) -> Box<dyn Iterator<Item = Vec3> + '_> {
        match self {
            NodeContent::Empty => Box::new(std::iter::empty()),
            NodeContent::Mesh(mesh) => Box::new(mesh.positions.iter().copied()),
            NodeContent::PointCloud(cloud) => Box::new(cloud.positions()),
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<ReconstructedMesh>> {
        match self {
            NodeContent::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_point_cloud(&self) -> Option<&Arc<PointCloud>> {
        match self {
            NodeContent::PointCloud(cloud) => Some(cloud),
            _ => None,
        }
    }
}

/// Local transform. Rotation is applied about `pivot`, which is the node's
/// local origin: `translate(translation) * rotate_y(rotation) * translate(-pivot)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub pivot: Vec3,
    /// Rotation about +Y in radians.
    pub rotation: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            pivot: Vec3::ZERO,
            rotation: 0.0,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_y(self.rotation)
            * Mat4::from_translation(-self.pivot)
    }
}

/// How lighting is applied to a node's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightingModel {
    #[default]
    Lambert,
    /// Unlit; looks best on a spinning scan.
    Constant,
}

/// Shading state: optional discard predicate plus named scalar parameters.
#[derive(Debug, Clone, Default)]
pub struct Shading {
    pub visibility: Option<SurfaceVisibility>,
    pub parameters: BTreeMap<String, f32>,
    pub lighting: LightingModel,
}

impl Shading {
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.get(name).copied()
    }

    pub fn set_parameter(&mut self, name: &str, value: f32) {
        self.parameters.insert(name.to_string(), value);
    }

    /// Current reveal parameter, defaulting to fully visible when the node
    /// has no reveal animation.
    pub fn reveal(&self) -> f32 {
        self.parameter(REVEAL_PARAMETER).unwrap_or(1.0)
    }

    /// Whether a world-space point passes this shading's discard test.
    pub fn is_visible(&self, world_position: Vec3) -> bool {
        match &self.visibility {
            Some(visibility) => visibility.is_visible(world_position, self.reveal()),
            None => true,
        }
    }
}

/// A node in the scene graph.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: Option<String>,
    pub content: NodeContent,
    pub transform: Transform,
    pub shading: Shading,
    pub reveal: Option<RevealState>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(content: NodeContent) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attach a reveal animation and seed the shading parameter from its
    /// first sample.
    pub fn start_reveal(&mut self, state: RevealState) {
        self.shading
            .set_parameter(REVEAL_PARAMETER, state.reveal_parameter());
        self.transform.rotation = state.rotation_angle();
        self.reveal = Some(state);
    }

    /// Advance the reveal animation, writing `t` into shading and the angle
    /// into the transform.
    pub fn advance_reveal(&mut self, dt: f64) {
        if let Some(state) = self.reveal.as_mut() {
            let sample = state.advance(dt);
            self.shading.set_parameter(REVEAL_PARAMETER, sample.reveal);
            self.transform.rotation = sample.rotation;
        }
    }
}
