//! Headless presentation layer
//!
//! A small scene graph standing in for the renderer: nodes carry content,
//! a pivoted transform, shading state and an optional reveal animation.
//! Only the thread that owns the [`Scene`] mutates it; other threads hand
//! work over through a [`SceneDispatcher`].

pub mod dispatch;
pub mod node;
pub mod scene_graph;
pub mod uniforms;

pub use dispatch::{SceneDispatcher, SceneTask};
pub use node::{
    LightingModel, NodeContent, NodeId, REVEAL_PARAMETER, SceneNode, Shading, Transform,
};
pub use scene_graph::{Scene, SceneError};
pub use uniforms::ShadingUniforms;
