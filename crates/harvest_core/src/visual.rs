//! Boundary to the presentation layer.
//!
//! The simulation never builds meshes or touches a scene graph. It asks a
//! [`VisualLayer`] for an opaque [`VisualHandle`] when an entity appears and
//! hands the handle back when the entity goes away. Every call is
//! fire-and-forget: nothing returned here feeds back into simulation state.

use serde::{Deserialize, Serialize};

use crate::kinds::Tier;
use crate::math::Vec2Fixed;

/// Opaque handle to a visual proxy, owned by exactly one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

/// What kind of proxy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualKind {
    /// Home base structure.
    Base,
    /// Harvesting worker.
    Worker,
    /// Resource deposit, with its starting amount.
    ResourceNode {
        /// Amount the node was created with.
        amount: u32,
    },
    /// Hostile unit of the given tier.
    Hostile(Tier),
    /// Defender of the given tier.
    Defender(Tier),
}

/// Presentation collaborator driven by the simulation.
pub trait VisualLayer {
    /// Build a proxy at `position` and return its handle.
    fn create_visual(&mut self, kind: VisualKind, position: Vec2Fixed) -> VisualHandle;

    /// Release a proxy. Called exactly once per handle.
    fn destroy_visual(&mut self, handle: VisualHandle);

    /// Toggle selection highlight.
    fn set_visual_selected(&mut self, handle: VisualHandle, selected: bool);

    /// Play a short attack flash. Reverting it is the layer's business.
    fn pulse_visual(&mut self, handle: VisualHandle);

    /// Follow a unit that moved this tick.
    fn move_visual(&mut self, _handle: VisualHandle, _position: Vec2Fixed) {}

    /// Per-tick idle decoration of a resource node (dot count, bobbing).
    fn refresh_node(&mut self, _handle: VisualHandle, _remaining: u32) {}
}

/// Visual layer that draws nothing and only hands out unique handles.
#[derive(Debug, Clone, Default)]
pub struct NullVisuals {
    next: u64,
}

impl VisualLayer for NullVisuals {
    fn create_visual(&mut self, _kind: VisualKind, _position: Vec2Fixed) -> VisualHandle {
        self.next += 1;
        VisualHandle(self.next)
    }

    fn destroy_visual(&mut self, _handle: VisualHandle) {}

    fn set_visual_selected(&mut self, _handle: VisualHandle, _selected: bool) {}

    fn pulse_visual(&mut self, _handle: VisualHandle) {}
}
