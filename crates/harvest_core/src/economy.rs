//! Resource deposits and the resource bank.
//!
//! Workers pull discrete units out of [`ResourceNode`]s and carry them home,
//! where they are credited to the [`ResourceBank`]. A node is removed the
//! moment its last unit is taken.
//!
//! All amounts are unsigned integers; every subtraction is clamped so no
//! sequence of calls can underflow.

use serde::{Deserialize, Serialize};

use crate::math::Vec2Fixed;
use crate::registry::{NodeId, Positioned, Registry};
use crate::visual::{VisualHandle, VisualKind, VisualLayer};

/// A depletable resource deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Position in world space.
    pub position: Vec2Fixed,
    /// Units left in this node. Always positive while the node is registered.
    amount: u32,
    /// Visual proxy owned by this node.
    visual: VisualHandle,
}

impl ResourceNode {
    /// Units left in this node.
    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Check if this node is depleted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.amount == 0
    }

    /// Handle of the node's visual proxy.
    #[must_use]
    pub const fn visual(&self) -> VisualHandle {
        self.visual
    }
}

impl Positioned for ResourceNode {
    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

/// Result of a [`ResourceRegistry::collect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collection {
    /// Units actually removed from the node.
    pub taken: u32,
    /// Whether this collection emptied and removed the node.
    pub depleted: bool,
}

/// One line of [`ResourceRegistry::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSummary {
    /// One-based display index in registry order.
    pub index: usize,
    /// Node id.
    pub id: NodeId,
    /// Units remaining.
    pub amount: u32,
}

/// Every live resource node, in creation order.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    nodes: Registry<NodeId, ResourceNode>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node holding `amount` units.
    ///
    /// A zero amount creates nothing.
    pub fn create(
        &mut self,
        visuals: &mut dyn VisualLayer,
        position: Vec2Fixed,
        amount: u32,
    ) -> Option<NodeId> {
        if amount == 0 {
            return None;
        }
        let visual = visuals.create_visual(VisualKind::ResourceNode { amount }, position);
        let id = self.nodes.insert(ResourceNode {
            position,
            amount,
            visual,
        });
        tracing::trace!(?id, amount, "Resource node created");
        Some(id)
    }

    /// Nearest node to `from` that still holds resources.
    ///
    /// Ties go to the node created first.
    #[must_use]
    pub fn nearest(&self, from: Vec2Fixed) -> Option<NodeId> {
        self.nodes
            .nearest_where(from, |node| !node.is_depleted())
            .map(|(id, _)| id)
    }

    /// Take up to `requested` units from a node.
    ///
    /// The node gives what it has; the node is removed and its visual
    /// released when it hits zero. Unknown ids yield nothing.
    pub fn collect(
        &mut self,
        visuals: &mut dyn VisualLayer,
        id: NodeId,
        requested: u32,
    ) -> Collection {
        let Some(node) = self.nodes.get_mut(id) else {
            return Collection::default();
        };

        let taken = requested.min(node.amount);
        node.amount -= taken;

        if node.amount > 0 {
            return Collection {
                taken,
                depleted: false,
            };
        }

        if let Some(node) = self.nodes.remove(id) {
            visuals.destroy_visual(node.visual);
        }
        tracing::debug!(?id, taken, "Resource node depleted");
        Collection {
            taken,
            depleted: true,
        }
    }

    /// Remove every node, releasing all visuals.
    pub fn remove_all(&mut self, visuals: &mut dyn VisualLayer) {
        for node in self.nodes.drain() {
            visuals.destroy_visual(node.visual);
        }
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Units left in a node, `None` if it no longer exists.
    #[must_use]
    pub fn amount(&self, id: NodeId) -> Option<u32> {
        self.nodes.get(id).map(ResourceNode::amount)
    }

    /// Whether a node exists and still holds resources.
    #[must_use]
    pub fn is_available(&self, id: NodeId) -> bool {
        self.amount(id).is_some_and(|amount| amount > 0)
    }

    /// Sum of all remaining units.
    #[must_use]
    pub fn total_available(&self) -> u64 {
        self.nodes.values().map(|node| u64::from(node.amount)).sum()
    }

    /// Per-node listing for status displays.
    #[must_use]
    pub fn summary(&self) -> Vec<NodeSummary> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, (id, node))| NodeSummary {
                index: i + 1,
                id,
                amount: node.amount,
            })
            .collect()
    }

    /// Iterate `(id, node)` pairs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResourceNode)> + '_ {
        self.nodes.iter()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resources delivered to bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceBank {
    /// Lifetime total of delivered units. Never decreases.
    pub collected_total: u64,
    /// Delivered units not yet spent.
    pub stockpile: u64,
}

impl ResourceBank {
    /// Credit a delivery.
    pub fn deposit(&mut self, amount: u32) {
        self.collected_total += u64::from(amount);
        self.stockpile += u64::from(amount);
    }

    /// Check if the stockpile covers a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.stockpile >= cost as u64
    }

    /// Spend from the stockpile if available.
    ///
    /// Returns true if the transaction succeeded.
    pub fn spend(&mut self, cost: u32) -> bool {
        if self.can_afford(cost) {
            self.stockpile -= u64::from(cost);
            true
        } else {
            false
        }
    }
}
