// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node flags and per-node storage.

use alloc::vec::Vec;

use kurbo::{Size, Vec2};
use understory_handle::ListHead;

use crate::handle::NodeHandle;

bitflags::bitflags! {
    /// Node behavior flags.
    ///
    /// [`HIDDEN`](Self::HIDDEN), [`NO_EVENTS`](Self::NO_EVENTS) and [`DISABLED`](Self::DISABLED)
    /// affect the whole subtree. Nested top-level nodes are only affected by
    /// [`HIDDEN`](Self::HIDDEN) on their ancestors.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// The node and all its descendants are neither drawn nor receive events.
        const HIDDEN = 1 << 0;
        /// Descendants are clipped to the node rectangle.
        const CLIP = 1 << 1;
        /// The node and its descendants don't receive events. Drawing is unaffected.
        const NO_EVENTS = 1 << 2;
        /// Like [`NO_EVENTS`](Self::NO_EVENTS), and layers may draw the subtree in a disabled style.
        const DISABLED = Self::NO_EVENTS.bits() | 1 << 3;
        /// The node can be focused by a press or [`UserInterface::focus_event`](crate::UserInterface::focus_event).
        const FOCUSABLE = 1 << 4;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) parent: NodeHandle,
    pub(crate) offset: Vec2,
    pub(crate) size: Size,
    pub(crate) opacity: f32,
    pub(crate) flags: NodeFlags,
    // May contain stale handles until the next clean.
    pub(crate) children: Vec<NodeHandle>,
    // Set for roots and for nodes promoted into the top-level order, even while not ordered.
    pub(crate) top_level: bool,
    // Nearest top-level ancestor at the time the node was last ordered, null for roots.
    pub(crate) scope: NodeHandle,
    // Ordered nested top-level nodes whose scope is this node.
    pub(crate) nested: ListHead,
}

impl Node {
    pub(crate) fn new(parent: NodeHandle, offset: Vec2, size: Size, flags: NodeFlags) -> Self {
        Self {
            parent,
            offset,
            size,
            opacity: 1.0,
            flags,
            children: Vec::new(),
            top_level: parent.is_null(),
            scope: NodeHandle::NULL,
            nested: ListHead::EMPTY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_implies_no_events() {
        assert!(NodeFlags::DISABLED.contains(NodeFlags::NO_EVENTS));
        assert!(!NodeFlags::NO_EVENTS.contains(NodeFlags::DISABLED));
    }

    #[test]
    fn roots_are_top_level() {
        let root = Node::new(NodeHandle::NULL, Vec2::ZERO, Size::ZERO, NodeFlags::empty());
        assert!(root.top_level);
        let child = Node::new(NodeHandle::new(0, 1), Vec2::ZERO, Size::ZERO, NodeFlags::empty());
        assert!(!child.top_level);
        assert_eq!(child.opacity, 1.0);
    }
}
