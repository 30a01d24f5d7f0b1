// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Top-level node order.
//!
//! Roots are always top-level and ordered among each other. Any other node can be promoted to a
//! nested top-level node with [`UserInterface::set_node_order`]. It's then ordered among the
//! other nested top-level nodes sharing its nearest top-level ancestor, its *scope*, and drawn
//! after the scope hierarchy. It also escapes the clipping and event flags of its ancestors, so
//! it's what popups and tooltips are made of. Only [`NodeFlags::HIDDEN`](crate::NodeFlags::HIDDEN)
//! on an ancestor still affects it.

use alloc::vec::Vec;
use core::mem;

use understory_handle::ListHead;

use crate::handle::NodeHandle;
use crate::state::UserInterfaceStates;
use crate::ui::UserInterface;

impl UserInterface {
    fn node_handle_at(&self, index: Option<u32>) -> NodeHandle {
        index
            .and_then(|index| self.node_registry.handle_at(index))
            .map_or(NodeHandle::NULL, NodeHandle::from_raw)
    }

    /// Nearest top-level ancestor, null for roots, `None` if an ancestor got removed.
    fn order_scope(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let mut current = self.nodes[handle.idx()].parent;
        while !current.is_null() {
            if !self.is_node_handle_valid(current) {
                return None;
            }
            let node = &self.nodes[current.idx()];
            if node.top_level {
                return Some(current);
            }
            current = node.parent;
        }
        Some(NodeHandle::NULL)
    }

    fn is_descendant(&self, index: u32, ancestor: NodeHandle) -> bool {
        let mut current = self.nodes[index as usize].parent;
        while !current.is_null() && self.is_node_handle_valid(current) {
            if current == ancestor {
                return true;
            }
            current = self.nodes[current.idx()].parent;
        }
        false
    }

    /// Remove a node from whichever order list it's in, keeping its nested list intact.
    pub(crate) fn unlink_node_order(&mut self, index: usize) {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Node storage is bounded by the 20-bit node index."
        )]
        let link = index as u32;
        if !self.order_links.is_linked(link) {
            return;
        }
        let node = &self.nodes[index];
        if node.parent.is_null() {
            self.order_links.unlink(&mut self.roots, link);
        } else if self.is_node_handle_valid(node.scope) {
            let scope = node.scope.idx();
            self.order_links
                .unlink(&mut self.nodes[scope].nested, link);
        } else {
            // The whole list went away with its scope.
            self.order_links.forget(link);
        }
    }

    /// Whether the node is a root or was promoted with [`set_node_order`](Self::set_node_order)
    /// and not flattened since.
    pub fn is_node_top_level(&self, handle: NodeHandle) -> bool {
        self.expect_node(handle, "is_node_top_level");
        self.nodes[handle.idx()].top_level
    }

    /// Whether the node is in the top-level order, and thus visible unless hidden.
    pub fn is_node_ordered(&self, handle: NodeHandle) -> bool {
        self.expect_node(handle, "is_node_ordered");
        self.order_links.is_linked(handle.index())
    }

    /// Root drawn furthest back, null if no root is ordered.
    pub fn node_order_first(&self) -> NodeHandle {
        self.node_handle_at(self.roots.first())
    }

    /// Root drawn in front of all others, null if no root is ordered.
    pub fn node_order_last(&self) -> NodeHandle {
        self.node_handle_at(self.roots.last())
    }

    /// Node ordered right behind `handle` in the same scope, null if none or not ordered.
    pub fn node_order_previous(&self, handle: NodeHandle) -> NodeHandle {
        self.expect_node(handle, "node_order_previous");
        self.node_handle_at(self.order_links.previous(handle.index()))
    }

    /// Node ordered right in front of `handle` in the same scope, null if none or not ordered.
    pub fn node_order_next(&self, handle: NodeHandle) -> NodeHandle {
        self.expect_node(handle, "node_order_next");
        self.node_handle_at(self.order_links.next(handle.index()))
    }

    /// The node drawn last among `handle` and its ordered nested top-level nodes, recursively.
    ///
    /// Returns `handle` itself if it has no ordered nested top-level nodes.
    pub fn node_order_last_nested(&self, handle: NodeHandle) -> NodeHandle {
        self.expect_node(handle, "node_order_last_nested");
        let mut index = handle.index();
        while let Some(last) = self.nodes[index as usize].nested.last() {
            index = last;
        }
        self.node_handle_at(Some(index))
    }

    /// Number of slots available for ordering, equal to the node capacity.
    pub fn node_order_capacity(&self) -> usize {
        self.node_registry.capacity()
    }

    /// Number of top-level nodes, ordered or not.
    pub fn node_order_used_count(&self) -> usize {
        self.node_registry
            .iter()
            .filter(|raw| self.nodes[raw.index() as usize].top_level)
            .count()
    }

    /// Order `handle` right behind `before`, or in front of everything in its scope if `before`
    /// is null.
    ///
    /// A root is ordered among roots. Any other node becomes a nested top-level node, ordered
    /// among nested top-level nodes of its nearest top-level ancestor. Nested top-level
    /// descendants already ordered in that scope move into the scope of `handle`.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has a removed ancestor, or `before` is neither null nor an
    /// ordered node sharing the scope of `handle` and not nested in it.
    pub fn set_node_order(&mut self, handle: NodeHandle, before: NodeHandle) {
        self.expect_node(handle, "set_node_order");
        let Some(scope) = self.order_scope(handle) else {
            panic!("UserInterface::set_node_order(): {handle:?} has a removed ancestor");
        };
        if !before.is_null() {
            assert!(
                before != handle
                    && self.is_node_handle_valid(before)
                    && self.order_links.is_linked(before.index())
                    && self.nodes[before.idx()].scope == scope
                    && !self.is_descendant(before.index(), handle),
                "UserInterface::set_node_order(): {before:?} isn't ordered in the scope of {handle:?}"
            );
        }

        let index = handle.index();
        let before = before.non_null().map(NodeHandle::index);
        if scope.is_null() {
            self.order_links.unlink(&mut self.roots, index);
            self.order_links
                .insert_before(&mut self.roots, index, before);
        } else {
            if self.nodes[handle.idx()].top_level {
                self.unlink_node_order(handle.idx());
            } else {
                self.promote(handle, scope);
            }
            self.nodes[handle.idx()].scope = scope;
            self.order_links
                .insert_before(&mut self.nodes[scope.idx()].nested, index, before);
        }
        self.state |= UserInterfaceStates::NEEDS_NODE_UPDATE;
    }

    fn promote(&mut self, handle: NodeHandle, scope: NodeHandle) {
        let mut scope_list = self.nodes[scope.idx()].nested;
        let mut own_list = ListHead::EMPTY;
        let entries: Vec<u32> = self.order_links.iter(&scope_list).collect();
        for entry in entries {
            if self.is_descendant(entry, handle) {
                self.order_links.unlink(&mut scope_list, entry);
                self.order_links
                    .insert_before(&mut own_list, entry, None);
                self.nodes[entry as usize].scope = handle;
            }
        }
        self.nodes[scope.idx()].nested = scope_list;
        let node = &mut self.nodes[handle.idx()];
        node.nested = own_list;
        node.top_level = true;
    }

    /// Remove `handle` from the top-level order.
    ///
    /// The node stays top-level and keeps the order of its nested top-level nodes, but neither
    /// it nor anything nested in it is visible until it's ordered again. No-op if not ordered.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn clear_node_order(&mut self, handle: NodeHandle) {
        self.expect_node(handle, "clear_node_order");
        if !self.order_links.is_linked(handle.index()) {
            return;
        }
        self.unlink_node_order(handle.idx());
        self.state |= UserInterfaceStates::NEEDS_NODE_UPDATE;
    }

    /// Turn a nested top-level node back into an ordinary node of its parent hierarchy.
    ///
    /// Its ordered nested top-level nodes stay top-level and move into its scope, taking its
    /// place in the order, or going in front of the scope if it wasn't ordered. No-op if the
    /// node isn't top-level.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid, is a root or has a removed ancestor.
    pub fn flatten_node_order(&mut self, handle: NodeHandle) {
        self.expect_node(handle, "flatten_node_order");
        assert!(
            !self.nodes[handle.idx()].parent.is_null(),
            "UserInterface::flatten_node_order(): {handle:?} is a root node"
        );
        if !self.nodes[handle.idx()].top_level {
            return;
        }
        let Some(scope) = self.order_scope(handle) else {
            panic!("UserInterface::flatten_node_order(): {handle:?} has a removed ancestor");
        };

        let index = handle.index();
        let linked = self.order_links.is_linked(index);
        let mut nested = mem::take(&mut self.nodes[handle.idx()].nested);
        let entries: Vec<u32> = self.order_links.iter(&nested).collect();
        for entry in entries {
            self.order_links.unlink(&mut nested, entry);
            let before = linked.then_some(index);
            self.order_links
                .insert_before(&mut self.nodes[scope.idx()].nested, entry, before);
            self.nodes[entry as usize].scope = scope;
        }
        self.unlink_node_order(handle.idx());
        let node = &mut self.nodes[handle.idx()];
        node.top_level = false;
        node.scope = NodeHandle::NULL;
        self.state |= UserInterfaceStates::NEEDS_NODE_UPDATE;
    }
}
