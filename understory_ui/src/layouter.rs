// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layouters: opaque layout calculation over node offsets and sizes.

use alloc::vec::Vec;
use core::any::Any;

use kurbo::{Size, Vec2};
use understory_handle::Registry;

use crate::handle::{LayoutHandle, LayouterDataHandle, LayouterHandle, NodeHandle};

bitflags::bitflags! {
    /// Layouter state stored by [`LayouterCore`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LayouterStates: u8 {
        /// Layout properties changed and the layouts have to be recalculated.
        const NEEDS_UPDATE = 1 << 0;
        /// Layouts got added or removed.
        const NEEDS_ASSIGNMENT_UPDATE = Self::NEEDS_UPDATE.bits() | 1 << 1;
    }
}

/// Arguments of [`Layouter::update`].
#[derive(Debug)]
pub struct LayoutUpdate<'a> {
    /// Ids of layouts to calculate, parents before children.
    pub layout_ids: &'a [u32],
    /// Subset of [`layout_ids`](Self::layout_ids) whose node parent has no layout from this layouter.
    pub top_level_layout_ids: &'a [u32],
    /// Node offsets relative to the parent, indexed by [`NodeHandle::index`].
    pub node_offsets: &'a mut [Vec2],
    /// Node sizes, indexed by [`NodeHandle::index`].
    pub node_sizes: &'a mut [Size],
}

/// Layout bookkeeping shared by all layouters.
#[derive(Clone, Debug)]
pub struct LayouterCore {
    handle: LayouterHandle,
    layouts: Registry<20, 12>,
    nodes: Vec<NodeHandle>,
    state: LayouterStates,
}

impl LayouterCore {
    /// Create a core for the layouter created as `handle`.
    pub fn new(handle: LayouterHandle) -> Self {
        Self {
            handle,
            layouts: Registry::new(),
            nodes: Vec::new(),
            state: LayouterStates::empty(),
        }
    }

    /// Handle of the owning layouter.
    pub fn handle(&self) -> LayouterHandle {
        self.handle
    }

    /// Assign a new layout to `node`.
    ///
    /// # Panics
    ///
    /// If `node` is null.
    pub fn add(&mut self, node: NodeHandle) -> LayoutHandle {
        assert!(!node.is_null(), "LayouterCore::add(): node is null");
        let local = LayouterDataHandle::from_raw(self.layouts.allocate());
        if self.nodes.len() <= local.idx() {
            self.nodes.resize(local.idx() + 1, NodeHandle::NULL);
        }
        self.nodes[local.idx()] = node;
        self.state |= LayouterStates::NEEDS_ASSIGNMENT_UPDATE;
        LayoutHandle::new(self.handle, local)
    }

    /// Remove a layout.
    ///
    /// # Panics
    ///
    /// If `layout` isn't valid.
    pub fn remove(&mut self, layout: LayouterDataHandle) {
        assert!(
            self.is_handle_valid(layout),
            "LayouterCore::remove(): invalid handle {layout:?}"
        );
        self.nodes[layout.idx()] = NodeHandle::NULL;
        self.layouts.free(layout.to_raw());
        self.state |= LayouterStates::NEEDS_ASSIGNMENT_UPDATE;
    }

    /// Node `layout` is assigned to.
    ///
    /// # Panics
    ///
    /// If `layout` isn't valid.
    pub fn node(&self, layout: LayouterDataHandle) -> NodeHandle {
        assert!(
            self.is_handle_valid(layout),
            "LayouterCore::node(): invalid handle {layout:?}"
        );
        self.nodes[layout.idx()]
    }

    /// Node the layout with id `id` is assigned to, null if `id` isn't used.
    pub fn node_at(&self, id: u32) -> NodeHandle {
        if !self.layouts.is_used(id) {
            return NodeHandle::NULL;
        }
        self.nodes[id as usize]
    }

    /// Number of layout slots, including free ones.
    pub fn capacity(&self) -> usize {
        self.layouts.capacity()
    }

    /// Number of used layout slots.
    pub fn used_count(&self) -> usize {
        self.layouts.used_count()
    }

    /// Whether `layout` refers to a live layout of this layouter.
    pub fn is_handle_valid(&self, layout: LayouterDataHandle) -> bool {
        self.layouts.is_valid(layout.to_raw())
    }

    /// Whether `layout` belongs to this layouter and refers to a live layout.
    pub fn is_layout_handle_valid(&self, layout: LayoutHandle) -> bool {
        layout.layouter() == self.handle && self.is_handle_valid(layout.layout())
    }

    /// Live layouts, in id order.
    pub fn iter(&self) -> impl Iterator<Item = LayouterDataHandle> + '_ {
        self.layouts.iter().map(LayouterDataHandle::from_raw)
    }

    /// Current state.
    pub fn state(&self) -> LayouterStates {
        self.state
    }

    /// Request layout recalculation.
    pub fn set_needs_update(&mut self) {
        self.state |= LayouterStates::NEEDS_UPDATE;
    }

    pub(crate) fn clear_states(&mut self) {
        self.state = LayouterStates::empty();
    }

    pub(crate) fn clean_nodes(
        &mut self,
        mut is_valid: impl FnMut(NodeHandle) -> bool,
    ) -> Vec<LayouterDataHandle> {
        let stale: Vec<_> = self
            .layouts
            .iter()
            .filter(|raw| !is_valid(self.nodes[raw.index() as usize]))
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for raw in stale {
            self.nodes[raw.index() as usize] = NodeHandle::NULL;
            self.layouts.free(raw);
            removed.push(LayouterDataHandle::from_raw(raw));
        }
        if !removed.is_empty() {
            self.state |= LayouterStates::NEEDS_ASSIGNMENT_UPDATE;
        }
        removed
    }
}

/// A layouter implementation.
#[allow(unused_variables, reason = "Default hooks ignore their arguments.")]
pub trait Layouter: Any {
    /// Shared bookkeeping.
    fn core(&self) -> &LayouterCore;

    /// Shared bookkeeping.
    fn core_mut(&mut self) -> &mut LayouterCore;

    /// User interface size changed.
    fn set_size(&mut self, size: Size) {}

    /// Layouts got removed because the nodes they were assigned to got removed.
    fn clean(&mut self, removed: &[LayouterDataHandle]) {}

    /// Calculate layouts, writing into the node offsets and sizes.
    fn update(&mut self, update: &mut LayoutUpdate<'_>);
}
