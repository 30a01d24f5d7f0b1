// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layers: data attached to nodes, drawn and receiving events.
//!
//! A layer owns a set of data, each optionally attached to a node. The user interface never looks
//! at what the data represents. It orders the data by node draw order in
//! [`UserInterface::update`](crate::UserInterface::update), hands the ordered ids to
//! [`Layer::update`] and [`Layer::draw`], and routes events to the data attached to the node that
//! should receive them.
//!
//! Implementations embed a [`LayerCore`] which does the data bookkeeping, and override only the
//! hooks they care about.

use alloc::vec::Vec;
use core::any::Any;

use kurbo::{Rect, Size, Vec2};
use understory_handle::Registry;

use crate::event::{
    FocusEvent, KeyEvent, PointerEvent, PointerMoveEvent, TextInputEvent, VisibilityLostEvent,
};
use crate::handle::{DataHandle, LayerDataHandle, LayerHandle, NodeHandle};

bitflags::bitflags! {
    /// What a layer implementation supports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LayerFeatures: u8 {
        /// [`Layer::draw`] is called.
        const DRAW = 1 << 0;
        /// [`Layer::composite`] is called before every [`Layer::draw`].
        const COMPOSITE = Self::DRAW.bits() | 1 << 1;
        /// Drawing needs blending enabled.
        const DRAW_USES_BLENDING = Self::DRAW.bits() | 1 << 2;
        /// Drawing needs scissor enabled, the layer uses the clip runs.
        const DRAW_USES_SCISSOR = Self::DRAW.bits() | 1 << 3;
        /// Event handlers are called.
        const EVENT = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Layer state, either stored by [`LayerCore`] or passed to [`Layer::update`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LayerStates: u8 {
        /// Absolute node offsets or sizes changed.
        const NEEDS_NODE_OFFSET_SIZE_UPDATE = 1 << 0;
        /// Draw order of the data changed.
        const NEEDS_NODE_ORDER_UPDATE = 1 << 1;
        /// Node enabled state changed.
        const NEEDS_NODE_ENABLED_UPDATE = 1 << 2;
        /// Node opacities changed.
        const NEEDS_NODE_OPACITY_UPDATE = 1 << 3;
        /// Data contents changed.
        const NEEDS_DATA_UPDATE = 1 << 4;
        /// Data got created or attached to a different node.
        const NEEDS_ATTACHMENT_UPDATE = Self::NEEDS_NODE_ORDER_UPDATE.bits() | 1 << 5;
        /// Data got removed.
        const NEEDS_DATA_CLEAN = 1 << 6;
    }
}

impl LayerStates {
    /// States cleared by [`UserInterface::update`](crate::UserInterface::update).
    pub const UPDATE_BITS: Self = Self::NEEDS_DATA_CLEAN.complement();
}

/// Consecutive data sharing one clip rectangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipRun {
    /// Clip rectangle in user interface coordinates.
    pub rect: Rect,
    /// Number of data ids the rectangle applies to.
    pub count: u32,
}

/// Arguments of [`Layer::update`].
///
/// Node arrays are indexed by [`NodeHandle::index`] and cover the whole node capacity; only
/// entries for nodes that have visible data are meaningful.
#[derive(Clone, Debug)]
pub struct LayerUpdate<'a> {
    /// What changed since the last update.
    pub states: LayerStates,
    /// Ids of data attached to visible nodes, in draw order.
    pub data_ids: &'a [u32],
    /// Clip rectangles covering [`data_ids`](Self::data_ids).
    pub clip_runs: &'a [ClipRun],
    /// Absolute node offsets.
    pub node_offsets: &'a [Vec2],
    /// Node sizes.
    pub node_sizes: &'a [Size],
    /// Effective node opacities.
    pub node_opacities: &'a [f32],
    /// Whether events are enabled for the node.
    pub nodes_enabled: &'a [bool],
}

/// Arguments of [`Layer::draw`] and [`Layer::composite`], one top-level node hierarchy at a time.
#[derive(Clone, Debug)]
pub struct LayerDraw<'a> {
    /// Data ids of this hierarchy, in draw order.
    pub data_ids: &'a [u32],
    /// Offset of [`data_ids`](Self::data_ids) within the ids passed to the last [`Layer::update`].
    pub data_offset: usize,
    /// Clip rectangles covering [`data_ids`](Self::data_ids).
    pub clip_runs: &'a [ClipRun],
    /// Absolute node offsets.
    pub node_offsets: &'a [Vec2],
    /// Node sizes.
    pub node_sizes: &'a [Size],
    /// Effective node opacities.
    pub node_opacities: &'a [f32],
}

/// Data bookkeeping shared by all layers.
#[derive(Clone, Debug)]
pub struct LayerCore {
    handle: LayerHandle,
    data: Registry<20, 12>,
    nodes: Vec<NodeHandle>,
    state: LayerStates,
}

impl LayerCore {
    /// Create a core for the layer created as `handle`.
    pub fn new(handle: LayerHandle) -> Self {
        Self {
            handle,
            data: Registry::new(),
            nodes: Vec::new(),
            state: LayerStates::empty(),
        }
    }

    /// Handle of the owning layer.
    pub fn handle(&self) -> LayerHandle {
        self.handle
    }

    /// Create data, optionally attached to `node`.
    pub fn create(&mut self, node: NodeHandle) -> DataHandle {
        let raw = self.data.allocate();
        let local = LayerDataHandle::from_raw(raw);
        if self.nodes.len() <= local.idx() {
            self.nodes.resize(local.idx() + 1, NodeHandle::NULL);
        }
        self.nodes[local.idx()] = node;
        if !node.is_null() {
            self.state |= LayerStates::NEEDS_ATTACHMENT_UPDATE;
        }
        DataHandle::new(self.handle, local)
    }

    /// Remove data.
    ///
    /// # Panics
    ///
    /// If `data` isn't valid.
    pub fn remove(&mut self, data: LayerDataHandle) {
        assert!(
            self.is_handle_valid(data),
            "LayerCore::remove(): invalid handle {data:?}"
        );
        if !self.nodes[data.idx()].is_null() {
            self.state |= LayerStates::NEEDS_ATTACHMENT_UPDATE;
        }
        self.nodes[data.idx()] = NodeHandle::NULL;
        self.data.free(data.to_raw());
        self.state |= LayerStates::NEEDS_DATA_CLEAN;
    }

    /// Attach `data` to `node`, or detach it if `node` is null.
    ///
    /// # Panics
    ///
    /// If `data` isn't valid.
    pub fn attach(&mut self, data: LayerDataHandle, node: NodeHandle) {
        assert!(
            self.is_handle_valid(data),
            "LayerCore::attach(): invalid handle {data:?}"
        );
        self.nodes[data.idx()] = node;
        self.state |= LayerStates::NEEDS_ATTACHMENT_UPDATE;
    }

    /// Node `data` is attached to.
    ///
    /// # Panics
    ///
    /// If `data` isn't valid.
    pub fn node(&self, data: LayerDataHandle) -> NodeHandle {
        assert!(
            self.is_handle_valid(data),
            "LayerCore::node(): invalid handle {data:?}"
        );
        self.nodes[data.idx()]
    }

    /// Node the data with id `id` is attached to, null if none or if `id` isn't used.
    pub fn node_at(&self, id: u32) -> NodeHandle {
        if !self.data.is_used(id) {
            return NodeHandle::NULL;
        }
        self.nodes[id as usize]
    }

    /// Number of data slots, including free ones.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Number of used data slots.
    pub fn used_count(&self) -> usize {
        self.data.used_count()
    }

    /// Whether `data` refers to live data of this layer.
    pub fn is_handle_valid(&self, data: LayerDataHandle) -> bool {
        self.data.is_valid(data.to_raw())
    }

    /// Whether `data` belongs to this layer and refers to live data.
    pub fn is_data_handle_valid(&self, data: DataHandle) -> bool {
        data.layer() == self.handle && self.is_handle_valid(data.data())
    }

    /// Live data, in id order.
    pub fn iter(&self) -> impl Iterator<Item = LayerDataHandle> + '_ {
        self.data.iter().map(LayerDataHandle::from_raw)
    }

    /// Current state.
    pub fn state(&self) -> LayerStates {
        self.state
    }

    /// Request a [`Layer::update`] with [`LayerStates::NEEDS_DATA_UPDATE`].
    pub fn set_needs_update(&mut self) {
        self.state |= LayerStates::NEEDS_DATA_UPDATE;
    }

    pub(crate) fn clear_states(&mut self, states: LayerStates) {
        self.state.remove(states);
    }

    /// Remove data attached to nodes for which `is_valid` is false.
    pub(crate) fn clean_nodes(
        &mut self,
        mut is_valid: impl FnMut(NodeHandle) -> bool,
    ) -> Vec<LayerDataHandle> {
        let stale: Vec<_> = self
            .data
            .iter()
            .filter(|raw| {
                let node = self.nodes[raw.index() as usize];
                !node.is_null() && !is_valid(node)
            })
            .collect();
        let mut removed = Vec::with_capacity(stale.len());
        for raw in stale {
            self.nodes[raw.index() as usize] = NodeHandle::NULL;
            self.data.free(raw);
            removed.push(LayerDataHandle::from_raw(raw));
        }
        if !removed.is_empty() {
            self.state |= LayerStates::NEEDS_DATA_CLEAN;
        }
        removed
    }
}

/// A layer implementation.
///
/// All hooks except the core accessors have empty default implementations. Event handlers are
/// only called when [`Layer::features`] contains [`LayerFeatures::EVENT`], drawing hooks only
/// with [`LayerFeatures::DRAW`]. Handlers receive the data id, i.e. [`LayerDataHandle::index`].
#[allow(unused_variables, reason = "Default hooks ignore their arguments.")]
pub trait Layer: Any {
    /// Shared bookkeeping.
    fn core(&self) -> &LayerCore;

    /// Shared bookkeeping.
    fn core_mut(&mut self) -> &mut LayerCore;

    /// Supported features. Expected to not change during the layer lifetime.
    fn features(&self) -> LayerFeatures;

    /// User interface size and framebuffer size changed.
    fn set_size(&mut self, size: Size, framebuffer_size: Size) {}

    /// Data got removed because the nodes they were attached to got removed.
    fn clean(&mut self, removed: &[LayerDataHandle]) {}

    /// Data order, node geometry or data contents changed.
    fn update(&mut self, update: &LayerUpdate<'_>) {}

    /// Composite before drawing, for example to blur what's drawn behind.
    fn composite(&mut self, draw: &LayerDraw<'_>) {}

    /// Draw one top-level node hierarchy.
    fn draw(&mut self, draw: &LayerDraw<'_>) {}

    /// Pointer press on a node the data is attached to.
    fn pointer_press_event(&mut self, data: u32, event: &mut PointerEvent) {}

    /// Pointer release on a node the data is attached to.
    fn pointer_release_event(&mut self, data: u32, event: &mut PointerEvent) {}

    /// Primary press and release happened on the same node.
    fn pointer_tap_or_click_event(&mut self, data: u32, event: &mut PointerEvent) {}

    /// Pointer move over a node the data is attached to.
    fn pointer_move_event(&mut self, data: u32, event: &mut PointerMoveEvent) {}

    /// The node became hovered.
    fn pointer_enter_event(&mut self, data: u32, event: &mut PointerMoveEvent) {}

    /// The node stopped being hovered.
    fn pointer_leave_event(&mut self, data: u32, event: &mut PointerMoveEvent) {}

    /// The node is being focused.
    fn focus_event(&mut self, data: u32, event: &mut FocusEvent) {}

    /// The node lost focus.
    fn blur_event(&mut self, data: u32, event: &mut FocusEvent) {}

    /// Key press while the node is focused or under the pointer.
    fn key_press_event(&mut self, data: u32, event: &mut KeyEvent) {}

    /// Key release while the node is focused or under the pointer.
    fn key_release_event(&mut self, data: u32, event: &mut KeyEvent) {}

    /// Text input while the node is focused.
    fn text_input_event(&mut self, data: u32, event: &mut TextInputEvent) {}

    /// The node stopped being pressed, hovered, captured or focused because it became invisible,
    /// disabled or not focusable.
    fn visibility_lost_event(&mut self, data: u32, event: &mut VisibilityLostEvent) {}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_attach_remove() {
        let mut core = LayerCore::new(LayerHandle::new(2, 1));
        let unattached = core.create(NodeHandle::NULL);
        assert_eq!(core.state(), LayerStates::empty());
        assert_eq!(unattached.layer(), LayerHandle::new(2, 1));

        let node = NodeHandle::new(5, 1);
        let data = core.create(node);
        assert_eq!(core.state(), LayerStates::NEEDS_ATTACHMENT_UPDATE);
        assert_eq!(core.node(data.data()), node);
        assert_eq!(core.node_at(data.data().index()), node);
        assert_eq!(core.used_count(), 2);

        core.attach(unattached.data(), node);
        assert_eq!(core.node(unattached.data()), node);

        core.remove(data.data());
        assert!(!core.is_data_handle_valid(data));
        assert!(core.state().contains(LayerStates::NEEDS_DATA_CLEAN));
        assert_eq!(core.node_at(data.data().index()), NodeHandle::NULL);
        assert_eq!(core.capacity(), 2);
        assert_eq!(core.used_count(), 1);
    }

    #[test]
    fn clean_removes_data_of_invalid_nodes() {
        let mut core = LayerCore::new(LayerHandle::new(0, 1));
        let alive = NodeHandle::new(0, 1);
        let dead = NodeHandle::new(1, 1);
        let a = core.create(alive);
        let b = core.create(dead);
        let c = core.create(NodeHandle::NULL);
        core.clear_states(LayerStates::all());

        let removed = core.clean_nodes(|n| n == alive);
        assert_eq!(removed, [b.data()]);
        assert!(core.is_data_handle_valid(a));
        assert!(!core.is_data_handle_valid(b));
        assert!(core.is_data_handle_valid(c));
        assert_eq!(core.state(), LayerStates::NEEDS_DATA_CLEAN);
    }

    #[test]
    fn foreign_data_handle_is_invalid() {
        let mut core = LayerCore::new(LayerHandle::new(0, 1));
        let data = core.create(NodeHandle::NULL);
        let foreign = DataHandle::new(LayerHandle::new(1, 1), data.data());
        assert!(!core.is_data_handle_valid(foreign));
    }

    #[test]
    #[should_panic(expected = "LayerCore::remove(): invalid handle")]
    fn remove_twice_panics() {
        let mut core = LayerCore::new(LayerHandle::new(0, 1));
        let data = core.create(NodeHandle::NULL);
        core.remove(data.data());
        core.remove(data.data());
    }
}
