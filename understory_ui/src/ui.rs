// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`UserInterface`]: node storage, instance slots and the clean/update/draw passes.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::mem;
use core::time::Duration;

use kurbo::{Point, Rect, Size, Vec2};
use tracing::{debug, trace};
use understory_handle::{Links, ListHead, OrderedRegistry, Registry};

use crate::animator::{
    AnimationTarget, Animator, AnimatorKind, AnimatorStates, NodeChange, NodeChanges,
};
use crate::error::InstanceError;
use crate::event::VisibilityLostEvent;
use crate::frame::{Frame, LayerOrder};
use crate::handle::{
    AnimationHandle, AnimatorHandle, DataHandle, LayerHandle, LayoutHandle, LayouterHandle,
    NodeHandle,
};
use crate::layer::{Layer, LayerDraw, LayerFeatures, LayerStates, LayerUpdate};
use crate::layouter::{LayoutUpdate, Layouter, LayouterStates};
use crate::node::{Node, NodeFlags};
use crate::state::UserInterfaceStates;

#[derive(Clone, Debug, Default)]
struct LayoutBatch {
    layouter: usize,
    layout_ids: Vec<u32>,
    top_level: Vec<u32>,
}

/// The user interface core.
///
/// Owns the node hierarchy, the layer, layouter and animator instances and the event routing
/// state. All mutation goes through handles that are validated on every call; passing an invalid
/// handle is a programming error and panics.
pub struct UserInterface {
    size: Size,
    window_size: Size,
    framebuffer_size: Size,
    pub(crate) state: UserInterfaceStates,

    pub(crate) node_registry: Registry<20, 12>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) order_links: Links,
    pub(crate) roots: ListHead,
    orphans: Vec<NodeHandle>,

    layer_registry: OrderedRegistry<8, 8>,
    pub(crate) layers: Vec<Option<Box<dyn Layer>>>,
    layouter_registry: OrderedRegistry<8, 8>,
    layouters: Vec<Option<Box<dyn Layouter>>>,
    animator_registry: Registry<8, 8>,
    animators: Vec<Option<Box<dyn Animator>>>,

    pub(crate) frame: Frame,
    layout_batches: Vec<LayoutBatch>,
    animation_time: Duration,

    pub(crate) pressed: NodeHandle,
    pub(crate) captured: NodeHandle,
    pub(crate) hovered: NodeHandle,
    pub(crate) focused: NodeHandle,
    pub(crate) global_pointer_position: Option<Point>,
}

impl fmt::Debug for UserInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInterface")
            .field("size", &self.size)
            .field("window_size", &self.window_size)
            .field("framebuffer_size", &self.framebuffer_size)
            .field("state", &self.state)
            .field("nodes", &self.node_registry.used_count())
            .field("layers", &self.layer_registry.used_count())
            .field("layouters", &self.layouter_registry.used_count())
            .field("animators", &self.animator_registry.used_count())
            .field("pressed", &self.pressed)
            .field("captured", &self.captured)
            .field("hovered", &self.hovered)
            .field("focused", &self.focused)
            .finish_non_exhaustive()
    }
}

fn is_positive(size: Size) -> bool {
    size.width > 0.0 && size.height > 0.0
}

fn flag_states(changed: NodeFlags) -> UserInterfaceStates {
    let mut states = UserInterfaceStates::empty();
    if changed.contains(NodeFlags::HIDDEN) {
        states |= UserInterfaceStates::NEEDS_NODE_UPDATE;
    }
    if changed.contains(NodeFlags::CLIP) {
        states |= UserInterfaceStates::NEEDS_NODE_CLIP_UPDATE;
    }
    if changed.intersects(NodeFlags::DISABLED | NodeFlags::FOCUSABLE) {
        states |= UserInterfaceStates::NEEDS_NODE_ENABLED_UPDATE;
    }
    states
}

impl UserInterface {
    /// Create a user interface.
    ///
    /// `size` is the coordinate space nodes live in, `window_size` the space event positions are
    /// given in and `framebuffer_size` the pixel size passed on to layers.
    ///
    /// # Panics
    ///
    /// If any of the sizes isn't positive.
    pub fn new(size: Size, window_size: Size, framebuffer_size: Size) -> Self {
        assert!(
            is_positive(size) && is_positive(window_size) && is_positive(framebuffer_size),
            "UserInterface::new(): expected positive sizes, got {size:?}, {window_size:?} and {framebuffer_size:?}"
        );
        Self {
            size,
            window_size,
            framebuffer_size,
            state: UserInterfaceStates::empty(),
            node_registry: Registry::new(),
            nodes: Vec::new(),
            order_links: Links::new(),
            roots: ListHead::EMPTY,
            orphans: Vec::new(),
            layer_registry: OrderedRegistry::new(),
            layers: Vec::new(),
            layouter_registry: OrderedRegistry::new(),
            layouters: Vec::new(),
            animator_registry: Registry::new(),
            animators: Vec::new(),
            frame: Frame::default(),
            layout_batches: Vec::new(),
            animation_time: Duration::ZERO,
            pressed: NodeHandle::NULL,
            captured: NodeHandle::NULL,
            hovered: NodeHandle::NULL,
            focused: NodeHandle::NULL,
            global_pointer_position: None,
        }
    }

    /// Create a user interface with the same size for nodes, events and the framebuffer.
    pub fn with_unscaled_size(size: Size) -> Self {
        Self::new(size, size, size)
    }

    /// Node coordinate space size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Event coordinate space size.
    pub fn window_size(&self) -> Size {
        self.window_size
    }

    /// Framebuffer size.
    pub fn framebuffer_size(&self) -> Size {
        self.framebuffer_size
    }

    /// Change all sizes, forwarding them to every layer and layouter instance.
    ///
    /// # Panics
    ///
    /// If any of the sizes isn't positive.
    pub fn set_size(&mut self, size: Size, window_size: Size, framebuffer_size: Size) {
        assert!(
            is_positive(size) && is_positive(window_size) && is_positive(framebuffer_size),
            "UserInterface::set_size(): expected positive sizes, got {size:?}, {window_size:?} and {framebuffer_size:?}"
        );
        if size != self.size && self.node_registry.used_count() != 0 {
            self.state |= UserInterfaceStates::NEEDS_NODE_CLIP_UPDATE;
        }
        self.size = size;
        self.window_size = window_size;
        self.framebuffer_size = framebuffer_size;
        for layer in self.layers.iter_mut().flatten() {
            layer.set_size(size, framebuffer_size);
        }
        for layouter in self.layouters.iter_mut().flatten() {
            layouter.set_size(size);
        }
    }

    pub(crate) fn scale_position(&self, position: Point) -> Point {
        Point::new(
            position.x * self.size.width / self.window_size.width,
            position.y * self.size.height / self.window_size.height,
        )
    }

    /// Current state, including states reported by layer, layouter and animator instances.
    pub fn state(&self) -> UserInterfaceStates {
        let mut state = self.state;
        for layer in self.layers.iter().flatten() {
            let layer_state = layer.core().state();
            if layer_state.contains(LayerStates::NEEDS_DATA_UPDATE) {
                state |= UserInterfaceStates::NEEDS_DATA_UPDATE;
            }
            if layer_state.contains(LayerStates::NEEDS_ATTACHMENT_UPDATE) {
                state |= UserInterfaceStates::NEEDS_DATA_ATTACHMENT_UPDATE;
            }
            if layer_state.contains(LayerStates::NEEDS_DATA_CLEAN) {
                state |= UserInterfaceStates::NEEDS_DATA_CLEAN;
            }
        }
        for layouter in self.layouters.iter().flatten() {
            let layouter_state = layouter.core().state();
            if layouter_state.contains(LayouterStates::NEEDS_ASSIGNMENT_UPDATE) {
                state |= UserInterfaceStates::NEEDS_LAYOUT_ASSIGNMENT_UPDATE;
            } else if layouter_state.contains(LayouterStates::NEEDS_UPDATE) {
                state |= UserInterfaceStates::NEEDS_LAYOUT_UPDATE;
            }
        }
        for animator in self.animators.iter().flatten() {
            if animator
                .core()
                .animator_state()
                .contains(AnimatorStates::NEEDS_ADVANCE)
            {
                state |= UserInterfaceStates::NEEDS_ANIMATION_ADVANCE;
            }
        }
        state
    }

    // Nodes

    /// Create a node.
    ///
    /// A node without a parent is a root and gets appended to the top-level order, so it's drawn
    /// in front of all existing roots.
    ///
    /// # Panics
    ///
    /// If `parent` is neither null nor valid, or the node capacity is exhausted.
    pub fn create_node(
        &mut self,
        parent: NodeHandle,
        offset: Vec2,
        size: Size,
        flags: NodeFlags,
    ) -> NodeHandle {
        assert!(
            parent.is_null() || self.is_node_handle_valid(parent),
            "UserInterface::create_node(): invalid parent handle {parent:?}"
        );
        let handle = NodeHandle::from_raw(self.node_registry.allocate());
        let node = Node::new(parent, offset, size, flags);
        match self.nodes.get_mut(handle.idx()) {
            Some(slot) => *slot = node,
            None => self.nodes.push(node),
        }
        if parent.is_null() {
            self.order_links
                .insert_before(&mut self.roots, handle.index(), None);
        } else {
            self.nodes[parent.idx()].children.push(handle);
        }
        self.state |= UserInterfaceStates::NEEDS_NODE_UPDATE;
        handle
    }

    /// Remove a node.
    ///
    /// The handle becomes invalid immediately. Descendants and everything attached to the
    /// removed nodes are removed in the next [`clean`](Self::clean).
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        self.expect_node(handle, "remove_node");
        self.free_node(handle);
        self.state |= UserInterfaceStates::NEEDS_NODE_CLEAN;
    }

    /// Unlinks a node, queues its children for the orphan sweep and frees its slot.
    fn free_node(&mut self, handle: NodeHandle) {
        self.unlink_node_order(handle.idx());
        let node = &mut self.nodes[handle.idx()];
        let children = mem::take(&mut node.children);
        node.nested = ListHead::EMPTY;
        self.orphans.extend(children);
        if !self.node_registry.free(handle.to_raw()) {
            debug!(?handle, "node slot retired");
        }
    }

    /// Number of node slots, including free ones.
    pub fn node_capacity(&self) -> usize {
        self.node_registry.capacity()
    }

    /// Number of used node slots.
    pub fn node_used_count(&self) -> usize {
        self.node_registry.used_count()
    }

    /// Whether `handle` refers to a live node.
    pub fn is_node_handle_valid(&self, handle: NodeHandle) -> bool {
        self.node_registry.is_valid(handle.to_raw())
    }

    pub(crate) fn expect_node(&self, handle: NodeHandle, what: &str) {
        assert!(
            self.is_node_handle_valid(handle),
            "UserInterface::{what}(): invalid handle {handle:?}"
        );
    }

    /// Parent node, null for roots.
    pub fn node_parent(&self, handle: NodeHandle) -> NodeHandle {
        self.expect_node(handle, "node_parent");
        self.nodes[handle.idx()].parent
    }

    /// Offset relative to the parent.
    pub fn node_offset(&self, handle: NodeHandle) -> Vec2 {
        self.expect_node(handle, "node_offset");
        self.nodes[handle.idx()].offset
    }

    /// Set the offset relative to the parent.
    pub fn set_node_offset(&mut self, handle: NodeHandle, offset: Vec2) {
        self.expect_node(handle, "set_node_offset");
        self.nodes[handle.idx()].offset = offset;
        self.state |= UserInterfaceStates::NEEDS_LAYOUT_UPDATE;
    }

    /// Node size.
    pub fn node_size(&self, handle: NodeHandle) -> Size {
        self.expect_node(handle, "node_size");
        self.nodes[handle.idx()].size
    }

    /// Set the node size.
    pub fn set_node_size(&mut self, handle: NodeHandle, size: Size) {
        self.expect_node(handle, "set_node_size");
        self.nodes[handle.idx()].size = size;
        self.state |= UserInterfaceStates::NEEDS_LAYOUT_UPDATE;
    }

    /// Own opacity of the node, not including ancestors.
    pub fn node_opacity(&self, handle: NodeHandle) -> f32 {
        self.expect_node(handle, "node_opacity");
        self.nodes[handle.idx()].opacity
    }

    /// Set the own opacity of the node.
    pub fn set_node_opacity(&mut self, handle: NodeHandle, opacity: f32) {
        self.expect_node(handle, "set_node_opacity");
        self.nodes[handle.idx()].opacity = opacity;
        self.state |= UserInterfaceStates::NEEDS_NODE_OPACITY_UPDATE;
    }

    /// Node flags.
    pub fn node_flags(&self, handle: NodeHandle) -> NodeFlags {
        self.expect_node(handle, "node_flags");
        self.nodes[handle.idx()].flags
    }

    /// Replace node flags.
    pub fn set_node_flags(&mut self, handle: NodeHandle, flags: NodeFlags) {
        self.expect_node(handle, "set_node_flags");
        let node = &mut self.nodes[handle.idx()];
        let changed = node.flags.symmetric_difference(flags);
        node.flags = flags;
        self.state |= flag_states(changed);
    }

    /// Add node flags.
    pub fn add_node_flags(&mut self, handle: NodeHandle, flags: NodeFlags) {
        let current = self.node_flags(handle);
        self.set_node_flags(handle, current | flags);
    }

    /// Clear node flags.
    pub fn clear_node_flags(&mut self, handle: NodeHandle, flags: NodeFlags) {
        let current = self.node_flags(handle);
        self.set_node_flags(handle, current.difference(flags));
    }

    // Layers

    /// Create a layer, drawn right behind `before`, or in front of all others if `before` is null.
    ///
    /// # Panics
    ///
    /// If `before` is neither null nor valid, or all 256 layer slots are used.
    pub fn create_layer(&mut self, before: LayerHandle) -> LayerHandle {
        let before = before.non_null().map(|before| {
            assert!(
                self.is_layer_handle_valid(before),
                "UserInterface::create_layer(): invalid before handle {before:?}"
            );
            before.to_raw()
        });
        let handle = LayerHandle::from_raw(self.layer_registry.allocate(before));
        if self.layers.len() <= handle.idx() {
            self.layers.resize_with(handle.idx() + 1, || None);
        }
        self.layers[handle.idx()] = None;
        handle
    }

    /// Set the instance of a layer created with [`create_layer`](Self::create_layer).
    ///
    /// # Panics
    ///
    /// If the instance handle isn't valid or an instance is already set for it.
    pub fn set_layer_instance(&mut self, mut instance: Box<dyn Layer>) {
        let handle = instance.core().handle();
        assert!(
            self.is_layer_handle_valid(handle),
            "UserInterface::set_layer_instance(): invalid handle {handle:?}"
        );
        assert!(
            self.layers[handle.idx()].is_none(),
            "UserInterface::set_layer_instance(): instance for {handle:?} already set"
        );
        instance.set_size(self.size, self.framebuffer_size);
        self.layers[handle.idx()] = Some(instance);
        self.state |= UserInterfaceStates::NEEDS_DATA_ATTACHMENT_UPDATE;
    }

    fn layer_instance(&self, handle: LayerHandle) -> Result<&dyn Layer, InstanceError> {
        if !self.is_layer_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.layers[handle.idx()]
            .as_deref()
            .ok_or(InstanceError::NoInstance)
    }

    fn layer_instance_mut(
        &mut self,
        handle: LayerHandle,
    ) -> Result<&mut Box<dyn Layer>, InstanceError> {
        if !self.is_layer_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.layers[handle.idx()]
            .as_mut()
            .ok_or(InstanceError::NoInstance)
    }

    /// Layer instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn layer(&self, handle: LayerHandle) -> &dyn Layer {
        match self.layer_instance(handle) {
            Ok(layer) => layer,
            Err(error) => panic!("UserInterface::layer(): {error}: {handle:?}"),
        }
    }

    /// Mutable layer instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn layer_mut(&mut self, handle: LayerHandle) -> &mut dyn Layer {
        match self.layer_instance_mut(handle) {
            Ok(layer) => &mut **layer,
            Err(error) => panic!("UserInterface::layer_mut(): {error}: {handle:?}"),
        }
    }

    /// Layer instance as its concrete type.
    pub fn layer_as<T: Layer>(&self, handle: LayerHandle) -> Result<&T, InstanceError> {
        let layer: &dyn Any = self.layer_instance(handle)?;
        layer.downcast_ref().ok_or(InstanceError::WrongType)
    }

    /// Mutable layer instance as its concrete type.
    pub fn layer_as_mut<T: Layer>(&mut self, handle: LayerHandle) -> Result<&mut T, InstanceError> {
        let layer: &mut dyn Any = &mut **self.layer_instance_mut(handle)?;
        layer.downcast_mut().ok_or(InstanceError::WrongType)
    }

    /// Remove a layer together with its instance and all its data.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn remove_layer(&mut self, handle: LayerHandle) {
        assert!(
            self.is_layer_handle_valid(handle),
            "UserInterface::remove_layer(): invalid handle {handle:?}"
        );
        if !self.layer_registry.free(handle.to_raw()) {
            debug!(?handle, "layer slot retired");
        }
        self.layers[handle.idx()] = None;
        self.state |= UserInterfaceStates::NEEDS_DATA_ATTACHMENT_UPDATE
            | UserInterfaceStates::NEEDS_DATA_CLEAN;
    }

    /// Layer drawn furthest back, null if there are no layers.
    pub fn layer_first(&self) -> LayerHandle {
        self.layer_registry
            .first()
            .map_or(LayerHandle::NULL, LayerHandle::from_raw)
    }

    /// Layer drawn in front of all others, null if there are no layers.
    pub fn layer_last(&self) -> LayerHandle {
        self.layer_registry
            .last()
            .map_or(LayerHandle::NULL, LayerHandle::from_raw)
    }

    /// Layer drawn right behind `handle`, null if `handle` is the first.
    pub fn layer_previous(&self, handle: LayerHandle) -> LayerHandle {
        self.layer_registry
            .previous(handle.to_raw())
            .map_or(LayerHandle::NULL, LayerHandle::from_raw)
    }

    /// Layer drawn right in front of `handle`, null if `handle` is the last.
    pub fn layer_next(&self, handle: LayerHandle) -> LayerHandle {
        self.layer_registry
            .next(handle.to_raw())
            .map_or(LayerHandle::NULL, LayerHandle::from_raw)
    }

    /// Number of layer slots, including free ones.
    pub fn layer_capacity(&self) -> usize {
        self.layer_registry.capacity()
    }

    /// Number of used layer slots.
    pub fn layer_used_count(&self) -> usize {
        self.layer_registry.used_count()
    }

    /// Whether `handle` refers to a live layer.
    pub fn is_layer_handle_valid(&self, handle: LayerHandle) -> bool {
        self.layer_registry.is_valid(handle.to_raw())
    }

    /// Whether `data` refers to live data of a live layer with an instance.
    pub fn is_data_handle_valid(&self, data: DataHandle) -> bool {
        self.layer_instance(data.layer())
            .is_ok_and(|layer| layer.core().is_data_handle_valid(data))
    }

    /// Attach `data` to `node`, or detach it if `node` is null.
    ///
    /// # Panics
    ///
    /// If `node` is neither null nor valid, or `data` isn't valid.
    pub fn attach_data(&mut self, node: NodeHandle, data: DataHandle) {
        assert!(
            node.is_null() || self.is_node_handle_valid(node),
            "UserInterface::attach_data(): invalid node handle {node:?}"
        );
        assert!(
            self.is_data_handle_valid(data),
            "UserInterface::attach_data(): invalid data handle {data:?}"
        );
        if let Ok(layer) = self.layer_instance_mut(data.layer()) {
            layer.core_mut().attach(data.data(), node);
        }
    }

    // Layouters

    /// Create a layouter, run right before `before`, or after all others if `before` is null.
    ///
    /// # Panics
    ///
    /// If `before` is neither null nor valid, or all 256 layouter slots are used.
    pub fn create_layouter(&mut self, before: LayouterHandle) -> LayouterHandle {
        let before = before.non_null().map(|before| {
            assert!(
                self.is_layouter_handle_valid(before),
                "UserInterface::create_layouter(): invalid before handle {before:?}"
            );
            before.to_raw()
        });
        let handle = LayouterHandle::from_raw(self.layouter_registry.allocate(before));
        if self.layouters.len() <= handle.idx() {
            self.layouters.resize_with(handle.idx() + 1, || None);
        }
        self.layouters[handle.idx()] = None;
        handle
    }

    /// Set the instance of a layouter created with [`create_layouter`](Self::create_layouter).
    ///
    /// # Panics
    ///
    /// If the instance handle isn't valid or an instance is already set for it.
    pub fn set_layouter_instance(&mut self, mut instance: Box<dyn Layouter>) {
        let handle = instance.core().handle();
        assert!(
            self.is_layouter_handle_valid(handle),
            "UserInterface::set_layouter_instance(): invalid handle {handle:?}"
        );
        assert!(
            self.layouters[handle.idx()].is_none(),
            "UserInterface::set_layouter_instance(): instance for {handle:?} already set"
        );
        instance.set_size(self.size);
        self.layouters[handle.idx()] = Some(instance);
        self.state |= UserInterfaceStates::NEEDS_LAYOUT_ASSIGNMENT_UPDATE;
    }

    fn layouter_instance(&self, handle: LayouterHandle) -> Result<&dyn Layouter, InstanceError> {
        if !self.is_layouter_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.layouters[handle.idx()]
            .as_deref()
            .ok_or(InstanceError::NoInstance)
    }

    fn layouter_instance_mut(
        &mut self,
        handle: LayouterHandle,
    ) -> Result<&mut Box<dyn Layouter>, InstanceError> {
        if !self.is_layouter_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.layouters[handle.idx()]
            .as_mut()
            .ok_or(InstanceError::NoInstance)
    }

    /// Layouter instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn layouter(&self, handle: LayouterHandle) -> &dyn Layouter {
        match self.layouter_instance(handle) {
            Ok(layouter) => layouter,
            Err(error) => panic!("UserInterface::layouter(): {error}: {handle:?}"),
        }
    }

    /// Mutable layouter instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn layouter_mut(&mut self, handle: LayouterHandle) -> &mut dyn Layouter {
        match self.layouter_instance_mut(handle) {
            Ok(layouter) => &mut **layouter,
            Err(error) => panic!("UserInterface::layouter_mut(): {error}: {handle:?}"),
        }
    }

    /// Layouter instance as its concrete type.
    pub fn layouter_as<T: Layouter>(&self, handle: LayouterHandle) -> Result<&T, InstanceError> {
        let layouter: &dyn Any = self.layouter_instance(handle)?;
        layouter.downcast_ref().ok_or(InstanceError::WrongType)
    }

    /// Mutable layouter instance as its concrete type.
    pub fn layouter_as_mut<T: Layouter>(
        &mut self,
        handle: LayouterHandle,
    ) -> Result<&mut T, InstanceError> {
        let layouter: &mut dyn Any = &mut **self.layouter_instance_mut(handle)?;
        layouter.downcast_mut().ok_or(InstanceError::WrongType)
    }

    /// Remove a layouter together with its instance and all its layouts.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn remove_layouter(&mut self, handle: LayouterHandle) {
        assert!(
            self.is_layouter_handle_valid(handle),
            "UserInterface::remove_layouter(): invalid handle {handle:?}"
        );
        if !self.layouter_registry.free(handle.to_raw()) {
            debug!(?handle, "layouter slot retired");
        }
        self.layouters[handle.idx()] = None;
        self.state |= UserInterfaceStates::NEEDS_LAYOUT_ASSIGNMENT_UPDATE;
    }

    /// Layouter run first, null if there are no layouters.
    pub fn layouter_first(&self) -> LayouterHandle {
        self.layouter_registry
            .first()
            .map_or(LayouterHandle::NULL, LayouterHandle::from_raw)
    }

    /// Layouter run last, null if there are no layouters.
    pub fn layouter_last(&self) -> LayouterHandle {
        self.layouter_registry
            .last()
            .map_or(LayouterHandle::NULL, LayouterHandle::from_raw)
    }

    /// Layouter run right before `handle`, null if `handle` is the first.
    pub fn layouter_previous(&self, handle: LayouterHandle) -> LayouterHandle {
        self.layouter_registry
            .previous(handle.to_raw())
            .map_or(LayouterHandle::NULL, LayouterHandle::from_raw)
    }

    /// Layouter run right after `handle`, null if `handle` is the last.
    pub fn layouter_next(&self, handle: LayouterHandle) -> LayouterHandle {
        self.layouter_registry
            .next(handle.to_raw())
            .map_or(LayouterHandle::NULL, LayouterHandle::from_raw)
    }

    /// Number of layouter slots, including free ones.
    pub fn layouter_capacity(&self) -> usize {
        self.layouter_registry.capacity()
    }

    /// Number of used layouter slots.
    pub fn layouter_used_count(&self) -> usize {
        self.layouter_registry.used_count()
    }

    /// Whether `handle` refers to a live layouter.
    pub fn is_layouter_handle_valid(&self, handle: LayouterHandle) -> bool {
        self.layouter_registry.is_valid(handle.to_raw())
    }

    /// Whether `layout` refers to a live layout of a live layouter with an instance.
    pub fn is_layout_handle_valid(&self, layout: LayoutHandle) -> bool {
        self.layouter_instance(layout.layouter())
            .is_ok_and(|layouter| layouter.core().is_layout_handle_valid(layout))
    }

    // Animators

    /// Create an animator.
    ///
    /// # Panics
    ///
    /// If all 256 animator slots are used.
    pub fn create_animator(&mut self) -> AnimatorHandle {
        let handle = AnimatorHandle::from_raw(self.animator_registry.allocate());
        if self.animators.len() <= handle.idx() {
            self.animators.resize_with(handle.idx() + 1, || None);
        }
        self.animators[handle.idx()] = None;
        handle
    }

    /// Set the instance of an animator created with [`create_animator`](Self::create_animator).
    ///
    /// # Panics
    ///
    /// If the instance handle isn't valid, an instance is already set for it, or a data or style
    /// animator is associated with an invalid layer.
    pub fn set_animator_instance(&mut self, instance: Box<dyn Animator>) {
        let handle = instance.core().handle();
        assert!(
            self.is_animator_handle_valid(handle),
            "UserInterface::set_animator_instance(): invalid handle {handle:?}"
        );
        assert!(
            self.animators[handle.idx()].is_none(),
            "UserInterface::set_animator_instance(): instance for {handle:?} already set"
        );
        if let Some(layer) = instance.kind().layer() {
            assert!(
                self.is_layer_handle_valid(layer),
                "UserInterface::set_animator_instance(): invalid layer {layer:?} for {handle:?}"
            );
        }
        self.animators[handle.idx()] = Some(instance);
    }

    fn animator_instance(&self, handle: AnimatorHandle) -> Result<&dyn Animator, InstanceError> {
        if !self.is_animator_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.animators[handle.idx()]
            .as_deref()
            .ok_or(InstanceError::NoInstance)
    }

    fn animator_instance_mut(
        &mut self,
        handle: AnimatorHandle,
    ) -> Result<&mut Box<dyn Animator>, InstanceError> {
        if !self.is_animator_handle_valid(handle) {
            return Err(InstanceError::InvalidHandle);
        }
        self.animators[handle.idx()]
            .as_mut()
            .ok_or(InstanceError::NoInstance)
    }

    /// Animator instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn animator(&self, handle: AnimatorHandle) -> &dyn Animator {
        match self.animator_instance(handle) {
            Ok(animator) => animator,
            Err(error) => panic!("UserInterface::animator(): {error}: {handle:?}"),
        }
    }

    /// Mutable animator instance.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid or has no instance.
    pub fn animator_mut(&mut self, handle: AnimatorHandle) -> &mut dyn Animator {
        match self.animator_instance_mut(handle) {
            Ok(animator) => &mut **animator,
            Err(error) => panic!("UserInterface::animator_mut(): {error}: {handle:?}"),
        }
    }

    /// Animator instance as its concrete type.
    pub fn animator_as<T: Animator>(&self, handle: AnimatorHandle) -> Result<&T, InstanceError> {
        let animator: &dyn Any = self.animator_instance(handle)?;
        animator.downcast_ref().ok_or(InstanceError::WrongType)
    }

    /// Mutable animator instance as its concrete type.
    pub fn animator_as_mut<T: Animator>(
        &mut self,
        handle: AnimatorHandle,
    ) -> Result<&mut T, InstanceError> {
        let animator: &mut dyn Any = &mut **self.animator_instance_mut(handle)?;
        animator.downcast_mut().ok_or(InstanceError::WrongType)
    }

    /// Remove an animator together with its instance and all its animations.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn remove_animator(&mut self, handle: AnimatorHandle) {
        assert!(
            self.is_animator_handle_valid(handle),
            "UserInterface::remove_animator(): invalid handle {handle:?}"
        );
        if !self.animator_registry.free(handle.to_raw()) {
            debug!(?handle, "animator slot retired");
        }
        self.animators[handle.idx()] = None;
    }

    /// Number of animator slots, including free ones.
    pub fn animator_capacity(&self) -> usize {
        self.animator_registry.capacity()
    }

    /// Number of used animator slots.
    pub fn animator_used_count(&self) -> usize {
        self.animator_registry.used_count()
    }

    /// Whether `handle` refers to a live animator.
    pub fn is_animator_handle_valid(&self, handle: AnimatorHandle) -> bool {
        self.animator_registry.is_valid(handle.to_raw())
    }

    /// Whether `animation` refers to a live animation of a live animator with an instance.
    pub fn is_animation_handle_valid(&self, animation: AnimationHandle) -> bool {
        self.animator_instance(animation.animator())
            .is_ok_and(|animator| animator.core().is_animation_handle_valid(animation))
    }

    /// Attach `animation` to `node`, or detach it if `node` is null.
    ///
    /// The animation gets removed together with the node.
    ///
    /// # Panics
    ///
    /// If `node` is neither null nor valid, `animation` isn't valid or its animator doesn't
    /// support node attachments.
    pub fn attach_animation_to_node(&mut self, node: NodeHandle, animation: AnimationHandle) {
        assert!(
            node.is_null() || self.is_node_handle_valid(node),
            "UserInterface::attach_animation_to_node(): invalid node handle {node:?}"
        );
        assert!(
            self.is_animation_handle_valid(animation),
            "UserInterface::attach_animation_to_node(): invalid animation handle {animation:?}"
        );
        if let Ok(animator) = self.animator_instance_mut(animation.animator()) {
            animator
                .core_mut()
                .attach_node(animation.animation(), node);
        }
    }

    /// Attach `animation` to `data`, or detach it if `data` is null.
    ///
    /// The animation gets removed together with the data.
    ///
    /// # Panics
    ///
    /// If `data` is neither null nor valid, `animation` isn't valid or its animator doesn't
    /// support data attachments.
    pub fn attach_animation_to_data(&mut self, data: DataHandle, animation: AnimationHandle) {
        assert!(
            data.is_null() || self.is_data_handle_valid(data),
            "UserInterface::attach_animation_to_data(): invalid data handle {data:?}"
        );
        assert!(
            self.is_animation_handle_valid(animation),
            "UserInterface::attach_animation_to_data(): invalid animation handle {animation:?}"
        );
        if let Ok(animator) = self.animator_instance_mut(animation.animator()) {
            animator
                .core_mut()
                .attach_data(animation.animation(), data);
        }
    }

    /// Time of the last [`advance_animations`](Self::advance_animations).
    pub fn animation_time(&self) -> Duration {
        self.animation_time
    }

    // Passes

    /// Remove descendants of removed nodes and everything attached to removed nodes or data.
    ///
    /// No-op unless [`state`](Self::state) contains [`UserInterfaceStates::NEEDS_DATA_CLEAN`].
    pub fn clean(&mut self) {
        if !self.state().intersects(UserInterfaceStates::CLEAN_BITS) {
            return;
        }
        if self.state.contains(UserInterfaceStates::NEEDS_NODE_CLEAN) {
            self.clean_nodes();
        }
        self.clean_data();
        for layer in self.layers.iter_mut().flatten() {
            layer.core_mut().clear_states(LayerStates::NEEDS_DATA_CLEAN);
        }
        self.state.remove(UserInterfaceStates::CLEAN_BITS);
    }

    fn clean_nodes(&mut self) {
        let mut removed = 0_usize;
        while let Some(orphan) = self.orphans.pop() {
            if !self.is_node_handle_valid(orphan) {
                continue;
            }
            self.free_node(orphan);
            removed += 1;
        }

        let registry = &self.node_registry;
        for raw in registry.iter() {
            self.nodes[raw.index() as usize]
                .children
                .retain(|child| registry.is_valid(child.to_raw()));
        }

        let is_valid = |node: NodeHandle| registry.is_valid(node.to_raw());
        let mut removed_data = 0_usize;
        for layer in self.layers.iter_mut().flatten() {
            let stale = layer.core_mut().clean_nodes(is_valid);
            if !stale.is_empty() {
                removed_data += stale.len();
                layer.clean(&stale);
            }
        }
        for layouter in self.layouters.iter_mut().flatten() {
            let stale = layouter.core_mut().clean_nodes(is_valid);
            if !stale.is_empty() {
                layouter.clean(&stale);
            }
        }
        for animator in self.animators.iter_mut().flatten() {
            let stale = animator.core_mut().clean_nodes(is_valid);
            if !stale.is_empty() {
                animator.clean(&stale);
            }
        }
        debug!(removed, removed_data, "cleaned orphaned nodes");
    }

    fn clean_data(&mut self) {
        let layer_registry = &self.layer_registry;
        let layers = &self.layers;
        let is_valid = |data: DataHandle| {
            layer_registry.is_valid(data.layer().to_raw())
                && layers[data.layer().idx()]
                    .as_ref()
                    .is_some_and(|layer| layer.core().is_data_handle_valid(data))
        };
        for animator in self.animators.iter_mut().flatten() {
            let stale = animator.core_mut().clean_data(is_valid);
            if !stale.is_empty() {
                debug!(
                    animator = ?animator.core().handle(),
                    count = stale.len(),
                    "removed animations of removed data"
                );
                animator.clean(&stale);
            }
        }
    }

    /// Bring the visible node order, layouts, geometry and per-layer data order up to date, and
    /// update layers that need it.
    ///
    /// Calls [`clean`](Self::clean) first. No-op if [`state`](Self::state) contains none of
    /// [`UserInterfaceStates::UPDATE_BITS`].
    pub fn update(&mut self) {
        self.clean();
        let states = self.state();
        if !states.intersects(UserInterfaceStates::UPDATE_BITS) {
            return;
        }

        if states.contains(UserInterfaceStates::NEEDS_LAYOUT_ASSIGNMENT_UPDATE) {
            self.frame.order_visible(
                &self.node_registry,
                &self.nodes,
                &self.order_links,
                &self.roots,
            );
            self.order_layouts();
        }
        if states.contains(UserInterfaceStates::NEEDS_LAYOUT_UPDATE) {
            self.run_layouts();
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_CLIP_UPDATE) {
            let ui_rect = Rect::from_origin_size(Point::ORIGIN, self.size);
            self.frame.compute_geometry(&self.nodes, ui_rect);
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_ENABLED_UPDATE) {
            self.frame.compute_enabled(&self.nodes);
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_OPACITY_UPDATE) {
            self.frame.compute_opacities(&self.nodes);
        }
        if states.contains(UserInterfaceStates::NEEDS_DATA_ATTACHMENT_UPDATE) {
            let layers = &self.layers;
            let ordered = self.layer_registry.iter().filter_map(|raw| {
                let handle = LayerHandle::from_raw(raw);
                layers[handle.idx()]
                    .as_deref()
                    .map(|layer| (handle, layer.core()))
            });
            self.frame
                .order_data(&self.node_registry, self.layer_registry.capacity(), ordered);
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_ENABLED_UPDATE) {
            self.reset_lost_nodes();
        }

        let mut passed = LayerStates::empty();
        if states.contains(UserInterfaceStates::NEEDS_DATA_ATTACHMENT_UPDATE) {
            passed |= LayerStates::NEEDS_NODE_ORDER_UPDATE;
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_CLIP_UPDATE) {
            passed |= LayerStates::NEEDS_NODE_OFFSET_SIZE_UPDATE;
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_ENABLED_UPDATE) {
            passed |= LayerStates::NEEDS_NODE_ENABLED_UPDATE;
        }
        if states.contains(UserInterfaceStates::NEEDS_NODE_OPACITY_UPDATE) {
            passed |= LayerStates::NEEDS_NODE_OPACITY_UPDATE;
        }
        let empty = LayerOrder::default();
        let mut updated = 0_usize;
        for raw in self.layer_registry.iter() {
            let index = raw.index() as usize;
            let Some(layer) = self.layers[index].as_deref_mut() else {
                continue;
            };
            let own = layer.core().state()
                & (LayerStates::NEEDS_DATA_UPDATE | LayerStates::NEEDS_ATTACHMENT_UPDATE);
            let layer_states = passed | own;
            if layer_states.is_empty() {
                continue;
            }
            let order = self.frame.layers.get(index).unwrap_or(&empty);
            layer.update(&LayerUpdate {
                states: layer_states,
                data_ids: &order.data,
                clip_runs: &order.clip_runs,
                node_offsets: &self.frame.absolute_offsets,
                node_sizes: &self.frame.sizes,
                node_opacities: &self.frame.opacities,
                nodes_enabled: &self.frame.enabled,
            });
            layer.core_mut().clear_states(LayerStates::UPDATE_BITS);
            updated += 1;
        }
        for layouter in self.layouters.iter_mut().flatten() {
            layouter.core_mut().clear_states();
        }
        self.state.remove(UserInterfaceStates::UPDATE_BITS);
        trace!(
            visible = self.frame.visible.len(),
            hierarchies = self.frame.hierarchies.len(),
            layers = updated,
            "update"
        );
    }

    fn order_layouts(&mut self) {
        self.layout_batches.clear();
        let layouters = &self.layouters;
        let order: Vec<usize> = self
            .layouter_registry
            .iter()
            .map(|raw| raw.index() as usize)
            .filter(|&index| layouters[index].is_some())
            .collect();
        if order.is_empty() {
            return;
        }

        let capacity = self.node_registry.capacity();
        // Per node: (position in layouter order, layout id).
        let mut node_layouts: Vec<Vec<(usize, u32)>> = vec![Vec::new(); capacity];
        for (position, &index) in order.iter().enumerate() {
            let Some(layouter) = &self.layouters[index] else {
                continue;
            };
            let core = layouter.core();
            for layout in core.iter() {
                let node = core.node(layout);
                if self.node_registry.is_valid(node.to_raw()) {
                    node_layouts[node.idx()].push((position, layout.index()));
                }
            }
        }

        // Level of a node is the number of ancestors with layouts, itself included.
        let mut levels = vec![0_usize; capacity];
        let mut batches: Vec<LayoutBatch> = Vec::new();
        for visible in &self.frame.visible {
            let index = visible.handle.idx();
            let parent = self.nodes[index].parent;
            let parent_level = if parent.is_null() {
                0
            } else {
                levels[parent.idx()]
            };
            let layouts = &node_layouts[index];
            if layouts.is_empty() {
                levels[index] = parent_level;
                continue;
            }
            levels[index] = parent_level + 1;
            for &(position, id) in layouts {
                let slot = parent_level * order.len() + position;
                if batches.len() <= slot {
                    batches.resize_with(slot + 1, LayoutBatch::default);
                }
                let batch = &mut batches[slot];
                batch.layouter = order[position];
                batch.layout_ids.push(id);
                let parent_shares_layouter = !parent.is_null()
                    && node_layouts[parent.idx()]
                        .iter()
                        .any(|&(p, _)| p == position);
                if !parent_shares_layouter {
                    batch.top_level.push(id);
                }
            }
        }
        batches.retain(|batch| !batch.layout_ids.is_empty());
        self.layout_batches = batches;
    }

    fn run_layouts(&mut self) {
        if self.layout_batches.is_empty() {
            return;
        }
        let mut offsets: Vec<Vec2> = self.nodes.iter().map(|node| node.offset).collect();
        let mut sizes: Vec<Size> = self.nodes.iter().map(|node| node.size).collect();
        for batch in &self.layout_batches {
            if let Some(layouter) = self.layouters[batch.layouter].as_deref_mut() {
                layouter.update(&mut LayoutUpdate {
                    layout_ids: &batch.layout_ids,
                    top_level_layout_ids: &batch.top_level,
                    node_offsets: &mut offsets,
                    node_sizes: &mut sizes,
                });
            }
        }
        for visible in &self.frame.visible {
            let index = visible.handle.idx();
            self.nodes[index].offset = offsets[index];
            self.nodes[index].size = sizes[index];
        }
        trace!(batches = self.layout_batches.len(), "ran layouts");
    }

    /// Reset pressed, captured, hovered and focused nodes that got removed, hidden, disabled or
    /// stopped being focusable.
    fn reset_lost_nodes(&mut self) {
        let roles = [self.pressed, self.captured, self.hovered, self.focused];
        for (i, &node) in roles.iter().enumerate() {
            if node.is_null() || roles[..i].contains(&node) {
                continue;
            }
            if !self.is_node_handle_valid(node) {
                self.forget_node(node);
                continue;
            }
            let visible = self.frame.is_reachable_and_enabled(node);
            let focus_lost = node == self.focused
                && (!visible
                    || !self.nodes[node.idx()]
                        .flags
                        .contains(NodeFlags::FOCUSABLE));
            if visible && !focus_lost {
                continue;
            }
            let mut event = VisibilityLostEvent::default();
            if !visible {
                event.status.pressed = node == self.pressed;
                event.status.hovered = node == self.hovered;
                if node == self.pressed {
                    self.pressed = NodeHandle::NULL;
                }
                if node == self.captured {
                    self.captured = NodeHandle::NULL;
                }
                if node == self.hovered {
                    self.hovered = NodeHandle::NULL;
                }
            }
            if focus_lost {
                event.status.focused = true;
                self.focused = NodeHandle::NULL;
            }
            debug!(?node, visible, focus_lost, "node lost visibility");
            self.call_node_data(node, |layer, data| {
                layer.visibility_lost_event(data, &mut event);
            });
        }
    }

    fn forget_node(&mut self, node: NodeHandle) {
        for role in [
            &mut self.pressed,
            &mut self.captured,
            &mut self.hovered,
            &mut self.focused,
        ] {
            if *role == node {
                *role = NodeHandle::NULL;
            }
        }
    }

    /// Call `call` for every data attached to `node` in a layer with [`LayerFeatures::EVENT`],
    /// front layer first.
    pub(crate) fn call_node_data(
        &mut self,
        node: NodeHandle,
        mut call: impl FnMut(&mut dyn Layer, u32),
    ) {
        let Some(data) = self.frame.node_data.get(node.idx()) else {
            return;
        };
        for data in data {
            let Some(layer) = self
                .layers
                .get_mut(data.layer().idx())
                .and_then(|layer| layer.as_deref_mut())
            else {
                continue;
            };
            if layer.features().contains(LayerFeatures::EVENT) {
                call(layer, data.data().index());
            }
        }
    }

    /// Update, then draw every visible top-level hierarchy back to front, each through all layers
    /// with [`LayerFeatures::DRAW`] in layer order.
    pub fn draw(&mut self) {
        self.update();
        let mut calls = 0_usize;
        for hierarchy in 0..self.frame.hierarchies.len() {
            for raw in self.layer_registry.iter() {
                let index = raw.index() as usize;
                let Some(layer) = self.layers[index].as_deref_mut() else {
                    continue;
                };
                let features = layer.features();
                if !features.contains(LayerFeatures::DRAW) {
                    continue;
                }
                let Some(order) = self.frame.layers.get(index) else {
                    continue;
                };
                let Some((data, runs)) = order.hierarchies.get(hierarchy) else {
                    continue;
                };
                if data.is_empty() {
                    continue;
                }
                let draw = LayerDraw {
                    data_ids: &order.data[data.clone()],
                    data_offset: data.start,
                    clip_runs: &order.clip_runs[runs.clone()],
                    node_offsets: &self.frame.absolute_offsets,
                    node_sizes: &self.frame.sizes,
                    node_opacities: &self.frame.opacities,
                };
                if features.contains(LayerFeatures::COMPOSITE) {
                    layer.composite(&draw);
                }
                layer.draw(&draw);
                calls += 1;
            }
        }
        trace!(calls, "draw");
    }

    /// Advance all animators that need it to `time`, then apply requested node changes.
    ///
    /// Calls [`clean`](Self::clean) first.
    ///
    /// # Panics
    ///
    /// If `time` is earlier than the previous advance.
    pub fn advance_animations(&mut self, time: Duration) {
        assert!(
            time >= self.animation_time,
            "UserInterface::advance_animations(): expected a time at least {:?} but got {:?}",
            self.animation_time,
            time
        );
        self.clean();
        self.animation_time = time;
        if !self
            .state()
            .contains(UserInterfaceStates::NEEDS_ANIMATION_ADVANCE)
        {
            return;
        }

        let mut changes = NodeChanges::default();
        let mut advanced = 0_usize;
        for raw in self.animator_registry.iter() {
            let Some(animator) = self.animators[raw.index() as usize].as_deref_mut() else {
                continue;
            };
            if !animator
                .core()
                .animator_state()
                .contains(AnimatorStates::NEEDS_ADVANCE)
            {
                continue;
            }
            let step = animator.core_mut().update(time);
            match animator.kind() {
                AnimatorKind::Generic => animator.advance(&step, AnimationTarget::None),
                AnimatorKind::Node => animator.advance(&step, AnimationTarget::Nodes(&mut changes)),
                AnimatorKind::Data(layer) | AnimatorKind::Style(layer) => {
                    let target = if self.layer_registry.is_valid(layer.to_raw()) {
                        self.layers[layer.idx()].as_deref_mut()
                    } else {
                        None
                    };
                    match target {
                        Some(target) => animator.advance(&step, AnimationTarget::Layer(target)),
                        None => debug!(
                            animator = ?animator.core().handle(),
                            ?layer,
                            "skipped animator of a removed layer"
                        ),
                    }
                }
            }
            let finished = animator.core_mut().remove_finished(&step);
            if !finished.is_empty() {
                animator.clean(&finished);
            }
            advanced += 1;
        }

        for (node, change) in changes.drain() {
            // An earlier change may have removed the node.
            if !self.is_node_handle_valid(node) {
                continue;
            }
            match change {
                NodeChange::Offset(offset) => self.set_node_offset(node, offset),
                NodeChange::Size(size) => self.set_node_size(node, size),
                NodeChange::Opacity(opacity) => self.set_node_opacity(node, opacity),
                NodeChange::AddFlags(flags) => self.add_node_flags(node, flags),
                NodeChange::ClearFlags(flags) => self.clear_node_flags(node, flags),
                NodeChange::Remove => self.remove_node(node),
            }
        }
        trace!(advanced, ?time, "advanced animations");
    }
}
