// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-update derived state: visible node order, geometry, and per-layer data order.
//!
//! Visible nodes are stored in draw pre-order. Each top-level hierarchy is a contiguous range of
//! that order, made of the top-level node and its descendants that aren't top-level themselves.
//! Nested top-level hierarchies follow the hierarchy of their scope, in their order.
//!
//! Reverse pre-order of a range visits every node after all its descendants and later siblings
//! before earlier ones, which is exactly front-to-back event order.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use kurbo::{Point, Rect, Size, Vec2};
use understory_handle::{Links, ListHead, Registry};

use crate::handle::{DataHandle, LayerHandle, NodeHandle};
use crate::layer::{ClipRun, LayerCore};
use crate::node::{Node, NodeFlags};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct VisibleNode {
    pub(crate) handle: NodeHandle,
    // Descendants following this node in the same hierarchy.
    pub(crate) descendants: u32,
    // Positions in the visible order, for walking children front to back.
    pub(crate) last_child: Option<u32>,
    pub(crate) previous_sibling: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct LayerOrder {
    pub(crate) data: Vec<u32>,
    pub(crate) clip_runs: Vec<ClipRun>,
    // Data and clip run ranges, one entry per hierarchy.
    pub(crate) hierarchies: Vec<(Range<usize>, Range<usize>)>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Frame {
    pub(crate) visible: Vec<VisibleNode>,
    pub(crate) hierarchies: Vec<Range<usize>>,
    // Everything below is indexed by node index.
    pub(crate) reachable: Vec<bool>,
    pub(crate) enabled: Vec<bool>,
    pub(crate) culled: Vec<bool>,
    pub(crate) absolute_offsets: Vec<Vec2>,
    pub(crate) sizes: Vec<Size>,
    pub(crate) clip_rects: Vec<Rect>,
    child_clip_rects: Vec<Rect>,
    pub(crate) opacities: Vec<f32>,
    // Front layer first, ascending data id within a layer.
    pub(crate) node_data: Vec<Vec<DataHandle>>,
    // Indexed by layer index.
    pub(crate) layers: Vec<LayerOrder>,
}

pub(crate) fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

pub(crate) fn contains(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x < rect.x1 && point.y >= rect.y0 && point.y < rect.y1
}

impl Frame {
    fn resize_nodes(&mut self, capacity: usize) {
        self.reachable.clear();
        self.reachable.resize(capacity, false);
        self.enabled.resize(capacity, false);
        self.culled.resize(capacity, true);
        self.absolute_offsets.resize(capacity, Vec2::ZERO);
        self.sizes.resize(capacity, Size::ZERO);
        self.clip_rects.resize(capacity, Rect::ZERO);
        self.child_clip_rects.resize(capacity, Rect::ZERO);
        self.opacities.resize(capacity, 1.0);
        self.node_data.resize_with(capacity, Vec::new);
    }

    /// Whether the node is visible and receives events. Not affected by culling.
    pub(crate) fn is_reachable_and_enabled(&self, node: NodeHandle) -> bool {
        let i = node.idx();
        self.reachable.get(i).copied().unwrap_or(false) && self.enabled[i]
    }

    /// Rebuild the visible draw order.
    pub(crate) fn order_visible(
        &mut self,
        registry: &Registry<20, 12>,
        nodes: &[Node],
        links: &Links,
        roots: &ListHead,
    ) {
        self.visible.clear();
        self.hierarchies.clear();
        self.resize_nodes(registry.capacity());
        for index in links.iter(roots) {
            if registry.is_used(index) {
                self.visit_top_level(registry, nodes, links, index);
            }
        }
    }

    fn visit_top_level(
        &mut self,
        registry: &Registry<20, 12>,
        nodes: &[Node],
        links: &Links,
        index: u32,
    ) {
        let node = &nodes[index as usize];
        if node.flags.contains(NodeFlags::HIDDEN) {
            return;
        }
        let start = self.visible.len();
        self.visit_subtree(registry, nodes, index);
        self.hierarchies.push(start..self.visible.len());
        for nested in links.iter(&node.nested) {
            let parent = nodes[nested as usize].parent;
            if registry.is_used(nested) && self.reachable[parent.idx()] {
                self.visit_top_level(registry, nodes, links, nested);
            }
        }
    }

    /// Push `index` and its non-top-level descendants, returning its position unless hidden.
    fn visit_subtree(
        &mut self,
        registry: &Registry<20, 12>,
        nodes: &[Node],
        index: u32,
    ) -> Option<u32> {
        let node = &nodes[index as usize];
        if node.flags.contains(NodeFlags::HIDDEN) {
            return None;
        }
        let position = self.visible.len();
        self.visible.push(VisibleNode {
            handle: NodeHandle::new(index, registry.generation(index)),
            descendants: 0,
            last_child: None,
            previous_sibling: None,
        });
        self.reachable[index as usize] = true;
        let mut previous = None;
        for child in &node.children {
            if !registry.is_valid(child.to_raw()) || nodes[child.idx()].top_level {
                continue;
            }
            if let Some(child) = self.visit_subtree(registry, nodes, child.index()) {
                self.visible[child as usize].previous_sibling = previous;
                previous = Some(child);
            }
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Node count is bounded by the 20-bit node index."
        )]
        let (descendants, position_u32) =
            ((self.visible.len() - position - 1) as u32, position as u32);
        self.visible[position].descendants = descendants;
        self.visible[position].last_child = previous;
        Some(position_u32)
    }

    /// Frontmost direct child of `position` within the visible order.
    pub(crate) fn last_child(&self, position: usize) -> Option<usize> {
        self.visible[position].last_child.map(|c| c as usize)
    }

    /// Next direct sibling of `position` towards the back.
    pub(crate) fn previous_sibling(&self, position: usize) -> Option<usize> {
        self.visible[position].previous_sibling.map(|c| c as usize)
    }

    /// Absolute offsets, clip rectangles and culling.
    pub(crate) fn compute_geometry(&mut self, nodes: &[Node], ui_rect: Rect) {
        for h in 0..self.hierarchies.len() {
            let range = self.hierarchies[h].clone();
            for position in range.clone() {
                let index = self.visible[position].handle.idx();
                let node = &nodes[index];
                let parent_offset = if node.parent.is_null() {
                    Vec2::ZERO
                } else {
                    self.absolute_offsets[node.parent.idx()]
                };
                let offset = parent_offset + node.offset;
                let clip = if position == range.start {
                    ui_rect
                } else {
                    self.child_clip_rects[node.parent.idx()]
                };
                let rect = Rect::from_origin_size(offset.to_point(), node.size);
                self.absolute_offsets[index] = offset;
                self.sizes[index] = node.size;
                self.clip_rects[index] = clip;
                self.culled[index] = !overlaps(rect, clip);
                self.child_clip_rects[index] = if node.flags.contains(NodeFlags::CLIP) {
                    clip.intersect(rect)
                } else {
                    clip
                };
            }
        }
    }

    /// Event enablement, restarting at every top-level node.
    pub(crate) fn compute_enabled(&mut self, nodes: &[Node]) {
        for h in 0..self.hierarchies.len() {
            let range = self.hierarchies[h].clone();
            for position in range.clone() {
                let index = self.visible[position].handle.idx();
                let node = &nodes[index];
                let inherited = position == range.start || self.enabled[node.parent.idx()];
                self.enabled[index] = inherited && !node.flags.intersects(NodeFlags::NO_EVENTS);
            }
        }
    }

    /// Effective opacity as the product along the whole ancestor chain.
    pub(crate) fn compute_opacities(&mut self, nodes: &[Node]) {
        for position in 0..self.visible.len() {
            let index = self.visible[position].handle.idx();
            let node = &nodes[index];
            let inherited = if node.parent.is_null() {
                1.0
            } else {
                self.opacities[node.parent.idx()]
            };
            self.opacities[index] = inherited * node.opacity;
        }
    }

    /// Collect data attached to each node and order it per layer.
    ///
    /// `layers` are the layers with an instance, in back-to-front layer order.
    pub(crate) fn order_data<'a>(
        &mut self,
        registry: &Registry<20, 12>,
        layer_capacity: usize,
        layers: impl DoubleEndedIterator<Item = (LayerHandle, &'a LayerCore)>,
    ) {
        for data in &mut self.node_data {
            data.clear();
        }
        self.layers.resize_with(layer_capacity, LayerOrder::default);
        for order in &mut self.layers {
            order.data.clear();
            order.clip_runs.clear();
            order.hierarchies.clear();
        }
        let mut present = vec![false; layer_capacity];
        for (handle, core) in layers.rev() {
            present[handle.idx()] = true;
            for data in core.iter() {
                let node = core.node(data);
                if !node.is_null() && registry.is_valid(node.to_raw()) {
                    self.node_data[node.idx()].push(DataHandle::new(handle, data));
                }
            }
        }

        for h in 0..self.hierarchies.len() {
            let range = self.hierarchies[h].clone();
            let starts: Vec<(usize, usize)> = self
                .layers
                .iter()
                .map(|o| (o.data.len(), o.clip_runs.len()))
                .collect();
            for position in range {
                let index = self.visible[position].handle.idx();
                if self.culled[index] {
                    continue;
                }
                let clip = self.clip_rects[index];
                for data in &self.node_data[index] {
                    let order = &mut self.layers[data.layer().idx()];
                    let run_start = starts[data.layer().idx()].1;
                    order.data.push(data.data().index());
                    let in_hierarchy = order.clip_runs.len() > run_start;
                    match order.clip_runs.last_mut() {
                        Some(run) if in_hierarchy && run.rect == clip => {
                            run.count += 1;
                        }
                        _ => order.clip_runs.push(ClipRun {
                            rect: clip,
                            count: 1,
                        }),
                    }
                }
            }
            for (l, order) in self.layers.iter_mut().enumerate() {
                if present[l] {
                    let (data_start, run_start) = starts[l];
                    order
                        .hierarchies
                        .push((data_start..order.data.len(), run_start..order.clip_runs.len()));
                }
            }
        }
    }
}
