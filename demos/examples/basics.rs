// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nodes, a drawing layer and clipping.
//!
//! Builds a small panel with a clipped list of rows, one of which is scrolled out of view, and
//! prints what a layer is asked to draw.
//!
//! Run:
//! - `cargo run -p understory_demos --example basics`

use kurbo::{Size, Vec2};
use understory_ui::{
    Layer, LayerCore, LayerDraw, LayerFeatures, LayerHandle, LayerUpdate, NodeFlags, NodeHandle,
    UserInterface,
};

/// Prints draw calls instead of rendering.
struct PrintLayer {
    core: LayerCore,
    labels: Vec<&'static str>,
}

impl Layer for PrintLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn features(&self) -> LayerFeatures {
        LayerFeatures::DRAW_USES_SCISSOR
    }

    fn update(&mut self, update: &LayerUpdate<'_>) {
        println!("update {:?}: {} visible data", update.states, update.data_ids.len());
    }

    fn draw(&mut self, draw: &LayerDraw<'_>) {
        let mut ids = draw.data_ids.iter();
        for run in draw.clip_runs {
            println!("  scissor {:?}", run.rect);
            for &id in ids.by_ref().take(run.count as usize) {
                let node = self.core.node_at(id);
                let offset = draw.node_offsets[node.index() as usize];
                let size = draw.node_sizes[node.index() as usize];
                println!("    {} at {:?} size {:?}", self.labels[id as usize], offset, size);
            }
        }
    }
}

fn main() {
    let mut ui = UserInterface::with_unscaled_size(Size::new(200.0, 150.0));
    let layer = ui.create_layer(LayerHandle::NULL);
    ui.set_layer_instance(Box::new(PrintLayer {
        core: LayerCore::new(layer),
        labels: Vec::new(),
    }));

    let panel = ui.create_node(
        NodeHandle::NULL,
        Vec2::new(10.0, 10.0),
        Size::new(120.0, 60.0),
        NodeFlags::CLIP,
    );
    let mut rows = Vec::new();
    let mut nodes = vec![("panel", panel)];
    for (i, label) in ["row 0", "row 1", "row 2"].into_iter().enumerate() {
        let row = ui.create_node(
            panel,
            Vec2::new(0.0, i as f64 * 40.0),
            Size::new(120.0, 30.0),
            NodeFlags::empty(),
        );
        rows.push(row);
        nodes.push((label, row));
    }
    for (label, node) in nodes {
        ui.layer_mut(layer).core_mut().create(node);
        ui.layer_as_mut::<PrintLayer>(layer)
            .expect("layer was just set")
            .labels
            .push(label);
    }

    println!("first frame, row 2 is clipped away:");
    ui.draw();

    println!("scrolled by 40:");
    for (i, &row) in rows.iter().enumerate() {
        ui.set_node_offset(row, Vec2::new(0.0, i as f64 * 40.0 - 40.0));
    }
    ui.draw();

    println!("nothing changed, no update:");
    ui.draw();
}

