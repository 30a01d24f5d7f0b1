// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Top-level ordering for windows and popups.
//!
//! Two overlapping windows get raised by reordering roots. A dropdown inside a clipped window is
//! promoted to a nested top-level node so it's drawn over everything in the window and isn't
//! clipped by it.
//!
//! Run:
//! - `cargo run -p understory_demos --example top_level_order`

use std::time::Duration;

use kurbo::{Point, Size, Vec2};
use understory_ui::{
    Layer, LayerCore, LayerDraw, LayerFeatures, LayerHandle, Modifiers, NodeFlags, NodeHandle,
    Pointer, PointerEvent, UserInterface,
};

struct Names {
    core: LayerCore,
    names: Vec<&'static str>,
}

impl Layer for Names {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn features(&self) -> LayerFeatures {
        LayerFeatures::DRAW | LayerFeatures::EVENT
    }

    fn draw(&mut self, draw: &LayerDraw<'_>) {
        let names: Vec<_> = draw.data_ids.iter().map(|&id| self.names[id as usize]).collect();
        println!("  draw {}", names.join(", "));
    }

    fn pointer_press_event(&mut self, data: u32, event: &mut PointerEvent) {
        println!("  pressed {}", self.names[data as usize]);
        event.set_accepted(true);
    }
}

fn add(ui: &mut UserInterface, layer: LayerHandle, node: NodeHandle, name: &'static str) {
    ui.layer_mut(layer).core_mut().create(node);
    if let Ok(names) = ui.layer_as_mut::<Names>(layer) {
        names.names.push(name);
    }
}

fn click(ui: &mut UserInterface, x: f64, y: f64) {
    let event = PointerEvent::new(
        Duration::ZERO,
        Pointer::MouseRight,
        true,
        0,
        Modifiers::empty(),
    );
    if !ui.pointer_press_event(Point::new(x, y), &mut event.clone()) {
        println!("  nothing pressed");
    }
    ui.pointer_release_event(Point::new(x, y), &mut event.clone());
}

fn main() {
    let mut ui = UserInterface::with_unscaled_size(Size::new(400.0, 300.0));
    let layer = ui.create_layer(LayerHandle::NULL);
    ui.set_layer_instance(Box::new(Names {
        core: LayerCore::new(layer),
        names: Vec::new(),
    }));

    let back = ui.create_node(
        NodeHandle::NULL,
        Vec2::new(20.0, 20.0),
        Size::new(200.0, 150.0),
        NodeFlags::CLIP,
    );
    let front = ui.create_node(
        NodeHandle::NULL,
        Vec2::new(120.0, 80.0),
        Size::new(200.0, 150.0),
        NodeFlags::CLIP,
    );
    let dropdown = ui.create_node(
        back,
        Vec2::new(150.0, 100.0),
        Size::new(120.0, 120.0),
        NodeFlags::empty(),
    );
    add(&mut ui, layer, back, "back window");
    add(&mut ui, layer, front, "front window");
    add(&mut ui, layer, dropdown, "dropdown");

    println!("initial order, the dropdown is clipped and covered:");
    ui.draw();
    click(&mut ui, 200.0, 150.0);

    println!("back window raised:");
    ui.set_node_order(back, NodeHandle::NULL);
    ui.draw();
    click(&mut ui, 200.0, 150.0);

    println!("dropdown promoted to a nested top-level node:");
    ui.set_node_order(dropdown, NodeHandle::NULL);
    ui.draw();
    click(&mut ui, 280.0, 230.0);
    println!("  last nested in back window: {:?}", ui.node_order_last_nested(back));

    println!("front window raised again, the dropdown goes behind with its window:");
    ui.set_node_order(front, NodeHandle::NULL);
    ui.draw();

    println!("dropdown closed:");
    ui.clear_node_order(dropdown);
    ui.draw();
    println!("  dropdown ordered: {}", ui.is_node_ordered(dropdown));
}
