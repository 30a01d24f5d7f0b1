// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer, focus and key events.
//!
//! A button and a text field. Pressing the field focuses it, typing goes there, and dragging out
//! of the button while it's captured still ends in a click.
//!
//! Run:
//! - `cargo run -p understory_demos --example events`

use std::time::Duration;

use kurbo::{Point, Size, Vec2};
use understory_ui::{
    FocusEvent, Key, KeyEvent, Layer, LayerCore, LayerFeatures, LayerHandle, Modifiers,
    NodeFlags, NodeHandle, Pointer, PointerEvent, PointerMoveEvent, Pointers, TextInputEvent,
    UserInterface,
};

/// Button and text field behavior keyed by data id.
struct Widgets {
    core: LayerCore,
    text_fields: Vec<u32>,
    text: String,
}

impl Layer for Widgets {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn features(&self) -> LayerFeatures {
        LayerFeatures::EVENT
    }

    fn pointer_press_event(&mut self, data: u32, event: &mut PointerEvent) {
        println!("  press on {data} at {:?}", event.position());
        event.set_accepted(true);
    }

    fn pointer_release_event(&mut self, data: u32, event: &mut PointerEvent) {
        println!("  release on {data}, hovering: {}", event.is_hovering());
        event.set_accepted(true);
    }

    fn pointer_tap_or_click_event(&mut self, data: u32, _event: &mut PointerEvent) {
        println!("  click on {data}");
    }

    fn pointer_move_event(&mut self, data: u32, event: &mut PointerMoveEvent) {
        println!("  move over {data}, hovering: {}", event.is_hovering());
        event.set_accepted(true);
    }

    fn pointer_enter_event(&mut self, data: u32, _event: &mut PointerMoveEvent) {
        println!("  enter {data}");
    }

    fn pointer_leave_event(&mut self, data: u32, _event: &mut PointerMoveEvent) {
        println!("  leave {data}");
    }

    fn focus_event(&mut self, data: u32, event: &mut FocusEvent) {
        if self.text_fields.contains(&data) {
            println!("  focus {data}");
            event.set_accepted(true);
        }
    }

    fn blur_event(&mut self, data: u32, _event: &mut FocusEvent) {
        println!("  blur {data}");
    }

    fn key_press_event(&mut self, data: u32, event: &mut KeyEvent) {
        if event.key() == BACKSPACE && self.text_fields.contains(&data) {
            self.text.pop();
            event.set_accepted(true);
        }
    }

    fn text_input_event(&mut self, _data: u32, event: &mut TextInputEvent) {
        self.text.push_str(event.text());
        event.set_accepted(true);
    }
}

const BACKSPACE: Key = Key(8);

fn pointer(time: u64) -> PointerEvent {
    PointerEvent::new(
        Duration::from_millis(time),
        Pointer::MouseLeft,
        true,
        0,
        Modifiers::empty(),
    )
}

fn moved(time: u64) -> PointerMoveEvent {
    PointerMoveEvent::new(
        Duration::from_millis(time),
        None,
        Pointers::MOUSE_LEFT,
        true,
        0,
        Modifiers::empty(),
    )
}

fn main() {
    let mut ui = UserInterface::with_unscaled_size(Size::new(300.0, 100.0));
    let layer = ui.create_layer(LayerHandle::NULL);
    ui.set_layer_instance(Box::new(Widgets {
        core: LayerCore::new(layer),
        text_fields: Vec::new(),
        text: String::new(),
    }));

    let button = ui.create_node(
        NodeHandle::NULL,
        Vec2::new(10.0, 10.0),
        Size::new(80.0, 30.0),
        NodeFlags::empty(),
    );
    let field = ui.create_node(
        NodeHandle::NULL,
        Vec2::new(110.0, 10.0),
        Size::new(150.0, 30.0),
        NodeFlags::FOCUSABLE,
    );
    ui.layer_mut(layer).core_mut().create(button);
    let field_data = ui.layer_mut(layer).core_mut().create(field).data().index();
    if let Ok(widgets) = ui.layer_as_mut::<Widgets>(layer) {
        widgets.text_fields.push(field_data);
    }

    println!("press the button, drag out and release:");
    ui.pointer_press_event(Point::new(20.0, 20.0), &mut pointer(0));
    ui.pointer_move_event(Point::new(100.0, 20.0), &mut moved(10));
    println!("  captured: {:?}", ui.current_captured_node());
    ui.pointer_release_event(Point::new(100.0, 20.0), &mut pointer(20));

    println!("click the text field and type:");
    ui.pointer_press_event(Point::new(120.0, 20.0), &mut pointer(30));
    ui.pointer_release_event(Point::new(120.0, 20.0), &mut pointer(40));
    for text in ["h", "e", "y", "!"] {
        ui.text_input_event(&mut TextInputEvent::new(Duration::from_millis(50), text));
    }
    ui.key_press_event(&mut KeyEvent::new(
        Duration::from_millis(60),
        BACKSPACE,
        Modifiers::empty(),
    ));
    if let Ok(widgets) = ui.layer_as::<Widgets>(layer) {
        println!("  text: {:?}", widgets.text);
    }

    println!("click the button, the field loses focus:");
    ui.pointer_press_event(Point::new(20.0, 20.0), &mut pointer(70));
    ui.pointer_release_event(Point::new(20.0, 20.0), &mut pointer(80));
    println!("  focused: {:?}", ui.current_focused_node());
}
