// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event routing.
//!
//! ## Overview
//!
//! Every entry point brings the user interface up to date first, then delivers the event to the
//! data attached to one node at a time. All data on a node get the event, and propagation stops
//! after the first node on which any data accepted it.
//!
//! ## Hit testing
//!
//! - Top-level hierarchies are visited front to back, nested ones before their scope.
//! - A node is a candidate if it's enabled and the point is inside both its rectangle and its
//!   clip rectangle. Children are only visited inside candidates.
//! - Children are visited front to back before the node itself, so the event goes to the
//!   frontmost node under the point and falls back to nodes behind it, then to ancestors.
//!
//! ## Pointer state
//!
//! - A primary press makes the accepting node pressed and, unless a handler released it,
//!   captured. A captured node gets all pointer events until a primary release. Handlers of
//!   secondary releases and of moves may take or release the capture as well.
//! - Primary moves update the hovered node, with leave and enter events on a change. While
//!   captured, only the captured node gets leave and enter events. Capture requested by a leave
//!   handler of an uncaptured move is ignored.
//! - A primary release on the pressed node is also a tap or click. The pressed node is
//!   forgotten once an uncaptured pointer moves away from it.
//! - Presses with [`Pointer::affects_focus`](crate::Pointer::affects_focus) pointers move the
//!   focus to the accepting node if it's [`NodeFlags::FOCUSABLE`] and accepts the focus.

use core::mem;
use core::time::Duration;

use kurbo::{Point, Rect, Vec2};
use tracing::debug;

use crate::event::{
    FocusEvent, KeyEvent, NodeStatus, PointerEvent, PointerMoveEvent, TextInputEvent,
};
use crate::frame::contains;
use crate::handle::NodeHandle;
use crate::layer::Layer;
use crate::node::NodeFlags;
use crate::ui::UserInterface;

/// Events delivered to nodes found by hit testing.
trait NodeEvent {
    fn prepare(&mut self, position: Point, status: NodeStatus, captured: bool);
    fn accepted(&self) -> bool;
}

impl NodeEvent for PointerEvent {
    fn prepare(&mut self, position: Point, status: NodeStatus, captured: bool) {
        self.position = position;
        self.status = status;
        self.captured = captured;
    }

    fn accepted(&self) -> bool {
        self.accepted
    }
}

impl NodeEvent for PointerMoveEvent {
    fn prepare(&mut self, position: Point, status: NodeStatus, captured: bool) {
        self.position = position;
        self.status = status;
        self.captured = captured;
    }

    fn accepted(&self) -> bool {
        self.accepted
    }
}

impl NodeEvent for KeyEvent {
    fn prepare(&mut self, position: Point, status: NodeStatus, _captured: bool) {
        self.position = Some(position);
        self.status = status;
    }

    fn accepted(&self) -> bool {
        self.accepted
    }
}

type Handler<E> = fn(&mut dyn Layer, u32, &mut E);

impl UserInterface {
    /// Node the last primary press was accepted on, null if none.
    pub fn current_pressed_node(&self) -> NodeHandle {
        self.pressed
    }

    /// Node receiving all pointer events, null if none.
    pub fn current_captured_node(&self) -> NodeHandle {
        self.captured
    }

    /// Node under the primary pointer that accepted the last move, null if none.
    pub fn current_hovered_node(&self) -> NodeHandle {
        self.hovered
    }

    /// Node receiving key and text input events, null if none.
    pub fn current_focused_node(&self) -> NodeHandle {
        self.focused
    }

    /// Position of the last primary pointer event in user interface coordinates.
    pub fn current_global_pointer_position(&self) -> Option<Point> {
        self.global_pointer_position
    }

    fn node_status(&self, node: NodeHandle, hovering: bool) -> NodeStatus {
        NodeStatus {
            hovering,
            pressed: node == self.pressed,
            hovered: node == self.hovered,
            focused: node == self.focused,
        }
    }

    fn node_offset_absolute(&self, node: NodeHandle) -> Vec2 {
        self.frame.absolute_offsets[node.idx()]
    }

    fn is_inside(&self, node: NodeHandle, point: Point) -> bool {
        let i = node.idx();
        let rect = Rect::from_origin_size(
            self.frame.absolute_offsets[i].to_point(),
            self.frame.sizes[i],
        );
        contains(rect, point) && contains(self.frame.clip_rects[i], point)
    }

    /// Deliver `event` to all data on `node`, returning whether any accepted it.
    fn call_on_node<E: NodeEvent>(
        &mut self,
        node: NodeHandle,
        point: Point,
        hovering: bool,
        captured: bool,
        event: &mut E,
        handler: Handler<E>,
    ) -> bool {
        let position = point - self.node_offset_absolute(node);
        event.prepare(position, self.node_status(node, hovering), captured);
        self.call_node_data(node, |layer, data| handler(layer, data, event));
        event.accepted()
    }

    /// Hit test `point` and deliver `event` until accepted, returning the accepting node.
    ///
    /// Every node sees `captured` as the initial capture state, whatever a previous node set.
    fn call_at<E: NodeEvent>(
        &mut self,
        point: Point,
        captured: bool,
        event: &mut E,
        handler: Handler<E>,
    ) -> NodeHandle {
        for hierarchy in (0..self.frame.hierarchies.len()).rev() {
            let start = self.frame.hierarchies[hierarchy].start;
            let node = self.call_in_subtree(start, point, captured, event, handler);
            if !node.is_null() {
                return node;
            }
        }
        NodeHandle::NULL
    }

    fn call_in_subtree<E: NodeEvent>(
        &mut self,
        position: usize,
        point: Point,
        captured: bool,
        event: &mut E,
        handler: Handler<E>,
    ) -> NodeHandle {
        let node = self.frame.visible[position].handle;
        if !self.frame.enabled[node.idx()] || !self.is_inside(node, point) {
            return NodeHandle::NULL;
        }
        let mut child = self.frame.last_child(position);
        while let Some(c) = child {
            let accepted = self.call_in_subtree(c, point, captured, event, handler);
            if !accepted.is_null() {
                return accepted;
            }
            child = self.frame.previous_sibling(c);
        }
        if self.call_on_node(node, point, true, captured, event, handler) {
            node
        } else {
            NodeHandle::NULL
        }
    }

    /// Handle a pointer press at `position`, given in window coordinates.
    ///
    /// Returns whether any data accepted the event. Focus changes don't affect the result.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn pointer_press_event(&mut self, position: Point, event: &mut PointerEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::pointer_press_event(): event already accepted"
        );
        self.update();
        let point = self.scale_position(position);
        let primary = event.is_primary();
        if primary {
            self.global_pointer_position = Some(point);
        }

        let press: Handler<PointerEvent> =
            |layer, data, event| layer.pointer_press_event(data, event);
        let node = if !primary && !self.captured.is_null() {
            let captured = self.captured;
            let inside = self.is_inside(captured, point);
            if self.call_on_node(captured, point, inside, true, event, press) {
                captured
            } else {
                NodeHandle::NULL
            }
        } else {
            // Primary presses capture implicitly.
            self.call_at(point, primary, event, press)
        };

        if primary {
            self.pressed = node;
            let captured = if event.captured {
                node
            } else {
                NodeHandle::NULL
            };
            if captured != self.captured {
                debug!(?captured, "pointer capture changed");
            }
            self.captured = captured;
            if event.pointer().affects_focus() {
                self.focus_pressed(node, event);
            }
        }
        !node.is_null()
    }

    fn focus_pressed(&mut self, node: NodeHandle, event: &PointerEvent) {
        let previous = self.focused;
        if !previous.is_null() && previous != node {
            self.blur(previous, event.time());
            self.focused = NodeHandle::NULL;
        }
        if node.is_null() {
            return;
        }
        let mut accepted = false;
        if self.nodes[node.idx()].flags.contains(NodeFlags::FOCUSABLE) {
            let mut focus = FocusEvent::new(event.time());
            focus.status = self.node_status(node, true);
            self.call_node_data(node, |layer, data| layer.focus_event(data, &mut focus));
            accepted = focus.accepted;
        }
        if accepted {
            self.focused = node;
        } else if previous == node {
            self.blur(node, event.time());
            self.focused = NodeHandle::NULL;
        }
        if self.focused != previous {
            debug!(focused = ?self.focused, "focus changed on press");
        }
    }

    fn blur(&mut self, node: NodeHandle, time: Duration) {
        let mut blur = FocusEvent::new(time);
        blur.status = self.node_status(node, false);
        self.call_node_data(node, |layer, data| layer.blur_event(data, &mut blur));
    }

    /// Handle a pointer release at `position`, given in window coordinates.
    ///
    /// Returns whether any data accepted the event.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn pointer_release_event(&mut self, position: Point, event: &mut PointerEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::pointer_release_event(): event already accepted"
        );
        self.update();
        let point = self.scale_position(position);
        let primary = event.is_primary();
        if primary {
            self.global_pointer_position = Some(point);
        }

        let release: Handler<PointerEvent> =
            |layer, data, event| layer.pointer_release_event(data, event);
        let (node, inside) = if self.captured.is_null() {
            (self.call_at(point, false, event, release), true)
        } else {
            let captured = self.captured;
            let inside = self.is_inside(captured, point);
            let accepted = self.call_on_node(captured, point, inside, true, event, release);
            (if accepted { captured } else { NodeHandle::NULL }, inside)
        };

        if primary {
            if !node.is_null() && node == self.pressed {
                event.status = self.node_status(node, inside);
                self.call_node_data(node, |layer, data| {
                    layer.pointer_tap_or_click_event(data, event);
                });
            }
            if !self.captured.is_null() {
                debug!(captured = ?self.captured, "pointer capture released");
            }
            self.pressed = NodeHandle::NULL;
            self.captured = NodeHandle::NULL;
        } else if !node.is_null() {
            let captured = if event.captured {
                node
            } else {
                NodeHandle::NULL
            };
            if captured != self.captured {
                debug!(?captured, "pointer capture changed on release");
                self.captured = captured;
            }
        }
        !node.is_null()
    }

    /// Handle a pointer move to `position`, given in window coordinates.
    ///
    /// Returns whether any data accepted the move itself. Enter and leave events don't affect the
    /// result.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn pointer_move_event(&mut self, position: Point, event: &mut PointerMoveEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::pointer_move_event(): event already accepted"
        );
        self.update();
        let point = self.scale_position(position);
        let primary = event.is_primary();
        event.relative_position = match self.global_pointer_position {
            Some(previous) if primary => point - previous,
            _ => Vec2::ZERO,
        };
        if primary {
            self.global_pointer_position = Some(point);
        }

        let movement: Handler<PointerMoveEvent> =
            |layer, data, event| layer.pointer_move_event(data, event);
        let (node, accepted, hovered) = if self.captured.is_null() {
            let node = self.call_at(point, false, event, movement);
            (node, !node.is_null(), node)
        } else {
            let captured = self.captured;
            let inside = self.is_inside(captured, point);
            let accepted = self.call_on_node(captured, point, inside, true, event, movement);
            let hovered = if inside && accepted {
                captured
            } else {
                NodeHandle::NULL
            };
            (captured, accepted, hovered)
        };

        if primary {
            if self.captured.is_null() && !self.pressed.is_null() && self.pressed != node {
                self.pressed = NodeHandle::NULL;
            }
            if hovered != self.hovered {
                let previous = mem::replace(&mut self.hovered, hovered);
                debug!(?hovered, "hovered node changed");
                if self.captured.is_null() {
                    self.leave_and_enter(previous, hovered, point, false, event);
                } else {
                    // Only the captured node is told about hover changes while captured.
                    let captured = self.captured;
                    let leave = if previous == captured {
                        captured
                    } else {
                        NodeHandle::NULL
                    };
                    self.leave_and_enter(leave, hovered, point, true, event);
                }
            }
        }

        if primary || accepted {
            let captured = if event.captured {
                node
            } else {
                NodeHandle::NULL
            };
            if captured != self.captured {
                debug!(?captured, "pointer capture changed on move");
                self.captured = captured;
            }
        }
        accepted
    }

    /// Send a leave event to `leave` and an enter event to `enter`, skipping null nodes.
    ///
    /// Unless `leave_captures`, a capture change requested by the leave handler is discarded.
    fn leave_and_enter(
        &mut self,
        leave: NodeHandle,
        enter: NodeHandle,
        point: Point,
        leave_captures: bool,
        event: &mut PointerMoveEvent,
    ) {
        let accepted = event.accepted;
        let relative_position = event.relative_position;
        event.relative_position = Vec2::ZERO;
        let captured = event.captured;
        if !leave.is_null() {
            let inside = self.is_inside(leave, point);
            let handler: Handler<PointerMoveEvent> =
                |layer, data, event| layer.pointer_leave_event(data, event);
            self.call_on_node(leave, point, inside, captured, event, handler);
            if !leave_captures {
                event.captured = captured;
            }
        }
        if !enter.is_null() {
            let captured = event.captured;
            let handler: Handler<PointerMoveEvent> =
                |layer, data, event| layer.pointer_enter_event(data, event);
            self.call_on_node(enter, point, true, captured, event, handler);
        }
        event.relative_position = relative_position;
        event.accepted = accepted;
    }

    /// Focus `node`, or blur the focused node if `node` is null.
    ///
    /// Nodes that are hidden, have events disabled or aren't [`NodeFlags::FOCUSABLE`] can't be
    /// focused and the call returns `false` without any effect. Otherwise the node gets a focus
    /// event even if it's focused already. Returns whether it accepted.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted, or `node` is neither null nor valid.
    pub fn focus_event(&mut self, node: NodeHandle, event: &mut FocusEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::focus_event(): event already accepted"
        );
        if !node.is_null() {
            self.expect_node(node, "focus_event");
        }
        self.update();

        let previous = self.focused;
        if node.is_null() {
            if !previous.is_null() {
                self.blur(previous, event.time());
                self.focused = NodeHandle::NULL;
                debug!(?previous, "focused node blurred");
            }
            return false;
        }
        if !self.frame.is_reachable_and_enabled(node)
            || !self.nodes[node.idx()].flags.contains(NodeFlags::FOCUSABLE)
        {
            return false;
        }

        event.status = self.node_status(node, false);
        self.call_node_data(node, |layer, data| layer.focus_event(data, event));
        if event.accepted {
            if !previous.is_null() && previous != node {
                self.blur(previous, event.time());
            }
            self.focused = node;
        } else if previous == node {
            self.blur(node, event.time());
            self.focused = NodeHandle::NULL;
        }
        if self.focused != previous {
            debug!(focused = ?self.focused, "focus changed");
        }
        event.accepted
    }

    fn key_event(&mut self, event: &mut KeyEvent, handler: Handler<KeyEvent>) -> bool {
        self.update();
        let pointer = self.global_pointer_position;
        if !self.focused.is_null() {
            let focused = self.focused;
            let point = pointer.unwrap_or(Point::ORIGIN);
            let inside = pointer.is_some_and(|point| self.is_inside(focused, point));
            let status = self.node_status(focused, inside);
            event.prepare(point - self.node_offset_absolute(focused), status, false);
            if pointer.is_none() {
                event.position = None;
            }
            self.call_node_data(focused, |layer, data| handler(layer, data, event));
            return event.accepted;
        }
        match pointer {
            Some(point) => !self.call_at(point, false, event, handler).is_null(),
            None => false,
        }
    }

    /// Handle a key press.
    ///
    /// Goes to the focused node if any, otherwise to the node under the last known pointer
    /// position. Returns whether any data accepted the event.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn key_press_event(&mut self, event: &mut KeyEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::key_press_event(): event already accepted"
        );
        self.key_event(event, |layer, data, event| layer.key_press_event(data, event))
    }

    /// Handle a key release, routed the same way as [`key_press_event`](Self::key_press_event).
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn key_release_event(&mut self, event: &mut KeyEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::key_release_event(): event already accepted"
        );
        self.key_event(event, |layer, data, event| layer.key_release_event(data, event))
    }

    /// Handle text input, delivered only to the focused node.
    ///
    /// # Panics
    ///
    /// If `event` is already accepted.
    pub fn text_input_event(&mut self, event: &mut TextInputEvent) -> bool {
        assert!(
            !event.accepted,
            "UserInterface::text_input_event(): event already accepted"
        );
        self.update();
        let focused = self.focused;
        if focused.is_null() {
            return false;
        }
        self.call_node_data(focused, |layer, data| layer.text_input_event(data, event));
        event.accepted
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::time::Duration;

    use kurbo::{Point, Size, Vec2};

    use crate::event::{
        FocusEvent, Key, KeyEvent, Modifiers, Pointer, PointerEvent, PointerMoveEvent, Pointers,
        TextInputEvent,
    };
    use crate::handle::{LayerHandle, NodeHandle};
    use crate::layer::LayerFeatures;
    use crate::layer::testing::RecordingLayer;
    use crate::node::NodeFlags;
    use crate::ui::UserInterface;

    fn ui() -> UserInterface {
        UserInterface::with_unscaled_size(Size::new(100.0, 100.0))
    }

    fn node(
        ui: &mut UserInterface,
        parent: NodeHandle,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> NodeHandle {
        ui.create_node(parent, Vec2::new(x, y), Size::new(w, h), NodeFlags::empty())
    }

    fn layer(ui: &mut UserInterface) -> LayerHandle {
        let handle = ui.create_layer(LayerHandle::NULL);
        ui.set_layer_instance(Box::new(RecordingLayer::new(handle, LayerFeatures::EVENT)));
        handle
    }

    fn recording(ui: &mut UserInterface, layer: LayerHandle) -> &mut RecordingLayer {
        ui.layer_as_mut::<RecordingLayer>(layer).unwrap()
    }

    /// Attach a new data to `node`, accepting pointer events. Returns the data id.
    fn data(ui: &mut UserInterface, layer: LayerHandle, node: NodeHandle) -> u32 {
        let data = ui.layer_mut(layer).core_mut().create(node).data().index();
        recording(ui, layer).accepts.pointer.push(data);
        data
    }

    fn log(ui: &mut UserInterface, layer: LayerHandle) -> Vec<String> {
        recording(ui, layer).take_log()
    }

    fn press(ui: &mut UserInterface, x: f64, y: f64) -> bool {
        let mut event = PointerEvent::new(
            Duration::ZERO,
            Pointer::MouseLeft,
            true,
            0,
            Modifiers::empty(),
        );
        ui.pointer_press_event(Point::new(x, y), &mut event)
    }

    fn release(ui: &mut UserInterface, x: f64, y: f64) -> bool {
        let mut event = PointerEvent::new(
            Duration::ZERO,
            Pointer::MouseLeft,
            true,
            0,
            Modifiers::empty(),
        );
        ui.pointer_release_event(Point::new(x, y), &mut event)
    }

    fn move_to(ui: &mut UserInterface, x: f64, y: f64) -> bool {
        let mut event = PointerMoveEvent::new(
            Duration::ZERO,
            None,
            Pointers::empty(),
            true,
            0,
            Modifiers::empty(),
        );
        ui.pointer_move_event(Point::new(x, y), &mut event)
    }

    fn key(ui: &mut UserInterface) -> bool {
        let mut event = KeyEvent::new(Duration::ZERO, Key(13), Modifiers::empty());
        ui.key_press_event(&mut event)
    }

    #[test]
    fn press_release_tap() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, n);

        assert!(press(&mut ui, 5.0, 5.0));
        assert_eq!(ui.current_pressed_node(), n);
        assert_eq!(ui.current_captured_node(), n);
        assert_eq!(log(&mut ui, layer), ["press 0 5 5"]);

        assert!(release(&mut ui, 5.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["release 0 5 5", "tap 0 5 5"]);
        assert_eq!(ui.current_pressed_node(), NodeHandle::NULL);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);
        assert_eq!(ui.current_global_pointer_position(), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn press_outside_everything_is_unhandled() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, n);

        assert!(!press(&mut ui, 50.0, 50.0));
        assert_eq!(ui.current_pressed_node(), NodeHandle::NULL);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);
        assert!(log(&mut ui, layer).is_empty());
    }

    #[test]
    fn capture_outside_bounds() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, a);
        data(&mut ui, layer, b);

        press(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);
        assert!(move_to(&mut ui, 25.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["move 0 25 5 hovering=false"]);
        assert_eq!(ui.current_captured_node(), a);
        assert_eq!(ui.current_hovered_node(), NodeHandle::NULL);

        // Coming back makes it hovered.
        move_to(&mut ui, 5.0, 5.0);
        assert_eq!(log(&mut ui, layer), ["move 0 5 5 hovering=true", "enter 0 0 0"]);
        assert_eq!(ui.current_hovered_node(), a);

        // Released outside while captured, still a tap.
        move_to(&mut ui, 25.0, 5.0);
        assert_eq!(log(&mut ui, layer), ["move 0 25 5 hovering=false", "leave 0 0 0"]);
        assert!(release(&mut ui, 25.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["release 0 25 5", "tap 0 25 5"]);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);

        // Without capture the move goes to the node under the pointer.
        move_to(&mut ui, 26.0, 5.0);
        assert_eq!(log(&mut ui, layer), ["move 1 6 5 hovering=true", "enter 1 0 0"]);
        assert_eq!(ui.current_hovered_node(), b);
    }

    #[test]
    fn released_capture_follows_the_pointer() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        let data_a = data(&mut ui, layer, a);
        data(&mut ui, layer, b);
        recording(&mut ui, layer).accepts.no_capture.push(data_a);

        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_pressed_node(), a);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);

        // Moving away forgets the press, releasing on another node isn't a tap.
        move_to(&mut ui, 25.0, 5.0);
        assert_eq!(ui.current_pressed_node(), NodeHandle::NULL);
        log(&mut ui, layer);
        assert!(release(&mut ui, 25.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["release 1 5 5"]);
    }

    #[test]
    fn hover_enter_and_leave() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, a);
        data(&mut ui, layer, b);

        assert!(move_to(&mut ui, 5.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["move 0 5 5 hovering=true", "enter 0 0 0"]);
        assert_eq!(ui.current_hovered_node(), a);

        let mut event = PointerMoveEvent::new(
            Duration::ZERO,
            None,
            Pointers::empty(),
            true,
            0,
            Modifiers::empty(),
        );
        assert!(ui.pointer_move_event(Point::new(25.0, 5.0), &mut event));
        assert_eq!(event.relative_position(), Vec2::new(20.0, 0.0));
        assert_eq!(
            log(&mut ui, layer),
            ["move 1 5 5 hovering=true", "leave 0 0 0", "enter 1 0 0"]
        );
        assert_eq!(ui.current_hovered_node(), b);

        assert!(!move_to(&mut ui, 50.0, 50.0));
        assert_eq!(log(&mut ui, layer), ["leave 1 0 0"]);
        assert_eq!(ui.current_hovered_node(), NodeHandle::NULL);
    }

    #[test]
    fn children_first_then_nodes_behind() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let parent = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 20.0, 20.0);
        let back = node(&mut ui, parent, 0.0, 0.0, 10.0, 10.0);
        let front = node(&mut ui, parent, 5.0, 5.0, 10.0, 10.0);
        let p = data(&mut ui, layer, parent);
        let b = ui.layer_mut(layer).core_mut().create(back).data().index();
        let f = ui.layer_mut(layer).core_mut().create(front).data().index();
        assert_eq!((p, b, f), (0, 1, 2));

        // Neither child accepts, so the press falls through to the parent.
        assert!(press(&mut ui, 7.0, 7.0));
        assert_eq!(log(&mut ui, layer), ["press 2 2 2", "press 1 7 7", "press 0 7 7"]);
        assert_eq!(ui.current_pressed_node(), parent);
        release(&mut ui, 7.0, 7.0);
        log(&mut ui, layer);

        recording(&mut ui, layer).accepts.pointer.push(b);
        assert!(press(&mut ui, 7.0, 7.0));
        assert_eq!(log(&mut ui, layer), ["press 2 2 2", "press 1 7 7"]);
        assert_eq!(ui.current_pressed_node(), back);
    }

    #[test]
    fn all_data_on_a_node_get_the_event() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, n);
        data(&mut ui, layer, n);
        assert!(press(&mut ui, 1.0, 2.0));
        assert_eq!(log(&mut ui, layer), ["press 0 1 2", "press 1 1 2"]);
    }

    #[test]
    fn focus_transition() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let b = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::FOCUSABLE,
        );
        let c = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        let data_b = data(&mut ui, layer, b);
        data(&mut ui, layer, c);
        recording(&mut ui, layer).accepts.focus.push(data_b);

        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_focused_node(), b);
        assert_eq!(log(&mut ui, layer), ["press 0 5 5", "focus 0"]);
        release(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);

        // Pressing the focused node again keeps the focus.
        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_focused_node(), b);
        release(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);

        press(&mut ui, 25.0, 5.0);
        assert_eq!(log(&mut ui, layer), ["press 1 5 5", "blur 0"]);
        assert_eq!(ui.current_focused_node(), NodeHandle::NULL);
    }

    #[test]
    fn secondary_pointers_leave_focus_alone() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let b = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::FOCUSABLE,
        );
        let data_b = data(&mut ui, layer, b);
        recording(&mut ui, layer).accepts.focus.push(data_b);

        let mut event = PointerEvent::new(
            Duration::ZERO,
            Pointer::MouseRight,
            true,
            0,
            Modifiers::empty(),
        );
        assert!(ui.pointer_press_event(Point::new(5.0, 5.0), &mut event));
        assert_eq!(ui.current_focused_node(), NodeHandle::NULL);
        assert_eq!(ui.current_pressed_node(), b);
    }

    #[test]
    fn non_primary_press_goes_to_captured_node() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, a);
        data(&mut ui, layer, b);
        press(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);

        let mut event =
            PointerEvent::new(Duration::ZERO, Pointer::Finger, false, 1, Modifiers::empty());
        assert!(ui.pointer_press_event(Point::new(25.0, 5.0), &mut event));
        assert_eq!(log(&mut ui, layer), ["press 0 25 5"]);
        assert!(event.is_captured());
        assert_eq!(ui.current_pressed_node(), a);
        // Only primary events update the pointer position.
        assert_eq!(ui.current_global_pointer_position(), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn focus_event_api() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let flags = NodeFlags::FOCUSABLE;
        let a = ui.create_node(NodeHandle::NULL, Vec2::ZERO, Size::new(10.0, 10.0), flags);
        let b_offset = Vec2::new(20.0, 0.0);
        let b = ui.create_node(NodeHandle::NULL, b_offset, Size::new(10.0, 10.0), flags);
        let plain = node(&mut ui, NodeHandle::NULL, 40.0, 0.0, 10.0, 10.0);
        let data_a = data(&mut ui, layer, a);
        let data_b = data(&mut ui, layer, b);
        recording(&mut ui, layer).accepts.focus.extend([data_a, data_b]);

        let focus = |ui: &mut UserInterface, node| {
            let mut event = FocusEvent::new(Duration::ZERO);
            ui.focus_event(node, &mut event)
        };

        assert!(focus(&mut ui, a));
        assert_eq!(ui.current_focused_node(), a);
        assert!(focus(&mut ui, b));
        assert_eq!(log(&mut ui, layer), ["focus 0", "focus 1", "blur 0"]);

        // Not focusable.
        assert!(!focus(&mut ui, plain));
        assert_eq!(ui.current_focused_node(), b);

        // Rejecting the focus while focused blurs.
        recording(&mut ui, layer).accepts.focus.clear();
        assert!(!focus(&mut ui, b));
        assert_eq!(log(&mut ui, layer), ["focus 1", "blur 1"]);
        assert_eq!(ui.current_focused_node(), NodeHandle::NULL);

        // Clipped away is fine, hidden isn't.
        recording(&mut ui, layer).accepts.focus.push(data_a);
        ui.set_node_offset(a, Vec2::new(200.0, 0.0));
        assert!(focus(&mut ui, a));
        ui.add_node_flags(b, NodeFlags::HIDDEN);
        assert!(!focus(&mut ui, b));
        assert_eq!(ui.current_focused_node(), a);

        assert!(!focus(&mut ui, NodeHandle::NULL));
        assert_eq!(ui.current_focused_node(), NodeHandle::NULL);
        assert_eq!(log(&mut ui, layer), ["focus 0", "blur 0"]);
    }

    #[test]
    fn key_routing() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::FOCUSABLE,
        );
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        let data_a = data(&mut ui, layer, a);
        let data_b = data(&mut ui, layer, b);
        recording(&mut ui, layer).accepts.key.extend([data_a, data_b]);
        recording(&mut ui, layer).accepts.focus.push(data_a);

        // Neither focus nor a pointer position.
        assert!(!key(&mut ui));

        move_to(&mut ui, 25.0, 5.0);
        log(&mut ui, layer);
        assert!(key(&mut ui));
        assert_eq!(log(&mut ui, layer), ["key press 1 Some((5.0, 5.0))"]);

        let mut event = FocusEvent::new(Duration::ZERO);
        ui.focus_event(a, &mut event);
        log(&mut ui, layer);
        assert!(key(&mut ui));
        assert_eq!(log(&mut ui, layer), ["key press 0 Some((25.0, 5.0))"]);

        let mut event = KeyEvent::new(Duration::ZERO, Key(13), Modifiers::CTRL);
        assert!(ui.key_release_event(&mut event));
        assert!(!event.is_hovering() && event.is_node_focused());
        assert_eq!(log(&mut ui, layer), ["key release 0"]);
    }

    #[test]
    fn text_input_only_goes_to_focus() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::FOCUSABLE,
        );
        let data_a = data(&mut ui, layer, a);
        recording(&mut ui, layer).accepts.key.push(data_a);
        recording(&mut ui, layer).accepts.focus.push(data_a);

        move_to(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);
        let mut event = TextInputEvent::new(Duration::ZERO, "hello");
        assert!(!ui.text_input_event(&mut event));
        assert!(log(&mut ui, layer).is_empty());

        ui.focus_event(a, &mut FocusEvent::new(Duration::ZERO));
        log(&mut ui, layer);
        let mut event = TextInputEvent::new(Duration::ZERO, "hello");
        assert!(ui.text_input_event(&mut event));
        assert_eq!(log(&mut ui, layer), ["text 0 hello"]);
    }

    #[test]
    fn hiding_pressed_node_loses_visibility() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, n);
        move_to(&mut ui, 5.0, 5.0);
        press(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);

        ui.add_node_flags(n, NodeFlags::HIDDEN);
        ui.update();
        assert_eq!(log(&mut ui, layer), ["lost 0 pressed=true hovered=true focused=false"]);
        assert_eq!(ui.current_pressed_node(), NodeHandle::NULL);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);
        assert_eq!(ui.current_hovered_node(), NodeHandle::NULL);
    }

    #[test]
    fn losing_focusable_resets_focus() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::FOCUSABLE,
        );
        let data_a = data(&mut ui, layer, a);
        recording(&mut ui, layer).accepts.focus.push(data_a);
        ui.focus_event(a, &mut FocusEvent::new(Duration::ZERO));
        log(&mut ui, layer);

        ui.clear_node_flags(a, NodeFlags::FOCUSABLE);
        ui.update();
        assert_eq!(log(&mut ui, layer), ["lost 0 pressed=false hovered=false focused=true"]);
        assert_eq!(ui.current_focused_node(), NodeHandle::NULL);
    }

    #[test]
    fn clipped_and_disabled_nodes_are_not_hit() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let p = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::CLIP,
        );
        let q = node(&mut ui, p, 20.0, 20.0, 5.0, 5.0);
        let r = node(&mut ui, NodeHandle::NULL, 50.0, 50.0, 10.0, 10.0);
        data(&mut ui, layer, q);
        data(&mut ui, layer, r);

        assert!(!press(&mut ui, 22.0, 22.0));
        ui.add_node_flags(r, NodeFlags::DISABLED);
        assert!(!press(&mut ui, 55.0, 55.0));
        assert!(log(&mut ui, layer).is_empty());
    }

    #[test]
    fn nested_top_level_escapes_clip_and_events() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let root = ui.create_node(
            NodeHandle::NULL,
            Vec2::ZERO,
            Size::new(10.0, 10.0),
            NodeFlags::CLIP | NodeFlags::NO_EVENTS,
        );
        let popup = node(&mut ui, root, 20.0, 20.0, 5.0, 5.0);
        data(&mut ui, layer, popup);
        assert!(!press(&mut ui, 22.0, 22.0));

        ui.set_node_order(popup, NodeHandle::NULL);
        assert!(press(&mut ui, 22.0, 22.0));
        assert_eq!(ui.current_pressed_node(), popup);
        assert_eq!(log(&mut ui, layer), ["press 0 2 2"]);
    }

    #[test]
    fn later_roots_are_in_front() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let back = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let front = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, back);
        data(&mut ui, layer, front);
        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_pressed_node(), front);
        release(&mut ui, 5.0, 5.0);

        ui.set_node_order(front, back);
        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_pressed_node(), back);
    }

    #[test]
    fn positions_are_scaled_from_window() {
        let mut ui = UserInterface::new(
            Size::new(100.0, 100.0),
            Size::new(200.0, 50.0),
            Size::new(400.0, 100.0),
        );
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 10.0, 10.0, 10.0, 10.0);
        data(&mut ui, layer, n);
        assert!(press(&mut ui, 30.0, 6.0));
        assert_eq!(log(&mut ui, layer), ["press 0 5 2"]);
    }

    #[test]
    fn captured_move_leaves_other_hovered_node_alone() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        data(&mut ui, layer, a);
        data(&mut ui, layer, b);

        move_to(&mut ui, 5.0, 5.0);
        press(&mut ui, 25.0, 5.0);
        assert_eq!(ui.current_hovered_node(), a);
        assert_eq!(ui.current_captured_node(), b);
        log(&mut ui, layer);

        // The hovered node isn't captured, so it doesn't get a leave event.
        assert!(move_to(&mut ui, 26.0, 5.0));
        assert_eq!(log(&mut ui, layer), ["move 1 6 5 hovering=true", "enter 1 0 0"]);
        assert_eq!(ui.current_hovered_node(), b);

        move_to(&mut ui, 5.0, 5.0);
        assert_eq!(log(&mut ui, layer), ["move 1 -15 5 hovering=false", "leave 1 0 0"]);
        assert_eq!(ui.current_hovered_node(), NodeHandle::NULL);
        release(&mut ui, 5.0, 5.0);
        move_to(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_hovered_node(), a);
        press(&mut ui, 25.0, 5.0);
        log(&mut ui, layer);

        // Moving away from both only updates the hovered node.
        move_to(&mut ui, 50.0, 50.0);
        assert_eq!(log(&mut ui, layer), ["move 1 30 50 hovering=false"]);
        assert_eq!(ui.current_hovered_node(), NodeHandle::NULL);
        assert_eq!(ui.current_captured_node(), b);
    }

    #[test]
    fn secondary_release_changes_capture() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let n = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let data_n = data(&mut ui, layer, n);
        press(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_captured_node(), n);
        log(&mut ui, layer);

        let secondary_release = |ui: &mut UserInterface| {
            let mut event =
                PointerEvent::new(Duration::ZERO, Pointer::Finger, false, 1, Modifiers::empty());
            ui.pointer_release_event(Point::new(5.0, 5.0), &mut event)
        };

        recording(&mut ui, layer).accepts.no_capture.push(data_n);
        assert!(secondary_release(&mut ui));
        assert_eq!(log(&mut ui, layer), ["release 0 5 5"]);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);
        assert_eq!(ui.current_pressed_node(), n);

        recording(&mut ui, layer).accepts.no_capture.clear();
        recording(&mut ui, layer).accepts.capture.push(data_n);
        assert!(secondary_release(&mut ui));
        assert_eq!(ui.current_captured_node(), n);
    }

    #[test]
    fn capture_from_leave_is_ignored_but_enter_captures() {
        let mut ui = ui();
        let layer = layer(&mut ui);
        let a = node(&mut ui, NodeHandle::NULL, 0.0, 0.0, 10.0, 10.0);
        let b = node(&mut ui, NodeHandle::NULL, 20.0, 0.0, 10.0, 10.0);
        let data_a = data(&mut ui, layer, a);
        data(&mut ui, layer, b);
        move_to(&mut ui, 5.0, 5.0);
        log(&mut ui, layer);

        recording(&mut ui, layer).accepts.capture.push(data_a);
        move_to(&mut ui, 25.0, 5.0);
        assert_eq!(
            log(&mut ui, layer),
            ["move 1 5 5 hovering=true", "leave 0 0 0", "enter 1 0 0"]
        );
        assert_eq!(ui.current_hovered_node(), b);
        assert_eq!(ui.current_captured_node(), NodeHandle::NULL);

        move_to(&mut ui, 50.0, 50.0);
        move_to(&mut ui, 5.0, 5.0);
        assert_eq!(ui.current_hovered_node(), a);
        assert_eq!(ui.current_captured_node(), a);
    }

    #[test]
    #[should_panic(expected = "UserInterface::pointer_press_event(): event already accepted")]
    fn accepted_event_panics() {
        let mut ui = ui();
        let mut event = PointerEvent::new(
            Duration::ZERO,
            Pointer::MouseLeft,
            true,
            0,
            Modifiers::empty(),
        );
        event.set_accepted(true);
        ui.pointer_press_event(Point::ZERO, &mut event);
    }
}
