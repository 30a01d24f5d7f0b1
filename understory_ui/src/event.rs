// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event payloads passed to layers.
//!
//! The user interface fills in the node-relative position and the node status fields before every
//! call into a [`Layer`](crate::Layer). Layers report back by calling `set_accepted()` and, for
//! pointer events, `set_captured()`.

use alloc::string::String;
use core::time::Duration;

use kurbo::{Point, Vec2};

/// A pointer kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pointer {
    /// Left mouse button.
    MouseLeft,
    /// Middle mouse button.
    MouseMiddle,
    /// Right mouse button.
    MouseRight,
    /// A finger on a touch screen.
    Finger,
    /// A pen tip.
    Pen,
    /// A pen eraser.
    Eraser,
}

impl Pointer {
    /// Whether a primary press with this pointer moves focus.
    pub fn affects_focus(self) -> bool {
        matches!(self, Self::MouseLeft | Self::Finger | Self::Pen)
    }
}

bitflags::bitflags! {
    /// A set of pointers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Pointers: u8 {
        /// See [`Pointer::MouseLeft`].
        const MOUSE_LEFT = 1 << 0;
        /// See [`Pointer::MouseMiddle`].
        const MOUSE_MIDDLE = 1 << 1;
        /// See [`Pointer::MouseRight`].
        const MOUSE_RIGHT = 1 << 2;
        /// See [`Pointer::Finger`].
        const FINGER = 1 << 3;
        /// See [`Pointer::Pen`].
        const PEN = 1 << 4;
        /// See [`Pointer::Eraser`].
        const ERASER = 1 << 5;
    }
}

impl From<Pointer> for Pointers {
    fn from(pointer: Pointer) -> Self {
        match pointer {
            Pointer::MouseLeft => Self::MOUSE_LEFT,
            Pointer::MouseMiddle => Self::MOUSE_MIDDLE,
            Pointer::MouseRight => Self::MOUSE_RIGHT,
            Pointer::Finger => Self::FINGER,
            Pointer::Pen => Self::PEN,
            Pointer::Eraser => Self::ERASER,
        }
    }
}

bitflags::bitflags! {
    /// Keyboard modifiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 1 << 0;
        /// Ctrl.
        const CTRL = 1 << 1;
        /// Alt.
        const ALT = 1 << 2;
        /// Super, Windows or Command key.
        const SUPER = 1 << 3;
    }
}

/// An opaque key code.
///
/// Translating platform key codes is up to the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(pub u32);

/// Node status shared by all node-directed events.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeStatus {
    pub(crate) hovering: bool,
    pub(crate) pressed: bool,
    pub(crate) hovered: bool,
    pub(crate) focused: bool,
}

/// Pointer press, release and tap or click event.
#[derive(Clone, Debug)]
pub struct PointerEvent {
    time: Duration,
    pointer: Pointer,
    primary: bool,
    id: u64,
    modifiers: Modifiers,
    pub(crate) position: Point,
    pub(crate) captured: bool,
    pub(crate) status: NodeStatus,
    pub(crate) accepted: bool,
}

impl PointerEvent {
    /// Create a pointer event.
    ///
    /// `primary` is `true` for mouse pointers and for the first finger or pen touching the
    /// screen. `id` distinguishes simultaneous touches.
    pub fn new(
        time: Duration,
        pointer: Pointer,
        primary: bool,
        id: u64,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            time,
            pointer,
            primary,
            id,
            modifiers,
            position: Point::ZERO,
            captured: false,
            status: NodeStatus::default(),
            accepted: false,
        }
    }

    /// Time at which the event happened.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Pointer that got pressed or released.
    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    /// Whether this is a primary event.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Pointer identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Keyboard modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Position relative to the node the event is called on.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Whether the node is captured.
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Set or release the pointer capture on the node.
    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
    }

    /// Whether the pointer is inside the node area.
    pub fn is_hovering(&self) -> bool {
        self.status.hovering
    }

    /// Whether the node is the currently pressed node.
    pub fn is_node_pressed(&self) -> bool {
        self.status.pressed
    }

    /// Whether the node is the currently hovered node.
    pub fn is_node_hovered(&self) -> bool {
        self.status.hovered
    }

    /// Whether the node is the currently focused node.
    pub fn is_node_focused(&self) -> bool {
        self.status.focused
    }

    /// Whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the event, stopping propagation to other nodes.
    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

/// Pointer move event, also used for enter and leave.
#[derive(Clone, Debug)]
pub struct PointerMoveEvent {
    time: Duration,
    pointer: Option<Pointer>,
    pointers: Pointers,
    primary: bool,
    id: u64,
    modifiers: Modifiers,
    pub(crate) position: Point,
    pub(crate) relative_position: Vec2,
    pub(crate) captured: bool,
    pub(crate) status: NodeStatus,
    pub(crate) accepted: bool,
}

impl PointerMoveEvent {
    /// Create a pointer move event.
    ///
    /// `pointer` is set if the move also changed the set of pressed pointers, `pointers` is the
    /// set of pointers pressed during the move.
    pub fn new(
        time: Duration,
        pointer: Option<Pointer>,
        pointers: Pointers,
        primary: bool,
        id: u64,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            time,
            pointer,
            pointers,
            primary,
            id,
            modifiers,
            position: Point::ZERO,
            relative_position: Vec2::ZERO,
            captured: false,
            status: NodeStatus::default(),
            accepted: false,
        }
    }

    /// Time at which the event happened.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Pointer whose state changed with the move, if any.
    pub fn pointer(&self) -> Option<Pointer> {
        self.pointer
    }

    /// Pointers pressed during the move.
    pub fn pointers(&self) -> Pointers {
        self.pointers
    }

    /// Whether this is a primary event.
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Pointer identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Keyboard modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Position relative to the node the event is called on.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Movement since the previous primary move. Zero for enter and leave events.
    pub fn relative_position(&self) -> Vec2 {
        self.relative_position
    }

    /// Whether the node is captured.
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Set or release the pointer capture on the node.
    pub fn set_captured(&mut self, captured: bool) {
        self.captured = captured;
    }

    /// Whether the pointer is inside the node area.
    pub fn is_hovering(&self) -> bool {
        self.status.hovering
    }

    /// Whether the node is the currently pressed node.
    pub fn is_node_pressed(&self) -> bool {
        self.status.pressed
    }

    /// Whether the node is the currently hovered node.
    pub fn is_node_hovered(&self) -> bool {
        self.status.hovered
    }

    /// Whether the node is the currently focused node.
    pub fn is_node_focused(&self) -> bool {
        self.status.focused
    }

    /// Whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the event.
    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

/// Focus and blur event.
#[derive(Clone, Debug)]
pub struct FocusEvent {
    time: Duration,
    pub(crate) status: NodeStatus,
    pub(crate) accepted: bool,
}

impl FocusEvent {
    /// Create a focus event.
    pub fn new(time: Duration) -> Self {
        Self {
            time,
            status: NodeStatus::default(),
            accepted: false,
        }
    }

    /// Time at which the event happened.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Whether the node is the currently pressed node.
    pub fn is_node_pressed(&self) -> bool {
        self.status.pressed
    }

    /// Whether the node is the currently hovered node.
    pub fn is_node_hovered(&self) -> bool {
        self.status.hovered
    }

    /// Whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the focus. Ignored for blur events.
    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

/// Key press and release event.
#[derive(Clone, Debug)]
pub struct KeyEvent {
    time: Duration,
    key: Key,
    modifiers: Modifiers,
    pub(crate) position: Option<Point>,
    pub(crate) status: NodeStatus,
    pub(crate) accepted: bool,
}

impl KeyEvent {
    /// Create a key event.
    pub fn new(time: Duration, key: Key, modifiers: Modifiers) -> Self {
        Self {
            time,
            key,
            modifiers,
            position: None,
            status: NodeStatus::default(),
            accepted: false,
        }
    }

    /// Time at which the event happened.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Key.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Keyboard modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Pointer position relative to the node, if the pointer position is known.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// Whether the pointer is inside the node area.
    pub fn is_hovering(&self) -> bool {
        self.status.hovering
    }

    /// Whether the node is the currently focused node.
    pub fn is_node_focused(&self) -> bool {
        self.status.focused
    }

    /// Whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the event.
    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

/// Text input event, delivered to the focused node only.
#[derive(Clone, Debug)]
pub struct TextInputEvent {
    time: Duration,
    text: String,
    pub(crate) accepted: bool,
}

impl TextInputEvent {
    /// Create a text input event.
    pub fn new(time: Duration, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
            accepted: false,
        }
    }

    /// Time at which the event happened.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Input text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Accept the event.
    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

/// Sent to a node that was pressed, hovered, captured or focused and became hidden, disabled,
/// lost its event handling or stopped being focusable.
#[derive(Clone, Debug, Default)]
pub struct VisibilityLostEvent {
    pub(crate) status: NodeStatus,
}

impl VisibilityLostEvent {
    /// Whether the node was the pressed node. It isn't anymore.
    pub fn was_node_pressed(&self) -> bool {
        self.status.pressed
    }

    /// Whether the node was the hovered node. It isn't anymore.
    pub fn was_node_hovered(&self) -> bool {
        self.status.hovered
    }

    /// Whether the node was the focused node. It isn't anymore.
    pub fn was_node_focused(&self) -> bool {
        self.status.focused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_pointers() {
        assert!(Pointer::MouseLeft.affects_focus());
        assert!(Pointer::Pen.affects_focus());
        assert!(!Pointer::MouseRight.affects_focus());
        assert!(!Pointer::Eraser.affects_focus());
    }

    #[test]
    fn new_events_are_not_accepted() {
        let t = Duration::from_millis(5);
        let mut e = PointerEvent::new(t, Pointer::Finger, true, 7, Modifiers::SHIFT);
        assert!(!e.is_accepted());
        assert!(!e.is_captured());
        e.set_accepted(true);
        assert!(e.is_accepted());
        assert_eq!(e.id(), 7);
        assert_eq!(e.time(), t);

        let pen = Pointers::from(Pointer::Pen);
        let m = PointerMoveEvent::new(t, None, pen, false, 1, Modifiers::empty());
        assert_eq!(m.pointers(), Pointers::PEN);
        assert_eq!(m.relative_position(), Vec2::ZERO);

        let text = TextInputEvent::new(t, "hi");
        assert_eq!(text.text(), "hi");
    }
}
