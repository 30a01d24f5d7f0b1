// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_ui --heading-base-level=0

//! Understory UI: a retained-mode user interface core.
//!
//! The core knows nothing about what's drawn. It keeps a hierarchy of rectangular nodes, decides
//! which of them are visible and in what order, and routes pointer, key, focus and text input
//! events to them. Everything else is delegated to three kinds of collaborators:
//!
//! - [`Layer`]s own data attached to nodes, draw them and handle events on them.
//! - [`Layouter`]s own layouts assigned to nodes and calculate node offsets and sizes.
//! - [`Animator`]s own animations attached to nodes or data and advance them over time.
//!
//! ## Handles
//!
//! Nodes, layers, layouters and animators, as well as the data, layouts and animations they own,
//! are referenced by small generational handles such as [`NodeHandle`] or [`DataHandle`]. A
//! removed item's handle stays invalid even when its slot gets reused.
//!
//! ## Dirty states
//!
//! Mutations only record what became stale in [`UserInterfaceStates`].
//! [`UserInterface::clean`] removes whatever was attached to removed nodes,
//! [`UserInterface::update`] recalculates visibility, layouts, geometry and draw order, and both
//! are no-ops when nothing changed. Drawing and every event entry point update implicitly.
//!
//! ## Top-level nodes
//!
//! Root nodes are ordered among each other, later ones drawn on top and getting events first.
//! Any other node can be promoted into its own ordered hierarchy with
//! [`UserInterface::set_node_order`], which lets it escape the clipping of its ancestors, as
//! popups and tooltips need to.
//!
//! ## Example
//!
//! ```
//! use core::time::Duration;
//!
//! use kurbo::{Point, Size, Vec2};
//! use understory_ui::{
//!     Layer, LayerCore, LayerFeatures, LayerHandle, Modifiers, NodeFlags, NodeHandle, Pointer,
//!     PointerEvent, UserInterface,
//! };
//!
//! struct Buttons {
//!     core: LayerCore,
//!     pressed: Vec<u32>,
//! }
//!
//! impl Layer for Buttons {
//!     fn core(&self) -> &LayerCore {
//!         &self.core
//!     }
//!
//!     fn core_mut(&mut self) -> &mut LayerCore {
//!         &mut self.core
//!     }
//!
//!     fn features(&self) -> LayerFeatures {
//!         LayerFeatures::EVENT
//!     }
//!
//!     fn pointer_press_event(&mut self, data: u32, event: &mut PointerEvent) {
//!         self.pressed.push(data);
//!         event.set_accepted(true);
//!     }
//! }
//!
//! let mut ui = UserInterface::with_unscaled_size(Size::new(200.0, 100.0));
//! let layer = ui.create_layer(LayerHandle::NULL);
//! ui.set_layer_instance(Box::new(Buttons {
//!     core: LayerCore::new(layer),
//!     pressed: Vec::new(),
//! }));
//!
//! let button = ui.create_node(
//!     NodeHandle::NULL,
//!     Vec2::new(10.0, 10.0),
//!     Size::new(80.0, 30.0),
//!     NodeFlags::empty(),
//! );
//! let data = ui.layer_mut(layer).core_mut().create(button);
//!
//! let mut event = PointerEvent::new(Duration::ZERO, Pointer::MouseLeft, true, 0, Modifiers::empty());
//! assert!(ui.pointer_press_event(Point::new(20.0, 20.0), &mut event));
//! assert_eq!(ui.current_pressed_node(), button);
//! assert_eq!(ui.layer_as::<Buttons>(layer).unwrap().pressed, [data.data().index()]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod animator;
mod error;
mod event;
mod frame;
mod handle;
mod layer;
mod layouter;
mod node;
mod order;
mod router;
mod state;
mod ui;

pub use animator::{
    AnimationFlags, AnimationState, AnimationStep, AnimationTarget, Animator, AnimatorCore,
    AnimatorFeatures, AnimatorKind, AnimatorStates, NodeChange, NodeChanges,
};
pub use error::InstanceError;
pub use event::{
    FocusEvent, Key, KeyEvent, Modifiers, Pointer, PointerEvent, PointerMoveEvent, Pointers,
    TextInputEvent, VisibilityLostEvent,
};
pub use handle::{
    AnimationHandle, AnimatorDataHandle, AnimatorHandle, DataHandle, LayerDataHandle,
    LayerHandle, LayoutHandle, LayouterDataHandle, LayouterHandle, NodeHandle,
};
pub use layer::{ClipRun, Layer, LayerCore, LayerDraw, LayerFeatures, LayerStates, LayerUpdate};
pub use layouter::{LayoutUpdate, Layouter, LayouterCore, LayouterStates};
pub use node::NodeFlags;
pub use state::UserInterfaceStates;
pub use ui::UserInterface;
