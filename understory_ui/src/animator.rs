// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Animators: time-driven changes to nodes, data and arbitrary values.
//!
//! An [`AnimatorCore`] tracks the timeline of each animation: when it starts, how long one
//! iteration lasts, how many times it repeats and whether it's paused or stopped. On
//! [`UserInterface::advance_animations`](crate::UserInterface::advance_animations) the core turns
//! that into a list of active animations with an interpolation factor each, and the
//! [`Animator::advance`] implementation applies them. Interpolation itself is up to the
//! implementation.
//!
//! What an animator may touch depends on its [`AnimatorKind`]:
//!
//! - [`AnimatorKind::Generic`] animates values the user interface doesn't know about.
//! - [`AnimatorKind::Node`] requests node changes through [`NodeChanges`].
//! - [`AnimatorKind::Data`] and [`AnimatorKind::Style`] get mutable access to one layer.

use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use core::time::Duration;

use kurbo::{Size, Vec2};
use understory_handle::Registry;

use crate::handle::{
    AnimationHandle, AnimatorDataHandle, AnimatorHandle, DataHandle, LayerHandle, NodeHandle,
};
use crate::layer::Layer;
use crate::node::NodeFlags;

bitflags::bitflags! {
    /// What animations of an animator can be attached to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AnimatorFeatures: u8 {
        /// Animations can be attached to nodes and get removed with them.
        const NODE_ATTACHMENT = 1 << 0;
        /// Animations can be attached to data and get removed with them.
        const DATA_ATTACHMENT = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Animator state stored by [`AnimatorCore`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AnimatorStates: u8 {
        /// Some animations are scheduled, playing or paused.
        const NEEDS_ADVANCE = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Per-animation behavior.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AnimationFlags: u8 {
        /// Keep the animation once stopped instead of removing it.
        const KEEP_ONCE_FINISHED = 1 << 0;
    }
}

/// Where an animation is on its timeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnimationState {
    /// Start time is in the future.
    Scheduled,
    /// Running.
    Playing,
    /// Paused, keeping the factor it had when paused.
    Paused,
    /// Stopped or finished all iterations.
    Stopped,
}

/// What an animator is allowed to modify.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnimatorKind {
    /// Values not managed by the user interface.
    Generic,
    /// Node offsets, sizes, opacities and flags.
    Node,
    /// Data of the given layer.
    Data(LayerHandle),
    /// Styles of the given layer.
    Style(LayerHandle),
}

impl AnimatorKind {
    /// The layer a data or style animator is associated with.
    pub fn layer(self) -> Option<LayerHandle> {
        match self {
            Self::Data(layer) | Self::Style(layer) => Some(layer),
            Self::Generic | Self::Node => None,
        }
    }
}

/// A node change requested by a node animator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NodeChange {
    /// See [`UserInterface::set_node_offset`](crate::UserInterface::set_node_offset).
    Offset(Vec2),
    /// See [`UserInterface::set_node_size`](crate::UserInterface::set_node_size).
    Size(Size),
    /// See [`UserInterface::set_node_opacity`](crate::UserInterface::set_node_opacity).
    Opacity(f32),
    /// See [`UserInterface::add_node_flags`](crate::UserInterface::add_node_flags).
    AddFlags(NodeFlags),
    /// See [`UserInterface::clear_node_flags`](crate::UserInterface::clear_node_flags).
    ClearFlags(NodeFlags),
    /// See [`UserInterface::remove_node`](crate::UserInterface::remove_node).
    Remove,
}

/// Node changes collected from node animators, applied in order after advancing.
#[derive(Clone, Debug, Default)]
pub struct NodeChanges {
    changes: Vec<(NodeHandle, NodeChange)>,
}

impl NodeChanges {
    /// Request a change.
    pub fn push(&mut self, node: NodeHandle, change: NodeChange) {
        self.changes.push((node, change));
    }

    /// Request a new node offset.
    pub fn set_offset(&mut self, node: NodeHandle, offset: Vec2) {
        self.push(node, NodeChange::Offset(offset));
    }

    /// Request a new node size.
    pub fn set_size(&mut self, node: NodeHandle, size: Size) {
        self.push(node, NodeChange::Size(size));
    }

    /// Request a new node opacity.
    pub fn set_opacity(&mut self, node: NodeHandle, opacity: f32) {
        self.push(node, NodeChange::Opacity(opacity));
    }

    /// Request node removal.
    pub fn remove(&mut self, node: NodeHandle) {
        self.push(node, NodeChange::Remove);
    }

    /// Requested changes.
    pub fn as_slice(&self) -> &[(NodeHandle, NodeChange)] {
        &self.changes
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (NodeHandle, NodeChange)> + '_ {
        self.changes.drain(..)
    }
}

/// What [`Animator::advance`] gets to modify.
pub enum AnimationTarget<'a> {
    /// Nothing, for [`AnimatorKind::Generic`].
    None,
    /// Node changes, for [`AnimatorKind::Node`].
    Nodes(&'a mut NodeChanges),
    /// The associated layer, for [`AnimatorKind::Data`] and [`AnimatorKind::Style`].
    Layer(&'a mut dyn Layer),
}

impl fmt::Debug for AnimationTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Nodes(changes) => f.debug_tuple("Nodes").field(changes).finish(),
            Self::Layer(layer) => f.debug_tuple("Layer").field(&layer.core().handle()).finish(),
        }
    }
}

/// Result of advancing an animator core to a new time.
#[derive(Clone, Debug, Default)]
pub struct AnimationStep {
    /// Time advanced to.
    pub time: Duration,
    /// Ids of animations to apply, in id order.
    pub active: Vec<u32>,
    /// Interpolation factors in `[0, 1]`, indexed by animation id. Meaningful only for active ids.
    pub factors: Vec<f32>,
    /// Ids of animations that stopped and get removed after the advance.
    pub removed: Vec<u32>,
}

#[derive(Copy, Clone, Debug)]
struct Animation {
    start: Duration,
    duration: Duration,
    repeat_count: u32,
    flags: AnimationFlags,
    paused: Option<Duration>,
    stopped: Option<Duration>,
    node: NodeHandle,
    data: DataHandle,
    // Changed since the last advance.
    dirty: bool,
}

impl Animation {
    fn finished_at(&self, time: Duration) -> bool {
        self.repeat_count != 0
            && time >= self.start + self.duration.saturating_mul(self.repeat_count)
    }

    fn state_at(&self, time: Duration) -> AnimationState {
        if self.stopped.is_some_and(|stopped| stopped <= time) {
            return AnimationState::Stopped;
        }
        if let Some(paused) = self.paused.filter(|&paused| paused <= time) {
            return if self.finished_at(paused) {
                AnimationState::Stopped
            } else {
                AnimationState::Paused
            };
        }
        if time < self.start {
            AnimationState::Scheduled
        } else if self.finished_at(time) {
            AnimationState::Stopped
        } else {
            AnimationState::Playing
        }
    }

    fn factor_at(&self, time: Duration) -> f32 {
        match self.state_at(time) {
            AnimationState::Scheduled => 0.0,
            AnimationState::Stopped => 1.0,
            AnimationState::Playing => self.progress(time),
            AnimationState::Paused => self.progress(self.paused.unwrap_or(time)),
        }
    }

    fn progress(&self, time: Duration) -> f32 {
        if self.duration.is_zero() || self.finished_at(time) {
            return 1.0;
        }
        let duration = self.duration.as_nanos();
        let elapsed = time.saturating_sub(self.start).as_nanos() % duration;
        #[allow(
            clippy::cast_possible_truncation,
            reason = "The ratio is in [0, 1)."
        )]
        let factor = (elapsed as f64 / duration as f64) as f32;
        factor
    }
}

/// Animation bookkeeping shared by all animators.
#[derive(Clone, Debug)]
pub struct AnimatorCore {
    handle: AnimatorHandle,
    features: AnimatorFeatures,
    animations: Registry<20, 12>,
    entries: Vec<Animation>,
    state: AnimatorStates,
    time: Duration,
}

impl AnimatorCore {
    /// Create a core for the animator created as `handle`.
    pub fn new(handle: AnimatorHandle, features: AnimatorFeatures) -> Self {
        Self {
            handle,
            features,
            animations: Registry::new(),
            entries: Vec::new(),
            state: AnimatorStates::empty(),
            time: Duration::ZERO,
        }
    }

    /// Handle of the owning animator.
    pub fn handle(&self) -> AnimatorHandle {
        self.handle
    }

    /// Supported attachments.
    pub fn features(&self) -> AnimatorFeatures {
        self.features
    }

    /// Time of the last advance.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Create an animation.
    ///
    /// A `repeat_count` of `0` repeats indefinitely.
    pub fn create(
        &mut self,
        start: Duration,
        duration: Duration,
        repeat_count: u32,
        flags: AnimationFlags,
    ) -> AnimationHandle {
        let local = AnimatorDataHandle::from_raw(self.animations.allocate());
        let animation = Animation {
            start,
            duration,
            repeat_count,
            flags,
            paused: None,
            stopped: None,
            node: NodeHandle::NULL,
            data: DataHandle::NULL,
            dirty: true,
        };
        if self.entries.len() <= local.idx() {
            self.entries.resize(local.idx() + 1, animation);
        }
        self.entries[local.idx()] = animation;
        self.state |= AnimatorStates::NEEDS_ADVANCE;
        AnimationHandle::new(self.handle, local)
    }

    /// Remove an animation.
    ///
    /// # Panics
    ///
    /// If `animation` isn't valid.
    pub fn remove(&mut self, animation: AnimatorDataHandle) {
        self.expect_valid(animation, "remove");
        self.animations.free(animation.to_raw());
    }

    /// Attach an animation to a node, or detach it if `node` is null.
    ///
    /// # Panics
    ///
    /// If `animation` isn't valid or the animator doesn't support
    /// [`AnimatorFeatures::NODE_ATTACHMENT`].
    pub fn attach_node(&mut self, animation: AnimatorDataHandle, node: NodeHandle) {
        self.expect_valid(animation, "attach_node");
        assert!(
            self.features.contains(AnimatorFeatures::NODE_ATTACHMENT),
            "AnimatorCore::attach_node(): node attachment not supported"
        );
        self.entries[animation.idx()].node = node;
    }

    /// Attach an animation to data, or detach it if `data` is null.
    ///
    /// # Panics
    ///
    /// If `animation` isn't valid or the animator doesn't support
    /// [`AnimatorFeatures::DATA_ATTACHMENT`].
    pub fn attach_data(&mut self, animation: AnimatorDataHandle, data: DataHandle) {
        self.expect_valid(animation, "attach_data");
        assert!(
            self.features.contains(AnimatorFeatures::DATA_ATTACHMENT),
            "AnimatorCore::attach_data(): data attachment not supported"
        );
        self.entries[animation.idx()].data = data;
    }

    /// Node the animation is attached to.
    pub fn node(&self, animation: AnimatorDataHandle) -> NodeHandle {
        self.expect_valid(animation, "node");
        self.entries[animation.idx()].node
    }

    /// Node the animation with id `id` is attached to, null if `id` isn't used.
    pub fn node_at(&self, id: u32) -> NodeHandle {
        if self.animations.is_used(id) {
            self.entries[id as usize].node
        } else {
            NodeHandle::NULL
        }
    }

    /// Data the animation is attached to.
    pub fn data(&self, animation: AnimatorDataHandle) -> DataHandle {
        self.expect_valid(animation, "data");
        self.entries[animation.idx()].data
    }

    /// Data the animation with id `id` is attached to, null if `id` isn't used.
    pub fn data_at(&self, id: u32) -> DataHandle {
        if self.animations.is_used(id) {
            self.entries[id as usize].data
        } else {
            DataHandle::NULL
        }
    }

    /// Start playing at `time`, or resume if paused.
    pub fn play(&mut self, animation: AnimatorDataHandle, time: Duration) {
        self.expect_valid(animation, "play");
        let entry = &mut self.entries[animation.idx()];
        match entry.paused.take() {
            Some(paused) if paused >= entry.start => {
                entry.start += time.saturating_sub(paused);
            }
            _ => entry.start = time,
        }
        entry.stopped = None;
        entry.dirty = true;
        self.state |= AnimatorStates::NEEDS_ADVANCE;
    }

    /// Pause at `time`.
    pub fn pause(&mut self, animation: AnimatorDataHandle, time: Duration) {
        self.expect_valid(animation, "pause");
        let entry = &mut self.entries[animation.idx()];
        entry.paused = Some(time);
        entry.dirty = true;
        self.state |= AnimatorStates::NEEDS_ADVANCE;
    }

    /// Stop at `time`.
    pub fn stop(&mut self, animation: AnimatorDataHandle, time: Duration) {
        self.expect_valid(animation, "stop");
        let entry = &mut self.entries[animation.idx()];
        entry.stopped = Some(time);
        entry.dirty = true;
        self.state |= AnimatorStates::NEEDS_ADVANCE;
    }

    /// State at the time of the last advance.
    pub fn state(&self, animation: AnimatorDataHandle) -> AnimationState {
        self.expect_valid(animation, "state");
        self.entries[animation.idx()].state_at(self.time)
    }

    /// Interpolation factor at the time of the last advance.
    pub fn factor(&self, animation: AnimatorDataHandle) -> f32 {
        self.expect_valid(animation, "factor");
        self.entries[animation.idx()].factor_at(self.time)
    }

    /// Flags the animation was created with.
    pub fn flags(&self, animation: AnimatorDataHandle) -> AnimationFlags {
        self.expect_valid(animation, "flags");
        self.entries[animation.idx()].flags
    }

    /// Number of animation slots, including free ones.
    pub fn capacity(&self) -> usize {
        self.animations.capacity()
    }

    /// Number of used animation slots.
    pub fn used_count(&self) -> usize {
        self.animations.used_count()
    }

    /// Whether `animation` refers to a live animation of this animator.
    pub fn is_handle_valid(&self, animation: AnimatorDataHandle) -> bool {
        self.animations.is_valid(animation.to_raw())
    }

    /// Whether `animation` belongs to this animator and refers to a live animation.
    pub fn is_animation_handle_valid(&self, animation: AnimationHandle) -> bool {
        animation.animator() == self.handle && self.is_handle_valid(animation.animation())
    }

    /// Live animations, in id order.
    pub fn iter(&self) -> impl Iterator<Item = AnimatorDataHandle> + '_ {
        self.animations.iter().map(AnimatorDataHandle::from_raw)
    }

    /// Current state.
    pub fn animator_state(&self) -> AnimatorStates {
        self.state
    }

    fn expect_valid(&self, animation: AnimatorDataHandle, what: &str) {
        assert!(
            self.is_handle_valid(animation),
            "AnimatorCore::{what}(): invalid handle {animation:?}"
        );
    }

    /// Advance the timeline to `time`.
    ///
    /// # Panics
    ///
    /// If `time` is earlier than the previous advance.
    pub(crate) fn update(&mut self, time: Duration) -> AnimationStep {
        assert!(
            time >= self.time,
            "AnimatorCore::update(): expected a time at least {:?} but got {:?}",
            self.time,
            time
        );
        let mut step = AnimationStep {
            time,
            active: Vec::new(),
            factors: vec![0.0; self.entries.len()],
            removed: Vec::new(),
        };
        let mut needs_advance = false;
        for raw in self.animations.iter() {
            let id = raw.index();
            let entry = &mut self.entries[id as usize];
            let before = entry.state_at(self.time);
            let after = entry.state_at(time);
            let active = match after {
                AnimationState::Scheduled => false,
                AnimationState::Playing => true,
                AnimationState::Paused | AnimationState::Stopped => entry.dirty || before != after,
            };
            entry.dirty = false;
            if active {
                step.active.push(id);
                step.factors[id as usize] = entry.factor_at(time);
            }
            if after == AnimationState::Stopped {
                if !entry.flags.contains(AnimationFlags::KEEP_ONCE_FINISHED) {
                    step.removed.push(id);
                }
            } else {
                needs_advance = true;
            }
        }
        self.time = time;
        self.state.set(AnimatorStates::NEEDS_ADVANCE, needs_advance);
        step
    }

    /// Remove animations the last step marked as finished.
    pub(crate) fn remove_finished(&mut self, step: &AnimationStep) -> Vec<AnimatorDataHandle> {
        let mut removed = Vec::with_capacity(step.removed.len());
        for &id in &step.removed {
            if let Some(raw) = self.animations.handle_at(id) {
                self.animations.free(raw);
                removed.push(AnimatorDataHandle::from_raw(raw));
            }
        }
        removed
    }

    pub(crate) fn clean_nodes(
        &mut self,
        mut is_valid: impl FnMut(NodeHandle) -> bool,
    ) -> Vec<AnimatorDataHandle> {
        self.clean_by(|entry| entry.node.is_null() || is_valid(entry.node))
    }

    pub(crate) fn clean_data(
        &mut self,
        mut is_valid: impl FnMut(DataHandle) -> bool,
    ) -> Vec<AnimatorDataHandle> {
        self.clean_by(|entry| entry.data.is_null() || is_valid(entry.data))
    }

    fn clean_by(&mut self, mut keep: impl FnMut(&Animation) -> bool) -> Vec<AnimatorDataHandle> {
        let stale: Vec<_> = self
            .animations
            .iter()
            .filter(|raw| !keep(&self.entries[raw.index() as usize]))
            .collect();
        stale
            .into_iter()
            .map(|raw| {
                self.animations.free(raw);
                AnimatorDataHandle::from_raw(raw)
            })
            .collect()
    }
}

/// An animator implementation.
#[allow(unused_variables, reason = "Default hooks ignore their arguments.")]
pub trait Animator: Any {
    /// Shared bookkeeping.
    fn core(&self) -> &AnimatorCore;

    /// Shared bookkeeping.
    fn core_mut(&mut self) -> &mut AnimatorCore;

    /// What this animator modifies. Expected to not change during the animator lifetime.
    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Generic
    }

    /// Animations got removed, either finished or attached to removed nodes or data.
    fn clean(&mut self, removed: &[AnimatorDataHandle]) {}

    /// Apply active animations.
    fn advance(&mut self, step: &AnimationStep, target: AnimationTarget<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn core() -> AnimatorCore {
        AnimatorCore::new(
            AnimatorHandle::new(0, 1),
            AnimatorFeatures::NODE_ATTACHMENT | AnimatorFeatures::DATA_ATTACHMENT,
        )
    }

    #[test]
    fn timeline_states() {
        let mut c = core();
        let a = c.create(ms(10), ms(20), 1, AnimationFlags::KEEP_ONCE_FINISHED).animation();
        assert_eq!(c.state(a), AnimationState::Scheduled);

        let step = c.update(ms(15));
        assert_eq!(step.active, [a.index()]);
        assert_eq!(step.factors[a.idx()], 0.25);
        assert_eq!(c.state(a), AnimationState::Playing);

        c.update(ms(30));
        assert_eq!(c.state(a), AnimationState::Stopped);
        assert_eq!(c.factor(a), 1.0);
        assert!(c.is_handle_valid(a));
        assert!(!c.animator_state().contains(AnimatorStates::NEEDS_ADVANCE));
    }

    #[test]
    fn finished_animations_are_removed_after_one_last_step() {
        let mut c = core();
        let a = c.create(ms(0), ms(10), 1, AnimationFlags::empty()).animation();
        let step = c.update(ms(50));
        assert_eq!(step.active, [a.index()]);
        assert_eq!(step.factors[a.idx()], 1.0);
        assert_eq!(step.removed, [a.index()]);
        assert_eq!(c.remove_finished(&step), [a]);
        assert!(!c.is_handle_valid(a));
    }

    #[test]
    fn pause_and_resume() {
        let mut c = core();
        let a = c.create(ms(0), ms(100), 0, AnimationFlags::empty()).animation();
        c.pause(a, ms(40));
        let step = c.update(ms(60));
        assert_eq!(c.state(a), AnimationState::Paused);
        assert_eq!(step.factors[a.idx()], 0.4);
        // Paused animations keep the animator wanting to advance.
        assert!(c.animator_state().contains(AnimatorStates::NEEDS_ADVANCE));
        let step = c.update(ms(70));
        assert!(step.active.is_empty());

        c.play(a, ms(80));
        let step = c.update(ms(90));
        assert_eq!(c.state(a), AnimationState::Playing);
        assert_eq!(step.factors[a.idx()], 0.5);
    }

    #[test]
    fn repeats_wrap_factor() {
        let mut c = core();
        let a = c.create(ms(0), ms(10), 3, AnimationFlags::empty()).animation();
        let step = c.update(ms(25));
        assert_eq!(step.factors[a.idx()], 0.5);
        assert_eq!(c.state(a), AnimationState::Playing);
    }

    #[test]
    fn stop_takes_effect_at_its_time() {
        let mut c = core();
        let a = c.create(ms(0), ms(100), 0, AnimationFlags::KEEP_ONCE_FINISHED).animation();
        c.stop(a, ms(50));
        c.update(ms(20));
        assert_eq!(c.state(a), AnimationState::Playing);
        let step = c.update(ms(60));
        assert_eq!(c.state(a), AnimationState::Stopped);
        assert_eq!(step.active, [a.index()]);
        let step = c.update(ms(70));
        assert!(step.active.is_empty());
    }

    #[test]
    fn clean_removes_stale_attachments() {
        let mut c = core();
        let a = c.create(ms(0), ms(1), 1, AnimationFlags::empty()).animation();
        let b = c.create(ms(0), ms(1), 1, AnimationFlags::empty()).animation();
        let d = c.create(ms(0), ms(1), 1, AnimationFlags::empty()).animation();
        c.attach_node(a, NodeHandle::new(0, 1));
        c.attach_node(b, NodeHandle::new(1, 1));
        assert_eq!(c.clean_nodes(|n| n.index() == 0), [b]);
        assert!(c.is_handle_valid(d));

        let data = DataHandle::new(LayerHandle::new(0, 1), crate::LayerDataHandle::new(0, 1));
        c.attach_data(d, data);
        assert_eq!(c.data(d), data);
        assert_eq!(c.clean_data(|_| false), [d]);
        assert!(c.is_handle_valid(a));
    }

    #[test]
    #[should_panic(expected = "expected a time at least")]
    fn time_going_back_panics() {
        let mut c = core();
        c.update(ms(10));
        c.update(ms(5));
    }
}
