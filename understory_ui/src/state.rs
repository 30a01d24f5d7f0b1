// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The user interface state lattice.
//!
//! Each state is a superset of the coarser states it implies, so marking the
//! most specific one is enough:
//!
//! ```text
//! NEEDS_NODE_CLEAN ─┬─ NEEDS_DATA_CLEAN
//!                   └─ NEEDS_NODE_UPDATE ─┬─ NEEDS_NODE_OPACITY_UPDATE ──────────────┐
//!                                         └─ NEEDS_LAYOUT_ASSIGNMENT_UPDATE          │
//!                                            └─ NEEDS_LAYOUT_UPDATE                  │
//!                                               └─ NEEDS_NODE_CLIP_UPDATE            │
//!                                                  └─ NEEDS_NODE_ENABLED_UPDATE      │
//!                                                     └─ NEEDS_DATA_ATTACHMENT_UPDATE│
//!                                                        └─ NEEDS_DATA_UPDATE ◄──────┘
//! ```
//!
//! [`NEEDS_ANIMATION_ADVANCE`](UserInterfaceStates::NEEDS_ANIMATION_ADVANCE) stands alone.

bitflags::bitflags! {
    /// What [`UserInterface::clean`](crate::UserInterface::clean),
    /// [`UserInterface::update`](crate::UserInterface::update) and
    /// [`UserInterface::advance_animations`](crate::UserInterface::advance_animations) have to do.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct UserInterfaceStates: u16 {
        /// Data contents changed and layers need to be updated.
        const NEEDS_DATA_UPDATE = 1 << 0;
        /// Data got attached to different nodes, so per-layer draw order has to be rebuilt.
        const NEEDS_DATA_ATTACHMENT_UPDATE = Self::NEEDS_DATA_UPDATE.bits() | 1 << 1;
        /// Node enabled, event or focusable flags changed.
        const NEEDS_NODE_ENABLED_UPDATE = Self::NEEDS_DATA_ATTACHMENT_UPDATE.bits() | 1 << 2;
        /// Clip flags or the user interface size changed, so clip rectangles and culling are stale.
        const NEEDS_NODE_CLIP_UPDATE = Self::NEEDS_NODE_ENABLED_UPDATE.bits() | 1 << 3;
        /// Node offsets or sizes changed, layouts have to be recalculated.
        const NEEDS_LAYOUT_UPDATE = Self::NEEDS_NODE_CLIP_UPDATE.bits() | 1 << 4;
        /// Layouts got assigned to or removed from nodes.
        const NEEDS_LAYOUT_ASSIGNMENT_UPDATE = Self::NEEDS_LAYOUT_UPDATE.bits() | 1 << 5;
        /// Node opacities changed.
        const NEEDS_NODE_OPACITY_UPDATE = Self::NEEDS_DATA_UPDATE.bits() | 1 << 6;
        /// Node hierarchy, visibility or top-level order changed.
        const NEEDS_NODE_UPDATE = Self::NEEDS_LAYOUT_ASSIGNMENT_UPDATE.bits()
            | Self::NEEDS_NODE_OPACITY_UPDATE.bits()
            | 1 << 7;
        /// Data got removed and animators attached to it have to be cleaned.
        const NEEDS_DATA_CLEAN = 1 << 8;
        /// Nodes got removed and their descendants and attachments have to be cleaned.
        const NEEDS_NODE_CLEAN = Self::NEEDS_NODE_UPDATE.bits()
            | Self::NEEDS_DATA_CLEAN.bits()
            | 1 << 9;
        /// Some animator has scheduled, playing or paused animations.
        const NEEDS_ANIMATION_ADVANCE = 1 << 10;
    }
}

impl UserInterfaceStates {
    /// States resolved by [`UserInterface::clean`](crate::UserInterface::clean).
    pub const CLEAN_BITS: Self = Self::NEEDS_NODE_CLEAN.difference(Self::NEEDS_NODE_UPDATE);

    /// States resolved by [`UserInterface::update`](crate::UserInterface::update).
    pub const UPDATE_BITS: Self = Self::NEEDS_NODE_UPDATE;
}

#[cfg(test)]
mod tests {
    use super::UserInterfaceStates as S;

    #[test]
    fn implication_table() {
        let table = [
            (S::NEEDS_DATA_ATTACHMENT_UPDATE, S::NEEDS_DATA_UPDATE),
            (S::NEEDS_NODE_ENABLED_UPDATE, S::NEEDS_DATA_ATTACHMENT_UPDATE),
            (S::NEEDS_NODE_CLIP_UPDATE, S::NEEDS_NODE_ENABLED_UPDATE),
            (S::NEEDS_LAYOUT_UPDATE, S::NEEDS_NODE_CLIP_UPDATE),
            (S::NEEDS_LAYOUT_ASSIGNMENT_UPDATE, S::NEEDS_LAYOUT_UPDATE),
            (S::NEEDS_NODE_OPACITY_UPDATE, S::NEEDS_DATA_UPDATE),
            (S::NEEDS_NODE_UPDATE, S::NEEDS_LAYOUT_ASSIGNMENT_UPDATE),
            (S::NEEDS_NODE_UPDATE, S::NEEDS_NODE_OPACITY_UPDATE),
            (S::NEEDS_NODE_CLEAN, S::NEEDS_NODE_UPDATE),
            (S::NEEDS_NODE_CLEAN, S::NEEDS_DATA_CLEAN),
        ];
        for (finer, coarser) in table {
            assert!(
                finer.contains(coarser),
                "{finer:?} is expected to imply {coarser:?}"
            );
            assert_ne!(finer, coarser, "each level adds its own bit");
        }
    }

    #[test]
    fn unrelated_states_stay_apart() {
        assert!(!S::NEEDS_NODE_OPACITY_UPDATE.contains(S::NEEDS_DATA_ATTACHMENT_UPDATE));
        assert!(!S::NEEDS_LAYOUT_UPDATE.contains(S::NEEDS_NODE_OPACITY_UPDATE));
        assert!(!S::NEEDS_NODE_CLEAN.contains(S::NEEDS_ANIMATION_ADVANCE));
        assert!(!S::NEEDS_DATA_CLEAN.intersects(S::NEEDS_NODE_UPDATE));
    }

    #[test]
    fn exact_bits() {
        assert_eq!(S::NEEDS_DATA_UPDATE.bits(), 0x001);
        assert_eq!(S::NEEDS_LAYOUT_ASSIGNMENT_UPDATE.bits(), 0x03f);
        assert_eq!(S::NEEDS_NODE_UPDATE.bits(), 0x0ff);
        assert_eq!(S::NEEDS_NODE_CLEAN.bits(), 0x3ff);
        assert_eq!(S::CLEAN_BITS.bits(), 0x300);
        assert_eq!(S::NEEDS_ANIMATION_ADVANCE.bits(), 0x400);
    }
}
