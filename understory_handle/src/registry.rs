// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational slot registry.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// An unpacked `(index, generation)` pair handed out by a [`Registry`].
///
/// A `RawHandle` is only meaningful together with the registry that produced it.
/// Typed, packed handles are built on top of it by the crates using the registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// Construct a handle from its parts.
    ///
    /// No validation happens here, use [`Registry::is_valid`] for that.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was allocated.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub(crate) const fn idx(self) -> usize {
        self.index as usize
    }
}

#[derive(Copy, Clone, Debug)]
struct Slot {
    generation: u32,
    used: bool,
}

/// A generational slot allocator.
///
/// `INDEX_BITS` bounds the capacity to `1 << INDEX_BITS` slots and `GENERATION_BITS` bounds
/// the generation counter of each slot. Generation `0` is reserved: fresh slots start at `1`
/// and a slot whose generation would wrap back to `0` is retired instead of being reused.
///
/// All operations except [`Registry::iter`] are O(1).
#[derive(Clone)]
pub struct Registry<const INDEX_BITS: u32, const GENERATION_BITS: u32> {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
    retired: u32,
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32> core::fmt::Debug
    for Registry<INDEX_BITS, GENERATION_BITS>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("index_bits", &INDEX_BITS)
            .field("generation_bits", &GENERATION_BITS)
            .field("capacity", &self.capacity())
            .field("used_count", &self.used_count())
            .field("free", &self.free.len())
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32> Default
    for Registry<INDEX_BITS, GENERATION_BITS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32> Registry<INDEX_BITS, GENERATION_BITS> {
    /// Maximum number of slots this registry can ever hold.
    pub const MAX_CAPACITY: u32 = {
        assert!(INDEX_BITS > 0 && INDEX_BITS < 32, "index bits out of range");
        1 << INDEX_BITS
    };

    /// Largest generation a handle from this registry can carry.
    pub const MAX_GENERATION: u32 = {
        assert!(
            GENERATION_BITS > 0 && GENERATION_BITS < 32,
            "generation bits out of range"
        );
        (1 << GENERATION_BITS) - 1
    };

    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            retired: 0,
        }
    }

    /// Number of slots allocated so far, used or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that are not available for allocation.
    ///
    /// Retired slots count as used, since they can never be handed out again.
    pub fn used_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of slots retired because their generation counter ran out.
    pub fn retired_count(&self) -> usize {
        self.retired as usize
    }

    /// Whether a new handle can be allocated without hitting [`Self::MAX_CAPACITY`].
    pub fn can_allocate(&self) -> bool {
        !self.free.is_empty() || self.slots.len() < Self::MAX_CAPACITY as usize
    }

    /// Allocate a handle.
    ///
    /// Free slots are reused oldest-freed first; otherwise storage grows by one slot.
    ///
    /// # Panics
    ///
    /// If all `1 << INDEX_BITS` slots are used or retired.
    pub fn allocate(&mut self) -> RawHandle {
        self.try_allocate().unwrap_or_else(|| {
            panic!(
                "Registry::allocate(): capacity of {} slots exhausted",
                Self::MAX_CAPACITY
            )
        })
    }

    /// Allocate a handle, returning `None` once the capacity ceiling is reached.
    pub fn try_allocate(&mut self) -> Option<RawHandle> {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(!slot.used, "free list references a used slot");
            slot.used = true;
            return Some(RawHandle::new(index, slot.generation));
        }
        if self.slots.len() >= Self::MAX_CAPACITY as usize {
            return None;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Bounded by MAX_CAPACITY, which fits in u32."
        )]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            used: true,
        });
        Some(RawHandle::new(index, 1))
    }

    /// Whether `handle` refers to a used slot with a matching generation.
    pub fn is_valid(&self, handle: RawHandle) -> bool {
        self.slots
            .get(handle.idx())
            .is_some_and(|slot| slot.used && slot.generation == handle.generation)
    }

    /// Whether the slot at `index` is currently used.
    pub fn is_used(&self, index: u32) -> bool {
        self.slots.get(index as usize).is_some_and(|slot| slot.used)
    }

    /// Current generation of the slot at `index`, `0` if retired or out of range.
    pub fn generation(&self, index: u32) -> u32 {
        self.slots.get(index as usize).map_or(0, |slot| slot.generation)
    }

    /// Handle to the slot at `index` if it's currently used.
    pub fn handle_at(&self, index: u32) -> Option<RawHandle> {
        let slot = self.slots.get(index as usize)?;
        slot.used.then_some(RawHandle::new(index, slot.generation))
    }

    /// Free `handle`, incrementing the slot generation.
    ///
    /// Returns `false` if the slot got retired because its generation wrapped around. A retired
    /// slot is never handed out again and counts towards [`Registry::retired_count`], so the
    /// handle space shrinks by one. Callers are expected to log this, the registry doesn't.
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn free(&mut self, handle: RawHandle) -> bool {
        assert!(
            self.is_valid(handle),
            "Registry::free(): invalid handle {handle:?}"
        );
        let slot = &mut self.slots[handle.idx()];
        slot.used = false;
        if slot.generation == Self::MAX_GENERATION {
            slot.generation = 0;
            self.retired += 1;
            return false;
        }
        slot.generation += 1;
        self.free.push_back(handle.index);
        true
    }

    /// Iterate used handles in index order.
    pub fn iter(&self) -> impl Iterator<Item = RawHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Bounded by MAX_CAPACITY, which fits in u32."
            )]
            let index = i as u32;
            slot.used.then_some(RawHandle::new(index, slot.generation))
        })
    }
}
