// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`Registry`] whose used slots are kept in an explicit order.

use crate::list::{Links, ListHead};
use crate::registry::{RawHandle, Registry};

/// A generational registry with an intrusive order over its used slots.
///
/// Insertion at either end, insertion before an arbitrary handle, removal and reordering are all O(1).
/// The order is typically a draw order: [`OrderedRegistry::first`] is drawn first, furthest back.
///
/// ```rust
/// use understory_handle::OrderedRegistry;
///
/// let mut layers: OrderedRegistry<8, 8> = OrderedRegistry::new();
/// let background = layers.allocate(None);
/// let foreground = layers.allocate(None);
/// let middle = layers.allocate(Some(foreground));
/// assert_eq!(layers.iter().collect::<Vec<_>>(), [background, middle, foreground]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct OrderedRegistry<const INDEX_BITS: u32, const GENERATION_BITS: u32> {
    registry: Registry<INDEX_BITS, GENERATION_BITS>,
    links: Links,
    head: ListHead,
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32>
    OrderedRegistry<INDEX_BITS, GENERATION_BITS>
{
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            registry: Registry::new(),
            links: Links::new(),
            head: ListHead::EMPTY,
        }
    }

    /// The underlying unordered registry.
    pub fn registry(&self) -> &Registry<INDEX_BITS, GENERATION_BITS> {
        &self.registry
    }

    /// See [`Registry::capacity`].
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// See [`Registry::used_count`].
    pub fn used_count(&self) -> usize {
        self.registry.used_count()
    }

    /// See [`Registry::is_valid`].
    pub fn is_valid(&self, handle: RawHandle) -> bool {
        self.registry.is_valid(handle)
    }

    /// Allocate a handle and order it right before `before`, or last if `before` is `None`.
    ///
    /// # Panics
    ///
    /// If `before` isn't valid or the capacity is exhausted.
    pub fn allocate(&mut self, before: Option<RawHandle>) -> RawHandle {
        if let Some(b) = before {
            assert!(
                self.registry.is_valid(b),
                "OrderedRegistry::allocate(): invalid before handle {b:?}"
            );
        }
        let handle = self.registry.allocate();
        self.links.insert_before(
            &mut self.head,
            handle.index(),
            before.map(RawHandle::index),
        );
        handle
    }

    /// Free `handle` and remove it from the order.
    ///
    /// Returns `false` if the slot got retired, see [`Registry::free`].
    ///
    /// # Panics
    ///
    /// If `handle` isn't valid.
    pub fn free(&mut self, handle: RawHandle) -> bool {
        assert!(
            self.registry.is_valid(handle),
            "OrderedRegistry::free(): invalid handle {handle:?}"
        );
        self.links.unlink(&mut self.head, handle.index());
        self.registry.free(handle)
    }

    /// Move `handle` right before `before`, or to the end if `before` is `None`.
    ///
    /// # Panics
    ///
    /// If either handle is invalid or they're the same.
    pub fn move_before(&mut self, handle: RawHandle, before: Option<RawHandle>) {
        assert!(
            self.registry.is_valid(handle),
            "OrderedRegistry::move_before(): invalid handle {handle:?}"
        );
        if let Some(b) = before {
            assert!(
                self.registry.is_valid(b) && b != handle,
                "OrderedRegistry::move_before(): invalid before handle {b:?}"
            );
        }
        self.links.unlink(&mut self.head, handle.index());
        self.links.insert_before(
            &mut self.head,
            handle.index(),
            before.map(RawHandle::index),
        );
    }

    /// First handle in the order.
    pub fn first(&self) -> Option<RawHandle> {
        self.head.first().and_then(|i| self.registry.handle_at(i))
    }

    /// Last handle in the order.
    pub fn last(&self) -> Option<RawHandle> {
        self.head.last().and_then(|i| self.registry.handle_at(i))
    }

    /// Handle ordered right after `handle`. `None` if `handle` is last or invalid.
    pub fn next(&self, handle: RawHandle) -> Option<RawHandle> {
        if !self.registry.is_valid(handle) {
            return None;
        }
        self.links
            .next(handle.index())
            .and_then(|i| self.registry.handle_at(i))
    }

    /// Handle ordered right before `handle`. `None` if `handle` is first or invalid.
    pub fn previous(&self, handle: RawHandle) -> Option<RawHandle> {
        if !self.registry.is_valid(handle) {
            return None;
        }
        self.links
            .previous(handle.index())
            .and_then(|i| self.registry.handle_at(i))
    }

    /// Iterate handles first to last. Reversible without allocating.
    pub fn iter(&self) -> OrderedIter<'_, INDEX_BITS, GENERATION_BITS> {
        OrderedIter {
            registry: &self.registry,
            links: &self.links,
            front: self.head.first(),
            back: self.head.last(),
        }
    }
}

/// Iterator over the handles of an [`OrderedRegistry`], created by [`OrderedRegistry::iter`].
#[derive(Clone, Debug)]
pub struct OrderedIter<'a, const INDEX_BITS: u32, const GENERATION_BITS: u32> {
    registry: &'a Registry<INDEX_BITS, GENERATION_BITS>,
    links: &'a Links,
    // Both cursors become `None` once they meet.
    front: Option<u32>,
    back: Option<u32>,
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32>
    OrderedIter<'_, INDEX_BITS, GENERATION_BITS>
{
    fn advance(&mut self, current: u32, step: Option<u32>, forward: bool) -> Option<RawHandle> {
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else if forward {
            self.front = step;
        } else {
            self.back = step;
        }
        self.registry.handle_at(current)
    }
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32> Iterator
    for OrderedIter<'_, INDEX_BITS, GENERATION_BITS>
{
    type Item = RawHandle;

    fn next(&mut self) -> Option<RawHandle> {
        loop {
            let current = self.front?;
            let step = self.links.next(current);
            if let Some(handle) = self.advance(current, step, true) {
                return Some(handle);
            }
        }
    }
}

impl<const INDEX_BITS: u32, const GENERATION_BITS: u32> DoubleEndedIterator
    for OrderedIter<'_, INDEX_BITS, GENERATION_BITS>
{
    fn next_back(&mut self) -> Option<RawHandle> {
        loop {
            let current = self.back?;
            let step = self.links.previous(current);
            if let Some(handle) = self.advance(current, step, false) {
                return Some(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn order_follows_before() {
        let mut r: OrderedRegistry<8, 8> = OrderedRegistry::new();
        let a = r.allocate(None);
        let b = r.allocate(Some(a));
        let c = r.allocate(None);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![b, a, c]);
        assert_eq!(r.first(), Some(b));
        assert_eq!(r.last(), Some(c));
        assert_eq!(r.next(b), Some(a));
        assert_eq!(r.previous(c), Some(a));
        assert_eq!(r.iter().rev().collect::<Vec<_>>(), vec![c, a, b]);
    }

    #[test]
    fn iteration_from_both_ends_meets_once() {
        let mut r: OrderedRegistry<8, 8> = OrderedRegistry::new();
        assert_eq!(r.iter().next_back(), None);
        let a = r.allocate(None);
        let b = r.allocate(None);
        let c = r.allocate(None);
        let mut iter = r.iter();
        assert_eq!(iter.next(), Some(a));
        assert_eq!(iter.next_back(), Some(c));
        assert_eq!(iter.next_back(), Some(b));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);

        r.free(b);
        let mut iter = r.iter();
        assert_eq!(iter.next_back(), Some(c));
        assert_eq!(iter.next(), Some(a));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn free_unlinks_and_reuses() {
        let mut r: OrderedRegistry<8, 8> = OrderedRegistry::new();
        let a = r.allocate(None);
        let b = r.allocate(None);
        r.free(a);
        assert_eq!(r.first(), Some(b));
        assert_eq!(r.next(a), None);
        let c = r.allocate(Some(b));
        assert_eq!(c.index(), a.index());
        assert_eq!(c.generation(), 2);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![c, b]);
    }

    #[test]
    fn move_before_reorders() {
        let mut r: OrderedRegistry<8, 8> = OrderedRegistry::new();
        let a = r.allocate(None);
        let b = r.allocate(None);
        let c = r.allocate(None);
        r.move_before(c, Some(a));
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![c, a, b]);
        r.move_before(c, None);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    #[should_panic(expected = "invalid before handle")]
    fn stale_before_panics() {
        let mut r: OrderedRegistry<8, 8> = OrderedRegistry::new();
        let a = r.allocate(None);
        r.free(a);
        r.allocate(Some(a));
    }
}
