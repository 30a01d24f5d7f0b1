// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Intrusive doubly-linked lists over a dense index space.
//!
//! [`Links`] stores one [`Link`] per index and can back any number of disjoint lists,
//! each described by its own [`ListHead`]. An index is in at most one list at a time.

use alloc::vec::Vec;

/// Previous/next pointers of one index.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Link {
    previous: Option<u32>,
    next: Option<u32>,
    linked: bool,
}

impl Link {
    /// Previous index in the list, if any.
    pub fn previous(&self) -> Option<u32> {
        self.previous
    }

    /// Next index in the list, if any.
    pub fn next(&self) -> Option<u32> {
        self.next
    }

    /// Whether the index is currently part of some list.
    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

/// First and last index of one list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListHead {
    first: Option<u32>,
    last: Option<u32>,
}

impl ListHead {
    /// An empty list.
    pub const EMPTY: Self = Self {
        first: None,
        last: None,
    };

    /// First index, drawn furthest back when used as a draw order.
    pub fn first(&self) -> Option<u32> {
        self.first
    }

    /// Last index.
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// Link storage shared by lists over one index space.
#[derive(Clone, Debug, Default)]
pub struct Links {
    links: Vec<Link>,
}

impl Links {
    /// Create empty link storage.
    pub const fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Number of indices with storage.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether no index has storage yet.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Grow storage so that `index` is addressable.
    pub fn reserve_index(&mut self, index: u32) {
        let needed = index as usize + 1;
        if self.links.len() < needed {
            self.links.resize(needed, Link::default());
        }
    }

    /// Link of `index`.
    ///
    /// Indices without storage report an unlinked default.
    pub fn get(&self, index: u32) -> Link {
        self.links.get(index as usize).copied().unwrap_or_default()
    }

    /// Whether `index` is in some list.
    pub fn is_linked(&self, index: u32) -> bool {
        self.get(index).linked
    }

    /// Next index after `index`.
    pub fn next(&self, index: u32) -> Option<u32> {
        self.get(index).next
    }

    /// Previous index before `index`.
    pub fn previous(&self, index: u32) -> Option<u32> {
        self.get(index).previous
    }

    /// Insert `index` into `head` right before `before`, or at the end if `before` is `None`.
    ///
    /// # Panics
    ///
    /// If `index` is already linked, or `before` isn't linked.
    pub fn insert_before(&mut self, head: &mut ListHead, index: u32, before: Option<u32>) {
        self.reserve_index(index);
        assert!(
            !self.links[index as usize].linked,
            "Links::insert_before(): index {index} is already linked"
        );
        let previous = match before {
            Some(b) => {
                assert!(
                    self.is_linked(b),
                    "Links::insert_before(): index {b} is not linked"
                );
                let previous = self.links[b as usize].previous;
                self.links[b as usize].previous = Some(index);
                previous
            }
            None => {
                let previous = head.last;
                head.last = Some(index);
                previous
            }
        };
        match previous {
            Some(p) => self.links[p as usize].next = Some(index),
            None => head.first = Some(index),
        }
        self.links[index as usize] = Link {
            previous,
            next: before,
            linked: true,
        };
    }

    /// Remove `index` from `head`. No-op if it isn't linked.
    pub fn unlink(&mut self, head: &mut ListHead, index: u32) {
        let link = self.get(index);
        if !link.linked {
            return;
        }
        match link.previous {
            Some(p) => self.links[p as usize].next = link.next,
            None => head.first = link.next,
        }
        match link.next {
            Some(n) => self.links[n as usize].previous = link.previous,
            None => head.last = link.previous,
        }
        self.links[index as usize] = Link::default();
    }

    /// Mark `index` as unlinked without touching its neighbors or any list head.
    ///
    /// Only valid while discarding the whole list `index` was part of.
    pub fn forget(&mut self, index: u32) {
        if let Some(link) = self.links.get_mut(index as usize) {
            *link = Link::default();
        }
    }

    /// Iterate a list front to back.
    pub fn iter<'a>(&'a self, head: &ListHead) -> impl Iterator<Item = u32> + use<'a> {
        let mut cursor = head.first;
        core::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.next(current);
            Some(current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn append_and_insert_before() {
        let mut links = Links::new();
        let mut head = ListHead::EMPTY;
        links.insert_before(&mut head, 0, None);
        links.insert_before(&mut head, 1, None);
        links.insert_before(&mut head, 2, Some(1));
        links.insert_before(&mut head, 3, Some(0));
        assert_eq!(links.iter(&head).collect::<Vec<_>>(), vec![3, 0, 2, 1]);
        assert_eq!(head.first(), Some(3));
        assert_eq!(head.last(), Some(1));
        assert_eq!(links.previous(2), Some(0));
        assert_eq!(links.next(2), Some(1));
    }

    #[test]
    fn unlink_ends_and_middle() {
        let mut links = Links::new();
        let mut head = ListHead::EMPTY;
        for i in 0..4 {
            links.insert_before(&mut head, i, None);
        }
        links.unlink(&mut head, 0);
        links.unlink(&mut head, 3);
        links.unlink(&mut head, 3);
        assert_eq!(links.iter(&head).collect::<Vec<_>>(), vec![1, 2]);
        links.unlink(&mut head, 1);
        links.unlink(&mut head, 2);
        assert!(head.is_empty());
        assert_eq!(head.last(), None);
        assert!(!links.is_linked(2));
    }

    #[test]
    fn independent_lists_share_storage() {
        let mut links = Links::new();
        let mut a = ListHead::EMPTY;
        let mut b = ListHead::EMPTY;
        links.insert_before(&mut a, 0, None);
        links.insert_before(&mut b, 5, None);
        links.insert_before(&mut a, 1, None);
        links.insert_before(&mut b, 4, Some(5));
        assert_eq!(links.iter(&a).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(links.iter(&b).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    #[should_panic(expected = "is already linked")]
    fn double_insert_panics() {
        let mut links = Links::new();
        let mut head = ListHead::EMPTY;
        links.insert_before(&mut head, 0, None);
        links.insert_before(&mut head, 0, None);
    }
}
