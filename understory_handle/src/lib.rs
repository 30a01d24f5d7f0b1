// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_handle --heading-base-level=0

//! Understory Handle: generational slot registries with bounded bit widths.
//!
//! Understory Handle is the allocation building block behind the Understory UI core.
//!
//! - [`Registry`] hands out `(index, generation)` pairs in O(1), validates them in O(1) and frees them in O(1).
//! - [`OrderedRegistry`] additionally keeps allocated slots in an intrusive back-to-front order.
//! - [`Links`] and [`ListHead`] are the intrusive doubly-linked list used by both, exposed so
//!   that callers can keep several independent lists over one index space.
//!
//! Index and generation widths are const parameters, so a registry for 256 layers with an 8-bit
//! generation and a registry for a million nodes with a 12-bit generation share one implementation.
//! Packing the pair into a compact integer is left to the typed handles built on top.
//!
//! ## Generations
//!
//! Generation `0` is never handed out, which lets packed handles reserve an all-zero value for null.
//! Every free increments the slot generation, so a stale handle never validates against a reused slot.
//! Once a slot's generation would wrap around its bit width, the slot is retired: it is never
//! allocated again and keeps counting towards [`Registry::used_count`].
//!
//! Freed slots are recycled in FIFO order to spread generation increments across slots.
//!
//! # Example
//!
//! ```rust
//! use understory_handle::Registry;
//!
//! let mut nodes: Registry<20, 12> = Registry::new();
//! let a = nodes.allocate();
//! assert!(nodes.is_valid(a));
//! assert_eq!(a.generation(), 1);
//!
//! nodes.free(a);
//! assert!(!nodes.is_valid(a));
//!
//! // The slot comes back with a newer generation; the stale handle stays invalid.
//! let b = nodes.allocate();
//! assert_eq!(b.index(), a.index());
//! assert_eq!(b.generation(), 2);
//! assert!(!nodes.is_valid(a));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod list;
mod ordered;
mod registry;

pub use list::{Link, Links, ListHead};
pub use ordered::{OrderedIter, OrderedRegistry};
pub use registry::{RawHandle, Registry};
