// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed, typed handles.
//!
//! Every entity the user interface knows about is referred to by a small copyable handle that
//! packs a slot index together with a generation counter. An all-zero value is the null handle.
//!
//! | Handle | Index bits | Generation bits | Storage |
//! |---|---|---|---|
//! | [`LayerHandle`], [`LayouterHandle`], [`AnimatorHandle`] | 8 | 8 | `u16` |
//! | [`NodeHandle`], [`LayerDataHandle`], [`LayouterDataHandle`], [`AnimatorDataHandle`] | 20 | 12 | `u32` |
//! | [`DataHandle`], [`LayoutHandle`], [`AnimationHandle`] | owner + local | | `u64` |
//!
//! Data, layout and animation handles are owned by a layer, layouter or animator instance. The
//! composite forms carry the owner handle so that the user interface can route them, while the
//! local forms are what the owning instance works with internally.

use core::fmt;

use understory_handle::RawHandle;

macro_rules! packed_handle {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $index_bits:literal, $generation_bits:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name($repr);

        #[allow(
            trivial_numeric_casts,
            clippy::unnecessary_cast,
            dead_code,
            reason = "Shared between u16 and u32 handles, not all of which use every conversion."
        )]
        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);
            /// Number of bits used for the index.
            pub const INDEX_BITS: u32 = $index_bits;
            /// Number of bits used for the generation.
            pub const GENERATION_BITS: u32 = $generation_bits;

            /// Pack an index and a generation.
            ///
            /// # Panics
            ///
            /// If either doesn't fit into its bit width.
            pub const fn new(index: u32, generation: u32) -> Self {
                assert!(
                    index < (1 << $index_bits) && generation < (1 << $generation_bits),
                    concat!(
                        stringify!($name),
                        "::new(): expected index to fit into ",
                        stringify!($index_bits),
                        " bits and generation into ",
                        stringify!($generation_bits)
                    )
                );
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Both parts were checked to fit."
                )]
                let packed = (index | (generation << $index_bits)) as $repr;
                Self(packed)
            }

            /// Slot index.
            pub const fn index(self) -> u32 {
                (self.0 as u32) & ((1 << $index_bits) - 1)
            }

            /// Slot generation. `0` only for the null handle.
            pub const fn generation(self) -> u32 {
                (self.0 as u32) >> $index_bits
            }

            /// Packed representation.
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Whether this is the null handle.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// Some(self) unless null.
            pub const fn non_null(self) -> Option<Self> {
                if self.is_null() { None } else { Some(self) }
            }

            pub(crate) const fn idx(self) -> usize {
                self.index() as usize
            }

            pub(crate) const fn from_raw(raw: RawHandle) -> Self {
                Self::new(raw.index(), raw.generation())
            }

            pub(crate) const fn to_raw(self) -> RawHandle {
                RawHandle::new(self.index(), self.generation())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    f.write_str(concat!(stringify!($name), "::Null"))
                } else {
                    write!(
                        f,
                        concat!(stringify!($name), "({:#x}, {:#x})"),
                        self.index(),
                        self.generation()
                    )
                }
            }
        }
    };
}

macro_rules! composite_handle {
    (
        $(#[$meta:meta])* $name:ident,
        $owner:ident, $owner_fn:ident,
        $local:ident, $local_fn:ident
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u64);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Compose from an owner handle and a local handle.
            pub const fn new(owner: $owner, local: $local) -> Self {
                Self(((owner.bits() as u64) << 32) | local.bits() as u64)
            }

            /// Owner part.
            pub const fn $owner_fn(self) -> $owner {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "The owner occupies the upper 32 bits."
                )]
                let bits = (self.0 >> 32) as u32;
                $owner::new(bits & ((1 << $owner::INDEX_BITS) - 1), bits >> $owner::INDEX_BITS)
            }

            /// Local part.
            pub const fn $local_fn(self) -> $local {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "The local handle occupies the lower 32 bits."
                )]
                let bits = self.0 as u32;
                $local::new(bits & ((1 << $local::INDEX_BITS) - 1), bits >> $local::INDEX_BITS)
            }

            /// Packed representation.
            pub const fn bits(self) -> u64 {
                self.0
            }

            /// Whether this is the null handle.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    return f.write_str(concat!(stringify!($name), "::Null"));
                }
                let owner = self.$owner_fn();
                let local = self.$local_fn();
                write!(
                    f,
                    concat!(stringify!($name), "({{{:#x}, {:#x}}}, {{{:#x}, {:#x}}})"),
                    owner.index(),
                    owner.generation(),
                    local.index(),
                    local.generation()
                )
            }
        }
    };
}

packed_handle!(
    /// Handle of a layer.
    LayerHandle, u16, 8, 8
);
packed_handle!(
    /// Handle of a layouter.
    LayouterHandle, u16, 8, 8
);
packed_handle!(
    /// Handle of an animator.
    AnimatorHandle, u16, 8, 8
);
packed_handle!(
    /// Handle of a node.
    NodeHandle, u32, 20, 12
);
packed_handle!(
    /// Data handle local to the layer that owns it.
    LayerDataHandle, u32, 20, 12
);
packed_handle!(
    /// Layout handle local to the layouter that owns it.
    LayouterDataHandle, u32, 20, 12
);
packed_handle!(
    /// Animation handle local to the animator that owns it.
    AnimatorDataHandle, u32, 20, 12
);

composite_handle!(
    /// Data handle: a [`LayerHandle`] together with a [`LayerDataHandle`].
    DataHandle, LayerHandle, layer, LayerDataHandle, data
);
composite_handle!(
    /// Layout handle: a [`LayouterHandle`] together with a [`LayouterDataHandle`].
    LayoutHandle, LayouterHandle, layouter, LayouterDataHandle, layout
);
composite_handle!(
    /// Animation handle: an [`AnimatorHandle`] together with an [`AnimatorDataHandle`].
    AnimationHandle, AnimatorHandle, animator, AnimatorDataHandle, animation
);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn pack_and_unpack() {
        let n = NodeHandle::new(0xabcde, 0x123);
        assert_eq!(n.index(), 0xabcde);
        assert_eq!(n.generation(), 0x123);
        assert_eq!(n.bits(), 0x123a_bcde);

        let l = LayerHandle::new(0xab, 0x12);
        assert_eq!(l.bits(), 0x12ab);
        assert_eq!((l.index(), l.generation()), (0xab, 0x12));
    }

    #[test]
    fn null_is_default() {
        assert!(NodeHandle::default().is_null());
        assert!(DataHandle::default().is_null());
        assert_eq!(LayerHandle::NULL.non_null(), None);
        assert_eq!(NodeHandle::new(0, 1).non_null(), Some(NodeHandle::new(0, 1)));
    }

    #[test]
    fn composite_parts() {
        let layer = LayerHandle::new(0x3, 0x1);
        let data = LayerDataHandle::new(0xfffff, 0xfff);
        let h = DataHandle::new(layer, data);
        assert_eq!(h.layer(), layer);
        assert_eq!(h.data(), data);

        let a = AnimationHandle::new(AnimatorHandle::new(1, 2), AnimatorDataHandle::new(3, 4));
        assert_eq!(a.animator(), AnimatorHandle::new(1, 2));
        assert_eq!(a.animation(), AnimatorDataHandle::new(3, 4));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", NodeHandle::new(0x3, 0x1)), "NodeHandle(0x3, 0x1)");
        assert_eq!(format!("{:?}", LayerHandle::NULL), "LayerHandle::Null");
        assert_eq!(
            format!(
                "{:?}",
                DataHandle::new(LayerHandle::new(0x1, 0x2), LayerDataHandle::new(0x3, 0x4))
            ),
            "DataHandle({0x1, 0x2}, {0x3, 0x4})"
        );
        assert_eq!(format!("{:?}", LayoutHandle::NULL), "LayoutHandle::Null");
    }

    #[test]
    #[should_panic(expected = "expected index to fit into 8 bits and generation into 8")]
    fn out_of_range_panics() {
        let _ = LayerHandle::new(0x100, 1);
    }
}
