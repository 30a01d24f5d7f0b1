// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors of the typed instance accessors.

/// Why a typed instance accessor such as [`UserInterface::layer_as`](crate::UserInterface::layer_as) failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    /// The handle doesn't refer to a live layer, layouter or animator.
    #[error("invalid handle")]
    InvalidHandle,
    /// The handle is valid but no instance was set for it yet.
    #[error("no instance set for the handle")]
    NoInstance,
    /// The instance is of a different type than requested.
    #[error("instance is of a different type")]
    WrongType,
}
