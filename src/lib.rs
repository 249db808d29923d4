//! Umbrella crate of the WASI host filesystem workspace.
//!
//! Re-exports [`wasi_hostfs`] and its value types so embedders can depend on
//! a single crate.

pub use wasi_hostfs::*;

pub use wasi_hostfs_types as types;
