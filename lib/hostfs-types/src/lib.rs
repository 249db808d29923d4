//! Plain value types shared between the host filesystem and the layer that
//! binds it to a WASI preview1 import surface.
//!
//! Every numeric value here follows the WASI preview1 ABI so the binding
//! layer can copy it into guest memory without translation.

mod dirent;
mod errno;
mod fd;
mod filetype;
mod flags;
mod rights;
mod stat;
mod subscription;

pub use dirent::*;
pub use errno::*;
pub use fd::*;
pub use filetype::*;
pub use flags::*;
pub use rights::*;
pub use stat::*;
pub use subscription::*;

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;
