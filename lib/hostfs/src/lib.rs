//! Sandboxed host filesystem for WASI preview1 style runtimes.
//!
//! A guest addresses files through [`VirtualPath`]s relative to preopened
//! directories. Every path is resolved by a walker that keeps it beneath
//! its anchor, whatever `..` components, absolute paths or symlinks it
//! contains. Operations are typed values dispatched through an interceptor
//! [`pipeline`] to a platform [`backend`].
//!
//! ```no_run
//! use wasi_hostfs::op::{Open, OpenInput, ReadFd, ReadInput};
//! use wasi_hostfs::{BaseDirectory, FileSystemBuilder, ReadWriteStrategy, VirtualPath};
//! use wasi_hostfs_types::{FIRST_PREOPEN_FD, OpenFileFlags};
//!
//! let fs = FileSystemBuilder::new().preopen("/srv/data", "/data").build()?;
//! let fd = fs.execute::<Open>(OpenInput::new(
//!     VirtualPath::create("notes.txt")?,
//!     BaseDirectory::DirectoryFd(FIRST_PREOPEN_FD),
//!     OpenFileFlags::O_RDONLY,
//! ))?;
//! let bytes = fs.execute::<ReadFd>(ReadInput {
//!     fd,
//!     len: 4096,
//!     strategy: ReadWriteStrategy::CurrentPosition,
//! })?;
//! # let _ = bytes;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unstable_features)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod backend;
mod builder;
pub mod error;
pub mod fd_table;
mod filesystem;
pub mod op;
pub mod path;
pub mod pipeline;
pub mod readdir;
pub mod resolver;
pub mod resource;
pub mod stdio;

pub use crate::backend::BackendKind;
pub use crate::builder::{FileSystemBuilder, FileSystemCreationError};
pub use crate::error::{ErrorKind, FileSystemError, FileSystemOperationError};
pub use crate::filesystem::HostFileSystem;
pub use crate::path::{BaseDirectory, RealPath, VirtualPath};
pub use crate::pipeline::{
    FileSystemInterceptor, GlobalLockInterceptor, LoggingEvents, LoggingInterceptor,
    LoggingLevel,
};
pub use crate::readdir::DirEntrySequence;
pub use crate::resource::{FdAttributes, ReadWriteStrategy};
pub use crate::stdio::{SharedBuffer, StandardInputOutput, StdioSink, StdioSource};
