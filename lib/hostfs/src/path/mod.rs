//! Guest and host path types.

mod error;
mod real_path;
mod virtual_path;

pub use error::*;
pub use real_path::*;
pub use virtual_path::*;

/// The anchor a path-taking operation resolves its path against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDirectory {
    /// Relative paths are not permitted.
    None,
    CurrentWorkingDirectory,
    DirectoryFd(wasi_hostfs_types::Fd),
}
