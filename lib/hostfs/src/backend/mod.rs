//! Host filesystem backends.
//!
//! A backend performs the native calls on already resolved paths and never
//! sees a guest path. The resolver decides containment; a backend that
//! [resolves beneath handles](FileSystemBackend::resolves_beneath_handles)
//! also enforces it against concurrent renames.

use std::fmt;
use std::sync::Arc;

use wasi_hostfs_types::{
    FdRightsBlock, Fdflags, FileAccessibilityCheck, FileMode, Filestat, OpenFileFlags, Timespec,
};

use crate::error::{
    CheckAccessError, FileSystemError, HardlinkError, MkdirError, OpenError, ReadLinkError,
    RenameError, SetTimestampError, StatError, SymlinkError, UnlinkDirectoryError, UnlinkError,
};
use crate::op::OperationTag;
use crate::path::RealPath;
use crate::resolver::{ComponentLookup, ResolvedPath};
use crate::resource::{DirectoryInfo, FdResource};

mod errors;
#[cfg(any(target_os = "linux", target_os = "macos"))]
mod posix;
mod std_fs;
#[cfg(windows)]
mod windows;

pub(crate) use errors::{Family, io_error};
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub use posix::PosixBackend;
pub use std_fs::StdBackend;

/// Available backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Direct `libc` calls. Linux and macOS only.
    Posix,
    /// `std::fs` on every platform.
    Std,
}

impl BackendKind {
    /// The preferred backend of the compilation target.
    pub fn native() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "macos"))] {
                BackendKind::Posix
            } else {
                BackendKind::Std
            }
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Posix => cfg!(any(target_os = "linux", target_os = "macos")),
            BackendKind::Std => true,
        }
    }

    pub(crate) fn create(self) -> Option<Arc<dyn FileSystemBackend>> {
        match self {
            #[cfg(any(target_os = "linux", target_os = "macos"))]
            BackendKind::Posix => Some(Arc::new(PosixBackend::new())),
            #[cfg(not(any(target_os = "linux", target_os = "macos")))]
            BackendKind::Posix => None,
            BackendKind::Std => Some(Arc::new(StdBackend::new())),
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::native()
    }
}

/// Arguments of [`FileSystemBackend::open`].
#[derive(Debug, Clone)]
pub struct OpenRequest<'a> {
    pub path: &'a ResolvedPath,
    pub flags: OpenFileFlags,
    pub fdflags: Fdflags,
    pub mode: FileMode,
    /// Rights of the descriptor if the path turns out to be a file.
    pub file_rights: FdRightsBlock,
    /// Rights of the descriptor if the path turns out to be a directory.
    pub directory_rights: FdRightsBlock,
    /// Guest spelling of the path, kept by directory resources.
    pub virtual_path: String,
}

/// Native filesystem calls.
///
/// `follow_symlinks` only matters in root-access mode: in sandboxed mode the
/// resolver already expanded every link it was asked to follow.
pub trait FileSystemBackend: ComponentLookup + Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Whether the backend can perform `tag` at all.
    fn supports(&self, _tag: OperationTag) -> bool {
        true
    }

    /// Whether native calls address paths relative to the anchor handle
    /// without following symlinks, so a component renamed after resolution
    /// can not redirect them. Other backends are serialized per filesystem.
    fn resolves_beneath_handles(&self) -> bool {
        false
    }

    /// Opens `path` as a file or, if it is one, a directory.
    fn open(&self, request: OpenRequest<'_>) -> Result<Arc<dyn FdResource>, OpenError>;

    /// Opens a directory that must exist, e.g. a preopen.
    fn open_directory(
        &self,
        path: &RealPath,
        info: DirectoryInfo,
        rights: FdRightsBlock,
    ) -> Result<Arc<dyn FdResource>, OpenError>;

    fn stat(&self, path: &ResolvedPath, follow_symlinks: bool) -> Result<Filestat, StatError>;

    fn mkdir(&self, path: &ResolvedPath, mode: FileMode) -> Result<(), MkdirError>;

    fn rename(&self, from: &ResolvedPath, to: &ResolvedPath) -> Result<(), RenameError>;

    fn unlink_file(&self, path: &ResolvedPath) -> Result<(), UnlinkError>;

    fn unlink_directory(&self, path: &ResolvedPath) -> Result<(), UnlinkDirectoryError>;

    /// Creates `link` pointing to `target`, stored verbatim.
    fn symlink(&self, target: &str, link: &ResolvedPath) -> Result<(), SymlinkError>;

    fn read_link(&self, path: &ResolvedPath) -> Result<String, ReadLinkError>;

    fn hardlink(
        &self,
        from: &ResolvedPath,
        to: &ResolvedPath,
        follow_symlinks: bool,
    ) -> Result<(), HardlinkError>;

    /// `None` leaves the timestamp unchanged.
    fn set_timestamp(
        &self,
        path: &ResolvedPath,
        follow_symlinks: bool,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError>;

    /// An empty `mode` checks existence only.
    fn check_access(
        &self,
        path: &ResolvedPath,
        mode: FileAccessibilityCheck,
        follow_symlinks: bool,
        use_effective_ids: bool,
    ) -> Result<(), CheckAccessError>;
}

pub(crate) fn not_utf8(path: &RealPath) -> FileSystemError {
    FileSystemError::new(
        crate::error::ErrorKind::InvalidArgument,
        format!("{path} is not valid UTF-8"),
    )
}
