//! Inputs of path-taking operations.

use wasi_hostfs_types::{FdRightsBlock, Fdflags, FileAccessibilityCheck, FileMode, OpenFileFlags, Timespec};

use crate::path::{BaseDirectory, VirtualPath};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
    pub flags: OpenFileFlags,
    pub fdflags: Fdflags,
    /// Mode of a created file. Defaults to [`FileMode::DEFAULT_FILE`].
    pub mode: Option<FileMode>,
    /// Requested rights. `None` requests everything the parent allows.
    pub rights: Option<FdRightsBlock>,
}

impl OpenInput {
    pub fn new(path: VirtualPath, base_directory: BaseDirectory, flags: OpenFileFlags) -> Self {
        Self {
            path,
            base_directory,
            flags,
            fdflags: Fdflags::empty(),
            mode: None,
            rights: None,
        }
    }

    pub fn with_rights(mut self, rights: FdRightsBlock) -> Self {
        self.rights = Some(rights);
        self
    }

    pub fn with_fdflags(mut self, fdflags: Fdflags) -> Self {
        self.fdflags = fdflags;
        self
    }

    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
    pub mode: FileMode,
    /// When `false` an existing directory is not an error.
    pub fail_if_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInput {
    pub old_base_directory: BaseDirectory,
    pub old_path: VirtualPath,
    pub new_base_directory: BaseDirectory,
    pub new_path: VirtualPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkFileInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkDirectoryInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkInput {
    /// Stored verbatim as the link content.
    pub target: String,
    pub new_path: VirtualPath,
    pub new_base_directory: BaseDirectory,
    /// Allows absolute targets. They are still never followed by the
    /// sandboxed resolver.
    pub allow_absolute_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadlinkInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardlinkInput {
    pub old_base_directory: BaseDirectory,
    pub old_path: VirtualPath,
    pub new_base_directory: BaseDirectory,
    pub new_path: VirtualPath,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTimestampInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
    pub follow_symlinks: bool,
    /// `None` leaves the access time unchanged.
    pub atime: Option<Timespec>,
    /// `None` leaves the modification time unchanged.
    pub mtime: Option<Timespec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAccessInput {
    pub path: VirtualPath,
    pub base_directory: BaseDirectory,
    /// Empty checks existence only.
    pub mode: FileAccessibilityCheck,
    pub follow_symlinks: bool,
    pub use_effective_ids: bool,
}
