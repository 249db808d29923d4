//! Inputs of descriptor-taking operations.

use wasi_hostfs_types::{Advice, Fd, Fdflags, Timespec, Whence};

use crate::resource::ReadWriteStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseInput {
    pub fd: Fd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInput {
    pub fd: Fd,
    /// Upper bound of the returned data.
    pub len: usize,
    pub strategy: ReadWriteStrategy,
}

#[derive(Clone, PartialEq, Eq)]
pub struct WriteInput {
    pub fd: Fd,
    /// Written in order, as by `writev(2)`.
    pub buffers: Vec<Vec<u8>>,
    pub strategy: ReadWriteStrategy,
}

impl std::fmt::Debug for WriteInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lengths: Vec<usize> = self.buffers.iter().map(Vec::len).collect();
        f.debug_struct("WriteInput")
            .field("fd", &self.fd)
            .field("buffers", &lengths)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekInput {
    pub fd: Fd,
    pub offset: i64,
    pub whence: Whence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFdInput {
    pub fd: Fd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTimestampFdInput {
    pub fd: Fd,
    pub atime: Option<Timespec>,
    pub mtime: Option<Timespec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallocateInput {
    pub fd: Fd,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateInput {
    pub fd: Fd,
    pub len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInput {
    pub fd: Fd,
    /// `fd_sync` when set, `fd_datasync` otherwise.
    pub sync_metadata: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadviseInput {
    pub fd: Fd,
    pub offset: u64,
    pub len: u64,
    pub advice: Advice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetFdFlagsInput {
    pub fd: Fd,
    pub flags: Fdflags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdAttributesInput {
    pub fd: Fd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrestatInput {
    pub fd: Fd,
}

/// A preopened directory as announced to the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prestat {
    pub virtual_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenumberInput {
    pub from: Fd,
    pub to: Fd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDirInput {
    pub fd: Fd,
    /// Cookie of the last entry already seen, `0` to start over.
    pub start_cookie: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetCwdInput;
