//! Open resources stored in the descriptor table.

use std::fmt;

use wasi_hostfs_types::{
    Advice, Errno, Eventtype, FdRightsBlock, Fdflags, Filestat, Filetype, Timespec, Whence,
};

use crate::error::{
    CloseError, FadviseError, FallocateError, FdAttributesError, FileSystemError, ReadDirError,
    ReadError, SeekError, SetFdFlagsError, SetTimestampError, StatError, SyncError, TruncateError,
    WriteError, operation_error, ErrorKind,
};
use crate::path::RealPath;
use crate::readdir::DirEntrySequence;

/// Upper bound of the buffer a single read allocates. Longer reads are
/// short reads.
pub const MAX_READ_LEN: usize = 16 * 1024 * 1024;

/// Where a read or write starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWriteStrategy {
    /// At the descriptor position, which is advanced by the transfer.
    CurrentPosition,
    /// At an explicit offset; the descriptor position is left unchanged.
    Position(u64),
}

/// Answer of a non-blocking readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { bytes_available: u64 },
    NotReady,
    Failed(Errno),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdAttributes {
    pub file_type: Filetype,
    pub flags: Fdflags,
    pub rights: FdRightsBlock,
}

/// Host and guest names of an open directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryInfo {
    pub real_path: RealPath,
    /// Path the guest used to open the directory, or the preopen alias.
    pub virtual_path: String,
    pub is_preopened: bool,
}

/// Operations on an open handle.
///
/// The defaults reject the operation with `BADF`; each resource overrides
/// what it supports.
pub trait FdResource: Send + Sync + fmt::Debug {
    fn rights(&self) -> FdRightsBlock;

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError>;

    fn stat(&self) -> Result<Filestat, StatError>;

    fn close(&self) -> Result<(), CloseError>;

    /// Set for directory resources only.
    fn directory(&self) -> Option<&DirectoryInfo> {
        None
    }

    /// Fails unless the host path of this directory still names the
    /// directory the handle was opened on.
    fn verify_directory_path(&self) -> Result<(), FileSystemError> {
        Ok(())
    }

    /// A new native handle to this directory.
    #[cfg(unix)]
    fn directory_handle(&self) -> Option<std::io::Result<std::os::fd::OwnedFd>> {
        None
    }

    fn seek(&self, _offset: i64, _whence: Whence) -> Result<u64, SeekError> {
        Err(unsupported("seek"))
    }

    fn read(&self, _len: usize, _strategy: ReadWriteStrategy) -> Result<Vec<u8>, ReadError> {
        Err(unsupported("read"))
    }

    fn write(&self, _buffers: &[Vec<u8>], _strategy: ReadWriteStrategy) -> Result<u64, WriteError> {
        Err(unsupported("write"))
    }

    fn sync(&self, _sync_metadata: bool) -> Result<(), SyncError> {
        Err(unsupported("sync"))
    }

    fn fallocate(&self, _offset: u64, _len: u64) -> Result<(), FallocateError> {
        Err(unsupported("fallocate"))
    }

    fn truncate(&self, _len: u64) -> Result<(), TruncateError> {
        Err(unsupported("truncate"))
    }

    fn fadvise(&self, _offset: u64, _len: u64, _advice: Advice) -> Result<(), FadviseError> {
        Err(unsupported("fadvise"))
    }

    fn set_timestamp(
        &self,
        _atime: Option<Timespec>,
        _mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        Err(unsupported("set timestamp"))
    }

    fn set_fd_flags(&self, _flags: Fdflags) -> Result<(), SetFdFlagsError> {
        Err(unsupported("set flags"))
    }

    fn read_dir(&self, _start_cookie: u64) -> Result<DirEntrySequence, ReadDirError> {
        Err(operation_error(
            ErrorKind::NotDirectory,
            "descriptor is not a directory",
        ))
    }

    /// Non-blocking readiness for `fd_read`/`fd_write` subscriptions.
    fn poll_readiness(&self, _event: Eventtype) -> Readiness {
        Readiness::Ready { bytes_available: 0 }
    }
}

fn unsupported<E: crate::error::FileSystemOperationError>(operation: &str) -> E {
    operation_error(
        ErrorKind::BadFileDescriptor,
        format!("Can not {operation} on this descriptor"),
    )
}
