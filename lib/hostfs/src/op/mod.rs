//! Operation tags and their typed inputs.
//!
//! Each operation is a zero-sized type implementing [`FileSystemOperation`];
//! [`OperationTag`] is the dispatch key of the handler table.

use std::fmt;

use crate::error::{
    CheckAccessError, CloseError, FadviseError, FallocateError, FdAttributesError, GetCwdError,
    HardlinkError, MkdirError, FileSystemOperationError, OpenError, PollError, PrestatError,
    ReadDirError, ReadError, ReadLinkError, RenameError, RenumberError, SeekError,
    SetFdFlagsError, SetTimestampError, StatError, SymlinkError, SyncError, TruncateError,
    UnlinkDirectoryError, UnlinkError, WriteError,
};
use crate::readdir::DirEntrySequence;
use crate::resource::FdAttributes;

mod fd;
mod path;
mod poll;

pub use fd::*;
pub use path::*;
pub use poll::*;

/// A kind of filesystem operation with its input, output and error types.
pub trait FileSystemOperation: Send + Sync + 'static {
    type Input: fmt::Debug + Send + 'static;
    type Output: fmt::Debug + Send + 'static;
    type Error: FileSystemOperationError + fmt::Debug;

    const TAG: OperationTag;
}

macro_rules! operations {
    (
        $(
            $(#[$meta:meta])*
            $name:ident($input:ty) -> Result<$output:ty, $error:ty>, $tag_name:literal;
        )+
    ) => {
        /// Dispatch key of an operation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OperationTag {
            $($name,)+
        }

        impl OperationTag {
            pub const ALL: &'static [OperationTag] = &[$(OperationTag::$name,)+];

            /// Short name used in log messages.
            pub fn name(self) -> &'static str {
                match self {
                    $(OperationTag::$name => $tag_name,)+
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl FileSystemOperation for $name {
                type Input = $input;
                type Output = $output;
                type Error = $error;

                const TAG: OperationTag = OperationTag::$name;
            }
        )+
    };
}

operations! {
    /// Opens a file or directory relative to a base directory.
    Open(OpenInput) -> Result<wasi_hostfs_types::Fd, OpenError>, "open";
    Close(CloseInput) -> Result<(), CloseError>, "close";
    ReadFd(ReadInput) -> Result<Vec<u8>, ReadError>, "read";
    WriteFd(WriteInput) -> Result<u64, WriteError>, "write";
    SeekFd(SeekInput) -> Result<u64, SeekError>, "seek";
    Stat(StatInput) -> Result<wasi_hostfs_types::Filestat, StatError>, "stat";
    StatFd(StatFdInput) -> Result<wasi_hostfs_types::Filestat, StatError>, "statfd";
    Mkdir(MkdirInput) -> Result<(), MkdirError>, "mkdir";
    Rename(RenameInput) -> Result<(), RenameError>, "rename";
    UnlinkFile(UnlinkFileInput) -> Result<(), UnlinkError>, "unlinkfile";
    UnlinkDirectory(UnlinkDirectoryInput) -> Result<(), UnlinkDirectoryError>, "unlinkdirectory";
    Symlink(SymlinkInput) -> Result<(), SymlinkError>, "symlink";
    Readlink(ReadlinkInput) -> Result<String, ReadLinkError>, "readlink";
    Hardlink(HardlinkInput) -> Result<(), HardlinkError>, "hardlink";
    SetTimestamp(SetTimestampInput) -> Result<(), SetTimestampError>, "settimestamp";
    SetTimestampFd(SetTimestampFdInput) -> Result<(), SetTimestampError>, "settimestampfd";
    CheckAccess(CheckAccessInput) -> Result<(), CheckAccessError>, "checkaccess";
    Fallocate(FallocateInput) -> Result<(), FallocateError>, "fallocate";
    TruncateFd(TruncateInput) -> Result<(), TruncateError>, "truncate";
    SyncFd(SyncInput) -> Result<(), SyncError>, "sync";
    FadviseFd(FadviseInput) -> Result<(), FadviseError>, "fadvise";
    SetFdFlags(SetFdFlagsInput) -> Result<(), SetFdFlagsError>, "setfdflags";
    GetFdAttributes(FdAttributesInput) -> Result<FdAttributes, FdAttributesError>, "fdattributes";
    PrestatFd(PrestatInput) -> Result<Prestat, PrestatError>, "prestat";
    Renumber(RenumberInput) -> Result<(), RenumberError>, "renumber";
    Poll(PollInput) -> Result<Vec<wasi_hostfs_types::Event>, PollError>, "poll";
    ReadDirFd(ReadDirInput) -> Result<DirEntrySequence, ReadDirError>, "readdir";
    GetCurrentWorkingDirectory(GetCwdInput) -> Result<String, GetCwdError>, "getcwd";
}

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
