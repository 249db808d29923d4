//! Portable error taxonomy.
//!
//! Every operation declares a closed error enum listing the subset of
//! [`ErrorKind`] it can produce. Each variant carries a human readable
//! message and maps to exactly one [`Errno`].

use std::fmt;

use wasi_hostfs_types::Errno;

use crate::path::ResolvePathError;

/// The universe of failure causes an operation may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AccessDenied,
    Again,
    BadFileDescriptor,
    Busy,
    DiskQuota,
    DirectoryNotEmpty,
    Exists,
    FileTooBig,
    Interrupted,
    InvalidArgument,
    IoError,
    Mfile,
    Mlink,
    NameTooLong,
    Nfile,
    NoEntry,
    NoLock,
    NoSpace,
    NotCapable,
    NotDirectory,
    NotImplemented,
    NotSupported,
    Nxio,
    Overflow,
    PathIsDirectory,
    PermissionDenied,
    Pipe,
    ReadOnlyFileSystem,
    TextFileBusy,
    TooManySymbolicLinks,
}

impl ErrorKind {
    pub fn errno(self) -> Errno {
        match self {
            ErrorKind::AccessDenied => Errno::Access,
            ErrorKind::Again => Errno::Again,
            ErrorKind::BadFileDescriptor => Errno::Badf,
            ErrorKind::Busy => Errno::Busy,
            ErrorKind::DiskQuota => Errno::Dquot,
            ErrorKind::DirectoryNotEmpty => Errno::Notempty,
            ErrorKind::Exists => Errno::Exist,
            ErrorKind::FileTooBig => Errno::Fbig,
            ErrorKind::Interrupted => Errno::Intr,
            ErrorKind::InvalidArgument => Errno::Inval,
            ErrorKind::IoError => Errno::Io,
            ErrorKind::Mfile => Errno::Mfile,
            ErrorKind::Mlink => Errno::Mlink,
            ErrorKind::NameTooLong => Errno::Nametoolong,
            ErrorKind::Nfile => Errno::Nfile,
            ErrorKind::NoEntry => Errno::Noent,
            ErrorKind::NoLock => Errno::Nolck,
            ErrorKind::NoSpace => Errno::Nospc,
            ErrorKind::NotCapable => Errno::Notcapable,
            ErrorKind::NotDirectory => Errno::Notdir,
            ErrorKind::NotImplemented => Errno::Notsup,
            ErrorKind::NotSupported => Errno::Notsup,
            ErrorKind::Nxio => Errno::Nxio,
            ErrorKind::Overflow => Errno::Overflow,
            ErrorKind::PathIsDirectory => Errno::Isdir,
            ErrorKind::PermissionDenied => Errno::Perm,
            ErrorKind::Pipe => Errno::Pipe,
            ErrorKind::ReadOnlyFileSystem => Errno::Rofs,
            ErrorKind::TextFileBusy => Errno::Txtbsy,
            ErrorKind::TooManySymbolicLinks => Errno::Loop,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Behaviour shared by every per-operation error enum.
pub trait FileSystemOperationError: std::error::Error + Send + Sync + 'static {
    fn kind(&self) -> ErrorKind;

    fn message(&self) -> &str;

    fn errno(&self) -> Errno {
        self.kind().errno()
    }

    /// Builds the variant matching `kind`. Kinds outside the operation's set
    /// become `InvalidArgument`.
    fn from_kind(kind: ErrorKind, message: String) -> Self
    where
        Self: Sized;
}

/// An error of any operation, without the per-operation restriction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FileSystemError {
    kind: ErrorKind,
    message: String,
}

impl FileSystemError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Narrows the error to the set of operation `E`.
    pub fn into_operation_error<E: FileSystemOperationError>(self) -> E {
        E::from_kind(self.kind, self.message)
    }
}

impl FileSystemOperationError for FileSystemError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn from_kind(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl From<ResolvePathError> for FileSystemError {
    fn from(err: ResolvePathError) -> Self {
        FileSystemError::new(err.error_kind(), err.to_string())
    }
}

macro_rules! operation_error {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                #[error("{0}")]
                $variant(String),
            )+
            #[error("{0}")]
            NotImplemented(String),
        }

        impl $crate::error::FileSystemOperationError for $name {
            fn kind(&self) -> $crate::error::ErrorKind {
                match self {
                    $($name::$variant(_) => $crate::error::ErrorKind::$variant,)+
                    $name::NotImplemented(_) => $crate::error::ErrorKind::NotImplemented,
                }
            }

            fn message(&self) -> &str {
                match self {
                    $($name::$variant(message) => message,)+
                    $name::NotImplemented(message) => message,
                }
            }

            #[allow(unreachable_patterns)]
            fn from_kind(kind: $crate::error::ErrorKind, message: String) -> Self {
                match kind {
                    $($crate::error::ErrorKind::$variant => $name::$variant(message),)+
                    $crate::error::ErrorKind::NotImplemented => $name::NotImplemented(message),
                    _ => $name::InvalidArgument(message),
                }
            }
        }

        impl From<$name> for $crate::error::FileSystemError {
            fn from(err: $name) -> Self {
                use $crate::error::FileSystemOperationError;
                $crate::error::FileSystemError::new(err.kind(), err.message())
            }
        }

        impl From<$crate::path::ResolvePathError> for $name {
            fn from(err: $crate::path::ResolvePathError) -> Self {
                use $crate::error::FileSystemOperationError;
                $name::from_kind(err.error_kind(), err.to_string())
            }
        }

        impl From<$crate::error::FileSystemError> for $name {
            fn from(err: $crate::error::FileSystemError) -> Self {
                err.into_operation_error()
            }
        }
    };
}

operation_error! {
    /// Errors of [`Open`](crate::op::Open).
    OpenError {
        AccessDenied, Again, BadFileDescriptor, DiskQuota, Exists, FileTooBig,
        Interrupted, InvalidArgument, IoError, Mfile, NameTooLong, Nfile, NoEntry,
        NoSpace, NotCapable, NotDirectory, NotSupported, Nxio, Overflow,
        PathIsDirectory, PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
        TooManySymbolicLinks,
    }
}

operation_error! {
    /// Errors of [`Close`](crate::op::Close).
    CloseError {
        BadFileDescriptor, DiskQuota, Interrupted, InvalidArgument, IoError, NoSpace,
    }
}

operation_error! {
    ReadError {
        Again, BadFileDescriptor, Interrupted, InvalidArgument, IoError, NotCapable,
        Nxio, Overflow, PathIsDirectory,
    }
}

operation_error! {
    WriteError {
        Again, BadFileDescriptor, DiskQuota, FileTooBig, Interrupted, InvalidArgument,
        IoError, NoSpace, NotCapable, Nxio, PathIsDirectory, PermissionDenied, Pipe,
    }
}

operation_error! {
    SeekError {
        BadFileDescriptor, InvalidArgument, NotCapable, Nxio, Overflow, Pipe,
    }
}

operation_error! {
    /// Errors of [`Stat`](crate::op::Stat) and [`StatFd`](crate::op::StatFd).
    StatError {
        AccessDenied, BadFileDescriptor, InvalidArgument, IoError, NameTooLong, NoEntry,
        NotCapable, NotDirectory, Overflow, TooManySymbolicLinks,
    }
}

operation_error! {
    MkdirError {
        AccessDenied, BadFileDescriptor, DiskQuota, Exists, InvalidArgument, IoError,
        Mlink, NameTooLong, NoEntry, NoSpace, NotCapable, NotDirectory, PermissionDenied,
        ReadOnlyFileSystem, TooManySymbolicLinks,
    }
}

operation_error! {
    RenameError {
        AccessDenied, BadFileDescriptor, Busy, DiskQuota, DirectoryNotEmpty, Exists,
        InvalidArgument, IoError, Mlink, NameTooLong, NoEntry, NoSpace, NotCapable,
        NotDirectory, NotSupported, PathIsDirectory, PermissionDenied,
        ReadOnlyFileSystem, TooManySymbolicLinks,
    }
}

operation_error! {
    /// Errors of [`UnlinkFile`](crate::op::UnlinkFile).
    UnlinkError {
        AccessDenied, BadFileDescriptor, Busy, InvalidArgument, IoError, NameTooLong,
        NoEntry, NotCapable, NotDirectory, PathIsDirectory, PermissionDenied,
        ReadOnlyFileSystem, TextFileBusy, TooManySymbolicLinks,
    }
}

operation_error! {
    UnlinkDirectoryError {
        AccessDenied, BadFileDescriptor, Busy, DirectoryNotEmpty, InvalidArgument,
        IoError, NameTooLong, NoEntry, NotCapable, NotDirectory, PathIsDirectory,
        PermissionDenied, ReadOnlyFileSystem, TooManySymbolicLinks,
    }
}

operation_error! {
    SymlinkError {
        AccessDenied, BadFileDescriptor, DiskQuota, Exists, InvalidArgument, IoError,
        NameTooLong, NoEntry, NoSpace, NotCapable, NotDirectory, NotSupported,
        PermissionDenied, ReadOnlyFileSystem, TooManySymbolicLinks,
    }
}

operation_error! {
    ReadLinkError {
        AccessDenied, BadFileDescriptor, InvalidArgument, IoError, NameTooLong, NoEntry,
        NotCapable, NotDirectory, TooManySymbolicLinks,
    }
}

operation_error! {
    HardlinkError {
        AccessDenied, BadFileDescriptor, DiskQuota, Exists, InvalidArgument, IoError,
        Mlink, NameTooLong, NoEntry, NoSpace, NotCapable, NotDirectory, NotSupported,
        PermissionDenied, ReadOnlyFileSystem, TooManySymbolicLinks,
    }
}

operation_error! {
    SetTimestampError {
        AccessDenied, BadFileDescriptor, InvalidArgument, IoError, NameTooLong, NoEntry,
        NotCapable, NotDirectory, PermissionDenied, ReadOnlyFileSystem,
        TooManySymbolicLinks,
    }
}

operation_error! {
    CheckAccessError {
        AccessDenied, BadFileDescriptor, InvalidArgument, IoError, NameTooLong, NoEntry,
        NotCapable, NotDirectory, PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
        TooManySymbolicLinks,
    }
}

operation_error! {
    FallocateError {
        BadFileDescriptor, FileTooBig, Interrupted, InvalidArgument, IoError, NoSpace,
        NotCapable, NotSupported, PathIsDirectory, PermissionDenied, Pipe, TextFileBusy,
    }
}

operation_error! {
    TruncateError {
        BadFileDescriptor, FileTooBig, Interrupted, InvalidArgument, IoError, NotCapable,
        PathIsDirectory, PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
    }
}

operation_error! {
    SyncError {
        BadFileDescriptor, DiskQuota, Interrupted, InvalidArgument, IoError, NoSpace,
        NotCapable, ReadOnlyFileSystem,
    }
}

operation_error! {
    SetFdFlagsError {
        BadFileDescriptor, InvalidArgument, IoError, NotCapable, NotSupported,
    }
}

operation_error! {
    FadviseError {
        BadFileDescriptor, InvalidArgument, NotCapable, NotSupported, Pipe,
    }
}

operation_error! {
    FdAttributesError {
        BadFileDescriptor, InvalidArgument, IoError,
    }
}

operation_error! {
    PrestatError {
        BadFileDescriptor, InvalidArgument,
    }
}

operation_error! {
    RenumberError {
        BadFileDescriptor, InvalidArgument, NotSupported,
    }
}

operation_error! {
    PollError {
        BadFileDescriptor, Interrupted, InvalidArgument, NotSupported,
    }
}

operation_error! {
    ReadDirError {
        AccessDenied, BadFileDescriptor, InvalidArgument, IoError, NameTooLong, NoEntry,
        NotCapable, NotDirectory, TooManySymbolicLinks,
    }
}

operation_error! {
    GetCwdError {
        AccessDenied, InvalidArgument, IoError, NameTooLong, NoEntry,
    }
}

/// Builds the error of the operation for a failure with `kind`.
pub(crate) fn operation_error<E: FileSystemOperationError>(
    kind: ErrorKind,
    message: impl Into<String>,
) -> E {
    E::from_kind(kind, message.into())
}

pub(crate) fn fd_not_open<E: FileSystemOperationError>(fd: wasi_hostfs_types::Fd) -> E {
    operation_error(ErrorKind::BadFileDescriptor, format!("File descriptor {fd} is not open"))
}
