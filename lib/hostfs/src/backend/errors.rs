//! Translation of native failures into [`ErrorKind`]s.
//!
//! The same `errno` means different things to different calls (`EEXIST`
//! from `rmdir` is a non-empty directory), so every call family has its own
//! table. Codes missing from a table become `InvalidArgument`.

use std::fmt;
use std::io;

use crate::error::{ErrorKind, FileSystemOperationError};

/// Native call families with their own error tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Open,
    Close,
    ReadWrite,
    Seek,
    Stat,
    Mkdir,
    Rename,
    Unlink,
    UnlinkDirectory,
    Symlink,
    Readlink,
    Hardlink,
    SetTimestamp,
    CheckAccess,
    Fallocate,
    Truncate,
    Sync,
    Fcntl,
    ReadDir,
}

/// Converts `err` into the error of the calling operation.
pub(crate) fn io_error<E: FileSystemOperationError>(
    family: Family,
    context: impl fmt::Display,
    err: io::Error,
) -> E {
    E::from_kind(error_kind(family, &err), format!("{context}: {err}"))
}

pub(crate) fn error_kind(family: Family, err: &io::Error) -> ErrorKind {
    match err.raw_os_error() {
        Some(code) => native_kind(family, code),
        None => portable_kind(err.kind()),
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn native_kind(family: Family, code: i32) -> ErrorKind {
            posix::kind(family, code)
        }
    } else if #[cfg(windows)] {
        fn native_kind(family: Family, code: i32) -> ErrorKind {
            super::windows::kind(family, code as u32)
        }
    } else {
        fn native_kind(_family: Family, code: i32) -> ErrorKind {
            portable_kind(io::Error::from_raw_os_error(code).kind())
        }
    }
}

/// Fallback for errors without an OS code.
pub(crate) fn portable_kind(kind: io::ErrorKind) -> ErrorKind {
    match kind {
        io::ErrorKind::NotFound => ErrorKind::NoEntry,
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        io::ErrorKind::AlreadyExists => ErrorKind::Exists,
        io::ErrorKind::WouldBlock => ErrorKind::Again,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorKind::InvalidArgument,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        io::ErrorKind::Unsupported => ErrorKind::NotSupported,
        io::ErrorKind::BrokenPipe => ErrorKind::Pipe,
        io::ErrorKind::NotADirectory => ErrorKind::NotDirectory,
        io::ErrorKind::IsADirectory => ErrorKind::PathIsDirectory,
        io::ErrorKind::DirectoryNotEmpty => ErrorKind::DirectoryNotEmpty,
        io::ErrorKind::ReadOnlyFilesystem => ErrorKind::ReadOnlyFileSystem,
        io::ErrorKind::StorageFull => ErrorKind::NoSpace,
        io::ErrorKind::FileTooLarge => ErrorKind::FileTooBig,
        io::ErrorKind::ResourceBusy => ErrorKind::Busy,
        io::ErrorKind::InvalidFilename => ErrorKind::NameTooLong,
        io::ErrorKind::TooManyLinks => ErrorKind::Mlink,
        io::ErrorKind::CrossesDevices => ErrorKind::NotSupported,
        _ => ErrorKind::IoError,
    }
}

#[cfg(unix)]
mod posix {
    use super::Family;
    use crate::error::ErrorKind;

    macro_rules! errno_table {
        ($name:ident { $($errno:ident => $kind:ident),+ $(,)? }) => {
            #[allow(unreachable_patterns)]
            fn $name(code: i32) -> ErrorKind {
                match code {
                    $(libc::$errno => ErrorKind::$kind,)+
                    _ => ErrorKind::InvalidArgument,
                }
            }
        };
    }

    pub(super) fn kind(family: Family, code: i32) -> ErrorKind {
        match family {
            Family::Open => open(code),
            Family::Close => close(code),
            Family::ReadWrite => read_write(code),
            Family::Seek => seek(code),
            Family::Stat => stat(code),
            Family::Mkdir => mkdir(code),
            Family::Rename => rename(code),
            Family::Unlink => unlink(code),
            Family::UnlinkDirectory => unlink_directory(code),
            Family::Symlink => symlink(code),
            Family::Readlink => readlink(code),
            Family::Hardlink => hardlink(code),
            Family::SetTimestamp => set_timestamp(code),
            Family::CheckAccess => check_access(code),
            Family::Fallocate => fallocate(code),
            Family::Truncate => truncate(code),
            Family::Sync => sync(code),
            Family::Fcntl => fcntl(code),
            Family::ReadDir => read_dir(code),
        }
    }

    errno_table!(open {
        EACCES => AccessDenied,
        EAGAIN => Again,
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EEXIST => Exists,
        EFBIG => FileTooBig,
        EINTR => Interrupted,
        EINVAL => InvalidArgument,
        EISDIR => PathIsDirectory,
        ELOOP => TooManySymbolicLinks,
        EMFILE => Mfile,
        ENAMETOOLONG => NameTooLong,
        ENFILE => Nfile,
        ENOENT => NoEntry,
        ENOSPC => NoSpace,
        ENOTDIR => NotDirectory,
        ENXIO => Nxio,
        EOVERFLOW => Overflow,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        ETXTBSY => TextFileBusy,
        EXDEV => NotCapable,
    });

    errno_table!(close {
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EINTR => Interrupted,
        EIO => IoError,
        ENOSPC => NoSpace,
    });

    errno_table!(read_write {
        EAGAIN => Again,
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EFBIG => FileTooBig,
        EINTR => Interrupted,
        EINVAL => InvalidArgument,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        ENOSPC => NoSpace,
        ENXIO => Nxio,
        EOVERFLOW => Overflow,
        EPERM => PermissionDenied,
        EPIPE => Pipe,
    });

    errno_table!(seek {
        EBADF => BadFileDescriptor,
        EINVAL => InvalidArgument,
        ENXIO => Nxio,
        EOVERFLOW => Overflow,
        ESPIPE => Pipe,
    });

    errno_table!(stat {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
        EOVERFLOW => Overflow,
    });

    errno_table!(mkdir {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EEXIST => Exists,
        EINVAL => InvalidArgument,
        ELOOP => TooManySymbolicLinks,
        EMLINK => Mlink,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOSPC => NoSpace,
        ENOTDIR => NotDirectory,
        EPERM => AccessDenied,
        EROFS => ReadOnlyFileSystem,
    });

    errno_table!(rename {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EBUSY => Busy,
        EDQUOT => DiskQuota,
        EEXIST => DirectoryNotEmpty,
        EINVAL => InvalidArgument,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        ELOOP => TooManySymbolicLinks,
        EMLINK => Mlink,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOSPC => NoSpace,
        ENOTDIR => NotDirectory,
        ENOTEMPTY => DirectoryNotEmpty,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        EXDEV => NotSupported,
    });

    errno_table!(unlink {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EBUSY => Busy,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        ETXTBSY => TextFileBusy,
    });

    errno_table!(unlink_directory {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EBUSY => Busy,
        EEXIST => DirectoryNotEmpty,
        EINVAL => InvalidArgument,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
        ENOTEMPTY => DirectoryNotEmpty,
        EPERM => PermissionDenied,
        EROFS => InvalidArgument,
    });

    errno_table!(symlink {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EEXIST => Exists,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOSPC => NoSpace,
        ENOTDIR => NotDirectory,
        EOPNOTSUPP => NotSupported,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
    });

    errno_table!(readlink {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EINVAL => InvalidArgument,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
    });

    errno_table!(hardlink {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EEXIST => Exists,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        EMLINK => Mlink,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOSPC => NoSpace,
        ENOTDIR => NotDirectory,
        EOPNOTSUPP => NotSupported,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        EXDEV => NotSupported,
    });

    errno_table!(set_timestamp {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EINVAL => InvalidArgument,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOTDIR => NotDirectory,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
    });

    errno_table!(check_access {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EINVAL => InvalidArgument,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        ENAMETOOLONG => NameTooLong,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        ETXTBSY => TextFileBusy,
    });

    errno_table!(fallocate {
        EBADF => BadFileDescriptor,
        EFBIG => FileTooBig,
        EINTR => Interrupted,
        EINVAL => InvalidArgument,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        ENODEV => NotSupported,
        ENOSPC => NoSpace,
        ENOSYS => NotSupported,
        EOPNOTSUPP => NotSupported,
        EPERM => PermissionDenied,
        ESPIPE => Pipe,
        ETXTBSY => TextFileBusy,
    });

    errno_table!(truncate {
        EBADF => BadFileDescriptor,
        EFBIG => FileTooBig,
        EINTR => Interrupted,
        EINVAL => InvalidArgument,
        EIO => IoError,
        EISDIR => PathIsDirectory,
        EPERM => PermissionDenied,
        EROFS => ReadOnlyFileSystem,
        ETXTBSY => TextFileBusy,
    });

    errno_table!(sync {
        EBADF => BadFileDescriptor,
        EDQUOT => DiskQuota,
        EINTR => Interrupted,
        EINVAL => InvalidArgument,
        EIO => IoError,
        ENOSPC => NoSpace,
        EROFS => ReadOnlyFileSystem,
    });

    errno_table!(fcntl {
        EBADF => BadFileDescriptor,
        EINVAL => InvalidArgument,
        EPERM => NotSupported,
    });

    errno_table!(read_dir {
        EACCES => AccessDenied,
        EBADF => BadFileDescriptor,
        EIO => IoError,
        ELOOP => TooManySymbolicLinks,
        EMFILE => IoError,
        ENAMETOOLONG => NameTooLong,
        ENFILE => IoError,
        ENOENT => NoEntry,
        ENOMEM => IoError,
        ENOTDIR => NotDirectory,
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn eexist_depends_on_the_call() {
        let err = || io::Error::from_raw_os_error(libc::EEXIST);
        assert_eq!(error_kind(Family::Mkdir, &err()), ErrorKind::Exists);
        assert_eq!(
            error_kind(Family::UnlinkDirectory, &err()),
            ErrorKind::DirectoryNotEmpty
        );
    }

    #[test]
    fn eperm_depends_on_the_call() {
        let err = || io::Error::from_raw_os_error(libc::EPERM);
        assert_eq!(error_kind(Family::Mkdir, &err()), ErrorKind::AccessDenied);
        assert_eq!(
            error_kind(Family::UnlinkDirectory, &err()),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn unknown_codes_are_invalid_argument() {
        let err = io::Error::from_raw_os_error(libc::ECHILD);
        assert_eq!(error_kind(Family::Open, &err), ErrorKind::InvalidArgument);
        assert_eq!(
            error_kind(Family::UnlinkDirectory, &io::Error::from_raw_os_error(libc::EROFS)),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn errors_without_code_use_their_kind() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(error_kind(Family::Stat, &err), ErrorKind::NoEntry);
    }
}
