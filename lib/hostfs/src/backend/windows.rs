//! Win32 error codes.

use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS, ERROR_CANT_RESOLVE_FILENAME, ERROR_DIR_NOT_EMPTY,
    ERROR_DIRECTORY, ERROR_DISK_FULL, ERROR_FILE_EXISTS, ERROR_FILE_NOT_FOUND,
    ERROR_FILENAME_EXCED_RANGE, ERROR_HANDLE_DISK_FULL, ERROR_INVALID_HANDLE, ERROR_INVALID_NAME,
    ERROR_LOCK_VIOLATION, ERROR_NOT_SUPPORTED, ERROR_PATH_NOT_FOUND, ERROR_PRIVILEGE_NOT_HELD,
    ERROR_SHARING_VIOLATION, ERROR_TOO_MANY_OPEN_FILES, ERROR_WRITE_PROTECT,
};

use super::errors::Family;
use crate::error::ErrorKind;

pub(super) fn kind(family: Family, code: u32) -> ErrorKind {
    match code {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => ErrorKind::NoEntry,
        ERROR_ACCESS_DENIED => ErrorKind::AccessDenied,
        ERROR_ALREADY_EXISTS if family == Family::UnlinkDirectory => ErrorKind::DirectoryNotEmpty,
        ERROR_ALREADY_EXISTS | ERROR_FILE_EXISTS => ErrorKind::Exists,
        ERROR_DIR_NOT_EMPTY => ErrorKind::DirectoryNotEmpty,
        ERROR_DIRECTORY => ErrorKind::NotDirectory,
        ERROR_INVALID_NAME => ErrorKind::NoEntry,
        ERROR_FILENAME_EXCED_RANGE => ErrorKind::NameTooLong,
        ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION => ErrorKind::Busy,
        ERROR_DISK_FULL | ERROR_HANDLE_DISK_FULL => ErrorKind::NoSpace,
        ERROR_WRITE_PROTECT => ErrorKind::ReadOnlyFileSystem,
        ERROR_NOT_SUPPORTED => ErrorKind::NotSupported,
        ERROR_INVALID_HANDLE => ErrorKind::BadFileDescriptor,
        ERROR_TOO_MANY_OPEN_FILES => ErrorKind::Mfile,
        ERROR_CANT_RESOLVE_FILENAME => ErrorKind::TooManySymbolicLinks,
        ERROR_PRIVILEGE_NOT_HELD => ErrorKind::PermissionDenied,
        _ => ErrorKind::InvalidArgument,
    }
}
