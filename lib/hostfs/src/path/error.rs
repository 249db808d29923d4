use thiserror::Error;

use crate::error::ErrorKind;

/// Failure to construct a path value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    EmptyPath,
    #[error("invalid path: {0}")]
    InvalidPathFormat(String),
}

/// Failure to turn a guest path into a host path inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolvePathError {
    #[error("path is empty")]
    EmptyPath,
    #[error("invalid path: {0}")]
    InvalidPathFormat(String),
    /// An absolute path, or an absolute symlink target, in sandboxed mode.
    #[error("absolute path `{0}` is not allowed")]
    AbsolutePath(String),
    #[error("path `{0}` is outside of the root path")]
    PathOutsideOfRootPath(String),
    #[error("relative path `{0}` requires a base directory")]
    NoBaseDirectory(String),
    #[error("{0}")]
    NotDirectory(String),
    #[error("file descriptor {0} is not open")]
    FileDescriptorNotOpen(wasi_hostfs_types::Fd),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("too many symbolic links while resolving `{0}`")]
    TooManySymbolicLinks(String),
    #[error("path `{0}` has too many components")]
    NameTooLong(String),
    /// A host lookup failed while walking the path.
    #[error("{message}")]
    Other { kind: ErrorKind, message: String },
}

impl ResolvePathError {
    /// Kind reported to operations that failed to resolve their path.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ResolvePathError::EmptyPath => ErrorKind::InvalidArgument,
            ResolvePathError::InvalidPathFormat(_) => ErrorKind::InvalidArgument,
            ResolvePathError::AbsolutePath(_) => ErrorKind::NotCapable,
            ResolvePathError::PathOutsideOfRootPath(_) => ErrorKind::NotCapable,
            ResolvePathError::NoBaseDirectory(_) => ErrorKind::NotCapable,
            ResolvePathError::NotDirectory(_) => ErrorKind::NotDirectory,
            ResolvePathError::FileDescriptorNotOpen(_) => ErrorKind::BadFileDescriptor,
            ResolvePathError::IoError(_) => ErrorKind::BadFileDescriptor,
            ResolvePathError::TooManySymbolicLinks(_) => ErrorKind::TooManySymbolicLinks,
            ResolvePathError::NameTooLong(_) => ErrorKind::NameTooLong,
            ResolvePathError::Other { kind, .. } => *kind,
        }
    }
}

impl From<PathError> for ResolvePathError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::EmptyPath => ResolvePathError::EmptyPath,
            PathError::InvalidPathFormat(message) => ResolvePathError::InvalidPathFormat(message),
        }
    }
}
