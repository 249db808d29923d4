#![allow(dead_code)]

use std::io;
use std::path::Path;

use tempfile::TempDir;
use wasi_hostfs::error::OpenError;
use wasi_hostfs::op::{Open, OpenInput};
use wasi_hostfs::{
    BackendKind, BaseDirectory, FileSystemBuilder, HostFileSystem, LoggingLevel,
    StandardInputOutput, VirtualPath,
};
use wasi_hostfs_types::{FIRST_PREOPEN_FD, Fd, FdRightsBlock, OpenFileFlags};

/// Handle of the only preopen of a [`Fixture`].
pub const ROOT: Fd = FIRST_PREOPEN_FD;

pub const ROOT_ALIAS: &str = "/sandbox";

/// Every backend of the current platform.
pub fn backends() -> Vec<BackendKind> {
    [BackendKind::Std, BackendKind::Posix]
        .into_iter()
        .filter(|backend| backend.is_available())
        .collect()
}

pub fn quiet_stdio() -> StandardInputOutput {
    StandardInputOutput::new(io::empty(), io::sink(), io::sink())
}

/// A temporary directory preopened as [`ROOT`].
pub struct Fixture {
    pub root: TempDir,
    pub fs: HostFileSystem,
}

impl Fixture {
    pub fn new(backend: BackendKind) -> Self {
        Self::with_builder(backend, |builder| builder)
    }

    pub fn with_builder(
        backend: BackendKind,
        configure: impl FnOnce(FileSystemBuilder) -> FileSystemBuilder,
    ) -> Self {
        let root = tempfile::tempdir().expect("temporary directory");
        let builder = FileSystemBuilder::new()
            .backend(backend)
            .stdio(quiet_stdio())
            .logging(LoggingLevel::Verbose)
            .preopen(root.path(), ROOT_ALIAS);
        let fs = configure(builder).build().expect("filesystem");
        Self { root, fs }
    }

    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.root.path().join(relative)
    }

    pub fn mkdir(&self, relative: &str) {
        std::fs::create_dir_all(self.path(relative)).expect("create directory");
    }

    pub fn write(&self, relative: &str, contents: &[u8]) {
        std::fs::write(self.path(relative), contents).expect("write file");
    }

    pub fn read(&self, relative: &str) -> Vec<u8> {
        std::fs::read(self.path(relative)).expect("read file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        Path::new(&self.path(relative)).symlink_metadata().is_ok()
    }

    pub fn open(&self, path: &str, flags: OpenFileFlags) -> Result<Fd, OpenError> {
        self.fs.execute::<Open>(OpenInput::new(
            vpath(path),
            BaseDirectory::DirectoryFd(ROOT),
            flags,
        ))
    }

    pub fn open_with_rights(
        &self,
        path: &str,
        flags: OpenFileFlags,
        rights: FdRightsBlock,
    ) -> Result<Fd, OpenError> {
        self.fs.execute::<Open>(
            OpenInput::new(vpath(path), BaseDirectory::DirectoryFd(ROOT), flags)
                .with_rights(rights),
        )
    }
}

pub fn vpath(path: &str) -> VirtualPath {
    VirtualPath::create(path).expect("valid virtual path")
}
