//! Terminal handlers of every operation.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use wasi_hostfs_types::{
    Fd, FdRightsBlock, Fdflags, FileMode, Filestat, Filetype, OpenFileFlags, Rights, Whence,
};

use crate::backend::OpenRequest;
use crate::error::{
    CheckAccessError, CloseError, ErrorKind, FadviseError, FallocateError, FdAttributesError,
    GetCwdError, HardlinkError, MkdirError, OpenError, PrestatError, ReadDirError, ReadError,
    ReadLinkError, RenameError, RenumberError, SeekError, SetFdFlagsError, SetTimestampError,
    StatError, SymlinkError, SyncError, TruncateError, UnlinkDirectoryError, UnlinkError,
    WriteError, operation_error,
};
use crate::fd_table::AllocateError;
use crate::op::*;
use crate::pipeline::Executor;
use crate::readdir::DirEntrySequence;
use crate::resolver::ComponentLookup;
use crate::resource::{FdAttributes, ReadWriteStrategy};

use super::state::{FileSystemState, check_rights};

/// Registers a handler for every operation the backend supports.
pub(crate) fn executor(state: &Arc<FileSystemState>) -> Executor {
    let mut builder = Executor::builder();

    macro_rules! register {
        ($($op:ident => $method:ident),+ $(,)?) => {
            $(
                if state.backend.supports(OperationTag::$op) {
                    let state = Arc::clone(state);
                    builder.add::<$op, _>(move |input| state.$method(input));
                } else {
                    tracing::debug!(
                        operation = %OperationTag::$op,
                        backend = ?state.backend.kind(),
                        "operation not supported by the backend",
                    );
                }
            )+
        };
    }

    register! {
        Open => open,
        Close => close,
        ReadFd => read,
        WriteFd => write,
        SeekFd => seek,
        Stat => stat,
        StatFd => stat_fd,
        Mkdir => mkdir,
        Rename => rename,
        UnlinkFile => unlink_file,
        UnlinkDirectory => unlink_directory,
        Symlink => symlink,
        Readlink => read_link,
        Hardlink => hardlink,
        SetTimestamp => set_timestamp,
        SetTimestampFd => set_timestamp_fd,
        CheckAccess => check_access,
        Fallocate => fallocate,
        TruncateFd => truncate,
        SyncFd => sync,
        FadviseFd => fadvise,
        SetFdFlags => set_fd_flags,
        GetFdAttributes => fd_attributes,
        PrestatFd => prestat,
        Renumber => renumber,
        Poll => poll,
        ReadDirFd => read_dir,
        GetCurrentWorkingDirectory => current_working_directory,
    }

    builder.build()
}

/// Directories can not be opened for writing, nor with both read and write
/// rights requested.
fn opens_directory_for_io(flags: OpenFileFlags, requested: Option<FdRightsBlock>) -> bool {
    flags.access_mode().is_writable()
        || requested.is_some_and(|rights| rights.has(Rights::FD_READ | Rights::FD_WRITE))
}

fn positional(strategy: ReadWriteStrategy) -> Rights {
    match strategy {
        ReadWriteStrategy::CurrentPosition => Rights::empty(),
        ReadWriteStrategy::Position(_) => Rights::FD_SEEK,
    }
}

impl FileSystemState {
    fn open(&self, input: OpenInput) -> Result<Fd, OpenError> {
        let OpenInput {
            path,
            base_directory,
            flags,
            fdflags,
            mode,
            rights,
        } = input;
        if flags.is_create() && flags.is_directory() {
            return Err(OpenError::InvalidArgument(
                "O_CREAT can not be combined with O_DIRECTORY".to_string(),
            ));
        }
        let mut required = Rights::PATH_OPEN;
        if flags.is_create() {
            required |= Rights::PATH_CREATE_FILE;
        }
        let parent = self.base_rights::<OpenError>(base_directory, required)?;
        let requested = rights.unwrap_or(FdRightsBlock::ALL);
        let (real_path, resource) = self.path_operation(|| {
            let real_path =
                self.resolve::<OpenError>(&path, base_directory, !flags.is_nofollow())?;
            let resource = self.backend.open(OpenRequest {
                path: &real_path,
                flags,
                fdflags,
                mode: mode.unwrap_or(FileMode::DEFAULT_FILE),
                file_rights: parent.child_file_rights(&requested),
                directory_rights: parent.child_directory_rights(&requested),
                virtual_path: self.child_virtual_path(&path, base_directory),
            })?;
            Ok::<_, OpenError>((real_path, resource))
        })?;

        if resource.directory().is_some() && opens_directory_for_io(flags, rights) {
            if let Err(err) = resource.close() {
                tracing::debug!(path = %real_path, error = %err, "closing rejected directory failed");
            }
            return Err(OpenError::PathIsDirectory(format!(
                "`{path}` is a directory"
            )));
        }

        let allocated = self
            .fds
            .allocate(|_| Ok::<_, Infallible>((Arc::clone(&resource), ())));
        match allocated {
            Ok((fd, ())) => {
                tracing::trace!(fd, path = %real_path, "opened");
                Ok(fd)
            }
            Err(AllocateError::Mfile) => {
                if let Err(err) = resource.close() {
                    tracing::debug!(path = %real_path, error = %err, "closing unallocated resource failed");
                }
                Err(OpenError::Mfile("Too many open files".to_string()))
            }
            Err(AllocateError::Factory(never)) => match never {},
        }
    }

    fn close(&self, input: CloseInput) -> Result<(), CloseError> {
        let resource = self.fds.release(input.fd)?;
        resource.close()
    }

    fn read(&self, input: ReadInput) -> Result<Vec<u8>, ReadError> {
        let required = Rights::FD_READ | positional(input.strategy);
        self.resource_with_rights::<ReadError>(input.fd, required)?
            .read(input.len, input.strategy)
    }

    fn write(&self, input: WriteInput) -> Result<u64, WriteError> {
        let required = Rights::FD_WRITE | positional(input.strategy);
        self.resource_with_rights::<WriteError>(input.fd, required)?
            .write(&input.buffers, input.strategy)
    }

    fn seek(&self, input: SeekInput) -> Result<u64, SeekError> {
        let resource = self.resource::<SeekError>(input.fd)?;
        let granted = resource.rights();
        let is_tell = input.whence == Whence::Cur && input.offset == 0;
        let required = if is_tell && granted.has(Rights::FD_TELL) {
            Rights::FD_TELL
        } else {
            Rights::FD_SEEK
        };
        check_rights::<SeekError>(input.fd, granted, required)?;
        resource.seek(input.offset, input.whence)
    }

    fn stat(&self, input: StatInput) -> Result<Filestat, StatError> {
        self.base_rights::<StatError>(input.base_directory, Rights::PATH_FILESTAT_GET)?;
        self.path_operation(|| {
            let path = self.resolve::<StatError>(
                &input.path,
                input.base_directory,
                input.follow_symlinks,
            )?;
            self.backend.stat(&path, input.follow_symlinks)
        })
    }

    fn stat_fd(&self, input: StatFdInput) -> Result<Filestat, StatError> {
        let resource = self.resource_with_rights::<StatError>(input.fd, Rights::FD_FILESTAT_GET)?;
        self.path_operation(|| resource.stat())
    }

    fn mkdir(&self, input: MkdirInput) -> Result<(), MkdirError> {
        self.base_rights::<MkdirError>(input.base_directory, Rights::PATH_CREATE_DIRECTORY)?;
        let result = self.path_operation(|| {
            let path = self.resolve::<MkdirError>(&input.path, input.base_directory, false)?;
            self.backend.mkdir(&path, input.mode)
        });
        match result {
            Err(MkdirError::Exists(_)) if !input.fail_if_exists => Ok(()),
            result => result,
        }
    }

    fn rename(&self, input: RenameInput) -> Result<(), RenameError> {
        self.base_rights::<RenameError>(input.old_base_directory, Rights::PATH_RENAME_SOURCE)?;
        self.base_rights::<RenameError>(input.new_base_directory, Rights::PATH_RENAME_TARGET)?;
        self.path_operation(|| {
            let from =
                self.resolve::<RenameError>(&input.old_path, input.old_base_directory, false)?;
            let to =
                self.resolve::<RenameError>(&input.new_path, input.new_base_directory, false)?;
            self.backend.rename(&from, &to)
        })
    }

    fn unlink_file(&self, input: UnlinkFileInput) -> Result<(), UnlinkError> {
        self.base_rights::<UnlinkError>(input.base_directory, Rights::PATH_UNLINK_FILE)?;
        self.path_operation(|| {
            let path = self.resolve::<UnlinkError>(&input.path, input.base_directory, false)?;
            if self.backend.lookup(path.real_path())? == Some(Filetype::Directory) {
                return Err(UnlinkError::PathIsDirectory(format!(
                    "`{}` is a directory",
                    input.path
                )));
            }
            self.backend.unlink_file(&path)
        })
    }

    fn unlink_directory(&self, input: UnlinkDirectoryInput) -> Result<(), UnlinkDirectoryError> {
        self.base_rights::<UnlinkDirectoryError>(
            input.base_directory,
            Rights::PATH_REMOVE_DIRECTORY,
        )?;
        self.path_operation(|| {
            let path =
                self.resolve::<UnlinkDirectoryError>(&input.path, input.base_directory, false)?;
            self.backend.unlink_directory(&path)
        })
    }

    fn symlink(&self, input: SymlinkInput) -> Result<(), SymlinkError> {
        if input.target.is_empty() {
            return Err(SymlinkError::InvalidArgument(
                "symlink target is empty".to_string(),
            ));
        }
        let is_absolute = input.target.starts_with('/') || Path::new(&input.target).has_root();
        if is_absolute && !input.allow_absolute_target {
            return Err(SymlinkError::NotCapable(format!(
                "absolute symlink target `{}` is not allowed",
                input.target
            )));
        }
        self.base_rights::<SymlinkError>(input.new_base_directory, Rights::PATH_SYMLINK)?;
        self.path_operation(|| {
            let link =
                self.resolve::<SymlinkError>(&input.new_path, input.new_base_directory, false)?;
            self.backend.symlink(&input.target, &link)
        })
    }

    fn read_link(&self, input: ReadlinkInput) -> Result<String, ReadLinkError> {
        self.base_rights::<ReadLinkError>(input.base_directory, Rights::PATH_READLINK)?;
        self.path_operation(|| {
            let path = self.resolve::<ReadLinkError>(&input.path, input.base_directory, false)?;
            self.backend.read_link(&path)
        })
    }

    fn hardlink(&self, input: HardlinkInput) -> Result<(), HardlinkError> {
        self.base_rights::<HardlinkError>(input.old_base_directory, Rights::PATH_LINK_SOURCE)?;
        self.base_rights::<HardlinkError>(input.new_base_directory, Rights::PATH_LINK_TARGET)?;
        self.path_operation(|| {
            let from = self.resolve::<HardlinkError>(
                &input.old_path,
                input.old_base_directory,
                input.follow_symlinks,
            )?;
            let to =
                self.resolve::<HardlinkError>(&input.new_path, input.new_base_directory, false)?;
            self.backend.hardlink(&from, &to, input.follow_symlinks)
        })
    }

    fn set_timestamp(&self, input: SetTimestampInput) -> Result<(), SetTimestampError> {
        self.base_rights::<SetTimestampError>(
            input.base_directory,
            Rights::PATH_FILESTAT_SET_TIMES,
        )?;
        self.path_operation(|| {
            let path = self.resolve::<SetTimestampError>(
                &input.path,
                input.base_directory,
                input.follow_symlinks,
            )?;
            self.backend
                .set_timestamp(&path, input.follow_symlinks, input.atime, input.mtime)
        })
    }

    fn set_timestamp_fd(&self, input: SetTimestampFdInput) -> Result<(), SetTimestampError> {
        let resource = self
            .resource_with_rights::<SetTimestampError>(input.fd, Rights::FD_FILESTAT_SET_TIMES)?;
        self.path_operation(|| resource.set_timestamp(input.atime, input.mtime))
    }

    fn check_access(&self, input: CheckAccessInput) -> Result<(), CheckAccessError> {
        self.base_rights::<CheckAccessError>(input.base_directory, Rights::empty())?;
        self.path_operation(|| {
            let path = self.resolve::<CheckAccessError>(
                &input.path,
                input.base_directory,
                input.follow_symlinks,
            )?;
            self.backend.check_access(
                &path,
                input.mode,
                input.follow_symlinks,
                input.use_effective_ids,
            )
        })
    }

    fn fallocate(&self, input: FallocateInput) -> Result<(), FallocateError> {
        self.resource_with_rights::<FallocateError>(input.fd, Rights::FD_ALLOCATE)?
            .fallocate(input.offset, input.len)
    }

    fn truncate(&self, input: TruncateInput) -> Result<(), TruncateError> {
        self.resource_with_rights::<TruncateError>(input.fd, Rights::FD_FILESTAT_SET_SIZE)?
            .truncate(input.len)
    }

    fn sync(&self, input: SyncInput) -> Result<(), SyncError> {
        let required = if input.sync_metadata {
            Rights::FD_SYNC
        } else {
            Rights::FD_DATASYNC
        };
        self.resource_with_rights::<SyncError>(input.fd, required)?
            .sync(input.sync_metadata)
    }

    fn fadvise(&self, input: FadviseInput) -> Result<(), FadviseError> {
        self.resource_with_rights::<FadviseError>(input.fd, Rights::FD_ADVISE)?
            .fadvise(input.offset, input.len, input.advice)
    }

    fn set_fd_flags(&self, input: SetFdFlagsInput) -> Result<(), SetFdFlagsError> {
        let resource =
            self.resource_with_rights::<SetFdFlagsError>(input.fd, Rights::FD_FDSTAT_SET_FLAGS)?;
        let unchangeable = input.flags - Fdflags::CHANGEABLE;
        if !unchangeable.is_empty() {
            return Err(SetFdFlagsError::NotSupported(format!(
                "flags {unchangeable:?} can not be changed on an open descriptor"
            )));
        }
        resource.set_fd_flags(input.flags)
    }

    fn fd_attributes(&self, input: FdAttributesInput) -> Result<FdAttributes, FdAttributesError> {
        self.resource::<FdAttributesError>(input.fd)?.fd_attributes()
    }

    fn prestat(&self, input: PrestatInput) -> Result<Prestat, PrestatError> {
        let resource = self.resource::<PrestatError>(input.fd)?;
        match resource.directory() {
            Some(info) if info.is_preopened => Ok(Prestat {
                virtual_path: info.virtual_path.clone(),
            }),
            _ => Err(PrestatError::BadFileDescriptor(format!(
                "File descriptor {} is not a preopened directory",
                input.fd
            ))),
        }
    }

    fn renumber(&self, input: RenumberInput) -> Result<(), RenumberError> {
        if input.from == input.to {
            self.resource::<RenumberError>(input.from)?;
            return Ok(());
        }
        let replaced = self.fds.renumber(input.from, input.to)?;
        if let Err(err) = replaced.close() {
            tracing::debug!(fd = input.to, error = %err, "closing the replaced descriptor failed");
        }
        Ok(())
    }

    fn read_dir(&self, input: ReadDirInput) -> Result<DirEntrySequence, ReadDirError> {
        let resource = self.resource_with_rights::<ReadDirError>(input.fd, Rights::FD_READDIR)?;
        self.path_operation(|| resource.read_dir(input.start_cookie))
    }

    fn current_working_directory(&self, _input: GetCwdInput) -> Result<String, GetCwdError> {
        match self.resolver.current_working_directory() {
            Some(fd) => self
                .fds
                .get(fd)
                .and_then(|resource| resource.directory().map(|info| info.virtual_path.clone()))
                .ok_or_else(|| {
                    operation_error(
                        ErrorKind::NoEntry,
                        "the current working directory is closed",
                    )
                }),
            None if self.resolver.is_root_access_allowed() => {
                let cwd = std::env::current_dir().map_err(|err| {
                    GetCwdError::IoError(format!("getcwd() failed: {err}"))
                })?;
                cwd.into_os_string().into_string().map_err(|cwd| {
                    GetCwdError::InvalidArgument(format!("{cwd:?} is not valid UTF-8"))
                })
            }
            None => Err(GetCwdError::NoEntry(
                "no current working directory is configured".to_string(),
            )),
        }
    }
}
