use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

use parking_lot::Mutex;
use wasi_hostfs_types::{FdRightsBlock, Fdflags, Filestat, Filetype, Timespec};

use super::{cvt, errno, set_errno, stat_from_libc, stat_path, stat_raw_fd, utimens_times};
use crate::backend::errors::{Family, io_error};
use crate::error::{
    CloseError, ErrorKind, FdAttributesError, FileSystemError, FileSystemOperationError,
    ReadDirError, SetTimestampError, StatError, operation_error,
};
use crate::readdir::{DirEntrySequence, DirectoryStream, RawDirEntry};
use crate::resource::{DirectoryInfo, FdAttributes, FdResource};

#[derive(Debug)]
pub(super) struct PosixDirectory {
    fd: Mutex<Option<OwnedFd>>,
    info: DirectoryInfo,
    rights: FdRightsBlock,
}

impl PosixDirectory {
    pub(super) fn new(fd: OwnedFd, info: DirectoryInfo, rights: FdRightsBlock) -> Self {
        Self {
            fd: Mutex::new(Some(fd)),
            info,
            rights,
        }
    }

    fn with_fd<T, E: FileSystemOperationError>(
        &self,
        f: impl FnOnce(RawFd) -> Result<T, E>,
    ) -> Result<T, E> {
        let guard = self.fd.lock();
        match guard.as_ref() {
            Some(fd) => f(fd.as_raw_fd()),
            None => Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is closed", self.info.real_path),
            )),
        }
    }
}

impl FdResource for PosixDirectory {
    fn rights(&self) -> FdRightsBlock {
        self.rights
    }

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
        self.with_fd(|_| {
            Ok(FdAttributes {
                file_type: Filetype::Directory,
                flags: Fdflags::empty(),
                rights: self.rights,
            })
        })
    }

    fn stat(&self) -> Result<Filestat, StatError> {
        self.with_fd(|fd| {
            stat_raw_fd(fd).map_err(|err| {
                io_error(Family::Stat, format_args!("fstat({})", self.info.real_path), err)
            })
        })
    }

    fn close(&self) -> Result<(), CloseError> {
        let Some(fd) = self.fd.lock().take() else {
            return Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is already closed", self.info.real_path),
            ));
        };
        cvt(unsafe { libc::close(fd.into_raw_fd()) }).map_err(|err| {
            io_error(Family::Close, format_args!("close({})", self.info.real_path), err)
        })
    }

    fn directory(&self) -> Option<&DirectoryInfo> {
        Some(&self.info)
    }

    fn verify_directory_path(&self) -> Result<(), FileSystemError> {
        self.with_fd(|fd| {
            let path = &self.info.real_path;
            let opened = stat_raw_fd(fd).map_err(|err| {
                io_error::<FileSystemError>(Family::Stat, format_args!("fstat({path})"), err)
            })?;
            let named = stat_path(path, true).map_err(|err| {
                io_error::<FileSystemError>(Family::Stat, format_args!("stat({path})"), err)
            })?;
            if (opened.device_id, opened.inode) == (named.device_id, named.inode) {
                Ok(())
            } else {
                Err(FileSystemError::new(
                    ErrorKind::NoEntry,
                    format!("{path} no longer names the open directory"),
                ))
            }
        })
    }

    fn directory_handle(&self) -> Option<io::Result<OwnedFd>> {
        let guard = self.fd.lock();
        Some(match guard.as_ref() {
            Some(fd) => fd.try_clone(),
            None => Err(io::Error::from_raw_os_error(libc::EBADF)),
        })
    }

    fn set_timestamp(
        &self,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        let times = utimens_times(atime, mtime);
        self.with_fd(|fd| {
            cvt(unsafe { libc::futimens(fd, times.as_ptr()) }).map_err(|err| {
                io_error(
                    Family::SetTimestamp,
                    format_args!("futimens({})", self.info.real_path),
                    err,
                )
            })
        })
    }

    fn read_dir(&self, start_cookie: u64) -> Result<DirEntrySequence, ReadDirError> {
        let stream = self.with_fd(|fd| {
            PosixDirStream::open(fd).map_err(|err| {
                io_error::<ReadDirError>(
                    Family::ReadDir,
                    format_args!("fdopendir({})", self.info.real_path),
                    err,
                )
            })
        })?;
        Ok(DirEntrySequence::new(Box::new(stream), start_cookie))
    }
}

/// A `DIR` stream over a duplicate of the directory descriptor, rewound to
/// the first entry.
struct PosixDirStream {
    dir: Option<NonNull<libc::DIR>>,
}

// SAFETY: the `DIR` stream is owned by this value alone and is only touched
// through `&mut self`.
unsafe impl Send for PosixDirStream {}

impl PosixDirStream {
    fn open(fd: RawFd) -> io::Result<Self> {
        let dup_fd = unsafe { libc::dup(fd) };
        if dup_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let Some(dir) = NonNull::new(unsafe { libc::fdopendir(dup_fd) }) else {
            let err = io::Error::last_os_error();
            unsafe { libc::close(dup_fd) };
            return Err(err);
        };
        // The duplicate shares its offset with the original descriptor.
        unsafe { libc::rewinddir(dir.as_ptr()) };
        Ok(Self { dir: Some(dir) })
    }

    fn entry_type(dir: NonNull<libc::DIR>, name: &CStr, d_type: u8) -> Filetype {
        match d_type {
            libc::DT_DIR => Filetype::Directory,
            libc::DT_REG => Filetype::RegularFile,
            libc::DT_LNK => Filetype::SymbolicLink,
            libc::DT_CHR => Filetype::CharacterDevice,
            libc::DT_BLK => Filetype::BlockDevice,
            libc::DT_SOCK => Filetype::SocketStream,
            libc::DT_UNKNOWN => {
                let mut st = unsafe { mem::zeroed::<libc::stat>() };
                let res = unsafe {
                    libc::fstatat(
                        libc::dirfd(dir.as_ptr()),
                        name.as_ptr(),
                        &mut st,
                        libc::AT_SYMLINK_NOFOLLOW,
                    )
                };
                if res < 0 {
                    Filetype::Unknown
                } else {
                    stat_from_libc(&st).file_type
                }
            }
            _ => Filetype::Unknown,
        }
    }

    fn stat_entry(dir: NonNull<libc::DIR>, name: &str) -> io::Result<RawDirEntry> {
        let cname = CString::new(name)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))?;
        let mut st = unsafe { mem::zeroed::<libc::stat>() };
        cvt(unsafe { libc::fstatat(libc::dirfd(dir.as_ptr()), cname.as_ptr(), &mut st, 0) })?;
        let stat = stat_from_libc(&st);
        Ok(RawDirEntry {
            name: name.to_string(),
            file_type: stat.file_type,
            inode: stat.inode,
        })
    }
}

impl DirectoryStream for PosixDirStream {
    fn next_entry(&mut self) -> Option<Result<RawDirEntry, ReadDirError>> {
        let dir = self.dir?;
        set_errno(0);
        let entry = unsafe { libc::readdir(dir.as_ptr()) };
        if entry.is_null() {
            return match errno() {
                0 => None,
                code => Some(Err(io_error(
                    Family::ReadDir,
                    "readdir",
                    io::Error::from_raw_os_error(code),
                ))),
            };
        }
        let entry = unsafe { &*entry };
        let name = unsafe { CStr::from_ptr(entry.d_name.as_ptr()) };
        Some(Ok(RawDirEntry {
            name: String::from_utf8_lossy(name.to_bytes()).into_owned(),
            file_type: Self::entry_type(dir, name, entry.d_type),
            inode: entry.d_ino as u64,
        }))
    }

    fn yields_dot_entries(&self) -> bool {
        true
    }

    fn dot_entries(&mut self) -> Result<[RawDirEntry; 2], ReadDirError> {
        let Some(dir) = self.dir else {
            return Err(operation_error(
                ErrorKind::BadFileDescriptor,
                "directory stream is closed",
            ));
        };
        let lookup = |name: &str| {
            Self::stat_entry(dir, name).map_err(|err| {
                io_error::<ReadDirError>(Family::ReadDir, format_args!("fstatat({name})"), err)
            })
        };
        Ok([lookup(".")?, lookup("..")?])
    }

    fn close(&mut self) -> Result<(), CloseError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        cvt(unsafe { libc::closedir(dir.as_ptr()) })
            .map_err(|err| io_error(Family::Close, "closedir", err))
    }
}

impl Drop for PosixDirStream {
    fn drop(&mut self) {
        if let Err(err) = DirectoryStream::close(self) {
            tracing::debug!(error = %err, "failed to close directory stream");
        }
    }
}
