use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use parking_lot::Mutex;
use wasi_hostfs_types::{Advice, FdRightsBlock, Fdflags, Filestat, Timespec, Whence};

use super::{cvt, fdflags_to_native, stat_raw_fd, utimens_times};
use crate::backend::errors::{Family, io_error};
use crate::error::{
    CloseError, ErrorKind, FadviseError, FallocateError, FdAttributesError,
    FileSystemOperationError, ReadError, SeekError, SetFdFlagsError, SetTimestampError,
    StatError, SyncError, TruncateError, WriteError, operation_error,
};
use crate::path::RealPath;
use crate::resource::{FdAttributes, FdResource, MAX_READ_LEN, ReadWriteStrategy};

/// An open regular file (or any other non-directory).
#[derive(Debug)]
pub(super) struct PosixFile {
    fd: Mutex<Option<OwnedFd>>,
    path: RealPath,
    rights: FdRightsBlock,
    flags: Mutex<Fdflags>,
}

impl PosixFile {
    pub(super) fn new(fd: OwnedFd, path: RealPath, rights: FdRightsBlock, flags: Fdflags) -> Self {
        Self {
            fd: Mutex::new(Some(fd)),
            path,
            rights,
            flags: Mutex::new(flags),
        }
    }

    /// Runs `f` on the native descriptor, holding it open for the duration.
    fn with_fd<T, E: FileSystemOperationError>(
        &self,
        f: impl FnOnce(RawFd) -> Result<T, E>,
    ) -> Result<T, E> {
        let guard = self.fd.lock();
        match guard.as_ref() {
            Some(fd) => f(fd.as_raw_fd()),
            None => Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is closed", self.path),
            )),
        }
    }
}

fn offset(value: u64) -> io::Result<libc::off_t> {
    libc::off_t::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))
}

impl FdResource for PosixFile {
    fn rights(&self) -> FdRightsBlock {
        self.rights
    }

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
        let stat = self.stat().map_err(|err| {
            FdAttributesError::from_kind(err.kind(), err.message().to_string())
        })?;
        Ok(FdAttributes {
            file_type: stat.file_type,
            flags: *self.flags.lock(),
            rights: self.rights,
        })
    }

    fn stat(&self) -> Result<Filestat, StatError> {
        self.with_fd(|fd| {
            stat_raw_fd(fd)
                .map_err(|err| io_error(Family::Stat, format_args!("fstat({})", self.path), err))
        })
    }

    fn close(&self) -> Result<(), CloseError> {
        let Some(fd) = self.fd.lock().take() else {
            return Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is already closed", self.path),
            ));
        };
        cvt(unsafe { libc::close(fd.into_raw_fd()) })
            .map_err(|err| io_error(Family::Close, format_args!("close({})", self.path), err))
    }

    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        let whence = match whence {
            Whence::Set => libc::SEEK_SET,
            Whence::Cur => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        };
        self.with_fd(|fd| {
            let position = unsafe { libc::lseek(fd, offset as libc::off_t, whence) };
            if position < 0 {
                return Err(io_error(
                    Family::Seek,
                    format_args!("lseek({})", self.path),
                    io::Error::last_os_error(),
                ));
            }
            Ok(position as u64)
        })
    }

    fn read(&self, len: usize, strategy: ReadWriteStrategy) -> Result<Vec<u8>, ReadError> {
        self.with_fd(|fd| {
            let len = len.min(MAX_READ_LEN);
            let mut buf = vec![0u8; len];
            let ptr = buf.as_mut_ptr() as *mut libc::c_void;
            let res = match strategy {
                ReadWriteStrategy::CurrentPosition => unsafe { libc::read(fd, ptr, len) },
                ReadWriteStrategy::Position(position) => {
                    let position = offset(position).map_err(|err| {
                        io_error::<ReadError>(Family::ReadWrite, format_args!("pread({})", self.path), err)
                    })?;
                    unsafe { libc::pread(fd, ptr, len, position) }
                }
            };
            if res < 0 {
                return Err(io_error(
                    Family::ReadWrite,
                    format_args!("read({})", self.path),
                    io::Error::last_os_error(),
                ));
            }
            buf.truncate(res as usize);
            Ok(buf)
        })
    }

    fn write(&self, buffers: &[Vec<u8>], strategy: ReadWriteStrategy) -> Result<u64, WriteError> {
        self.with_fd(|fd| {
            let mut written = 0u64;
            for buffer in buffers {
                let ptr = buffer.as_ptr() as *const libc::c_void;
                let res = match strategy {
                    ReadWriteStrategy::CurrentPosition => unsafe {
                        libc::write(fd, ptr, buffer.len())
                    },
                    ReadWriteStrategy::Position(position) => {
                        let position = offset(position + written).map_err(|err| {
                            io_error::<WriteError>(Family::ReadWrite, format_args!("pwrite({})", self.path), err)
                        })?;
                        unsafe { libc::pwrite(fd, ptr, buffer.len(), position) }
                    }
                };
                if res < 0 {
                    let err = io::Error::last_os_error();
                    if written > 0 {
                        tracing::debug!(path = %self.path, error = %err, "short write");
                        break;
                    }
                    return Err(io_error(
                        Family::ReadWrite,
                        format_args!("write({})", self.path),
                        err,
                    ));
                }
                written += res as u64;
                if (res as usize) < buffer.len() {
                    break;
                }
            }
            Ok(written)
        })
    }

    fn sync(&self, sync_metadata: bool) -> Result<(), SyncError> {
        self.with_fd(|fd| {
            #[cfg(target_os = "linux")]
            let res = if sync_metadata {
                unsafe { libc::fsync(fd) }
            } else {
                unsafe { libc::fdatasync(fd) }
            };
            #[cfg(not(target_os = "linux"))]
            let res = {
                let _ = sync_metadata;
                unsafe { libc::fsync(fd) }
            };
            cvt(res).map_err(|err| io_error(Family::Sync, format_args!("fsync({})", self.path), err))
        })
    }

    fn fallocate(&self, offset_in_file: u64, len: u64) -> Result<(), FallocateError> {
        self.with_fd(|fd| {
            let to_error =
                |err| io_error(Family::Fallocate, format_args!("fallocate({})", self.path), err);
            let start = offset(offset_in_file).map_err(to_error)?;
            let len = offset(len).map_err(to_error)?;
            allocate(fd, start, len).map_err(to_error)
        })
    }

    fn truncate(&self, len: u64) -> Result<(), TruncateError> {
        self.with_fd(|fd| {
            let to_error =
                |err| io_error(Family::Truncate, format_args!("ftruncate({})", self.path), err);
            let len = offset(len).map_err(to_error)?;
            cvt(unsafe { libc::ftruncate(fd, len) }).map_err(to_error)
        })
    }

    fn fadvise(&self, offset_in_file: u64, len: u64, advice: Advice) -> Result<(), FadviseError> {
        self.with_fd(|fd| advise(fd, offset_in_file, len, advice))
    }

    fn set_timestamp(
        &self,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        let times = utimens_times(atime, mtime);
        self.with_fd(|fd| {
            cvt(unsafe { libc::futimens(fd, times.as_ptr()) }).map_err(|err| {
                io_error(Family::SetTimestamp, format_args!("futimens({})", self.path), err)
            })
        })
    }

    fn set_fd_flags(&self, flags: Fdflags) -> Result<(), SetFdFlagsError> {
        self.with_fd(|fd| {
            let to_error =
                |err| io_error(Family::Fcntl, format_args!("fcntl({})", self.path), err);
            let current = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            if current < 0 {
                return Err(to_error(io::Error::last_os_error()));
            }
            let updated = (current & !(libc::O_APPEND | libc::O_NONBLOCK)) | fdflags_to_native(flags);
            cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, updated) }).map_err(to_error)?;
            let mut stored = self.flags.lock();
            *stored = (*stored - Fdflags::CHANGEABLE) | (flags & Fdflags::CHANGEABLE);
            Ok(())
        })
    }
}

#[cfg(target_os = "linux")]
fn allocate(fd: RawFd, start: libc::off_t, len: libc::off_t) -> io::Result<()> {
    match unsafe { libc::posix_fallocate(fd, start, len) } {
        0 => Ok(()),
        code => Err(io::Error::from_raw_os_error(code)),
    }
}

/// Extends the file with `ftruncate` where `posix_fallocate` is missing.
#[cfg(not(target_os = "linux"))]
fn allocate(fd: RawFd, start: libc::off_t, len: libc::off_t) -> io::Result<()> {
    let stat = stat_raw_fd(fd)?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| io::Error::from_raw_os_error(libc::EFBIG))?;
    if (stat.size as libc::off_t) < end {
        cvt(unsafe { libc::ftruncate(fd, end) })?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn advise(fd: RawFd, start: u64, len: u64, advice: Advice) -> Result<(), FadviseError> {
    let advice = match advice {
        Advice::Normal => libc::POSIX_FADV_NORMAL,
        Advice::Sequential => libc::POSIX_FADV_SEQUENTIAL,
        Advice::Random => libc::POSIX_FADV_RANDOM,
        Advice::Willneed => libc::POSIX_FADV_WILLNEED,
        Advice::Dontneed => libc::POSIX_FADV_DONTNEED,
        Advice::Noreuse => libc::POSIX_FADV_NOREUSE,
    };
    let (Ok(start), Ok(len)) = (libc::off_t::try_from(start), libc::off_t::try_from(len)) else {
        return Err(operation_error(ErrorKind::InvalidArgument, "range out of bounds"));
    };
    match unsafe { libc::posix_fadvise(fd, start, len, advice) } {
        0 => Ok(()),
        libc::ESPIPE => Err(operation_error(ErrorKind::Pipe, "descriptor is a pipe")),
        libc::EBADF => Err(operation_error(ErrorKind::BadFileDescriptor, "bad descriptor")),
        code => Err(operation_error(
            ErrorKind::InvalidArgument,
            io::Error::from_raw_os_error(code).to_string(),
        )),
    }
}

/// Advice is only a hint; without `posix_fadvise` it is accepted and ignored.
#[cfg(not(target_os = "linux"))]
fn advise(_fd: RawFd, _start: u64, _len: u64, _advice: Advice) -> Result<(), FadviseError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::fd::FromRawFd;

    use wasi_hostfs_types::Filetype;

    use super::*;

    fn open(path: &std::path::Path) -> PosixFile {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .unwrap();
        let fd = unsafe { OwnedFd::from_raw_fd(file.into_raw_fd()) };
        PosixFile::new(
            fd,
            RealPath::create(path).unwrap(),
            FdRightsBlock::FILE,
            Fdflags::empty(),
        )
    }

    #[test]
    fn positional_io_keeps_the_position() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("data"));
        assert_eq!(
            file.write(&[b"hello ".to_vec(), b"world".to_vec()], ReadWriteStrategy::CurrentPosition),
            Ok(11)
        );
        assert_eq!(file.seek(0, Whence::Cur), Ok(11));
        assert_eq!(
            file.read(5, ReadWriteStrategy::Position(6)),
            Ok(b"world".to_vec())
        );
        assert_eq!(file.seek(0, Whence::Cur), Ok(11));
        assert_eq!(file.seek(0, Whence::Set), Ok(0));
        assert_eq!(
            file.read(5, ReadWriteStrategy::CurrentPosition),
            Ok(b"hello".to_vec())
        );
    }

    #[test]
    fn truncate_and_allocate_change_the_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("data"));
        file.fallocate(0, 100).unwrap();
        assert_eq!(file.stat().unwrap().size, 100);
        file.truncate(10).unwrap();
        assert_eq!(file.stat().unwrap().size, 10);
        assert_eq!(file.stat().unwrap().file_type, Filetype::RegularFile);
    }

    #[test]
    fn operations_after_close_are_bad_file_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("data"));
        file.close().unwrap();
        assert_eq!(
            file.read(1, ReadWriteStrategy::CurrentPosition)
                .unwrap_err()
                .kind(),
            ErrorKind::BadFileDescriptor
        );
        assert_eq!(file.close().unwrap_err().kind(), ErrorKind::BadFileDescriptor);
    }

    #[test]
    fn append_flag_can_be_toggled() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&dir.path().join("data"));
        file.write(&[b"abc".to_vec()], ReadWriteStrategy::CurrentPosition)
            .unwrap();
        file.seek(0, Whence::Set).unwrap();
        file.set_fd_flags(Fdflags::APPEND).unwrap();
        assert_eq!(file.fd_attributes().unwrap().flags, Fdflags::APPEND);
        file.write(&[b"def".to_vec()], ReadWriteStrategy::CurrentPosition)
            .unwrap();
        assert_eq!(
            file.read(6, ReadWriteStrategy::Position(0)),
            Ok(b"abcdef".to_vec())
        );
    }
}
