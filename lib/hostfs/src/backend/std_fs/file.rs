use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};

use parking_lot::Mutex;
use wasi_hostfs_types::{FdRightsBlock, Fdflags, Filestat, Timespec, Whence};

use super::{filestat, to_filetime};
use crate::backend::errors::{Family, io_error};
use crate::error::{
    CloseError, ErrorKind, FallocateError, FdAttributesError, FileSystemOperationError, ReadError,
    SeekError, SetFdFlagsError, SetTimestampError, StatError, SyncError, TruncateError,
    WriteError, operation_error,
};
use crate::path::RealPath;
use crate::resource::{FdAttributes, FdResource, MAX_READ_LEN, ReadWriteStrategy};

#[derive(Debug)]
pub(super) struct StdFile {
    file: Mutex<Option<fs::File>>,
    path: RealPath,
    rights: FdRightsBlock,
    flags: Mutex<Fdflags>,
}

impl StdFile {
    pub(super) fn new(file: fs::File, path: RealPath, rights: FdRightsBlock, flags: Fdflags) -> Self {
        Self {
            file: Mutex::new(Some(file)),
            path,
            rights,
            flags: Mutex::new(flags),
        }
    }

    fn with_file<T, E: FileSystemOperationError>(
        &self,
        f: impl FnOnce(&mut fs::File) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.file.lock();
        match guard.as_mut() {
            Some(file) => f(file),
            None => Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is closed", self.path),
            )),
        }
    }
}

/// Runs `f` at `position`, then puts the cursor back where it was.
fn at_position<T>(
    file: &mut fs::File,
    position: u64,
    f: impl FnOnce(&mut fs::File) -> io::Result<T>,
) -> io::Result<T> {
    let saved = file.stream_position()?;
    file.seek(SeekFrom::Start(position))?;
    let result = f(file);
    file.seek(SeekFrom::Start(saved))?;
    result
}

fn write_buffers(file: &mut fs::File, buffers: &[Vec<u8>]) -> io::Result<u64> {
    let mut written = 0u64;
    for buffer in buffers {
        let count = match file.write(buffer) {
            Ok(count) => count,
            Err(err) if written == 0 => return Err(err),
            Err(_) => break,
        };
        written += count as u64;
        if count < buffer.len() {
            break;
        }
    }
    Ok(written)
}

impl FdResource for StdFile {
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
        self.with_file(|file| {
            file.metadata()
                .map(|meta| filestat(&meta))
                .map_err(|err| io_error(Family::Stat, format_args!("fstat({})", self.path), err))
        })
    }

    fn close(&self) -> Result<(), CloseError> {
        match self.file.lock().take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is already closed", self.path),
            )),
        }
    }

    fn seek(&self, offset: i64, whence: Whence) -> Result<u64, SeekError> {
        let target = match whence {
            Whence::Set => match u64::try_from(offset) {
                Ok(offset) => SeekFrom::Start(offset),
                Err(_) => {
                    return Err(operation_error(
                        ErrorKind::InvalidArgument,
                        format!("negative offset {offset}"),
                    ));
                }
            },
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        self.with_file(|file| {
            file.seek(target)
                .map_err(|err| io_error(Family::Seek, format_args!("seek({})", self.path), err))
        })
    }

    fn read(&self, len: usize, strategy: ReadWriteStrategy) -> Result<Vec<u8>, ReadError> {
        self.with_file(|file| {
            let mut buf = vec![0u8; len.min(MAX_READ_LEN)];
            let count = match strategy {
                ReadWriteStrategy::CurrentPosition => file.read(&mut buf),
                ReadWriteStrategy::Position(position) => {
                    at_position(file, position, |file| file.read(&mut buf))
                }
            }
            .map_err(|err| -> ReadError {
                io_error(Family::ReadWrite, format_args!("read({})", self.path), err)
            })?;
            buf.truncate(count);
            Ok(buf)
        })
    }

    fn write(&self, buffers: &[Vec<u8>], strategy: ReadWriteStrategy) -> Result<u64, WriteError> {
        let append = self.flags.lock().contains(Fdflags::APPEND);
        self.with_file(|file| {
            let result = match strategy {
                ReadWriteStrategy::CurrentPosition if append => file
                    .seek(SeekFrom::End(0))
                    .and_then(|_| write_buffers(file, buffers)),
                ReadWriteStrategy::CurrentPosition => write_buffers(file, buffers),
                ReadWriteStrategy::Position(position) => {
                    at_position(file, position, |file| write_buffers(file, buffers))
                }
            };
            result.map_err(|err| io_error(Family::ReadWrite, format_args!("write({})", self.path), err))
        })
    }

    fn sync(&self, sync_metadata: bool) -> Result<(), SyncError> {
        self.with_file(|file| {
            let result = if sync_metadata {
                file.sync_all()
            } else {
                file.sync_data()
            };
            result.map_err(|err| io_error(Family::Sync, format_args!("fsync({})", self.path), err))
        })
    }

    fn fallocate(&self, offset: u64, len: u64) -> Result<(), FallocateError> {
        self.with_file(|file| {
            let to_error = |err| -> FallocateError {
                io_error(Family::Fallocate, format_args!("fallocate({})", self.path), err)
            };
            let end = offset.checked_add(len).ok_or_else(|| {
                operation_error::<FallocateError>(ErrorKind::FileTooBig, "range overflows")
            })?;
            let size = file.metadata().map_err(to_error)?.len();
            if size < end {
                file.set_len(end).map_err(to_error)?;
            }
            Ok(())
        })
    }

    fn truncate(&self, len: u64) -> Result<(), TruncateError> {
        self.with_file(|file| {
            file.set_len(len).map_err(|err| {
                io_error(Family::Truncate, format_args!("ftruncate({})", self.path), err)
            })
        })
    }

    fn set_timestamp(
        &self,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        self.with_file(|file| {
            filetime::set_file_handle_times(file, atime.map(to_filetime), mtime.map(to_filetime))
                .map_err(|err| {
                    io_error(Family::SetTimestamp, format_args!("futimens({})", self.path), err)
                })
        })
    }

    fn set_fd_flags(&self, flags: Fdflags) -> Result<(), SetFdFlagsError> {
        self.with_file(|_| {
            let mut stored = self.flags.lock();
            *stored = (*stored - Fdflags::CHANGEABLE) | (flags & Fdflags::CHANGEABLE);
            Ok(())
        })
    }
}
