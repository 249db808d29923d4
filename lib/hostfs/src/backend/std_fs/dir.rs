use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use wasi_hostfs_types::{FdRightsBlock, Fdflags, Filestat, Filetype, Timespec};

use super::{filestat, filetype, to_filetime};
use crate::backend::errors::{Family, io_error};
use crate::error::{
    CloseError, ErrorKind, FdAttributesError, FileSystemError, FileSystemOperationError,
    ReadDirError, SetTimestampError, StatError, operation_error,
};
use crate::path::RealPath;
use crate::readdir::{DirEntrySequence, DirectoryStream, RawDirEntry};
use crate::resource::{DirectoryInfo, FdAttributes, FdResource};

/// A directory handle. `std` has no directory descriptors, so every call
/// goes through the path, after checking that the path still names the
/// directory that was opened.
#[derive(Debug)]
pub(super) struct StdDirectory {
    info: DirectoryInfo,
    rights: FdRightsBlock,
    identity: Option<(u64, u64)>,
    closed: AtomicBool,
}

impl StdDirectory {
    pub(super) fn new(info: DirectoryInfo, rights: FdRightsBlock, meta: &fs::Metadata) -> Self {
        Self {
            info,
            rights,
            identity: identity(meta),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open<E: FileSystemOperationError>(&self) -> Result<&RealPath, E> {
        if self.closed.load(Ordering::Acquire) {
            return Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is closed", self.info.real_path),
            ));
        }
        Ok(&self.info.real_path)
    }

    /// The host path, if it still names this directory.
    fn checked_path<E: FileSystemOperationError>(&self) -> Result<&RealPath, E> {
        let path = self.ensure_open::<E>()?;
        let Some(expected) = self.identity else {
            return Ok(path);
        };
        let meta = fs::metadata(path)
            .map_err(|err| io_error::<E>(Family::Stat, format_args!("stat({path})"), err))?;
        if identity(&meta) != Some(expected) {
            return Err(operation_error(
                ErrorKind::NoEntry,
                format!("{path} no longer names the open directory"),
            ));
        }
        Ok(path)
    }
}

/// Device and inode number. Not available from `std` on Windows.
#[cfg(unix)]
fn identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;

    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn identity(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

impl FdResource for StdDirectory {
    fn rights(&self) -> FdRightsBlock {
        self.rights
    }

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
        self.ensure_open::<FdAttributesError>()?;
        Ok(FdAttributes {
            file_type: Filetype::Directory,
            flags: Fdflags::empty(),
            rights: self.rights,
        })
    }

    fn stat(&self) -> Result<Filestat, StatError> {
        let path = self.checked_path::<StatError>()?;
        fs::metadata(path)
            .map(|meta| filestat(&meta))
            .map_err(|err| io_error(Family::Stat, format_args!("stat({path})"), err))
    }

    fn close(&self) -> Result<(), CloseError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(operation_error(
                ErrorKind::BadFileDescriptor,
                format!("{} is already closed", self.info.real_path),
            ));
        }
        Ok(())
    }

    fn directory(&self) -> Option<&DirectoryInfo> {
        Some(&self.info)
    }

    fn verify_directory_path(&self) -> Result<(), FileSystemError> {
        self.checked_path::<FileSystemError>().map(|_| ())
    }

    fn set_timestamp(
        &self,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        let path = self.checked_path::<SetTimestampError>()?;
        let to_error = |err| -> SetTimestampError {
            io_error(Family::SetTimestamp, format_args!("utimes({path})"), err)
        };
        let meta = fs::metadata(path).map_err(to_error)?;
        let atime = atime
            .map(to_filetime)
            .unwrap_or_else(|| filetime::FileTime::from_last_access_time(&meta));
        let mtime = mtime
            .map(to_filetime)
            .unwrap_or_else(|| filetime::FileTime::from_last_modification_time(&meta));
        filetime::set_file_times(path, atime, mtime).map_err(to_error)
    }

    fn read_dir(&self, start_cookie: u64) -> Result<DirEntrySequence, ReadDirError> {
        let path = self.checked_path::<ReadDirError>()?;
        let entries = fs::read_dir(path).map_err(|err| {
            io_error::<ReadDirError>(Family::ReadDir, format_args!("opendir({path})"), err)
        })?;
        let stream = StdDirStream {
            path: path.clone(),
            entries: Some(entries),
        };
        Ok(DirEntrySequence::new(Box::new(stream), start_cookie))
    }
}

struct StdDirStream {
    path: RealPath,
    entries: Option<fs::ReadDir>,
}

impl StdDirStream {
    fn dot_entry(name: &str, path: &RealPath) -> Result<RawDirEntry, ReadDirError> {
        let meta = fs::metadata(path)
            .map_err(|err| io_error::<ReadDirError>(Family::ReadDir, format_args!("stat({path})"), err))?;
        let stat = filestat(&meta);
        Ok(RawDirEntry {
            name: name.to_string(),
            file_type: stat.file_type,
            inode: stat.inode,
        })
    }
}

impl DirectoryStream for StdDirStream {
    fn next_entry(&mut self) -> Option<Result<RawDirEntry, ReadDirError>> {
        let entry = match self.entries.as_mut()?.next()? {
            Ok(entry) => entry,
            Err(err) => {
                return Some(Err(io_error(
                    Family::ReadDir,
                    format_args!("readdir({})", self.path),
                    err,
                )));
            }
        };
        let file_type = match entry.file_type() {
            Ok(file_type) => filetype(file_type),
            Err(err) => {
                return Some(Err(io_error(
                    Family::ReadDir,
                    format_args!("readdir({})", self.path),
                    err,
                )));
            }
        };
        #[cfg(unix)]
        let inode = std::os::unix::fs::DirEntryExt::ino(&entry);
        #[cfg(not(unix))]
        let inode = 0;
        Some(Ok(RawDirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            file_type,
            inode,
        }))
    }

    fn yields_dot_entries(&self) -> bool {
        false
    }

    fn dot_entries(&mut self) -> Result<[RawDirEntry; 2], ReadDirError> {
        let parent = self.path.parent().unwrap_or_else(|| self.path.clone());
        Ok([
            Self::dot_entry(".", &self.path)?,
            Self::dot_entry("..", &parent)?,
        ])
    }

    fn close(&mut self) -> Result<(), CloseError> {
        self.entries = None;
        Ok(())
    }
}
