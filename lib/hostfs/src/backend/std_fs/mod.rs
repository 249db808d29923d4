//! Portable backend over `std::fs`.
//!
//! Directory listings from `std::fs::read_dir` omit `.` and `..`; they are
//! synthesized by the readdir adapter. Positional reads and writes move the
//! cursor and restore it afterwards.

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use filetime::FileTime;
use wasi_hostfs_types::{
    FdRightsBlock, FileAccessibilityCheck, FileMode, Filestat, Filetype, Fdflags, OpenFileFlags,
    Timespec,
};

use super::errors::{Family, io_error};
use super::{BackendKind, FileSystemBackend, OpenRequest};
use crate::error::{
    CheckAccessError, ErrorKind, FileSystemError, HardlinkError, MkdirError, OpenError,
    ReadLinkError, RenameError, SetTimestampError, StatError, SymlinkError,
    UnlinkDirectoryError, UnlinkError, operation_error,
};
use crate::op::OperationTag;
use crate::path::RealPath;
use crate::resolver::{ComponentLookup, ResolvedPath};
use crate::resource::{DirectoryInfo, FdResource};

mod dir;
mod file;

use dir::StdDirectory;
use file::StdFile;

#[derive(Debug, Default)]
pub struct StdBackend {}

impl StdBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_file(&self, request: &OpenRequest<'_>) -> io::Result<fs::File> {
        let path = request.path.real_path().as_path();
        let access = request.flags.access_mode();
        let writable = access.is_writable();
        let create = request.flags.is_create();
        let exclusive = request.flags.contains(OpenFileFlags::O_EXCL);

        // `std` refuses to create a file without write access.
        if create && !writable {
            let mut options = fs::OpenOptions::new();
            options.write(true).create_new(true);
            set_mode(&mut options, request.mode);
            match options.open(path) {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && !exclusive => {}
                Err(err) => return Err(err),
            }
        }

        let mut options = fs::OpenOptions::new();
        options
            .read(access.is_readable())
            .write(writable)
            .truncate(writable && request.flags.contains(OpenFileFlags::O_TRUNC));
        if create && writable {
            if exclusive {
                options.create_new(true);
            } else {
                options.create(true);
            }
        }
        set_mode(&mut options, request.mode);
        options.open(path)
    }
}

#[cfg(unix)]
fn set_mode(options: &mut fs::OpenOptions, mode: FileMode) {
    use std::os::unix::fs::OpenOptionsExt;

    options.mode(mode.bits());
}

#[cfg(not(unix))]
fn set_mode(_options: &mut fs::OpenOptions, _mode: FileMode) {}

fn metadata(path: &RealPath, follow_symlinks: bool) -> io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

impl ComponentLookup for StdBackend {
    fn lookup(&self, path: &RealPath) -> Result<Option<Filetype>, FileSystemError> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(filetype(meta.file_type()))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(Family::Stat, format_args!("lstat({path})"), err)),
        }
    }

    fn read_link_target(&self, path: &RealPath) -> Result<String, FileSystemError> {
        let path = ResolvedPath::host(path.clone());
        FileSystemBackend::read_link(self, &path).map_err(FileSystemError::from)
    }
}

impl FileSystemBackend for StdBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Std
    }

    fn supports(&self, tag: OperationTag) -> bool {
        tag != OperationTag::FadviseFd
    }

    #[tracing::instrument(level = "trace", skip_all, fields(path = %request.path, flags = ?request.flags))]
    fn open(&self, request: OpenRequest<'_>) -> Result<Arc<dyn FdResource>, OpenError> {
        let path = request.path.real_path();
        match metadata(path, !request.flags.is_nofollow()) {
            Ok(meta) if meta.is_dir() => {
                if request.flags.is_create() {
                    let kind = if request.flags.contains(OpenFileFlags::O_EXCL) {
                        ErrorKind::Exists
                    } else {
                        ErrorKind::PathIsDirectory
                    };
                    return Err(operation_error(kind, format!("{path} is a directory")));
                }
                let info = DirectoryInfo {
                    real_path: path.clone(),
                    virtual_path: request.virtual_path,
                    is_preopened: false,
                };
                return self.open_directory(path, info, request.directory_rights);
            }
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(operation_error(
                    ErrorKind::TooManySymbolicLinks,
                    format!("{path} is a symbolic link"),
                ));
            }
            Ok(_) if request.flags.is_directory() => {
                return Err(operation_error(
                    ErrorKind::NotDirectory,
                    format!("{path} is not a directory"),
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound && request.flags.is_create() => {}
            Err(err) => return Err(io_error(Family::Open, format_args!("open({path})"), err)),
        }

        let file = self
            .open_file(&request)
            .map_err(|err| io_error::<OpenError>(Family::Open, format_args!("open({path})"), err))?;
        let mut fdflags = request.fdflags;
        if request.flags.contains(OpenFileFlags::O_APPEND) {
            fdflags |= Fdflags::APPEND;
        }
        Ok(Arc::new(StdFile::new(
            file,
            path.clone(),
            request.file_rights,
            fdflags,
        )))
    }

    fn open_directory(
        &self,
        path: &RealPath,
        info: DirectoryInfo,
        rights: FdRightsBlock,
    ) -> Result<Arc<dyn FdResource>, OpenError> {
        let meta = fs::metadata(path)
            .map_err(|err| io_error::<OpenError>(Family::Open, format_args!("open({path})"), err))?;
        if !meta.is_dir() {
            return Err(operation_error(
                ErrorKind::NotDirectory,
                format!("{path} is not a directory"),
            ));
        }
        Ok(Arc::new(StdDirectory::new(info, rights, &meta)))
    }

    fn stat(&self, path: &ResolvedPath, follow_symlinks: bool) -> Result<Filestat, StatError> {
        let path = path.real_path();
        metadata(path, follow_symlinks)
            .map(|meta| filestat(&meta))
            .map_err(|err| io_error(Family::Stat, format_args!("stat({path})"), err))
    }

    fn mkdir(&self, path: &ResolvedPath, mode: FileMode) -> Result<(), MkdirError> {
        let path = path.real_path();
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode.bits());
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder
            .create(path)
            .map_err(|err| io_error(Family::Mkdir, format_args!("mkdir({path})"), err))
    }

    fn rename(&self, from: &ResolvedPath, to: &ResolvedPath) -> Result<(), RenameError> {
        let from = from.real_path();
        let to = to.real_path();
        fs::rename(from, to)
            .map_err(|err| io_error(Family::Rename, format_args!("rename({from}, {to})"), err))
    }

    fn unlink_file(&self, path: &ResolvedPath) -> Result<(), UnlinkError> {
        let path = path.real_path();
        fs::remove_file(path)
            .map_err(|err| io_error(Family::Unlink, format_args!("unlink({path})"), err))
    }

    fn unlink_directory(&self, path: &ResolvedPath) -> Result<(), UnlinkDirectoryError> {
        let path = path.real_path();
        fs::remove_dir(path).map_err(|err| {
            io_error(Family::UnlinkDirectory, format_args!("rmdir({path})"), err)
        })
    }

    fn symlink(&self, target: &str, link: &ResolvedPath) -> Result<(), SymlinkError> {
        let link = link.real_path();
        create_symlink(target, link).map_err(|err| {
            io_error(Family::Symlink, format_args!("symlink({target}, {link})"), err)
        })
    }

    fn read_link(&self, path: &ResolvedPath) -> Result<String, ReadLinkError> {
        let path = path.real_path();
        let target = fs::read_link(path)
            .map_err(|err| {
                io_error::<ReadLinkError>(Family::Readlink, format_args!("readlink({path})"), err)
            })?;
        match target.into_os_string().into_string() {
            Ok(target) if cfg!(windows) => Ok(target.replace('\\', "/")),
            Ok(target) => Ok(target),
            Err(_) => Err(super::not_utf8(path).into()),
        }
    }

    fn hardlink(
        &self,
        from: &ResolvedPath,
        to: &ResolvedPath,
        follow_symlinks: bool,
    ) -> Result<(), HardlinkError> {
        let (from, to) = (from.real_path(), to.real_path());
        let to_error =
            |err| io_error(Family::Hardlink, format_args!("link({from}, {to})"), err);
        if follow_symlinks {
            let source = dunce::canonicalize(from).map_err(to_error)?;
            fs::hard_link(source, to).map_err(to_error)
        } else {
            fs::hard_link(from, to).map_err(to_error)
        }
    }

    fn set_timestamp(
        &self,
        path: &ResolvedPath,
        follow_symlinks: bool,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        let path = path.real_path();
        let to_error =
            |err| io_error(Family::SetTimestamp, format_args!("utimes({path})"), err);
        let meta = metadata(path, follow_symlinks).map_err(to_error)?;
        let atime = atime
            .map(to_filetime)
            .unwrap_or_else(|| FileTime::from_last_access_time(&meta));
        let mtime = mtime
            .map(to_filetime)
            .unwrap_or_else(|| FileTime::from_last_modification_time(&meta));
        if follow_symlinks {
            filetime::set_file_times(path, atime, mtime).map_err(to_error)
        } else {
            filetime::set_symlink_file_times(path, atime, mtime).map_err(to_error)
        }
    }

    fn check_access(
        &self,
        path: &ResolvedPath,
        mode: FileAccessibilityCheck,
        follow_symlinks: bool,
        _use_effective_ids: bool,
    ) -> Result<(), CheckAccessError> {
        let path = path.real_path();
        let meta = metadata(path, follow_symlinks).map_err(|err| {
            io_error::<CheckAccessError>(Family::CheckAccess, format_args!("access({path})"), err)
        })?;
        let denied = |what: &str| {
            Err(operation_error(
                ErrorKind::AccessDenied,
                format!("{path} is not {what}"),
            ))
        };
        if mode.contains(FileAccessibilityCheck::WRITABLE) && meta.permissions().readonly() {
            return denied("writable");
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let bits = meta.permissions().mode();
            if mode.contains(FileAccessibilityCheck::READABLE) && bits & 0o444 == 0 {
                return denied("readable");
            }
            if mode.contains(FileAccessibilityCheck::EXECUTABLE) && bits & 0o111 == 0 {
                return denied("executable");
            }
        }
        Ok(())
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn create_symlink(target: &str, link: &RealPath) -> io::Result<()> {
            std::os::unix::fs::symlink(target, link)
        }
    } else if #[cfg(windows)] {
        fn create_symlink(target: &str, link: &RealPath) -> io::Result<()> {
            let target = target.replace('/', "\\");
            let resolved = link
                .as_path()
                .parent()
                .map(|parent| parent.join(&target))
                .unwrap_or_else(|| std::path::PathBuf::from(&target));
            if resolved.is_dir() {
                std::os::windows::fs::symlink_dir(&target, link)
            } else {
                std::os::windows::fs::symlink_file(&target, link)
            }
        }
    } else {
        fn create_symlink(_target: &str, _link: &RealPath) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }
    }
}

fn filetype(file_type: fs::FileType) -> Filetype {
    if file_type.is_dir() {
        return Filetype::Directory;
    }
    if file_type.is_file() {
        return Filetype::RegularFile;
    }
    if file_type.is_symlink() {
        return Filetype::SymbolicLink;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        if file_type.is_block_device() {
            return Filetype::BlockDevice;
        }
        if file_type.is_char_device() {
            return Filetype::CharacterDevice;
        }
        if file_type.is_socket() {
            return Filetype::SocketStream;
        }
    }
    Filetype::Unknown
}

#[cfg(unix)]
fn filestat(meta: &fs::Metadata) -> Filestat {
    use std::os::unix::fs::MetadataExt;

    Filestat {
        device_id: meta.dev(),
        inode: meta.ino(),
        mode: meta.mode() & 0o7777,
        file_type: filetype(meta.file_type()),
        links: meta.nlink(),
        uid: meta.uid() as u64,
        gid: meta.gid() as u64,
        rdev: meta.rdev(),
        size: meta.size(),
        block_size: meta.blksize(),
        blocks: meta.blocks(),
        access_time: Timespec::new(meta.atime(), meta.atime_nsec()),
        modification_time: Timespec::new(meta.mtime(), meta.mtime_nsec()),
        change_time: Timespec::new(meta.ctime(), meta.ctime_nsec()),
    }
}

#[cfg(not(unix))]
fn filestat(meta: &fs::Metadata) -> Filestat {
    let file_type = filetype(meta.file_type());
    let mut mode = if meta.permissions().readonly() {
        0o444
    } else {
        0o666
    };
    if file_type == Filetype::Directory {
        mode |= 0o111;
    }
    let modification_time = timespec(meta.modified());
    Filestat {
        mode,
        file_type,
        links: 1,
        size: meta.len(),
        access_time: timespec(meta.accessed()),
        modification_time,
        change_time: modification_time,
        ..Filestat::default()
    }
}

#[cfg_attr(unix, allow(dead_code))]
fn timespec(time: io::Result<SystemTime>) -> Timespec {
    match time.map(|time| time.duration_since(UNIX_EPOCH)) {
        Ok(Ok(since)) => Timespec::new(since.as_secs() as i64, since.subsec_nanos() as i64),
        Ok(Err(before)) => Timespec::from_nanoseconds(-(before.duration().as_nanos() as i64)),
        Err(_) => Timespec::default(),
    }
}

fn to_filetime(time: Timespec) -> FileTime {
    FileTime::from_unix_time(time.seconds, time.nanoseconds as u32)
}
