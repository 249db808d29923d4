//! Backend over raw `libc` calls.

use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;

use wasi_hostfs_types::{
    FdRightsBlock, Fdflags, FileAccessibilityCheck, FileMode, Filestat, Filetype, OpenFileFlags,
    Timespec,
};

use super::errors::{Family, io_error};
use super::{BackendKind, FileSystemBackend, OpenRequest};
use crate::error::{
    CheckAccessError, FileSystemError, HardlinkError, MkdirError, OpenError, ReadLinkError,
    RenameError, SetTimestampError, StatError, SymlinkError, UnlinkDirectoryError, UnlinkError,
};
use crate::path::RealPath;
use crate::resolver::{ComponentLookup, ResolvedPath};
use crate::resource::{DirectoryInfo, FdResource};

mod at;
mod dir;
mod file;

use at::At;
use dir::PosixDirectory;
use file::PosixFile;

#[derive(Debug, Default)]
pub struct PosixBackend {}

impl PosixBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentLookup for PosixBackend {
    fn lookup(&self, path: &RealPath) -> Result<Option<Filetype>, FileSystemError> {
        match stat_path(path, false) {
            Ok(stat) => Ok(Some(stat.file_type)),
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(None),
            Err(err) => Err(io_error(Family::Stat, format_args!("lstat({path})"), err)),
        }
    }

    fn read_link_target(&self, path: &RealPath) -> Result<String, FileSystemError> {
        let bytes = cstring(path)
            .and_then(|cpath| read_link_bytes(libc::AT_FDCWD, &cpath))
            .map_err(|err| {
                io_error::<FileSystemError>(Family::Readlink, format_args!("readlink({path})"), err)
            })?;
        String::from_utf8(bytes).map_err(|_| super::not_utf8(path))
    }
}

impl FileSystemBackend for PosixBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Posix
    }

    fn resolves_beneath_handles(&self) -> bool {
        true
    }

    #[tracing::instrument(level = "trace", skip_all, fields(path = %request.path, flags = ?request.flags))]
    fn open(&self, request: OpenRequest<'_>) -> Result<Arc<dyn FdResource>, OpenError> {
        let mut oflags = open_flags(request.flags, request.fdflags);
        let fd = At::new(request.path)
            .and_then(|at| {
                if at.is_confined() {
                    oflags |= libc::O_NOFOLLOW;
                }
                if request.path.is_directory_request() && !request.flags.is_create() {
                    oflags |= libc::O_DIRECTORY;
                }
                let fd = unsafe {
                    libc::openat(
                        at.dirfd(),
                        at.name().as_ptr(),
                        oflags,
                        request.mode.bits() as libc::c_uint,
                    )
                };
                if fd < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(unsafe { OwnedFd::from_raw_fd(fd) })
            })
            .map_err(|err| {
                io_error::<OpenError>(Family::Open, format_args!("open({})", request.path), err)
            })?;
        let stat = stat_fd(&fd)
            .map_err(|err| {
                io_error::<OpenError>(Family::Open, format_args!("fstat({})", request.path), err)
            })?;

        let real_path = request.path.real_path().clone();
        if stat.file_type == Filetype::Directory {
            let info = DirectoryInfo {
                real_path,
                virtual_path: request.virtual_path,
                is_preopened: false,
            };
            Ok(Arc::new(PosixDirectory::new(fd, info, request.directory_rights)))
        } else {
            Ok(Arc::new(PosixFile::new(
                fd,
                real_path,
                request.file_rights,
                request.fdflags,
            )))
        }
    }

    fn open_directory(
        &self,
        path: &RealPath,
        info: DirectoryInfo,
        rights: FdRightsBlock,
    ) -> Result<Arc<dyn FdResource>, OpenError> {
        let fd = cstring(path)
            .and_then(|cpath| {
                let fd = unsafe {
                    libc::open(cpath.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC)
                };
                if fd < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(unsafe { OwnedFd::from_raw_fd(fd) })
            })
            .map_err(|err| io_error::<OpenError>(Family::Open, format_args!("open({path})"), err))?;
        Ok(Arc::new(PosixDirectory::new(fd, info, rights)))
    }

    fn stat(&self, path: &ResolvedPath, follow_symlinks: bool) -> Result<Filestat, StatError> {
        let result = At::new(path).and_then(|at| {
            let mut st = unsafe { mem::zeroed::<libc::stat>() };
            let flags = nofollow_flag(&at, follow_symlinks);
            cvt(unsafe { libc::fstatat(at.dirfd(), at.name().as_ptr(), &mut st, flags) })?;
            Ok(stat_from_libc(&st))
        });
        result.map_err(|err| io_error(Family::Stat, format_args!("stat({path})"), err))
    }

    fn mkdir(&self, path: &ResolvedPath, mode: FileMode) -> Result<(), MkdirError> {
        let result = At::new(path).and_then(|at| {
            cvt(unsafe {
                libc::mkdirat(at.dirfd(), at.name().as_ptr(), mode.bits() as libc::mode_t)
            })
        });
        result.map_err(|err| io_error(Family::Mkdir, format_args!("mkdir({path})"), err))
    }

    fn rename(&self, from: &ResolvedPath, to: &ResolvedPath) -> Result<(), RenameError> {
        let result = At::new(from).and_then(|source| {
            let target = At::new(to)?;
            cvt(unsafe {
                libc::renameat(
                    source.dirfd(),
                    source.name().as_ptr(),
                    target.dirfd(),
                    target.name().as_ptr(),
                )
            })
        });
        result.map_err(|err| io_error(Family::Rename, format_args!("rename({from}, {to})"), err))
    }

    fn unlink_file(&self, path: &ResolvedPath) -> Result<(), UnlinkError> {
        let result = At::new(path)
            .and_then(|at| cvt(unsafe { libc::unlinkat(at.dirfd(), at.name().as_ptr(), 0) }));
        result.map_err(|err| io_error(Family::Unlink, format_args!("unlink({path})"), err))
    }

    fn unlink_directory(&self, path: &ResolvedPath) -> Result<(), UnlinkDirectoryError> {
        let result = At::new(path).and_then(|at| {
            cvt(unsafe { libc::unlinkat(at.dirfd(), at.name().as_ptr(), libc::AT_REMOVEDIR) })
        });
        result.map_err(|err| io_error(Family::UnlinkDirectory, format_args!("rmdir({path})"), err))
    }

    fn symlink(&self, target: &str, link: &ResolvedPath) -> Result<(), SymlinkError> {
        let result = CString::new(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "target contains NUL"))
            .and_then(|ctarget| {
                let at = At::new(link)?;
                cvt(unsafe { libc::symlinkat(ctarget.as_ptr(), at.dirfd(), at.name().as_ptr()) })
            });
        result.map_err(|err| {
            io_error(Family::Symlink, format_args!("symlink({target}, {link})"), err)
        })
    }

    fn read_link(&self, path: &ResolvedPath) -> Result<String, ReadLinkError> {
        let bytes = At::new(path)
            .and_then(|at| read_link_bytes(at.dirfd(), at.name()))
            .map_err(|err| {
                io_error::<ReadLinkError>(Family::Readlink, format_args!("readlink({path})"), err)
            })?;
        String::from_utf8(bytes).map_err(|_| super::not_utf8(path.real_path()).into())
    }

    fn hardlink(
        &self,
        from: &ResolvedPath,
        to: &ResolvedPath,
        follow_symlinks: bool,
    ) -> Result<(), HardlinkError> {
        let result = At::new(from).and_then(|source| {
            let target = At::new(to)?;
            let flags = if source.follows(follow_symlinks) {
                libc::AT_SYMLINK_FOLLOW
            } else {
                0
            };
            cvt(unsafe {
                libc::linkat(
                    source.dirfd(),
                    source.name().as_ptr(),
                    target.dirfd(),
                    target.name().as_ptr(),
                    flags,
                )
            })
        });
        result.map_err(|err| io_error(Family::Hardlink, format_args!("link({from}, {to})"), err))
    }

    fn set_timestamp(
        &self,
        path: &ResolvedPath,
        follow_symlinks: bool,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
    ) -> Result<(), SetTimestampError> {
        let times = utimens_times(atime, mtime);
        let result = At::new(path).and_then(|at| {
            let flags = nofollow_flag(&at, follow_symlinks);
            cvt(unsafe { libc::utimensat(at.dirfd(), at.name().as_ptr(), times.as_ptr(), flags) })
        });
        result.map_err(|err| {
            io_error(Family::SetTimestamp, format_args!("utimensat({path})"), err)
        })
    }

    fn check_access(
        &self,
        path: &ResolvedPath,
        mode: FileAccessibilityCheck,
        follow_symlinks: bool,
        use_effective_ids: bool,
    ) -> Result<(), CheckAccessError> {
        let mut amode = libc::F_OK;
        if mode.contains(FileAccessibilityCheck::READABLE) {
            amode |= libc::R_OK;
        }
        if mode.contains(FileAccessibilityCheck::WRITABLE) {
            amode |= libc::W_OK;
        }
        if mode.contains(FileAccessibilityCheck::EXECUTABLE) {
            amode |= libc::X_OK;
        }
        let result = At::new(path).and_then(|at| {
            let mut flags = nofollow_flag(&at, follow_symlinks);
            if use_effective_ids {
                flags |= libc::AT_EACCESS;
            }
            cvt(unsafe { libc::faccessat(at.dirfd(), at.name().as_ptr(), amode, flags) })
        });
        result.map_err(|err| io_error(Family::CheckAccess, format_args!("faccessat({path})"), err))
    }
}

fn nofollow_flag(at: &At, follow_symlinks: bool) -> libc::c_int {
    if at.follows(follow_symlinks) {
        0
    } else {
        libc::AT_SYMLINK_NOFOLLOW
    }
}

/// Native `open(2)` flags for guest flags numbered as on Linux.
fn open_flags(flags: OpenFileFlags, fdflags: Fdflags) -> libc::c_int {
    let mut oflags = libc::O_CLOEXEC
        | match flags.access_mode() {
            wasi_hostfs_types::AccessMode::ReadOnly => libc::O_RDONLY,
            wasi_hostfs_types::AccessMode::WriteOnly => libc::O_WRONLY,
            wasi_hostfs_types::AccessMode::ReadWrite => libc::O_RDWR,
        };
    let table = [
        (OpenFileFlags::O_CREAT, libc::O_CREAT),
        (OpenFileFlags::O_EXCL, libc::O_EXCL),
        (OpenFileFlags::O_TRUNC, libc::O_TRUNC),
        (OpenFileFlags::O_APPEND, libc::O_APPEND),
        (OpenFileFlags::O_NONBLOCK, libc::O_NONBLOCK),
        (OpenFileFlags::O_DIRECTORY, libc::O_DIRECTORY),
        (OpenFileFlags::O_NOFOLLOW, libc::O_NOFOLLOW),
        (OpenFileFlags::O_NOCTTY, libc::O_NOCTTY),
    ];
    for (flag, native) in table {
        if flags.contains(flag) {
            oflags |= native;
        }
    }
    if flags.contains(OpenFileFlags::O_SYNC) || fdflags.contains(Fdflags::SYNC) {
        oflags |= libc::O_SYNC;
    }
    if flags.contains(OpenFileFlags::O_DSYNC) || fdflags.contains(Fdflags::DSYNC) {
        oflags |= libc::O_DSYNC;
    }
    #[cfg(target_os = "linux")]
    if fdflags.contains(Fdflags::RSYNC) {
        oflags |= libc::O_RSYNC;
    }
    oflags | fdflags_to_native(fdflags)
}

fn fdflags_to_native(fdflags: Fdflags) -> libc::c_int {
    let mut native = 0;
    if fdflags.contains(Fdflags::APPEND) {
        native |= libc::O_APPEND;
    }
    if fdflags.contains(Fdflags::NONBLOCK) {
        native |= libc::O_NONBLOCK;
    }
    native
}

fn cstring(path: &RealPath) -> io::Result<CString> {
    at::cstring(path.as_os_str().as_bytes())
}

fn cvt(res: libc::c_int) -> io::Result<()> {
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn stat_path(path: &RealPath, follow_symlinks: bool) -> io::Result<Filestat> {
    let cpath = cstring(path)?;
    let mut st = unsafe { mem::zeroed::<libc::stat>() };
    let res = if follow_symlinks {
        unsafe { libc::stat(cpath.as_ptr(), &mut st) }
    } else {
        unsafe { libc::lstat(cpath.as_ptr(), &mut st) }
    };
    cvt(res)?;
    Ok(stat_from_libc(&st))
}

fn stat_fd(fd: &OwnedFd) -> io::Result<Filestat> {
    use std::os::fd::AsRawFd;

    stat_raw_fd(fd.as_raw_fd())
}

fn stat_raw_fd(fd: libc::c_int) -> io::Result<Filestat> {
    let mut st = unsafe { mem::zeroed::<libc::stat>() };
    cvt(unsafe { libc::fstat(fd, &mut st) })?;
    Ok(stat_from_libc(&st))
}

fn read_link_bytes(dirfd: RawFd, name: &CStr) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; 1024];
    loop {
        let res = unsafe {
            libc::readlinkat(dirfd, name.as_ptr(), buf.as_mut_ptr() as *mut libc::c_char, buf.len())
        };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        let len = res as usize;
        if len < buf.len() {
            buf.truncate(len);
            return Ok(buf);
        }
        buf.resize(buf.len() * 2, 0);
    }
}

fn stat_from_libc(st: &libc::stat) -> Filestat {
    let mode = st.st_mode as u32;
    let (access_time, modification_time, change_time) = stat_times(st);
    Filestat {
        device_id: st.st_dev as u64,
        inode: st.st_ino as u64,
        mode: mode & 0o7777,
        file_type: Filetype::from_mode(mode),
        links: st.st_nlink as u64,
        uid: st.st_uid as u64,
        gid: st.st_gid as u64,
        rdev: st.st_rdev as u64,
        size: st.st_size as u64,
        block_size: st.st_blksize as u64,
        blocks: st.st_blocks as u64,
        access_time,
        modification_time,
        change_time,
    }
}

#[cfg(target_os = "macos")]
fn stat_times(st: &libc::stat) -> (Timespec, Timespec, Timespec) {
    (
        Timespec::new(st.st_atimespec.tv_sec, st.st_atimespec.tv_nsec as i64),
        Timespec::new(st.st_mtimespec.tv_sec, st.st_mtimespec.tv_nsec as i64),
        Timespec::new(st.st_ctimespec.tv_sec, st.st_ctimespec.tv_nsec as i64),
    )
}

#[cfg(not(target_os = "macos"))]
fn stat_times(st: &libc::stat) -> (Timespec, Timespec, Timespec) {
    (
        Timespec::new(st.st_atime as i64, st.st_atime_nsec as i64),
        Timespec::new(st.st_mtime as i64, st.st_mtime_nsec as i64),
        Timespec::new(st.st_ctime as i64, st.st_ctime_nsec as i64),
    )
}

fn utimens_times(atime: Option<Timespec>, mtime: Option<Timespec>) -> [libc::timespec; 2] {
    let convert = |time: Option<Timespec>| match time {
        Some(time) => libc::timespec {
            tv_sec: time.seconds as libc::time_t,
            tv_nsec: time.nanoseconds as _,
        },
        None => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
    };
    [convert(atime), convert(mtime)]
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn errno_location() -> *mut libc::c_int {
            unsafe { libc::__errno_location() }
        }
    } else if #[cfg(target_os = "macos")] {
        fn errno_location() -> *mut libc::c_int {
            unsafe { libc::__error() }
        }
    }
}

fn errno() -> i32 {
    unsafe { *errno_location() }
}

fn set_errno(val: i32) {
    unsafe {
        *errno_location() = val;
    }
}
