//! Handle-relative addressing of resolved paths.
//!
//! A sandboxed path is reached from a duplicate of its anchor's descriptor.
//! The parent directories are opened without following symlinks, with
//! `openat2(RESOLVE_BENEATH)` on Linux and one `openat(O_NOFOLLOW)` per
//! component elsewhere, and the final name goes to the `*at` call. A
//! component swapped for a symlink after resolution fails the call instead
//! of redirecting it.

use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;

use crate::resolver::ResolvedPath;

const DIRECTORY_FLAGS: libc::c_int =
    libc::O_RDONLY | libc::O_DIRECTORY | libc::O_NOFOLLOW | libc::O_CLOEXEC;

/// A directory descriptor and a name inside it. Root-access paths use
/// `AT_FDCWD` and the absolute host path.
#[derive(Debug)]
pub(super) struct At {
    dir: Option<OwnedFd>,
    name: CString,
}

impl At {
    pub(super) fn new(path: &ResolvedPath) -> io::Result<Self> {
        let Some(beneath) = path.beneath() else {
            return Ok(Self {
                dir: None,
                name: cstring(path.real_path().as_os_str().as_bytes())?,
            });
        };
        let anchor = beneath
            .anchor
            .directory_handle()
            .unwrap_or_else(|| Err(io::Error::from_raw_os_error(libc::ENOTDIR)))?;
        match beneath.components.split_last() {
            None => Ok(Self {
                dir: Some(anchor),
                name: cstring(b".")?,
            }),
            Some((name, parents)) => Ok(Self {
                dir: Some(open_parent(anchor, parents)?),
                name: cstring(name.as_bytes())?,
            }),
        }
    }

    pub(super) fn dirfd(&self) -> RawFd {
        self.dir.as_ref().map_or(libc::AT_FDCWD, AsRawFd::as_raw_fd)
    }

    pub(super) fn name(&self) -> &CStr {
        &self.name
    }

    /// Whether a final symlink may be followed. Below an anchor the resolver
    /// already expanded every link it was asked to follow.
    pub(super) fn follows(&self, requested: bool) -> bool {
        requested && self.dir.is_none()
    }

    pub(super) fn is_confined(&self) -> bool {
        self.dir.is_some()
    }
}

fn open_parent(anchor: OwnedFd, components: &[String]) -> io::Result<OwnedFd> {
    if components.is_empty() {
        return Ok(anchor);
    }
    #[cfg(target_os = "linux")]
    match openat2_beneath(&anchor, components) {
        Ok(fd) => return Ok(fd),
        // Missing on older kernels; EAGAIN follows a concurrent rename.
        Err(err)
            if matches!(
                err.raw_os_error(),
                Some(libc::ENOSYS | libc::EPERM | libc::EAGAIN)
            ) =>
        {
            tracing::trace!(error = %err, "openat2 unavailable, walking components");
        }
        Err(err) => return Err(err),
    }
    components
        .iter()
        .try_fold(anchor, |dir, name| open_component(&dir, name))
}

fn open_component(dir: &OwnedFd, name: &str) -> io::Result<OwnedFd> {
    let cname = cstring(name.as_bytes())?;
    let fd = unsafe { libc::openat(dir.as_raw_fd(), cname.as_ptr(), DIRECTORY_FLAGS) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[cfg(target_os = "linux")]
fn openat2_beneath(anchor: &OwnedFd, components: &[String]) -> io::Result<OwnedFd> {
    let path = cstring(components.join("/").as_bytes())?;
    let mut how: libc::open_how = unsafe { std::mem::zeroed() };
    how.flags = DIRECTORY_FLAGS as u64;
    how.resolve = libc::RESOLVE_BENEATH | libc::RESOLVE_NO_SYMLINKS | libc::RESOLVE_NO_MAGICLINKS;
    let fd = unsafe {
        libc::syscall(
            libc::SYS_openat2,
            anchor.as_raw_fd(),
            path.as_ptr(),
            &how as *const libc::open_how,
            std::mem::size_of::<libc::open_how>(),
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}

pub(super) fn cstring(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))
}
