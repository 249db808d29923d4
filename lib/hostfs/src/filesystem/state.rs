use std::sync::Arc;

use parking_lot::Mutex;
use wasi_hostfs_types::{Fd, FdRightsBlock, Rights};

use crate::backend::FileSystemBackend;
use crate::error::{ErrorKind, FileSystemOperationError, fd_not_open, operation_error};
use crate::fd_table::FileDescriptorTable;
use crate::path::{BaseDirectory, ResolvePathError, VirtualPath};
use crate::resolver::{PathResolver, ResolvedPath};
use crate::resource::FdResource;

/// Everything the operation handlers share.
#[derive(Debug)]
pub(crate) struct FileSystemState {
    pub(crate) backend: Arc<dyn FileSystemBackend>,
    pub(crate) resolver: PathResolver,
    pub(crate) fds: FileDescriptorTable<Arc<dyn FdResource>>,
    /// Held from resolution to the native call by backends that address
    /// host paths by name.
    namespace: Option<Mutex<()>>,
}

impl FileSystemState {
    pub(crate) fn new(
        backend: Arc<dyn FileSystemBackend>,
        resolver: PathResolver,
        fds: FileDescriptorTable<Arc<dyn FdResource>>,
    ) -> Self {
        let namespace = (!backend.resolves_beneath_handles()).then(|| Mutex::new(()));
        Self {
            backend,
            resolver,
            fds,
            namespace,
        }
    }

    /// Runs `f` so that no other operation of this filesystem can rename a
    /// component between a resolution and the native call that uses it.
    pub(crate) fn path_operation<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.namespace.as_ref().map(Mutex::lock);
        f()
    }

    pub(crate) fn resource<E: FileSystemOperationError>(
        &self,
        fd: Fd,
    ) -> Result<Arc<dyn FdResource>, E> {
        self.fds.get(fd).ok_or_else(|| fd_not_open(fd))
    }

    /// The resource of `fd` if its rights include all of `required`.
    pub(crate) fn resource_with_rights<E: FileSystemOperationError>(
        &self,
        fd: Fd,
        required: Rights,
    ) -> Result<Arc<dyn FdResource>, E> {
        let resource = self.resource::<E>(fd)?;
        check_rights::<E>(fd, resource.rights(), required)?;
        Ok(resource)
    }

    /// Handle of the directory `base` refers to, if any.
    pub(crate) fn base_fd(&self, base: BaseDirectory) -> Option<Fd> {
        match base {
            BaseDirectory::DirectoryFd(fd) => Some(fd),
            BaseDirectory::CurrentWorkingDirectory => self.resolver.current_working_directory(),
            BaseDirectory::None => None,
        }
    }

    /// Checks that the base directory grants `required` and returns its
    /// rights. Without a base directory handle everything is granted.
    pub(crate) fn base_rights<E: FileSystemOperationError>(
        &self,
        base: BaseDirectory,
        required: Rights,
    ) -> Result<FdRightsBlock, E> {
        let Some(fd) = self.base_fd(base) else {
            return Ok(FdRightsBlock::ALL);
        };
        let resource = self.resource::<E>(fd)?;
        if resource.directory().is_none() {
            return Err(operation_error(
                ErrorKind::NotDirectory,
                format!("File descriptor {fd} is not a directory"),
            ));
        }
        let rights = resource.rights();
        check_rights::<E>(fd, rights, required)?;
        Ok(rights)
    }

    pub(crate) fn resolve<E>(
        &self,
        path: &VirtualPath,
        base: BaseDirectory,
        follow_symlinks: bool,
    ) -> Result<ResolvedPath, E>
    where
        E: FileSystemOperationError + From<ResolvePathError>,
    {
        let resolved =
            self.resolver
                .resolve(&self.fds, &*self.backend, path, base, follow_symlinks)?;
        Ok(resolved)
    }

    /// Guest spelling of `path` opened relative to `base`.
    pub(crate) fn child_virtual_path(&self, path: &VirtualPath, base: BaseDirectory) -> String {
        if path.is_absolute() {
            return path.to_string();
        }
        let parent = self
            .base_fd(base)
            .and_then(|fd| self.fds.get(fd))
            .and_then(|resource| resource.directory().map(|info| info.virtual_path.clone()));
        match parent {
            Some(parent) if !parent.is_empty() => {
                format!("{}/{}", parent.trim_end_matches('/'), path)
            }
            _ => path.to_string(),
        }
    }
}

pub(crate) fn check_rights<E: FileSystemOperationError>(
    fd: Fd,
    granted: FdRightsBlock,
    required: Rights,
) -> Result<(), E> {
    if granted.has(required) {
        Ok(())
    } else {
        Err(operation_error(
            ErrorKind::NotCapable,
            format!(
                "File descriptor {fd} lacks rights {:?}",
                required - granted.rights
            ),
        ))
    }
}
