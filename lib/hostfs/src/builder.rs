//! Construction of a [`HostFileSystem`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use wasi_hostfs_types::{FIRST_PREOPEN_FD, Fd, FdRightsBlock, MAX_FD};

use crate::backend::BackendKind;
use crate::fd_table::FileDescriptorTable;
use crate::filesystem::{FileSystemState, HostFileSystem, executor};
use crate::path::RealPath;
use crate::pipeline::{
    FileSystemInterceptor, GlobalLockInterceptor, LoggingInterceptor, LoggingLevel, Pipeline,
};
use crate::resolver::PathResolver;
use crate::resource::{DirectoryInfo, FdResource};
use crate::stdio::StandardInputOutput;

/// Error type returned when bad configuration is given to
/// [`FileSystemBuilder`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FileSystemCreationError {
    #[error("preopened directory alias has wrong format: `{0}`")]
    PreopenAliasFormattingError(String),
    #[error("preopened directory alias is used twice: `{0}`")]
    DuplicatePreopenAlias(String),
    #[error("preopened directory not found: `{0}`")]
    PreopenedDirectoryNotFound(PathBuf),
    #[error("preopened directory error: `{0}`")]
    PreopenedDirectoryError(String),
    #[error("too many preopened directories: {0}")]
    TooManyPreopens(usize),
    #[error("current working directory error: `{0}`")]
    CurrentWorkingDirectoryError(String),
    #[error("backend `{0:?}` is not available on this platform")]
    BackendUnavailable(BackendKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Preopen {
    real_path: PathBuf,
    alias: String,
}

/// Builder for [`HostFileSystem`].
///
/// ```no_run
/// # use wasi_hostfs::{FileSystemBuilder, LoggingLevel};
/// let fs = FileSystemBuilder::new()
///     .preopen("/srv/www", "/www")
///     .logging(LoggingLevel::Basic)
///     .build()?;
/// # Ok::<(), wasi_hostfs::FileSystemCreationError>(())
/// ```
#[derive(Default)]
pub struct FileSystemBuilder {
    preopens: Vec<Preopen>,
    current_working_directory: Option<PathBuf>,
    allow_root_access: bool,
    backend: BackendKind,
    interceptors: Vec<Arc<dyn FileSystemInterceptor>>,
    logging: LoggingLevel,
    global_lock: bool,
    stdio: Option<StandardInputOutput>,
}

impl fmt::Debug for FileSystemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemBuilder")
            .field("preopens", &self.preopens)
            .field("current_working_directory", &self.current_working_directory)
            .field("allow_root_access", &self.allow_root_access)
            .field("backend", &self.backend)
            .field("interceptors", &self.interceptors.len())
            .field("logging", &self.logging)
            .field("global_lock", &self.global_lock)
            .field("stdio_override exists", &self.stdio.is_some())
            .finish()
    }
}

impl FileSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants the guest access to `real_path`, visible as `alias`.
    ///
    /// Preopens get consecutive handles starting at [`FIRST_PREOPEN_FD`] in
    /// the order they are added.
    pub fn preopen(mut self, real_path: impl AsRef<Path>, alias: impl Into<String>) -> Self {
        self.add_preopen(real_path, alias);
        self
    }

    pub fn add_preopen(&mut self, real_path: impl AsRef<Path>, alias: impl Into<String>) {
        self.preopens.push(Preopen {
            real_path: real_path.as_ref().to_path_buf(),
            alias: alias.into(),
        });
    }

    /// Directory that relative paths with
    /// [`BaseDirectory::CurrentWorkingDirectory`](crate::BaseDirectory) resolve against.
    pub fn current_working_directory(mut self, path: impl AsRef<Path>) -> Self {
        self.set_current_working_directory(path);
        self
    }

    pub fn set_current_working_directory(&mut self, path: impl AsRef<Path>) {
        self.current_working_directory = Some(path.as_ref().to_path_buf());
    }

    /// Disables the sandbox: absolute guest paths address the host root.
    pub fn allow_root_access(mut self, allow: bool) -> Self {
        self.set_allow_root_access(allow);
        self
    }

    pub fn set_allow_root_access(&mut self, allow: bool) {
        self.allow_root_access = allow;
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.set_backend(backend);
        self
    }

    pub fn set_backend(&mut self, backend: BackendKind) {
        self.backend = backend;
    }

    /// Appends an interceptor. Interceptors run in the order they are added,
    /// after the global lock and logging stages.
    pub fn interceptor(mut self, interceptor: impl FileSystemInterceptor + 'static) -> Self {
        self.add_interceptor(interceptor);
        self
    }

    pub fn add_interceptor(&mut self, interceptor: impl FileSystemInterceptor + 'static) {
        self.interceptors.push(Arc::new(interceptor));
    }

    pub fn logging(mut self, level: LoggingLevel) -> Self {
        self.set_logging(level);
        self
    }

    pub fn set_logging(&mut self, level: LoggingLevel) {
        self.logging = level;
    }

    /// Serializes all operations behind one reentrant lock.
    pub fn global_lock(mut self, enabled: bool) -> Self {
        self.set_global_lock(enabled);
        self
    }

    pub fn set_global_lock(&mut self, enabled: bool) {
        self.global_lock = enabled;
    }

    /// Overrides the standard streams, which otherwise forward to the host
    /// process's own.
    pub fn stdio(mut self, stdio: StandardInputOutput) -> Self {
        self.set_stdio(stdio);
        self
    }

    pub fn set_stdio(&mut self, stdio: StandardInputOutput) {
        self.stdio = Some(stdio);
    }

    pub fn build(self) -> Result<HostFileSystem, FileSystemCreationError> {
        for (index, preopen) in self.preopens.iter().enumerate() {
            validate_preopen_alias(&preopen.alias)?;
            if self.preopens[..index]
                .iter()
                .any(|other| other.alias == preopen.alias)
            {
                return Err(FileSystemCreationError::DuplicatePreopenAlias(
                    preopen.alias.clone(),
                ));
            }
        }
        let max_preopens = (MAX_FD - FIRST_PREOPEN_FD - 1) as usize;
        if self.preopens.len() > max_preopens {
            return Err(FileSystemCreationError::TooManyPreopens(self.preopens.len()));
        }

        let backend = self
            .backend
            .create()
            .ok_or(FileSystemCreationError::BackendUnavailable(self.backend))?;

        let stdio = self.stdio.unwrap_or_default();
        let fds: FileDescriptorTable<Arc<dyn FdResource>> =
            FileDescriptorTable::with_entries(stdio.into_resources());

        let mut opened = Vec::with_capacity(self.preopens.len());
        for (fd, preopen) in (FIRST_PREOPEN_FD..).zip(&self.preopens) {
            let real_path = match canonical_directory(&preopen.real_path) {
                Ok(real_path) => real_path,
                Err(err) => {
                    close_all(&fds);
                    return Err(err);
                }
            };
            let info = DirectoryInfo {
                real_path: real_path.clone(),
                virtual_path: preopen.alias.clone(),
                is_preopened: true,
            };
            match backend.open_directory(&real_path, info, FdRightsBlock::DIRECTORY) {
                Ok(resource) => {
                    tracing::debug!(fd, path = %real_path, alias = %preopen.alias, "preopened");
                    fds.insert_at(fd, resource);
                    opened.push((real_path, preopen.alias.clone()));
                }
                Err(err) => {
                    close_all(&fds);
                    return Err(FileSystemCreationError::PreopenedDirectoryError(format!(
                        "can not open `{}`: {err}",
                        preopen.real_path.display()
                    )));
                }
            }
        }

        let mut cwd_fd: Option<Fd> = None;
        if let Some(cwd) = &self.current_working_directory {
            let result = canonical_directory(cwd)
                .map_err(|err| FileSystemCreationError::CurrentWorkingDirectoryError(err.to_string()))
                .and_then(|real_path| {
                    let info = DirectoryInfo {
                        real_path: real_path.clone(),
                        virtual_path: cwd_virtual_path(&real_path, &opened),
                        is_preopened: true,
                    };
                    backend
                        .open_directory(&real_path, info, FdRightsBlock::DIRECTORY)
                        .map_err(|err| {
                            FileSystemCreationError::CurrentWorkingDirectoryError(format!(
                                "can not open `{}`: {err}",
                                cwd.display()
                            ))
                        })
                });
            match result {
                Ok(resource) => {
                    let fd = FIRST_PREOPEN_FD + self.preopens.len() as Fd;
                    fds.insert_at(fd, resource);
                    cwd_fd = Some(fd);
                }
                Err(err) => {
                    close_all(&fds);
                    return Err(err);
                }
            }
        }

        let state = Arc::new(FileSystemState::new(
            backend,
            PathResolver::new(self.allow_root_access, cwd_fd),
            fds,
        ));

        let mut interceptors: Vec<Arc<dyn FileSystemInterceptor>> = Vec::new();
        if self.global_lock {
            interceptors.push(Arc::new(GlobalLockInterceptor::new()));
        }
        if self.logging != LoggingLevel::None {
            interceptors.push(Arc::new(LoggingInterceptor::new(self.logging)));
        }
        interceptors.extend(self.interceptors);

        let pipeline = Pipeline::new(interceptors, executor(&state));
        Ok(HostFileSystem::new(pipeline, state))
    }
}

fn validate_preopen_alias(alias: &str) -> Result<(), FileSystemCreationError> {
    let problem = if alias.is_empty() {
        Some("is empty")
    } else if alias.bytes().any(|b| b == b'\0') {
        Some("contains a nul byte")
    } else if alias.split('/').any(|component| component == "..") {
        Some("contains a `..` component")
    } else {
        None
    };
    match problem {
        Some(problem) => Err(FileSystemCreationError::PreopenAliasFormattingError(
            format!("Alias \"{alias}\" {problem}"),
        )),
        None => Ok(()),
    }
}

fn canonical_directory(path: &Path) -> Result<RealPath, FileSystemCreationError> {
    let canonical = dunce::canonicalize(path)
        .map_err(|_| FileSystemCreationError::PreopenedDirectoryNotFound(path.to_path_buf()))?;
    if !canonical.is_dir() {
        return Err(FileSystemCreationError::PreopenedDirectoryError(format!(
            "`{}` is not a directory",
            path.display()
        )));
    }
    RealPath::create(canonical)
        .map_err(|err| FileSystemCreationError::PreopenedDirectoryError(err.to_string()))
}

/// The alias of the preopen containing `cwd`, extended by the rest of the
/// path, or the host path when no preopen contains it.
fn cwd_virtual_path(cwd: &RealPath, preopens: &[(RealPath, String)]) -> String {
    preopens
        .iter()
        .filter(|(root, _)| cwd.starts_with(root))
        .max_by_key(|(root, _)| root.as_os_str().len())
        .and_then(|(root, alias)| {
            let rest = cwd.as_path().strip_prefix(root.as_path()).ok()?;
            let mut virtual_path = alias.trim_end_matches('/').to_string();
            for component in rest.components() {
                virtual_path.push('/');
                virtual_path.push_str(component.as_os_str().to_str()?);
            }
            if virtual_path.is_empty() {
                virtual_path.push('/');
            }
            Some(virtual_path)
        })
        .unwrap_or_else(|| cwd.as_path().to_string_lossy().replace('\\', "/"))
}

fn close_all(fds: &FileDescriptorTable<Arc<dyn FdResource>>) {
    for resource in fds.drain() {
        if let Err(err) = resource.close() {
            tracing::warn!(resource = ?resource, error = %err, "failed to close resource");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn quiet_stdio() -> StandardInputOutput {
        StandardInputOutput::new(io::empty(), io::sink(), io::sink())
    }

    #[test]
    fn aliases_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        for alias in ["", "a\0b", "/data/../etc"] {
            let result = FileSystemBuilder::new()
                .stdio(quiet_stdio())
                .preopen(dir.path(), alias)
                .build();
            assert!(
                matches!(result, Err(FileSystemCreationError::PreopenAliasFormattingError(_))),
                "alias {alias:?}"
            );
        }
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSystemBuilder::new()
            .stdio(quiet_stdio())
            .preopen(dir.path(), "/data")
            .preopen(dir.path(), "/data")
            .build();
        assert_eq!(
            result.err(),
            Some(FileSystemCreationError::DuplicatePreopenAlias("/data".to_string()))
        );
    }

    #[test]
    fn missing_preopen_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let result = FileSystemBuilder::new()
            .stdio(quiet_stdio())
            .preopen(&missing, "/missing")
            .build();
        assert_eq!(
            result.err(),
            Some(FileSystemCreationError::PreopenedDirectoryNotFound(missing))
        );
    }

    #[test]
    #[cfg(unix)]
    fn cwd_inside_preopen_uses_the_alias() {
        let root = RealPath::create("/srv/data").unwrap();
        let cwd = RealPath::create("/srv/data/reports/2024").unwrap();
        let preopens = vec![(root, "/data".to_string())];
        assert_eq!(cwd_virtual_path(&cwd, &preopens), "/data/reports/2024");
    }

    #[test]
    #[cfg(unix)]
    fn cwd_outside_preopens_uses_the_host_path() {
        let cwd = RealPath::create("/var/tmp").unwrap();
        assert_eq!(cwd_virtual_path(&cwd, &[]), "/var/tmp");
    }
}
