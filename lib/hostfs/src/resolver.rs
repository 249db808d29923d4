//! Sandboxed path resolution.
//!
//! A guest path is walked one component at a time below an anchor
//! directory. `..` pops the walk stack and may never pop the anchor itself.
//! Symlinks are expanded by the walker on every platform: intermediate
//! components always, the final component only when following is requested.
//! A link target is pushed as a new component queue, so every component of
//! the target goes through the same containment checks. Absolute targets are
//! rejected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use wasi_hostfs_types::{Fd, Filetype};

use crate::error::{ErrorKind, FileSystemError, FileSystemOperationError};
use crate::fd_table::FileDescriptorTable;
use crate::path::{BaseDirectory, RealPath, ResolvePathError, VirtualPath, normalize_path};
use crate::resource::FdResource;

/// Maximum number of symlink expansions during one resolution.
pub const MAX_SYMLINK_EXPANSIONS: usize = 128;

/// Maximum depth of the walk stack.
pub const MAX_OPENED_COMPONENTS: usize = 128;

/// Host lookups the walker needs.
pub trait ComponentLookup {
    /// Type of the entry at `path` without following a final symlink, or
    /// `None` if nothing exists there.
    fn lookup(&self, path: &RealPath) -> Result<Option<Filetype>, FileSystemError>;

    /// Target of the symlink at `path`.
    fn read_link_target(&self, path: &RealPath) -> Result<String, FileSystemError>;
}

/// A resolved path.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    real_path: RealPath,
    beneath: Option<Beneath>,
    directory_request: bool,
}

/// The directory handle a sandboxed path was resolved below.
#[derive(Debug, Clone)]
pub struct Beneath {
    pub anchor: Arc<dyn FdResource>,
    /// Names of the walk below the anchor. Never empty, `.` or `..`; empty
    /// for the anchor itself.
    pub components: Vec<String>,
}

impl ResolvedPath {
    /// A host path that is not confined to any directory.
    pub fn host(real_path: RealPath) -> Self {
        Self {
            real_path,
            beneath: None,
            directory_request: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn below(
        anchor: Arc<dyn FdResource>,
        real_path: RealPath,
        components: Vec<String>,
    ) -> Self {
        Self {
            real_path,
            beneath: Some(Beneath { anchor, components }),
            directory_request: false,
        }
    }

    pub fn real_path(&self) -> &RealPath {
        &self.real_path
    }

    /// `None` in root-access mode.
    pub fn beneath(&self) -> Option<&Beneath> {
        self.beneath.as_ref()
    }

    /// The guest path ended with a separator.
    pub fn is_directory_request(&self) -> bool {
        self.directory_request
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.real_path, f)
    }
}

struct Anchor {
    path: RealPath,
    resource: Option<Arc<dyn FdResource>>,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    allow_root_access: bool,
    current_working_directory: Option<Fd>,
}

#[derive(Debug)]
struct Component {
    path: RealPath,
    name: String,
    /// `None` for a final component that does not exist yet.
    file_type: Option<Filetype>,
}

impl PathResolver {
    pub fn new(allow_root_access: bool, current_working_directory: Option<Fd>) -> Self {
        Self {
            allow_root_access,
            current_working_directory,
        }
    }

    pub fn is_root_access_allowed(&self) -> bool {
        self.allow_root_access
    }

    pub fn current_working_directory(&self) -> Option<Fd> {
        self.current_working_directory
    }

    /// Resolves `path` against `base` to a host path inside the anchor.
    #[tracing::instrument(level = "trace", skip(self, fds, lookup), ret, err)]
    pub fn resolve<L: ComponentLookup + ?Sized>(
        &self,
        fds: &FileDescriptorTable<Arc<dyn FdResource>>,
        lookup: &L,
        path: &VirtualPath,
        base: BaseDirectory,
        follow_symlinks: bool,
    ) -> Result<ResolvedPath, ResolvePathError> {
        let anchor = self.anchor(fds, path, base)?;
        let directory_request = path.is_directory_request();
        if self.allow_root_access {
            let anchor_path = anchor.as_ref().map(|anchor| &anchor.path);
            let real_path = resolve_unrestricted(anchor_path, path)?;
            return Ok(ResolvedPath {
                real_path,
                beneath: None,
                directory_request,
            });
        }
        let Some(Anchor {
            path: anchor_path,
            resource: Some(anchor),
        }) = anchor
        else {
            return Err(ResolvePathError::NoBaseDirectory(path.to_string()));
        };
        let (real_path, components) = walk_beneath(lookup, &anchor_path, path, follow_symlinks)?;
        Ok(ResolvedPath {
            real_path,
            beneath: Some(Beneath { anchor, components }),
            directory_request,
        })
    }

    /// The directory `base` refers to.
    fn base_directory(
        &self,
        fds: &FileDescriptorTable<Arc<dyn FdResource>>,
        base: BaseDirectory,
    ) -> Result<Option<Anchor>, ResolvePathError> {
        match base {
            BaseDirectory::None => Ok(None),
            BaseDirectory::DirectoryFd(fd) => directory_anchor(fds, fd).map(Some),
            BaseDirectory::CurrentWorkingDirectory => match self.current_working_directory {
                Some(fd) => directory_anchor(fds, fd).map(Some),
                None if self.allow_root_access => {
                    let cwd = std::env::current_dir()
                        .map_err(|err| ResolvePathError::IoError(err.to_string()))?;
                    Ok(Some(Anchor {
                        path: RealPath::create(cwd)?,
                        resource: None,
                    }))
                }
                None => Ok(None),
            },
        }
    }

    fn anchor(
        &self,
        fds: &FileDescriptorTable<Arc<dyn FdResource>>,
        path: &VirtualPath,
        base: BaseDirectory,
    ) -> Result<Option<Anchor>, ResolvePathError> {
        if path.is_absolute() && !self.allow_root_access {
            return Err(ResolvePathError::AbsolutePath(path.to_string()));
        }
        let anchor = self.base_directory(fds, base)?;
        if anchor.is_none() && !path.is_absolute() {
            return Err(ResolvePathError::NoBaseDirectory(path.to_string()));
        }
        Ok(anchor)
    }
}

fn directory_anchor(
    fds: &FileDescriptorTable<Arc<dyn FdResource>>,
    fd: Fd,
) -> Result<Anchor, ResolvePathError> {
    let resource = fds
        .get(fd)
        .ok_or(ResolvePathError::FileDescriptorNotOpen(fd))?;
    let path = resource
        .directory()
        .map(|info| info.real_path.clone())
        .ok_or_else(|| ResolvePathError::NotDirectory(format!("FD {fd} is not a directory")))?;
    resource.verify_directory_path().map_err(lookup_error)?;
    Ok(Anchor {
        path,
        resource: Some(resource),
    })
}

/// Join and normalize without confinement.
fn resolve_unrestricted(
    anchor: Option<&RealPath>,
    path: &VirtualPath,
) -> Result<RealPath, ResolvePathError> {
    let fragment = RealPath::from_virtual(path)?;
    let joined = match anchor {
        Some(anchor) if !path.is_absolute() => anchor.as_path().join(fragment.as_path()),
        _ => fragment.into_path_buf(),
    };
    let mut normalized = normalize_path(&joined);
    if path.is_directory_request() {
        normalized.push("");
    }
    Ok(RealPath::create(normalized)?)
}

/// The sandboxed walk.
pub fn resolve_beneath<L: ComponentLookup + ?Sized>(
    lookup: &L,
    anchor: &RealPath,
    path: &VirtualPath,
    follow_symlinks: bool,
) -> Result<RealPath, ResolvePathError> {
    walk_beneath(lookup, anchor, path, follow_symlinks).map(|(real_path, _)| real_path)
}

/// The sandboxed walk, also returning the names walked below the anchor.
fn walk_beneath<L: ComponentLookup + ?Sized>(
    lookup: &L,
    anchor: &RealPath,
    path: &VirtualPath,
    follow_symlinks: bool,
) -> Result<(RealPath, Vec<String>), ResolvePathError> {
    if path.is_absolute() {
        return Err(ResolvePathError::AbsolutePath(path.to_string()));
    }
    let directory_request = path.is_directory_request();

    let mut stack: Vec<Component> = vec![Component {
        path: anchor.clone(),
        name: String::new(),
        file_type: Some(Filetype::Directory),
    }];
    let mut queues: Vec<VecDeque<String>> = vec![split_components(path.as_str())?];
    let mut expansions = 0usize;

    while let Some(name) = next_component(&mut queues) {
        let is_last = queues.iter().all(VecDeque::is_empty);
        match name.as_str() {
            "" | "." => {}
            ".." => {
                if stack.len() == 1 {
                    return Err(ResolvePathError::PathOutsideOfRootPath(path.to_string()));
                }
                stack.pop();
            }
            name => {
                let Some(parent) = stack.last() else {
                    return Err(ResolvePathError::PathOutsideOfRootPath(path.to_string()));
                };
                match parent.file_type {
                    Some(Filetype::Directory) => {}
                    None => {
                        return Err(ResolvePathError::Other {
                            kind: ErrorKind::NoEntry,
                            message: format!("{} does not exist", parent.path),
                        });
                    }
                    Some(_) => {
                        return Err(ResolvePathError::NotDirectory(format!(
                            "{} is not a directory",
                            parent.path
                        )));
                    }
                }

                let candidate = parent.path.join_component(name);
                if !candidate.starts_with(anchor) {
                    return Err(ResolvePathError::PathOutsideOfRootPath(path.to_string()));
                }

                let file_type = lookup.lookup(&candidate).map_err(lookup_error)?;
                let expand = file_type == Some(Filetype::SymbolicLink)
                    && (!is_last || follow_symlinks || directory_request);
                if expand {
                    expansions += 1;
                    if expansions > MAX_SYMLINK_EXPANSIONS {
                        return Err(ResolvePathError::TooManySymbolicLinks(path.to_string()));
                    }
                    let target = lookup.read_link_target(&candidate).map_err(lookup_error)?;
                    if is_absolute_target(&target) {
                        return Err(ResolvePathError::AbsolutePath(target));
                    }
                    tracing::trace!(link = %candidate, %target, "expanding symlink");
                    queues.push(split_components(&target)?);
                    continue;
                }

                if file_type.is_none() && !is_last {
                    return Err(ResolvePathError::Other {
                        kind: ErrorKind::NoEntry,
                        message: format!("{candidate} does not exist"),
                    });
                }
                stack.push(Component {
                    path: candidate,
                    name: name.to_string(),
                    file_type,
                });
                if stack.len() > MAX_OPENED_COMPONENTS {
                    return Err(ResolvePathError::NameTooLong(path.to_string()));
                }
            }
        }
    }

    let components: Vec<String> = stack
        .iter()
        .skip(1)
        .map(|component| component.name.clone())
        .collect();
    let Some(last) = stack.pop() else {
        return Err(ResolvePathError::PathOutsideOfRootPath(path.to_string()));
    };
    if !directory_request {
        return Ok((last.path, components));
    }
    match last.file_type {
        Some(Filetype::Directory) | None => Ok((last.path.join_component(""), components)),
        Some(_) => Err(ResolvePathError::NotDirectory(format!(
            "{} is not a directory",
            last.path
        ))),
    }
}

fn next_component(queues: &mut Vec<VecDeque<String>>) -> Option<String> {
    while let Some(queue) = queues.last_mut() {
        if let Some(name) = queue.pop_front() {
            return Some(name);
        }
        queues.pop();
    }
    None
}

fn split_components(path: &str) -> Result<VecDeque<String>, ResolvePathError> {
    let separators: &[char] = if cfg!(windows) { &['/', '\\'] } else { &['/'] };
    path.split(separators)
        .map(|component| {
            if component.contains('\0') || (cfg!(windows) && component.contains(':')) {
                Err(ResolvePathError::InvalidPathFormat(format!(
                    "invalid path component {component:?}"
                )))
            } else {
                Ok(component.to_string())
            }
        })
        .collect()
}

fn is_absolute_target(target: &str) -> bool {
    let path = std::path::Path::new(target);
    target.starts_with('/') || path.is_absolute() || path.has_root()
}

fn lookup_error(err: FileSystemError) -> ResolvePathError {
    match err.kind() {
        ErrorKind::NotDirectory => ResolvePathError::NotDirectory(err.message().to_string()),
        ErrorKind::TooManySymbolicLinks => {
            ResolvePathError::TooManySymbolicLinks(err.message().to_string())
        }
        ErrorKind::NameTooLong => ResolvePathError::NameTooLong(err.message().to_string()),
        kind => ResolvePathError::Other {
            kind,
            message: err.message().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;

    enum Node {
        Directory,
        File,
        Symlink(&'static str),
    }

    /// In-memory tree rooted at `/sandbox`.
    struct FakeTree {
        nodes: HashMap<PathBuf, Node>,
    }

    impl FakeTree {
        fn new(entries: &[(&str, Node)]) -> Self {
            let mut nodes = HashMap::new();
            nodes.insert(PathBuf::from("/sandbox"), Node::Directory);
            nodes.insert(PathBuf::from("/etc"), Node::Directory);
            nodes.insert(PathBuf::from("/etc/passwd"), Node::File);
            for (path, node) in entries {
                let node = match node {
                    Node::Directory => Node::Directory,
                    Node::File => Node::File,
                    Node::Symlink(target) => Node::Symlink(target),
                };
                nodes.insert(Path::new("/sandbox").join(path), node);
            }
            Self { nodes }
        }
    }

    impl ComponentLookup for FakeTree {
        fn lookup(&self, path: &RealPath) -> Result<Option<Filetype>, FileSystemError> {
            Ok(self.nodes.get(path.as_path()).map(|node| match node {
                Node::Directory => Filetype::Directory,
                Node::File => Filetype::RegularFile,
                Node::Symlink(_) => Filetype::SymbolicLink,
            }))
        }

        fn read_link_target(&self, path: &RealPath) -> Result<String, FileSystemError> {
            match self.nodes.get(path.as_path()) {
                Some(Node::Symlink(target)) => Ok(target.to_string()),
                _ => Err(FileSystemError::new(ErrorKind::InvalidArgument, "not a link")),
            }
        }
    }

    fn tree() -> FakeTree {
        FakeTree::new(&[
            ("dir1", Node::Directory),
            ("dir1/file", Node::File),
            ("dir1/sub", Node::Directory),
            ("file", Node::File),
            ("link_to_dir1", Node::Symlink("dir1")),
            ("dir1/link_up", Node::Symlink("..")),
            ("dir1/escape", Node::Symlink("../../etc")),
            ("absolute", Node::Symlink("/etc/passwd")),
            ("loop_a", Node::Symlink("loop_b")),
            ("loop_b", Node::Symlink("loop_a")),
            ("dangling", Node::Symlink("missing")),
        ])
    }

    fn resolve(path: &str, follow: bool) -> Result<PathBuf, ResolvePathError> {
        let anchor = RealPath::create("/sandbox").unwrap();
        let path = VirtualPath::create(path).unwrap();
        resolve_beneath(&tree(), &anchor, &path, follow).map(RealPath::into_path_buf)
    }

    #[test]
    fn plain_paths_resolve_below_anchor() {
        assert_eq!(resolve("dir1/file", true), Ok(PathBuf::from("/sandbox/dir1/file")));
        assert_eq!(resolve("./dir1/./sub", true), Ok(PathBuf::from("/sandbox/dir1/sub")));
        assert_eq!(resolve("dir1/sub/..", true), Ok(PathBuf::from("/sandbox/dir1")));
        assert_eq!(resolve("newfile", true), Ok(PathBuf::from("/sandbox/newfile")));
    }

    #[test]
    fn dot_resolves_to_anchor() {
        assert_eq!(resolve(".", true), Ok(PathBuf::from("/sandbox")));
        assert_eq!(resolve("dir1/..", true), Ok(PathBuf::from("/sandbox")));
    }

    #[test]
    fn parent_of_anchor_is_outside() {
        assert!(matches!(
            resolve("..", true),
            Err(ResolvePathError::PathOutsideOfRootPath(_))
        ));
        assert!(matches!(
            resolve("dir1/../../etc/passwd", true),
            Err(ResolvePathError::PathOutsideOfRootPath(_))
        ));
    }

    #[test]
    fn absolute_paths_and_targets_are_rejected() {
        assert!(matches!(
            resolve("/etc/passwd", true),
            Err(ResolvePathError::AbsolutePath(_))
        ));
        assert!(matches!(
            resolve("absolute", true),
            Err(ResolvePathError::AbsolutePath(_))
        ));
    }

    #[test]
    fn symlink_escape_is_caught_inside_target() {
        assert!(matches!(
            resolve("dir1/escape/passwd", true),
            Err(ResolvePathError::PathOutsideOfRootPath(_))
        ));
        assert!(matches!(
            resolve("dir1/escape", true),
            Err(ResolvePathError::PathOutsideOfRootPath(_))
        ));
        // The link itself is addressable when not followed.
        assert_eq!(
            resolve("dir1/escape", false),
            Ok(PathBuf::from("/sandbox/dir1/escape"))
        );
    }

    #[test]
    fn intermediate_symlinks_are_followed() {
        assert_eq!(
            resolve("link_to_dir1/file", false),
            Ok(PathBuf::from("/sandbox/dir1/file"))
        );
        assert_eq!(
            resolve("dir1/link_up/file", false),
            Ok(PathBuf::from("/sandbox/file"))
        );
        assert_eq!(resolve("link_to_dir1", true), Ok(PathBuf::from("/sandbox/dir1")));
        assert_eq!(
            resolve("link_to_dir1", false),
            Ok(PathBuf::from("/sandbox/link_to_dir1"))
        );
    }

    #[test]
    fn dangling_link_resolves_to_missing_target() {
        assert_eq!(resolve("dangling", true), Ok(PathBuf::from("/sandbox/missing")));
    }

    #[test]
    fn symlink_loops_are_bounded() {
        assert!(matches!(
            resolve("loop_a", true),
            Err(ResolvePathError::TooManySymbolicLinks(_))
        ));
    }

    #[test]
    fn files_in_the_middle_are_not_directories() {
        assert!(matches!(
            resolve("file/anything", true),
            Err(ResolvePathError::NotDirectory(_))
        ));
        assert!(matches!(
            resolve("file/", true),
            Err(ResolvePathError::NotDirectory(_))
        ));
    }

    #[test]
    fn missing_intermediate_is_no_entry() {
        let err = resolve("missing/file", true).unwrap_err();
        assert_eq!(err.error_kind(), ErrorKind::NoEntry);
    }

    #[test]
    fn directory_request_keeps_trailing_separator() {
        let resolved = resolve("dir1/", true).unwrap();
        assert!(resolved.as_os_str().to_string_lossy().ends_with('/'));
        assert_eq!(resolved.as_path(), Path::new("/sandbox/dir1"));
    }

    #[test]
    fn walked_names_skip_expanded_links() {
        let anchor = RealPath::create("/sandbox").unwrap();
        let path = VirtualPath::create("link_to_dir1/sub/../file").unwrap();
        let (real_path, components) = walk_beneath(&tree(), &anchor, &path, true).unwrap();
        assert_eq!(real_path.as_path(), Path::new("/sandbox/dir1/file"));
        assert_eq!(components, ["dir1", "file"]);

        let dot = VirtualPath::create("dir1/..").unwrap();
        let (_, components) = walk_beneath(&tree(), &anchor, &dot, true).unwrap();
        assert!(components.is_empty());
    }

    #[test]
    fn deep_paths_are_name_too_long() {
        let mut entries = Vec::new();
        let mut path = String::new();
        for _ in 0..=MAX_OPENED_COMPONENTS {
            if !path.is_empty() {
                path.push('/');
            }
            path.push('d');
            entries.push((path.clone(), Node::Directory));
        }
        let borrowed: Vec<(&str, Node)> = entries
            .iter()
            .map(|(path, _)| (path.as_str(), Node::Directory))
            .collect();
        let tree = FakeTree::new(&borrowed);
        let anchor = RealPath::create("/sandbox").unwrap();
        let result = resolve_beneath(&tree, &anchor, &VirtualPath::create(path).unwrap(), true);
        assert!(matches!(result, Err(ResolvePathError::NameTooLong(_))));
    }

    #[test]
    fn adversarial_paths_never_leave_the_anchor() {
        let pieces = [
            "..", ".", "dir1", "sub", "link_to_dir1", "link_up", "escape", "file", "", "etc",
            "passwd", "absolute",
        ];
        for a in pieces {
            for b in pieces {
                for c in pieces {
                    let path = format!("{a}/{b}/{c}");
                    for follow in [true, false] {
                        match resolve(&path, follow) {
                            Ok(resolved) => assert!(
                                resolved.starts_with("/sandbox"),
                                "{path} escaped to {}",
                                resolved.display()
                            ),
                            Err(err) => assert_ne!(err.error_kind(), ErrorKind::Exists),
                        }
                    }
                }
            }
        }
    }
}
