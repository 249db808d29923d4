use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::{PathError, VirtualPath};

/// A host path.
///
/// Produced by resolving a [`VirtualPath`] against a base directory, or
/// supplied by the embedder for preopened directories. Never handed to the
/// guest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RealPath {
    inner: PathBuf,
}

impl RealPath {
    /// Validates `path` with the rules of the compilation target.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, PathError> {
        let inner = path.into();
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                let text = inner.to_str().ok_or_else(|| {
                    PathError::InvalidPathFormat("path is not valid unicode".to_string())
                })?;
                validate_windows_path(text)?;
            } else {
                validate_posix_path(inner.as_os_str().as_encoded_bytes())?;
            }
        }
        Ok(Self { inner })
    }

    /// Converts a guest path fragment to host syntax.
    pub fn from_virtual(path: &VirtualPath) -> Result<Self, PathError> {
        if cfg!(windows) {
            Self::create(path.as_str().replace('/', "\\"))
        } else {
            Self::create(path.as_str())
        }
    }

    /// Converts the path back to guest syntax.
    pub fn to_virtual(&self) -> Result<VirtualPath, PathError> {
        let text = self.inner.to_str().ok_or_else(|| {
            PathError::InvalidPathFormat(format!("{} is not valid UTF-8", self.inner.display()))
        })?;
        if cfg!(windows) {
            VirtualPath::create(text.replace('\\', "/"))
        } else {
            VirtualPath::create(text)
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    pub fn as_os_str(&self) -> &OsStr {
        self.inner.as_os_str()
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.inner
    }

    /// Appends a single component. `name` is a component the resolver
    /// already validated, so no checks are repeated.
    pub fn join_component(&self, name: &str) -> RealPath {
        RealPath {
            inner: self.inner.join(name),
        }
    }

    pub fn parent(&self) -> Option<RealPath> {
        self.inner.parent().map(|parent| RealPath {
            inner: parent.to_path_buf(),
        })
    }

    pub fn starts_with(&self, base: &RealPath) -> bool {
        self.inner.starts_with(&base.inner)
    }
}

impl fmt::Debug for RealPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for RealPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.display(), f)
    }
}

impl AsRef<Path> for RealPath {
    fn as_ref(&self) -> &Path {
        &self.inner
    }
}

/// POSIX paths are any non-empty byte string without NUL.
pub fn validate_posix_path(bytes: &[u8]) -> Result<(), PathError> {
    if bytes.is_empty() {
        return Err(PathError::EmptyPath);
    }
    if bytes.contains(&0) {
        return Err(PathError::InvalidPathFormat(
            "path contains a nul byte".to_string(),
        ));
    }
    Ok(())
}

/// Win32 paths reject reserved characters; `:` is accepted only as the
/// drive separator.
pub fn validate_windows_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::EmptyPath);
    }
    // Verbatim and device prefixes bypass Win32 parsing.
    let body = path
        .strip_prefix(r"\\?\")
        .or_else(|| path.strip_prefix(r"\\.\"))
        .unwrap_or(path);
    for (index, ch) in body.char_indices() {
        let invalid = match ch {
            '\0'..='\x1f' | '<' | '>' | '"' | '|' | '?' | '*' => true,
            ':' => index != 1 || !body.as_bytes()[0].is_ascii_alphabetic(),
            _ => false,
        };
        if invalid {
            return Err(PathError::InvalidPathFormat(format!(
                "character {ch:?} is not allowed in a Windows path"
            )));
        }
    }
    Ok(())
}

/// Lexical normalization: drops `.`, applies `..`, keeps prefix and root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => {}
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}
