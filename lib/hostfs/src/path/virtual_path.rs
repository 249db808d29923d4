use std::fmt;

use super::PathError;

/// A path supplied by the guest.
///
/// Always non-empty valid UTF-8 without NUL bytes. Carries no notion of
/// existence; two paths are equal iff their bytes are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath {
    inner: String,
}

impl VirtualPath {
    pub fn create(path: impl Into<String>) -> Result<Self, PathError> {
        let inner = path.into();
        if inner.is_empty() {
            return Err(PathError::EmptyPath);
        }
        if inner.contains('\0') {
            return Err(PathError::InvalidPathFormat(
                "path contains a nul byte".to_string(),
            ));
        }
        Ok(Self { inner })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PathError> {
        let path = std::str::from_utf8(bytes)
            .map_err(|err| PathError::InvalidPathFormat(format!("path is not UTF-8: {err}")))?;
        Self::create(path)
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/')
    }

    /// Ends with `/`: the path must name a directory.
    pub fn is_directory_request(&self) -> bool {
        self.inner.ends_with('/')
    }

    /// The `/` separated components, including empty and `.` ones.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/')
    }
}

impl fmt::Debug for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl TryFrom<&str> for VirtualPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        VirtualPath::create(value)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VirtualPath::create(value)
    }
}
