//! Sandbox path resolution.
//!
//! Every request path is resolved against a single sandbox root. Resolution is
//! purely lexical: the root is joined with the requested path, `.` and `..`
//! components are folded, and the result must still lie at or below the root.
//! Only then does a [`ResolvedPath`] exist, and only a `ResolvedPath` is
//! accepted by the file operations.
//!
//! Symbolic links inside the sandbox are not resolved here; the OS follows
//! them as usual when a resolved path is opened.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use super::error::{FileError, FileResult};

/// A path that has passed the containment check.
///
/// Can only be produced by [`PathResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// The absolute path on disk.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final component, if any.
    pub fn file_name(&self) -> Option<String> {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolves caller-supplied relative paths inside a fixed sandbox root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Canonical absolute sandbox root.
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given root directory.
    ///
    /// The root is canonicalized once here and never changes afterwards.
    pub fn new(root: impl AsRef<Path>) -> FileResult<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| FileError::from_io(e, root))?;

        let metadata =
            std::fs::metadata(&canonical).map_err(|e| FileError::from_io(e, &canonical))?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(canonical));
        }

        Ok(Self { root: canonical })
    }

    /// The canonical sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` is the sandbox root itself.
    pub fn is_root(&self, path: &ResolvedPath) -> bool {
        path.as_path() == self.root
    }

    /// Resolve a path relative to the sandbox root.
    ///
    /// The empty string resolves to the root. Absolute paths and paths that
    /// normalize to a location outside the root fail with
    /// [`FileError::Containment`].
    pub fn resolve(&self, relative: &str) -> FileResult<ResolvedPath> {
        let requested = Path::new(relative);

        if requested
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            warn!(path = %relative, "Rejected absolute path");
            return Err(FileError::Containment(relative.to_string()));
        }

        self.contain(&self.root.join(requested), relative)
    }

    /// Resolve a single-segment `name` inside an already resolved directory.
    pub fn child(&self, parent: &ResolvedPath, name: &str) -> FileResult<ResolvedPath> {
        validate_name(name)?;
        self.contain(&parent.as_path().join(name), name)
    }

    /// Resolve `name` as a sibling of `path`.
    ///
    /// Fails with [`FileError::Containment`] when `path` is the root, since
    /// its siblings lie outside the sandbox.
    pub fn sibling(&self, path: &ResolvedPath, name: &str) -> FileResult<ResolvedPath> {
        validate_name(name)?;
        let parent = path.as_path().parent().unwrap_or(path.as_path());
        self.contain(&parent.join(name), name)
    }

    /// Render a resolved path relative to the root, for logs and messages.
    pub fn relative(&self, path: &ResolvedPath) -> String {
        path.as_path()
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Normalize `candidate` and check that it stays at or below the root.
    fn contain(&self, candidate: &Path, requested: &str) -> FileResult<ResolvedPath> {
        let normalized = normalize(candidate);

        // Component-wise: root `/a/b` does not contain `/a/bc`.
        if !normalized.starts_with(&self.root) {
            warn!(
                requested = %requested,
                resolved = %normalized.display(),
                root = %self.root.display(),
                "Path escapes sandbox root"
            );
            return Err(FileError::Containment(requested.to_string()));
        }

        Ok(ResolvedPath(normalized))
    }
}

/// Check that `name` is a single, non-empty path segment.
pub fn validate_name(name: &str) -> FileResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]);

    if invalid {
        return Err(FileError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Lexically fold `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}
