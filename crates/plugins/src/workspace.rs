//! Workspace path scoping for file commands.
//!
//! Every path argument a file executor receives is resolved against a
//! single workspace root. Relative paths are joined onto the root and
//! absolute paths must already live under it. Symlinks are resolved
//! before the containment check.

use std::path::{Path, PathBuf};

/// Error returned when a path argument cannot be scoped to the workspace.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("path '{path}' contains traversal components")]
    Traversal { path: String },

    #[error("path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("failed to resolve '{path}': {reason}")]
    Resolve { path: String, reason: String },
}

/// Resolve a user-supplied path against the workspace root.
///
/// Relative paths are joined onto the root. The result is canonicalized
/// (via the parent directory when the target does not exist yet, so new
/// files can be created) and must remain under the canonical root.
pub fn resolve(root: &Path, raw: &str) -> Result<PathBuf, WorkspaceError> {
    if raw.is_empty() {
        return Err(WorkspaceError::Resolve {
            path: raw.into(),
            reason: "empty path".into(),
        });
    }

    // Reject traversal in the raw string before touching the filesystem.
    let normalized = raw.replace('\\', "/");
    if normalized == ".." || normalized.contains("../") || normalized.ends_with("/..") {
        return Err(WorkspaceError::Traversal { path: raw.into() });
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| WorkspaceError::Resolve {
            path: root.to_string_lossy().into_owned(),
            reason: format!("workspace root: {e}"),
        })?;

    let joined = if Path::new(raw).is_absolute() {
        PathBuf::from(raw)
    } else {
        canonical_root.join(raw)
    };

    // Canonicalize to resolve symlinks. A path that does not exist yet
    // (the write case) is canonicalized through its parent.
    let resolved = if joined.exists() {
        joined
            .canonicalize()
            .map_err(|e| WorkspaceError::Resolve {
                path: raw.into(),
                reason: e.to_string(),
            })?
    } else if let Some(parent) = joined.parent()
        && parent.exists()
    {
        let canonical_parent = parent
            .canonicalize()
            .map_err(|e| WorkspaceError::Resolve {
                path: raw.into(),
                reason: format!("parent dir: {e}"),
            })?;
        canonical_parent.join(joined.file_name().unwrap_or_default())
    } else {
        // Parents do not exist yet. Traversal was rejected above, so the
        // joined path cannot climb out of the root.
        joined
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(WorkspaceError::OutsideWorkspace { path: raw.into() });
    }

    Ok(resolved)
}
