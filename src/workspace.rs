//! Filesystem helpers for the local clone and cache directories.
//!
//! Operations go through `cap-std` directory handles opened on the parent of
//! the target path, so every helper works on a single named entry.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised by workspace filesystem operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WorkspaceError {
    /// Raised when a file or directory cannot be accessed.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a path has no final component to operate on.
    #[error("path {path} has no file name")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), WorkspaceError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| WorkspaceError::MissingFileName {
            path: path.to_path_buf(),
        })?;
    Ok((parent, file_name))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Returns whether `path` exists. A missing parent counts as absent.
///
/// # Errors
///
/// Returns [`WorkspaceError`] when the parent exists but cannot be inspected.
pub fn path_exists(path: &Utf8Path) -> Result<bool, WorkspaceError> {
    let (parent, file_name) = split(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| io_error(path, &err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error(parent, &err)),
    }
}

/// Creates `path` and any missing ancestors.
///
/// # Errors
///
/// Returns [`WorkspaceError::Io`] when a directory cannot be created.
pub fn create_dir_all(path: &Utf8Path) -> Result<(), WorkspaceError> {
    Dir::create_ambient_dir_all(path, ambient_authority()).map_err(|err| io_error(path, &err))
}

/// Removes the directory tree at `path`.
///
/// # Errors
///
/// Returns [`WorkspaceError`] when the tree is missing or cannot be removed.
pub fn remove_tree(path: &Utf8Path) -> Result<(), WorkspaceError> {
    let (parent, file_name) = split(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    dir.remove_dir_all(file_name)
        .map_err(|err| io_error(path, &err))
}

/// Writes `contents` to `path`, creating the parent directory when needed.
///
/// # Errors
///
/// Returns [`WorkspaceError::Io`] when the directory or file cannot be written.
pub fn write_file(path: &Utf8Path, contents: &str) -> Result<(), WorkspaceError> {
    let (parent, file_name) = split(path)?;
    create_dir_all(parent)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))?;
    dir.write(file_name, contents)
        .map_err(|err| io_error(path, &err))
}
