use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Error produced by a filesystem backend.
///
/// `Clone + PartialEq` so an operation record can carry an exact copy of
/// what the caller received.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FsError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("is a directory: {}", path.display())]
    IsADirectory { path: PathBuf },

    #[error("directory not empty: {}", path.display())]
    DirectoryNotEmpty { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("invalid input: {}: {message}", path.display())]
    InvalidInput { path: PathBuf, message: String },

    #[error("{}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl FsError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        FsError::NotFound { path: path.into() }
    }

    pub fn invalid_input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FsError::InvalidInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Maps a `std::io::Error` onto the closest variant, tagging it with `path`.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path },
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied { path },
            io::ErrorKind::InvalidInput => FsError::InvalidInput {
                path,
                message: err.to_string(),
            },
            io::ErrorKind::NotADirectory => FsError::NotADirectory { path },
            io::ErrorKind::IsADirectory => FsError::IsADirectory { path },
            io::ErrorKind::DirectoryNotEmpty => FsError::DirectoryNotEmpty { path },
            _ => FsError::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FsError::NotFound { path }
            | FsError::AlreadyExists { path }
            | FsError::NotADirectory { path }
            | FsError::IsADirectory { path }
            | FsError::DirectoryNotEmpty { path }
            | FsError::PermissionDenied { path }
            | FsError::InvalidInput { path, .. }
            | FsError::Io { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            FsError::InvalidInput { .. } => io::ErrorKind::InvalidInput,
            FsError::NotADirectory { .. } => io::ErrorKind::NotADirectory,
            FsError::IsADirectory { .. } => io::ErrorKind::IsADirectory,
            FsError::DirectoryNotEmpty { .. } => io::ErrorKind::DirectoryNotEmpty,
            FsError::Io { .. } => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
