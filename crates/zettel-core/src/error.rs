//! Error types
//!
//! `DirectoryError` is returned to callers of the directory service.
//! `FsError` describes a failure while scanning or watching the note
//! directory; those are logged by the directory and never abort a scan.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::id::NoteId;

/// Errors returned by directory service operations
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Target identifier of a rename is already taken
    #[error("Invalid note id {id}: an entry with this id already exists")]
    InvalidId { id: NoteId },

    /// No free identifier was found
    #[error("Could not allocate a new note id after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// `start` was called twice
    #[error("Directory service is already running")]
    AlreadyStarted,

    /// An operation was issued before `start`
    #[error("Directory service has not been started")]
    NotStarted,

    /// The directory task is gone
    #[error("Directory service has stopped")]
    Stopped,
}

/// File-system failures met while scanning or watching
#[derive(Error, Debug)]
pub enum FsError {
    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Path vanished between listing and inspection
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Failed to read a directory or file
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file watcher reported a failure
    #[error("Watch error on '{path}': {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl FsError {
    /// Create an error from an I/O error with path context
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => FsError::NotFound { path },
            _ => FsError::Read {
                path,
                source: error,
            },
        }
    }

    /// Path the failure refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            FsError::PermissionDenied { path, .. }
            | FsError::NotFound { path }
            | FsError::Read { path, .. }
            | FsError::Watch { path, .. } => path,
        }
    }
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = FsError::from_io(io_err, PathBuf::from("/notes/secret"));

        assert!(matches!(err, FsError::PermissionDenied { .. }));
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(err.path(), &PathBuf::from("/notes/secret"));
    }

    #[test]
    fn test_not_found_classification() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = FsError::from_io(io_err, PathBuf::from("/notes/gone.md"));

        assert!(matches!(err, FsError::NotFound { .. }));
    }

    #[test]
    fn test_other_errors_are_read_errors() {
        let io_err = io::Error::new(io::ErrorKind::Other, "device hiccup");
        let err = FsError::from_io(io_err, PathBuf::from("/notes"));

        assert!(matches!(err, FsError::Read { .. }));
        assert!(err.to_string().contains("device hiccup"));
    }

    #[test]
    fn test_invalid_id_display() {
        let id = NoteId::parse("20240101120000").unwrap();
        let err = DirectoryError::InvalidId { id };

        let msg = err.to_string();
        assert!(msg.contains("20240101120000"));
        assert!(msg.contains("already exists"));
    }
}
