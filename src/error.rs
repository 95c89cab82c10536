use std::io;

use thiserror::Error;

/// Failures raised by filesystem operations.
///
/// Every variant is a distinct observable outcome; operations never retry
/// and never log, they surface exactly one of these to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("too many levels of symbolic links: {0}")]
    Loop(String),
    #[error("file is open: {0}")]
    Busy(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("filesystem is closed")]
    Closed,
    #[error("filesystem is read-only")]
    ReadOnly,
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> io::Error {
        let kind = match &err {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            VfsError::Loop(_) => io::ErrorKind::Other,
            VfsError::Busy(_) => io::ErrorKind::ResourceBusy,
            VfsError::NotSupported(_) => io::ErrorKind::Unsupported,
            VfsError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            VfsError::Closed => io::ErrorKind::NotConnected,
            VfsError::ReadOnly => io::ErrorKind::ReadOnlyFilesystem,
            VfsError::Io(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
