//! Error types for ferry-core

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds produced by the transfer engine
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transfer profile is invalid
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Destination bucket cannot be verified or created
    #[error("Bucket unavailable: {0}")]
    BucketUnavailable(String),

    /// Source file vanished, changed, or cannot be read
    #[error("Source unreadable: {path}: {reason}")]
    SourceUnreadable {
        /// Source path the job was built from
        path: PathBuf,
        /// What went wrong reading it
        reason: String,
    },

    /// An object already occupies the destination key
    #[error("Object exists: {0}")]
    ObjectExists(String),

    /// Upload failed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// A multipart part exhausted its retry budget
    #[error("Part {part} upload failed: {reason}")]
    PartUploadFailed {
        /// 1-based part index
        part: u64,
        /// Final attempt's error
        reason: String,
    },

    /// Aborting a multipart session failed
    #[error("Multipart abort failed: {0}")]
    AbortFailed(String),

    /// Operation not supported by this backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
