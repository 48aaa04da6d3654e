use crate::codec::CodecError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BatchError>;

/// Which of the two uploaded objects an upload error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Data,
    Metadata,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Data => f.write_str("data object"),
            UploadPhase::Metadata => f.write_str("metadata object"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to create buffer for batch {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {length} bytes ({written} written) to batch {name}: {source}")]
    Write {
        name: String,
        length: u64,
        written: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rewind batch {name} ({bytes} bytes): {source}")]
    Rewind {
        name: String,
        bytes: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read batch {name} at byte {position}: {source}")]
    Read {
        name: String,
        position: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to release buffer for batch {name}: {source}")]
    Release {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("batch {name} is sealed")]
    Sealed { name: String },

    #[error("batch {name} is not sealed")]
    NotSealed { name: String },

    #[error("buffer for batch {name} has been released")]
    Released { name: String },

    #[error("failed to upload {phase} {object}: {source}")]
    Upload {
        phase: UploadPhase,
        object: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to encode index for {object}: {source}")]
    Encode {
        object: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to decode index {object}: {source}")]
    Decode {
        object: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to download object {object} {range}: {source}")]
    Fetch {
        object: String,
        range: String,
        #[source]
        source: object_store::Error,
    },

    #[error("short read from {object} {range}: expected {expected} bytes, got {actual}")]
    ShortRead {
        object: String,
        range: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid byte range in {object}: offset {offset} + length {length} overflows")]
    InvalidRange {
        object: String,
        offset: u64,
        length: u64,
    },

    #[error("failed to delete objects {objects:?}: {source}")]
    Delete {
        objects: Vec<String>,
        #[source]
        source: object_store::Error,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl BatchError {
    /// True when the remote store reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BatchError::Upload { source, .. }
            | BatchError::Fetch { source, .. }
            | BatchError::Delete { source, .. } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}
