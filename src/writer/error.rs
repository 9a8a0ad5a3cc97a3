//! Error types for storage writer operations.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Queued or dispatched record is not valid transport JSON
    E001Decode,
    /// E002: Storage engine rejected the write or commit
    E002Storage,
    /// E003: Connection string not understood
    E003InvalidLocation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001Decode => "E001",
            Self::E002Storage => "E002",
            Self::E003InvalidLocation => "E003",
        }
    }
}

/// Errors that can occur while persisting a batch
#[derive(Debug, Error)]
pub enum WriterError {
    /// Record could not be decoded; the whole batch is rejected
    #[error("[{code}] Failed to decode record {index}: {source}")]
    Decode {
        code: &'static str,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Storage operation failed
    #[error("[{code}] Storage operation failed: {source}")]
    Storage {
        code: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("[{code}] Invalid storage location '{location}': {message}")]
    InvalidLocation {
        code: &'static str,
        location: String,
        message: String,
    },
}

impl WriterError {
    pub fn decode(index: usize, source: serde_json::Error) -> Self {
        Self::Decode {
            code: ErrorCode::E001Decode.as_str(),
            index,
            source,
        }
    }

    pub fn invalid_location(location: &str, message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            code: ErrorCode::E003InvalidLocation.as_str(),
            location: location.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Decode { .. } => ErrorCode::E001Decode,
            Self::Storage { .. } => ErrorCode::E002Storage,
            Self::InvalidLocation { .. } => ErrorCode::E003InvalidLocation,
        }
    }
}

impl From<rusqlite::Error> for WriterError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Storage {
            code: ErrorCode::E002Storage.as_str(),
            source,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
