//! Error types for the backend page format.

use thiserror::Error;

/// Errors that can occur while converting backend pages.
#[derive(Error, Debug)]
pub enum FormatError {
    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid format structure or content
    #[error("Invalid format: {message}")]
    InvalidFormat {
        /// Description of the format error
        message: String,
    },

    /// Object type tag the engine does not know
    #[error("Unknown bound type '{tag}' on object {id}")]
    UnknownBoundType {
        /// The tag that was encountered
        tag: String,
        /// Object carrying the tag
        id: u64,
    },

    /// Invalid coordinate values
    #[error("Invalid coordinates: {message}")]
    InvalidCoordinates {
        /// Description of the coordinate error
        message: String,
    },
}

impl FormatError {
    /// Create an invalid format error with a message.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an unknown bound type error.
    pub fn unknown_bound_type(tag: impl Into<String>, id: u64) -> Self {
        Self::UnknownBoundType {
            tag: tag.into(),
            id,
        }
    }

    /// Create an invalid coordinates error.
    pub fn invalid_coordinates(message: impl Into<String>) -> Self {
        Self::InvalidCoordinates {
            message: message.into(),
        }
    }
}
