use std::{io, result::Result as StdResult};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
/// Error type for scriptroom operations.
///
/// Script failures are not represented here: they are data on the unit
/// results. These are failures of the streaming and tool plumbing itself.
pub enum Error {
    /// A fragment handed to the markdown streamer was malformed.
    #[error("Invalid fragment: {message}")]
    InvalidFragment {
        /// What was wrong with the fragment.
        message: String,
    },

    /// Code text would have terminated the surrounding fence.
    #[error("Code text contains the fence token {fence:?} at line {line}")]
    FenceCollision {
        /// The configured fence token.
        fence: String,
        /// 1-based line within the text.
        line: usize,
    },

    /// The append sink is no longer accepting chunks.
    #[error("Append sink closed")]
    SinkClosed,

    /// I/O error with a message.
    #[error("IO error: {message}")]
    Io {
        /// Error message details.
        message: String,
    },

    /// JSON serialization or parsing error.
    #[error("JSON serialization error: {message}")]
    JsonParse {
        /// Error message details.
        message: String,
    },

    /// Invalid configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Create an InvalidFragment error
    pub fn invalid_fragment(message: impl Into<String>) -> Self {
        Self::InvalidFragment {
            message: message.into(),
        }
    }

    /// Whether this error was caused by the caller's input rather than the
    /// sink or environment.
    pub fn is_input_fault(&self) -> bool {
        matches!(self, Self::InvalidFragment { .. } | Self::FenceCollision { .. })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
        }
    }
}

/// Result alias using the crate error type.
pub type Result<T> = StdResult<T, Error>;
