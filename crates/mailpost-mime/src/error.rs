//! Error types for mail message operations.

use std::io;

/// Result type alias for mail message operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Mail message error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed header block, part header or multipart structure.
    #[error("Malformed message: {0}")]
    MessageFormat(String),

    /// Invalid transfer-encoded data.
    #[error("Invalid encoding: {0}")]
    Encoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The input stream did not contain any data.
    #[error("No message present")]
    NoMessage,

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// A fixed multipart boundary occurs inside a part body.
    #[error("Boundary {0:?} occurs in part content")]
    BoundaryCollision(String),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error raised by a part handler.
    #[error("Part handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Creates a message format error.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::MessageFormat(message.into())
    }

    /// Wraps an arbitrary error raised inside a part handler.
    #[must_use]
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(err.into())
    }

    /// Returns true if the input was a malformed message.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::MessageFormat(_) | Self::InvalidContentType(_))
    }

    /// Returns true if transfer-encoded data could not be decoded.
    #[must_use]
    pub const fn is_encoding_error(&self) -> bool {
        matches!(self, Self::Encoding(_) | Self::Base64(_))
    }

    /// Returns true if the stream ended before any message data.
    ///
    /// This is a clean end of input, not a corrupt message.
    #[must_use]
    pub const fn is_no_message(&self) -> bool {
        matches!(self, Self::NoMessage)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::format("bad header").is_format_error());
        assert!(Error::Encoding("=ZZ".into()).is_encoding_error());
        assert!(Error::NoMessage.is_no_message());
        assert!(!Error::NoMessage.is_format_error());
        assert!(!Error::format("x").is_no_message());
    }

    #[test]
    fn test_handler_error_display() {
        let err = Error::handler("disk full");
        assert_eq!(err.to_string(), "Part handler failed: disk full");
    }
}
