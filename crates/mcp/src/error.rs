//! MCP error types.

use thiserror::Error;

/// Errors from talking to an MCP image service.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The connection could not be established or was interrupted.
    ///
    /// Timeouts land here too.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("server returned {status}: {body}")]
    Protocol { status: u16, body: String },

    /// A response body or stream frame was not valid JSON.
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// The event stream sent more than `limit` bytes without a line break.
    #[error("event stream line exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// `generate-image` was called with an empty prompt.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The configured base URL could not be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl Error {
    /// HTTP status carried by a protocol error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display_includes_status_and_body() {
        let err = Error::Protocol {
            status: 404,
            body: "image not found".into(),
        };
        assert_eq!(err.to_string(), "server returned 404: image not found");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transport());
    }

    #[test]
    fn decode_error_from_serde() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = Error::from(source);
        assert!(err.is_decode());
        assert_eq!(err.status(), None);
    }
}
