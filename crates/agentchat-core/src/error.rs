//! Failure kinds shared by every backend-facing call.
//!
//! Adapters catch transport, status and decode failures at their own
//! boundary and hand them back as a [`ChatError`] value. Nothing in this
//! crate panics or propagates a parse error past an adapter.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::session::SessionId;

/// Boxed cause attached to transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What went wrong underneath a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Dns,
    /// The connection broke while a body or stream was being read.
    Interrupted,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportKind::Timeout => "timeout",
            TransportKind::Connect => "connection failed",
            TransportKind::Dns => "dns",
            TransportKind::Interrupted => "interrupted",
            TransportKind::Other => "transport",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Transport error ({kind}): {source}")]
    Transport {
        kind: TransportKind,
        #[source]
        source: BoxError,
    },

    #[error("Backend returned status {status}: {snippet}")]
    Backend { status: u16, snippet: String },

    #[error("Non-JSON response (status {status}, content-type {content_type}): {snippet}")]
    Decode {
        status: u16,
        content_type: String,
        snippet: String,
    },

    #[error("Response body (status {status}) is larger than {limit} bytes")]
    TooLarge { status: u16, limit: u64 },

    #[error("Unexpected response shape: {0}")]
    ShapeMismatch(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Could not obtain credentials: {0}")]
    Credentials(String),
}

/// Cloneable classification of a [`ChatError`], carried by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport(TransportKind),
    Backend,
    Decode,
    TooLarge,
    ShapeMismatch,
    Precondition,
    NotFound,
    Credentials,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Transport { kind, .. } => ErrorKind::Transport(*kind),
            ChatError::Backend { .. } => ErrorKind::Backend,
            ChatError::Decode { .. } => ErrorKind::Decode,
            ChatError::TooLarge { .. } => ErrorKind::TooLarge,
            ChatError::ShapeMismatch(_) => ErrorKind::ShapeMismatch,
            ChatError::Precondition(_) => ErrorKind::Precondition,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::Credentials(_) => ErrorKind::Credentials,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ChatError::Transport {
                kind: TransportKind::Timeout,
                ..
            }
        )
    }

    /// Wrap an I/O failure that happened while reading a response body.
    pub fn from_read(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportKind::Timeout,
            _ => TransportKind::Interrupted,
        };
        ChatError::Transport {
            kind,
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_read_classifies_timeouts() {
        let err = ChatError::from_read(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_timeout());
        assert_eq!(err.kind(), ErrorKind::Transport(TransportKind::Timeout));
    }

    #[test]
    fn from_read_treats_other_failures_as_interrupted() {
        let err = ChatError::from_read(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(err.kind(), ErrorKind::Transport(TransportKind::Interrupted));
        assert!(!err.is_timeout());
    }

    #[test]
    fn transport_error_keeps_its_cause() {
        use std::error::Error as _;
        let err = ChatError::from_read(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone"));
        let source = err.source().expect("cause attached");
        assert!(source.to_string().contains("pipe gone"));
        assert!(err.to_string().contains("interrupted"));
    }

    #[test]
    fn backend_error_displays_status_and_snippet() {
        let err = ChatError::Backend {
            status: 500,
            snippet: "boom".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn not_found_displays_session_id() {
        let err = ChatError::NotFound(SessionId("sess-9".to_string()));
        assert!(err.to_string().contains("sess-9"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
