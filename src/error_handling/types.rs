//! Error type definitions.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Errors surfaced by a send.
///
/// Everything a caller can observe from a failed send falls into one of
/// these categories. Observer failures do not appear here: they are
/// logged and isolated, never propagated. The internal authentication
/// recovery is likewise invisible; callers only see the outcome of the
/// final attempt.
#[derive(Error, Debug)]
pub enum SendError {
    /// The caller-supplied message cannot be sent as constructed; no I/O
    /// was attempted.
    #[error("invalid request: {0}")]
    InvalidArgument(String),

    /// Connection/socket/I/O failure, surfaced after the transport layer
    /// exhausted its own bounded retries.
    #[error("{kind} after {attempts} attempt(s)")]
    Transport {
        /// Classification of the underlying failure
        kind: TransportKind,
        /// Total attempts made, including the first
        attempts: u32,
        /// The underlying transport error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A redirect `Location` that survived neither the absolute parse nor
    /// resolution against the current request URL. The message keeps the
    /// last successfully received response.
    #[error("invalid redirect location {location:?}")]
    InvalidRedirect {
        /// The offending header value
        location: String,
        /// The absolute-parse failure
        #[source]
        source: url::ParseError,
    },
}

impl SendError {
    pub(crate) fn transport(error: reqwest::Error, attempts: u32) -> Self {
        let kind = super::categorize_transport_error(&error);
        SendError::Transport {
            kind,
            attempts,
            source: Box::new(error),
        }
    }

    pub(crate) fn transport_io(error: std::io::Error, attempts: u32) -> Self {
        let kind = super::categorize_io_error(&error);
        SendError::Transport {
            kind,
            attempts,
            source: Box::new(error),
        }
    }
}

/// Classification of transport-level failures.
///
/// Drives both log bucketing and the retry decision: only kinds that
/// indicate a connection-level fault are worth a repeat attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum TransportKind {
    /// Request could not be constructed (bad header value, unsupported
    /// scheme slipping past validation, client build failure)
    Builder,
    /// The configured timeout elapsed
    Timeout,
    /// TCP/TLS connection establishment failed
    Connect,
    /// I/O failure while the request was in flight
    Request,
    /// I/O failure while reading the response body
    Body,
    /// Response could not be decoded
    Decode,
    /// Raw socket failure (upgrade path, file sink)
    Io,
    /// Anything the transport could not classify further
    Other,
}

impl TransportKind {
    /// Returns a human-readable string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Builder => "request build error",
            TransportKind::Timeout => "timeout",
            TransportKind::Connect => "connection error",
            TransportKind::Request => "request I/O error",
            TransportKind::Body => "response body error",
            TransportKind::Decode => "response decode error",
            TransportKind::Io => "socket I/O error",
            TransportKind::Other => "transport error",
        }
    }

    /// Whether a failure of this kind is worth another transport attempt.
    ///
    /// Timeouts and request-construction failures are not retried; only
    /// connection-level I/O faults are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportKind::Connect | TransportKind::Request | TransportKind::Io
        )
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_transport_kinds_have_string_representation() {
        for kind in TransportKind::iter() {
            assert!(
                !kind.as_str().is_empty(),
                "{:?} should have non-empty string",
                kind
            );
        }
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(TransportKind::Connect.is_retryable());
        assert!(TransportKind::Io.is_retryable());
        assert!(!TransportKind::Timeout.is_retryable());
        assert!(!TransportKind::Builder.is_retryable());
        assert!(!TransportKind::Decode.is_retryable());
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::InvalidArgument("unsupported scheme \"ftp\"".to_string());
        assert_eq!(
            err.to_string(),
            "invalid request: unsupported scheme \"ftp\""
        );
    }

    #[test]
    fn test_invalid_redirect_preserves_location() {
        let source = url::Url::parse("::nonsense::").unwrap_err();
        let err = SendError::InvalidRedirect {
            location: "::nonsense::".to_string(),
            source,
        };
        assert!(err.to_string().contains("::nonsense::"));
    }
}
