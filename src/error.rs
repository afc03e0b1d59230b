//! Gateway error types.
//!
//! Remote failures are normalized once, at the HTTP boundary, into
//! [`RemoteError`]. Everything downstream (classification, retry policy,
//! circuit breaking) reads only its typed fields.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::resilience::classifier::ErrorCategory;
use crate::token::TokenError;

/// Where a remote failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Connection, DNS or timeout failure before a response arrived.
    Transport,
    /// The service answered with a non-success HTTP status.
    Status,
    /// The response body could not be decoded.
    Decode,
    /// The request could not be constructed locally.
    Request,
}

/// A failure reported by the remote document/account service.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// HTTP status, when the service responded at all.
    pub http_status: Option<u16>,
    /// Transport error code (`ECONNRESET`, `ETIMEDOUT`, ...).
    pub code: Option<String>,
    pub message: String,
}

impl RemoteError {
    /// A transport-level failure carrying an errno-style code.
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transport,
            http_status: None,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// A non-success HTTP response.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Status,
            http_status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// A local failure building the request.
    pub fn request(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Request,
            http_status: None,
            code: None,
            message: message.into(),
        }
    }

    /// A failure identified only by its message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transport,
            http_status: None,
            code: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        let http_status = err.status().map(|s| s.as_u16());

        let kind = if http_status.is_some() {
            RemoteErrorKind::Status
        } else if err.is_decode() {
            RemoteErrorKind::Decode
        } else if err.is_builder() {
            RemoteErrorKind::Request
        } else {
            RemoteErrorKind::Transport
        };

        let code = if err.is_timeout() {
            Some("ETIMEDOUT")
        } else if let Some(code) = io_error_code(&err) {
            Some(code)
        } else if message.to_ascii_lowercase().contains("dns error") {
            Some("ENOTFOUND")
        } else if err.is_connect() {
            Some("ECONNREFUSED")
        } else {
            None
        };

        Self {
            kind,
            http_status,
            code: code.map(str::to_string),
            message,
        }
    }
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        Self::request(format!("invalid service URL: {}", err))
    }
}

/// Walk the source chain looking for an I/O error we can name.
fn io_error_code(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
                io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
                io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                _ => None,
            };
        }
        source = e.source();
    }
    None
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}

/// Top-level error returned by every gateway entry point.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The credential failed cleaning, format or claims validation.
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] TokenError),

    /// The circuit breaker is open; no attempt was made.
    #[error("remote service unavailable: circuit open, retry in {retry_after_secs}s")]
    ServiceUnavailable { retry_after_secs: u64 },

    /// Every allowed attempt failed with a retryable error.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: RemoteError,
    },

    /// A classified, non-retryable remote failure.
    #[error("{category} error after {attempts} attempt(s): {error}")]
    Remote {
        category: ErrorCategory,
        attempts: u32,
        error: RemoteError,
    },

    /// Missing or unusable gateway configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Taxonomy entry for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidCredential(e) => e.category(),
            GatewayError::ServiceUnavailable { .. } => ErrorCategory::CircuitOpen,
            GatewayError::RetryExhausted { last_error, .. } => {
                crate::resilience::classifier::classify(last_error).category
            }
            GatewayError::Remote { category, .. } => *category,
            GatewayError::Config(_) => ErrorCategory::Unknown,
        }
    }

    /// Number of attempts made before this error surfaced, if any.
    pub fn attempts(&self) -> u32 {
        match self {
            GatewayError::RetryExhausted { attempts, .. } | GatewayError::Remote { attempts, .. } => {
                *attempts
            }
            _ => 0,
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
