//! Error classification.
//!
//! # Responsibilities
//! - Map a normalized [`RemoteError`] to a taxonomy entry
//! - Decide whether the failure is transient (worth retrying)
//!
//! # Design Decisions
//! - Pure function, no state
//! - HTTP 401/403/404/429 are never retryable, whatever the message says
//! - Transport codes win over message matching

use std::fmt;

use serde::Serialize;

use crate::error::RemoteError;

/// Transport codes that indicate a transient network condition.
pub const TRANSIENT_CODES: &[&str] = &[
    "ECONNRESET",
    "ENOTFOUND",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ECONNABORTED",
];

/// Message fragments that indicate a transient network condition.
pub const TRANSIENT_PHRASES: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "dns lookup failed",
    "fetch failed",
    "socket disconnected",
];

/// Error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Auth,
    Permission,
    NotFound,
    RateLimit,
    Server,
    TokenFormat,
    TokenCleaning,
    TokenClaims,
    CircuitOpen,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Permission => "permission",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Server => "server",
            ErrorCategory::TokenFormat => "token_format",
            ErrorCategory::TokenCleaning => "token_cleaning",
            ErrorCategory::TokenClaims => "token_claims",
            ErrorCategory::CircuitOpen => "circuit_open",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub retryable: bool,
}

/// Classify a remote error.
pub fn classify(error: &RemoteError) -> Classification {
    let message = error.message.to_ascii_lowercase();
    let transient_code = error
        .code
        .as_deref()
        .is_some_and(|code| TRANSIENT_CODES.contains(&code));
    let transient_message = TRANSIENT_PHRASES.iter().any(|p| message.contains(p));

    let category = categorize(error.http_status, transient_code, transient_message, &message);

    let retryable = match error.http_status {
        Some(401 | 403 | 404 | 429) => false,
        Some(status) if (500..600).contains(&status) => true,
        _ => transient_code || transient_message,
    };

    Classification { category, retryable }
}

fn categorize(
    status: Option<u16>,
    transient_code: bool,
    transient_message: bool,
    message: &str,
) -> ErrorCategory {
    match status {
        Some(401) => return ErrorCategory::Auth,
        Some(403) => return ErrorCategory::Permission,
        Some(404) => return ErrorCategory::NotFound,
        Some(429) => return ErrorCategory::RateLimit,
        Some(s) if (500..600).contains(&s) => return ErrorCategory::Server,
        _ => {}
    }

    if transient_code {
        return ErrorCategory::Network;
    }
    if message.contains("clean") && message.contains("token") {
        return ErrorCategory::TokenCleaning;
    }
    if message.contains("jwt malformed")
        || (message.contains("token") && (message.contains("format") || message.contains("segment")))
    {
        return ErrorCategory::TokenFormat;
    }
    if transient_message {
        return ErrorCategory::Network;
    }
    if message.contains("unauthorized") || message.contains("invalid credentials") || message.contains("jwt expired") {
        return ErrorCategory::Auth;
    }
    if message.contains("permission") || message.contains("forbidden") || message.contains("not authorized") {
        return ErrorCategory::Permission;
    }
    if message.contains("not found") {
        return ErrorCategory::NotFound;
    }
    if message.contains("rate limit") || message.contains("too many requests") {
        return ErrorCategory::RateLimit;
    }
    ErrorCategory::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes_are_retryable() {
        for code in TRANSIENT_CODES {
            let c = classify(&RemoteError::transport(*code, "socket error"));
            assert_eq!(c.category, ErrorCategory::Network, "{}", code);
            assert!(c.retryable, "{}", code);
        }
    }

    #[test]
    fn test_transient_phrases_are_retryable() {
        for msg in ["Request Timeout", "fetch failed", "DNS lookup failed for host", "Socket disconnected before TLS"] {
            let c = classify(&RemoteError::message(msg));
            assert!(c.retryable, "{}", msg);
            assert_eq!(c.category, ErrorCategory::Network);
        }
    }

    #[test]
    fn test_auth_statuses_never_retry() {
        let c = classify(&RemoteError::status(401, "connection reset while reading"));
        assert_eq!(c, Classification { category: ErrorCategory::Auth, retryable: false });

        let c = classify(&RemoteError::status(403, "timeout"));
        assert_eq!(c, Classification { category: ErrorCategory::Permission, retryable: false });

        let mut err = RemoteError::status(404, "document not found");
        err.code = Some("ECONNRESET".into());
        assert_eq!(classify(&err), Classification { category: ErrorCategory::NotFound, retryable: false });
    }

    #[test]
    fn test_server_and_rate_limit() {
        let c = classify(&RemoteError::status(503, "service unavailable"));
        assert_eq!(c, Classification { category: ErrorCategory::Server, retryable: true });

        let c = classify(&RemoteError::status(429, "too many requests"));
        assert_eq!(c, Classification { category: ErrorCategory::RateLimit, retryable: false });
    }

    #[test]
    fn test_rate_limit_with_transient_message_does_not_retry() {
        let c = classify(&RemoteError::status(429, "upstream timeout, too many requests"));
        assert_eq!(c, Classification { category: ErrorCategory::RateLimit, retryable: false });

        let mut err = RemoteError::status(429, "slow down");
        err.code = Some("ETIMEDOUT".into());
        assert!(!classify(&err).retryable);
    }

    #[test]
    fn test_message_only_categories() {
        assert_eq!(classify(&RemoteError::message("jwt malformed")).category, ErrorCategory::TokenFormat);
        assert_eq!(classify(&RemoteError::message("Token could not be cleaned")).category, ErrorCategory::TokenCleaning);
        assert_eq!(classify(&RemoteError::message("Permission denied")).category, ErrorCategory::Permission);
        let c = classify(&RemoteError::message("something odd"));
        assert_eq!(c, Classification { category: ErrorCategory::Unknown, retryable: false });
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(
            serde_json::to_string(&ErrorCategory::RateLimit).unwrap(),
            "\"rate_limit\""
        );
    }
}
