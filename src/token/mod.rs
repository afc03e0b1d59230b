//! Bearer token pipeline.
//!
//! # Data Flow
//! ```text
//! raw header value
//!     → cleaner.rs (prefix, quotes, whitespace, URL encoding, dots)
//!     → format.rs (three non-empty base64url segments)
//!     → claims.rs (payload decode, issuer/audience/expiry/subject)
//!     → analyzer.rs (weighted score, warnings vs. hard errors)
//! ```
//!
//! # Design Decisions
//! - Each stage returns a tagged `Result`; the first hard failure stops the pipeline
//! - Nothing here retries: credential failures are never transient

pub mod analyzer;
pub mod claims;
pub mod cleaner;
pub mod extract;
pub mod format;

use thiserror::Error;

use crate::resilience::classifier::ErrorCategory;
use crate::token::claims::PayloadError;

pub use analyzer::{HealthCheck, HealthReport, PipelineStage, TokenHealthAnalyzer, ValidatedToken};
pub use claims::{ClaimsPolicy, TokenClaims};
pub use cleaner::clean_token;
pub use extract::ExtractedCredential;
pub use format::validate_format;

/// Why a credential was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("no credential provided")]
    Missing,

    #[error("credential could not be cleaned: {0}")]
    Cleaning(String),

    #[error("invalid token format: {0}")]
    Format(String),

    #[error("token payload could not be decoded: {0}")]
    Payload(#[from] PayloadError),

    #[error("token claims rejected: {}", .0.join("; "))]
    Claims(Vec<String>),
}

impl TokenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TokenError::Missing | TokenError::Cleaning(_) => ErrorCategory::TokenCleaning,
            TokenError::Format(_) | TokenError::Payload(_) => ErrorCategory::TokenFormat,
            TokenError::Claims(_) => ErrorCategory::TokenClaims,
        }
    }
}
