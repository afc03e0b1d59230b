//! Credential extraction from request headers.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::client::Credential;
use crate::token::analyzer::TokenHealthAnalyzer;
use crate::token::claims::TokenClaims;
use crate::token::TokenError;

/// A validated bearer credential and its claims.
#[derive(Debug, Clone)]
pub struct ExtractedCredential {
    pub credential: Credential,
    pub claims: TokenClaims,
}

impl TokenHealthAnalyzer {
    /// Read the bearer token from `Authorization` (or a fallback header),
    /// clean and validate it.
    pub fn validate_and_extract_credential(&self, headers: &HeaderMap) -> Result<ExtractedCredential, TokenError> {
        let raw = self.raw_credential(headers)?;
        let validated = self.validate(&raw).inspect_err(|e| {
            tracing::debug!(error = %e, "Rejected request credential");
        })?;

        Ok(ExtractedCredential {
            credential: Credential::Bearer(validated.token),
            claims: validated.claims,
        })
    }

    fn raw_credential(&self, headers: &HeaderMap) -> Result<String, TokenError> {
        let value = std::iter::once(AUTHORIZATION.as_str())
            .chain(self.header_names().iter().map(String::as_str))
            .find_map(|name| headers.get(name).filter(|v| !v.is_empty()))
            .ok_or(TokenError::Missing)?;

        value
            .to_str()
            .map(str::to_string)
            .map_err(|_| TokenError::Cleaning("header value is not visible ASCII".to_string()))
    }
}
