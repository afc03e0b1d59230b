//! Payload decoding and claims validation.
//!
//! # Responsibilities
//! - Decode the middle token segment (base64url, padding restored)
//! - Refuse oversized payloads before parsing them
//! - Check issuer, audience, expiry, not-before and subject
//!
//! # Design Decisions
//! - Signature verification is out of scope: tokens are minted and signed
//!   by the identity provider, the remote service verifies them
//! - All violations are collected; validation never stops at the first one

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;

/// Why the payload segment could not be turned into claims.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("token has no payload segment")]
    Missing,

    #[error("payload is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not a JSON object: {0}")]
    Json(String),
}

/// Claims extracted from a token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub expires_at: Option<i64>,
    pub issued_at: Option<i64>,
    pub not_before: Option<i64>,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    user_id: Option<String>,
    #[serde(rename = "userId")]
    user_id_camel: Option<String>,
    iss: Option<String>,
    aud: Option<Audience>,
    exp: Option<f64>,
    iat: Option<f64>,
    nbf: Option<f64>,
    session_id: Option<String>,
    #[serde(rename = "sessionId")]
    session_id_camel: Option<String>,
    sid: Option<String>,
}

impl From<RawClaims> for TokenClaims {
    fn from(raw: RawClaims) -> Self {
        let audience = match raw.aud {
            Some(Audience::One(aud)) => vec![aud],
            Some(Audience::Many(auds)) => auds,
            None => Vec::new(),
        };
        Self {
            subject: raw
                .sub
                .or(raw.user_id)
                .or(raw.user_id_camel)
                .filter(|s| !s.is_empty()),
            issuer: raw.iss,
            audience,
            expires_at: raw.exp.and_then(unix_seconds),
            issued_at: raw.iat.and_then(unix_seconds),
            not_before: raw.nbf.and_then(unix_seconds),
            session_id: raw.session_id.or(raw.session_id_camel).or(raw.sid),
        }
    }
}

/// NaN and infinities count as absent; finite values saturate into `i64`.
fn unix_seconds(value: f64) -> Option<i64> {
    value.is_finite().then(|| value as i64)
}

/// What a valid token must assert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsPolicy {
    pub issuer_marker: String,
    pub audience: String,
    pub expiry_warning_secs: i64,
    pub max_payload_bytes: usize,
}

impl ClaimsPolicy {
    /// Build from config; empty issuer marker and missing audience fall back to the project id.
    pub fn from_config(config: &TokenConfig, project_id: &str) -> Self {
        let issuer_marker = if config.issuer_marker.is_empty() {
            project_id.to_string()
        } else {
            config.issuer_marker.clone()
        };
        Self {
            issuer_marker,
            audience: config.audience.clone().unwrap_or_else(|| project_id.to_string()),
            expiry_warning_secs: i64::try_from(config.expiry_warning_secs).unwrap_or(i64::MAX),
            max_payload_bytes: config.max_payload_bytes,
        }
    }
}

/// Decode the payload segment of a well-formed token.
pub fn decode_payload(token: &str, max_bytes: usize) -> Result<TokenClaims, PayloadError> {
    let segment = token.split('.').nth(1).ok_or(PayloadError::Missing)?;

    // 4 base64 chars per 3 bytes; skip decoding anything clearly oversized
    let estimated = segment.len() / 4 * 3;
    if estimated > max_bytes + 3 {
        return Err(PayloadError::TooLarge { size: estimated, limit: max_bytes });
    }

    let mut padded = segment.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|e| PayloadError::Base64(e.to_string()))?;

    if bytes.len() > max_bytes {
        return Err(PayloadError::TooLarge { size: bytes.len(), limit: max_bytes });
    }

    let raw: RawClaims = serde_json::from_slice(&bytes).map_err(|e| PayloadError::Json(e.to_string()))?;
    Ok(raw.into())
}

/// Check claims against the policy at `now` (unix seconds). Empty = valid.
pub fn validate_claims(claims: &TokenClaims, policy: &ClaimsPolicy, now: i64) -> Vec<String> {
    let mut violations = Vec::new();

    // An empty expectation matches nothing rather than everything
    match claims.issuer.as_deref() {
        _ if policy.issuer_marker.is_empty() => violations.push("No expected issuer configured".to_string()),
        Some(iss) if iss.contains(&policy.issuer_marker) => {}
        Some(iss) => violations.push(format!("Invalid issuer: {}", iss)),
        None => violations.push("Token has no issuer".to_string()),
    }

    if policy.audience.is_empty() {
        violations.push("No expected audience configured".to_string());
    } else if !claims.audience.iter().any(|a| *a == policy.audience) {
        let got = if claims.audience.is_empty() {
            "none".to_string()
        } else {
            claims.audience.join(", ")
        };
        violations.push(format!("Invalid audience: expected {}, got {}", policy.audience, got));
    }

    match claims.expires_at {
        Some(exp) if exp <= now => {
            violations.push(format!("Token expired {} seconds ago", now.saturating_sub(exp)));
        }
        Some(_) => {}
        None => violations.push("Token has no expiration".to_string()),
    }

    if let Some(nbf) = claims.not_before {
        if nbf > now {
            violations.push(format!("Token not valid for another {} seconds", nbf.saturating_sub(now)));
        }
    }

    if claims.subject.is_none() {
        violations.push("Token has no subject or user identifier".to_string());
    }

    violations
}
