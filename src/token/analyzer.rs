//! Token health analysis.
//!
//! Runs clean → format → claims and scores the result:
//!
//! | check            | points |
//! |------------------|--------|
//! | exists           | 20     |
//! | cleanable        | 15     |
//! | three-part format| 20     |
//! | payload decodes  | 15     |
//! | claims valid     | 15     |
//! | no warnings      | 15     |
//!
//! A hard failure stops the pipeline at that stage. Warnings never make a
//! token invalid.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::token::claims::{decode_payload, validate_claims, ClaimsPolicy, TokenClaims};
use crate::token::cleaner::{clean_token, CleanError};
use crate::token::format::validate_format;
use crate::token::TokenError;

const EXISTS_POINTS: u8 = 20;
const CLEAN_POINTS: u8 = 15;
const FORMAT_POINTS: u8 = 20;
const PAYLOAD_POINTS: u8 = 15;
const CLAIMS_POINTS: u8 = 15;
const NO_WARNINGS_POINTS: u8 = 15;

const STALE_ISSUE_SECS: i64 = 24 * 60 * 60;

/// Pipeline stage, used to locate the first hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Existence,
    Cleaning,
    Format,
    Payload,
    Claims,
}

/// One scored check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub passed: bool,
    pub points: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Diagnostic report for a raw credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub score: u8,
    pub checks: Vec<HealthCheck>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
}

impl HealthReport {
    fn new() -> Self {
        Self {
            score: 0,
            checks: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            is_valid: false,
            failed_stage: None,
            claims: None,
        }
    }

    fn pass(&mut self, name: &'static str, points: u8) {
        self.score += points;
        self.checks.push(HealthCheck { name, passed: true, points, detail: None });
    }

    fn fail(mut self, name: &'static str, stage: PipelineStage, detail: String) -> Self {
        self.checks.push(HealthCheck { name, passed: false, points: 0, detail: Some(detail.clone()) });
        self.errors.push(detail);
        self.failed_stage = Some(stage);
        self.is_valid = false;
        self
    }
}

/// A token that passed every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Orchestrates the token pipeline.
#[derive(Debug, Clone)]
pub struct TokenHealthAnalyzer {
    policy: ClaimsPolicy,
    header_names: Vec<String>,
}

impl TokenHealthAnalyzer {
    pub fn new(policy: ClaimsPolicy, header_names: Vec<String>) -> Self {
        Self { policy, header_names }
    }

    pub fn policy(&self) -> &ClaimsPolicy {
        &self.policy
    }

    /// Fallback headers consulted after `Authorization`.
    pub fn header_names(&self) -> &[String] {
        &self.header_names
    }

    /// Score a raw credential at the current time.
    pub fn clean_and_analyze(&self, raw: Option<&str>) -> HealthReport {
        self.analyze_at(raw, unix_now())
    }

    /// Score a raw credential at `now` (unix seconds).
    pub fn analyze_at(&self, raw: Option<&str>, now: i64) -> HealthReport {
        let mut report = HealthReport::new();

        let raw = match raw.filter(|r| !r.trim().is_empty()) {
            Some(raw) => raw,
            None => return report.fail("exists", PipelineStage::Existence, "No token provided".to_string()),
        };
        report.pass("exists", EXISTS_POINTS);

        let token = match clean_token(raw) {
            Ok(token) => token,
            Err(e) => {
                return report.fail("cleanable", PipelineStage::Cleaning, format!("Token cleaning failed: {}", e))
            }
        };
        report.pass("cleanable", CLEAN_POINTS);
        if token != raw {
            report
                .warnings
                .push("Token required cleaning (prefix, quotes, whitespace or encoding removed)".to_string());
        }

        if let Err(e) = validate_format(&token) {
            return report.fail("format", PipelineStage::Format, format!("Invalid token format: {}", e));
        }
        report.pass("format", FORMAT_POINTS);

        let claims = match decode_payload(&token, self.policy.max_payload_bytes) {
            Ok(claims) => claims,
            Err(e) => {
                return report.fail("payload", PipelineStage::Payload, format!("Token payload could not be decoded: {}", e))
            }
        };
        report.pass("payload", PAYLOAD_POINTS);

        let violations = validate_claims(&claims, &self.policy, now);
        if violations.is_empty() {
            report.pass("claims", CLAIMS_POINTS);
        } else {
            report.checks.push(HealthCheck {
                name: "claims",
                passed: false,
                points: 0,
                detail: Some(violations.join("; ")),
            });
            report.errors.extend(violations);
            report.failed_stage = Some(PipelineStage::Claims);
        }

        if let Some(exp) = claims.expires_at {
            let remaining = exp.saturating_sub(now);
            if remaining > 0 && remaining < self.policy.expiry_warning_secs {
                report.warnings.push(format!("Token expires in {} seconds", remaining));
            }
        }
        if let Some(iat) = claims.issued_at {
            let age = now.saturating_sub(iat);
            if age > STALE_ISSUE_SECS {
                report
                    .warnings
                    .push(format!("Token was issued {} hours ago", age / 3600));
            }
        }

        if report.warnings.is_empty() && report.errors.is_empty() {
            report.pass("no_warnings", NO_WARNINGS_POINTS);
        }

        report.is_valid = report.errors.is_empty();
        report.claims = Some(claims);
        report
    }

    /// Run the pipeline at the current time, returning the clean token and claims.
    pub fn validate(&self, raw: &str) -> Result<ValidatedToken, TokenError> {
        self.validate_at(raw, unix_now())
    }

    /// Run the pipeline at `now` (unix seconds).
    pub fn validate_at(&self, raw: &str, now: i64) -> Result<ValidatedToken, TokenError> {
        let token = clean_token(raw).map_err(|e| match e {
            CleanError::Empty => TokenError::Missing,
            CleanError::Malformed(inner) => TokenError::Format(inner.to_string()),
        })?;
        validate_format(&token).map_err(|e| TokenError::Format(e.to_string()))?;
        let claims = decode_payload(&token, self.policy.max_payload_bytes)?;

        let violations = validate_claims(&claims, &self.policy, now);
        if !violations.is_empty() {
            return Err(TokenError::Claims(violations));
        }

        Ok(ValidatedToken { token, claims })
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
