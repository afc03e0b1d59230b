//! Credential normalization.
//!
//! Turns whatever arrived in a header (quoted, prefixed, URL-encoded,
//! wrapped over several lines) into the canonical `header.payload.signature`
//! form. Cleaning an already clean token returns it unchanged.

use thiserror::Error;

use crate::token::format::{validate_format, FormatError};

const SCHEME: &str = "bearer";

/// Why a raw credential could not be cleaned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanError {
    #[error("token is empty")]
    Empty,

    #[error("cleaned token is malformed: {0}")]
    Malformed(#[from] FormatError),
}

/// Normalize a raw credential into a three-segment token.
pub fn clean_token(raw: &str) -> Result<String, CleanError> {
    let trimmed = strip_quotes(raw.trim());
    let unprefixed = strip_scheme(trimmed);
    let mut token = remove_whitespace(unprefixed);

    if token.is_empty() {
        return Err(CleanError::Empty);
    }

    if token.contains('%') {
        if let Ok(decoded) = urlencoding::decode(&token) {
            let decoded = collapse_dots(&remove_whitespace(strip_scheme(decoded.trim())));
            if validate_format(&decoded).is_ok() {
                token = decoded;
            }
        }
    }

    let token = collapse_dots(&token);
    validate_format(&token)?;
    Ok(token)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner.trim();
        }
    }
    s
}

/// Drop a case-insensitive `Bearer ` / `Bearer%20` prefix.
fn strip_scheme(s: &str) -> &str {
    let has_scheme = s
        .get(..SCHEME.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SCHEME));
    if !has_scheme {
        return s;
    }
    let rest = &s[SCHEME.len()..];
    if let Some(r) = rest.strip_prefix("%20") {
        return r;
    }
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return rest.trim_start();
    }
    s
}

fn remove_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn collapse_dots(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_dot = false;
    for c in s.chars() {
        if c == '.' {
            if previous_dot {
                continue;
            }
            previous_dot = true;
        } else {
            previous_dot = false;
        }
        out.push(c);
    }
    out
}
