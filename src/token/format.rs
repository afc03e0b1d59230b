//! Structural token checks.

use thiserror::Error;

/// Why a token does not have the three-segment base64url shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("expected 3 segments, found {found}")]
    SegmentCount { found: usize },

    #[error("segment {index} is empty")]
    EmptySegment { index: usize },

    #[error("segment {index} contains characters outside the base64url alphabet")]
    InvalidCharacters { index: usize },
}

/// `^[A-Za-z0-9_-]*$`
pub fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Confirm exactly three non-empty base64url segments.
pub fn validate_format(token: &str) -> Result<(), FormatError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(FormatError::SegmentCount { found: segments.len() });
    }
    for (index, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(FormatError::EmptySegment { index });
        }
        if !is_base64url(segment) {
            return Err(FormatError::InvalidCharacters { index });
        }
    }
    Ok(())
}

pub fn is_well_formed(token: &str) -> bool {
    validate_format(token).is_ok()
}
