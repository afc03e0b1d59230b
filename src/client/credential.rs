//! Credential type.

use std::fmt;

/// A credential presented to the remote service.
///
/// Bearer tokens carry end-user identity; API keys are privileged and bypass
/// per-record access control.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    Bearer(String),
    ApiKey(String),
}

impl Credential {
    pub fn as_str(&self) -> &str {
        match self {
            Credential::Bearer(s) | Credential::ApiKey(s) => s,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Credential::ApiKey(_))
    }

    /// Short form safe for logs.
    pub fn fingerprint(&self) -> String {
        let s = self.as_str();
        let kind = if self.is_privileged() { "key" } else { "jwt" };
        let chars: Vec<char> = s.chars().collect();
        if chars.len() <= 12 {
            return format!("{kind}:***");
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{kind}:{head}…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}
