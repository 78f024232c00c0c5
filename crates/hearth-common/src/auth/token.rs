//! Bot token handling
//!
//! Tokens are validated once at startup. A malformed token fails the whole
//! client before any connection is attempted.

use std::fmt;

/// Validated bot token
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    const PREFIX: &'static str = "Bot ";

    /// Parse a raw token, accepting an optional `Bot ` prefix
    ///
    /// A bot token is three non-empty dot-separated segments of url-safe base64.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let trimmed = raw.trim();
        let token = trimmed.strip_prefix(Self::PREFIX).unwrap_or(trimmed).trim();

        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(TokenError::Malformed("expected three dot-separated segments"));
        }

        let valid_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if !segments.iter().all(|s| s.chars().all(valid_char)) {
            return Err(TokenError::Malformed("unexpected character"));
        }

        Ok(Self(token.to_string()))
    }

    /// Raw token, as sent in IDENTIFY
    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header for REST calls
    pub fn authorization_header(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl std::str::FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::parse(s)
    }
}

/// Token validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token is empty")]
    Empty,

    #[error("Malformed token: {0}")]
    Malformed(&'static str),
}
