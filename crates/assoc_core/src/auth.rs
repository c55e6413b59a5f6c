//! Identity provider contract.
//!
//! Session-token issuance and verification live outside this crate. The
//! creation gate only needs "credentials in, acting author id out".

use crate::model::record::RecordId;
use std::error::Error;
use std::fmt::{Display, Formatter};

const BEARER_SCHEME: &str = "Bearer";

/// Opaque request credentials (a session token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Parses an `Authorization` header value. Accepts `Bearer <token>` and
    /// a bare token.
    pub fn from_authorization_header(value: &str) -> Result<Self, AuthError> {
        let trimmed = value.trim();
        let token = match trimmed.strip_prefix(BEARER_SCHEME) {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => trimmed,
        };
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(Self::new(token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    /// Token rejected by the provider; carries the provider's reason.
    InvalidCredentials(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "missing credentials"),
            Self::InvalidCredentials(reason) => write!(f, "invalid credentials: {reason}"),
        }
    }
}

impl Error for AuthError {}

/// Resolves request credentials to an authenticated author id.
pub trait IdentityProvider {
    fn authenticate(&self, credentials: &Credentials) -> Result<RecordId, AuthError>;
}
