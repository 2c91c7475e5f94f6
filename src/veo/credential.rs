//! Credential - the user supplied Gemini API key.

use std::fmt;

use sha2::{Digest, Sha256};

use super::client::JobError;

/// The environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key, rejecting empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Result<Self, JobError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(JobError::InvalidInput("API key is empty".to_string()));
        }
        Ok(Self(value))
    }

    /// Read the key from `GEMINI_API_KEY`.
    pub fn from_env() -> Option<Self> {
        std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .and_then(|v| Self::new(v).ok())
    }

    /// The raw key, for request headers and query strings only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short stable identifier safe to log: first 4 bytes of SHA-256 as hex.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}
