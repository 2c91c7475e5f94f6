//! Classification of provider error text into rejection kinds.
//!
//! The Gemini API reports most failures as free text, so the credential
//! related ones are recognised by keyword.

/// What a remote failure means for the stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The key is malformed, unknown or revoked.
    InvalidCredential,
    /// The key is valid but not allowed to use the model.
    PermissionDenied,
    /// The key ran out of quota on the provider side.
    QuotaExhausted,
    /// Anything else. The credential stays in place.
    Other,
}

impl RejectionKind {
    /// Whether the user has to enter a new credential.
    pub fn is_credential_related(&self) -> bool {
        !matches!(self, RejectionKind::Other)
    }
}

/// Maps an error message to a [`RejectionKind`].
pub trait RejectionClassifier {
    fn classify(&self, message: &str) -> RejectionKind;
}

/// Keyword sets checked in order; first hit wins.
const INVALID_CREDENTIAL_KEYWORDS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "invalid key",
    "unauthenticated",
    "400",
];

const PERMISSION_KEYWORDS: &[&str] = &["permission denied", "permission_denied", "forbidden", "403"];

const QUOTA_KEYWORDS: &[&str] = &["quota", "resource_exhausted", "resource exhausted"];

/// Case-insensitive substring classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    invalid_credential: Vec<String>,
    permission: Vec<String>,
    quota: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            invalid_credential: to_owned(INVALID_CREDENTIAL_KEYWORDS),
            permission: to_owned(PERMISSION_KEYWORDS),
            quota: to_owned(QUOTA_KEYWORDS),
        }
    }
}

fn to_owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}

impl KeywordClassifier {
    /// Build a classifier with custom keyword lists.
    pub fn new(invalid_credential: Vec<String>, permission: Vec<String>, quota: Vec<String>) -> Self {
        let lower = |v: Vec<String>| v.into_iter().map(|k| k.to_lowercase()).collect();
        Self {
            invalid_credential: lower(invalid_credential),
            permission: lower(permission),
            quota: lower(quota),
        }
    }
}

impl RejectionClassifier for KeywordClassifier {
    fn classify(&self, message: &str) -> RejectionKind {
        let lower = message.to_lowercase();
        let hit = |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

        // Permission and quota first: their messages often mention the API key too.
        if hit(&self.permission) {
            RejectionKind::PermissionDenied
        } else if hit(&self.quota) {
            RejectionKind::QuotaExhausted
        } else if hit(&self.invalid_credential) {
            RejectionKind::InvalidCredential
        } else {
            RejectionKind::Other
        }
    }
}
