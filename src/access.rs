//! Request gating: shared passphrase and disclaimer acknowledgement.
//!
//! There are no sessions. Each request carries its own [`RequestContext`],
//! built from the `Authorization` header and the form fields, and a review
//! only runs once the context is [`RequestContext::ensure_ready`].
//!
//! The passphrase is a single shared secret, not a per-user credential. It
//! is kept as a SHA-256 digest and candidates are compared digest to digest
//! without early exit, so neither the length nor a matching prefix of the
//! secret leaks through response timing.

use crate::error::CounselError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Why a request may not run a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("A valid passphrase is required")]
    NotAuthenticated,

    #[error("The disclaimer must be accepted before a contract is reviewed")]
    DisclaimerNotAccepted,
}

impl AccessDenied {
    pub fn code(&self) -> &'static str {
        match self {
            AccessDenied::NotAuthenticated => "UNAUTHORIZED",
            AccessDenied::DisclaimerNotAccepted => "DISCLAIMER_REQUIRED",
        }
    }
}

/// Holds the digest of the shared passphrase.
#[derive(Clone)]
pub struct AccessGate {
    digest: [u8; 32],
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("digest", &"<redacted>")
            .finish()
    }
}

impl AccessGate {
    /// # Errors
    /// [`CounselError::InvalidConfig`] for an empty or whitespace-only passphrase.
    pub fn new(passphrase: &str) -> Result<Self, CounselError> {
        if passphrase.trim().is_empty() {
            return Err(CounselError::InvalidConfig(
                "access passphrase must not be empty".into(),
            ));
        }
        Ok(Self {
            digest: sha256(passphrase),
        })
    }

    /// Compare `candidate` with the passphrase in constant time.
    pub fn verify(&self, candidate: &str) -> bool {
        constant_time_compare(&self.digest, &sha256(candidate))
    }

    /// Build the context for one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub fn context(
        &self,
        authorization: Option<&str>,
        disclaimer_accepted: bool,
        test_mode: bool,
    ) -> RequestContext {
        let authenticated = authorization
            .and_then(bearer_token)
            .is_some_and(|token| self.verify(token));
        RequestContext {
            authenticated,
            disclaimer_accepted,
            test_mode,
        }
    }
}

/// Per-request state that used to live in a UI session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub authenticated: bool,
    pub disclaimer_accepted: bool,
    /// Read the document from a local path instead of the upload.
    pub test_mode: bool,
}

impl RequestContext {
    /// Authentication is checked first, then the disclaimer.
    pub fn ensure_ready(&self) -> Result<(), AccessDenied> {
        if !self.authenticated {
            return Err(AccessDenied::NotAuthenticated);
        }
        if !self.disclaimer_accepted {
            return Err(AccessDenied::DisclaimerNotAccepted);
        }
        Ok(())
    }
}

/// Token of a `Bearer` authorization header. The scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Parse a checkbox-style form value.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn sha256(input: &str) -> [u8; 32] {
    Sha256::digest(input.as_bytes()).into()
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
