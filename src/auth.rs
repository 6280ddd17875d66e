//! Handshake nonce signing.
//!
//! The server proves the client knows the shared secret by sending a nonce
//! that the client signs. The default signature is
//! `base64(HMAC-SHA256(key = secret, message = nonce))`; callers that keep
//! the secret elsewhere (e.g. behind their own server) can plug in any
//! [`NonceSigner`], including a plain closure.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// NonceSigner
// ============================================================================

/// Produces the `hmac` field of an `AuthenticatedConnectRequest`.
pub trait NonceSigner: Send + Sync {
    /// Signs a server-issued nonce.
    fn sign(&self, nonce: &str) -> String;
}

impl<F> NonceSigner for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn sign(&self, nonce: &str) -> String {
        self(nonce)
    }
}

// ============================================================================
// HmacSigner
// ============================================================================

/// Built-in HMAC-SHA256/base64 signer.
#[derive(Clone)]
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    /// Creates a signer over the application's shared secret.
    #[inline]
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl NonceSigner for HmacSigner {
    fn sign(&self, nonce: &str) -> String {
        // HMAC accepts any key length.
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return String::new();
        };
        mac.update(nonce.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

// ============================================================================
// Tests
// ============================================================================
