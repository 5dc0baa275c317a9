//! Signing engine port
//!
//! The store never produces key material itself. It hands a
//! [`SigningRequest`] to a [`Signer`] and persists whatever comes back.
//! [`CfsslSigner`] is the production implementation; tests substitute
//! their own.

mod cfssl;
mod process;

pub use cfssl::{CfsslSigner, DEFAULT_SIGNER_TIMEOUT};

#[cfg(test)]
use mockall::automock;

use serde::Deserialize;

use crate::authority::CertificateAuthority;
use crate::error::Result;
use crate::request::SigningRequest;

/// Certificate and private key returned by the engine, both PEM
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SignedPair {
    /// Certificate PEM
    pub cert: String,
    /// Private key PEM
    pub key: String,
}

impl SignedPair {
    /// Pair from PEM strings
    pub fn new(cert: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Debug for SignedPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedPair")
            .field("cert", &self.cert)
            .field("key", &"[redacted]")
            .finish()
    }
}

/// Produces key material for signing requests
///
/// Every call generates a fresh key; callers are responsible for not
/// asking twice.
#[cfg_attr(test, automock)]
pub trait Signer: Send + Sync {
    /// Create a self-signed certificate authority
    fn sign_ca(&self, request: &SigningRequest) -> Result<SignedPair>;

    /// Issue a certificate signed by `ca`
    fn sign(&self, request: &SigningRequest, ca: &CertificateAuthority) -> Result<SignedPair>;
}
