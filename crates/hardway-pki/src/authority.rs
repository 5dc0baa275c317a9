//! Certificate authority bootstrap
//!
//! A store root holds exactly one authority, named [`CA_NAME`]. It goes from
//! absent to present once, on the first bootstrap, and is never replaced by
//! this crate afterwards.

use tracing::info;

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::request::{CertificateRequestBuilder, RoleRequest};
use crate::store::{CertificateStore, Issuer, PairState, Provenance, CA_NAME};

/// Whether the store root holds an authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityState {
    /// No usable authority on disk
    Absent,
    /// Authority certificate and key are materialized
    Present,
}

/// The store's self-signed root
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    certificate: Certificate,
}

impl CertificateAuthority {
    /// Wrap a certificate that has no issuer
    pub fn from_certificate(certificate: Certificate) -> Result<Self> {
        if certificate.name() != CA_NAME {
            return Err(Error::validation(format!(
                "'{}' is not the certificate authority",
                certificate.name()
            )));
        }
        if let Some(issuer) = certificate.issuer() {
            return Err(Error::validation(format!(
                "certificate authority cannot have an issuer (found '{issuer}')"
            )));
        }
        Ok(Self { certificate })
    }

    /// Underlying certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Authority certificate PEM
    pub fn pem(&self) -> Result<&str> {
        self.certificate.pem()
    }
}

impl CertificateStore {
    /// Report whether the authority is materialized
    pub fn authority_state(&self) -> Result<AuthorityState> {
        Ok(match self.pair_state(CA_NAME)? {
            PairState::Complete => AuthorityState::Present,
            PairState::Absent | PairState::Partial(_) => AuthorityState::Absent,
        })
    }

    /// Load the authority; `NotFound` until it has been bootstrapped
    pub fn authority(&mut self) -> Result<CertificateAuthority> {
        CertificateAuthority::from_certificate(self.get(CA_NAME)?)
    }

    /// Load the authority, creating it from `request` if absent
    pub fn bootstrap_authority(
        &mut self,
        builder: &CertificateRequestBuilder,
        request: &RoleRequest,
    ) -> Result<(CertificateAuthority, Provenance)> {
        let issued = self.issue_or_load(CA_NAME, Issuer::SelfSigned, || builder.build(request))?;
        if issued.provenance == Provenance::Issued {
            info!(root = %self.root().display(), "bootstrapped certificate authority");
        }
        let ca = CertificateAuthority::from_certificate(issued.certificate)?;
        Ok((ca, issued.provenance))
    }
}
