//! Shared fixtures for store integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use hardway_pki::{CertificateAuthority, Error, Result, SignedPair, Signer, SigningRequest};
use rcgen::{
    string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa,
    Issuer, KeyPair, SanType,
};

/// Every call the fake engine received, by role
#[derive(Debug, Default)]
pub struct SignerLog {
    calls: Mutex<Vec<String>>,
}

impl SignerLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, role: &str) -> usize {
        self.calls().iter().filter(|c| *c == role).count()
    }

    fn record(&self, role: &str) {
        self.calls.lock().unwrap().push(role.to_string());
    }
}

/// Signs with rcgen so tests get real, parseable certificates
pub struct RcgenSigner {
    log: Arc<SignerLog>,
    failing: Vec<String>,
}

impl RcgenSigner {
    pub fn new() -> (Self, Arc<SignerLog>) {
        let log = Arc::new(SignerLog::default());
        (
            Self {
                log: Arc::clone(&log),
                failing: Vec::new(),
            },
            log,
        )
    }

    /// Make the engine fail for `role` the way a broken cfssl would
    pub fn failing_for(mut self, role: &str) -> Self {
        self.failing.push(role.to_string());
        self
    }

    fn params(request: &SigningRequest) -> CertificateParams {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = &request.common_name {
            params.distinguished_name.push(DnType::CommonName, cn.as_str());
        }
        params
            .distinguished_name
            .push(DnType::OrganizationName, request.subject.organization.as_str());
        params.distinguished_name.push(
            DnType::OrganizationalUnitName,
            request.subject.organizational_unit.as_str(),
        );
        params
            .distinguished_name
            .push(DnType::CountryName, request.subject.country.as_str());
        params
            .distinguished_name
            .push(DnType::LocalityName, request.subject.locality.as_str());
        params.subject_alt_names = request
            .hosts
            .iter()
            .map(|h| match h.parse::<std::net::IpAddr>() {
                Ok(ip) => SanType::IpAddress(ip),
                Err(_) => SanType::DnsName(Ia5String::try_from(h.clone()).unwrap()),
            })
            .collect();
        params
    }

    fn check_failure(&self, request: &SigningRequest) -> Result<()> {
        self.log.record(&request.name);
        if self.failing.contains(&request.name) {
            return Err(Error::SignerFailed {
                role: request.name.clone(),
                status: "exit status: 1".to_string(),
                stderr: "[ERROR] failed to sign".to_string(),
            });
        }
        Ok(())
    }
}

impl Signer for RcgenSigner {
    fn sign_ca(&self, request: &SigningRequest) -> Result<SignedPair> {
        self.check_failure(request)?;
        let mut params = Self::params(request);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Ok(SignedPair::new(cert.pem(), key.serialize_pem()))
    }

    fn sign(&self, request: &SigningRequest, ca: &CertificateAuthority) -> Result<SignedPair> {
        self.check_failure(request)?;
        let ca_key = KeyPair::from_pem(ca.certificate().key()?).unwrap();
        let issuer = Issuer::from_ca_cert_pem(ca.pem()?, &ca_key).unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = Self::params(request).signed_by(&key, &issuer).unwrap();
        Ok(SignedPair::new(cert.pem(), key.serialize_pem()))
    }
}
