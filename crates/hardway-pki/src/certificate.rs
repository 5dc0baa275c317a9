//! Issued certificates and their inspection
//!
//! A [`Certificate`] names a PEM/key file pair in a store root. Contents are
//! read lazily and cached for the lifetime of the value.

use std::cell::OnceCell;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

use crate::error::{Error, Result};

/// PEM tag of an X.509 certificate
const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// One issued key pair on disk
#[derive(Clone)]
pub struct Certificate {
    name: String,
    pem_path: PathBuf,
    key_path: PathBuf,
    issuer: Option<String>,
    pem: OnceCell<String>,
    key: OnceCell<String>,
}

impl Certificate {
    pub(crate) fn new(
        name: impl Into<String>,
        pem_path: PathBuf,
        key_path: PathBuf,
        issuer: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pem_path,
            key_path,
            issuer,
            pem: OnceCell::new(),
            key: OnceCell::new(),
        }
    }

    /// Same as [`Certificate::new`] with contents already in hand
    pub(crate) fn with_contents(mut self, pem: String, key: String) -> Self {
        self.pem = OnceCell::from(pem);
        self.key = OnceCell::from(key);
        self
    }

    /// Role name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the certificate PEM
    pub fn pem_path(&self) -> &Path {
        &self.pem_path
    }

    /// Path of the private key PEM
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Name of the signing authority; `None` for the authority itself
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Certificate PEM, read from disk on first access
    pub fn pem(&self) -> Result<&str> {
        load(&self.pem, &self.pem_path)
    }

    /// Private key PEM, read from disk on first access
    pub fn key(&self) -> Result<&str> {
        load(&self.key, &self.key_path)
    }

    /// Parse the certificate for inspection
    pub fn info(&self) -> Result<CertificateInfo> {
        CertificateInfo::from_pem(self.pem()?)
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("name", &self.name)
            .field("pem_path", &self.pem_path)
            .field("key_path", &self.key_path)
            .field("issuer", &self.issuer)
            .field("key", &"[redacted]")
            .finish()
    }
}

fn load<'a>(cell: &'a OnceCell<String>, path: &Path) -> Result<&'a str> {
    if let Some(contents) = cell.get() {
        return Ok(contents);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(cell.get_or_init(|| contents))
}

/// Fields of interest extracted from an X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject common name, empty when absent
    pub subject_cn: String,
    /// Issuer common name, empty when absent
    pub issuer_cn: String,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// DNS names and IP addresses from the SAN extension
    pub sans: Vec<String>,
    /// Basic constraints marks this certificate as a CA
    pub is_ca: bool,
}

impl CertificateInfo {
    /// Parse from a PEM-encoded certificate
    pub fn from_pem(pem_data: &str) -> Result<Self> {
        let der = certificate_der(pem_data)?;
        Self::from_der(&der)
    }

    /// Parse from a DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::certificate(format!("failed to parse certificate: {e}")))?;

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp())?;
        let not_after = timestamp(validity.not_after.timestamp())?;

        let sans = match cert.subject_alternative_name() {
            Ok(Some(ext)) => ext
                .value
                .general_names
                .iter()
                .filter_map(general_name_to_string)
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                return Err(Error::certificate(format!(
                    "invalid subject alternative names: {e}"
                )))
            }
        };

        Ok(Self {
            subject_cn: common_name(cert.subject()),
            issuer_cn: common_name(cert.issuer()),
            not_before,
            not_after,
            sans,
            is_ca: cert.is_ca(),
        })
    }

    /// Time left until expiry; negative once expired
    pub fn remaining(&self) -> chrono::Duration {
        self.not_after - Utc::now()
    }

    /// True once `not_after` has passed
    pub fn is_expired(&self) -> bool {
        self.remaining() <= chrono::Duration::zero()
    }
}

/// Decode the DER body of a PEM certificate
pub(crate) fn certificate_der(pem_data: &str) -> Result<Vec<u8>> {
    let parsed =
        pem::parse(pem_data).map_err(|e| Error::certificate(format!("invalid PEM: {e}")))?;
    if parsed.tag() != CERTIFICATE_TAG {
        return Err(Error::certificate(format!(
            "expected {CERTIFICATE_TAG} PEM block, found {}",
            parsed.tag()
        )));
    }
    Ok(parsed.into_contents())
}

/// Check a PEM string holds a private key block
pub(crate) fn check_private_key_pem(pem_data: &str) -> Result<()> {
    let parsed =
        pem::parse(pem_data).map_err(|e| Error::certificate(format!("invalid PEM: {e}")))?;
    if !parsed.tag().ends_with("PRIVATE KEY") {
        return Err(Error::certificate(format!(
            "expected a PRIVATE KEY PEM block, found {}",
            parsed.tag()
        )));
    }
    Ok(())
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string()
}

fn general_name_to_string(name: &GeneralName<'_>) -> Option<String> {
    match name {
        GeneralName::DNSName(dns) => Some(dns.to_string()),
        GeneralName::IPAddress(bytes) => match bytes.len() {
            4 => <[u8; 4]>::try_from(*bytes)
                .ok()
                .map(|b| IpAddr::V4(Ipv4Addr::from(b)).to_string()),
            16 => <[u8; 16]>::try_from(*bytes)
                .ok()
                .map(|b| IpAddr::V6(Ipv6Addr::from(b)).to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::certificate(format!("timestamp {secs} out of range")))
}
