//! Signing request construction
//!
//! A [`SigningRequest`] is a pure value: key parameters, subject names and
//! SAN hosts. It is built and validated here, then handed to a
//! [`Signer`](crate::signer::Signer) which turns it into key material.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Organization applied when a role does not name one
pub const DEFAULT_ORGANIZATION: &str = "Kubernetes";

/// Organizational unit applied when a role does not name one
pub const DEFAULT_ORGANIZATIONAL_UNIT: &str = "Kubernetes The Hard Way";

/// Suffix of key files; role names may not end with it
pub const KEY_SUFFIX: &str = "-key";

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Key algorithm understood by the signing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// RSA
    Rsa,
    /// ECDSA over a NIST curve
    Ecdsa,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa => write!(f, "rsa"),
            Self::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

/// Key algorithm and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySpec {
    /// Algorithm
    pub algo: KeyAlgorithm,
    /// Size in bits (modulus for RSA, curve size for ECDSA)
    pub size: u32,
}

impl Default for KeySpec {
    fn default() -> Self {
        Self {
            algo: KeyAlgorithm::Rsa,
            size: 2048,
        }
    }
}

impl KeySpec {
    /// Reject sizes the engine would refuse
    pub fn validate(&self) -> Result<()> {
        let ok = match self.algo {
            KeyAlgorithm::Rsa => (2048..=8192).contains(&self.size),
            KeyAlgorithm::Ecdsa => matches!(self.size, 256 | 384 | 521),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "unsupported key size {} for {}",
                self.size, self.algo
            )))
        }
    }
}

/// Distinguished name fields shared by every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectName {
    /// Country
    #[serde(rename = "C")]
    pub country: String,
    /// Locality
    #[serde(rename = "L")]
    pub locality: String,
    /// Organization
    #[serde(rename = "O")]
    pub organization: String,
    /// Organizational unit
    #[serde(rename = "OU")]
    pub organizational_unit: String,
}

/// Country and locality applied to every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectDefaults {
    /// Country code
    pub country: String,
    /// Locality
    pub locality: String,
}

impl Default for SubjectDefaults {
    fn default() -> Self {
        Self {
            country: "NL".to_string(),
            locality: "Amsterdam".to_string(),
        }
    }
}

/// What a role asks for; unset fields fall back to defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequest {
    /// Role name, which is also the certificate's file stem
    pub name: String,
    /// Common name (identity claim)
    pub common_name: Option<String>,
    /// Organization (group claim)
    pub organization: Option<String>,
    /// Organizational unit
    pub organizational_unit: Option<String>,
    /// SAN hosts
    pub hosts: Vec<String>,
}

impl RoleRequest {
    /// Request for `name` with every field defaulted
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the common name
    pub fn with_common_name(mut self, cn: impl Into<String>) -> Self {
        self.common_name = Some(cn.into());
        self
    }

    /// Set the organization
    pub fn with_organization(mut self, o: impl Into<String>) -> Self {
        self.organization = Some(o.into());
        self
    }

    /// Set the organizational unit
    pub fn with_organizational_unit(mut self, ou: impl Into<String>) -> Self {
        self.organizational_unit = Some(ou.into());
        self
    }

    /// Append SAN hosts
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.extend(hosts.into_iter().map(Into::into));
        self
    }
}

/// A validated request ready for the signing engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Role name
    pub name: String,
    /// Key parameters
    pub key: KeySpec,
    /// Subject names
    pub subject: SubjectName,
    /// Common name
    pub common_name: Option<String>,
    /// SAN hosts, deduplicated in first-seen order
    pub hosts: Vec<String>,
}

#[derive(Serialize)]
struct CsrDocument<'a> {
    #[serde(rename = "CN", skip_serializing_if = "Option::is_none")]
    common_name: Option<&'a str>,
    key: &'a KeySpec,
    names: [&'a SubjectName; 1],
}

impl SigningRequest {
    /// Encode as the engine's CSR JSON document
    ///
    /// Hosts are left out; the engine takes them on its command line.
    pub fn to_json(&self) -> Result<String> {
        let doc = CsrDocument {
            common_name: self.common_name.as_deref(),
            key: &self.key,
            names: [&self.subject],
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// True if the request carries an identity claim
    pub fn has_identity(&self) -> bool {
        self.common_name.is_some()
    }
}

/// Builds [`SigningRequest`]s from [`RoleRequest`]s
#[derive(Debug, Clone, Default)]
pub struct CertificateRequestBuilder {
    subject: SubjectDefaults,
    key: KeySpec,
}

impl CertificateRequestBuilder {
    /// Create a builder with the given subject defaults and key spec
    pub fn new(subject: SubjectDefaults, key: KeySpec) -> Self {
        Self { subject, key }
    }

    /// Validate a role and fill in defaults
    pub fn build(&self, role: &RoleRequest) -> Result<SigningRequest> {
        validate_role_name(&role.name)?;
        self.key.validate()?;

        if role.name == crate::store::CA_NAME && role.common_name.is_none() {
            return Err(Error::validation(
                "the certificate authority requires a common name",
            ));
        }

        let mut hosts: Vec<String> = Vec::with_capacity(role.hosts.len());
        for host in &role.hosts {
            validate_host(host)?;
            if !hosts.iter().any(|h| h == host) {
                hosts.push(host.clone());
            }
        }

        Ok(SigningRequest {
            name: role.name.clone(),
            key: self.key,
            subject: SubjectName {
                country: self.subject.country.clone(),
                locality: self.subject.locality.clone(),
                organization: role
                    .organization
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string()),
                organizational_unit: role
                    .organizational_unit
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ORGANIZATIONAL_UNIT.to_string()),
            },
            common_name: role.common_name.clone(),
            hosts,
        })
    }
}

/// Check a role name is usable as a file stem
pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("role name must not be empty"));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(Error::validation(format!(
            "role name '{name}' must not start with '.' or '-'"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
    {
        return Err(Error::validation(format!(
            "role name '{name}' contains invalid character '{c}'"
        )));
    }
    if name.ends_with(KEY_SUFFIX) {
        return Err(Error::validation(format!(
            "role name '{name}' must not end with '{KEY_SUFFIX}'"
        )));
    }
    Ok(())
}

/// Check a SAN entry is an IP literal or an RFC 1123 hostname
pub fn validate_host(host: &str) -> Result<()> {
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let invalid = |reason: &str| Error::validation(format!("invalid SAN host '{host}': {reason}"));

    if host.is_empty() {
        return Err(invalid("empty"));
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(invalid("longer than 253 characters"));
    }

    let labels: Vec<&str> = host.split('.').collect();
    for (i, label) in labels.iter().enumerate() {
        if i == 0 && *label == "*" && labels.len() > 1 {
            continue;
        }
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid("label must be 1-63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("label must not start or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("label contains invalid characters"));
        }
    }

    // An all-numeric final label would be a malformed IP, not a name
    if labels
        .last()
        .is_some_and(|l| l.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(invalid("top-level label must not be numeric"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CertificateRequestBuilder {
        CertificateRequestBuilder::default()
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let req = builder().build(&RoleRequest::new("worker-0")).unwrap();

        assert_eq!(req.subject.country, "NL");
        assert_eq!(req.subject.locality, "Amsterdam");
        assert_eq!(req.subject.organization, DEFAULT_ORGANIZATION);
        assert_eq!(req.subject.organizational_unit, DEFAULT_ORGANIZATIONAL_UNIT);
        assert_eq!(req.key, KeySpec::default());
        assert!(req.common_name.is_none());
        assert!(!req.has_identity());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let role = RoleRequest::new("admin")
            .with_common_name("admin")
            .with_organization("system:masters")
            .with_organizational_unit("Kubernetes Admin");
        let req = builder().build(&role).unwrap();

        assert_eq!(req.common_name.as_deref(), Some("admin"));
        assert_eq!(req.subject.organization, "system:masters");
        assert_eq!(req.subject.organizational_unit, "Kubernetes Admin");
    }

    #[test]
    fn hosts_are_deduplicated_in_order() {
        let role = RoleRequest::new("kubernetes").with_hosts([
            "10.0.0.1",
            "kubernetes.default",
            "10.0.0.1",
            "127.0.0.1",
            "kubernetes.default",
        ]);
        let req = builder().build(&role).unwrap();

        assert_eq!(
            req.hosts,
            vec!["10.0.0.1", "kubernetes.default", "127.0.0.1"]
        );
    }

    #[test]
    fn malformed_host_is_named_in_error() {
        let role = RoleRequest::new("kubernetes").with_hosts(["10.0.0.1", "bad host"]);
        let err = builder().build(&role).unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("bad host"));
    }

    #[test]
    fn ca_requires_common_name() {
        let err = builder().build(&RoleRequest::new("ca")).unwrap_err();
        assert!(err.is_validation());

        let req = builder()
            .build(&RoleRequest::new("ca").with_common_name("Kubernetes"))
            .unwrap();
        assert_eq!(req.common_name.as_deref(), Some("Kubernetes"));
    }

    #[test]
    fn host_validation_accepts_names_and_addresses() {
        for host in [
            "127.0.0.1",
            "::1",
            "fd00::10",
            "kubernetes",
            "kubernetes.default",
            "kubernetes.default.svc.cluster.local",
            "worker-0",
            "*.apps.example.com",
            "a1.b2",
        ] {
            assert!(validate_host(host).is_ok(), "{host} should be valid");
        }
    }

    #[test]
    fn host_validation_rejects_malformed_entries() {
        let long_label = "a".repeat(64);
        let long_name = vec!["a"; 130].join(".");
        for host in [
            "",
            "bad host",
            "-leading",
            "trailing-",
            "double..dot",
            "under_score",
            "10.0.0.256",
            "*",
            "a.*.b",
            long_label.as_str(),
            long_name.as_str(),
        ] {
            assert!(validate_host(host).is_err(), "{host:?} should be invalid");
        }
    }

    #[test]
    fn role_names_must_be_file_safe() {
        for name in ["ca", "admin", "https-worker-0", "kube-proxy", "svc_acct", "node.1"] {
            assert!(validate_role_name(name).is_ok(), "{name} should be valid");
        }
        for name in ["", ".hidden", "-flag", "a/b", "a b", "admin-key", "../ca"] {
            assert!(validate_role_name(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn key_spec_bounds() {
        let rsa = |size| KeySpec {
            algo: KeyAlgorithm::Rsa,
            size,
        };
        let ec = |size| KeySpec {
            algo: KeyAlgorithm::Ecdsa,
            size,
        };
        assert!(rsa(2048).validate().is_ok());
        assert!(rsa(4096).validate().is_ok());
        assert!(rsa(1024).validate().is_err());
        assert!(ec(256).validate().is_ok());
        assert!(ec(521).validate().is_ok());
        assert!(ec(2048).validate().is_err());
    }

    #[test]
    fn bad_key_spec_fails_build() {
        let builder = CertificateRequestBuilder::new(
            SubjectDefaults::default(),
            KeySpec {
                algo: KeyAlgorithm::Rsa,
                size: 512,
            },
        );
        assert!(builder.build(&RoleRequest::new("admin")).is_err());
    }

    #[test]
    fn csr_document_matches_engine_format() {
        let role = RoleRequest::new("admin")
            .with_common_name("admin")
            .with_organization("system:masters")
            .with_hosts(["10.0.0.1"]);
        let json = builder().build(&role).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["CN"], "admin");
        assert_eq!(value["key"]["algo"], "rsa");
        assert_eq!(value["key"]["size"], 2048);
        assert_eq!(value["names"][0]["C"], "NL");
        assert_eq!(value["names"][0]["L"], "Amsterdam");
        assert_eq!(value["names"][0]["O"], "system:masters");
        assert_eq!(value["names"][0]["OU"], DEFAULT_ORGANIZATIONAL_UNIT);
        assert!(value.get("hosts").is_none());
    }

    #[test]
    fn csr_document_omits_missing_common_name() {
        let json = builder()
            .build(&RoleRequest::new("worker-0"))
            .unwrap()
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("CN").is_none());
    }
}
