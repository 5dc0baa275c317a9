//! Kubeconfig credential bundles
//!
//! A bundle embeds the authority certificate and one client key pair from
//! the store into a single-cluster, single-user kubeconfig. Bundles are
//! derived artifacts: they are rebuilt on demand and only written when the
//! caller asks.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::authority::CertificateAuthority;
use crate::error::{Error, Result};
use crate::fs::{is_staging_file, read_optional, write_atomic, FileMode};
use crate::request::{validate_host, validate_role_name};
use crate::store::CertificateStore;

/// Default cluster entry name
pub const DEFAULT_CLUSTER_NAME: &str = "kubernetes";

/// Context every bundle selects
pub const DEFAULT_CONTEXT: &str = "default";

/// API server port assumed for bare host endpoints
pub const DEFAULT_API_PORT: u16 = 6443;

/// File suffix of written bundles
pub const KUBECONFIG_SUFFIX: &str = ".kubeconfig";

/// Kubeconfig document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kubeconfig {
    /// API version
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Kind (always "Config")
    pub kind: String,
    /// Client preferences (always empty)
    #[serde(default)]
    pub preferences: Preferences,
    /// Clusters
    pub clusters: Vec<NamedCluster>,
    /// Users
    pub users: Vec<NamedUser>,
    /// Contexts
    pub contexts: Vec<NamedContext>,
    /// Selected context
    #[serde(rename = "current-context")]
    pub current_context: String,
}

/// Empty preferences block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {}

/// Cluster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// Cluster name
    pub name: String,
    /// Cluster config
    pub cluster: ClusterConfig,
}

/// Cluster connection details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// CA certificate (base64 encoded PEM)
    pub certificate_authority_data: String,
    /// API server URL
    pub server: String,
}

/// User entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    /// User name
    pub name: String,
    /// Credentials
    pub user: UserConfig,
}

/// Client certificate credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
    /// Client certificate (base64 encoded PEM)
    pub client_certificate_data: String,
    /// Client key (base64 encoded PEM)
    pub client_key_data: String,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("client_certificate_data", &self.client_certificate_data)
            .field("client_key_data", &"[redacted]")
            .finish()
    }
}

/// Context entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    /// Context name
    pub name: String,
    /// Cluster/user binding
    pub context: ContextConfig,
}

/// Cluster/user binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cluster name
    pub cluster: String,
    /// User name
    pub user: String,
}

impl Kubeconfig {
    /// Server URL of the first cluster
    pub fn server(&self) -> Option<&str> {
        self.clusters.first().map(|c| c.cluster.server.as_str())
    }

    /// Name of the first user
    pub fn username(&self) -> Option<&str> {
        self.users.first().map(|u| u.name.as_str())
    }
}

/// Kubeconfig bound to a role and username
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Role the bundle is written for
    pub role: String,
    /// Identity presented to the API server
    pub username: String,
    /// The document
    pub kubeconfig: Kubeconfig,
}

impl CredentialBundle {
    /// Serialize the kubeconfig as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.kubeconfig)?)
    }
}

/// Builds [`CredentialBundle`]s from store contents
#[derive(Debug, Clone)]
pub struct KubeconfigAssembler {
    cluster_name: String,
}

impl Default for KubeconfigAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_NAME)
    }
}

impl KubeconfigAssembler {
    /// Assembler naming its cluster entry `cluster_name`
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    /// Build the bundle for `role` from certificate `certificate_name`
    ///
    /// Both the authority and the certificate must be materialized; the
    /// store is consulted so a pair deleted on disk reads as `NotFound`.
    /// `cluster_endpoint` is embedded exactly as given once it passes
    /// [`validate_endpoint`].
    pub fn assemble(
        &self,
        store: &mut CertificateStore,
        role: &str,
        certificate_name: &str,
        username: &str,
        cluster_endpoint: &str,
        ca: &CertificateAuthority,
    ) -> Result<CredentialBundle> {
        validate_role_name(role)?;
        if username.trim().is_empty() {
            return Err(Error::validation(format!(
                "kubeconfig for '{role}' needs a username"
            )));
        }
        validate_endpoint(cluster_endpoint)?;

        let authority = store.get(ca.certificate().name())?;
        let client = store.get(certificate_name)?;

        let kubeconfig = Kubeconfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            preferences: Preferences::default(),
            clusters: vec![NamedCluster {
                name: self.cluster_name.clone(),
                cluster: ClusterConfig {
                    certificate_authority_data: STANDARD.encode(authority.pem()?),
                    server: cluster_endpoint.to_string(),
                },
            }],
            users: vec![NamedUser {
                name: username.to_string(),
                user: UserConfig {
                    client_certificate_data: STANDARD.encode(client.pem()?),
                    client_key_data: STANDARD.encode(client.key()?),
                },
            }],
            contexts: vec![NamedContext {
                name: DEFAULT_CONTEXT.to_string(),
                context: ContextConfig {
                    cluster: self.cluster_name.clone(),
                    user: username.to_string(),
                },
            }],
            current_context: DEFAULT_CONTEXT.to_string(),
        };

        debug!(role, username, certificate = certificate_name, "assembled kubeconfig");
        Ok(CredentialBundle {
            role: role.to_string(),
            username: username.to_string(),
            kubeconfig,
        })
    }
}

/// Check `endpoint` is a usable API server address without rewriting it
///
/// Accepts everything [`normalize_endpoint`] accepts, minus surrounding
/// whitespace.
pub fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint != endpoint.trim() {
        return Err(Error::validation(format!(
            "cluster endpoint '{endpoint}' has surrounding whitespace"
        )));
    }
    normalize_endpoint(endpoint).map(|_| ())
}

/// Turn an endpoint into an API server URL
///
/// URLs must use `http` or `https` and name a host. A bare host or address
/// gets `https://` and port 6443 unless it already carries a port.
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::validation("cluster endpoint must not be empty"));
    }

    if let Some((scheme, rest)) = endpoint.split_once("://") {
        if scheme != "https" && scheme != "http" {
            return Err(Error::validation(format!(
                "cluster endpoint '{endpoint}' must use http or https"
            )));
        }
        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() || authority.starts_with(':') {
            return Err(Error::validation(format!(
                "cluster endpoint '{endpoint}' has no host"
            )));
        }
        return Ok(endpoint.to_string());
    }

    if let Ok(ip) = endpoint.parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(v4) => format!("https://{v4}:{DEFAULT_API_PORT}"),
            IpAddr::V6(v6) => format!("https://[{v6}]:{DEFAULT_API_PORT}"),
        });
    }

    if let Some((host, port)) = endpoint.rsplit_once(':') {
        if port.parse::<u16>().is_ok() {
            let bare = host.trim_start_matches('[').trim_end_matches(']');
            validate_host(bare)
                .map_err(|_| Error::validation(format!("invalid cluster endpoint '{endpoint}'")))?;
            return Ok(format!("https://{host}:{port}"));
        }
    }

    validate_host(endpoint)
        .map_err(|_| Error::validation(format!("invalid cluster endpoint '{endpoint}'")))?;
    Ok(format!("https://{endpoint}:{DEFAULT_API_PORT}"))
}

/// Path a bundle for `role` is written to
pub fn bundle_path(root: &Path, role: &str) -> PathBuf {
    root.join(format!("{role}{KUBECONFIG_SUFFIX}"))
}

/// Persist `bundle` as `{role}.kubeconfig` under `root`, owner-readable only
pub fn write_bundle(root: &Path, bundle: &CredentialBundle) -> Result<PathBuf> {
    validate_role_name(&bundle.role)?;
    let yaml = bundle.to_yaml()?;
    let path = write_atomic(&bundle_path(root, &bundle.role), yaml.as_bytes(), FileMode::Private)?;
    info!(role = %bundle.role, path = %path.display(), "wrote kubeconfig");
    Ok(path)
}

/// Read a previously written bundle, if present
pub fn load_bundle(root: &Path, role: &str) -> Result<Option<Kubeconfig>> {
    validate_role_name(role)?;
    match read_optional(&bundle_path(root, role))? {
        Some(yaml) => Ok(Some(serde_yaml::from_str(&yaml)?)),
        None => Ok(None),
    }
}

/// Kubeconfig files under `root`, by role
pub fn scan_kubeconfigs(root: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let entries = std::fs::read_dir(root).map_err(|e| Error::io(root, e))?;
    let mut found = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if is_staging_file(file_name) {
            continue;
        }
        if let Some(role) = file_name.strip_suffix(KUBECONFIG_SUFFIX) {
            if validate_role_name(role).is_ok() {
                found.insert(role.to_string(), entry.path());
            }
        }
    }
    Ok(found)
}
