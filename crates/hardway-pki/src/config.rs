//! Engine configuration
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kubeconfig::{KubeconfigAssembler, DEFAULT_CLUSTER_NAME};
use crate::profile::{SigningConfig, CA_CONFIG_FILE, DEFAULT_PROFILE};
use crate::request::{CertificateRequestBuilder, KeySpec, SubjectDefaults};
use crate::signer::{CfsslSigner, DEFAULT_SIGNER_TIMEOUT};
use crate::store::CertificateStore;

/// Default store directory
pub const DEFAULT_WORKDIR: &str = "/etc/kubernetes/ssl";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Store directory
    pub workdir: PathBuf,
    /// Signing engine invocation
    pub signer: SignerConfig,
    /// Country and locality of every subject
    pub subject: SubjectDefaults,
    /// Key algorithm and size
    pub key: KeySpec,
    /// Profile table written to `ca-config.json`
    pub signing: SigningConfig,
    /// Name of the cluster entry in kubeconfigs
    pub cluster_name: String,
}

/// Signing engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Program and leading arguments
    pub command: Vec<String>,
    /// Deadline per invocation, in seconds
    pub timeout_secs: u64,
    /// Profile used for leaf certificates
    pub profile: String,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from(DEFAULT_WORKDIR),
            signer: SignerConfig::default(),
            subject: SubjectDefaults::default(),
            key: KeySpec::default(),
            signing: SigningConfig::default(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            command: vec!["cfssl".to_string()],
            timeout_secs: DEFAULT_SIGNER_TIMEOUT.as_secs(),
            profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl PkiConfig {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_yaml(&contents)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.signer.command.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(Error::validation("signer.command must name a program"));
        }
        if self.signer.timeout_secs == 0 {
            return Err(Error::validation("signer.timeout_secs must be greater than zero"));
        }
        if self.workdir.as_os_str().is_empty() {
            return Err(Error::validation("workdir must not be empty"));
        }
        if self.cluster_name.trim().is_empty() {
            return Err(Error::validation("cluster_name must not be empty"));
        }
        self.key.validate()?;
        self.signing.validate(&self.signer.profile)
    }

    /// Deadline per signer invocation
    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer.timeout_secs)
    }

    /// Path of `ca-config.json`
    pub fn signing_config_path(&self) -> PathBuf {
        self.workdir.join(CA_CONFIG_FILE)
    }

    /// Subprocess signer for this configuration
    pub fn signer(&self) -> CfsslSigner {
        CfsslSigner::new(&self.workdir)
            .with_command(self.signer.command.clone())
            .with_profile(self.signer.profile.clone())
            .with_config_path(self.signing_config_path())
            .with_timeout(self.signer_timeout())
    }

    /// Request builder applying the configured subject and key
    pub fn request_builder(&self) -> CertificateRequestBuilder {
        CertificateRequestBuilder::new(self.subject.clone(), self.key)
    }

    /// Kubeconfig assembler naming the configured cluster
    pub fn assembler(&self) -> KubeconfigAssembler {
        KubeconfigAssembler::new(self.cluster_name.clone())
    }

    /// Store in `workdir` backed by the subprocess signer
    pub fn open_store(&self) -> Result<CertificateStore> {
        CertificateStore::open(&self.workdir, Box::new(self.signer()))
    }
}
