//! Signing profiles (`ca-config.json`)
//!
//! The signing engine reads validity and key usages from a profile table on
//! disk. The table is written once per store root and then treated as
//! static: later runs never rewrite it, so operator edits survive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fs::{write_atomic, FileMode};

/// File name of the profile table inside the store root
pub const CA_CONFIG_FILE: &str = "ca-config.json";

/// Profile used for every cluster role
pub const DEFAULT_PROFILE: &str = "kubernetes";

/// Validity applied by default (one year)
pub const DEFAULT_EXPIRY: &str = "8760h";

/// Root of `ca-config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Signing policy table
    pub signing: SigningPolicy,
}

/// Default policy plus named profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPolicy {
    /// Policy used when no profile is named
    pub default: ExpiryPolicy,
    /// Named profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, SigningProfile>,
}

/// Validity-only policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    /// Validity, e.g. `8760h`
    pub expiry: String,
}

/// Named profile: key usages and validity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningProfile {
    /// Key usages granted to certificates signed under this profile
    pub usages: Vec<String>,
    /// Validity, e.g. `8760h`
    pub expiry: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        let profile = SigningProfile {
            usages: ["signing", "key encipherment", "server auth", "client auth"]
                .into_iter()
                .map(String::from)
                .collect(),
            expiry: DEFAULT_EXPIRY.to_string(),
        };
        Self {
            signing: SigningPolicy {
                default: ExpiryPolicy {
                    expiry: DEFAULT_EXPIRY.to_string(),
                },
                profiles: BTreeMap::from([(DEFAULT_PROFILE.to_string(), profile)]),
            },
        }
    }
}

impl SigningConfig {
    /// Look up a named profile
    pub fn profile(&self, name: &str) -> Option<&SigningProfile> {
        self.signing.profiles.get(name)
    }

    /// Check `profile` exists and every expiry parses
    pub fn validate(&self, profile: &str) -> Result<()> {
        parse_expiry_hours(&self.signing.default.expiry)?;
        for (name, p) in &self.signing.profiles {
            parse_expiry_hours(&p.expiry)
                .map_err(|e| Error::validation(format!("profile '{name}': {e}")))?;
            if p.usages.is_empty() {
                return Err(Error::validation(format!(
                    "profile '{name}' has no usages"
                )));
            }
        }
        if self.profile(profile).is_none() {
            return Err(Error::validation(format!(
                "signing profile '{profile}' is not defined"
            )));
        }
        Ok(())
    }

    /// Write `ca-config.json` under `root` unless it already exists
    ///
    /// Returns the path of the file either way.
    pub fn ensure_written(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(CA_CONFIG_FILE);
        if path.exists() {
            debug!(path = %path.display(), "signing config already present");
            return Ok(path);
        }
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&path, json.as_bytes(), FileMode::Public)?;
        info!(path = %path.display(), "wrote signing config");
        Ok(path)
    }
}

/// Parse an expiry of the form `<n>h`
pub fn parse_expiry_hours(expiry: &str) -> Result<u64> {
    let hours = expiry
        .strip_suffix('h')
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0);
    hours.ok_or_else(|| {
        Error::validation(format!(
            "invalid expiry '{expiry}': expected a positive number of hours like '8760h'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_grants_server_and_client_auth() {
        let config = SigningConfig::default();
        let profile = config.profile(DEFAULT_PROFILE).unwrap();

        assert_eq!(profile.expiry, "8760h");
        assert!(profile.usages.iter().any(|u| u == "server auth"));
        assert!(profile.usages.iter().any(|u| u == "client auth"));
        assert!(config.validate(DEFAULT_PROFILE).is_ok());
    }

    #[test]
    fn serializes_to_engine_layout() {
        let json = serde_json::to_value(SigningConfig::default()).unwrap();

        assert_eq!(json["signing"]["default"]["expiry"], "8760h");
        assert_eq!(
            json["signing"]["profiles"]["kubernetes"]["usages"][1],
            "key encipherment"
        );
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let err = SigningConfig::default().validate("server").unwrap_err();
        assert!(err.to_string().contains("server"));
    }

    #[test]
    fn expiry_must_be_positive_hours() {
        assert_eq!(parse_expiry_hours("8760h").unwrap(), 8760);
        assert!(parse_expiry_hours("0h").is_err());
        assert!(parse_expiry_hours("1y").is_err());
        assert!(parse_expiry_hours("h").is_err());
        assert!(parse_expiry_hours("8760").is_err());
    }

    #[test]
    fn bad_profile_expiry_fails_validation() {
        let mut config = SigningConfig::default();
        if let Some(p) = config.signing.profiles.get_mut(DEFAULT_PROFILE) {
            p.expiry = "forever".to_string();
        }
        assert!(config.validate(DEFAULT_PROFILE).is_err());
    }

    #[test]
    fn written_once_and_never_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let config = SigningConfig::default();

        let path = config.ensure_written(dir.path()).unwrap();
        let parsed: SigningConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, config);

        std::fs::write(&path, "{\"edited\": true}").unwrap();
        config.ensure_written(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"edited\": true}"
        );
    }
}
