//! Error types for certificate issuance
//!
//! Every failure surfaces to the caller of the operation; nothing in this
//! crate retries. Signer failures carry the role being issued so a bulk run
//! can report which role failed and why.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Result type for PKI operations
pub type Result<T> = std::result::Result<T, Error>;

/// PKI errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: bad SAN entry, bad role name, issuer mismatch, bad config
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
    },

    /// Certificate (or CA) is not materialized in the store
    #[error("certificate not found: {name}")]
    NotFound {
        /// Role name that was looked up
        name: String,
    },

    /// The signing engine exited with a non-zero status
    #[error("signer failed for {role} ({status}): {stderr}")]
    SignerFailed {
        /// Role being issued
        role: String,
        /// Exit status as reported by the OS
        status: String,
        /// Diagnostic output captured from the engine
        stderr: String,
    },

    /// The signing engine did not finish within the configured timeout
    #[error("signer timed out for {role} after {timeout:?}")]
    SignerTimeout {
        /// Role being issued
        role: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// The signing engine exited cleanly but its output was unusable
    #[error("signer returned unusable output for {role}: {message}")]
    SignerOutput {
        /// Role being issued
        role: String,
        /// What was wrong with the output
        message: String,
    },

    /// The signing engine could not be started or talked to
    #[error("failed to run signer for {role}: {source}")]
    SignerSpawn {
        /// Role being issued
        role: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// JSON/YAML encoding or decoding failure
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// PEM or X.509 parsing failure
    #[error("certificate error: {message}")]
    Certificate {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for a role name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an I/O error bound to the path that failed
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a certificate parsing error with the given message
    pub fn certificate(msg: impl Into<String>) -> Self {
        Self::Certificate {
            message: msg.into(),
        }
    }

    /// Create a signer output error for a role
    pub fn signer_output(role: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SignerOutput {
            role: role.into(),
            message: msg.into(),
        }
    }

    /// True for any failure raised by the signing engine
    pub fn is_signer_error(&self) -> bool {
        matches!(
            self,
            Self::SignerFailed { .. }
                | Self::SignerTimeout { .. }
                | Self::SignerOutput { .. }
                | Self::SignerSpawn { .. }
        )
    }

    /// True when the certificate is absent and can be recovered by issuance
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for input validation failures
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_errors_are_grouped() {
        let failed = Error::SignerFailed {
            role: "worker-1".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "bad csr".to_string(),
        };
        let timeout = Error::SignerTimeout {
            role: "worker-1".to_string(),
            timeout: Duration::from_secs(1),
        };
        let output = Error::signer_output("worker-1", "missing key");

        assert!(failed.is_signer_error());
        assert!(timeout.is_signer_error());
        assert!(output.is_signer_error());
        assert!(!Error::not_found("ca").is_signer_error());
        assert!(!Error::validation("bad").is_signer_error());
    }

    #[test]
    fn signer_failure_names_role_and_diagnostics() {
        let err = Error::SignerFailed {
            role: "worker-1".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "failed to parse CSR".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("worker-1"));
        assert!(msg.contains("failed to parse CSR"));
    }

    #[test]
    fn io_error_carries_path() {
        let err = Error::io(
            "/etc/kubernetes/ssl/ca.pem",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/etc/kubernetes/ssl/ca.pem"));
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn not_found_is_recoverable() {
        let err = Error::not_found("admin");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "certificate not found: admin");
    }
}
