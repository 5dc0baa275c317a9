//! Certificate lifecycle engine for bootstrapping a cluster control plane
//!
//! The crate creates a root certificate authority, issues leaf certificates
//! for every cluster role, and assembles kubeconfig credential bundles that
//! embed them. Signing is delegated to an external engine (`cfssl`) run as a
//! subprocess; this crate builds requests, validates what comes back and
//! stores it idempotently on disk.
//!
//! # Layout on disk
//!
//! ```text
//! {workdir}/ca-config.json       signing profiles, written once
//! {workdir}/{role}.pem           certificate
//! {workdir}/{role}-key.pem       private key (0600)
//! {workdir}/{role}.kubeconfig    credential bundle (0600)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hardway_pki::{issue_cluster, ClusterTopology, FailurePolicy, PkiConfig};
//!
//! # fn main() -> hardway_pki::Result<()> {
//! let config = PkiConfig::default();
//! config.signing.ensure_written(&config.workdir)?;
//! let mut store = config.open_store()?;
//! let topology = ClusterTopology::new(
//!     vec!["10.240.0.10".to_string()],
//!     vec!["worker-0".to_string()],
//! );
//! let report = issue_cluster(
//!     &mut store,
//!     &config.request_builder(),
//!     &topology,
//!     FailurePolicy::Abort,
//! )?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod authority;
pub mod certificate;
pub mod config;
pub mod error;
mod fs;
pub mod kubeconfig;
pub mod profile;
pub mod request;
pub mod roles;
pub mod signer;
pub mod store;

pub use authority::{AuthorityState, CertificateAuthority};
pub use certificate::{Certificate, CertificateInfo};
pub use config::{PkiConfig, SignerConfig};
pub use error::{Error, Result};
pub use kubeconfig::{CredentialBundle, Kubeconfig, KubeconfigAssembler};
pub use profile::SigningConfig;
pub use request::{CertificateRequestBuilder, KeySpec, RoleRequest, SigningRequest};
pub use roles::{
    issue_cluster, write_cluster_kubeconfigs, ClusterTopology, FailurePolicy, RoleOutcome,
    RoleReport,
};
pub use signer::{CfsslSigner, SignedPair, Signer};
pub use store::{CertificateStore, Issued, Issuer, Provenance, ScanReport, CA_NAME};
