//! On-disk certificate store
//!
//! The store directory is the source of truth. Each role owns two files,
//! `{name}.pem` and `{name}-key.pem`; a role is materialized only when both
//! exist and are non-empty. The in-memory map is a cache and can be rebuilt
//! from disk at any time with [`CertificateStore::scan_all`].
//!
//! Concurrent processes operating on one directory are not supported.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::authority::CertificateAuthority;
use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::fs::{is_staging_file, remove_durable, FileMode, StagedFile};
use crate::request::{validate_role_name, SigningRequest};
use crate::signer::{SignedPair, Signer};

/// Name of the certificate authority in every store
pub const CA_NAME: &str = "ca";

const PEM_SUFFIX: &str = ".pem";
const KEY_FILE_SUFFIX: &str = "-key.pem";

/// Who signs a certificate being issued
#[derive(Debug, Clone, Copy)]
pub enum Issuer<'a> {
    /// Self-signed; only valid for the certificate authority
    SelfSigned,
    /// Signed by the store's certificate authority
    Authority(&'a CertificateAuthority),
}

/// Where an [`Issued`] certificate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Already materialized on disk
    Loaded,
    /// Freshly produced by the signer
    Issued,
}

/// Result of [`CertificateStore::issue_or_load`]
#[derive(Debug, Clone)]
pub struct Issued {
    /// The materialized certificate
    pub certificate: Certificate,
    /// Whether the signer ran
    pub provenance: Provenance,
}

/// Why a file pair on disk is not usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Key present, certificate missing
    MissingPem,
    /// Certificate present, key missing
    MissingKey,
    /// Certificate file is empty
    EmptyPem,
    /// Key file is empty
    EmptyKey,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPem => write!(f, "missing certificate"),
            Self::MissingKey => write!(f, "missing key"),
            Self::EmptyPem => write!(f, "empty certificate"),
            Self::EmptyKey => write!(f, "empty key"),
        }
    }
}

/// A partial pair reported by [`CertificateStore::scan_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPair {
    /// Role name shared by the files
    pub name: String,
    /// What is wrong with the pair
    pub reason: InvalidReason,
}

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Materialized certificates, authority first then by name
    pub certificates: Vec<Certificate>,
    /// Partial pairs excluded from `certificates`
    pub invalid: Vec<InvalidPair>,
}

impl ScanReport {
    /// Names of the materialized certificates in report order
    pub fn names(&self) -> Vec<&str> {
        self.certificates.iter().map(|c| c.name()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairState {
    Absent,
    Partial(InvalidReason),
    Complete,
}

/// Registry of issued certificates backed by a directory
pub struct CertificateStore {
    root: PathBuf,
    signer: Box<dyn Signer>,
    cache: BTreeMap<String, Certificate>,
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("root", &self.root)
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CertificateStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>, signer: Box<dyn Signer>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        debug!(root = %root.display(), "opened certificate store");
        Ok(Self {
            root,
            signer,
            cache: BTreeMap::new(),
        })
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `{name}.pem`
    pub fn pem_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{PEM_SUFFIX}"))
    }

    /// Path of `{name}-key.pem`
    pub fn key_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{KEY_FILE_SUFFIX}"))
    }

    /// Certificates currently held in the cache, by name
    pub fn cached(&self) -> impl Iterator<Item = &Certificate> {
        self.cache.values()
    }

    /// Look up a materialized certificate
    ///
    /// The disk is consulted on every call, so a pair removed behind the
    /// store's back is reported as missing even if it was cached.
    pub fn get(&mut self, name: &str) -> Result<Certificate> {
        validate_role_name(name)?;

        match self.pair_state(name)? {
            PairState::Complete => {}
            PairState::Absent | PairState::Partial(_) => {
                self.cache.remove(name);
                return Err(Error::not_found(name));
            }
        }

        if let Some(cert) = self.cache.get(name) {
            return Ok(cert.clone());
        }

        let cert = self.describe(name);
        debug!(role = name, "loaded certificate from disk");
        self.cache.insert(name.to_string(), cert.clone());
        Ok(cert)
    }

    /// Persist a key pair under `name`
    ///
    /// Both files are staged before either is renamed into place. A stale
    /// certificate is removed before the key is committed and the new
    /// certificate goes in last, so an interruption leaves at most a key
    /// without its certificate, which reads as a partial pair.
    pub fn put(
        &mut self,
        name: &str,
        issuer: Option<&str>,
        pair: SignedPair,
    ) -> Result<Certificate> {
        validate_role_name(name)?;

        let pem_path = self.pem_path(name);
        let key_path = self.key_path(name);

        let staged_key = StagedFile::stage(&key_path, pair.key.as_bytes(), FileMode::Private)?;
        let staged_pem = StagedFile::stage(&pem_path, pair.cert.as_bytes(), FileMode::Public)?;
        self.commit_key(&pem_path, staged_key)?;
        staged_pem.commit()?;

        let cert = Certificate::new(name, pem_path, key_path, issuer.map(String::from))
            .with_contents(pair.cert, pair.key);
        self.cache.insert(name.to_string(), cert.clone());
        Ok(cert)
    }

    /// Return the certificate for `name`, issuing it first if it is missing
    ///
    /// `request_factory` runs only when the signer is needed. A partial pair
    /// on disk is replaced.
    pub fn issue_or_load<F>(
        &mut self,
        name: &str,
        issuer: Issuer<'_>,
        request_factory: F,
    ) -> Result<Issued>
    where
        F: FnOnce() -> Result<SigningRequest>,
    {
        validate_role_name(name)?;
        match (name == CA_NAME, issuer) {
            (true, Issuer::Authority(_)) => {
                return Err(Error::validation(
                    "the certificate authority must be self-signed",
                ))
            }
            (false, Issuer::SelfSigned) => {
                return Err(Error::validation(format!(
                    "'{name}' must be signed by the certificate authority"
                )))
            }
            _ => {}
        }

        match self.pair_state(name)? {
            PairState::Complete => {
                let certificate = self.get(name)?;
                debug!(role = name, "certificate already present");
                return Ok(Issued {
                    certificate,
                    provenance: Provenance::Loaded,
                });
            }
            PairState::Partial(reason) => {
                self.cache.remove(name);
                warn!(role = name, %reason, "partial key pair on disk, regenerating");
            }
            PairState::Absent => {}
        }

        let request = request_factory()?;
        if request.name != name {
            return Err(Error::validation(format!(
                "request for '{}' cannot be stored as '{name}'",
                request.name
            )));
        }

        let (pair, issuer_name) = match issuer {
            Issuer::SelfSigned => (self.signer.sign_ca(&request)?, None),
            Issuer::Authority(ca) => (
                self.signer.sign(&request, ca)?,
                Some(ca.certificate().name()),
            ),
        };

        let certificate = self.put(name, issuer_name, pair)?;
        info!(role = name, path = %certificate.pem_path().display(), "issued certificate");
        Ok(Issued {
            certificate,
            provenance: Provenance::Issued,
        })
    }

    /// Rebuild the cache from the directory
    ///
    /// Partial pairs are logged and reported but never fatal.
    pub fn scan_all(&mut self) -> Result<ScanReport> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))?;

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.root, e))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if is_staging_file(file_name) {
                continue;
            }
            let stem = file_name
                .strip_suffix(KEY_FILE_SUFFIX)
                .or_else(|| file_name.strip_suffix(PEM_SUFFIX));
            match stem {
                Some(stem) if validate_role_name(stem).is_ok() => {
                    names.insert(stem.to_string());
                }
                Some(_) => debug!(file = file_name, "ignoring file with invalid role name"),
                None => {}
            }
        }

        let mut report = ScanReport::default();
        let mut cache = BTreeMap::new();
        for name in names {
            match self.pair_state(&name)? {
                PairState::Complete => {
                    let cert = match self.cache.remove(&name) {
                        Some(cached) => cached,
                        None => self.describe(&name),
                    };
                    cache.insert(name, cert);
                }
                PairState::Partial(reason) => {
                    warn!(role = %name, %reason, "skipping partial key pair");
                    report.invalid.push(InvalidPair { name, reason });
                }
                PairState::Absent => {}
            }
        }

        self.cache = cache;
        let mut certificates: Vec<Certificate> = self.cache.values().cloned().collect();
        // BTreeMap order is by name; the authority leads
        certificates.sort_by_key(|c| c.name() != CA_NAME);
        report.certificates = certificates;
        Ok(report)
    }

    pub(crate) fn pair_state(&self, name: &str) -> Result<PairState> {
        let pem = file_len(&self.pem_path(name))?;
        let key = file_len(&self.key_path(name))?;
        Ok(match (pem, key) {
            (None, None) => PairState::Absent,
            (None, Some(_)) => PairState::Partial(InvalidReason::MissingPem),
            (Some(_), None) => PairState::Partial(InvalidReason::MissingKey),
            (Some(0), _) => PairState::Partial(InvalidReason::EmptyPem),
            (_, Some(0)) => PairState::Partial(InvalidReason::EmptyKey),
            (Some(_), Some(_)) => PairState::Complete,
        })
    }

    /// Commit a staged key once no certificate can be paired with it
    fn commit_key(&self, pem_path: &Path, staged_key: StagedFile) -> Result<()> {
        remove_durable(pem_path)?;
        staged_key.commit()?;
        Ok(())
    }

    fn describe(&self, name: &str) -> Certificate {
        let issuer = (name != CA_NAME).then(|| CA_NAME.to_string());
        Certificate::new(name, self.pem_path(name), self.key_path(name), issuer)
    }
}

fn file_len(path: &Path) -> Result<Option<u64>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}
