//! Evidence loading: certificates, credentials, and private keys
//!
//! The core consumes evidence through the [`EvidenceStore`] trait; the
//! on-disk layout is an implementation detail of [`DirStore`], which keeps
//! the conventional three directories under one root:
//!
//! ```text
//! certs/<name>.cert          JSON certificate, name = agent id sans `#`
//! credentials/<name>.cred    JSON credential
//! private_keys/<name>.pem    PKCS#8 PEM private key
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;

use crate::crypto::{signing_key_from_pem, signing_key_to_pem, Certificate, Credential, CryptoError};
use crate::logic::Agent;
use crate::wire::{
    certificate_from_json, certificate_to_json, credential_from_json, credential_to_json,
    WireError,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no certificate found for {0}")]
    MissingCertificate(String),
    #[error("no private key found for {0}")]
    MissingKey(String),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("decoding {path}: {source}")]
    Wire {
        path: PathBuf,
        #[source]
        source: WireError,
    },
    #[error("key in {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },
}

/// Abstract source of certificates, credentials, and signing keys.
pub trait EvidenceStore {
    fn certificate(&self, agent: &Agent) -> Result<Certificate, StoreError>;
    fn signing_key(&self, agent: &Agent) -> Result<SigningKey, StoreError>;
    /// All known policy/credential files, in stable (sorted) order.
    fn credentials(&self) -> Result<Vec<Credential>, StoreError>;
}

/// Directory-backed store.
pub struct DirStore {
    root: PathBuf,
}

/// Agent id without its `#` prefix, used as the file stem.
fn stem(agent: &Agent) -> &str {
    agent.0.strip_prefix('#').unwrap_or(&agent.0)
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> DirStore {
        DirStore { root: root.into() }
    }

    fn cert_path(&self, agent: &Agent) -> PathBuf {
        self.root.join("certs").join(format!("{}.cert", stem(agent)))
    }

    fn key_path(&self, agent: &Agent) -> PathBuf {
        self.root
            .join("private_keys")
            .join(format!("{}.pem", stem(agent)))
    }

    fn creds_dir(&self) -> PathBuf {
        self.root.join("credentials")
    }

    fn read(path: &Path) -> Result<String, StoreError> {
        fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(path: &Path, contents: &str) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_certificate(&self, cert: &Certificate) -> Result<(), StoreError> {
        let path = self.cert_path(&cert.subject);
        let json = certificate_to_json(cert).map_err(|source| StoreError::Wire {
            path: path.clone(),
            source,
        })?;
        Self::write(&path, &json)
    }

    pub fn save_signing_key(&self, agent: &Agent, key: &SigningKey) -> Result<(), StoreError> {
        let path = self.key_path(agent);
        let pem = signing_key_to_pem(key).map_err(|source| StoreError::Key {
            path: path.clone(),
            source,
        })?;
        Self::write(&path, &pem)
    }

    pub fn save_credential(&self, name: &str, cred: &Credential) -> Result<(), StoreError> {
        let path = self.creds_dir().join(format!("{name}.cred"));
        Self::write(&path, &credential_to_json(cred))
    }
}

impl EvidenceStore for DirStore {
    fn certificate(&self, agent: &Agent) -> Result<Certificate, StoreError> {
        let path = self.cert_path(agent);
        if !path.exists() {
            return Err(StoreError::MissingCertificate(agent.0.clone()));
        }
        let json = Self::read(&path)?;
        certificate_from_json(&json).map_err(|source| StoreError::Wire { path, source })
    }

    fn signing_key(&self, agent: &Agent) -> Result<SigningKey, StoreError> {
        let path = self.key_path(agent);
        if !path.exists() {
            return Err(StoreError::MissingKey(agent.0.clone()));
        }
        let pem = Self::read(&path)?;
        signing_key_from_pem(&pem).map_err(|source| StoreError::Key { path, source })
    }

    fn credentials(&self) -> Result<Vec<Credential>, StoreError> {
        let dir = self.creds_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|source| StoreError::Io { path: dir.clone(), source })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "cred"))
            .collect();
        paths.sort();
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let json = Self::read(&path)?;
            out.push(
                credential_from_json(&json)
                    .map_err(|source| StoreError::Wire { path, source })?,
            );
        }
        Ok(out)
    }
}
