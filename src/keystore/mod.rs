//! Named persistent key containers and the certificate store.
//!
//! This is the platform-keystore contract the rest of the crate programs
//! against: keys are opened (or created) by name and persist across runs;
//! certificates are enumerated by friendly name and installed together with
//! the name of the key they are bound to. The file-backed implementation
//! lives in [`file`]; per-user and per-machine contexts are two base
//! directories.

pub mod file;

use crate::crypto::{KeyAlgorithm, KeyMaterial};
use crate::error::Result;
use async_trait::async_trait;

pub use file::FileStore;

/// Which store a run operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreContext {
    /// Per-user store
    User,
    /// Per-machine store
    Machine,
}

impl std::str::FromStr for StoreContext {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(StoreContext::User),
            "machine" => Ok(StoreContext::Machine),
            _ => Err(format!("unknown store context: {}", s)),
        }
    }
}

/// An installed certificate with its store metadata
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    /// Hex SHA-256 of the DER, also the record id
    pub thumbprint: String,
    /// Friendly name tying renewals to prior runs
    pub friendly_name: String,
    /// Name of the bound private key in the key store
    pub key_name: String,
    /// Raw certificate DER
    pub der: Vec<u8>,
}

/// Named persistent private keys
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Open a key by name, if it exists.
    async fn open(&self, name: &str) -> Result<Option<KeyMaterial>>;

    /// Open the named key, creating it with the given algorithm when absent.
    /// An existing key wins even if its algorithm differs; callers detect
    /// mismatches through the lifecycle checks.
    async fn open_or_create(&self, name: &str, algorithm: KeyAlgorithm) -> Result<KeyMaterial>;

    /// Delete the named key. Deleting a missing key is not an error.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Installed certificates, enumerable by friendly name
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// All records carrying the given friendly name.
    async fn find_by_friendly_name(&self, friendly_name: &str) -> Result<Vec<StoredCertificate>>;

    /// Install a certificate under the friendly name, bound to the named
    /// key. Prior records with the same friendly name are replaced, keeping
    /// at most one current record per name.
    async fn install(
        &self,
        friendly_name: &str,
        der: &[u8],
        key_name: &str,
    ) -> Result<StoredCertificate>;

    /// The private key bound to a stored certificate, if it still exists.
    async fn bound_key(&self, certificate: &StoredCertificate) -> Result<Option<KeyMaterial>>;
}
