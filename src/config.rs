//! Configuration: a TOML file with serde defaults, validated once at startup.

use crate::crypto::KeyAlgorithm;
use crate::directory::AcmeDialect;
use crate::error::{AcmeError, Result};
use crate::keystore::StoreContext;
use crate::types::ChallengeType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ca: CaSettings,

    #[serde(default)]
    pub account: AccountSettings,

    #[serde(default)]
    pub certificates: CertificateSettings,

    #[serde(default)]
    pub challenge: ChallengeSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub lock: LockSettings,

    #[serde(default)]
    pub export: ExportSettings,
}

/// Certificate authority endpoint and dialect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaSettings {
    /// ACME directory URL
    #[serde(default)]
    pub url: String,

    /// Directory key space: "acme1-boulder", "acme2-boulder" or "acme1"
    #[serde(default = "default_dialect")]
    pub dialect: String,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            dialect: default_dialect(),
        }
    }
}

/// Account identity and registration behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Local name distinguishing accounts against the same CA
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Contact URIs, e.g. "mailto:admin@example.com"
    #[serde(default)]
    pub contact: Vec<String>,

    /// Agree to the CA's terms of service
    #[serde(default)]
    pub accept_terms: bool,

    /// Self-heal recoverable registration errors (may abandon the
    /// server-side account binding)
    #[serde(default)]
    pub auto_fix: bool,

    /// Discard local account state and register afresh
    #[serde(default)]
    pub reset: bool,

    /// Root directory for account config files
    #[serde(default = "default_account_dir")]
    pub directory: String,

    /// Account key modulus size
    #[serde(default = "default_account_key_bits")]
    pub key_bits: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
            contact: Vec::new(),
            accept_terms: false,
            auto_fix: false,
            reset: false,
            directory: default_account_dir(),
            key_bits: default_account_key_bits(),
        }
    }
}

/// What to request and when to renew
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSettings {
    /// Certificate key algorithm: "rsa-<bits>", "ecdsa-p256", "ecdsa-p384"
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Renew when fewer than this many days of lifetime remain
    #[serde(default = "default_renew_days")]
    pub renew_days: u32,

    /// Request the OCSP-must-staple extension
    #[serde(default)]
    pub must_staple: bool,

    /// Generate a fresh key on renewal instead of inheriting the prior one
    #[serde(default)]
    pub rotate_key: bool,

    /// Always reissue, even when the installed certificate would serve
    #[serde(default)]
    pub force_reissue: bool,

    /// The certificates to maintain, processed in order
    #[serde(default, rename = "spec")]
    pub specs: Vec<CertSpec>,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            renew_days: default_renew_days(),
            must_staple: false,
            rotate_key: false,
            force_reissue: false,
            specs: Vec::new(),
        }
    }
}

/// One certificate: a primary name plus SANs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertSpec {
    /// The CN and first SAN
    pub primary: String,

    /// Additional DNS names
    #[serde(default)]
    pub sans: Vec<String>,
}

/// Challenge selection and deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSettings {
    /// "http-01" or "dns-01"
    #[serde(default = "default_challenge_type")]
    pub challenge_type: String,

    /// Where the default http-01 handler drops token files
    #[serde(default = "default_well_known_dir")]
    pub well_known_dir: String,

    /// Upper bound on 1 s challenge polls before giving up
    #[serde(default = "default_poll_cap")]
    pub poll_cap: u32,

    /// Upper bound on dns-01 propagation checks
    #[serde(default = "default_dns_rounds")]
    pub dns_propagation_rounds: u32,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            challenge_type: default_challenge_type(),
            well_known_dir: default_well_known_dir(),
            poll_cap: default_poll_cap(),
            dns_propagation_rounds: default_dns_rounds(),
        }
    }
}

/// Keystore location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// "user" or "machine"
    #[serde(default = "default_context")]
    pub context: String,

    /// Per-user store directory
    #[serde(default = "default_user_store")]
    pub user_dir: String,

    /// Per-machine store directory
    #[serde(default = "default_machine_store")]
    pub machine_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            context: default_context(),
            user_dir: default_user_store(),
            machine_dir: default_machine_store(),
        }
    }
}

/// Single-instance lockfile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    /// Lockfile path
    #[serde(default = "default_lock_path")]
    pub path: String,

    /// Opt out of locking entirely with `enabled = false`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
            enabled: true,
        }
    }
}

/// On-disk PEM exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Export root; one subdirectory per primary domain
    #[serde(default = "default_export_dir")]
    pub directory: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
            enabled: true,
        }
    }
}

fn default_dialect() -> String {
    "acme1-boulder".to_string()
}
fn default_identifier() -> String {
    "default".to_string()
}
fn default_account_dir() -> String {
    "~/.certmill/accounts".to_string()
}
fn default_account_key_bits() -> u32 {
    4096
}
fn default_algorithm() -> String {
    "rsa-4096".to_string()
}
fn default_renew_days() -> u32 {
    30
}
fn default_challenge_type() -> String {
    "http-01".to_string()
}
fn default_well_known_dir() -> String {
    ".well-known/acme-challenge".to_string()
}
fn default_poll_cap() -> u32 {
    300
}
fn default_dns_rounds() -> u32 {
    24
}
fn default_context() -> String {
    "user".to_string()
}
fn default_user_store() -> String {
    "~/.certmill/store".to_string()
}
fn default_machine_store() -> String {
    "/var/lib/certmill/store".to_string()
}
fn default_lock_path() -> String {
    "~/.certmill/certmill.lock".to_string()
}
fn default_export_dir() -> String {
    "~/.certmill/out".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load a TOML config file. Validation is separate so callers can apply
    /// overrides first.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            AcmeError::configuration(format!(
                "cannot read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&text).map_err(|e| AcmeError::configuration(format!("invalid config: {}", e)))
    }

    /// Check everything that can be checked before network traffic.
    pub fn validate(&self) -> Result<()> {
        if self.ca.url.is_empty() {
            return Err(AcmeError::configuration("ca.url is required".to_string()));
        }
        self.dialect()?;
        self.algorithm()?;
        self.challenge_type()?;
        self.store_context()?;

        if self.certificates.specs.is_empty() {
            return Err(AcmeError::configuration(
                "at least one [[certificates.spec]] is required".to_string(),
            ));
        }
        for spec in &self.certificates.specs {
            if spec.primary.is_empty() {
                return Err(AcmeError::configuration(
                    "certificate spec without a primary domain".to_string(),
                ));
            }
        }

        KeyAlgorithm::Rsa(self.account.key_bits).validate()?;
        Ok(())
    }

    pub fn dialect(&self) -> Result<AcmeDialect> {
        self.ca.dialect.parse().map_err(AcmeError::Configuration)
    }

    pub fn algorithm(&self) -> Result<KeyAlgorithm> {
        self.certificates
            .algorithm
            .parse()
            .map_err(AcmeError::Configuration)
    }

    pub fn challenge_type(&self) -> Result<ChallengeType> {
        self.challenge
            .challenge_type
            .parse()
            .map_err(AcmeError::Configuration)
    }

    pub fn store_context(&self) -> Result<StoreContext> {
        self.store.context.parse().map_err(AcmeError::Configuration)
    }

    /// Store directory for the configured context.
    pub fn store_dir(&self) -> Result<PathBuf> {
        let dir = match self.store_context()? {
            StoreContext::User => &self.store.user_dir,
            StoreContext::Machine => &self.store.machine_dir,
        };
        Ok(expand_tilde(dir))
    }

    pub fn account_dir(&self) -> PathBuf {
        expand_tilde(&self.account.directory)
    }

    pub fn lock_path(&self) -> PathBuf {
        expand_tilde(&self.lock.path)
    }

    pub fn export_dir(&self) -> PathBuf {
        expand_tilde(&self.export.directory)
    }
}

/// Expand a leading `~/` against `$HOME`; other paths pass through.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}
