//! Account lifecycle: local config persistence, registration, updates and
//! opt-in self-healing.
//!
//! One JSON config file exists per (CA, account identifier). Server-returned
//! fields pass through load/store untouched; the client only enforces that
//! `agreement` tracks the CA's current terms URL and `contact` tracks the
//! configured contact set.

use crate::crypto::JwsSigner;
use crate::directory::Directory;
use crate::encoding::base64url;
use crate::error::{AcmeError, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Deterministic per-CA tag: distinct CAs get distinct key names, friendly
/// names and config directories.
pub fn ca_tag(ca_url: &str) -> String {
    base64url::encode(ca_url.as_bytes())
}

/// Path of the account config file for one (CA, identifier) pair.
pub fn account_config_path(account_dir: &Path, ca_url: &str, identifier: &str) -> PathBuf {
    account_dir
        .join(ca_tag(ca_url))
        .join(format!("{}.json", identifier))
}

/// Name of the persistent account key for one (CA, identifier) pair.
pub fn account_key_name(ca_url: &str, identifier: &str) -> String {
    format!("{}-{}", ca_tag(ca_url), identifier)
}

/// Local account state, mirroring the CA's registration object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Server-assigned account id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Contact URIs
    #[serde(default)]
    pub contact: Vec<String>,

    /// Terms-of-service URL this account agreed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<String>,

    /// Everything else the server returned, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountConfig {
    /// The account id as a path segment, however the server typed it.
    pub fn id_segment(&self) -> Option<String> {
        match &self.id {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Behavioral switches for account handling
#[derive(Debug, Clone, Default)]
pub struct AccountOptions {
    /// Desired contact set (URIs)
    pub contact: Vec<String>,
    /// Agree to the CA's terms of service
    pub accept_terms: bool,
    /// Attempt self-healing on recoverable registration errors
    pub auto_fix: bool,
    /// Discard local state and register afresh
    pub reset: bool,
}

/// Drives registration state against one CA
pub struct AccountManager<'a> {
    transport: &'a Transport,
    directory: &'a Directory,
    signer: &'a JwsSigner<'a>,
    config_path: PathBuf,
    options: AccountOptions,
}

impl<'a> AccountManager<'a> {
    pub fn new(
        transport: &'a Transport,
        directory: &'a Directory,
        signer: &'a JwsSigner<'a>,
        config_path: PathBuf,
        options: AccountOptions,
    ) -> Self {
        Self {
            transport,
            directory,
            signer,
            config_path,
            options,
        }
    }

    /// Bring the registration in line with the configured contact set and
    /// the CA's current terms, creating or updating as needed.
    pub async fn ensure(&self) -> Result<AccountConfig> {
        let loaded = if self.options.reset {
            info!("account reset requested, ignoring local state");
            None
        } else {
            self.load().await?
        };

        // the contact comparison only applies to state we loaded; a fresh
        // registration already carries the requested (or healed) contact set
        let mut config = match loaded {
            None => self.create_account().await?,
            Some(mut config) => {
                if !bag_equal(&config.contact, &self.options.contact) {
                    info!("contact set changed, updating registration");
                    config.contact = self.options.contact.clone();
                    config = self.update_account(config).await?;
                }
                config
            }
        };

        if let Some(terms) = &self.directory.terms_of_service
            && config.agreement.as_deref() != Some(terms.as_str())
        {
            if !self.options.accept_terms {
                return Err(AcmeError::TermsNotAccepted(terms.clone()));
            }
            info!(terms = %terms, "accepting updated terms of service");
            config.agreement = Some(terms.clone());
            config = self.update_account(config).await?;
        }

        Ok(config)
    }

    /// Load the local config, if any.
    pub async fn load(&self) -> Result<Option<AccountConfig>> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok(None);
        }
        let raw = fs::read(&self.config_path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn persist(&self, config: &AccountConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.config_path, serde_json::to_vec_pretty(config)?).await?;
        Ok(())
    }

    async fn create_account(&self) -> Result<AccountConfig> {
        match self.create(&self.options.contact).await {
            Err(AcmeError::InvalidEmail(detail)) if self.options.auto_fix => {
                warn!(detail = %detail, "CA rejected contact, retrying registration without it");
                self.create(&[]).await
            }
            other => other,
        }
    }

    async fn create(&self, contact: &[String]) -> Result<AccountConfig> {
        let terms = self.directory.terms_of_service.clone();
        if let Some(terms) = &terms
            && !self.options.accept_terms
        {
            return Err(AcmeError::TermsNotAccepted(terms.clone()));
        }

        let mut payload = json!({});
        if !contact.is_empty() {
            payload["contact"] = json!(contact);
        }
        if let Some(terms) = &terms {
            payload["agreement"] = json!(terms);
        }

        info!("registering new account");
        let response = self
            .transport
            .signed(self.signer, &self.directory.new_account, "new-reg", payload)
            .await?;

        let mut config: AccountConfig = response.json()?;
        // the directory's terms are authoritative, whatever the server echoed
        config.agreement = terms;
        if config.contact.is_empty() {
            config.contact = contact.to_vec();
        }

        self.persist(&config).await?;
        Ok(config)
    }

    async fn update_account(&self, config: AccountConfig) -> Result<AccountConfig> {
        match self.update(&config).await {
            Err(err)
                if self.options.auto_fix
                    && matches!(
                        err,
                        AcmeError::Malformed(_) | AcmeError::Unauthorized(_)
                    ) =>
            {
                // this abandons whatever the server had bound to the old key
                warn!(
                    error = %err,
                    abandoned_id = config.id_segment().as_deref().unwrap_or("unknown"),
                    "registration update rejected, re-creating account"
                );
                self.create_account().await
            }
            other => other,
        }
    }

    async fn update(&self, config: &AccountConfig) -> Result<AccountConfig> {
        let id = config.id_segment().ok_or_else(|| {
            AcmeError::Malformed("local account config has no server id".to_string())
        })?;
        let url = format!("{}{}", self.directory.account, id);

        let mut payload = json!({ "contact": config.contact });
        if let Some(agreement) = &config.agreement {
            payload["agreement"] = json!(agreement);
        }

        let response = self.transport.signed(self.signer, &url, "reg", payload).await?;

        let mut updated: AccountConfig = response.json()?;
        if updated.id.is_none() {
            updated.id = config.id.clone();
        }
        if updated.agreement.is_none() {
            updated.agreement = config.agreement.clone();
        }
        if updated.contact.is_empty() {
            updated.contact = config.contact.clone();
        }

        self.persist(&updated).await?;
        Ok(updated)
    }
}

/// Order-insensitive bag equality over contact URIs.
fn bag_equal(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bag_equality_ignores_order() {
        let a = vec!["mailto:a@x".to_string(), "mailto:b@x".to_string()];
        let b = vec!["mailto:b@x".to_string(), "mailto:a@x".to_string()];
        assert!(bag_equal(&a, &b));
        assert!(!bag_equal(&a, &a[..1].to_vec()));
        // bags, not sets: multiplicity counts
        let doubled = vec!["mailto:a@x".to_string(), "mailto:a@x".to_string()];
        assert!(!bag_equal(&a, &doubled));
    }

    #[test]
    fn test_config_preserves_unknown_fields() {
        let raw = r#"{
            "id": 42,
            "contact": ["mailto:admin@example.com"],
            "agreement": "https://ca/terms",
            "createdAt": "2016-01-01T00:00:00Z",
            "initialIp": "10.0.0.1"
        }"#;

        let config: AccountConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.id_segment().as_deref(), Some("42"));
        assert_eq!(config.extra["initialIp"], "10.0.0.1");

        let out = serde_json::to_value(&config).unwrap();
        assert_eq!(out["createdAt"], "2016-01-01T00:00:00Z");
    }

    #[test]
    fn test_id_segment_accepts_strings_and_numbers() {
        let numeric: AccountConfig = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(numeric.id_segment().as_deref(), Some("7"));

        let stringy: AccountConfig = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(stringy.id_segment().as_deref(), Some("abc"));

        let missing = AccountConfig::default();
        assert!(missing.id_segment().is_none());
    }

    #[test]
    fn test_paths_isolate_cas() {
        let a = account_config_path(Path::new("/accounts"), "https://ca-one/dir", "default");
        let b = account_config_path(Path::new("/accounts"), "https://ca-two/dir", "default");
        assert_ne!(a, b);
        assert!(a.ends_with(format!("{}/default.json", ca_tag("https://ca-one/dir"))));
    }

    #[test]
    fn test_account_key_name_embeds_ca_tag() {
        let name = account_key_name("https://ca/dir", "ops");
        assert!(name.starts_with(&ca_tag("https://ca/dir")));
        assert!(name.ends_with("-ops"));
    }
}
