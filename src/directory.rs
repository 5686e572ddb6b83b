//! ACME directory resolution across dialect variants.
//!
//! The legacy boulder dialect publishes `new-reg`/`new-authz`/`new-cert`;
//! modern servers publish `newAccount`/`newAuthz`/`newOrder`. Either way the
//! resolver produces one normalized [`Directory`], synthesizing the derived
//! `account`/`authz`/`order` URLs by rewriting the trailing path segment of
//! the corresponding "new-" endpoint. Only the legacy boulder dialect is
//! exercised in anger; the other two are best-effort.

use crate::error::{AcmeError, Result};
use crate::transport::Transport;
use serde_json::Value;
use tracing::debug;

/// Which directory key space the CA speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcmeDialect {
    /// Legacy boulder (`new-reg`, `new-authz`, `new-cert`)
    Acme1Boulder,
    /// Modern boulder (`newAccount`, `newAuthz`, `newOrder`)
    Acme2Boulder,
    /// Generic ACME v1; treated like the legacy boulder key space
    Acme1,
}

impl std::str::FromStr for AcmeDialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "acme1-boulder" => Ok(AcmeDialect::Acme1Boulder),
            "acme2-boulder" => Ok(AcmeDialect::Acme2Boulder),
            "acme1" => Ok(AcmeDialect::Acme1),
            _ => Err(format!("unknown ACME dialect: {}", s)),
        }
    }
}

impl std::fmt::Display for AcmeDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AcmeDialect::Acme1Boulder => "acme1-boulder",
            AcmeDialect::Acme2Boulder => "acme2-boulder",
            AcmeDialect::Acme1 => "acme1",
        };
        write!(f, "{}", name)
    }
}

/// Normalized ACME directory, populated once per run
#[derive(Debug, Clone)]
pub struct Directory {
    /// Registration endpoint
    pub new_account: String,
    /// Authorization endpoint
    pub new_authz: String,
    /// Certificate issuance endpoint
    pub new_order: String,
    /// Key rollover endpoint, when published
    pub key_change: Option<String>,
    /// Revocation endpoint, when published
    pub revoke_cert: Option<String>,
    /// Base URL for existing registrations
    pub account: String,
    /// Base URL for existing authorizations
    pub authz: String,
    /// Base URL for issued certificates
    pub order: String,
    /// Current terms-of-service URL
    pub terms_of_service: Option<String>,
}

impl Directory {
    /// Fetch and normalize the directory for the given dialect.
    pub async fn resolve(transport: &Transport, dialect: AcmeDialect) -> Result<Self> {
        let response = transport
            .get(transport.directory_url())
            .await
            .map_err(|e| AcmeError::DirectoryFetch(e.to_string()))?;
        if !(200..300).contains(&response.status) {
            return Err(AcmeError::DirectoryFetch(format!(
                "HTTP {} from {}",
                response.status,
                transport.directory_url()
            )));
        }

        let raw: Value = response
            .json()
            .map_err(|e| AcmeError::DirectoryFetch(e.to_string()))?;
        let directory = Self::from_value(&raw, dialect)?;
        debug!(%dialect, "directory resolved");
        Ok(directory)
    }

    /// Normalize an already-fetched directory document.
    pub fn from_value(raw: &Value, dialect: AcmeDialect) -> Result<Self> {
        let (account_key, authz_key, order_key, key_change_key, revoke_key, terms) = match dialect {
            AcmeDialect::Acme1Boulder | AcmeDialect::Acme1 => (
                "new-reg",
                "new-authz",
                "new-cert",
                "key-change",
                "revoke-cert",
                "terms-of-service",
            ),
            AcmeDialect::Acme2Boulder => (
                "newAccount",
                "newAuthz",
                "newOrder",
                "keyChange",
                "revokeCert",
                "termsOfService",
            ),
        };

        let required = |key: &str| -> Result<String> {
            raw.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    AcmeError::DirectoryFetch(format!("directory is missing \"{}\"", key))
                })
        };
        let optional =
            |key: &str| raw.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

        let new_account = required(account_key)?;
        let new_authz = required(authz_key)?;
        let new_order = required(order_key)?;

        Ok(Self {
            account: derive_url(&new_account),
            authz: derive_url(&new_authz),
            order: derive_url(&new_order),
            new_account,
            new_authz,
            new_order,
            key_change: optional(key_change_key),
            revoke_cert: optional(revoke_key),
            terms_of_service: raw
                .get("meta")
                .and_then(|m| m.get(terms))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        })
    }
}

/// Rewrite the trailing path segment of a "new-" endpoint into its derived
/// base URL: `.../new-reg` becomes `.../reg/`. Segments without the prefix
/// are kept as-is (best-effort for non-boulder layouts).
fn derive_url(new_url: &str) -> String {
    match new_url.rsplit_once('/') {
        Some((base, segment)) => {
            let derived = segment.strip_prefix("new-").unwrap_or(segment);
            format!("{}/{}/", base, derived)
        }
        None => format!("{}/", new_url),
    }
}
