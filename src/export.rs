//! PEM exports for services that read certificates off disk.
//!
//! Writes the leaf, the private key, a combined file, and the issuer chain.
//! The issuer is discovered through the leaf's Authority Information Access
//! extension and fetched from the CA-Issuers URL it names.

use crate::crypto::KeyMaterial;
use crate::encoding::pem;
use crate::error::{AcmeError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;

const OID_AIA_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

/// Writes export files for issued certificates
pub struct Exporter<'a> {
    http: &'a reqwest::Client,
    out_dir: PathBuf,
}

impl<'a> Exporter<'a> {
    pub fn new(http: &'a reqwest::Client, out_dir: impl AsRef<Path>) -> Self {
        Self {
            http,
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    /// Export one certificate: `cert.pem`, `key.pem`, `combined.pem`, and
    /// `chain.pem` when the leaf names an issuer URL.
    pub async fn export(&self, primary: &str, der: &[u8], key: &KeyMaterial) -> Result<()> {
        let dir = self.out_dir.join(primary);
        fs::create_dir_all(&dir).await?;

        let cert_pem = pem::frame(pem::CERTIFICATE, der);
        let key_pem = key.to_pem()?;

        fs::write(dir.join("cert.pem"), &cert_pem).await?;
        fs::write(dir.join("key.pem"), &key_pem).await?;
        fs::write(dir.join("combined.pem"), format!("{}{}", key_pem, cert_pem)).await?;

        if let Some(issuer_der) = self.fetch_issuer(der).await? {
            let mut chain = cert_pem;
            chain.push_str(&pem::frame(pem::CERTIFICATE, &issuer_der));
            fs::write(dir.join("chain.pem"), chain).await?;
        }

        info!(primary, dir = %dir.display(), "certificate exported");
        Ok(())
    }

    /// Fetch the issuer certificate the leaf's AIA extension points to.
    /// Returns `None` when the leaf carries no CA-Issuers URL.
    async fn fetch_issuer(&self, leaf_der: &[u8]) -> Result<Option<Vec<u8>>> {
        let (_, cert) = X509Certificate::from_der(leaf_der)
            .map_err(|e| AcmeError::crypto(format!("cannot parse issued certificate: {}", e)))?;

        let Some(url) = issuer_url(&cert) else {
            debug!("leaf has no CA-Issuers URL, skipping chain export");
            return Ok(None);
        };

        let response = self.http.get(&url).send().await.map_err(|e| {
            AcmeError::IssuerUnreachable {
                url: url.clone(),
                detail: e.to_string(),
            }
        })?;
        if !response.status().is_success() {
            return Err(AcmeError::IssuerUnreachable {
                url,
                detail: format!("HTTP {}", response.status()),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AcmeError::IssuerUnreachable {
                url,
                detail: e.to_string(),
            })?
            .to_vec();

        // some CAs serve the issuer as PEM
        if body.starts_with(b"-----BEGIN") {
            let parsed = ::pem::parse(&body)
                .map_err(|e| AcmeError::crypto(format!("issuer PEM parse error: {}", e)))?;
            return Ok(Some(parsed.contents().to_vec()));
        }
        Ok(Some(body))
    }
}

/// The CA-Issuers URL from the Authority Information Access extension.
pub fn issuer_url(cert: &X509Certificate<'_>) -> Option<String> {
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method.to_id_string() == OID_AIA_CA_ISSUERS
                    && let GeneralName::URI(uri) = &desc.access_location
                {
                    return Some(uri.to_string());
                }
            }
        }
    }
    None
}
