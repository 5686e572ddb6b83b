/// File-backed keystore: PEM keys and DER certificates with JSON sidecars
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{CertificateStore, KeyStore, StoredCertificate};
use crate::crypto::{KeyAlgorithm, KeyMaterial};
use crate::error::{AcmeError, Result};

#[derive(Serialize, Deserialize)]
struct KeyMetadata {
    algorithm: String,
}

#[derive(Serialize, Deserialize)]
struct CertMetadata {
    friendly_name: String,
    key_name: String,
}

/// File-backed implementation of both store traits.
///
/// Layout: `<base>/keys/<name>.pem` + `<name>.json`,
/// `<base>/certs/<thumbprint>.der` + `<thumbprint>.json`.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.base_dir
            .join("keys")
            .join(format!("{}.pem", sanitize(name)))
    }

    fn key_meta_path(&self, name: &str) -> PathBuf {
        self.base_dir
            .join("keys")
            .join(format!("{}.json", sanitize(name)))
    }

    fn cert_path(&self, thumbprint: &str) -> PathBuf {
        self.base_dir
            .join("certs")
            .join(format!("{}.der", thumbprint))
    }

    fn cert_meta_path(&self, thumbprint: &str) -> PathBuf {
        self.base_dir
            .join("certs")
            .join(format!("{}.json", thumbprint))
    }

    async fn remove_record(&self, thumbprint: &str) -> Result<()> {
        for path in [self.cert_path(thumbprint), self.cert_meta_path(thumbprint)] {
            if fs::try_exists(&path).await.unwrap_or(false) {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| AcmeError::keystore(format!("failed to remove record: {}", e)))?;
            }
        }
        Ok(())
    }
}

/// Keys and friendly names may contain separators; flatten them for paths.
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\', ':', ' '], "_")
}

#[async_trait]
impl KeyStore for FileStore {
    async fn open(&self, name: &str) -> Result<Option<KeyMaterial>> {
        let path = self.key_path(name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let pem_text = fs::read_to_string(&path)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to read key {}: {}", name, e)))?;
        Ok(Some(KeyMaterial::from_pem(&pem_text)?))
    }

    async fn open_or_create(&self, name: &str, algorithm: KeyAlgorithm) -> Result<KeyMaterial> {
        if let Some(existing) = self.open(name).await? {
            debug!(name, "opened existing key");
            return Ok(existing);
        }

        let key = KeyMaterial::generate(algorithm)?;
        let dir = self.base_dir.join("keys");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to create key dir: {}", e)))?;

        fs::write(self.key_path(name), key.to_pem()?)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to write key {}: {}", name, e)))?;

        let meta = KeyMetadata {
            algorithm: algorithm.to_string(),
        };
        fs::write(self.key_meta_path(name), serde_json::to_vec_pretty(&meta)?)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to write key metadata: {}", e)))?;

        debug!(name, %algorithm, "created key");
        Ok(key)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        for path in [self.key_path(name), self.key_meta_path(name)] {
            if fs::try_exists(&path).await.unwrap_or(false) {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| AcmeError::keystore(format!("failed to delete key: {}", e)))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for FileStore {
    async fn find_by_friendly_name(&self, friendly_name: &str) -> Result<Vec<StoredCertificate>> {
        let dir = self.base_dir.join("certs");
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to list cert store: {}", e)))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to read cert entry: {}", e)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let raw = fs::read(&path)
                .await
                .map_err(|e| AcmeError::keystore(format!("failed to read metadata: {}", e)))?;
            let meta: CertMetadata = serde_json::from_slice(&raw)?;
            if meta.friendly_name != friendly_name {
                continue;
            }

            let thumbprint = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let der = fs::read(self.cert_path(&thumbprint))
                .await
                .map_err(|e| AcmeError::keystore(format!("failed to read certificate: {}", e)))?;

            records.push(StoredCertificate {
                thumbprint,
                friendly_name: meta.friendly_name,
                key_name: meta.key_name,
                der,
            });
        }

        Ok(records)
    }

    async fn install(
        &self,
        friendly_name: &str,
        der: &[u8],
        key_name: &str,
    ) -> Result<StoredCertificate> {
        let superseded: Vec<String> = self
            .find_by_friendly_name(friendly_name)
            .await?
            .into_iter()
            .map(|c| c.thumbprint)
            .collect();

        let thumbprint = hex::encode(Sha256::digest(der));
        let dir = self.base_dir.join("certs");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to create cert dir: {}", e)))?;

        fs::write(self.cert_path(&thumbprint), der)
            .await
            .map_err(|e| AcmeError::keystore(format!("failed to write certificate: {}", e)))?;

        let meta = CertMetadata {
            friendly_name: friendly_name.to_string(),
            key_name: key_name.to_string(),
        };
        fs::write(
            self.cert_meta_path(&thumbprint),
            serde_json::to_vec_pretty(&meta)?,
        )
        .await
        .map_err(|e| AcmeError::keystore(format!("failed to write cert metadata: {}", e)))?;

        // in-place renewal: the new record replaces prior holders of the name
        for old in superseded {
            if old != thumbprint {
                debug!(friendly_name, thumbprint = %old, "removing superseded record");
                self.remove_record(&old).await?;
            }
        }

        Ok(StoredCertificate {
            thumbprint,
            friendly_name: friendly_name.to_string(),
            key_name: key_name.to_string(),
            der: der.to_vec(),
        })
    }

    async fn bound_key(&self, certificate: &StoredCertificate) -> Result<Option<KeyMaterial>> {
        self.open(&certificate.key_name).await
    }
}
