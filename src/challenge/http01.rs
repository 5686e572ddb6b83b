/// Default http-01 handler: drop the key authorization under the web root
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::ChallengeHandler;
use crate::error::{AcmeError, Result};

/// Writes `<well-known-dir>/<token>` with the key authorization as ASCII
/// content and deletes it again once the challenge settles.
pub struct Http01FileHandler {
    well_known_dir: PathBuf,
}

impl Http01FileHandler {
    pub fn new(well_known_dir: impl AsRef<Path>) -> Self {
        Self {
            well_known_dir: well_known_dir.as_ref().to_path_buf(),
        }
    }

    fn token_path(&self, token: &str) -> Result<PathBuf> {
        // tokens are CA-supplied; never let one escape the challenge dir
        if token.contains('/') || token.contains("..") {
            return Err(AcmeError::ChallengeInvalid(format!(
                "refusing suspicious challenge token: {}",
                token
            )));
        }
        Ok(self.well_known_dir.join(token))
    }
}

#[async_trait]
impl ChallengeHandler for Http01FileHandler {
    async fn deploy(&self, domain: &str, selector: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.well_known_dir).await?;
        let path = self.token_path(selector)?;
        fs::write(&path, value.as_bytes()).await?;
        info!(domain, path = %path.display(), "challenge file deployed");
        Ok(())
    }

    async fn cleanup(
        &self,
        domain: &str,
        selector: &str,
        _value: &str,
        status: &str,
    ) -> Result<()> {
        let path = self.token_path(selector)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await?;
        }
        debug!(domain, status, "challenge file removed");
        Ok(())
    }
}
