//! Top-level per-domain pipeline: verify, authorize, sign, install, export.
//!
//! One run holds the lockfile (unless opted out), resolves the directory
//! once, brings the account in line, then walks the configured certificate
//! specs in declaration order. A spec whose installed certificate still
//! serves costs no network traffic at all.

use crate::account::{self, AccountManager, AccountOptions};
use crate::challenge::{
    AuthzOrchestrator, ChallengeHandler, Dns01ManualHandler, Http01FileHandler,
};
use crate::config::{CertSpec, Config};
use crate::crypto::{JwsSigner, KeyAlgorithm, KeyMaterial};
use crate::csr::{self, CsrParams};
use crate::directory::Directory;
use crate::encoding::base64url;
use crate::error::{AcmeError, Result};
use crate::export::Exporter;
use crate::keystore::{CertificateStore, FileStore, KeyStore, StoredCertificate};
use crate::lifecycle::{Disposition, LifecycleManager};
use crate::lockfile::Lockfile;
use crate::transport::Transport;
use crate::types::ChallengeType;
use serde_json::json;
use tracing::info;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

/// Runs the whole pipeline for one configuration
pub struct Driver {
    config: Config,
    handler: Option<Box<dyn ChallengeHandler>>,
}

impl Driver {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: None,
        }
    }

    /// Supply a challenge deploy/cleanup capability instead of the built-in
    /// file-drop (http-01) or manual-DNS (dns-01) handlers.
    pub fn with_challenge_handler(mut self, handler: Box<dyn ChallengeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Execute one run. The lock is acquired before any network traffic and
    /// released on every exit path, fatal ones included.
    pub async fn run(&self) -> Result<()> {
        let lock = if self.config.lock.enabled {
            let path = self.config.lock_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(Lockfile::acquire(&path)?)
        } else {
            None
        };

        let result = self.run_locked().await;

        if let Some(lock) = lock {
            match &result {
                // a release failure must not mask the run's own error
                Ok(()) => lock.release()?,
                Err(_) => {
                    let _ = lock.release();
                }
            }
        }
        result
    }

    async fn run_locked(&self) -> Result<()> {
        let config = &self.config;
        config.validate()?;
        let transport = Transport::new(&config.ca.url)?;
        let directory = Directory::resolve(&transport, config.dialect()?).await?;
        let store = FileStore::new(config.store_dir()?);

        let account_key = store
            .open_or_create(
                &account::account_key_name(&config.ca.url, &config.account.identifier),
                KeyAlgorithm::Rsa(config.account.key_bits),
            )
            .await?;
        let signer = JwsSigner::new(&account_key)?;

        let account_manager = AccountManager::new(
            &transport,
            &directory,
            &signer,
            account::account_config_path(
                &config.account_dir(),
                &config.ca.url,
                &config.account.identifier,
            ),
            AccountOptions {
                contact: config.account.contact.clone(),
                accept_terms: config.account.accept_terms,
                auto_fix: config.account.auto_fix,
                reset: config.account.reset,
            },
        );
        account_manager.ensure().await?;

        let challenge_type = config.challenge_type()?;
        let default_handler: Box<dyn ChallengeHandler>;
        let handler: &dyn ChallengeHandler = match &self.handler {
            Some(handler) => handler.as_ref(),
            None => {
                default_handler = match challenge_type {
                    ChallengeType::Http01 => {
                        Box::new(Http01FileHandler::new(&config.challenge.well_known_dir))
                    }
                    ChallengeType::Dns01 => Box::new(Dns01ManualHandler::new(
                        config.challenge.dns_propagation_rounds,
                    )),
                };
                default_handler.as_ref()
            }
        };
        let orchestrator = AuthzOrchestrator::new(
            &transport,
            &directory,
            &signer,
            handler,
            challenge_type,
            config.challenge.poll_cap,
        );

        let lifecycle = LifecycleManager::new(
            &store,
            &config.ca.url,
            config.algorithm()?,
            config.certificates.renew_days,
            config.certificates.force_reissue,
        );

        for spec in &config.certificates.specs {
            self.process_spec(
                spec,
                &transport,
                &directory,
                &signer,
                &store,
                &orchestrator,
                &lifecycle,
            )
            .await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_spec(
        &self,
        spec: &CertSpec,
        transport: &Transport,
        directory: &Directory,
        signer: &JwsSigner<'_>,
        store: &FileStore,
        orchestrator: &AuthzOrchestrator<'_>,
        lifecycle: &LifecycleManager<'_, FileStore>,
    ) -> Result<()> {
        let (disposition, prior) = lifecycle.verify(&spec.primary, &spec.sans).await?;
        if disposition == Disposition::Reuse {
            info!(primary = %spec.primary, "installed certificate still serves, reusing");
            return Ok(());
        }

        orchestrator.authorize(&spec.primary).await?;
        for san in &spec.sans {
            orchestrator.authorize(san).await?;
        }

        let key_name = lifecycle.certificate_key_name(&spec.primary);
        let (params, key) = self
            .request_shape(spec, disposition, prior.as_ref(), store, &key_name)
            .await?;

        let csr_der = csr::build(&params, &key)?;
        let response = transport
            .signed(
                signer,
                &directory.new_order,
                "new-cert",
                json!({ "csr": base64url::encode(&csr_der) }),
            )
            .await?;

        // a 2xx body from the legacy dialect is the raw leaf DER
        let record = lifecycle.install(&spec.primary, &response.body).await?;

        if self.config.export.enabled {
            let exporter = Exporter::new(transport.http(), self.config.export_dir());
            exporter.export(&spec.primary, &record.der, &key).await?;
        }

        Ok(())
    }

    /// Choose the CSR parameters and the private key for the request:
    /// renewals inherit their shape (and, unless rotation is on, their key)
    /// from the prior certificate, reissues start from the configuration
    /// with a fresh key.
    async fn request_shape(
        &self,
        spec: &CertSpec,
        disposition: Disposition,
        prior: Option<&StoredCertificate>,
        store: &FileStore,
        key_name: &str,
    ) -> Result<(CsrParams, KeyMaterial)> {
        let algorithm = self.config.algorithm()?;

        if disposition == Disposition::Renew {
            let prior = prior.ok_or_else(|| AcmeError::CertNotFound(spec.primary.clone()))?;
            let (_, cert) = X509Certificate::from_der(&prior.der).map_err(|e| {
                AcmeError::crypto(format!("cannot parse prior certificate: {}", e))
            })?;
            let params = CsrParams::from_certificate(&cert)?;

            let key = if self.config.certificates.rotate_key {
                info!(primary = %spec.primary, "rotating certificate key");
                store.delete(key_name).await?;
                store.open_or_create(key_name, algorithm).await?
            } else {
                match store.bound_key(prior).await? {
                    Some(key) => key,
                    None => store.open_or_create(key_name, algorithm).await?,
                }
            };
            return Ok((params, key));
        }

        info!(primary = %spec.primary, "generating fresh certificate key");
        store.delete(key_name).await?;
        let key = store.open_or_create(key_name, algorithm).await?;
        let params = CsrParams::new(spec.primary.clone(), spec.sans.clone())
            .with_must_staple(self.config.certificates.must_staple);
        Ok((params, key))
    }
}
