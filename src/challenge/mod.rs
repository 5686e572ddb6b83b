//! Per-identifier authorization and challenge orchestration.
//!
//! For each DNS name the orchestrator requests an authorization, picks the
//! configured challenge type, hands the proof material to a
//! [`ChallengeHandler`], tells the CA to validate, and polls the challenge
//! until it turns `valid` or `invalid`. Authorizations the CA already holds
//! as `valid` short-circuit the whole dance.

pub mod dns01;
pub mod http01;

pub use dns01::Dns01ManualHandler;
pub use http01::Http01FileHandler;

use crate::crypto::JwsSigner;
use crate::directory::Directory;
use crate::encoding::base64url;
use crate::error::{AcmeError, Result};
use crate::transport::Transport;
use crate::types::{Authorization, Challenge, ChallengeType};
use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

/// Deploys and removes challenge proofs.
///
/// For http-01 the selector is the raw token and the value is the key
/// authorization; for dns-01 the selector is `_acme-challenge.<domain>` and
/// the value is the base64url SHA-256 digest of the key authorization.
/// Cleanup additionally receives the challenge's terminal status.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    /// Publish the proof for a domain.
    async fn deploy(&self, domain: &str, selector: &str, value: &str) -> Result<()>;

    /// Remove the proof after validation settled.
    async fn cleanup(&self, domain: &str, selector: &str, value: &str, status: &str)
    -> Result<()>;
}

/// Compute `token.thumbprint`, the value served back to the CA.
pub fn key_authorization(token: &str, thumbprint: &str) -> String {
    format!("{}.{}", token, thumbprint)
}

/// The TXT record value for dns-01: base64url(SHA-256(key authorization)).
pub fn dns01_record_value(key_authorization: &str) -> String {
    base64url::encode(&Sha256::digest(key_authorization.as_bytes()))
}

/// Walks authorizations for one run
pub struct AuthzOrchestrator<'a> {
    transport: &'a Transport,
    directory: &'a Directory,
    signer: &'a JwsSigner<'a>,
    handler: &'a dyn ChallengeHandler,
    challenge_type: ChallengeType,
    poll_interval: Duration,
    poll_cap: u32,
}

impl<'a> AuthzOrchestrator<'a> {
    pub fn new(
        transport: &'a Transport,
        directory: &'a Directory,
        signer: &'a JwsSigner<'a>,
        handler: &'a dyn ChallengeHandler,
        challenge_type: ChallengeType,
        poll_cap: u32,
    ) -> Self {
        Self {
            transport,
            directory,
            signer,
            handler,
            challenge_type,
            poll_interval: Duration::from_secs(1),
            poll_cap,
        }
    }

    /// Override the 1 s poll interval (tests)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drive one identifier to an authorized state.
    pub async fn authorize(&self, domain: &str) -> Result<()> {
        info!(domain, "requesting authorization");
        let payload = json!({
            "identifier": { "type": "dns", "value": domain }
        });
        let response = self
            .transport
            .signed(self.signer, &self.directory.new_authz, "new-authz", payload)
            .await?;
        let authz: Authorization = response.json()?;

        if authz.has_valid_challenge() {
            info!(domain, "authorization already valid, skipping challenge");
            return Ok(());
        }

        let challenge = authz.challenge(self.challenge_type).ok_or_else(|| {
            AcmeError::ChallengeInvalid(format!(
                "authorization for {} offers no {} challenge",
                domain, self.challenge_type
            ))
        })?;
        if challenge.status != "pending" {
            return Err(AcmeError::ChallengeNotPending(challenge.status.clone()));
        }

        let key_auth = key_authorization(&challenge.token, self.signer.thumbprint());
        let (selector, value) = self.challenge_target(domain, challenge, &key_auth);

        self.handler.deploy(domain, &selector, &value).await?;

        let outcome = self.validate(domain, challenge, &key_auth).await;
        let status = match &outcome {
            Ok(challenge) => challenge.status.clone(),
            Err(_) => "pending".to_string(),
        };
        self.handler
            .cleanup(domain, &selector, &value, &status)
            .await?;

        let settled = outcome?;
        match settled.status.as_str() {
            "valid" => {
                info!(domain, "authorization valid");
                Ok(())
            }
            "invalid" => Err(AcmeError::ChallengeInvalid(format!(
                "{}: {}",
                domain,
                settled.failure_detail()
            ))),
            other => Err(AcmeError::ChallengeNotPending(other.to_string())),
        }
    }

    /// Respond to the challenge and poll until a terminal status, bounded by
    /// the configured cap.
    async fn validate(
        &self,
        domain: &str,
        challenge: &Challenge,
        key_auth: &str,
    ) -> Result<Challenge> {
        let response = self
            .transport
            .signed(
                self.signer,
                &challenge.url,
                "challenge",
                json!({ "keyAuthorization": key_auth }),
            )
            .await?;
        let mut current: Challenge = response.json()?;

        let mut polls = 0u32;
        while current.status == "pending" {
            if polls >= self.poll_cap {
                return Err(AcmeError::ChallengeTimeout(self.poll_cap));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            debug!(domain, polls, "polling challenge");
            let response = self.transport.get(&challenge.url).await?;
            current = response.json()?;
        }

        Ok(current)
    }

    fn challenge_target(
        &self,
        domain: &str,
        challenge: &Challenge,
        key_auth: &str,
    ) -> (String, String) {
        match self.challenge_type {
            ChallengeType::Http01 => (challenge.token.clone(), key_auth.to_string()),
            ChallengeType::Dns01 => (
                format!("_acme-challenge.{}", domain),
                dns01_record_value(key_auth),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_authorization_format() {
        assert_eq!(key_authorization("tok", "print"), "tok.print");
    }

    #[test]
    fn test_dns01_record_value() {
        // base64url(SHA-256("token.thumbprint"))
        let value = dns01_record_value("token.thumbprint");
        let expected = base64url::encode(&Sha256::digest(b"token.thumbprint"));
        assert_eq!(value, expected);
        assert!(!value.contains('='));
    }
}
