/// Default dns-01 handler: print operator guidance and poll for propagation
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ChallengeHandler;
use crate::error::{AcmeError, Result};

/// Tells the operator which TXT record to publish, then watches DNS until
/// the record shows up. Cleanup only prints removal guidance; the record was
/// never ours to delete.
pub struct Dns01ManualHandler {
    resolver: TokioResolver,
    poll_interval: Duration,
    max_rounds: u32,
}

impl Dns01ManualHandler {
    pub fn new(max_rounds: u32) -> Self {
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::new(),
            TokioConnectionProvider::default(),
        )
        .build();

        Self {
            resolver,
            poll_interval: Duration::from_secs(5),
            max_rounds,
        }
    }

    /// Override the propagation poll interval (tests)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn record_present(&self, name: &str, value: &str) -> bool {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => lookup.iter().any(|txt| txt.to_string() == value),
            Err(e) => {
                debug!(name, error = %e, "TXT lookup failed");
                false
            }
        }
    }
}

#[async_trait]
impl ChallengeHandler for Dns01ManualHandler {
    async fn deploy(&self, domain: &str, selector: &str, value: &str) -> Result<()> {
        info!(
            domain,
            "publish a TXT record now:\n    {}  IN TXT  \"{}\"",
            selector,
            value
        );

        for round in 1..=self.max_rounds {
            if self.record_present(selector, value).await {
                info!(domain, rounds = round, "TXT record observed");
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(AcmeError::ChallengeInvalid(format!(
            "TXT record {} was not observed within {} checks",
            selector, self.max_rounds
        )))
    }

    async fn cleanup(
        &self,
        domain: &str,
        selector: &str,
        _value: &str,
        status: &str,
    ) -> Result<()> {
        if status == "valid" {
            info!(domain, "the TXT record {} can be removed now", selector);
        } else {
            warn!(
                domain,
                status, "challenge did not validate; remove the TXT record {}", selector
            );
        }
        Ok(())
    }
}
