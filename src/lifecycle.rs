//! Certificate lifecycle decisions: reuse, renew, or reissue.
//!
//! A prior certificate is located by its friendly name
//! `"<primary> - <ca tag>"`. Reuse requires a bound key of the configured
//! algorithm, a matching SAN bag and enough remaining lifetime; an expiring
//! match renews, everything else reissues with a fresh key.

use crate::account::ca_tag;
use crate::crypto::KeyAlgorithm;
use crate::error::Result;
use crate::keystore::{CertificateStore, KeyStore, StoredCertificate};
use jiff::Timestamp;
use tracing::{info, warn};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

/// Outcome of the pre-flight check for one certificate spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The installed certificate still serves; no network traffic needed
    Reuse,
    /// Same key and shape, but the lifetime is inside the renewal window
    Renew,
    /// Start over with a fresh key (absent, wrong algorithm, SAN drift, ...)
    Reissue,
}

/// The friendly name tying a primary domain to this CA.
pub fn friendly_name(primary: &str, ca_url: &str) -> String {
    format!("{} - {}", primary, ca_tag(ca_url))
}

/// Decides and installs; generic over the keystore implementation
pub struct LifecycleManager<'a, S: KeyStore + CertificateStore> {
    store: &'a S,
    ca_url: String,
    algorithm: KeyAlgorithm,
    renew_days: u32,
    force_reissue: bool,
}

impl<'a, S: KeyStore + CertificateStore> LifecycleManager<'a, S> {
    pub fn new(
        store: &'a S,
        ca_url: impl Into<String>,
        algorithm: KeyAlgorithm,
        renew_days: u32,
        force_reissue: bool,
    ) -> Self {
        Self {
            store,
            ca_url: ca_url.into(),
            algorithm,
            renew_days,
            force_reissue,
        }
    }

    /// The friendly name for a primary domain under this CA.
    pub fn friendly_name(&self, primary: &str) -> String {
        friendly_name(primary, &self.ca_url)
    }

    /// The keystore name of the certificate's private key.
    pub fn certificate_key_name(&self, primary: &str) -> String {
        format!("{} key", self.friendly_name(primary))
    }

    /// The current record for a primary domain: latest NotAfter wins,
    /// thumbprints break ties deterministically.
    pub async fn locate(&self, primary: &str) -> Result<Option<StoredCertificate>> {
        let friendly = self.friendly_name(primary);
        let mut candidates = Vec::new();

        for record in self.store.find_by_friendly_name(&friendly).await? {
            match X509Certificate::from_der(&record.der) {
                Ok((_, cert)) => {
                    candidates.push((cert.validity().not_after.timestamp(), record));
                }
                Err(e) => {
                    warn!(
                        friendly_name = %friendly,
                        thumbprint = %record.thumbprint,
                        error = %e,
                        "skipping unparseable stored certificate"
                    );
                }
            }
        }

        candidates.sort_by(|(after_a, rec_a), (after_b, rec_b)| {
            after_b
                .cmp(after_a)
                .then_with(|| rec_a.thumbprint.cmp(&rec_b.thumbprint))
        });

        Ok(candidates.into_iter().next().map(|(_, record)| record))
    }

    /// Decide what to do for a (primary, SANs) request.
    pub async fn verify(
        &self,
        primary: &str,
        sans: &[String],
    ) -> Result<(Disposition, Option<StoredCertificate>)> {
        let Some(record) = self.locate(primary).await? else {
            info!(primary, "no prior certificate, issuing fresh");
            return Ok((Disposition::Reissue, None));
        };

        let Ok((_, cert)) = X509Certificate::from_der(&record.der) else {
            return Ok((Disposition::Reissue, None));
        };

        let Some(key) = self.store.bound_key(&record).await? else {
            info!(primary, "prior certificate has no bound key, reissuing");
            return Ok((Disposition::Reissue, Some(record)));
        };

        if !san_bag_matches(&cert, primary, sans) {
            info!(primary, "SAN set changed, reissuing");
            return Ok((Disposition::Reissue, Some(record)));
        }

        if key.algorithm() != self.algorithm {
            info!(
                primary,
                have = %key.algorithm(),
                want = %self.algorithm,
                "key algorithm mismatch, reissuing"
            );
            return Ok((Disposition::Reissue, Some(record)));
        }

        if self.force_reissue {
            info!(primary, "reissue forced by configuration");
            return Ok((Disposition::Reissue, Some(record)));
        }

        let not_after = cert.validity().not_after.timestamp();
        let horizon = Timestamp::now().as_second() + i64::from(self.renew_days) * 86_400;
        if not_after <= horizon {
            info!(primary, "certificate is inside the renewal window");
            return Ok((Disposition::Renew, Some(record)));
        }

        Ok((Disposition::Reuse, Some(record)))
    }

    /// Install an issued certificate bound to its key.
    pub async fn install(&self, primary: &str, der: &[u8]) -> Result<StoredCertificate> {
        let friendly = self.friendly_name(primary);
        let key_name = self.certificate_key_name(primary);
        let record = self.store.install(&friendly, der, &key_name).await?;
        info!(primary, friendly_name = %friendly, "certificate installed");
        Ok(record)
    }
}

/// Compare the certificate's DNS names against {primary} ∪ SANs as bags.
fn san_bag_matches(cert: &X509Certificate<'_>, primary: &str, sans: &[String]) -> bool {
    use x509_parser::extensions::GeneralName;

    let mut in_cert = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                in_cert.push(dns.to_string());
            }
        }
    }

    let mut wanted: Vec<String> = std::iter::once(primary.to_string())
        .chain(sans.iter().cloned())
        .collect();

    in_cert.sort();
    wanted.sort();
    wanted.dedup();
    in_cert == wanted
}
