//! Shared test support: a wiremock-backed legacy-dialect CA, a DER-built
//! certificate factory for lifecycle fixtures, and fixed keys so the RSA
//! cases stay fast.
#![allow(dead_code)]

use async_trait::async_trait;
use certmill::challenge::ChallengeHandler;
use certmill::config::{CertSpec, Config};
use certmill::crypto::KeyMaterial;
use certmill::encoding::{base64url, der};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RSA_4096_PEM: &str = include_str!("fixtures/rsa4096.pem");
pub const RSA_2048_PEM: &str = include_str!("fixtures/rsa2048.pem");
pub const P256_PEM: &str = include_str!("fixtures/p256.pem");

pub fn rsa_4096_key() -> KeyMaterial {
    KeyMaterial::from_pem(RSA_4096_PEM).expect("fixture key should parse")
}

pub fn rsa_2048_key() -> KeyMaterial {
    KeyMaterial::from_pem(RSA_2048_PEM).expect("fixture key should parse")
}

pub fn p256_key() -> KeyMaterial {
    KeyMaterial::from_pem(P256_PEM).expect("fixture key should parse")
}

/// Seconds since the epoch, shifted by a number of days.
pub fn days_from_now(days: i64) -> i64 {
    jiff::Timestamp::now().as_second() + days * 86_400
}

fn utc_time(epoch: i64) -> Vec<u8> {
    let formatted = jiff::Timestamp::from_second(epoch)
        .expect("epoch in range")
        .strftime("%y%m%d%H%M%SZ")
        .to_string();
    let mut out = vec![0x17, formatted.len() as u8];
    out.extend_from_slice(formatted.as_bytes());
    out
}

fn name_cn(cn: &str) -> Vec<u8> {
    let mut atv = der::oid(&[2, 5, 4, 3]);
    atv.extend(der::utf8_string(cn));
    der::sequence(&der::set(&der::sequence(&atv)))
}

fn signature_algorithm(key: &KeyMaterial) -> Vec<u8> {
    use certmill::crypto::KeyAlgorithm;
    match key.algorithm() {
        KeyAlgorithm::Rsa(_) => {
            let mut alg = der::oid(&[1, 2, 840, 113549, 1, 1, 11]);
            alg.extend(der::null());
            der::sequence(&alg)
        }
        KeyAlgorithm::EcdsaP256 => der::sequence(&der::oid(&[1, 2, 840, 10045, 4, 3, 2])),
        KeyAlgorithm::EcdsaP384 => der::sequence(&der::oid(&[1, 2, 840, 10045, 4, 3, 3])),
    }
}

/// A minimal self-signed certificate carrying the given DNS names, good for
/// exercising lifecycle decisions and install flows. Nothing verifies its
/// signature; it only has to parse.
pub fn make_cert(key: &KeyMaterial, dns_names: &[&str], not_after: i64) -> Vec<u8> {
    let not_before = not_after - 200 * 86_400;

    let mut tbs = der::context(0, &der::integer(&[2]));
    tbs.extend(der::integer(&[0x01, 0x02, 0x03]));
    tbs.extend(signature_algorithm(key));
    tbs.extend(name_cn("certmill test issuer"));

    let mut validity = utc_time(not_before);
    validity.extend(utc_time(not_after));
    tbs.extend(der::sequence(&validity));

    tbs.extend(name_cn(dns_names[0]));
    tbs.extend(key.spki_der());

    let mut names = Vec::new();
    for name in dns_names {
        names.extend(der::context_primitive(2, name.as_bytes()));
    }
    let mut san = der::oid(&[2, 5, 29, 17]);
    san.extend(der::octet_string(&der::sequence(&names)));
    tbs.extend(der::context(3, &der::sequence(&der::sequence(&san))));

    let tbs = der::sequence(&tbs);
    let signature = key.sign(&tbs).expect("test signing");

    let mut cert = tbs;
    cert.extend(signature_algorithm(key));
    cert.extend(der::bit_string(&signature));
    der::sequence(&cert)
}

/// Legacy-dialect mock CA
pub struct MockCa {
    pub server: MockServer,
}

impl MockCa {
    /// Start the server and mount the directory plus the nonce HEAD.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();

        let directory = json!({
            "new-reg": format!("{uri}/acme/new-reg"),
            "new-authz": format!("{uri}/acme/new-authz"),
            "new-cert": format!("{uri}/acme/new-cert"),
            "key-change": format!("{uri}/acme/key-change"),
            "revoke-cert": format!("{uri}/acme/revoke-cert"),
            "meta": { "terms-of-service": format!("{uri}/terms") }
        });

        Mock::given(method("GET"))
            .and(path("/directory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&directory))
            .mount(&server)
            .await;

        Mock::given(method("HEAD"))
            .and(path("/directory"))
            .respond_with(ResponseTemplate::new(200).insert_header("Replay-Nonce", "nonce-0001"))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn directory_url(&self) -> String {
        format!("{}/directory", self.server.uri())
    }

    pub fn terms_url(&self) -> String {
        format!("{}/terms", self.server.uri())
    }

    /// Mount a successful registration response.
    pub async fn mount_new_reg(&self) {
        let body = json!({
            "id": 1,
            "contact": ["mailto:admin@example.com"],
            "agreement": self.terms_url(),
            "createdAt": "2016-01-01T00:00:00Z",
        });
        Mock::given(method("POST"))
            .and(path("/acme/new-reg"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Replay-Nonce", "nonce-0002")
                    .set_body_json(&body),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount the registration-update endpoint for account id 1.
    pub async fn mount_reg_update(&self, contact: &[&str]) {
        let body = json!({
            "id": 1,
            "contact": contact,
            "agreement": self.terms_url(),
        });
        Mock::given(method("POST"))
            .and(path("/acme/reg/1"))
            .respond_with(ResponseTemplate::new(202).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount an authorization offering a pending challenge of the given type.
    pub async fn mount_new_authz(&self, challenge_type: &str, token: &str) {
        let uri = self.server.uri();
        let body = json!({
            "identifier": { "type": "dns", "value": "example.com" },
            "status": "pending",
            "challenges": [{
                "type": challenge_type,
                "uri": format!("{uri}/acme/challenge/1"),
                "status": "pending",
                "token": token,
            }]
        });
        Mock::given(method("POST"))
            .and(path("/acme/new-authz"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount an authorization that is already valid (cached on the CA side).
    pub async fn mount_new_authz_cached(&self, challenge_type: &str) {
        let uri = self.server.uri();
        let body = json!({
            "identifier": { "type": "dns", "value": "example.com" },
            "status": "valid",
            "challenges": [{
                "type": challenge_type,
                "uri": format!("{uri}/acme/challenge/1"),
                "status": "valid",
                "token": "cached-token",
            }]
        });
        Mock::given(method("POST"))
            .and(path("/acme/new-authz"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount the challenge endpoint answering `valid` immediately.
    pub async fn mount_challenge_valid(&self, challenge_type: &str, token: &str) {
        let uri = self.server.uri();
        let body = json!({
            "type": challenge_type,
            "uri": format!("{uri}/acme/challenge/1"),
            "status": "valid",
            "token": token,
        });
        Mock::given(method("POST"))
            .and(path("/acme/challenge/1"))
            .respond_with(ResponseTemplate::new(202).set_body_json(&body))
            .mount(&self.server)
            .await;
    }

    /// Mount issuance returning the given certificate DER.
    pub async fn mount_new_cert(&self, cert_der: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path("/acme/new-cert"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Content-Type", "application/pkix-cert")
                    .set_body_bytes(cert_der),
            )
            .mount(&self.server)
            .await;
    }

    /// Requests this server saw for the given path.
    pub async fn requests_to(&self, wanted: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == wanted)
            .collect()
    }
}

/// Place key material into a file store under a given name, mirroring the
/// store's documented layout. Tests that need a specific prior key (e.g. the
/// 4096-bit fixture) seed it this way instead of generating one.
pub fn seed_key(store_root: &Path, name: &str, key: &KeyMaterial) {
    let dir = store_root.join("keys");
    std::fs::create_dir_all(&dir).expect("key dir");
    let sanitized = name.replace(['/', '\\', ':', ' '], "_");
    std::fs::write(
        dir.join(format!("{sanitized}.pem")),
        key.to_pem().expect("key PEM"),
    )
    .expect("write key");
    std::fs::write(
        dir.join(format!("{sanitized}.json")),
        json!({ "algorithm": key.algorithm().to_string() }).to_string(),
    )
    .expect("write key metadata");
}

/// Seed the fixture RSA account key into a config root's store so driver
/// runs skip RSA generation.
pub fn seed_account_key(root: &Path, ca_url: &str) {
    seed_key(
        &root.join("store"),
        &certmill::account::account_key_name(ca_url, "default"),
        &rsa_2048_key(),
    );
}

/// Decode the JWS payload of a captured signed request body.
pub fn jws_payload(body: &[u8]) -> Value {
    let envelope: Value = serde_json::from_slice(body).expect("request body should be JSON");
    let payload_b64 = envelope["payload"].as_str().expect("payload field");
    serde_json::from_slice(&base64url::decode(payload_b64).expect("payload should be base64url"))
        .expect("payload should be JSON")
}

/// Challenge handler recording every invocation
#[derive(Clone, Default)]
pub struct CaptureHandler {
    pub deploys: Arc<Mutex<Vec<(String, String, String)>>>,
    pub cleanups: Arc<Mutex<Vec<(String, String, String, String)>>>,
}

#[async_trait]
impl ChallengeHandler for CaptureHandler {
    async fn deploy(&self, domain: &str, selector: &str, value: &str) -> certmill::Result<()> {
        self.deploys
            .lock()
            .expect("capture lock")
            .push((domain.into(), selector.into(), value.into()));
        Ok(())
    }

    async fn cleanup(
        &self,
        domain: &str,
        selector: &str,
        value: &str,
        status: &str,
    ) -> certmill::Result<()> {
        self.cleanups.lock().expect("capture lock").push((
            domain.into(),
            selector.into(),
            value.into(),
            status.into(),
        ));
        Ok(())
    }
}

/// A config wired to the mock CA with every path under a scratch root.
pub fn base_config(ca_url: &str, root: &Path) -> Config {
    let mut config = Config::default();
    config.ca.url = ca_url.to_string();

    config.account.contact = vec!["mailto:admin@example.com".to_string()];
    config.account.accept_terms = true;
    config.account.key_bits = 2048;
    config.account.directory = root.join("accounts").display().to_string();

    config.certificates.algorithm = "ecdsa-p256".to_string();
    config.certificates.specs = vec![CertSpec {
        primary: "example.com".to_string(),
        sans: vec![],
    }];

    config.challenge.well_known_dir = root.join("wellknown").display().to_string();
    config.store.user_dir = root.join("store").display().to_string();
    config.lock.path = root.join("certmill.lock").display().to_string();
    config.export.directory = root.join("out").display().to_string();
    config
}
