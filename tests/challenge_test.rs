//! Orchestrator behavior against a scripted CA: cached authorizations,
//! polling, timeouts and failure details.

mod common;

use certmill::challenge::{AuthzOrchestrator, dns01_record_value, key_authorization};
use certmill::crypto::JwsSigner;
use certmill::directory::{AcmeDialect, Directory};
use certmill::error::AcmeError;
use certmill::transport::Transport;
use certmill::types::ChallengeType;
use common::{CaptureHandler, MockCa};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn wire(ca: &MockCa) -> (Transport, Directory) {
    let transport = Transport::new(ca.directory_url()).unwrap();
    let directory = Directory::resolve(&transport, AcmeDialect::Acme1Boulder)
        .await
        .unwrap();
    (transport, directory)
}

fn challenge_body(uri: &str, status: &str, token: &str) -> serde_json::Value {
    json!({
        "type": "http-01",
        "uri": format!("{uri}/acme/challenge/1"),
        "status": status,
        "token": token,
    })
}

#[tokio::test]
async fn cached_valid_authorization_skips_callbacks() {
    let ca = MockCa::start().await;
    ca.mount_new_authz_cached("http-01").await;
    let (transport, directory) = wire(&ca).await;

    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Http01,
        10,
    );
    orchestrator.authorize("example.com").await.unwrap();

    assert!(handler.deploys.lock().unwrap().is_empty());
    assert!(handler.cleanups.lock().unwrap().is_empty());
    assert!(ca.requests_to("/acme/challenge/1").await.is_empty());
}

#[tokio::test]
async fn polling_stops_at_first_non_pending_status() {
    let ca = MockCa::start().await;
    ca.mount_new_authz("http-01", "tok-1").await;
    let uri = ca.server.uri();

    // respond still pending, then the unsigned poll observes valid
    Mock::given(method("POST"))
        .and(path("/acme/challenge/1"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(challenge_body(&uri, "pending", "tok-1")),
        )
        .mount(&ca.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/challenge/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(challenge_body(&uri, "valid", "tok-1")),
        )
        .mount(&ca.server)
        .await;

    let (transport, directory) = wire(&ca).await;
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Http01,
        50,
    )
    .with_poll_interval(Duration::from_millis(20));
    orchestrator.authorize("example.com").await.unwrap();

    let polls = ca.requests_to("/acme/challenge/1").await;
    let gets = polls.iter().filter(|r| r.method.as_str() == "GET").count();
    assert_eq!(gets, 1, "polling must stop at the first non-pending status");

    let cleanups = handler.cleanups.lock().unwrap();
    assert_eq!(cleanups.len(), 1);
    assert_eq!(cleanups[0].3, "valid");
}

#[tokio::test]
async fn poll_cap_yields_challenge_timeout() {
    let ca = MockCa::start().await;
    ca.mount_new_authz("http-01", "tok-1").await;
    let uri = ca.server.uri();

    for m in ["POST", "GET"] {
        Mock::given(method(m))
            .and(path("/acme/challenge/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(challenge_body(&uri, "pending", "tok-1")),
            )
            .mount(&ca.server)
            .await;
    }

    let (transport, directory) = wire(&ca).await;
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Http01,
        2,
    )
    .with_poll_interval(Duration::from_millis(10));

    let err = orchestrator.authorize("example.com").await.unwrap_err();
    assert!(matches!(err, AcmeError::ChallengeTimeout(2)));

    // cleanup still ran, with the non-terminal status
    let cleanups = handler.cleanups.lock().unwrap();
    assert_eq!(cleanups.len(), 1);
    assert_eq!(cleanups[0].3, "pending");
}

#[tokio::test]
async fn invalid_challenge_carries_server_detail() {
    let ca = MockCa::start().await;
    ca.mount_new_authz("http-01", "tok-1").await;
    let uri = ca.server.uri();

    Mock::given(method("POST"))
        .and(path("/acme/challenge/1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "type": "http-01",
            "uri": format!("{uri}/acme/challenge/1"),
            "status": "invalid",
            "token": "tok-1",
            "error": {
                "type": "urn:acme:error:connection",
                "detail": "could not connect to example.com"
            }
        })))
        .mount(&ca.server)
        .await;

    let (transport, directory) = wire(&ca).await;
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Http01,
        10,
    );
    let err = orchestrator.authorize("example.com").await.unwrap_err();
    assert!(matches!(
        err,
        AcmeError::ChallengeInvalid(detail) if detail.contains("could not connect")
    ));

    let cleanups = handler.cleanups.lock().unwrap();
    assert_eq!(cleanups[0].3, "invalid");
}

#[tokio::test]
async fn non_pending_challenge_is_rejected_before_deploy() {
    let ca = MockCa::start().await;
    let uri = ca.server.uri();
    Mock::given(method("POST"))
        .and(path("/acme/new-authz"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "identifier": { "type": "dns", "value": "example.com" },
            "status": "pending",
            "challenges": [{
                "type": "http-01",
                "uri": format!("{uri}/acme/challenge/1"),
                "status": "processing",
                "token": "tok-1",
            }]
        })))
        .mount(&ca.server)
        .await;

    let (transport, directory) = wire(&ca).await;
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Http01,
        10,
    );
    let err = orchestrator.authorize("example.com").await.unwrap_err();
    assert!(matches!(
        err,
        AcmeError::ChallengeNotPending(status) if status == "processing"
    ));
    assert!(handler.deploys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dns01_selector_and_digest() {
    let ca = MockCa::start().await;
    ca.mount_new_authz("dns-01", "tok-dns").await;
    ca.mount_challenge_valid("dns-01", "tok-dns").await;

    let (transport, directory) = wire(&ca).await;
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();
    let handler = CaptureHandler::default();

    let orchestrator = AuthzOrchestrator::new(
        &transport,
        &directory,
        &signer,
        &handler,
        ChallengeType::Dns01,
        10,
    );
    orchestrator.authorize("example.com").await.unwrap();

    let deploys = handler.deploys.lock().unwrap();
    assert_eq!(deploys.len(), 1);
    let (domain, selector, value) = &deploys[0];
    assert_eq!(domain, "example.com");
    assert_eq!(selector, "_acme-challenge.example.com");

    let expected = dns01_record_value(&key_authorization("tok-dns", signer.thumbprint()));
    assert_eq!(value, &expected);
}

#[tokio::test]
async fn signed_requests_fetch_a_fresh_nonce_each_time() {
    let server = MockServer::start().await;
    // only a HEAD endpoint; any signed call must hit it first
    Mock::given(method("HEAD"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(200).insert_header("Replay-Nonce", "n-1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/acme/target"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let transport = Transport::new(format!("{}/directory", server.uri())).unwrap();
    let key = common::rsa_2048_key();
    let signer = JwsSigner::new(&key).unwrap();

    let url = format!("{}/acme/target", server.uri());
    transport.signed(&signer, &url, "reg", json!({})).await.unwrap();
    transport.signed(&signer, &url, "reg", json!({})).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let heads = requests
        .iter()
        .filter(|r| r.method.as_str() == "HEAD")
        .count();
    assert_eq!(heads, 2, "every signed POST fetches its own nonce");
}
