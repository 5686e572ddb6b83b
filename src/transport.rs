//! HTTP transport for the ACME wire protocol.
//!
//! Two signed-side calls: `nonce()` (HEAD against the directory URL,
//! harvesting `Replay-Nonce`) and `signed()` (JWS POST with the `resource`
//! field injected). Every signed POST fetches a fresh nonce; the round-trip
//! buys immunity to stale-nonce hazards. Challenge polling uses the
//! unsigned `get()`.

use crate::crypto::JwsSigner;
use crate::error::{AcmeError, Result};
use crate::types::Problem;
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = concat!("certmill/", env!("CARGO_PKG_VERSION"));
const REPLAY_NONCE: &str = "replay-nonce";

/// A response from the ACME server
#[derive(Debug, Clone)]
pub struct AcmeResponse {
    /// HTTP status code
    pub status: u16,
    /// Location header, when present
    pub location: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl AcmeResponse {
    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AcmeError::transport(format!("JSON parse error: {}", e)))
    }
}

/// HTTP client bound to one ACME directory URL
pub struct Transport {
    http: reqwest::Client,
    directory_url: String,
}

impl Transport {
    /// Create a transport for the given directory URL.
    pub fn new(directory_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AcmeError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            directory_url: directory_url.into(),
        })
    }

    /// The directory URL this transport talks to.
    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// The underlying HTTP client, for collaborators fetching plain URLs.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetch a fresh replay nonce via HEAD against the directory URL.
    pub async fn nonce(&self) -> Result<String> {
        let response = self
            .http
            .head(&self.directory_url)
            .send()
            .await
            .map_err(|e| AcmeError::transport(format!("nonce request failed: {}", e)))?;

        response
            .headers()
            .get(REPLAY_NONCE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| AcmeError::NoNonce(self.directory_url.clone()))
    }

    /// Unsigned GET, used for the ACME directory and challenge polling.
    pub async fn get(&self, url: &str) -> Result<AcmeResponse> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AcmeError::transport(format!("GET {} failed: {}", url, e)))?;

        read_response(response).await
    }

    /// Signed POST carrying `payload` with `resource` injected.
    ///
    /// Non-2xx responses are promoted to typed errors from the problem
    /// document in the body.
    pub async fn signed(
        &self,
        signer: &JwsSigner<'_>,
        url: &str,
        resource: &str,
        payload: Value,
    ) -> Result<AcmeResponse> {
        let nonce = self.nonce().await?;
        let body = signer.sign_request(&nonce, resource, payload)?;
        debug!(url, resource, "signed POST");

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AcmeError::transport(format!("POST {} failed: {}", url, e)))?;

        let response = read_response(response).await?;
        if (200..300).contains(&response.status) {
            return Ok(response);
        }

        Err(problem_error(&response))
    }
}

async fn read_response(response: reqwest::Response) -> Result<AcmeResponse> {
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get("location")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let body = response
        .bytes()
        .await
        .map_err(|e| AcmeError::transport(format!("failed to read body: {}", e)))?
        .to_vec();

    Ok(AcmeResponse {
        status,
        location,
        body,
    })
}

fn problem_error(response: &AcmeResponse) -> AcmeError {
    match response.json::<Problem>() {
        Ok(problem) => {
            let detail = problem
                .detail
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            AcmeError::from_problem(problem.kind(), detail)
        }
        Err(_) => AcmeError::ServerProblem {
            kind: format!("http-{}", response.status),
            detail: String::from_utf8_lossy(&response.body).into_owned(),
        },
    }
}
