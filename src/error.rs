/// Error handling for the certmill ACME client
use thiserror::Error;

/// Result type for certmill operations
pub type Result<T> = std::result::Result<T, AcmeError>;

/// Error types for certificate acquisition and renewal
#[derive(Error, Debug)]
pub enum AcmeError {
    /// The CA requires terms-of-service agreement that was not given
    #[error("terms of service at {0} have not been accepted")]
    TermsNotAccepted(String),

    /// The CA rejected a contact address
    #[error("CA rejected contact address: {0}")]
    InvalidEmail(String),

    /// The CA considered the request malformed
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The CA rejected the account credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The CA rejected the replay nonce
    #[error("stale replay nonce: {0}")]
    BadNonce(String),

    /// The server response carried no Replay-Nonce header
    #[error("no Replay-Nonce header in response from {0}")]
    NoNonce(String),

    /// The ACME directory could not be fetched or parsed
    #[error("failed to resolve ACME directory: {0}")]
    DirectoryFetch(String),

    /// A challenge was expected to be pending but was not
    #[error("challenge is not pending (status: {0})")]
    ChallengeNotPending(String),

    /// The CA reported the challenge as failed
    #[error("challenge failed: {0}")]
    ChallengeInvalid(String),

    /// Challenge polling exhausted its round budget
    #[error("challenge did not reach a terminal status within {0} polls")]
    ChallengeTimeout(u32),

    /// Another instance holds the lockfile
    #[error("another instance holds the lock at {path} (pid {holder})")]
    LockHeld { path: String, holder: String },

    /// The lockfile could not be created
    #[error("cannot write lockfile at {path}: {source}")]
    LockUnwritable {
        path: String,
        source: std::io::Error,
    },

    /// A keystore operation failed
    #[error("keystore operation failed: {0}")]
    Keystore(String),

    /// No stored certificate matched the lookup
    #[error("no certificate found for {0}")]
    CertNotFound(String),

    /// The issuer certificate named by the AIA extension could not be fetched
    #[error("issuer certificate unreachable at {url}: {detail}")]
    IssuerUnreachable { url: String, detail: String },

    /// An ACME problem document with a kind this client does not special-case
    #[error("ACME server problem ({kind}): {detail}")]
    ServerProblem { kind: String, detail: String },

    /// Cryptographic operation error
    #[error("crypto error: {0}")]
    Crypto(String),

    /// HTTP transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AcmeError {
    /// Create a crypto error
    pub fn crypto<S: Into<String>>(msg: S) -> Self {
        AcmeError::Crypto(msg.into())
    }

    /// Create a keystore error
    pub fn keystore<S: Into<String>>(msg: S) -> Self {
        AcmeError::Keystore(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        AcmeError::Transport(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        AcmeError::Configuration(msg.into())
    }

    /// Promote an ACME problem document to a typed error.
    ///
    /// `kind` is the portion of the problem `type` URN after the last `:`
    /// (e.g. `urn:acme:error:badNonce` -> `badNonce`). Kinds without a
    /// dedicated variant keep their string form.
    pub fn from_problem(kind: &str, detail: String) -> Self {
        match kind {
            "invalidEmail" => AcmeError::InvalidEmail(detail),
            "malformed" => AcmeError::Malformed(detail),
            "unauthorized" => AcmeError::Unauthorized(detail),
            "badNonce" => AcmeError::BadNonce(detail),
            _ => AcmeError::ServerProblem {
                kind: kind.to_string(),
                detail,
            },
        }
    }
}
