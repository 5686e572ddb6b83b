//! JWS request bodies in the legacy four-field ACME form.
//!
//! Every signed request carries `header`, `protected` (header plus nonce),
//! `payload` and `signature`. The transport injects `resource` into the
//! payload before signing; signatures are RS256 over
//! `protected || "." || payload`.

use crate::crypto::jwk::Jwk;
use crate::crypto::keys::KeyMaterial;
use crate::encoding::base64url;
use crate::error::{AcmeError, Result};
use serde_json::{Value, json};

/// Signs ACME request bodies with the account key
pub struct JwsSigner<'a> {
    key: &'a KeyMaterial,
    jwk: Jwk,
    thumbprint: String,
}

impl<'a> JwsSigner<'a> {
    /// Create a signer for an RSA account key.
    pub fn new(key: &'a KeyMaterial) -> Result<Self> {
        let jwk = Jwk::from_key(key)?;
        let thumbprint = jwk.thumbprint()?;
        Ok(Self {
            key,
            jwk,
            thumbprint,
        })
    }

    /// The account key's public JWK.
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// The account key's RFC 7638 thumbprint (base64url).
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Build the signed body for one request.
    ///
    /// `payload` must be a JSON object; `resource` is written into it before
    /// encoding, as the legacy dialect requires on every call.
    pub fn sign_request(&self, nonce: &str, resource: &str, payload: Value) -> Result<Value> {
        let mut payload = payload;
        let Some(map) = payload.as_object_mut() else {
            return Err(AcmeError::crypto(
                "JWS payload must be a JSON object".to_string(),
            ));
        };
        map.insert("resource".to_string(), Value::String(resource.to_string()));

        let header = json!({
            "alg": "RS256",
            "jwk": &self.jwk,
        });
        let protected = json!({
            "alg": "RS256",
            "jwk": &self.jwk,
            "nonce": nonce,
        });

        let protected_b64 = base64url::encode(protected.to_string().as_bytes());
        let payload_b64 = base64url::encode(payload.to_string().as_bytes());

        let signing_input = format!("{}.{}", protected_b64, payload_b64);
        let signature = self.key.sign(signing_input.as_bytes())?;

        Ok(json!({
            "header": header,
            "protected": protected_b64,
            "payload": payload_b64,
            "signature": base64url::encode(&signature),
        }))
    }
}
