/// JSON Web Key for the RSA account key, with RFC 7638 thumbprints
use crate::crypto::keys::KeyMaterial;
use crate::encoding::base64url;
use crate::error::{AcmeError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// RSA public key in JWK form.
///
/// Field order matters: serialization must produce the canonical
/// `{"e":...,"kty":...,"n":...}` member order the thumbprint is defined
/// over, so the struct declares its fields in exactly that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Public exponent, base64url
    pub e: String,
    /// Key type, always "RSA" here
    pub kty: String,
    /// Modulus, base64url
    pub n: String,
}

impl Jwk {
    /// Build the JWK for an account key. The account key is always RSA.
    pub fn from_key(key: &KeyMaterial) -> Result<Self> {
        let (n, e) = key.rsa_components().ok_or_else(|| {
            AcmeError::crypto("account keys must be RSA for RS256 signing".to_string())
        })?;

        Ok(Self {
            e: base64url::encode(&e),
            kty: "RSA".to_string(),
            n: base64url::encode(&n),
        })
    }

    /// RFC 7638 thumbprint: SHA-256 over the canonical JSON, base64url.
    pub fn thumbprint(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(base64url::encode(&digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyAlgorithm;

    #[test]
    fn test_canonical_member_order() {
        let jwk = Jwk {
            e: "AQAB".into(),
            kty: "RSA".into(),
            n: "AAAA".into(),
        };
        assert_eq!(
            serde_json::to_string(&jwk).unwrap(),
            r#"{"e":"AQAB","kty":"RSA","n":"AAAA"}"#
        );
    }

    #[test]
    fn test_thumbprint_known_vector() {
        // RFC 7638 §3.1 example key
        let jwk = Jwk {
            e: "AQAB".into(),
            kty: "RSA".into(),
            n: "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw".into(),
        };
        assert_eq!(
            jwk.thumbprint().unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn test_thumbprint_is_stable_across_calls() {
        let key = KeyMaterial::generate(KeyAlgorithm::Rsa(2048)).unwrap();
        let jwk = Jwk::from_key(&key).unwrap();
        assert_eq!(jwk.thumbprint().unwrap(), jwk.thumbprint().unwrap());
    }

    #[test]
    fn test_rejects_ec_account_keys() {
        let key = KeyMaterial::generate(KeyAlgorithm::EcdsaP256).unwrap();
        assert!(Jwk::from_key(&key).is_err());
    }
}
