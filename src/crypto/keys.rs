//! Key algorithms and private-key material.
//!
//! The account key is always RSA; certificate keys may be RSA or ECDSA on
//! P-256/P-384. Private keys serialize through the crate's own DER encoder
//! (PKCS#1 for RSA, RFC 5915 for EC) so the on-disk format is stable and
//! readable by standard tooling.

use crate::encoding::{der, pem};
use crate::error::{AcmeError, Result};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::BigUint;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use sha2::Sha256;

const OID_RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113549, 1, 1, 1];
const OID_EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10045, 2, 1];
const OID_SECP256R1: &[u64] = &[1, 2, 840, 10045, 3, 1, 7];
const OID_SECP384R1: &[u64] = &[1, 3, 132, 0, 34];

/// Supported key algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size in bits
    Rsa(u32),
    /// ECDSA over P-256 (size fixed at 256)
    EcdsaP256,
    /// ECDSA over P-384 (size fixed at 384)
    EcdsaP384,
}

impl KeyAlgorithm {
    /// Validate configuration constraints (RSA size bounds and granularity).
    pub fn validate(&self) -> Result<()> {
        if let KeyAlgorithm::Rsa(bits) = self {
            if !(2048..=4096).contains(bits) || bits % 64 != 0 {
                return Err(AcmeError::configuration(format!(
                    "RSA key size must be a multiple of 64 in 2048..4096, got {}",
                    bits
                )));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ecdsa-p256" => Ok(KeyAlgorithm::EcdsaP256),
            "ecdsa-p384" => Ok(KeyAlgorithm::EcdsaP384),
            other => {
                let bits = other
                    .strip_prefix("rsa-")
                    .and_then(|b| b.parse::<u32>().ok())
                    .ok_or_else(|| format!("unknown key algorithm: {}", other))?;
                let alg = KeyAlgorithm::Rsa(bits);
                alg.validate().map_err(|e| e.to_string())?;
                Ok(alg)
            }
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAlgorithm::Rsa(bits) => write!(f, "rsa-{}", bits),
            KeyAlgorithm::EcdsaP256 => write!(f, "ecdsa-p256"),
            KeyAlgorithm::EcdsaP384 => write!(f, "ecdsa-p384"),
        }
    }
}

/// Private-key material for one named keystore entry
#[derive(Clone)]
pub enum KeyMaterial {
    /// RSA private key
    Rsa(rsa::RsaPrivateKey),
    /// P-256 private key
    P256(p256::SecretKey),
    /// P-384 private key
    P384(p384::SecretKey),
}

impl KeyMaterial {
    /// Generate a fresh key of the given algorithm.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        algorithm.validate()?;
        let mut rng = rand::rngs::OsRng;
        match algorithm {
            KeyAlgorithm::Rsa(bits) => {
                let key = rsa::RsaPrivateKey::new(&mut rng, bits as usize)
                    .map_err(|e| AcmeError::crypto(format!("RSA key generation failed: {}", e)))?;
                Ok(KeyMaterial::Rsa(key))
            }
            KeyAlgorithm::EcdsaP256 => Ok(KeyMaterial::P256(p256::SecretKey::random(&mut rng))),
            KeyAlgorithm::EcdsaP384 => Ok(KeyMaterial::P384(p384::SecretKey::random(&mut rng))),
        }
    }

    /// The algorithm of this key, RSA size included.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyMaterial::Rsa(key) => KeyAlgorithm::Rsa((key.size() * 8) as u32),
            KeyMaterial::P256(_) => KeyAlgorithm::EcdsaP256,
            KeyMaterial::P384(_) => KeyAlgorithm::EcdsaP384,
        }
    }

    /// Sign a message: PKCS#1 v1.5 SHA-256 for RSA, DER-encoded ECDSA with
    /// the curve-matched digest for EC keys.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyMaterial::Rsa(key) => {
                let signer = SigningKey::<Sha256>::new(key.clone());
                let signature = signer
                    .try_sign(message)
                    .map_err(|e| AcmeError::crypto(format!("RSA signing failed: {}", e)))?;
                Ok(signature.to_vec())
            }
            KeyMaterial::P256(key) => {
                let signer = p256::ecdsa::SigningKey::from(key.clone());
                let signature: p256::ecdsa::Signature = signer
                    .try_sign(message)
                    .map_err(|e| AcmeError::crypto(format!("ECDSA signing failed: {}", e)))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyMaterial::P384(key) => {
                let signer = p384::ecdsa::SigningKey::from(key.clone());
                let signature: p384::ecdsa::Signature = signer
                    .try_sign(message)
                    .map_err(|e| AcmeError::crypto(format!("ECDSA signing failed: {}", e)))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    /// Private key body in DER: PKCS#1 for RSA, RFC 5915 for EC.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        match self {
            KeyMaterial::Rsa(key) => rsa_pkcs1_der(key),
            KeyMaterial::P256(key) => {
                let point = key.public_key().to_encoded_point(false);
                Ok(ec_private_key_der(
                    key.to_bytes().as_slice(),
                    OID_SECP256R1,
                    point.as_bytes(),
                ))
            }
            KeyMaterial::P384(key) => {
                let point = key.public_key().to_encoded_point(false);
                Ok(ec_private_key_der(
                    key.to_bytes().as_slice(),
                    OID_SECP384R1,
                    point.as_bytes(),
                ))
            }
        }
    }

    /// Private key as a PEM block with the label matching the body format.
    pub fn to_pem(&self) -> Result<String> {
        let der = self.to_der()?;
        let label = match self {
            KeyMaterial::Rsa(_) => pem::RSA_PRIVATE_KEY,
            KeyMaterial::P256(_) | KeyMaterial::P384(_) => pem::EC_PRIVATE_KEY,
        };
        Ok(pem::frame(label, &der))
    }

    /// Parse key material back from its PEM form.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let block = ::pem::parse(pem_text)
            .map_err(|e| AcmeError::keystore(format!("key PEM parse error: {}", e)))?;

        match block.tag() {
            pem::RSA_PRIVATE_KEY => {
                let key = rsa::RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(|e| AcmeError::keystore(format!("invalid RSA key: {}", e)))?;
                Ok(KeyMaterial::Rsa(key))
            }
            pem::EC_PRIVATE_KEY => {
                if let Ok(key) = p256::SecretKey::from_sec1_der(block.contents()) {
                    return Ok(KeyMaterial::P256(key));
                }
                if let Ok(key) = p384::SecretKey::from_sec1_der(block.contents()) {
                    return Ok(KeyMaterial::P384(key));
                }
                Err(AcmeError::keystore(
                    "EC key is on an unsupported curve".to_string(),
                ))
            }
            other => Err(AcmeError::keystore(format!(
                "unsupported key PEM label: {}",
                other
            ))),
        }
    }

    /// SubjectPublicKeyInfo for this key, as embedded in a CSR.
    pub fn spki_der(&self) -> Vec<u8> {
        match self {
            KeyMaterial::Rsa(key) => {
                let mut rsa_key = Vec::new();
                rsa_key.extend(der::integer(&key.n().to_bytes_be()));
                rsa_key.extend(der::integer(&key.e().to_bytes_be()));

                let mut alg = der::oid(OID_RSA_ENCRYPTION);
                alg.extend(der::null());

                let mut spki = der::sequence(&alg);
                spki.extend(der::bit_string(&der::sequence(&rsa_key)));
                der::sequence(&spki)
            }
            KeyMaterial::P256(key) => {
                let point = key.public_key().to_encoded_point(false);
                ec_spki(OID_SECP256R1, point.as_bytes())
            }
            KeyMaterial::P384(key) => {
                let point = key.public_key().to_encoded_point(false);
                ec_spki(OID_SECP384R1, point.as_bytes())
            }
        }
    }

    /// RSA public components (n, e) as big-endian bytes, for JWK building.
    pub fn rsa_components(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            KeyMaterial::Rsa(key) => Some((key.n().to_bytes_be(), key.e().to_bytes_be())),
            _ => None,
        }
    }
}

/// PKCS#1 RSAPrivateKey: SEQUENCE of version, n, e, d, p, q, dp, dq, qinv.
fn rsa_pkcs1_der(key: &rsa::RsaPrivateKey) -> Result<Vec<u8>> {
    let primes = key.primes();
    if primes.len() != 2 {
        return Err(AcmeError::crypto(format!(
            "expected a two-prime RSA key, got {} primes",
            primes.len()
        )));
    }

    let one = BigUint::from(1u32);
    let two = BigUint::from(2u32);
    let p = &primes[0];
    let q = &primes[1];
    let dp = key.d() % &(p - &one);
    let dq = key.d() % &(q - &one);
    // p is prime, so Fermat gives the inverse of q mod p
    let qinv = q.modpow(&(p - &two), p);

    let mut body = der::integer(&[0]);
    for part in [
        key.n().to_bytes_be(),
        key.e().to_bytes_be(),
        key.d().to_bytes_be(),
        p.to_bytes_be(),
        q.to_bytes_be(),
        dp.to_bytes_be(),
        dq.to_bytes_be(),
        qinv.to_bytes_be(),
    ] {
        body.extend(der::integer(&part));
    }

    Ok(der::sequence(&body))
}

/// RFC 5915 ECPrivateKey with a named curve and the uncompressed public point.
fn ec_private_key_der(d: &[u8], curve: &[u64], point: &[u8]) -> Vec<u8> {
    let mut body = der::integer(&[1]);
    body.extend(der::octet_string(d));
    body.extend(der::context(0, &der::oid(curve)));
    body.extend(der::context(1, &der::bit_string(point)));
    der::sequence(&body)
}

fn ec_spki(curve: &[u64], point: &[u8]) -> Vec<u8> {
    let mut alg = der::oid(OID_EC_PUBLIC_KEY);
    alg.extend(der::oid(curve));

    let mut spki = der::sequence(&alg);
    spki.extend(der::bit_string(point));
    der::sequence(&spki)
}
