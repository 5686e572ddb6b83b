//! Key material, JWK serialization and JWS signing

pub mod jwk;
pub mod jws;
pub mod keys;

pub use jwk::Jwk;
pub use jws::JwsSigner;
pub use keys::{KeyAlgorithm, KeyMaterial};
