//! Encoding primitives: URL-safe base64, minimal DER, PEM framing

pub mod base64url;
pub mod der;
pub mod pem;
