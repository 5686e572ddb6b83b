/// URL-safe base64 without padding, as the ACME wire format requires
use crate::error::{AcmeError, Result};
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

/// Encode bytes with URL-safe base64, padding stripped.
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe base64, re-padding to a multiple of 4 first.
pub fn decode(data: &str) -> Result<Vec<u8>> {
    let padded = match data.len() % 4 {
        2 => format!("{}==", data),
        3 => format!("{}=", data),
        _ => data.to_string(),
    };

    URL_SAFE
        .decode(&padded)
        .map_err(|e| AcmeError::crypto(format!("base64 decode error: {}", e)))
}
