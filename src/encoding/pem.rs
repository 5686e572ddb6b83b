/// PEM framing: 64-column standard base64 between BEGIN/END fences
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Label for certificates
pub const CERTIFICATE: &str = "CERTIFICATE";
/// Label for PKCS#1 RSA private keys
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
/// Label for RFC 5915 EC private keys
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";

/// Frame DER bytes as a PEM block with the given label.
pub fn frame(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / 64 + 2 * label.len() + 40);

    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n");

    let mut start = 0;
    while start < body.len() {
        let end = (start + 64).min(body.len());
        out.push_str(&body[start..end]);
        out.push('\n');
        start = end;
    }

    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}
