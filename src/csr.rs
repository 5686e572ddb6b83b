//! PKCS#10 request construction from DER primitives.
//!
//! The CA only sees DER, so the request is assembled byte by byte: CN-only
//! subject, critical KeyUsage, extended key usage by OID (friendly names
//! are locale-dependent), the SubjectAltName list, and optionally the
//! OCSP-must-staple TLS-feature extension. Renewals inherit their shape
//! from the prior certificate.

use crate::crypto::{KeyAlgorithm, KeyMaterial};
use crate::encoding::der;
use crate::error::{AcmeError, Result};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;

const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
const OID_EXTENSION_REQUEST: &[u64] = &[1, 2, 840, 113549, 1, 9, 14];
const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
const OID_EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];
const OID_SERVER_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 1];
const OID_CLIENT_AUTH: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 3, 2];
const OID_SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
const OID_TLS_FEATURE: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 24];
const OID_SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
const OID_ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
const OID_ECDSA_WITH_SHA384: &[u64] = &[1, 2, 840, 10045, 4, 3, 3];

/// OID of the TLS-feature (OCSP must-staple) extension, dotted form.
pub const TLS_FEATURE_OID: &str = "1.3.6.1.5.5.7.1.24";

/// What goes into a certificate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrParams {
    /// The CN, distinct from every SAN entry
    pub primary: String,
    /// Additional DNS names
    pub sans: Vec<String>,
    /// Include the OCSP-must-staple extension
    pub must_staple: bool,
}

impl CsrParams {
    pub fn new(primary: impl Into<String>, sans: Vec<String>) -> Self {
        let primary = primary.into();
        let sans = sans.into_iter().filter(|s| *s != primary).collect();
        Self {
            primary,
            sans,
            must_staple: false,
        }
    }

    pub fn with_must_staple(mut self, must_staple: bool) -> Self {
        self.must_staple = must_staple;
        self
    }

    /// Every DNS name the certificate will carry, primary first.
    pub fn dns_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(1 + self.sans.len());
        names.push(self.primary.as_str());
        names.extend(self.sans.iter().map(|s| s.as_str()));
        names
    }

    /// Renewal parameters inherited from a prior certificate: subject CN,
    /// SAN list and must-staple presence.
    pub fn from_certificate(cert: &X509Certificate<'_>) -> Result<Self> {
        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push(dns.to_string());
                }
            }
        }

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(|s| s.to_string());

        let primary = common_name
            .or_else(|| dns_names.first().cloned())
            .ok_or_else(|| {
                AcmeError::crypto("prior certificate carries no usable subject".to_string())
            })?;
        let sans = dns_names.into_iter().filter(|d| *d != primary).collect();

        let must_staple = cert
            .extensions()
            .iter()
            .any(|ext| ext.oid.to_id_string() == TLS_FEATURE_OID);

        Ok(Self {
            primary,
            sans,
            must_staple,
        })
    }
}

/// Build and sign the PKCS#10 request for the given key.
pub fn build(params: &CsrParams, key: &KeyMaterial) -> Result<Vec<u8>> {
    // Subject: one RDN holding CN=<primary>
    let mut cn = der::oid(OID_COMMON_NAME);
    cn.extend(der::utf8_string(&params.primary));
    let subject = der::sequence(&der::set(&der::sequence(&cn)));

    let attributes = der::context(0, &extension_request(params));

    let mut info = der::integer(&[0]);
    info.extend(subject);
    info.extend(key.spki_der());
    info.extend(attributes);
    let info = der::sequence(&info);

    let signature = key.sign(&info)?;

    let algorithm = match key.algorithm() {
        KeyAlgorithm::Rsa(_) => {
            let mut alg = der::oid(OID_SHA256_WITH_RSA);
            alg.extend(der::null());
            der::sequence(&alg)
        }
        KeyAlgorithm::EcdsaP256 => der::sequence(&der::oid(OID_ECDSA_WITH_SHA256)),
        KeyAlgorithm::EcdsaP384 => der::sequence(&der::oid(OID_ECDSA_WITH_SHA384)),
    };

    let mut request = info;
    request.extend(algorithm);
    request.extend(der::bit_string(&signature));
    Ok(der::sequence(&request))
}

fn extension_request(params: &CsrParams) -> Vec<u8> {
    let mut extensions = Vec::new();

    // KeyUsage (critical): digitalSignature + keyEncipherment
    extensions.extend(extension(
        OID_KEY_USAGE,
        true,
        &der::bit_string_with_unused(5, &[0xa0]),
    ));

    let mut eku = der::oid(OID_SERVER_AUTH);
    eku.extend(der::oid(OID_CLIENT_AUTH));
    extensions.extend(extension(OID_EXT_KEY_USAGE, false, &der::sequence(&eku)));

    let mut names = Vec::new();
    for name in params.dns_names() {
        names.extend(der::context_primitive(2, name.as_bytes()));
    }
    extensions.extend(extension(
        OID_SUBJECT_ALT_NAME,
        false,
        &der::sequence(&names),
    ));

    if params.must_staple {
        // TLS feature: SEQUENCE(INTEGER(5)) = status_request
        extensions.extend(extension(
            OID_TLS_FEATURE,
            false,
            &der::sequence(&der::integer(&[5])),
        ));
    }

    let mut attribute = der::oid(OID_EXTENSION_REQUEST);
    attribute.extend(der::set(&der::sequence(&extensions)));
    der::sequence(&attribute)
}

fn extension(oid_arcs: &[u64], critical: bool, value: &[u8]) -> Vec<u8> {
    let mut ext = der::oid(oid_arcs);
    if critical {
        ext.extend(der::boolean(true));
    }
    ext.extend(der::octet_string(value));
    der::sequence(&ext)
}
