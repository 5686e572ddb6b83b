/// Common wire types for the ACME protocol
use serde::{Deserialize, Serialize};

/// Identifier for a domain authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Type: always "dns" for this client
    #[serde(rename = "type")]
    pub id_type: String,
    /// Domain name
    pub value: String,
}

impl Identifier {
    /// Create a DNS identifier
    pub fn dns(domain: impl Into<String>) -> Self {
        Self {
            id_type: "dns".to_string(),
            value: domain.into(),
        }
    }
}

/// Challenge type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    /// HTTP-01 challenge (well-known file)
    Http01,
    /// DNS-01 challenge (TXT record)
    Dns01,
}

impl ChallengeType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Http01 => "http-01",
            ChallengeType::Dns01 => "dns-01",
        }
    }
}

impl std::str::FromStr for ChallengeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "http-01" => Ok(ChallengeType::Http01),
            "dns-01" => Ok(ChallengeType::Dns01),
            _ => Err(format!("unknown challenge type: {}", s)),
        }
    }
}

impl std::fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Challenge offered inside an authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Challenge type (http-01, dns-01, ...)
    #[serde(rename = "type")]
    pub challenge_type: String,

    /// Challenge URL. Legacy dialects call this field `uri`.
    #[serde(alias = "uri")]
    pub url: String,

    /// Challenge status
    pub status: String,

    /// Token for the key authorization
    #[serde(default)]
    pub token: String,

    /// Error information if validation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Problem>,
}

impl Challenge {
    /// Human-readable failure detail, falling back to the raw status.
    pub fn failure_detail(&self) -> String {
        self.error
            .as_ref()
            .and_then(|p| p.detail.clone())
            .unwrap_or_else(|| format!("status {}", self.status))
    }
}

/// Authorization for one identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    /// The identifier being authorized
    pub identifier: Identifier,

    /// Authorization status
    #[serde(default)]
    pub status: String,

    /// Expiration timestamp, when the server sends one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    /// Challenges offered by the CA
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// Find the challenge with the given type
    pub fn challenge(&self, challenge_type: ChallengeType) -> Option<&Challenge> {
        self.challenges
            .iter()
            .find(|c| c.challenge_type == challenge_type.as_str())
    }

    /// True when any offered challenge already validated (cached authorization)
    pub fn has_valid_challenge(&self) -> bool {
        self.challenges.iter().any(|c| c.status == "valid")
    }
}

/// ACME problem document (RFC 7807 subset the legacy dialect uses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Problem type URN
    #[serde(rename = "type", default)]
    pub problem_type: String,

    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// HTTP status code echoed in the body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Problem {
    /// The portion of the type URN after the last `:`.
    pub fn kind(&self) -> &str {
        self.problem_type
            .rsplit(':')
            .next()
            .unwrap_or(self.problem_type.as_str())
    }
}
