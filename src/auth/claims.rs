use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Claim key under which the backend issues role membership.
pub const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Claims read from a bearer token's payload.
///
/// Nothing here is verified. These values gate what the UI offers; the backend
/// decides what the token is actually allowed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Option<String>, // `sub`
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>, // `exp`
    pub roles: BTreeSet<String>,
}

impl TokenClaims {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Structural problems with a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Segments(usize),

    #[error("{segment} segment is not base64url: {source}")]
    Base64 {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("token contains characters not allowed in a header")]
    InvalidHeader,
}

/// Decodes (never verifies) bearer tokens.
#[derive(Debug, Clone)]
pub struct ClaimDecoder {
    role_claim: String,
}

impl Default for ClaimDecoder {
    fn default() -> Self {
        Self::new(ROLE_CLAIM)
    }
}

impl ClaimDecoder {
    pub fn new(role_claim: impl Into<String>) -> Self {
        Self {
            role_claim: role_claim.into(),
        }
    }

    #[must_use]
    pub fn role_claim(&self) -> &str {
        &self.role_claim
    }

    pub fn decode(&self, token: &str) -> Result<TokenClaims, DecodeError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, _signature] = segments.as_slice() else {
            return Err(DecodeError::Segments(segments.len()));
        };

        decode_segment("header", header)?;
        let payload = decode_segment("payload", payload)?;
        let Value::Object(claims) = serde_json::from_slice::<Value>(&payload)? else {
            return Err(DecodeError::NotAnObject);
        };

        Ok(TokenClaims {
            subject: string_claim(&claims, "sub"),
            name: string_claim(&claims, "name")
                .or_else(|| string_claim(&claims, "unique_name")),
            expires_at: claims
                .get("exp")
                .and_then(Value::as_i64)
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            roles: extract_roles(claims.get(&self.role_claim)),
        })
    }
}

fn decode_segment(segment: &'static str, raw: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|source| DecodeError::Base64 { segment, source })
}

fn string_claim(claims: &Map<String, Value>, key: &str) -> Option<String> {
    claims.get(key).and_then(Value::as_str).map(str::to_string)
}

// A single role arrives as a bare string, several as an array.
fn extract_roles(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::String(role)) => BTreeSet::from([role.clone()]),
        Some(Value::Array(roles)) => roles
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}
