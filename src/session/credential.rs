//! The credential held for the current session.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Deserializer, Serialize};

/// Token material of an authenticated session.
///
/// Serialized with the same four keys the portal keeps in its key-value store,
/// so a persisted file reads like the browser's storage did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token attached to protected calls.
    #[serde(rename = "token")]
    pub access_token: String,
    /// Token exchanged at the refresh endpoint.
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    /// Absolute expiry of `access_token`.
    #[serde(
        rename = "tokenExpiration",
        deserialize_with = "deserialize_expiration"
    )]
    pub expires_at: DateTime<Utc>,
    /// Role names, used for coarse UI gating only.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        roles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `now` is past the recorded expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// `Authorization` header value for this credential.
    pub fn authorization(&self) -> Option<HeaderValue> {
        bearer_header(&self.access_token)
    }
}

/// Build `Bearer <token>`, marked sensitive so it never shows up in debug output.
///
/// Returns `None` when the token contains bytes that are not valid in a header.
pub fn bearer_header(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Parse a token expiration as sent by the backend.
///
/// RFC 3339 is preferred; zone-less ISO timestamps (`2025-03-01T10:00:00`,
/// optionally with fractional seconds) are read as UTC.
pub fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize_expiration<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expiration(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized token expiration '{raw}'")))
}
