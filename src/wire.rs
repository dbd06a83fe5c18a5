//! Request and response bodies of the account endpoints, plus the response envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Credential, deserialize_expiration};

/// The backend wraps payloads as `{"data": ...}`; bare payloads are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Body of `POST /account/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `POST /account/refresh-token`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub token: &'a str,
    pub refresh_token: &'a str,
}

/// Token material returned by login and refresh.
///
/// Login also lists the user's roles; refresh does not.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    pub refresh_token: String,
    #[serde(deserialize_with = "deserialize_expiration")]
    pub token_expiration: DateTime<Utc>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenGrant {
    /// Build the credential, taking roles from the grant or else from `fallback`.
    pub fn into_credential<I>(self, fallback: I) -> Credential
    where
        I: IntoIterator<Item = String>,
    {
        let roles: Vec<String> = if self.roles.is_empty() {
            fallback.into_iter().collect()
        } else {
            self.roles
        };
        Credential::new(self.token, self.refresh_token, self.token_expiration, roles)
    }
}
