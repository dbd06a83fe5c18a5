//! Authenticated request gateway.
//!
//! Every protected call to the portal backend goes through [`SessionGateway::send`],
//! which wraps the transport with two interceptors:
//!
//! - **Outbound**: rejects the call locally when the stored credential is
//!   expired, undecodable, or lacks the role the call requires; otherwise
//!   attaches `Authorization: Bearer <token>`.
//! - **Inbound**: on a 401 runs (or joins) a single coordinated token refresh and
//!   replays the request once; on a 403 redirects to the unauthorized route;
//!   passes everything else through.
//!
//! # Example
//!
//! ```rust,no_run
//! use water_portal_gateway::gateway::{ApiRequest, SessionGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = SessionGateway::builder("http://localhost:5000/api").build().await?;
//! gateway.login("operator", "secret").await?;
//!
//! let response = gateway.send(ApiRequest::get("/report")).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
mod request;

pub use coordinator::{
    Admission, RefreshCoordinator, RefreshFailure, RefreshLease, RefreshOutcome, WaitTicket,
};
pub use request::{ApiRequest, RequestOptions};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::auth::gate::missing_role;
use crate::auth::{Access, ClaimDecoder, DecodeError, ROLE_CLAIM, TokenClaims, check_access};
use crate::error::{GatewayError, Result};
use crate::navigation::{Navigator, Route, TracingNavigator};
use crate::session::{Credential, CredentialStorage, CredentialStore, MemoryStorage, StorageError};
use crate::wire::{Envelope, LoginRequest, RefreshRequest, TokenGrant};

/// Default deadline for the refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint paths and policy knobs of a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub login_path: String,
    pub refresh_path: String,
    /// Role required by calls that don't declare their own requirement.
    pub required_role: Option<String>,
    /// Claim key holding role membership.
    pub role_claim: String,
    /// Deadline for the refresh exchange; `None` waits as long as the transport does.
    pub refresh_timeout: Option<Duration>,
    /// Transport timeout applied to every call.
    pub request_timeout: Option<Duration>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            login_path: "/account/login".to_string(),
            refresh_path: "/account/refresh-token".to_string(),
            required_role: Some("Admin".to_string()),
            role_claim: ROLE_CLAIM.to_string(),
            refresh_timeout: Some(DEFAULT_REFRESH_TIMEOUT),
            request_timeout: None,
        }
    }
}

/// Builder for [`SessionGateway`].
#[derive(Debug)]
pub struct GatewayBuilder {
    base_url: String,
    settings: GatewaySettings,
    storage: Option<Arc<dyn CredentialStorage>>,
    navigator: Option<Arc<dyn Navigator>>,
    http: Option<reqwest::Client>,
}

impl GatewayBuilder {
    #[must_use]
    pub fn settings(mut self, settings: GatewaySettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Use a preconfigured reqwest client. `request_timeout` is then ignored.
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn required_role(mut self, role: Option<&str>) -> Self {
        self.settings.required_role = role.map(str::to_string);
        self
    }

    #[must_use]
    pub fn refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.refresh_timeout = timeout;
        self
    }

    pub async fn build(self) -> Result<SessionGateway> {
        let base_url = Url::parse(&self.base_url)?;
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = self.settings.request_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(TracingNavigator::default()));
        let store = CredentialStore::open(storage, navigator).await?;

        Ok(SessionGateway {
            inner: Arc::new(GatewayInner {
                base_url,
                http,
                store,
                decoder: ClaimDecoder::new(self.settings.role_claim.clone()),
                coordinator: RefreshCoordinator::new(),
                settings: self.settings,
            }),
        })
    }
}

/// Authenticated HTTP client for the portal backend.
///
/// Cheap to clone; clones share the credential store and the refresh
/// coordinator. Separate gateways (separate `build` calls) share nothing.
#[derive(Debug, Clone)]
pub struct SessionGateway {
    inner: Arc<GatewayInner>,
}

#[derive(Debug)]
struct GatewayInner {
    base_url: Url,
    http: reqwest::Client,
    store: CredentialStore,
    decoder: ClaimDecoder,
    coordinator: RefreshCoordinator,
    settings: GatewaySettings,
}

enum Inbound {
    Deliver(reqwest::Response),
    Replay,
}

impl SessionGateway {
    /// Start building a gateway for the backend at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> GatewayBuilder {
        GatewayBuilder {
            base_url: base_url.into(),
            settings: GatewaySettings::default(),
            storage: None,
            navigator: None,
            http: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.inner.settings
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange username and password for a credential and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        let request = ApiRequest::post(self.inner.settings.login_path.clone())
            .public()
            .json(&LoginRequest { username, password })?;
        let grant: TokenGrant = self.send_json(request).await?;

        let claimed: Vec<String> = self
            .inner
            .decoder
            .decode(&grant.token)
            .map(|claims| claims.roles.into_iter().collect())
            .unwrap_or_default();
        let credential = grant.into_credential(claimed);
        if credential.roles.is_empty() {
            return Err(GatewayError::MissingRoles);
        }

        self.inner.store.set(credential.clone()).await?;
        tracing::info!(
            name: "session.login",
            username = %username,
            roles = ?credential.roles,
            expires_at = %credential.expires_at,
            "Logged in"
        );
        Ok(credential)
    }

    /// End the session: clears the credential and redirects to login.
    pub async fn logout(&self) -> Result<()> {
        self.inner.store.clear().await?;
        Ok(())
    }

    /// Current credential, if any.
    pub async fn session(&self) -> Result<Option<Credential>> {
        Ok(self.inner.store.get().await?)
    }

    /// Claims decoded from the current access token, for UI gating.
    pub async fn claims(&self) -> Result<Option<TokenClaims>> {
        match self.inner.store.get().await? {
            Some(credential) => Ok(Some(self.inner.decoder.decode(&credential.access_token)?)),
            None => Ok(None),
        }
    }

    /// Route guard for a page restricted to `allowed_roles`; redirects when denied.
    pub async fn guard(&self, allowed_roles: &[&str]) -> Result<Access> {
        let credential = self.inner.store.get().await?;
        let access = check_access(credential.as_ref(), allowed_roles);
        if let Access::Redirect(route) = access {
            self.inner.store.navigator().navigate(route);
        }
        Ok(access)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request pipeline
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a request through both interceptors.
    ///
    /// Success responses are returned untouched. A request is replayed at most
    /// once, after a refresh round or when a newer credential appeared while it
    /// was in flight.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4();
        let mut request = request;
        loop {
            let authorization = self.outbound(&request, request_id).await?;
            let sent_with = authorization.as_ref().map(|(token, _)| token.clone());
            let response = self
                .transmit(&request, request_id, authorization.map(|(_, header)| header))
                .await?;
            match self
                .inbound(&mut request, request_id, sent_with.as_deref(), response)
                .await?
            {
                Inbound::Deliver(response) => return Ok(response),
                Inbound::Replay => {
                    tracing::debug!(
                        name: "gateway.request.replay",
                        request_id = %request_id,
                        path = %request.path,
                        "Replaying request with current credential"
                    );
                }
            }
        }
    }

    /// Send and decode a `{"data": ...}` (or bare) JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<Envelope<T>>(&bytes)?.into_inner())
    }

    /// Send and discard the response body.
    pub async fn send_empty(&self, request: ApiRequest) -> Result<()> {
        self.send(request).await.map(drop)
    }

    /// Outbound interceptor. Returns the token and header to attach, if any.
    async fn outbound(
        &self,
        request: &ApiRequest,
        request_id: Uuid,
    ) -> Result<Option<(String, HeaderValue)>> {
        if request.options.public {
            return Ok(None);
        }

        let credential = match self.inner.store.get().await {
            Ok(credential) => credential,
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(
                    name: "gateway.session.corrupt",
                    request_id = %request_id,
                    error = %e,
                    "Persisted credential is corrupt"
                );
                self.end_session().await;
                return Err(StorageError::Corrupt(e).into());
            }
            Err(e) => return Err(e.into()),
        };
        let Some(credential) = credential else {
            return Ok(None);
        };

        if credential.is_expired_at(Utc::now()) {
            tracing::info!(
                name: "gateway.session.expired",
                request_id = %request_id,
                path = %request.path,
                expired_at = %credential.expires_at,
                "Session expired; request not sent"
            );
            self.end_session().await;
            return Err(GatewayError::SessionExpired {
                expired_at: credential.expires_at,
            });
        }

        let claims = match self.inner.decoder.decode(&credential.access_token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(
                    name: "gateway.token.undecodable",
                    request_id = %request_id,
                    error = %e,
                    "Stored access token is malformed"
                );
                self.end_session().await;
                return Err(e.into());
            }
        };

        let required = request
            .options
            .role
            .resolve(self.inner.settings.required_role.as_deref());
        if let Some(role) = missing_role(&claims, required) {
            tracing::warn!(
                name: "gateway.role.denied",
                request_id = %request_id,
                path = %request.path,
                required_role = %role,
                "Access denied: required role missing"
            );
            self.inner.store.navigator().navigate(Route::Unauthorized);
            return Err(GatewayError::Forbidden {
                required_role: role.to_string(),
            });
        }

        let header = match self.inner.store.authorization_header().await {
            Some(default) if carries_token(&default, &credential.access_token) => Some(default),
            _ => credential.authorization(),
        };
        let Some(header) = header else {
            tracing::warn!(
                name: "gateway.token.undecodable",
                request_id = %request_id,
                error = %DecodeError::InvalidHeader,
                "Stored access token cannot be sent as a header"
            );
            self.end_session().await;
            return Err(DecodeError::InvalidHeader.into());
        };
        Ok(Some((credential.access_token, header)))
    }

    async fn transmit(
        &self,
        request: &ApiRequest,
        request_id: Uuid,
        authorization: Option<HeaderValue>,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(&request.path)?;
        let mut builder = self.inner.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let authenticated = authorization.is_some();
        if let Some(header) = authorization {
            builder = builder.header(AUTHORIZATION, header);
        }

        tracing::debug!(
            name: "gateway.request.sent",
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            authenticated,
            retried = request.retried,
            "Sending request"
        );

        builder.send().await.map_err(|e| {
            tracing::warn!(
                name: "gateway.request.transport_error",
                request_id = %request_id,
                path = %request.path,
                error = %e,
                "Transport failure"
            );
            GatewayError::Http(e)
        })
    }

    /// Inbound interceptor.
    async fn inbound(
        &self,
        request: &mut ApiRequest,
        request_id: Uuid,
        sent_with: Option<&str>,
        response: reqwest::Response,
    ) -> Result<Inbound> {
        let status = response.status();
        if status.is_success() {
            return Ok(Inbound::Deliver(response));
        }

        if status == StatusCode::UNAUTHORIZED && !request.retried && !request.options.public {
            if let Some(current) = self.inner.store.get().await? {
                // Marked before any refresh is awaited: a 401 on the replay
                // must propagate instead of starting another round.
                request.retried = true;

                if sent_with != Some(current.access_token.as_str()) {
                    tracing::debug!(
                        name: "gateway.refresh.skipped",
                        request_id = %request_id,
                        "Credential changed while request was in flight"
                    );
                    return Ok(Inbound::Replay);
                }

                self.refresh_round(request_id).await?;
                return Ok(Inbound::Replay);
            }
        }

        if status == StatusCode::FORBIDDEN && request.options.redirect_on_forbidden {
            tracing::warn!(
                name: "gateway.response.forbidden",
                request_id = %request_id,
                path = %request.path,
                "Server denied access"
            );
            self.inner.store.navigator().navigate(Route::Unauthorized);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        tracing::debug!(
            name: "gateway.response.error",
            request_id = %request_id,
            path = %request.path,
            status = status.as_u16(),
            "Propagating error response"
        );
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Lead or join the refresh round; resolves once the round has settled.
    ///
    /// A waiter whose leader was cancelled asks for admission again, so one of
    /// the remaining waiters takes over the exchange.
    async fn refresh_round(&self, request_id: Uuid) -> Result<Credential> {
        loop {
            let ticket = match self.inner.coordinator.admit(request_id) {
                Admission::Leader(lease) => return self.lead_refresh(lease, request_id).await,
                Admission::Waiter(ticket) => ticket,
            };
            match ticket.wait().await {
                Err(RefreshFailure::Abandoned) => {
                    tracing::debug!(
                        name: "gateway.refresh.readmitted",
                        request_id = %request_id,
                        "Refresh leader went away; asking for admission again"
                    );
                }
                outcome => return Ok(outcome?),
            }
        }
    }

    async fn lead_refresh(&self, lease: RefreshLease<'_>, request_id: Uuid) -> Result<Credential> {
        tracing::info!(
            name: "gateway.refresh.started",
            request_id = %request_id,
            "Refreshing access token"
        );
        let outcome = self.refresh_exchange().await;
        if let Err(failure) = &outcome {
            tracing::warn!(
                name: "gateway.refresh.failed",
                request_id = %request_id,
                error = %failure,
                "Token refresh failed; ending session"
            );
            self.end_session().await;
        }
        let resumed = lease.settle(&outcome);
        tracing::info!(
            name: "gateway.refresh.settled",
            request_id = %request_id,
            success = outcome.is_ok(),
            waiters = resumed,
            "Refresh round settled"
        );
        Ok(outcome?)
    }

    async fn refresh_exchange(&self) -> RefreshOutcome {
        match self.inner.settings.refresh_timeout {
            Some(limit) => tokio::time::timeout(limit, self.request_refresh())
                .await
                .unwrap_or(Err(RefreshFailure::TimedOut(limit))),
            None => self.request_refresh().await,
        }
    }

    // Sent straight on the transport: the refresh call never goes through the
    // interceptors, so its own 401 cannot re-enter the refresh branch.
    async fn request_refresh(&self) -> RefreshOutcome {
        let current = self
            .inner
            .store
            .get()
            .await
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?
            .ok_or(RefreshFailure::MissingCredential)?;
        let url = self
            .endpoint(&self.inner.settings.refresh_path)
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let response = self
            .inner
            .http
            .post(url)
            .json(&RefreshRequest {
                token: &current.access_token,
                refresh_token: &current.refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
        let grant = serde_json::from_slice::<Envelope<TokenGrant>>(&bytes)
            .map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?
            .into_inner();

        let roles: Vec<String> = match self.inner.decoder.decode(&grant.token) {
            Ok(claims) if !claims.roles.is_empty() => claims.roles.into_iter().collect(),
            _ => current.roles.into_iter().collect(),
        };
        let credential = grant.into_credential(roles);
        self.inner
            .store
            .set(credential.clone())
            .await
            .map_err(|e| RefreshFailure::Storage(e.to_string()))?;
        Ok(credential)
    }

    async fn end_session(&self) {
        if let Err(e) = self.inner.store.clear().await {
            tracing::warn!(
                name: "session.clear_failed",
                error = %e,
                "Failed to remove persisted credential"
            );
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{base}/{}",
            path.trim_start_matches('/')
        ))?)
    }
}

fn carries_token(header: &HeaderValue, token: &str) -> bool {
    header.as_bytes().strip_prefix(b"Bearer ") == Some(token.as_bytes())
}
