//! Replayable request descriptions.

use reqwest::Method;
use serde::Serialize;

use crate::auth::RoleRequirement;
use crate::error::Result;

/// Per-call policy consulted by the interceptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Skip credential checks and header attachment entirely.
    pub public: bool,
    /// Role the decoded claims must carry before the call is sent.
    pub role: RoleRequirement,
    /// Navigate to the unauthorized route when the server answers 403.
    pub redirect_on_forbidden: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            public: false,
            role: RoleRequirement::Inherit,
            redirect_on_forbidden: true,
        }
    }
}

/// An outbound call, kept as data so it can be resubmitted after a refresh.
///
/// # Example
///
/// ```rust
/// use water_portal_gateway::gateway::ApiRequest;
///
/// let request = ApiRequest::get("/registration")
///     .query("from", "2025-01-01")
///     .require_role("Admin")
///     .redirect_on_forbidden(false);
/// assert!(!request.is_retried());
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) options: RequestOptions,
    // Set once the request has been through the refresh branch.
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            options: RequestOptions::default(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Mark as a public endpoint (login, password reset).
    #[must_use]
    pub fn public(mut self) -> Self {
        self.options.public = true;
        self
    }

    #[must_use]
    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.options.role = RoleRequirement::Require(role.into());
        self
    }

    /// Any authenticated session may send this call.
    #[must_use]
    pub fn without_role_requirement(mut self) -> Self {
        self.options.role = RoleRequirement::Unrestricted;
        self
    }

    #[must_use]
    pub fn redirect_on_forbidden(mut self, redirect: bool) -> Self {
        self.options.redirect_on_forbidden = redirect;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Whether this request already went through a refresh round.
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}
