//! Typed client for the portal resources.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, PercentEncode, utf8_percent_encode};

use crate::api::types::{
    Block, Created, Neighborhood, NeighborhoodRelation, NewUser, Notice, NoticeDraft,
    PasswordReset, Receipt, Report, ReportState, ResetTokenRequest, RoleAssignment, ScheduleDraft,
    UserSummary, WaterSchedule,
};
use crate::error::Result;
use crate::gateway::{ApiRequest, SessionGateway};

/// Portal API client.
///
/// Every call goes through the [`SessionGateway`], so credentials, refresh and
/// redirects are handled the same way for all resources.
///
/// # Example
///
/// ```rust,no_run
/// use water_portal_gateway::api::PortalClient;
/// use water_portal_gateway::gateway::SessionGateway;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = SessionGateway::builder("http://localhost:5000/api").build().await?;
/// let client = PortalClient::new(gateway);
///
/// for schedule in client.schedules().list().await? {
///     println!("{} {}", schedule.date, schedule.observation);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PortalClient {
    gateway: SessionGateway,
}

impl PortalClient {
    pub fn new(gateway: SessionGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the Account API.
    pub fn account(&self) -> AccountApi<'_> {
        AccountApi { client: self }
    }

    /// Access the Notices API.
    pub fn notices(&self) -> NoticesApi<'_> {
        NoticesApi { client: self }
    }

    /// Access the Water Schedules API.
    pub fn schedules(&self) -> SchedulesApi<'_> {
        SchedulesApi { client: self }
    }

    /// Access the Reports API.
    pub fn reports(&self) -> ReportsApi<'_> {
        ReportsApi { client: self }
    }

    /// Access the Neighborhoods API.
    pub fn neighborhoods(&self) -> NeighborhoodsApi<'_> {
        NeighborhoodsApi { client: self }
    }
}

// =============================================================================
// Account API
// =============================================================================

/// Account API client.
#[derive(Debug)]
pub struct AccountApi<'a> {
    client: &'a PortalClient,
}

impl AccountApi<'_> {
    /// Role names known to the backend.
    pub async fn roles(&self) -> Result<Vec<String>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/account/get-roles"))
            .await
    }

    /// All registered users with their roles.
    pub async fn users(&self) -> Result<Vec<UserSummary>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/account/get-all-users"))
            .await
    }

    pub async fn assign_role(&self, user_id: &str, role_name: &str) -> Result<()> {
        let request = ApiRequest::post(format!("/account/assign-role/{}", segment(user_id)))
            .json(&RoleAssignment { role_name })?;
        self.client.gateway.send_empty(request).await
    }

    pub async fn remove_role(&self, user_id: &str, role_name: &str) -> Result<()> {
        self.client
            .gateway
            .send_empty(ApiRequest::delete(format!(
                "/account/remove-role/{}/{}",
                segment(user_id),
                segment(role_name)
            )))
            .await
    }

    /// Create a portal user.
    pub async fn register(&self, user: &NewUser) -> Result<()> {
        let request = ApiRequest::post("/account/register").json(user)?;
        self.client.gateway.send_empty(request).await
    }

    /// Ask the backend to mail a password-reset token. Public endpoint.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post("/account/generate-password-reset-token")
            .public()
            .json(&ResetTokenRequest { email })?;
        self.client.gateway.send_empty(request).await
    }

    /// Set a new password using a mailed token. Public endpoint.
    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<()> {
        let request = ApiRequest::post("/account/reset-password")
            .public()
            .json(reset)?;
        self.client.gateway.send_empty(request).await
    }
}

// =============================================================================
// Notices API
// =============================================================================

/// Notices API client.
#[derive(Debug)]
pub struct NoticesApi<'a> {
    client: &'a PortalClient,
}

impl NoticesApi<'_> {
    pub async fn list(&self) -> Result<Vec<Notice>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/communicate"))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Notice> {
        self.client
            .gateway
            .send_json(ApiRequest::get(format!("/communicate/{}", segment(id))))
            .await
    }

    pub async fn create(&self, draft: &NoticeDraft) -> Result<()> {
        let request = ApiRequest::post("/communicate").json(draft)?;
        self.client.gateway.send_empty(request).await
    }

    pub async fn update(&self, id: &str, draft: &NoticeDraft) -> Result<()> {
        let request = ApiRequest::put(format!("/communicate/{}", segment(id))).json(draft)?;
        self.client.gateway.send_empty(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .gateway
            .send_empty(ApiRequest::delete(format!("/communicate/{}", segment(id))))
            .await
    }
}

// =============================================================================
// Water Schedules API
// =============================================================================

/// Water Schedules API client.
#[derive(Debug)]
pub struct SchedulesApi<'a> {
    client: &'a PortalClient,
}

impl SchedulesApi<'_> {
    pub async fn list(&self) -> Result<Vec<WaterSchedule>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/registration"))
            .await
    }

    /// Schedules for one day (`YYYY-MM-DD`).
    pub async fn on_date(&self, date: &str) -> Result<Vec<WaterSchedule>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/registration").query("date", date))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<WaterSchedule> {
        self.client
            .gateway
            .send_json(ApiRequest::get(format!("/registration/{}", segment(id))))
            .await
    }

    /// Create a schedule and return its id.
    pub async fn create(&self, draft: &ScheduleDraft) -> Result<String> {
        let request = ApiRequest::post("/registration").json(draft)?;
        let created: Created = self.client.gateway.send_json(request).await?;
        Ok(created.id)
    }

    pub async fn update(&self, id: &str, draft: &ScheduleDraft) -> Result<()> {
        let request = ApiRequest::put(format!("/registration/{}", segment(id))).json(draft)?;
        self.client.gateway.send_empty(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .gateway
            .send_empty(ApiRequest::delete(format!("/registration/{}", segment(id))))
            .await
    }

    /// Attach affected neighborhoods to schedules.
    pub async fn link_neighborhoods(&self, relations: &[NeighborhoodRelation]) -> Result<()> {
        let request =
            ApiRequest::post("/RegistrationWaterNeighborhoodsColonies/add-relations")
                .json(relations)?;
        self.client.gateway.send_empty(request).await
    }
}

// =============================================================================
// Reports API
// =============================================================================

/// Reports API client.
#[derive(Debug)]
pub struct ReportsApi<'a> {
    client: &'a PortalClient,
}

impl ReportsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Report>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/report"))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Report> {
        self.client
            .gateway
            .send_json(ApiRequest::get(format!("/report/byid/{}", segment(id))))
            .await
    }

    /// Move a report to another workflow state (see [`ReportsApi::states`]).
    pub async fn update_state(&self, id: &str, state_id: &str) -> Result<()> {
        let request = ApiRequest::put(format!(
            "/report/{}/state/{}",
            segment(id),
            segment(state_id)
        ))
        .json(state_id)?;
        self.client.gateway.send_empty(request).await
    }

    /// Workflow states a report can be moved to.
    pub async fn states(&self) -> Result<Vec<ReportState>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/state"))
            .await
    }

    /// Payment receipts uploaded by residents.
    pub async fn receipts(&self) -> Result<Vec<Receipt>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/UploadReceipt/all"))
            .await
    }
}

// =============================================================================
// Neighborhoods API
// =============================================================================

/// Neighborhoods and service blocks, the ids schedules are linked to.
#[derive(Debug)]
pub struct NeighborhoodsApi<'a> {
    client: &'a PortalClient,
}

impl NeighborhoodsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Neighborhood>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/neighborhood-colony"))
            .await
    }

    pub async fn blocks(&self) -> Result<Vec<Block>> {
        self.client
            .gateway
            .send_json(ApiRequest::get("/block"))
            .await
    }

    /// Neighborhoods served by one block.
    pub async fn in_block(&self, block_id: &str) -> Result<Vec<Neighborhood>> {
        self.client
            .gateway
            .send_json(ApiRequest::get(format!(
                "/neighborhood-colony/block/{}",
                segment(block_id)
            )))
            .await
    }
}

// Unreserved characters pass through; everything else, `/` and `?` included,
// is escaped so a value always stays one path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn segment(value: &str) -> PercentEncode<'_> {
    utf8_percent_encode(value, SEGMENT)
}
