//! Request and response types for the portal resources.
//!
//! Field names follow the backend's JSON, including its spellings (`tittle`).
//! Unknown fields are kept in `extra` where the pages display more than the
//! gateway needs to understand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Notices (`/communicate`)
// =============================================================================

/// A published announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: String,
    #[serde(rename = "tittle", alias = "title", default)]
    pub title: String,
    #[serde(alias = "description", default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_statement: Option<String>,
}

/// Body for creating or editing a notice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeDraft {
    #[serde(rename = "tittle")]
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_statement: Option<String>,
}

impl NoticeDraft {
    /// A new announcement, typed the way the publishing page types it.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            type_statement: Some("Comunicado".to_string()),
        }
    }

    /// An edit; the backend keeps the existing statement type.
    pub fn edit(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            type_statement: None,
        }
    }
}

// =============================================================================
// Water schedules (`/registration`)
// =============================================================================

/// A scheduled water-distribution notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterSchedule {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub observation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating or editing a schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDraft {
    pub date: String,
    pub observation: String,
    pub neighborhood_colonies_id: Vec<String>,
}

/// Link between a schedule and an affected neighborhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodRelation {
    pub registration_water_id: String,
    pub neighborhood_colonies_id: String,
}

/// Created-resource acknowledgement (`{"id": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Created {
    pub id: String,
}

// =============================================================================
// Incident reports (`/report`)
// =============================================================================

/// An incident reported by a resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// The resident's description.
    #[serde(default)]
    pub report: Option<String>,
    #[serde(default)]
    pub observation: Option<String>,
    /// Workflow state; the backend sends either a name or an object.
    #[serde(default)]
    pub state: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Accounts (`/account`)
// =============================================================================

/// A portal user as listed by the administration page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Body of `POST /account/register`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Body of `POST /account/reset-password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleAssignment<'a> {
    pub role_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetTokenRequest<'a> {
    pub email: &'a str,
}

// =============================================================================
// Lookups (`/state`, `/block`, `/neighborhood-colony`, `/UploadReceipt`)
// =============================================================================

/// A report workflow state, e.g. "asignado".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportState {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

/// A service block grouping neighborhoods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A neighborhood (colonia) that schedules can be linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An uploaded payment receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub clave: Option<String>,
    #[serde(default)]
    pub fecha_subida: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Lookup ids arrive as strings or numbers depending on the table.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, found {other}"
        ))),
    }
}
