//! # Domain Records
//!
//! One struct per table of the portal, plus the input forms the app layer
//! deserializes from requests. Records are stored with postcard, so they
//! avoid serde attributes that skip fields.

use crate::error::{CoreError, Result};
use crate::permissions::{Permissions, Role};
use crate::status::{RegistrationStatus, StopRequestStatus, StopRequestType};
use crate::{MAX_NAME_LEN, MAX_TEXT_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Wall-clock timestamp stored on every record.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub Uuid);

            impl $name {
                /// Fresh random id.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Storage key.
                #[must_use]
                pub fn key(self) -> u128 {
                    self.0.as_u128()
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(&self.0, f)
                }
            }

            impl FromStr for $name {
                type Err = CoreError;

                fn from_str(s: &str) -> Result<Self> {
                    Uuid::parse_str(s.trim())
                        .map(Self)
                        .map_err(|_| CoreError::validation(format!("invalid id: {s}")))
                }
            }
        )*
    };
}

define_id!(
    /// Admin account id.
    AdminId,
    /// Employment category id.
    CategoryId,
    /// Sub-project id.
    SubProjectId,
    /// Program id.
    ProgramId,
    /// Registered client id.
    ClientId,
    /// Employment registration id.
    RegistrationId,
    /// Notification id.
    NotificationId,
    /// Stop request id.
    StopRequestId,
    /// File upload id.
    FileUploadId,
);

// =============================================================================
// RECORDS
// =============================================================================

/// Administrator account (`admins`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub id: AdminId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Permissions,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Employment category (`employment_categories`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Sub-project inside a category (`sub_projects`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProject {
    pub id: SubProjectId,
    pub category_id: CategoryId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Program within a category, optionally tied to a sub-project (`programs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub category_id: CategoryId,
    pub sub_project_id: Option<SubProjectId>,
    pub name: String,
    pub description: Option<String>,
    /// Free-text eligibility conditions.
    pub conditions: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Pre-registered individual uploaded by admins (`registered_clients`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub customer_id: String,
    pub name: String,
    pub mobile_number: String,
    pub address: Option<String>,
    /// Qualification text, e.g. "foodelife" or "Job Card".
    pub category: Option<String>,
    pub panchayath: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub agent_pro: Option<String>,
    pub preference: Option<String>,
    pub status: Option<String>,
    pub file_upload_id: Option<FileUploadId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Client {
    /// New client built from an uploaded row.
    #[must_use]
    pub fn from_record(record: ClientRecord, upload: FileUploadId, at: Timestamp) -> Self {
        Self {
            id: ClientId::new(),
            customer_id: record.customer_id,
            name: record.name,
            mobile_number: record.mobile_number,
            address: record.address,
            category: record.category,
            panchayath: record.panchayath,
            district: record.district,
            ward: record.ward,
            agent_pro: record.agent_pro,
            preference: record.preference,
            status: record.status,
            file_upload_id: Some(upload),
            created_at: at,
            updated_at: at,
        }
    }
}

/// Client application against a category (`employment_registrations`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub client_id: ClientId,
    pub category_id: CategoryId,
    /// Set when the registration came from a program application.
    pub program_id: Option<ProgramId>,
    pub mobile_number: String,
    pub status: RegistrationStatus,
    pub experience: Option<String>,
    pub skills: Option<String>,
    pub registration_date: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Category,
    SubProject,
    Program,
}

impl NotificationKind {
    /// Label used when the target no longer exists.
    #[must_use]
    pub fn unknown_target_label(self) -> &'static str {
        match self {
            Self::Category => "Unknown Category",
            Self::SubProject => "Unknown Sub-Project",
            Self::Program => "Unknown Program",
        }
    }
}

/// Admin-authored notice shown to clients (`notifications`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Id of the category, sub-project or program named by `kind`.
    pub target_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Client request to stop or multiplex a registration (`program_stop_requests`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRequest {
    pub id: StopRequestId,
    pub registration_id: RegistrationId,
    pub client_id: ClientId,
    pub mobile_number: String,
    pub current_category: Option<String>,
    pub request_type: StopRequestType,
    pub status: StopRequestStatus,
    /// Registration status at the time of the request.
    pub previous_status: RegistrationStatus,
    pub admin_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Audit row for a bulk client upload (`file_uploads`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpload {
    pub id: FileUploadId,
    pub filename: String,
    pub file_type: String,
    pub records_count: u64,
    pub uploaded_by: Option<String>,
    pub upload_date: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// =============================================================================
// INPUT FORMS
// =============================================================================

fn default_true() -> bool {
    true
}

/// Create/update payload for a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Create/update payload for a sub-project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProjectForm {
    pub name: String,
    pub category_id: CategoryId,
}

/// Create/update payload for a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramForm {
    pub name: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub sub_project_id: Option<SubProjectId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Option<String>,
}

/// Create/update payload for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationForm {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub target_id: Uuid,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// New admin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Partial update of an admin account. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Changing the role resets the permission flags to the role defaults.
    #[serde(default)]
    pub role: Option<Role>,
    /// Applied after any role change.
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// One client row read from an upload file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub customer_id: String,
    pub name: String,
    pub mobile_number: String,
    pub address: Option<String>,
    pub category: Option<String>,
    pub panchayath: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub agent_pro: Option<String>,
    pub preference: Option<String>,
    pub status: Option<String>,
}

// =============================================================================
// FIELD CLEANING
// =============================================================================

/// Trim a required name, rejecting empty or oversized values.
pub fn clean_name(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(CoreError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim a required free-text field.
pub fn clean_required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    if trimmed.len() > MAX_TEXT_LEN {
        return Err(CoreError::validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} bytes"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional free-text field; blank becomes `None`.
pub fn clean_text(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.len() > MAX_TEXT_LEN => Err(CoreError::validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} bytes"
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Normalise a mobile number as typed by a citizen.
pub fn clean_mobile(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("Please enter your mobile number"));
    }
    Ok(trimmed.to_string())
}
