//! Request and response bodies that are not portal forms.

use elife_core::portal::AdminView;
use elife_core::{CategoryId, ProgramId, RegistrationId, ReviewDecision, StopDecision};
use serde::{Deserialize, Serialize};

/// Citizen identified by mobile number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileRequest {
    pub mobile_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub mobile_number: String,
    pub category_id: CategoryId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub mobile_number: String,
    pub program_id: ProgramId,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub skills: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequestBody {
    pub mobile_number: String,
    pub registration_id: RegistrationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminView,
}

/// Approve or reject a pending registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub decision: ReviewDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub decision: StopDecision,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubProjectQuery {
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopRequestQuery {
    /// `pending`, `approved`, `rejected`, or `all`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}
