//! Read models returned by portal operations.

use crate::eligibility::Qualification;
use crate::permissions::{Permissions, Role};
use crate::types::{
    Admin, AdminId, Category, Client, FileUpload, Notification, Program, Registration,
    StopRequest, SubProject, Timestamp,
};
use serde::Serialize;

/// A category as offered to a verified client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryChoice {
    #[serde(flatten)]
    pub category: Category,
    pub eligible: bool,
}

/// Result of verifying a mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedClient {
    pub client: Client,
    pub qualification: Qualification,
    /// Active categories, each marked with whether the client may register.
    pub categories: Vec<CategoryChoice>,
}

/// A program with its category and sub-project names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramView {
    #[serde(flatten)]
    pub program: Program,
    pub category_name: String,
    pub sub_project_name: Option<String>,
}

/// One registration of a client, with its category's programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub registration: Registration,
    pub category: Option<Category>,
    pub program: Option<ProgramView>,
    pub category_programs: Vec<ProgramView>,
}

/// Everything a client sees when checking their registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationOverview {
    pub client: Client,
    pub qualification: Qualification,
    /// Newest first.
    pub registrations: Vec<RegistrationDetail>,
    pub available_programs: Vec<ProgramView>,
    /// Active notifications about the client's categories, newest first.
    pub notifications: Vec<Notification>,
    /// Job card holders with a registration are limited to it.
    pub special_holder_notice: bool,
}

/// A category with its programs and sub-projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDetails {
    pub category: Category,
    pub programs: Vec<ProgramView>,
    pub sub_projects: Vec<SubProject>,
}

/// Programs listed under one category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramGroup {
    pub category_name: String,
    pub programs: Vec<ProgramView>,
}

/// A notification with the name of what it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub target_name: String,
}

/// A stop request joined with client and category names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopRequestView {
    #[serde(flatten)]
    pub request: StopRequest,
    pub client_name: String,
    pub customer_id: String,
    pub category_name: String,
}

/// Outcome of a client upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub upload: FileUpload,
    pub inserted: u64,
    pub updated: u64,
    /// Rows missing customer id, name or mobile number.
    pub skipped_invalid: u64,
    /// Customer ids skipped because their mobile number belongs to another customer.
    pub skipped_conflicts: Vec<String>,
}

/// An admin account without its password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminView {
    pub id: AdminId,
    pub username: String,
    pub role: Role,
    pub permissions: Permissions,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Admin> for AdminView {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username.clone(),
            role: admin.role,
            permissions: admin.permissions,
            is_active: admin.is_active,
            created_at: admin.created_at,
            updated_at: admin.updated_at,
        }
    }
}
