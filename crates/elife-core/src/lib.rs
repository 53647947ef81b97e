//! # E-Life Core
//!
//! Domain model and business rules for the E-Life self-employment
//! registration portal.
//!
//! Citizens are pre-registered in bulk (clients), identified by mobile
//! number, and register against employment categories or apply to programs
//! inside the categories they qualify for. Administrators manage the
//! catalogue, approve registrations and decide stop requests.
//!
//! ## Layout
//!
//! - [`types`]: records for the nine tables plus input forms
//! - [`status`]: the registration status vocabulary and transition table
//! - [`eligibility`]: qualification classification and the dual application policy
//! - [`permissions`]: admin roles and permission flags
//! - [`password`]: PBKDF2 hashing and verification
//! - [`filter`]: joined registration rows, filters and statistics
//! - [`formats`]: client uploads (CSV/XLSX) and CSV exports
//! - [`storage`]: redb-backed record store
//! - [`portal`]: the service operations used by the app layer
//!
//! This crate is synchronous and does no network I/O.

pub mod eligibility;
pub mod error;
pub mod filter;
pub mod formats;
pub mod password;
pub mod permissions;
pub mod portal;
pub mod status;
pub mod storage;
pub mod types;

pub use eligibility::Qualification;
pub use error::{CoreError, Result};
pub use filter::{RegistrationFilter, RegistrationRow, StatusStats};
pub use permissions::{Permission, Permissions, Role};
pub use portal::Portal;
pub use status::{
    RegistrationStatus, ReviewDecision, StatusAction, StopDecision, StopRequestStatus,
    StopRequestType,
};
pub use types::*;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// Upper bound for names (categories, programs, sub-projects, usernames).
pub const MAX_NAME_LEN: usize = 256;

/// Upper bound for free text (descriptions, conditions, messages, notes).
pub const MAX_TEXT_LEN: usize = 8192;

/// Upper bound for an uploaded client file.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
