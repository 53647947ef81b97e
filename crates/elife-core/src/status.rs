//! # Registration Status
//!
//! The single status vocabulary for employment registrations and the
//! transition table that governs it.
//!
//! ```text
//!                 approve            request_stop            confirm_stop
//!   pending ───────────────► approved ───────────► stop_requested ─────────► stopped
//!     │  reject                 ▲                    │      │                  │
//!     ▼                         └──── deny_stop ─────┘      │ allow_multi      │ restore
//!   rejected                                                ▼                  ▼
//!                                                     multi_approved        pending
//! ```
//!
//! `request_stop` is accepted from pending, approved and multi_approved;
//! `deny_stop` returns to whatever status the registration held when the stop
//! was requested.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// REGISTRATION STATUS
// =============================================================================

/// Status of an employment registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    StopRequested,
    Stopped,
    MultiApproved,
}

impl RegistrationStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::StopRequested,
        Self::Stopped,
        Self::MultiApproved,
    ];

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::StopRequested => "stop_requested",
            Self::Stopped => "stopped",
            Self::MultiApproved => "multi_approved",
        }
    }

    /// Active registrations block new program applications.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Registrations listed on the admin "stopped" view.
    #[must_use]
    pub fn is_stopped_view(self) -> bool {
        matches!(self, Self::Stopped | Self::StopRequested)
    }

    /// Apply an action, returning the resulting status.
    pub fn apply(self, action: StatusAction) -> Result<Self> {
        use RegistrationStatus as S;
        use StatusAction as A;

        let next = match (self, action) {
            (S::Pending, A::Approve) => S::Approved,
            (S::Pending, A::Reject) => S::Rejected,
            (S::Pending | S::Approved | S::MultiApproved, A::RequestStop) => S::StopRequested,
            (S::StopRequested, A::ConfirmStop) => S::Stopped,
            (S::StopRequested, A::AllowMulti) => S::MultiApproved,
            (S::StopRequested, A::DenyStop(previous)) if previous != S::StopRequested => previous,
            (S::Stopped | S::StopRequested, A::Restore) => S::Pending,
            (from, action) => return Err(CoreError::InvalidTransition { from, action }),
        };
        Ok(next)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| CoreError::validation(format!("unknown registration status: {s}")))
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// An event that moves a registration between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Admin approves a pending registration.
    Approve,
    /// Admin rejects a pending registration.
    Reject,
    /// Client asks to stop (or multiplex) a registration.
    RequestStop,
    /// Admin confirms the stop.
    ConfirmStop,
    /// Admin allows concurrent multi-program enrollment.
    AllowMulti,
    /// Admin denies the stop request; carries the status held before it.
    DenyStop(RegistrationStatus),
    /// Admin puts a stopped registration back to pending.
    Restore,
}

impl fmt::Display for StatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestStop => "request stop for",
            Self::ConfirmStop => "stop",
            Self::AllowMulti => "allow multi-program for",
            Self::DenyStop(_) => "deny the stop request for",
            Self::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Admin review of a pending registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    #[must_use]
    pub fn action(self) -> StatusAction {
        match self {
            Self::Approve => StatusAction::Approve,
            Self::Reject => StatusAction::Reject,
        }
    }
}

// =============================================================================
// STOP REQUESTS
// =============================================================================

/// Lifecycle of a stop request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl StopRequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for StopRequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::validation(format!(
                "unknown stop request status: {other}"
            ))),
        }
    }
}

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRequestType {
    Stop,
    MultiProgram,
    StopOrMulti,
}

/// Admin decision on a pending stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopDecision {
    /// Stop the registration; the client may apply elsewhere.
    Stop,
    /// Keep the registration and allow other programs alongside it.
    AllowMulti,
    /// Refuse; the registration returns to its previous status.
    Reject,
}

impl StopDecision {
    /// The registration action and the resulting request status.
    #[must_use]
    pub fn resolve(self, previous: RegistrationStatus) -> (StatusAction, StopRequestStatus) {
        match self {
            Self::Stop => (StatusAction::ConfirmStop, StopRequestStatus::Approved),
            Self::AllowMulti => (StatusAction::AllowMulti, StopRequestStatus::Approved),
            Self::Reject => (StatusAction::DenyStop(previous), StopRequestStatus::Rejected),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
