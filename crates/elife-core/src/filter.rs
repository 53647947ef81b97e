//! # Registration Views
//!
//! Registrations joined with their client, category and program, plus the
//! filters and tallies used by the admin listings and exports.

use crate::status::RegistrationStatus;
use crate::types::{
    Category, CategoryId, Client, ClientId, Program, ProgramId, Registration, RegistrationId,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ROWS
// =============================================================================

/// A registration joined with the records it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub id: RegistrationId,
    pub client_id: ClientId,
    pub category_id: CategoryId,
    pub program_id: Option<ProgramId>,
    pub mobile_number: String,
    pub status: RegistrationStatus,
    pub experience: Option<String>,
    pub skills: Option<String>,
    pub registration_date: Timestamp,
    pub updated_at: Timestamp,

    pub client_name: String,
    pub customer_id: String,
    pub district: Option<String>,
    pub panchayath: Option<String>,
    pub agent_pro: Option<String>,

    pub category_name: String,

    pub program_name: Option<String>,
    pub program_description: Option<String>,
    pub program_conditions: Option<String>,
}

impl RegistrationRow {
    /// Join a registration with whatever related records still exist.
    #[must_use]
    pub fn join(
        registration: &Registration,
        client: Option<&Client>,
        category: Option<&Category>,
        program: Option<&Program>,
    ) -> Self {
        Self {
            id: registration.id,
            client_id: registration.client_id,
            category_id: registration.category_id,
            program_id: registration.program_id,
            mobile_number: registration.mobile_number.clone(),
            status: registration.status,
            experience: registration.experience.clone(),
            skills: registration.skills.clone(),
            registration_date: registration.registration_date,
            updated_at: registration.updated_at,
            client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
            customer_id: client.map(|c| c.customer_id.clone()).unwrap_or_default(),
            district: client.and_then(|c| c.district.clone()),
            panchayath: client.and_then(|c| c.panchayath.clone()),
            agent_pro: client.and_then(|c| c.agent_pro.clone()),
            category_name: category.map(|c| c.name.clone()).unwrap_or_default(),
            program_name: program.map(|p| p.name.clone()),
            program_description: program.and_then(|p| p.description.clone()),
            program_conditions: program.and_then(|p| p.conditions.clone()),
        }
    }
}

// =============================================================================
// FILTER
// =============================================================================

fn selected(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Admin listing filter. Empty values and `"all"` select everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFilter {
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub panchayath: Option<String>,
    /// Matches client name, customer id, category name or mobile number.
    #[serde(default)]
    pub search: Option<String>,
}

impl RegistrationFilter {
    /// The status selection, if any. Unknown statuses are an error.
    pub fn status(&self) -> crate::Result<Option<RegistrationStatus>> {
        selected(self.status.as_deref())
            .map(str::parse)
            .transpose()
    }

    #[must_use]
    pub fn matches(&self, row: &RegistrationRow) -> bool {
        if let Some(category) = selected(self.category.as_deref())
            && !row.category_name.eq_ignore_ascii_case(category)
        {
            return false;
        }
        if let Some(status) = selected(self.status.as_deref())
            && !row.status.as_str().eq_ignore_ascii_case(status)
        {
            return false;
        }
        if let Some(panchayath) = selected(self.panchayath.as_deref())
            && row.panchayath.as_deref() != Some(panchayath)
        {
            return false;
        }
        match selected(self.search.as_deref()) {
            Some(term) => {
                let term = term.to_lowercase();
                row.client_name.to_lowercase().contains(&term)
                    || row.customer_id.to_lowercase().contains(&term)
                    || row.category_name.to_lowercase().contains(&term)
                    || row.mobile_number.contains(&term)
            }
            None => true,
        }
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Registration counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub stop_requested: u64,
    pub stopped: u64,
    pub multi_approved: u64,
}

impl StatusStats {
    /// Count statuses.
    pub fn tally(statuses: impl IntoIterator<Item = RegistrationStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            let slot = match status {
                RegistrationStatus::Pending => &mut stats.pending,
                RegistrationStatus::Approved => &mut stats.approved,
                RegistrationStatus::Rejected => &mut stats.rejected,
                RegistrationStatus::StopRequested => &mut stats.stop_requested,
                RegistrationStatus::Stopped => &mut stats.stopped,
                RegistrationStatus::MultiApproved => &mut stats.multi_approved,
            };
            *slot += 1;
        }
        stats
    }
}

/// Sorted, distinct, non-blank panchayath names.
#[must_use]
pub fn distinct_panchayaths(rows: &[RegistrationRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.panchayath.as_deref().map(str::trim))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use chrono::Utc;

    fn row(name: &str, category: &str, status: RegistrationStatus, panchayath: Option<&str>) -> RegistrationRow {
        let now = Utc::now();
        RegistrationRow {
            id: RegistrationId::new(),
            client_id: ClientId::new(),
            category_id: CategoryId::new(),
            program_id: None,
            mobile_number: "9847012345".into(),
            status,
            experience: None,
            skills: None,
            registration_date: now,
            updated_at: now,
            client_name: name.into(),
            customer_id: format!("C-{name}"),
            district: None,
            panchayath: panchayath.map(str::to_string),
            agent_pro: None,
            category_name: category.into(),
            program_name: None,
            program_description: None,
            program_conditions: None,
        }
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = RegistrationFilter::default();
        assert!(filter.matches(&row("Anu", "foodelife", RegistrationStatus::Pending, None)));

        let all = RegistrationFilter {
            category: Some("all".into()),
            status: Some("ALL".into()),
            ..RegistrationFilter::default()
        };
        assert!(all.matches(&row("Anu", "farmelife", RegistrationStatus::Stopped, None)));
    }

    #[test]
    fn filters_combine() {
        let filter = RegistrationFilter {
            category: Some("FoodeLife".into()),
            status: Some("approved".into()),
            panchayath: Some("Kottayam".into()),
            search: None,
        };
        assert!(filter.matches(&row("Anu", "foodelife", RegistrationStatus::Approved, Some("Kottayam"))));
        assert!(!filter.matches(&row("Anu", "foodelife", RegistrationStatus::Pending, Some("Kottayam"))));
        assert!(!filter.matches(&row("Anu", "farmelife", RegistrationStatus::Approved, Some("Kottayam"))));
        assert!(!filter.matches(&row("Anu", "foodelife", RegistrationStatus::Approved, None)));
    }

    #[test]
    fn search_covers_name_customer_category_and_mobile() {
        let r = row("Lakshmi", "organelife", RegistrationStatus::Pending, None);
        for term in ["laksh", "c-lakshmi", "ORGAN", "70123"] {
            let filter = RegistrationFilter {
                search: Some(term.into()),
                ..RegistrationFilter::default()
            };
            assert!(filter.matches(&r), "term {term} should match");
        }
        let miss = RegistrationFilter {
            search: Some("zzz".into()),
            ..RegistrationFilter::default()
        };
        assert!(!miss.matches(&r));
    }

    #[test]
    fn unknown_status_filter_is_rejected() {
        let filter = RegistrationFilter {
            status: Some("paused".into()),
            ..RegistrationFilter::default()
        };
        assert!(filter.status().is_err());
        assert!(matches!(RegistrationFilter::default().status(), Ok(None)));
    }

    #[test]
    fn stats_tally_each_status() {
        let stats = StatusStats::tally([
            RegistrationStatus::Pending,
            RegistrationStatus::Pending,
            RegistrationStatus::Approved,
            RegistrationStatus::MultiApproved,
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.multi_approved, 1);
        assert_eq!(stats.stopped, 0);
    }

    #[test]
    fn panchayaths_are_sorted_and_distinct() {
        let rows = vec![
            row("a", "x", RegistrationStatus::Pending, Some("Pala")),
            row("b", "x", RegistrationStatus::Pending, Some("Aluva")),
            row("c", "x", RegistrationStatus::Pending, Some("Pala")),
            row("d", "x", RegistrationStatus::Pending, Some("  ")),
            row("e", "x", RegistrationStatus::Pending, None),
        ];
        assert_eq!(distinct_panchayaths(&rows), vec!["Aluva", "Pala"]);
    }
}
