//! # Eligibility
//!
//! Decides which categories and programs a client may register for, from the
//! free-text qualification (`category` column) uploaded with the client.
//!
//! One classifier is used everywhere: registering against a category,
//! browsing programs and applying to one.

use crate::error::{CoreError, Result};
use crate::types::{Category, Program, Registration};
use serde::Serialize;
use std::collections::BTreeSet;

/// Qualification markers that open every category.
const UNIVERSAL_MARKERS: [&str; 3] = ["jobcard", "job card", "others"];

/// What a client's qualification text entitles them to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "category", rename_all = "snake_case")]
pub enum Qualification {
    /// Job card holders and "others": eligible for every category, one
    /// registration at a time.
    Universal,
    /// Eligible for the named category only (lower-cased).
    Category(String),
    /// Nothing recognisable; eligible for nothing.
    Unclassified,
}

fn normalise(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Qualification {
    /// Classify a client's qualification text against the known categories.
    ///
    /// When several category names occur in the text the longest wins, so
    /// classification does not depend on table order.
    #[must_use]
    pub fn classify(client_category: Option<&str>, categories: &[Category]) -> Self {
        let Some(text) = client_category.map(normalise).filter(|t| !t.is_empty()) else {
            return Self::Unclassified;
        };
        if UNIVERSAL_MARKERS.iter().any(|m| text.contains(m)) {
            return Self::Universal;
        }
        categories
            .iter()
            .map(|c| normalise(&c.name))
            .filter(|name| !name.is_empty() && text.contains(name.as_str()))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map_or(Self::Unclassified, Self::Category)
    }

    /// Whether a category with this name is open to the client.
    #[must_use]
    pub fn allows(&self, category_name: &str) -> bool {
        match self {
            Self::Universal => true,
            Self::Category(name) => normalise(category_name) == *name,
            Self::Unclassified => false,
        }
    }

    /// Universal holders get a notice once they hold a registration.
    #[must_use]
    pub fn is_special_holder(&self) -> bool {
        matches!(self, Self::Universal)
    }
}

/// Refuse a new program application while the client holds active
/// registrations. `multi_approved` registrations do not count.
pub fn dual_application_check(registrations: &[Registration]) -> Result<()> {
    let active = registrations
        .iter()
        .filter(|r| r.status.is_active())
        .count();
    if active > 0 {
        return Err(CoreError::DualApplicationBlocked { active });
    }
    Ok(())
}

/// Programs the client may see: category active and allowed.
#[must_use]
pub fn visible_programs<'a>(
    qualification: &Qualification,
    programs: &'a [Program],
    categories: &[Category],
) -> Vec<&'a Program> {
    let open: BTreeSet<_> = categories
        .iter()
        .filter(|c| c.is_active && qualification.allows(&c.name))
        .map(|c| c.id)
        .collect();
    programs
        .iter()
        .filter(|p| open.contains(&p.category_id))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::status::RegistrationStatus;
    use crate::types::{CategoryId, ClientId, ProgramId, RegistrationId};
    use chrono::Utc;

    fn category(name: &str, active: bool) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId::new(),
            name: name.to_string(),
            description: None,
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    fn program(category_id: CategoryId, name: &str) -> Program {
        let now = Utc::now();
        Program {
            id: ProgramId::new(),
            category_id,
            sub_project_id: None,
            name: name.to_string(),
            description: None,
            conditions: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn registration(status: RegistrationStatus) -> Registration {
        let now = Utc::now();
        Registration {
            id: RegistrationId::new(),
            client_id: ClientId::new(),
            category_id: CategoryId::new(),
            program_id: None,
            mobile_number: "9000000000".into(),
            status,
            experience: None,
            skills: None,
            registration_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn job_card_and_others_are_universal() {
        let cats = [category("foodelife", true)];
        for text in ["Job Card", "jobcard", "JOB   card holder", "Others"] {
            assert_eq!(
                Qualification::classify(Some(text), &cats),
                Qualification::Universal
            );
        }
    }

    #[test]
    fn category_name_inside_text_classifies() {
        let cats = [category("foodelife", true), category("farmelife", true)];
        let q = Qualification::classify(Some("FarmeLife Group"), &cats);
        assert_eq!(q, Qualification::Category("farmelife".into()));
        assert!(q.allows("FarmeLife"));
        assert!(!q.allows("foodelife"));
    }

    #[test]
    fn longest_category_name_wins() {
        let cats = [category("elife", true), category("organelife", true)];
        assert_eq!(
            Qualification::classify(Some("organelife"), &cats),
            Qualification::Category("organelife".into())
        );
    }

    #[test]
    fn unknown_or_missing_text_is_unclassified() {
        let cats = [category("foodelife", true)];
        assert_eq!(
            Qualification::classify(Some("carpentry"), &cats),
            Qualification::Unclassified
        );
        assert_eq!(Qualification::classify(None, &cats), Qualification::Unclassified);
        assert_eq!(Qualification::classify(Some("  "), &cats), Qualification::Unclassified);
        assert!(!Qualification::Unclassified.allows("foodelife"));
    }

    #[test]
    fn only_active_registrations_block_applications() {
        assert!(dual_application_check(&[]).is_ok());
        assert!(
            dual_application_check(&[
                registration(RegistrationStatus::MultiApproved),
                registration(RegistrationStatus::Stopped),
                registration(RegistrationStatus::Rejected),
            ])
            .is_ok()
        );
        let blocked = dual_application_check(&[
            registration(RegistrationStatus::Pending),
            registration(RegistrationStatus::Approved),
            registration(RegistrationStatus::StopRequested),
        ]);
        assert!(matches!(
            blocked,
            Err(CoreError::DualApplicationBlocked { active: 2 })
        ));
    }

    #[test]
    fn visible_programs_follow_qualification_and_activity() {
        let food = category("foodelife", true);
        let farm = category("farmelife", true);
        let closed = category("entrelife", false);
        let programs = vec![
            program(food.id, "Bakery"),
            program(farm.id, "Dairy"),
            program(closed.id, "Retail"),
        ];
        let cats = [food.clone(), farm, closed];

        let food_only = Qualification::Category("foodelife".into());
        let names: Vec<_> = visible_programs(&food_only, &programs, &cats)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Bakery"]);

        let all = visible_programs(&Qualification::Universal, &programs, &cats);
        assert_eq!(all.len(), 2);

        assert!(visible_programs(&Qualification::Unclassified, &programs, &cats).is_empty());
    }
}
