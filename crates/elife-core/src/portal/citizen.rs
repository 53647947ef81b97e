//! Citizen-facing operations, keyed by mobile number.

use super::{Catalogue, Portal, by_name, client_by_mobile, now};
use crate::eligibility::{Qualification, dual_application_check, visible_programs};
use crate::error::{CoreError, Result};
use crate::portal::views::{
    CategoryChoice, ProgramView, RegistrationDetail, RegistrationOverview, VerifiedClient,
};
use crate::status::{RegistrationStatus, StatusAction, StopRequestStatus, StopRequestType};
use crate::storage::Tables;
use crate::types::{
    Category, CategoryId, Notification, NotificationKind, Program, ProgramId, Registration,
    RegistrationId, StopRequest, StopRequestId, clean_mobile,
};
use std::collections::BTreeSet;

fn required_answer(value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::validation(
            "Please describe both your experience and your skills",
        ));
    }
    if value.len() > crate::MAX_TEXT_LEN {
        return Err(CoreError::validation(format!(
            "answers must be at most {} bytes",
            crate::MAX_TEXT_LEN
        )));
    }
    Ok(value.to_string())
}

impl Portal {
    /// Look up the client holding `mobile` and list the categories open to them.
    pub fn verify_mobile(&self, mobile: &str) -> Result<VerifiedClient> {
        let mobile = clean_mobile(mobile)?;
        self.store.read(|tx| {
            let client = client_by_mobile(tx, &mobile)?;
            let catalogue = Catalogue::load(tx)?;
            let categories = catalogue.category_list();
            let qualification = Qualification::classify(client.category.as_deref(), &categories);

            let mut choices: Vec<CategoryChoice> = categories
                .into_iter()
                .filter(|c| c.is_active)
                .map(|category| CategoryChoice {
                    eligible: qualification.allows(&category.name),
                    category,
                })
                .collect();
            by_name(&mut choices, |c| c.category.name.as_str());

            Ok(VerifiedClient {
                client,
                qualification,
                categories: choices,
            })
        })
    }

    /// Register the client against a category.
    pub fn register(&self, mobile: &str, category_id: CategoryId) -> Result<Registration> {
        let mobile = clean_mobile(mobile)?;
        self.store.write(|tx| {
            let client = client_by_mobile(tx, &mobile)?;
            let category = tx.require::<Category>(category_id.key())?;
            if !category.is_active {
                return Err(CoreError::NotEligible(format!(
                    "{} is not accepting registrations",
                    category.name
                )));
            }
            let categories = tx.all::<Category>()?;
            let qualification = Qualification::classify(client.category.as_deref(), &categories);
            if !qualification.allows(&category.name) {
                return Err(CoreError::NotEligible(format!(
                    "You are not eligible to register for {}",
                    category.name
                )));
            }
            let already = tx
                .all::<Registration>()?
                .iter()
                .any(|r| r.client_id == client.id && r.category_id == category.id);
            if already {
                return Err(CoreError::conflict(
                    "You have already registered for this category.",
                ));
            }

            let at = now();
            let registration = Registration {
                id: RegistrationId::new(),
                client_id: client.id,
                category_id: category.id,
                program_id: None,
                mobile_number: client.mobile_number.clone(),
                status: RegistrationStatus::Pending,
                experience: None,
                skills: None,
                registration_date: at,
                created_at: at,
                updated_at: at,
            };
            tx.put(&registration)?;
            Ok(registration)
        })
    }

    /// The client's registrations, the programs open to them and the
    /// notifications about their categories.
    pub fn check_registrations(&self, mobile: &str) -> Result<RegistrationOverview> {
        let mobile = clean_mobile(mobile)?;
        self.store.read(|tx| {
            let client = client_by_mobile(tx, &mobile)?;
            let catalogue = Catalogue::load(tx)?;
            let categories = catalogue.category_list();
            let programs = tx.all::<Program>()?;
            let qualification = Qualification::classify(client.category.as_deref(), &categories);

            let mut registrations: Vec<Registration> = tx
                .all::<Registration>()?
                .into_iter()
                .filter(|r| r.client_id == client.id)
                .collect();
            registrations.sort_by(|a, b| b.registration_date.cmp(&a.registration_date));

            let registered: BTreeSet<CategoryId> =
                registrations.iter().map(|r| r.category_id).collect();

            let details = registrations
                .into_iter()
                .map(|registration| {
                    let mut category_programs: Vec<ProgramView> = programs
                        .iter()
                        .filter(|p| p.category_id == registration.category_id)
                        .map(|p| catalogue.program_view(p))
                        .collect();
                    by_name(&mut category_programs, |p| p.program.name.as_str());
                    RegistrationDetail {
                        category: catalogue
                            .categories
                            .get(&registration.category_id.key())
                            .cloned(),
                        program: registration
                            .program_id
                            .and_then(|id| programs.iter().find(|p| p.id == id))
                            .map(|p| catalogue.program_view(p)),
                        category_programs,
                        registration,
                    }
                })
                .collect::<Vec<_>>();

            let mut available_programs: Vec<ProgramView> =
                visible_programs(&qualification, &programs, &categories)
                    .into_iter()
                    .map(|p| catalogue.program_view(p))
                    .collect();
            by_name(&mut available_programs, |p| p.program.name.as_str());

            let mut notifications: Vec<Notification> = tx
                .all::<Notification>()?
                .into_iter()
                .filter(|n| n.is_active)
                .filter(|n| {
                    let target_category = match n.kind {
                        NotificationKind::Category => Some(CategoryId(n.target_id)),
                        NotificationKind::SubProject => catalogue
                            .sub_projects
                            .get(&n.target_id.as_u128())
                            .map(|s| s.category_id),
                        NotificationKind::Program => programs
                            .iter()
                            .find(|p| p.id.0 == n.target_id)
                            .map(|p| p.category_id),
                    };
                    target_category.is_some_and(|c| registered.contains(&c))
                })
                .collect();
            notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let special_holder_notice = qualification.is_special_holder() && !details.is_empty();

            Ok(RegistrationOverview {
                client,
                qualification,
                registrations: details,
                available_programs,
                notifications,
                special_holder_notice,
            })
        })
    }

    /// Apply for a program inside a category the client qualifies for.
    pub fn apply_for_program(
        &self,
        mobile: &str,
        program_id: ProgramId,
        experience: &str,
        skills: &str,
    ) -> Result<Registration> {
        let mobile = clean_mobile(mobile)?;
        let experience = required_answer(experience)?;
        let skills = required_answer(skills)?;

        self.store.write(|tx| {
            let client = client_by_mobile(tx, &mobile)?;
            let program = tx.require::<Program>(program_id.key())?;
            let categories = tx.all::<Category>()?;
            let qualification = Qualification::classify(client.category.as_deref(), &categories);
            let visible = visible_programs(&qualification, std::slice::from_ref(&program), &categories);
            if visible.is_empty() {
                return Err(CoreError::NotEligible(
                    "You are not eligible to apply for this program".into(),
                ));
            }

            let existing: Vec<Registration> = tx
                .all::<Registration>()?
                .into_iter()
                .filter(|r| r.client_id == client.id)
                .collect();
            dual_application_check(&existing)?;

            let duplicate = existing.iter().any(|r| {
                r.program_id == Some(program.id)
                    && !matches!(
                        r.status,
                        RegistrationStatus::Rejected | RegistrationStatus::Stopped
                    )
            });
            if duplicate {
                return Err(CoreError::conflict(
                    "You have already applied for this program.",
                ));
            }

            let at = now();
            let registration = Registration {
                id: RegistrationId::new(),
                client_id: client.id,
                category_id: program.category_id,
                program_id: Some(program.id),
                mobile_number: client.mobile_number.clone(),
                status: RegistrationStatus::Pending,
                experience: Some(experience),
                skills: Some(skills),
                registration_date: at,
                created_at: at,
                updated_at: at,
            };
            tx.put(&registration)?;
            Ok(registration)
        })
    }

    /// Ask an admin to stop a registration or allow other programs alongside it.
    pub fn request_stop(&self, mobile: &str, registration_id: RegistrationId) -> Result<StopRequest> {
        let mobile = clean_mobile(mobile)?;
        self.store.write(|tx| {
            let client = client_by_mobile(tx, &mobile)?;
            let mut registration = tx.require::<Registration>(registration_id.key())?;
            if registration.client_id != client.id {
                return Err(CoreError::not_found("registration", registration_id));
            }
            let pending = tx.all::<StopRequest>()?.into_iter().any(|r| {
                r.registration_id == registration.id && r.status == StopRequestStatus::Pending
            });
            if pending {
                return Err(CoreError::conflict(
                    "A stop request is already pending for this registration",
                ));
            }

            let previous = registration.status;
            registration.status = previous.apply(StatusAction::RequestStop)?;
            let at = now();
            registration.updated_at = at;

            let current_category = tx
                .get::<Category>(registration.category_id.key())?
                .map(|c| c.name);
            let request = StopRequest {
                id: StopRequestId::new(),
                registration_id: registration.id,
                client_id: client.id,
                mobile_number: client.mobile_number.clone(),
                current_category,
                request_type: StopRequestType::StopOrMulti,
                status: StopRequestStatus::Pending,
                previous_status: previous,
                admin_notes: None,
                created_at: at,
                updated_at: at,
            };
            tx.put(&registration)?;
            tx.put(&request)?;
            Ok(request)
        })
    }
}
