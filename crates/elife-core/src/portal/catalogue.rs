//! Catalogue maintenance: categories, sub-projects, programs and notifications.

use super::{Catalogue, Portal, by_name, now};
use crate::error::{CoreError, Result};
use crate::portal::views::{CategoryDetails, NotificationView, ProgramGroup, ProgramView};
use crate::storage::{Tables, WriteTx};
use crate::types::{
    Category, CategoryForm, CategoryId, Notification, NotificationForm, NotificationId,
    NotificationKind, Program, ProgramForm, ProgramId, Registration, SubProject, SubProjectForm,
    SubProjectId, clean_name, clean_required_text, clean_text,
};
use std::collections::BTreeMap;
use uuid::Uuid;

fn unique_category_name(tx: &WriteTx, name: &str, except: Option<CategoryId>) -> Result<()> {
    let taken = tx
        .all::<Category>()?
        .iter()
        .any(|c| Some(c.id) != except && c.name.eq_ignore_ascii_case(name));
    if taken {
        return Err(CoreError::conflict(format!(
            "A category named {name} already exists"
        )));
    }
    Ok(())
}

/// Sub-project must exist and sit in `category_id`.
fn check_sub_project(
    tx: &WriteTx,
    sub_project_id: Option<SubProjectId>,
    category_id: CategoryId,
) -> Result<()> {
    if let Some(id) = sub_project_id {
        let sub_project = tx.require::<SubProject>(id.key())?;
        if sub_project.category_id != category_id {
            return Err(CoreError::validation(
                "Sub-project does not belong to the selected category",
            ));
        }
    }
    Ok(())
}

fn target_exists(tx: &WriteTx, kind: NotificationKind, target: Uuid) -> Result<()> {
    let key = target.as_u128();
    match kind {
        NotificationKind::Category => tx.require::<Category>(key).map(drop),
        NotificationKind::SubProject => tx.require::<SubProject>(key).map(drop),
        NotificationKind::Program => tx.require::<Program>(key).map(drop),
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

impl Portal {
    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub fn create_category(&self, form: CategoryForm) -> Result<Category> {
        let name = clean_name(&form.name, "category name")?;
        let description = clean_text(form.description, "description")?;
        self.store.write(|tx| {
            unique_category_name(tx, &name, None)?;
            let at = now();
            let category = Category {
                id: CategoryId::new(),
                name,
                description,
                is_active: form.is_active,
                created_at: at,
                updated_at: at,
            };
            tx.put(&category)?;
            Ok(category)
        })
    }

    pub fn update_category(&self, id: CategoryId, form: CategoryForm) -> Result<Category> {
        let name = clean_name(&form.name, "category name")?;
        let description = clean_text(form.description, "description")?;
        self.store.write(|tx| {
            let mut category = tx.require::<Category>(id.key())?;
            unique_category_name(tx, &name, Some(id))?;
            category.name = name;
            category.description = description;
            category.is_active = form.is_active;
            category.updated_at = now();
            tx.put(&category)?;
            Ok(category)
        })
    }

    /// Open or close a category for registrations.
    pub fn set_category_active(&self, id: CategoryId, active: bool) -> Result<Category> {
        self.store.write(|tx| {
            let mut category = tx.require::<Category>(id.key())?;
            category.is_active = active;
            category.updated_at = now();
            tx.put(&category)?;
            Ok(category)
        })
    }

    /// Flip a category's active flag.
    pub fn toggle_category(&self, id: CategoryId) -> Result<Category> {
        self.store.write(|tx| {
            let mut category = tx.require::<Category>(id.key())?;
            category.is_active = !category.is_active;
            category.updated_at = now();
            tx.put(&category)?;
            Ok(category)
        })
    }

    /// Delete a category nothing references.
    pub fn delete_category(&self, id: CategoryId) -> Result<()> {
        self.store.write(|tx| {
            let category = tx.require::<Category>(id.key())?;
            let programs = tx.all::<Program>()?.iter().filter(|p| p.category_id == id).count();
            let sub_projects = tx
                .all::<SubProject>()?
                .iter()
                .filter(|s| s.category_id == id)
                .count();
            let registrations = tx
                .all::<Registration>()?
                .iter()
                .filter(|r| r.category_id == id)
                .count();

            let blockers: Vec<String> = [
                (programs, "program"),
                (sub_projects, "sub-project"),
                (registrations, "registration"),
            ]
            .into_iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, noun)| plural(count, noun))
            .collect();
            if !blockers.is_empty() {
                return Err(CoreError::conflict(format!(
                    "Cannot delete {}: it still has {}",
                    category.name,
                    blockers.join(", ")
                )));
            }
            tx.remove::<Category>(id.key())?;
            Ok(())
        })
    }

    /// All categories, by name.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.store.read(|tx| tx.all::<Category>())?;
        by_name(&mut categories, |c| c.name.as_str());
        Ok(categories)
    }

    /// A category with its programs and sub-projects.
    pub fn category_details(&self, id: CategoryId) -> Result<CategoryDetails> {
        self.store.read(|tx| {
            let category = tx.require::<Category>(id.key())?;
            let catalogue = Catalogue::load(tx)?;
            let programs = tx.all::<Program>()?;
            Ok(details_for(category, &catalogue, &programs))
        })
    }

    /// Every category with its programs and sub-projects, by name.
    pub fn category_cards(&self, active_only: bool) -> Result<Vec<CategoryDetails>> {
        self.store.read(|tx| {
            let catalogue = Catalogue::load(tx)?;
            let programs = tx.all::<Program>()?;
            let mut cards: Vec<CategoryDetails> = catalogue
                .category_list()
                .into_iter()
                .filter(|c| c.is_active || !active_only)
                .map(|c| details_for(c, &catalogue, &programs))
                .collect();
            by_name(&mut cards, |d| d.category.name.as_str());
            Ok(cards)
        })
    }

    // =========================================================================
    // SUB-PROJECTS
    // =========================================================================

    pub fn create_sub_project(&self, form: SubProjectForm) -> Result<SubProject> {
        let name = clean_name(&form.name, "sub-project name")?;
        self.store.write(|tx| {
            tx.require::<Category>(form.category_id.key())?;
            let taken = tx
                .all::<SubProject>()?
                .iter()
                .any(|s| s.category_id == form.category_id && s.name.eq_ignore_ascii_case(&name));
            if taken {
                return Err(CoreError::conflict(format!(
                    "Sub-project {name} already exists in this category"
                )));
            }
            let at = now();
            let sub_project = SubProject {
                id: SubProjectId::new(),
                category_id: form.category_id,
                name,
                created_at: at,
                updated_at: at,
            };
            tx.put(&sub_project)?;
            Ok(sub_project)
        })
    }

    /// Rename or move a sub-project. Moving is refused while programs of
    /// the old category point at it.
    pub fn update_sub_project(&self, id: SubProjectId, form: SubProjectForm) -> Result<SubProject> {
        let name = clean_name(&form.name, "sub-project name")?;
        self.store.write(|tx| {
            let mut sub_project = tx.require::<SubProject>(id.key())?;
            tx.require::<Category>(form.category_id.key())?;
            if form.category_id != sub_project.category_id {
                let stranded = tx
                    .all::<Program>()?
                    .iter()
                    .any(|p| p.sub_project_id == Some(id) && p.category_id != form.category_id);
                if stranded {
                    return Err(CoreError::conflict(
                        "Programs of the current category still use this sub-project",
                    ));
                }
            }
            sub_project.name = name;
            sub_project.category_id = form.category_id;
            sub_project.updated_at = now();
            tx.put(&sub_project)?;
            Ok(sub_project)
        })
    }

    pub fn delete_sub_project(&self, id: SubProjectId) -> Result<()> {
        self.store.write(|tx| {
            let sub_project = tx.require::<SubProject>(id.key())?;
            let programs = tx
                .all::<Program>()?
                .iter()
                .filter(|p| p.sub_project_id == Some(id))
                .count();
            if programs > 0 {
                return Err(CoreError::conflict(format!(
                    "Cannot delete {}: it still has {}",
                    sub_project.name,
                    plural(programs, "program")
                )));
            }
            tx.remove::<SubProject>(id.key())?;
            Ok(())
        })
    }

    /// Sub-projects, optionally of one category, by name.
    pub fn list_sub_projects(&self, category: Option<CategoryId>) -> Result<Vec<SubProject>> {
        let mut sub_projects: Vec<SubProject> = self
            .store
            .read(|tx| tx.all::<SubProject>())?
            .into_iter()
            .filter(|s| category.is_none_or(|c| s.category_id == c))
            .collect();
        by_name(&mut sub_projects, |s| s.name.as_str());
        Ok(sub_projects)
    }

    // =========================================================================
    // PROGRAMS
    // =========================================================================

    pub fn create_program(&self, form: ProgramForm) -> Result<Program> {
        let name = clean_name(&form.name, "program name")?;
        let description = clean_text(form.description, "description")?;
        let conditions = clean_text(form.conditions, "conditions")?;
        self.store.write(|tx| {
            tx.require::<Category>(form.category_id.key())?;
            check_sub_project(tx, form.sub_project_id, form.category_id)?;
            let at = now();
            let program = Program {
                id: ProgramId::new(),
                category_id: form.category_id,
                sub_project_id: form.sub_project_id,
                name,
                description,
                conditions,
                created_at: at,
                updated_at: at,
            };
            tx.put(&program)?;
            Ok(program)
        })
    }

    /// Update a program. Moving it to another category is refused while
    /// registrations reference it.
    pub fn update_program(&self, id: ProgramId, form: ProgramForm) -> Result<Program> {
        let name = clean_name(&form.name, "program name")?;
        let description = clean_text(form.description, "description")?;
        let conditions = clean_text(form.conditions, "conditions")?;
        self.store.write(|tx| {
            let mut program = tx.require::<Program>(id.key())?;
            tx.require::<Category>(form.category_id.key())?;
            check_sub_project(tx, form.sub_project_id, form.category_id)?;
            if form.category_id != program.category_id {
                let registrations = tx
                    .all::<Registration>()?
                    .iter()
                    .filter(|r| r.program_id == Some(id))
                    .count();
                if registrations > 0 {
                    return Err(CoreError::conflict(format!(
                        "Cannot move {} to another category: it still has {}",
                        program.name,
                        plural(registrations, "registration")
                    )));
                }
            }
            program.name = name;
            program.category_id = form.category_id;
            program.sub_project_id = form.sub_project_id;
            program.description = description;
            program.conditions = conditions;
            program.updated_at = now();
            tx.put(&program)?;
            Ok(program)
        })
    }

    /// Delete a program no registration references.
    pub fn delete_program(&self, id: ProgramId) -> Result<()> {
        self.store.write(|tx| {
            let program = tx.require::<Program>(id.key())?;
            let registrations = tx
                .all::<Registration>()?
                .iter()
                .filter(|r| r.program_id == Some(id))
                .count();
            if registrations > 0 {
                return Err(CoreError::conflict(format!(
                    "Cannot delete {}: it still has {}",
                    program.name,
                    plural(registrations, "registration")
                )));
            }
            tx.remove::<Program>(id.key())?;
            Ok(())
        })
    }

    pub fn get_program(&self, id: ProgramId) -> Result<ProgramView> {
        self.store.read(|tx| {
            let program = tx.require::<Program>(id.key())?;
            Ok(Catalogue::load(tx)?.program_view(&program))
        })
    }

    /// Programs grouped by category name. `search` matches program name,
    /// description or category name, case-insensitively.
    pub fn list_programs(&self, search: Option<&str>) -> Result<Vec<ProgramGroup>> {
        let term = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self.store.read(|tx| {
            let catalogue = Catalogue::load(tx)?;
            let mut groups: BTreeMap<String, Vec<ProgramView>> = BTreeMap::new();
            for program in tx.all::<Program>()? {
                let view = catalogue.program_view(&program);
                if let Some(term) = &term {
                    let hit = view.program.name.to_lowercase().contains(term)
                        || view
                            .program
                            .description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(term))
                        || view.category_name.to_lowercase().contains(term);
                    if !hit {
                        continue;
                    }
                }
                groups
                    .entry(view.category_name.clone())
                    .or_default()
                    .push(view);
            }
            Ok(groups
                .into_iter()
                .map(|(category_name, mut programs)| {
                    by_name(&mut programs, |p| p.program.name.as_str());
                    ProgramGroup {
                        category_name,
                        programs,
                    }
                })
                .collect())
        })
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub fn create_notification(&self, form: NotificationForm) -> Result<Notification> {
        let title = clean_name(&form.title, "title")?;
        let message = clean_required_text(&form.message, "message")?;
        self.store.write(|tx| {
            target_exists(tx, form.kind, form.target_id)?;
            let at = now();
            let notification = Notification {
                id: NotificationId::new(),
                kind: form.kind,
                target_id: form.target_id,
                title,
                message,
                is_active: form.is_active,
                created_at: at,
                updated_at: at,
            };
            tx.put(&notification)?;
            Ok(notification)
        })
    }

    pub fn update_notification(
        &self,
        id: NotificationId,
        form: NotificationForm,
    ) -> Result<Notification> {
        let title = clean_name(&form.title, "title")?;
        let message = clean_required_text(&form.message, "message")?;
        self.store.write(|tx| {
            let mut notification = tx.require::<Notification>(id.key())?;
            target_exists(tx, form.kind, form.target_id)?;
            notification.kind = form.kind;
            notification.target_id = form.target_id;
            notification.title = title;
            notification.message = message;
            notification.is_active = form.is_active;
            notification.updated_at = now();
            tx.put(&notification)?;
            Ok(notification)
        })
    }

    pub fn delete_notification(&self, id: NotificationId) -> Result<()> {
        self.store.write(|tx| {
            if !tx.remove::<Notification>(id.key())? {
                return Err(CoreError::not_found("notification", id));
            }
            Ok(())
        })
    }

    /// All notifications, newest first, with the name of their target.
    pub fn list_notifications(&self) -> Result<Vec<NotificationView>> {
        self.store.read(|tx| {
            let catalogue = Catalogue::load(tx)?;
            let programs: BTreeMap<u128, Program> = tx
                .all::<Program>()?
                .into_iter()
                .map(|p| (p.id.key(), p))
                .collect();
            let mut views: Vec<NotificationView> = tx
                .all::<Notification>()?
                .into_iter()
                .map(|notification| {
                    let key = notification.target_id.as_u128();
                    let name = match notification.kind {
                        NotificationKind::Category => {
                            catalogue.categories.get(&key).map(|c| c.name.clone())
                        }
                        NotificationKind::SubProject => {
                            catalogue.sub_projects.get(&key).map(|s| s.name.clone())
                        }
                        NotificationKind::Program => programs.get(&key).map(|p| p.name.clone()),
                    };
                    NotificationView {
                        target_name: name
                            .unwrap_or_else(|| notification.kind.unknown_target_label().into()),
                        notification,
                    }
                })
                .collect();
            views.sort_by(|a, b| b.notification.created_at.cmp(&a.notification.created_at));
            Ok(views)
        })
    }
}

fn details_for(category: Category, catalogue: &Catalogue, programs: &[Program]) -> CategoryDetails {
    let mut category_programs: Vec<ProgramView> = programs
        .iter()
        .filter(|p| p.category_id == category.id)
        .map(|p| catalogue.program_view(p))
        .collect();
    by_name(&mut category_programs, |p| p.program.name.as_str());
    let mut sub_projects: Vec<SubProject> = catalogue
        .sub_projects
        .values()
        .filter(|s| s.category_id == category.id)
        .cloned()
        .collect();
    by_name(&mut sub_projects, |s| s.name.as_str());
    CategoryDetails {
        category,
        programs: category_programs,
        sub_projects,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use crate::error::CoreError;
    use crate::filter::RegistrationFilter;
    use crate::portal::testing::{category, client, portal, program};
    use crate::types::{
        CategoryForm, NotificationForm, NotificationKind, ProgramForm, SubProjectForm,
    };

    #[test]
    fn category_names_are_unique_and_trimmed() {
        let (_dir, portal) = portal();
        let food = category(&portal, "  foodelife ");
        assert_eq!(food.name, "foodelife");
        assert!(matches!(
            portal.create_category(CategoryForm {
                name: "FOODELIFE".into(),
                ..CategoryForm::default()
            }),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            portal.create_category(CategoryForm::default()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn toggle_flips_and_set_is_idempotent() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        assert!(!portal.toggle_category(food.id).unwrap().is_active);
        assert!(portal.toggle_category(food.id).unwrap().is_active);
        assert!(portal.set_category_active(food.id, true).unwrap().is_active);
        assert_eq!(portal.category_cards(true).unwrap().len(), 1);
    }

    #[test]
    fn category_with_programs_cannot_be_deleted() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let bakery = program(&portal, &food, "Bakery");

        assert!(matches!(
            portal.delete_category(food.id),
            Err(CoreError::Conflict(msg)) if msg.contains("1 program")
        ));
        portal.delete_program(bakery.id).unwrap();
        portal.delete_category(food.id).unwrap();
        assert!(matches!(
            portal.category_details(food.id),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn program_sub_project_must_share_category() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let farm = category(&portal, "farmelife");
        let dairy_unit = portal
            .create_sub_project(SubProjectForm {
                name: "Dairy unit".into(),
                category_id: farm.id,
            })
            .unwrap();

        let wrong = portal.create_program(ProgramForm {
            name: "Bakery".into(),
            category_id: food.id,
            sub_project_id: Some(dairy_unit.id),
            description: None,
            conditions: None,
        });
        assert!(matches!(wrong, Err(CoreError::Validation(_))));

        let right = portal
            .create_program(ProgramForm {
                name: "Milk collection".into(),
                category_id: farm.id,
                sub_project_id: Some(dairy_unit.id),
                description: None,
                conditions: Some("Owns two cows".into()),
            })
            .unwrap();
        let view = portal.get_program(right.id).unwrap();
        assert_eq!(view.sub_project_name.as_deref(), Some("Dairy unit"));

        assert!(matches!(
            portal.delete_sub_project(dairy_unit.id),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            portal.update_sub_project(
                dairy_unit.id,
                SubProjectForm {
                    name: "Dairy unit".into(),
                    category_id: food.id,
                }
            ),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn program_with_registrations_cannot_be_deleted() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let bakery = program(&portal, &food, "Bakery");
        client(&portal, "9100000001", "foodelife");
        portal
            .apply_for_program("9100000001", bakery.id, "x", "y")
            .unwrap();
        assert!(matches!(
            portal.delete_program(bakery.id),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn program_with_registrations_keeps_its_category() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let farm = category(&portal, "farmelife");
        let bakery = program(&portal, &food, "Bakery");
        client(&portal, "9100000002", "foodelife");
        portal
            .apply_for_program("9100000002", bakery.id, "x", "y")
            .unwrap();

        let moved = portal.update_program(
            bakery.id,
            ProgramForm {
                name: "Bakery".into(),
                category_id: farm.id,
                sub_project_id: None,
                description: None,
                conditions: None,
            },
        );
        assert!(matches!(
            moved,
            Err(CoreError::Conflict(msg)) if msg.contains("1 registration")
        ));
        assert_eq!(portal.get_program(bakery.id).unwrap().program.category_id, food.id);

        let rows = portal
            .registration_rows(&RegistrationFilter::default())
            .unwrap();
        assert_eq!(rows[0].category_name, "foodelife");
        assert_eq!(rows[0].program_name.as_deref(), Some("Bakery"));

        let renamed = portal
            .update_program(
                bakery.id,
                ProgramForm {
                    name: "Bakery and Confectionery".into(),
                    category_id: food.id,
                    sub_project_id: None,
                    description: None,
                    conditions: None,
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "Bakery and Confectionery");
    }

    #[test]
    fn program_without_registrations_can_move() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let farm = category(&portal, "farmelife");
        let bakery = program(&portal, &food, "Bakery");

        let moved = portal
            .update_program(
                bakery.id,
                ProgramForm {
                    name: "Bakery".into(),
                    category_id: farm.id,
                    sub_project_id: None,
                    description: None,
                    conditions: None,
                },
            )
            .unwrap();
        assert_eq!(moved.category_id, farm.id);
    }

    #[test]
    fn programs_group_by_category_and_search() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let farm = category(&portal, "farmelife");
        for (cat, name) in [(&food, "Catering"), (&food, "Bakery"), (&farm, "Dairy")] {
            program(&portal, cat, name);
        }

        let groups = portal.list_programs(None).unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.category_name.as_str()).collect();
        assert_eq!(names, vec!["farmelife", "foodelife"]);
        let food_programs: Vec<_> = groups[1]
            .programs
            .iter()
            .map(|p| p.program.name.as_str())
            .collect();
        assert_eq!(food_programs, vec!["Bakery", "Catering"]);

        let by_category = portal.list_programs(Some("FARME")).unwrap();
        assert_eq!(by_category.len(), 1);
        let by_description = portal.list_programs(Some("bakery desc")).unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].programs.len(), 1);
    }

    #[test]
    fn notifications_need_an_existing_target_and_resolve_names() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");

        let missing = portal.create_notification(NotificationForm {
            title: "t".into(),
            message: "m".into(),
            kind: NotificationKind::Program,
            target_id: food.id.0,
            is_active: true,
        });
        assert!(matches!(missing, Err(CoreError::NotFound { kind: "program", .. })));

        let created = portal
            .create_notification(NotificationForm {
                title: "Orientation".into(),
                message: "Monday 10am".into(),
                kind: NotificationKind::Category,
                target_id: food.id.0,
                is_active: true,
            })
            .unwrap();
        let listed = portal.list_notifications().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].target_name, "foodelife");

        portal.delete_notification(created.id).unwrap();
        assert!(matches!(
            portal.delete_notification(created.id),
            Err(CoreError::NotFound { .. })
        ));
    }
}
