//! # Portal
//!
//! The service the app layer talks to. Every operation opens its own redb
//! transaction; rules that check and then write do both inside one write
//! transaction.
//!
//! Operations are grouped by audience:
//! - `citizen`: mobile verification, registration, program applications, stop requests
//! - `catalogue`: categories, sub-projects, programs, notifications
//! - `records`: clients and uploads, registration review, stop request decisions
//! - `accounts`: admin accounts and login

mod accounts;
mod catalogue;
mod citizen;
mod records;
mod views;

pub use views::*;

use crate::error::{CoreError, Result};
use crate::password::DEFAULT_ITERATIONS;
use crate::storage::{Store, TableCounts, Tables};
use crate::types::{Category, Client, Program, SubProject, Timestamp};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

/// The E-Life registration service.
#[derive(Debug)]
pub struct Portal {
    store: Store,
    hash_iterations: u32,
}

impl Portal {
    /// Open the database at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Store::open(path)?))
    }

    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            hash_iterations: DEFAULT_ITERATIONS,
        }
    }

    /// PBKDF2 iterations for passwords hashed from now on.
    #[must_use]
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations.max(1);
        self
    }

    /// Row counts per table.
    pub fn counts(&self) -> Result<TableCounts> {
        self.store.counts()
    }
}

fn now() -> Timestamp {
    Utc::now()
}

/// Client holding this mobile number.
fn client_by_mobile(tx: &impl Tables, mobile: &str) -> Result<Client> {
    tx.all::<Client>()?
        .into_iter()
        .find(|c| c.mobile_number == mobile)
        .ok_or(CoreError::NotRegistered)
}

/// Lookup tables for joining programs with their category and sub-project.
struct Catalogue {
    categories: BTreeMap<u128, Category>,
    sub_projects: BTreeMap<u128, SubProject>,
}

impl Catalogue {
    fn load(tx: &impl Tables) -> Result<Self> {
        Ok(Self {
            categories: tx
                .all::<Category>()?
                .into_iter()
                .map(|c| (c.id.key(), c))
                .collect(),
            sub_projects: tx
                .all::<SubProject>()?
                .into_iter()
                .map(|s| (s.id.key(), s))
                .collect(),
        })
    }

    fn category_list(&self) -> Vec<Category> {
        self.categories.values().cloned().collect()
    }

    fn program_view(&self, program: &Program) -> ProgramView {
        ProgramView {
            program: program.clone(),
            category_name: self
                .categories
                .get(&program.category_id.key())
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            sub_project_name: program
                .sub_project_id
                .and_then(|id| self.sub_projects.get(&id.key()))
                .map(|s| s.name.clone()),
        }
    }
}

fn by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        name(a)
            .to_lowercase()
            .cmp(&name(b).to_lowercase())
    });
}
