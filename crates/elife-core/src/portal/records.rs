//! Client data, registration review and stop request decisions.

use super::{Portal, now};
use crate::MAX_UPLOAD_BYTES;
use crate::error::{CoreError, Result};
use crate::filter::{RegistrationFilter, RegistrationRow, StatusStats, distinct_panchayaths};
use crate::formats::parse_upload;
use crate::portal::views::{StopRequestView, UploadSummary};
use crate::status::{ReviewDecision, StatusAction, StopDecision, StopRequestStatus};
use crate::storage::Tables;
use crate::types::{
    Category, Client, ClientId, FileUpload, FileUploadId, Program, Registration, RegistrationId,
    StopRequest, StopRequestId, clean_text,
};
use std::collections::{BTreeMap, BTreeSet};

fn join_rows(tx: &impl Tables) -> Result<Vec<RegistrationRow>> {
    let clients: BTreeMap<u128, Client> = tx
        .all::<Client>()?
        .into_iter()
        .map(|c| (c.id.key(), c))
        .collect();
    let categories: BTreeMap<u128, Category> = tx
        .all::<Category>()?
        .into_iter()
        .map(|c| (c.id.key(), c))
        .collect();
    let programs: BTreeMap<u128, Program> = tx
        .all::<Program>()?
        .into_iter()
        .map(|p| (p.id.key(), p))
        .collect();
    Ok(tx
        .all::<Registration>()?
        .iter()
        .map(|r| {
            RegistrationRow::join(
                r,
                clients.get(&r.client_id.key()),
                categories.get(&r.category_id.key()),
                r.program_id.and_then(|p| programs.get(&p.key())),
            )
        })
        .collect())
}

impl Portal {
    // =========================================================================
    // CLIENTS
    // =========================================================================

    /// Import clients from an uploaded CSV or XLSX file.
    ///
    /// Rows are upserted by customer id; an existing client keeps its id.
    /// A row whose mobile number belongs to a different customer is skipped.
    /// A customer id repeated within the file is counted once; the last row wins.
    pub fn upload_clients(
        &self,
        filename: &str,
        bytes: &[u8],
        uploaded_by: Option<&str>,
    ) -> Result<UploadSummary> {
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(CoreError::validation(format!(
                "upload exceeds {} MiB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        let parsed = parse_upload(filename, bytes)?;

        self.store.write(|tx| {
            let at = now();
            let upload_id = FileUploadId::new();
            let mut by_customer: BTreeMap<String, Client> = tx
                .all::<Client>()?
                .into_iter()
                .map(|c| (c.customer_id.clone(), c))
                .collect();
            let mut mobile_owner: BTreeMap<String, String> = by_customer
                .values()
                .map(|c| (c.mobile_number.clone(), c.customer_id.clone()))
                .collect();

            let (mut inserted, mut updated) = (0u64, 0u64);
            let mut seen_in_file = BTreeSet::new();
            let mut skipped_conflicts = Vec::new();

            for record in parsed.records {
                if mobile_owner
                    .get(&record.mobile_number)
                    .is_some_and(|owner| *owner != record.customer_id)
                {
                    skipped_conflicts.push(record.customer_id);
                    continue;
                }

                let first_in_file = seen_in_file.insert(record.customer_id.clone());
                let client = match by_customer.get(&record.customer_id) {
                    Some(existing) => {
                        if first_in_file {
                            updated += 1;
                        }
                        mobile_owner.remove(&existing.mobile_number);
                        Client {
                            id: existing.id,
                            created_at: existing.created_at,
                            ..Client::from_record(record, upload_id, at)
                        }
                    }
                    None => {
                        inserted += 1;
                        Client::from_record(record, upload_id, at)
                    }
                };
                tx.put(&client)?;
                mobile_owner.insert(client.mobile_number.clone(), client.customer_id.clone());
                by_customer.insert(client.customer_id.clone(), client);
            }

            let upload = FileUpload {
                id: upload_id,
                filename: filename.trim().to_string(),
                file_type: parsed.kind.as_str().to_string(),
                records_count: inserted + updated,
                uploaded_by: uploaded_by.map(str::to_string),
                upload_date: at,
                created_at: at,
                updated_at: at,
            };
            tx.put(&upload)?;

            Ok(UploadSummary {
                upload,
                inserted,
                updated,
                skipped_invalid: parsed.skipped as u64,
                skipped_conflicts,
            })
        })
    }

    /// All clients, newest first.
    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients = self.store.read(|tx| tx.all::<Client>())?;
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(clients)
    }

    /// Delete a client with no registrations.
    pub fn delete_client(&self, id: ClientId) -> Result<()> {
        self.store.write(|tx| {
            let client = tx.require::<Client>(id.key())?;
            let registrations = tx
                .all::<Registration>()?
                .iter()
                .filter(|r| r.client_id == id)
                .count();
            if registrations > 0 {
                return Err(CoreError::conflict(format!(
                    "Cannot delete {}: they have {registrations} registration(s)",
                    client.name
                )));
            }
            tx.remove::<Client>(id.key())?;
            Ok(())
        })
    }

    /// Upload history, newest first.
    pub fn list_uploads(&self) -> Result<Vec<FileUpload>> {
        let mut uploads = self.store.read(|tx| tx.all::<FileUpload>())?;
        uploads.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(uploads)
    }

    // =========================================================================
    // REGISTRATIONS
    // =========================================================================

    /// Joined registration rows matching `filter`, newest registration first.
    pub fn registration_rows(&self, filter: &RegistrationFilter) -> Result<Vec<RegistrationRow>> {
        filter.status()?;
        let mut rows: Vec<RegistrationRow> = self
            .store
            .read(join_rows)?
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by(|a, b| b.registration_date.cmp(&a.registration_date));
        Ok(rows)
    }

    /// Stopped and stop-requested registrations matching `filter`, most
    /// recently changed first.
    pub fn stopped_rows(&self, filter: &RegistrationFilter) -> Result<Vec<RegistrationRow>> {
        filter.status()?;
        let mut rows: Vec<RegistrationRow> = self
            .store
            .read(join_rows)?
            .into_iter()
            .filter(|row| row.status.is_stopped_view() && filter.matches(row))
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    /// Registration counts per status.
    pub fn stats(&self) -> Result<StatusStats> {
        let registrations = self.store.read(|tx| tx.all::<Registration>())?;
        Ok(StatusStats::tally(registrations.iter().map(|r| r.status)))
    }

    /// Panchayaths of registered clients, for the filter dropdown.
    pub fn panchayaths(&self) -> Result<Vec<String>> {
        let rows = self.store.read(join_rows)?;
        Ok(distinct_panchayaths(&rows))
    }

    /// Approve or reject a pending registration.
    pub fn update_registration_status(
        &self,
        id: RegistrationId,
        decision: ReviewDecision,
    ) -> Result<Registration> {
        self.store.write(|tx| {
            let mut registration = tx.require::<Registration>(id.key())?;
            registration.status = registration.status.apply(decision.action())?;
            registration.updated_at = now();
            tx.put(&registration)?;
            Ok(registration)
        })
    }

    /// Put a stopped (or stop-requested) registration back to pending.
    /// Pending stop requests for it are closed as rejected.
    pub fn restore_registration(&self, id: RegistrationId) -> Result<Registration> {
        self.store.write(|tx| {
            let mut registration = tx.require::<Registration>(id.key())?;
            registration.status = registration.status.apply(StatusAction::Restore)?;
            let at = now();
            registration.updated_at = at;
            tx.put(&registration)?;

            for mut request in tx.all::<StopRequest>()? {
                if request.registration_id == id && request.status == StopRequestStatus::Pending {
                    request.status = StopRequestStatus::Rejected;
                    request.updated_at = at;
                    tx.put(&request)?;
                }
            }
            Ok(registration)
        })
    }

    /// Delete a registration and its stop requests.
    pub fn delete_registration(&self, id: RegistrationId) -> Result<()> {
        self.store.write(|tx| {
            if !tx.remove::<Registration>(id.key())? {
                return Err(CoreError::not_found("registration", id));
            }
            for request in tx.all::<StopRequest>()? {
                if request.registration_id == id {
                    tx.remove::<StopRequest>(request.id.key())?;
                }
            }
            Ok(())
        })
    }

    // =========================================================================
    // STOP REQUESTS
    // =========================================================================

    /// Stop requests, newest first, optionally of one status.
    pub fn list_stop_requests(
        &self,
        status: Option<StopRequestStatus>,
    ) -> Result<Vec<StopRequestView>> {
        self.store.read(|tx| {
            let clients: BTreeMap<u128, Client> = tx
                .all::<Client>()?
                .into_iter()
                .map(|c| (c.id.key(), c))
                .collect();
            let categories: BTreeMap<u128, Category> = tx
                .all::<Category>()?
                .into_iter()
                .map(|c| (c.id.key(), c))
                .collect();
            let registrations: BTreeMap<u128, Registration> = tx
                .all::<Registration>()?
                .into_iter()
                .map(|r| (r.id.key(), r))
                .collect();

            let mut views: Vec<StopRequestView> = tx
                .all::<StopRequest>()?
                .into_iter()
                .filter(|r| status.is_none_or(|s| r.status == s))
                .map(|request| {
                    let client = clients.get(&request.client_id.key());
                    let category_name = registrations
                        .get(&request.registration_id.key())
                        .and_then(|r| categories.get(&r.category_id.key()))
                        .map(|c| c.name.clone())
                        .or_else(|| request.current_category.clone())
                        .unwrap_or_default();
                    StopRequestView {
                        client_name: client.map(|c| c.name.clone()).unwrap_or_default(),
                        customer_id: client.map(|c| c.customer_id.clone()).unwrap_or_default(),
                        category_name,
                        request,
                    }
                })
                .collect();
            views.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
            Ok(views)
        })
    }

    /// Decide a pending stop request. The request and its registration are
    /// updated together.
    pub fn resolve_stop_request(
        &self,
        id: StopRequestId,
        decision: StopDecision,
        notes: Option<String>,
    ) -> Result<StopRequest> {
        let notes = clean_text(notes, "admin notes")?;
        self.store.write(|tx| {
            let mut request = tx.require::<StopRequest>(id.key())?;
            if request.status != StopRequestStatus::Pending {
                return Err(CoreError::conflict("This stop request has already been resolved"));
            }
            let mut registration = tx.require::<Registration>(request.registration_id.key())?;
            let (action, outcome) = decision.resolve(request.previous_status);
            registration.status = registration.status.apply(action)?;

            let at = now();
            registration.updated_at = at;
            request.status = outcome;
            request.admin_notes = notes;
            request.updated_at = at;
            tx.put(&registration)?;
            tx.put(&request)?;
            Ok(request)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use crate::error::CoreError;
    use crate::filter::RegistrationFilter;
    use crate::portal::testing::{category, client, portal, program};
    use crate::status::{RegistrationStatus, ReviewDecision, StopDecision, StopRequestStatus};

    const UPLOAD: &str = "Customer ID,Name,Mobile Number,Category,Panchayath\n\
                          C1,Anu,9200000001,foodelife,Pala\n\
                          C2,Biju,9200000002,jobcard,Aluva\n\
                          C3,,9200000003,foodelife,Pala\n";

    #[test]
    fn upload_inserts_then_updates_by_customer_id() {
        let (_dir, portal) = portal();
        let first = portal
            .upload_clients("clients.csv", UPLOAD.as_bytes(), Some("admin"))
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.updated, 0);
        assert_eq!(first.skipped_invalid, 1);
        assert_eq!(first.upload.records_count, 2);
        assert_eq!(first.upload.file_type, "csv");

        let before = portal.list_clients().unwrap();
        let anu_id = before
            .iter()
            .find(|c| c.customer_id == "C1")
            .map(|c| c.id)
            .unwrap();

        let again = "Customer ID,Name,Mobile Number\nC1,Anu M,9200000011\n";
        let second = portal.upload_clients("more.csv", again.as_bytes(), None).unwrap();
        assert_eq!((second.inserted, second.updated), (0, 1));

        let after = portal.list_clients().unwrap();
        assert_eq!(after.len(), 2);
        let anu = after.iter().find(|c| c.customer_id == "C1").unwrap();
        assert_eq!(anu.id, anu_id);
        assert_eq!(anu.name, "Anu M");
        assert_eq!(anu.mobile_number, "9200000011");

        portal.verify_mobile("9200000011").unwrap();
        assert!(matches!(
            portal.verify_mobile("9200000001"),
            Err(CoreError::NotRegistered)
        ));
        assert_eq!(portal.list_uploads().unwrap().len(), 2);
    }

    #[test]
    fn repeated_customer_id_in_one_file_counts_once() {
        let (_dir, portal) = portal();
        let repeated = "Customer ID,Name,Mobile Number\n\
                        C1,Anu,9200000001\n\
                        C1,Anu M,9200000011\n\
                        C2,Biju,9200000002\n";
        let first = portal.upload_clients("a.csv", repeated.as_bytes(), None).unwrap();
        assert_eq!((first.inserted, first.updated), (2, 0));
        assert_eq!(first.upload.records_count, 2);

        let clients = portal.list_clients().unwrap();
        assert_eq!(clients.len(), 2);
        let anu = clients.iter().find(|c| c.customer_id == "C1").unwrap();
        assert_eq!(anu.name, "Anu M");
        assert_eq!(anu.mobile_number, "9200000011");

        let again = portal.upload_clients("b.csv", repeated.as_bytes(), None).unwrap();
        assert_eq!((again.inserted, again.updated), (0, 2));
        assert_eq!(again.upload.records_count, 2);
    }

    #[test]
    fn upload_skips_mobile_owned_by_another_customer() {
        let (_dir, portal) = portal();
        portal.upload_clients("a.csv", UPLOAD.as_bytes(), None).unwrap();
        let clash = "Customer ID,Name,Mobile Number\nC9,Imposter,9200000001\nC10,New,9200000010\n";
        let summary = portal.upload_clients("b.csv", clash.as_bytes(), None).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped_conflicts, vec!["C9".to_string()]);
    }

    #[test]
    fn bad_upload_is_an_upload_error() {
        let (_dir, portal) = portal();
        assert!(matches!(
            portal.upload_clients("a.csv", b"Name\nAnu\n", None),
            Err(CoreError::Upload(_))
        ));
        assert!(portal.list_uploads().unwrap().is_empty());
    }

    #[test]
    fn client_with_registrations_cannot_be_deleted() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let anu = client(&portal, "9200000020", "foodelife");
        let biju = client(&portal, "9200000021", "foodelife");
        portal.register("9200000020", food.id).unwrap();

        assert!(matches!(portal.delete_client(anu.id), Err(CoreError::Conflict(_))));
        portal.delete_client(biju.id).unwrap();
    }

    #[test]
    fn review_moves_pending_registrations_once() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        client(&portal, "9200000030", "foodelife");
        let reg = portal.register("9200000030", food.id).unwrap();

        let approved = portal
            .update_registration_status(reg.id, ReviewDecision::Approve)
            .unwrap();
        assert_eq!(approved.status, RegistrationStatus::Approved);
        assert!(matches!(
            portal.update_registration_status(reg.id, ReviewDecision::Reject),
            Err(CoreError::InvalidTransition { .. })
        ));

        let stats = portal.stats().unwrap();
        assert_eq!((stats.total, stats.approved), (1, 1));
    }

    #[test]
    fn rows_join_and_filter() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        let farm = category(&portal, "farmelife");
        let bakery = program(&portal, &food, "Bakery");
        client(&portal, "9200000040", "jobcard");
        client(&portal, "9200000041", "farmelife");
        portal
            .apply_for_program("9200000040", bakery.id, "2y", "ovens")
            .unwrap();
        portal.register("9200000041", farm.id).unwrap();

        let all = portal
            .registration_rows(&RegistrationFilter::default())
            .unwrap();
        assert_eq!(all.len(), 2);
        let food_rows: Vec<_> = all.iter().filter(|r| r.category_name == "foodelife").collect();
        assert_eq!(food_rows.len(), 1);
        assert_eq!(food_rows[0].program_name.as_deref(), Some("Bakery"));
        assert_eq!(food_rows[0].customer_id, "C-9200000040");

        let filtered = portal
            .registration_rows(&RegistrationFilter {
                category: Some("farmelife".into()),
                ..RegistrationFilter::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);

        assert!(matches!(
            portal.registration_rows(&RegistrationFilter {
                status: Some("paused".into()),
                ..RegistrationFilter::default()
            }),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(portal.panchayaths().unwrap(), vec!["Pala".to_string()]);
    }

    #[test]
    fn stop_decisions_update_request_and_registration() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        client(&portal, "9200000050", "foodelife");
        let reg = portal.register("9200000050", food.id).unwrap();
        portal
            .update_registration_status(reg.id, ReviewDecision::Approve)
            .unwrap();

        // Denied: back to approved.
        let first = portal.request_stop("9200000050", reg.id).unwrap();
        let denied = portal
            .resolve_stop_request(first.id, StopDecision::Reject, Some(" busy ".into()))
            .unwrap();
        assert_eq!(denied.status, StopRequestStatus::Rejected);
        assert_eq!(denied.admin_notes.as_deref(), Some("busy"));
        assert!(matches!(
            portal.resolve_stop_request(first.id, StopDecision::Stop, None),
            Err(CoreError::Conflict(_))
        ));
        let rows = portal.registration_rows(&RegistrationFilter::default()).unwrap();
        assert_eq!(rows[0].status, RegistrationStatus::Approved);

        // Confirmed: stopped, listed, restorable.
        let second = portal.request_stop("9200000050", reg.id).unwrap();
        assert_eq!(
            portal
                .list_stop_requests(Some(StopRequestStatus::Pending))
                .unwrap()
                .len(),
            1
        );
        portal
            .resolve_stop_request(second.id, StopDecision::Stop, None)
            .unwrap();
        let stopped = portal.stopped_rows(&RegistrationFilter::default()).unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].status, RegistrationStatus::Stopped);

        let restored = portal.restore_registration(reg.id).unwrap();
        assert_eq!(restored.status, RegistrationStatus::Pending);
        assert!(
            portal
                .stopped_rows(&RegistrationFilter::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn restoring_a_stop_request_rejects_the_pending_request() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        client(&portal, "9200000070", "foodelife");
        let reg = portal.register("9200000070", food.id).unwrap();
        let request = portal.request_stop("9200000070", reg.id).unwrap();
        assert_eq!(request.status, StopRequestStatus::Pending);

        let restored = portal.restore_registration(reg.id).unwrap();
        assert_eq!(restored.status, RegistrationStatus::Pending);

        let requests = portal.list_stop_requests(None).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request.id, request.id);
        assert_eq!(requests[0].request.status, StopRequestStatus::Rejected);
        assert!(
            portal
                .list_stop_requests(Some(StopRequestStatus::Pending))
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            portal.resolve_stop_request(request.id, StopDecision::Stop, None),
            Err(CoreError::Conflict(_))
        ));

        let rows = portal.registration_rows(&RegistrationFilter::default()).unwrap();
        assert_eq!(rows[0].status, RegistrationStatus::Pending);
        assert!(
            portal
                .stopped_rows(&RegistrationFilter::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn deleting_a_registration_removes_its_stop_requests() {
        let (_dir, portal) = portal();
        let food = category(&portal, "foodelife");
        client(&portal, "9200000060", "foodelife");
        let reg = portal.register("9200000060", food.id).unwrap();
        portal.request_stop("9200000060", reg.id).unwrap();

        portal.delete_registration(reg.id).unwrap();
        assert!(portal.list_stop_requests(None).unwrap().is_empty());
        assert!(matches!(
            portal.delete_registration(reg.id),
            Err(CoreError::NotFound { .. })
        ));
    }
}
