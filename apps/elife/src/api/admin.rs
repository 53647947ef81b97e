//! Admin routes, nested under `/admin`. Every handler takes an
//! [`AuthAdmin`] and checks its permission flags before touching the portal.

use super::{
    ApiError, AppState, AuthAdmin, ResolveRequest, SearchQuery, StatusUpdate, StopRequestQuery,
    SubProjectQuery, UploadQuery, run,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use elife_core::formats::{export_file_name, registrations_csv, stopped_csv};
use elife_core::portal::{
    AdminView, CategoryDetails, NotificationView, ProgramGroup, ProgramView, StopRequestView,
    UploadSummary,
};
use elife_core::{
    AdminId, AdminUpdate, Category, CategoryForm, CategoryId, Client, ClientId, FileUpload,
    NewAdmin, Notification, NotificationForm, NotificationId, Permission, Program, ProgramForm,
    ProgramId, Registration, RegistrationFilter, RegistrationId, RegistrationRow, StatusStats,
    StopRequest, StopRequestId, StopRequestStatus, SubProject, SubProjectForm, SubProjectId,
};
use tracing::info;

use Permission::{
    Create, Delete, Edit, ManageCategories, ManageRegistrations, ManageUsers, View, ViewAnalytics,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(category_details)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/categories/{id}/toggle", post(toggle_category))
        .route("/sub-projects", get(list_sub_projects).post(create_sub_project))
        .route(
            "/sub-projects/{id}",
            put(update_sub_project).delete(delete_sub_project),
        )
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/{id}",
            get(get_program).put(update_program).delete(delete_program),
        )
        .route("/clients", get(list_clients))
        .route("/clients/{id}", delete(delete_client))
        .route("/uploads", get(list_uploads).post(upload_clients))
        .route("/registrations", get(list_registrations))
        .route("/registrations/export", get(export_registrations))
        .route("/registrations/stats", get(registration_stats))
        .route("/registrations/panchayaths", get(panchayaths))
        .route("/registrations/{id}", delete(delete_registration))
        .route("/registrations/{id}/status", post(update_registration_status))
        .route("/stopped", get(list_stopped))
        .route("/stopped/export", get(export_stopped))
        .route("/stopped/{id}/restore", post(restore_registration))
        .route("/stop-requests", get(list_stop_requests))
        .route("/stop-requests/{id}/resolve", post(resolve_stop_request))
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route(
            "/notifications/{id}",
            put(update_notification).delete(delete_notification),
        )
        .route("/admins", get(list_admins).post(create_admin))
        .route(
            "/admins/{id}",
            get(get_admin).put(update_admin).delete(delete_admin),
        )
}

fn csv_download(prefix: &str, body: String) -> impl IntoResponse {
    let name = export_file_name(prefix, Utc::now().date_naive());
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
        ],
        body,
    )
}

// =============================================================================
// CATEGORIES
// =============================================================================

async fn list_categories(State(state): State<AppState>, auth: AuthAdmin) -> ApiResult<Vec<Category>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, |p| p.list_categories()).await?))
}

async fn create_category(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    auth.require(&[ManageCategories, Create])?;
    let category = run(&state.portal, move |p| p.create_category(form)).await?;
    info!("{} created category {}", auth.admin.username, category.name);
    Ok((StatusCode::CREATED, Json(category)))
}

async fn category_details(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<CategoryId>,
) -> ApiResult<CategoryDetails> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, move |p| p.category_details(id)).await?))
}

async fn update_category(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<CategoryId>,
    Json(form): Json<CategoryForm>,
) -> ApiResult<Category> {
    auth.require(&[ManageCategories, Edit])?;
    Ok(Json(run(&state.portal, move |p| p.update_category(id, form)).await?))
}

async fn toggle_category(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<CategoryId>,
) -> ApiResult<Category> {
    auth.require(&[ManageCategories, Edit])?;
    let category = run(&state.portal, move |p| p.toggle_category(id)).await?;
    info!(
        "{} set category {} active={}",
        auth.admin.username, category.name, category.is_active
    );
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageCategories, Delete])?;
    run(&state.portal, move |p| p.delete_category(id)).await?;
    info!("{} deleted category {id}", auth.admin.username);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SUB-PROJECTS
// =============================================================================

async fn list_sub_projects(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(query): Query<SubProjectQuery>,
) -> ApiResult<Vec<SubProject>> {
    auth.require(&[View])?;
    Ok(Json(
        run(&state.portal, move |p| p.list_sub_projects(query.category_id)).await?,
    ))
}

async fn create_sub_project(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(form): Json<SubProjectForm>,
) -> Result<(StatusCode, Json<SubProject>), ApiError> {
    auth.require(&[ManageCategories, Create])?;
    let sub_project = run(&state.portal, move |p| p.create_sub_project(form)).await?;
    Ok((StatusCode::CREATED, Json(sub_project)))
}

async fn update_sub_project(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<SubProjectId>,
    Json(form): Json<SubProjectForm>,
) -> ApiResult<SubProject> {
    auth.require(&[ManageCategories, Edit])?;
    Ok(Json(
        run(&state.portal, move |p| p.update_sub_project(id, form)).await?,
    ))
}

async fn delete_sub_project(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<SubProjectId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageCategories, Delete])?;
    run(&state.portal, move |p| p.delete_sub_project(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PROGRAMS
// =============================================================================

async fn list_programs(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<ProgramGroup>> {
    auth.require(&[View])?;
    Ok(Json(
        run(&state.portal, move |p| p.list_programs(query.search.as_deref())).await?,
    ))
}

async fn create_program(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(form): Json<ProgramForm>,
) -> Result<(StatusCode, Json<Program>), ApiError> {
    auth.require(&[ManageCategories, Create])?;
    let program = run(&state.portal, move |p| p.create_program(form)).await?;
    info!("{} created program {}", auth.admin.username, program.name);
    Ok((StatusCode::CREATED, Json(program)))
}

async fn get_program(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<ProgramId>,
) -> ApiResult<ProgramView> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, move |p| p.get_program(id)).await?))
}

async fn update_program(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<ProgramId>,
    Json(form): Json<ProgramForm>,
) -> ApiResult<Program> {
    auth.require(&[ManageCategories, Edit])?;
    Ok(Json(run(&state.portal, move |p| p.update_program(id, form)).await?))
}

async fn delete_program(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<ProgramId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageCategories, Delete])?;
    run(&state.portal, move |p| p.delete_program(id)).await?;
    info!("{} deleted program {id}", auth.admin.username);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CLIENTS & UPLOADS
// =============================================================================

async fn list_clients(State(state): State<AppState>, auth: AuthAdmin) -> ApiResult<Vec<Client>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, |p| p.list_clients()).await?))
}

async fn delete_client(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<ClientId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[Delete])?;
    run(&state.portal, move |p| p.delete_client(id)).await?;
    info!("{} deleted client {id}", auth.admin.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Raw file body; the extension of `?filename=` selects CSV or XLSX.
async fn upload_clients(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadSummary>), ApiError> {
    auth.require(&[Create])?;
    let uploaded_by = auth.admin.username.clone();
    let filename = query.filename;
    let summary = run(&state.portal, move |p| {
        p.upload_clients(&filename, &body, Some(&uploaded_by))
    })
    .await?;
    info!(
        "{} uploaded {}: {} inserted, {} updated, {} invalid, {} conflicting",
        auth.admin.username,
        summary.upload.filename,
        summary.inserted,
        summary.updated,
        summary.skipped_invalid,
        summary.skipped_conflicts.len()
    );
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn list_uploads(State(state): State<AppState>, auth: AuthAdmin) -> ApiResult<Vec<FileUpload>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, |p| p.list_uploads()).await?))
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

async fn list_registrations(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(filter): Query<RegistrationFilter>,
) -> ApiResult<Vec<RegistrationRow>> {
    auth.require(&[View])?;
    Ok(Json(
        run(&state.portal, move |p| p.registration_rows(&filter)).await?,
    ))
}

async fn export_registrations(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(&[View])?;
    let rows = run(&state.portal, move |p| p.registration_rows(&filter)).await?;
    Ok(csv_download("registrations", registrations_csv(&rows)))
}

async fn registration_stats(
    State(state): State<AppState>,
    auth: AuthAdmin,
) -> ApiResult<StatusStats> {
    auth.require(&[ViewAnalytics])?;
    Ok(Json(run(&state.portal, |p| p.stats()).await?))
}

async fn panchayaths(State(state): State<AppState>, auth: AuthAdmin) -> ApiResult<Vec<String>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, |p| p.panchayaths()).await?))
}

async fn update_registration_status(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<RegistrationId>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Registration> {
    auth.require(&[ManageRegistrations])?;
    let registration = run(&state.portal, move |p| {
        p.update_registration_status(id, body.decision)
    })
    .await?;
    info!(
        "{} set registration {id} to {}",
        auth.admin.username, registration.status
    );
    Ok(Json(registration))
}

async fn delete_registration(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<RegistrationId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageRegistrations, Delete])?;
    run(&state.portal, move |p| p.delete_registration(id)).await?;
    info!("{} deleted registration {id}", auth.admin.username);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_stopped(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(filter): Query<RegistrationFilter>,
) -> ApiResult<Vec<RegistrationRow>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, move |p| p.stopped_rows(&filter)).await?))
}

async fn export_stopped(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(&[View])?;
    let rows = run(&state.portal, move |p| p.stopped_rows(&filter)).await?;
    Ok(csv_download("stopped_registrations", stopped_csv(&rows)))
}

async fn restore_registration(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<RegistrationId>,
) -> ApiResult<Registration> {
    auth.require(&[ManageRegistrations])?;
    let registration = run(&state.portal, move |p| p.restore_registration(id)).await?;
    info!("{} restored registration {id}", auth.admin.username);
    Ok(Json(registration))
}

// =============================================================================
// STOP REQUESTS
// =============================================================================

async fn list_stop_requests(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Query(query): Query<StopRequestQuery>,
) -> ApiResult<Vec<StopRequestView>> {
    auth.require(&[View])?;
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("" | "all") => None,
        Some(status) => Some(status.parse::<StopRequestStatus>()?),
    };
    Ok(Json(
        run(&state.portal, move |p| p.list_stop_requests(status)).await?,
    ))
}

async fn resolve_stop_request(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<StopRequestId>,
    Json(body): Json<ResolveRequest>,
) -> ApiResult<StopRequest> {
    auth.require(&[ManageRegistrations])?;
    let ResolveRequest { decision, notes } = body;
    let request = run(&state.portal, move |p| {
        p.resolve_stop_request(id, decision, notes)
    })
    .await?;
    info!(
        "{} resolved stop request {id} as {}",
        auth.admin.username,
        request.status.as_str()
    );
    Ok(Json(request))
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthAdmin,
) -> ApiResult<Vec<NotificationView>> {
    auth.require(&[View])?;
    Ok(Json(run(&state.portal, |p| p.list_notifications()).await?))
}

async fn create_notification(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(form): Json<NotificationForm>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    auth.require(&[ManageCategories, Create])?;
    let notification = run(&state.portal, move |p| p.create_notification(form)).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

async fn update_notification(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<NotificationId>,
    Json(form): Json<NotificationForm>,
) -> ApiResult<Notification> {
    auth.require(&[ManageCategories, Edit])?;
    Ok(Json(
        run(&state.portal, move |p| p.update_notification(id, form)).await?,
    ))
}

async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageCategories, Delete])?;
    run(&state.portal, move |p| p.delete_notification(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ADMIN ACCOUNTS
// =============================================================================

async fn list_admins(State(state): State<AppState>, auth: AuthAdmin) -> ApiResult<Vec<AdminView>> {
    auth.require(&[ManageUsers])?;
    let admins = run(&state.portal, |p| p.list_admins()).await?;
    Ok(Json(admins.iter().map(AdminView::from).collect()))
}

async fn create_admin(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(new): Json<NewAdmin>,
) -> Result<(StatusCode, Json<AdminView>), ApiError> {
    auth.require(&[ManageUsers])?;
    let admin = run(&state.portal, move |p| p.create_admin(new)).await?;
    info!(
        "{} created admin {} ({})",
        auth.admin.username, admin.username, admin.role
    );
    Ok((StatusCode::CREATED, Json(AdminView::from(&admin))))
}

async fn get_admin(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<AdminId>,
) -> ApiResult<AdminView> {
    auth.require(&[ManageUsers])?;
    let admin = run(&state.portal, move |p| p.get_admin(id)).await?;
    Ok(Json(AdminView::from(&admin)))
}

async fn update_admin(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<AdminId>,
    Json(update): Json<AdminUpdate>,
) -> ApiResult<AdminView> {
    auth.require(&[ManageUsers])?;
    let admin = run(&state.portal, move |p| p.update_admin(id, update)).await?;
    info!("{} updated admin {}", auth.admin.username, admin.username);
    Ok(Json(AdminView::from(&admin)))
}

async fn delete_admin(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<AdminId>,
) -> Result<StatusCode, ApiError> {
    auth.require(&[ManageUsers])?;
    let acting = auth.admin.id;
    run(&state.portal, move |p| p.delete_admin(id, acting)).await?;
    info!("{} deleted admin {id}", auth.admin.username);
    Ok(StatusCode::NO_CONTENT)
}
