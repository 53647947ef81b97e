//! Citizen routes. Clients are identified by the mobile number their agent
//! uploaded; there is no citizen login.

use super::{
    ApiError, AppState, ApplyRequest, MobileRequest, RegisterRequest, SearchQuery,
    StopRequestBody, run,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use elife_core::portal::{
    CategoryDetails, ProgramGroup, RegistrationOverview, VerifiedClient,
};
use elife_core::{CategoryId, Registration, StopRequest};
use serde_json::{Value, json};
use tracing::info;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<MobileRequest>,
) -> Result<Json<VerifiedClient>, ApiError> {
    let verified = run(&state.portal, move |p| p.verify_mobile(&body.mobile_number)).await?;
    Ok(Json(verified))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let RegisterRequest {
        mobile_number,
        category_id,
    } = body;
    let registration = run(&state.portal, move |p| p.register(&mobile_number, category_id)).await?;
    info!(
        "Registration {} created for category {}",
        registration.id, registration.category_id
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn check(
    State(state): State<AppState>,
    Json(body): Json<MobileRequest>,
) -> Result<Json<RegistrationOverview>, ApiError> {
    let overview = run(&state.portal, move |p| {
        p.check_registrations(&body.mobile_number)
    })
    .await?;
    Ok(Json(overview))
}

pub async fn apply(
    State(state): State<AppState>,
    Json(body): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let ApplyRequest {
        mobile_number,
        program_id,
        experience,
        skills,
    } = body;
    let registration = run(&state.portal, move |p| {
        p.apply_for_program(&mobile_number, program_id, &experience, &skills)
    })
    .await?;
    info!(
        "Application {} created for program {}",
        registration.id, program_id
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn request_stop(
    State(state): State<AppState>,
    Json(body): Json<StopRequestBody>,
) -> Result<(StatusCode, Json<StopRequest>), ApiError> {
    let StopRequestBody {
        mobile_number,
        registration_id,
    } = body;
    let request = run(&state.portal, move |p| {
        p.request_stop(&mobile_number, registration_id)
    })
    .await?;
    info!("Stop requested for registration {registration_id}");
    Ok((StatusCode::CREATED, Json(request)))
}

/// Active categories with their programs and sub-projects.
pub async fn categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryDetails>>, ApiError> {
    Ok(Json(run(&state.portal, |p| p.category_cards(true)).await?))
}

pub async fn category(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<CategoryDetails>, ApiError> {
    Ok(Json(run(&state.portal, move |p| p.category_details(id)).await?))
}

pub async fn programs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ProgramGroup>>, ApiError> {
    let groups = run(&state.portal, move |p| {
        p.list_programs(query.search.as_deref())
    })
    .await?;
    Ok(Json(groups))
}
