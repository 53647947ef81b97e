//! Admin sessions.
//!
//! A successful login issues a random bearer token held in memory until
//! logout. Every authenticated request reloads the admin, so a deleted or
//! deactivated account loses access immediately.

use super::{ApiError, AppState, LoginRequest, LoginResponse, run};
use axum::Json;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use elife_core::portal::AdminView;
use elife_core::{Admin, AdminId, CoreError, Permission};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Token to admin id.
#[derive(Clone, Default)]
pub struct Sessions {
    tokens: Arc<RwLock<HashMap<String, AdminId>>>,
}

impl Sessions {
    pub async fn issue(&self, admin: AdminId) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.write().await.insert(token.clone(), admin);
        token
    }

    pub async fn lookup(&self, token: &str) -> Option<AdminId> {
        self.tokens.read().await.get(token).copied()
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    pub async fn count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

/// The admin behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub admin: Admin,
    pub token: String,
}

impl AuthAdmin {
    /// Fail with 403 unless the admin holds every permission.
    pub fn require(&self, permissions: &[Permission]) -> Result<(), ApiError> {
        match self.admin.permissions.missing(permissions) {
            Some(missing) => {
                warn!(
                    "Admin {} denied: missing {missing} permission",
                    self.admin.username
                );
                Err(ApiError::Forbidden(missing))
            }
            None => Ok(()),
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(ApiError::Unauthorized)?.to_string();
        let id = state
            .sessions
            .lookup(&token)
            .await
            .ok_or(ApiError::Unauthorized)?;

        let admin = match run(&state.portal, move |p| p.get_admin(id)).await {
            Ok(admin) if admin.is_active => admin,
            Ok(_) | Err(ApiError::Core(CoreError::NotFound { .. })) => {
                state.sessions.revoke(&token).await;
                return Err(ApiError::Unauthorized);
            }
            Err(e) => return Err(e),
        };
        Ok(Self { admin, token })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let key = body.username.trim().to_lowercase();
    if state.login_limiter.check_key(&key).is_err() {
        warn!("Login rate limit hit for {key}");
        return Err(ApiError::RateLimited);
    }

    let LoginRequest { username, password } = body;
    let admin = run(&state.portal, move |p| p.login(&username, &password)).await?;
    let token = state.sessions.issue(admin.id).await;
    info!("Admin {} logged in", admin.username);

    Ok(Json(LoginResponse {
        token,
        admin: AdminView::from(&admin),
    }))
}

/// `POST /auth/logout`
pub async fn logout(State(state): State<AppState>, auth: AuthAdmin) -> StatusCode {
    state.sessions.revoke(&auth.token).await;
    info!("Admin {} logged out", auth.admin.username);
    StatusCode::NO_CONTENT
}

/// `GET /auth/me`
pub async fn me(auth: AuthAdmin) -> Json<AdminView> {
    Json(AdminView::from(&auth.admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_issue_lookup_and_revoke() {
        let sessions = Sessions::default();
        let id = AdminId::new();
        let token = sessions.issue(id).await;

        assert_eq!(sessions.lookup(&token).await, Some(id));
        assert_eq!(sessions.count().await, 1);
        assert!(sessions.revoke(&token).await);
        assert!(!sessions.revoke(&token).await);
        assert_eq!(sessions.lookup(&token).await, None);
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let sessions = Sessions::default();
        let id = AdminId::new();
        let first = sessions.issue(id).await;
        let second = sessions.issue(id).await;
        assert_ne!(first, second);
        assert_eq!(sessions.count().await, 2);
    }
}
