//! # HTTP API
//!
//! JSON API over [`Portal`]. Citizen routes are public and identify the
//! client by mobile number; `/admin/*` routes need a bearer token from
//! `POST /auth/login`.
//!
//! Portal operations are synchronous redb transactions, so handlers run
//! them on the blocking pool through [`run`].

mod admin;
mod auth;
mod error;
mod public;
mod types;

pub use auth::{AuthAdmin, Sessions};
pub use error::ApiError;
pub use types::*;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use elife_core::{MAX_UPLOAD_BYTES, Portal};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// How often `serve` drops idle login limiter keys.
pub const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Server settings, built from the `serve` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed to call the API. `None` disables CORS.
    pub cors_origin: Option<String>,
    /// Login attempts allowed per username per minute.
    pub login_rate: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origin: None,
            login_rate: 10,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<Portal>,
    pub sessions: Sessions,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl AppState {
    #[must_use]
    pub fn new(portal: Portal, config: &ServerConfig) -> Self {
        let per_minute = NonZeroU32::new(config.login_rate).unwrap_or(NonZeroU32::MIN);
        Self {
            portal: Arc::new(portal),
            sessions: Sessions::default(),
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }

    /// Forget usernames whose login quota has fully replenished.
    pub fn prune_login_limiter(&self) {
        self.login_limiter.retain_recent();
        self.login_limiter.shrink_to_fit();
    }
}

/// Prune the login limiter every `every` until the task is aborted.
pub fn spawn_limiter_sweeper(state: &AppState, every: Duration) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            state.prune_login_limiter();
            debug!("Login limiter holds {} key(s)", state.login_limiter.len());
        }
    })
}

/// Run a portal operation on the blocking pool.
pub(crate) async fn run<T, F>(portal: &Arc<Portal>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Portal) -> elife_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let portal = Arc::clone(portal);
    tokio::task::spawn_blocking(move || op(&portal))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

// =============================================================================
// ROUTER
// =============================================================================

fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    let origin = config.cors_origin.as_deref()?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            warn!("Ignoring invalid CORS origin {origin}: {e}");
            return None;
        }
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .max_age(Duration::from_secs(60 * 60)),
    )
}

/// Build the full router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let public = Router::new()
        .route("/health", get(public::health))
        .route("/verify", post(public::verify))
        .route("/registrations", post(public::register))
        .route("/check", post(public::check))
        .route("/apply", post(public::apply))
        .route("/stop-requests", post(public::request_stop))
        .route("/categories", get(public::categories))
        .route("/categories/{id}", get(public::category))
        .route("/programs", get(public::programs));

    let auth = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me));

    let app = public
        .merge(auth)
        .nest("/admin", admin::routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let app = match cors_layer(config) {
        Some(cors) => app.layer(cors),
        None => app,
    };
    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(portal: Portal, config: ServerConfig) -> std::io::Result<()> {
    let state = AppState::new(portal, &config);
    let app = router(state.clone(), &config);

    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!("E-Life portal listening on {address}");

    let sweeper = spawn_limiter_sweeper(&state, LIMITER_SWEEP_INTERVAL);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
