//! An HTTP front end that guards simulated work with rate limiters.
//!
//! Routes:
//!
//! * `GET /sync` waits for a permit, does the work and answers `OK`.
//! * `GET /async` answers `429 Too Many Requests` right away if no
//!   permit is available, and does the work otherwise.
//! * `GET /alternate/sync` and `GET /alternate/async` do the same
//!   against the alternate strategy, if one is configured.
//! * `GET /status` reports the state of every configured limiter.

pub mod settings;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use self::settings::Settings;
use crate::{RateLimit, Registry, RegistryError};

/// A limiter together with the name of the strategy that built it.
#[derive(Debug, Clone)]
pub struct NamedLimiter {
    pub strategy: String,
    pub limiter: Arc<dyn RateLimit>,
}

impl NamedLimiter {
    fn status(&self) -> LimiterStatus {
        LimiterStatus {
            strategy: self.strategy.clone(),
            capacity: self.limiter.capacity(),
            consumed: self.limiter.consumed(),
            allowed: self.limiter.allowed(),
        }
    }
}

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub primary: NamedLimiter,
    pub alternate: Option<NamedLimiter>,
    /// How long the simulated work behind each admitted request takes.
    pub work: Duration,
}

impl AppState {
    /// Tears down every limiter.
    pub fn destroy(&self) {
        let limiters = std::iter::once(&self.primary).chain(self.alternate.as_ref());
        for named in limiters {
            if let Err(err) = named.limiter.destroy() {
                debug!(strategy = %named.strategy, %err, "limiter teardown skipped");
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LimiterStatus {
    pub strategy: String,
    pub capacity: u32,
    pub consumed: u32,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub primary: LimiterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate: Option<LimiterStatus>,
}

/// Builds the limiters named in `settings`.
///
/// An unknown or misconfigured primary strategy is an error. An
/// alternate strategy that can not be built is logged and left out.
pub fn build_state(registry: &Registry, settings: &Settings) -> Result<AppState, RegistryError> {
    let window = settings.window();
    let primary = NamedLimiter {
        strategy: settings.strategy.clone(),
        limiter: Arc::from(registry.build(&settings.strategy, settings.requests, window)?),
    };
    let alternate = match settings.alternate.as_deref() {
        None => None,
        Some(name) => match registry.build(name, settings.requests, window) {
            Ok(limiter) => Some(NamedLimiter {
                strategy: name.to_string(),
                limiter: Arc::from(limiter),
            }),
            Err(err) => {
                warn!(strategy = name, %err, "failed to load alternate rate limiter");
                None
            }
        },
    };
    Ok(AppState {
        primary,
        alternate,
        work: settings.work_delay(),
    })
}

/// The router serving every route for `state`.
pub fn router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/sync", get(sync_request))
        .route("/async", get(async_request))
        .route("/status", get(status));
    if let Some(alternate) = &state.alternate {
        info!(strategy = %alternate.strategy, "serving alternate rate limiter");
        router = router
            .route("/alternate/sync", get(alternate_sync_request))
            .route("/alternate/async", get(alternate_async_request));
    }
    router.with_state(state)
}

/// Serves `state` on the address in `settings` until Ctrl+C.
pub async fn serve(settings: &Settings, state: AppState) -> io::Result<()> {
    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    serve_on(listener, state).await
}

/// Serves `state` on `listener` until Ctrl+C.
///
/// The limiters are destroyed as soon as the signal arrives, so that
/// requests still waiting for a permit fail with `503` and graceful
/// shutdown does not wait on them.
pub async fn serve_on(listener: TcpListener, state: AppState) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "Listening for requests");
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await
}

/// Installs the global tracing subscriber. `RUST_LOG` takes precedence
/// over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .init();
}

async fn shutdown_signal(state: AppState) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, initiating graceful shutdown...");
    state.destroy();
}

async fn sync_request(State(state): State<AppState>, uri: Uri) -> Response {
    info!(%uri, "request");
    consume_then_work(state.primary.limiter, state.work).await
}

async fn async_request(State(state): State<AppState>, uri: Uri) -> Response {
    info!(%uri, "request");
    try_consume_then_work(state.primary.limiter, state.work).await
}

async fn alternate_sync_request(State(state): State<AppState>, uri: Uri) -> Response {
    info!(%uri, "request");
    match state.alternate {
        Some(alternate) => consume_then_work(alternate.limiter, state.work).await,
        None => with_cors(StatusCode::NOT_FOUND, ""),
    }
}

async fn alternate_async_request(State(state): State<AppState>, uri: Uri) -> Response {
    info!(%uri, "request");
    match state.alternate {
        Some(alternate) => try_consume_then_work(alternate.limiter, state.work).await,
        None => with_cors(StatusCode::NOT_FOUND, ""),
    }
}

async fn status(State(state): State<AppState>) -> Response {
    let status = Status {
        primary: state.primary.status(),
        alternate: state.alternate.as_ref().map(NamedLimiter::status),
    };
    ([(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(status)).into_response()
}

async fn consume_then_work(limiter: Arc<dyn RateLimit>, work: Duration) -> Response {
    match tokio::task::spawn_blocking(move || limiter.consume()).await {
        Ok(Ok(())) => {
            tokio::time::sleep(work).await;
            with_cors(StatusCode::OK, "OK")
        }
        Ok(Err(err)) => {
            warn!(%err, "refusing request");
            with_cors(StatusCode::SERVICE_UNAVAILABLE, "")
        }
        Err(err) => {
            error!(%err, "blocking consume did not complete");
            with_cors(StatusCode::INTERNAL_SERVER_ERROR, "")
        }
    }
}

async fn try_consume_then_work(limiter: Arc<dyn RateLimit>, work: Duration) -> Response {
    if !limiter.consume_async() {
        return with_cors(StatusCode::TOO_MANY_REQUESTS, "");
    }
    tokio::time::sleep(work).await;
    with_cors(StatusCode::OK, "OK")
}

fn with_cors(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")], body).into_response()
}
