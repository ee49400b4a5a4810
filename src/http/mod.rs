//! Core HTTP surface: health, plugin introspection, shell settings and the
//! log ring buffer. Plugin routers are merged in by the caller.

mod core_routes;
mod log_routes;
mod types;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, Uri};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::plugins::ROLE_HEADER;
use crate::state::AppState;

/// Route bases owned by the core router. Plugins may not mount at or under
/// any of these.
pub const CORE_ROUTE_BASES: &[&str] = &["/api/health", "/api/plugins", "/api/settings", "/api/logs"];

/// Accept browser origins on the loopback interface, any port.
fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    ["http://localhost", "http://127.0.0.1", "https://localhost"]
        .iter()
        .any(|host| {
            origin
                .strip_prefix(host)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
        })
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound { resource: "route", id: uri.path().to_string() }
}

/// Build the application router (exposed for testing).
pub fn build_router(state: Arc<AppState>, plugin_router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| is_local_origin(origin)))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ROLE_HEADER)]);

    Router::new()
        .route("/api/health", get(core_routes::health))
        .route("/api/plugins", get(core_routes::list_plugins))
        .route("/api/plugins/{name}", get(core_routes::get_plugin))
        .route("/api/settings", get(core_routes::get_settings).put(core_routes::put_settings))
        .route(
            "/api/logs",
            get(log_routes::get_logs)
                .post(log_routes::push_log)
                .delete(log_routes::clear_logs),
        )
        .with_state(state)
        .merge(plugin_router)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind the configured address and serve until Ctrl-C or
/// `AppState::request_shutdown`.
pub async fn start_server(state: Arc<AppState>, app: Router) -> std::io::Result<()> {
    let addr = {
        let config = state.config.read();
        format!("{}:{}", config.bind_addr, config.port)
    };
    let listener = TcpListener::bind(&addr).await?;
    serve_on(listener, state, app).await
}

async fn serve_on(listener: TcpListener, state: Arc<AppState>, app: Router) -> std::io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, plugins = state.registry.len(), "HTTP API listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    *state.server_shutdown.lock() = Some(shutdown_tx);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C, shutting down"),
                _ = shutdown_rx => tracing::info!("shutdown requested"),
            }
        })
        .await?;

    tracing::info!("HTTP API stopped");
    Ok(())
}
