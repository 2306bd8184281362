//! Route configuration and setup.

use crate::api_doc;
use crate::auth::{auth_middleware, AuthState};
use crate::handlers::{download::download_video, files::get_file, health::liveness_check};
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tubedrop_core::Config;

/// Largest accepted `/download` body.
pub const DOWNLOAD_BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(AuthState::new(
        config.api_secret(),
        config.api_secret_header(),
    )?);

    // Route layers only wrap matched routes; unknown paths fall through to 404.
    // The secret check is outermost so it runs before body handling.
    let protected_routes = Router::new()
        .route("/download", post(download_video))
        .route_layer(RequestBodyLimitLayer::new(DOWNLOAD_BODY_LIMIT_BYTES))
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    let mut public_routes = Router::new()
        .route("/health", get(liveness_check))
        .route(
            "/openapi.json",
            get(|| async { Json(api_doc::get_openapi_spec()) }),
        );
    if state.local_files.is_some() {
        public_routes = public_routes.route("/files", get(get_file));
    }

    let http_concurrency_limit = config.http_concurrency_limit();
    tracing::info!(
        http_concurrency_limit,
        files_route = state.local_files.is_some(),
        "Routes configured"
    );

    // One semaphore shared by every route, so the cap is server-wide.
    let app = public_routes
        .merge(protected_routes)
        .layer(GlobalConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
