//! # pv-api: Axum API Service
//!
//! HTTP surface over `pv-schema`: JSON bodies validated against compiled
//! object schemas, and handlers whose arguments are bound from request
//! parts and validated by an intercepted method.
//!
//! ## Routes
//!
//! - `/v1/people`: `Person` body validation
//! - `/v1/catalog/{category}/items`: intercepted `Catalog#search`
//! - `/health/*`: liveness and readiness probes
//!
//! ## Errors
//!
//! Every failure maps to a JSON body through [`ApiError`]. Validation
//! failures answer 422 with `{code: "invalid_param", message, errors}`.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod schemas;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, ServerConfig};

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = routes::router()
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: schemas are compiled before the router exists.
async fn readiness() -> &'static str {
    "ready"
}
