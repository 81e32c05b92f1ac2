//! # Routes
//!
//! - `POST /v1/people`: validates the body against the `Person` schema
//!   and echoes the defaulted, transformed record.
//! - `GET /v1/catalog/{category}/items?keyword=..&tag=..`: binds path and
//!   query parameters to the intercepted `Catalog#search`.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::error::ApiError;
use crate::extractors::{bind_args, extract_validated, ArgInputs, ArgSource};
use crate::schemas::{Person, SearchQuery};
use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/people", post(create_person))
        .route("/v1/catalog/{category}/items", get(search_catalog))
}

async fn create_person(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Person>), ApiError> {
    let person: Person = extract_validated(body, &state.schemas.person)?;
    tracing::debug!(name = %person.name, "accepted person");
    Ok((StatusCode::CREATED, Json(person)))
}

async fn search_catalog(
    State(state): State<AppState>,
    Path(path): Path<HashMap<String, String>>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<SearchQuery>, ApiError> {
    let sources = [
        ArgSource::param("category"),
        ArgSource::query("keyword"),
        ArgSource::queries("tag"),
    ];
    let inputs = ArgInputs {
        body: None,
        query,
        path,
    };
    let args = bind_args(&sources, &inputs);
    state.schemas.search.call_sparse(args).map(Json)
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
