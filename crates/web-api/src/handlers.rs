use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use bvp_core::MeterError;
use bvp_pipeline::{
    form_from_query, get_service_response, parse_get_request, parse_post_request,
    MeterDataResponse, ServiceListing,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::responses::{ApiError, Processed};
use crate::server::AppState;

/// Header carrying the authenticated user id, set by the identity proxy.
pub const USER_HEADER: &str = "x-bvp-user";

#[derive(Debug, Deserialize)]
pub struct ServiceQuery {
    pub access: Option<String>,
}

fn caller(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ApiError(MeterError::InvalidSender("You are not logged in.".to_string())))
}

/// Reads meter data for the caller's connections.
///
/// # Errors
/// Returns the catalog error of a rejected request.
pub async fn get_meter_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Processed<MeterDataResponse>>, ApiError> {
    let user_id = caller(&headers)?;
    let request = parse_get_request(&form_from_query(params))?;
    let auth = state.query.resolver().auth_context(user_id).await?;
    let response = state.query.run(&request, &auth).await?;
    Ok(Json(Processed::new(response)))
}

/// Stores meter data for the caller's connections.
///
/// The body is parsed as JSON whatever its content type.
///
/// # Errors
/// Returns the catalog error of a rejected request.
pub async fn post_meter_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Processed<Map<String, Value>>>, ApiError> {
    let user_id = caller(&headers)?;
    let message: Value = serde_json::from_slice(&body)
        .map_err(|e| MeterError::NoMessageType(format!("Request body is not valid JSON: {e}.")))?;
    let request = parse_post_request(&message, Utc::now())?;
    let auth = state.ingestion.resolver().auth_context(user_id).await?;
    state.ingestion.run(&request, &auth).await?;
    Ok(Json(Processed::new(Map::new())))
}

/// Lists the services, optionally only those open to an access role.
///
/// # Errors
/// Returns `INVALID_ROLE` when no service is open to the requested role.
pub async fn get_service(
    State(state): State<AppState>,
    Query(query): Query<ServiceQuery>,
) -> Result<Json<Processed<ServiceListing>>, ApiError> {
    let listing = get_service_response(&state.services, query.access.as_deref())?;
    Ok(Json(Processed::new(listing)))
}
