//! Passport API endpoints.
//!
//! A passport describes one product model: its warranty duration and the
//! serial range (prefix plus inclusive number bounds) it covers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use devreg_core::{NewPassport, Passport, PassportId, PassportPatch, RegistryError};

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the passports router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_passport))
        .route(
            "/{id}",
            get(get_passport)
                .patch(update_passport)
                .delete(delete_passport),
        )
        .route("/by-serial/{serial}", get(resolve_passport))
}

/// Create a passport.
#[utoipa::path(
    post,
    path = "/api/passports",
    tag = "passports",
    operation_id = "createPassport",
    summary = "Create a passport",
    description = "Stores a new passport. The serial range must not intersect \
        any existing passport with the same prefix.",
    request_body = NewPassport,
    responses(
        (status = 201, description = "Passport created", body = Passport),
        (status = 400, description = "Invalid passport fields", body = ErrorResponse),
        (status = 409, description = "Serial range overlaps another passport", body = ErrorResponse)
    )
)]
pub async fn create_passport(
    State(state): State<SharedState>,
    Json(request): Json<NewPassport>,
) -> ApiResult<(StatusCode, Json<Passport>)> {
    let passport = state.registry.passports.create(request).await?;
    Ok((StatusCode::CREATED, Json(passport)))
}

/// Get a passport by id.
#[utoipa::path(
    get,
    path = "/api/passports/{id}",
    tag = "passports",
    operation_id = "getPassport",
    summary = "Get a passport",
    params(("id" = u64, Path, description = "Passport id")),
    responses(
        (status = 200, description = "Passport found", body = Passport),
        (status = 404, description = "No such passport", body = ErrorResponse)
    )
)]
pub async fn get_passport(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Passport>> {
    let passport = state
        .registry
        .passports
        .find_by_id(PassportId(id))
        .await?
        .ok_or(RegistryError::PassportNotFound)?;
    Ok(Json(passport))
}

/// Update a passport.
#[utoipa::path(
    patch,
    path = "/api/passports/{id}",
    tag = "passports",
    operation_id = "updatePassport",
    summary = "Update a passport",
    description = "Applies the given fields. A changed range is checked \
        against every other passport with the same prefix.",
    params(("id" = u64, Path, description = "Passport id")),
    request_body = PassportPatch,
    responses(
        (status = 200, description = "Passport updated", body = Passport),
        (status = 400, description = "Invalid passport fields", body = ErrorResponse),
        (status = 404, description = "No such passport", body = ErrorResponse),
        (status = 409, description = "Serial range overlaps another passport", body = ErrorResponse)
    )
)]
pub async fn update_passport(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(patch): Json<PassportPatch>,
) -> ApiResult<Json<Passport>> {
    let passport = state
        .registry
        .passports
        .update(PassportId(id), patch)
        .await?;
    Ok(Json(passport))
}

/// Delete a passport.
#[utoipa::path(
    delete,
    path = "/api/passports/{id}",
    tag = "passports",
    operation_id = "deletePassport",
    summary = "Delete a passport",
    description = "Removes the passport. Fails while registered devices \
        still reference it.",
    params(("id" = u64, Path, description = "Passport id")),
    responses(
        (status = 204, description = "Passport deleted"),
        (status = 409, description = "Passport is still referenced", body = ErrorResponse)
    )
)]
pub async fn delete_passport(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.registry.passports.delete(PassportId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Find the passport covering a serial number.
#[utoipa::path(
    get,
    path = "/api/passports/by-serial/{serial}",
    tag = "passports",
    operation_id = "resolvePassport",
    summary = "Resolve a serial number",
    params(("serial" = String, Path, description = "Device serial number", example = "SB1500")),
    responses(
        (status = 200, description = "Covering passport", body = Passport),
        (status = 400, description = "Serial matches more than one passport", body = ErrorResponse),
        (status = 404, description = "No passport covers the serial", body = ErrorResponse)
    )
)]
pub async fn resolve_passport(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
) -> ApiResult<Json<Passport>> {
    let passport = state.registry.passports.resolve_by_serial(&serial).await?;
    Ok(Json(passport))
}
