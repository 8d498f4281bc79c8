//! Device API endpoints.
//!
//! Devices are keyed by serial number. Registration resolves the covering
//! passport and stores the computed warranty expiration date.

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use devreg_core::{Device, DevicePatch, NewDevice, Renovation, UserId};

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Creates the devices router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(register_device))
        .route("/anonymous", post(add_anonymous_device))
        .route(
            "/{serial}",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .route("/{serial}/renovations", get(device_renovations))
}

/// The caller's user id, if the gateway supplied one.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Option<UserId>);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Self(None));
        };
        let id = value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<UserId>().ok())
            .ok_or_else(|| {
                ApiError::bad_request("INVALID_USER_ID", "x-user-id must be a UUID")
            })?;
        Ok(Self(Some(id)))
    }
}

/// Register a device for the calling user.
#[utoipa::path(
    post,
    path = "/api/devices",
    tag = "devices",
    operation_id = "registerDevice",
    summary = "Register an owned device",
    description = "Registers the device for the user named in the x-user-id \
        header. The warranty is computed from the passport covering the serial.",
    params(("x-user-id" = Option<String>, Header, description = "Authenticated user id")),
    request_body = NewDevice,
    responses(
        (status = 201, description = "Device registered", body = Device),
        (status = 400, description = "Invalid serial number", body = ErrorResponse),
        (status = 404, description = "Unknown user or no covering passport", body = ErrorResponse),
        (status = 409, description = "Device already registered", body = ErrorResponse)
    )
)]
pub async fn register_device(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Json(request): Json<NewDevice>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    let owner = match caller {
        Some(id) => state.registry.owners.find_user(id).await?,
        None => None,
    };
    let device = state
        .registry
        .devices
        .register_new_device(request, owner.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Register a device without an owner.
#[utoipa::path(
    post,
    path = "/api/devices/anonymous",
    tag = "devices",
    operation_id = "addAnonymousDevice",
    summary = "Register an anonymous device",
    description = "Registers a device with no owner. The serial must be \
        covered by a passport.",
    request_body = NewDevice,
    responses(
        (status = 201, description = "Device registered", body = Device),
        (status = 400, description = "Serial not covered by any passport", body = ErrorResponse),
        (status = 409, description = "Device already registered", body = ErrorResponse)
    )
)]
pub async fn add_anonymous_device(
    State(state): State<SharedState>,
    Json(request): Json<NewDevice>,
) -> ApiResult<(StatusCode, Json<Device>)> {
    let device = state.registry.devices.add_anonymous_device(request).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

/// Get a registered device.
#[utoipa::path(
    get,
    path = "/api/devices/{serial}",
    tag = "devices",
    operation_id = "getDevice",
    summary = "Get a device",
    params(("serial" = String, Path, description = "Device serial number")),
    responses(
        (status = 200, description = "Device found", body = Device),
        (status = 404, description = "Device not registered", body = ErrorResponse)
    )
)]
pub async fn get_device(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
) -> ApiResult<Json<Device>> {
    Ok(Json(state.registry.devices.lookup_or_fail(&serial).await?))
}

/// Update a registered device.
#[utoipa::path(
    patch,
    path = "/api/devices/{serial}",
    tag = "devices",
    operation_id = "updateDevice",
    summary = "Update a device",
    description = "A new purchase date recomputes the warranty expiration \
        from the device's passport.",
    params(("serial" = String, Path, description = "Device serial number")),
    request_body = DevicePatch,
    responses(
        (status = 200, description = "Device updated", body = Device),
        (status = 404, description = "Device not found", body = ErrorResponse)
    )
)]
pub async fn update_device(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
    Json(patch): Json<DevicePatch>,
) -> ApiResult<Json<Device>> {
    let device = state.registry.devices.update_device(&serial, patch).await?;
    Ok(Json(device))
}

/// Delete a device.
#[utoipa::path(
    delete,
    path = "/api/devices/{serial}",
    tag = "devices",
    operation_id = "deleteDevice",
    summary = "Delete a device",
    description = "Removes the device. Fails while renovations reference it.",
    params(("serial" = String, Path, description = "Device serial number")),
    responses(
        (status = 204, description = "Device deleted"),
        (status = 409, description = "Renovations exist", body = ErrorResponse)
    )
)]
pub async fn delete_device(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
) -> ApiResult<StatusCode> {
    state.registry.devices.delete_device(&serial).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Renovation history of a device.
#[utoipa::path(
    get,
    path = "/api/devices/{serial}/renovations",
    tag = "renovations",
    operation_id = "getDeviceRenovations",
    summary = "List renovations of a device",
    description = "Returns every renovation recorded for the device, oldest first.",
    params(("serial" = String, Path, description = "Device serial number")),
    responses(
        (status = 200, description = "Renovation history", body = Vec<Renovation>),
        (status = 404, description = "Device not registered", body = ErrorResponse)
    )
)]
pub async fn device_renovations(
    State(state): State<SharedState>,
    Path(serial): Path<String>,
) -> ApiResult<Json<Vec<Renovation>>> {
    Ok(Json(state.registry.renovations.history(&serial).await?))
}
