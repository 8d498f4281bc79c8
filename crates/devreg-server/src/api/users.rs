//! Owner onboarding endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use devreg_core::{NewOwner, Onboarded};

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the users router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(onboard_owner))
}

/// Sign up an owner, optionally with their first device.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    operation_id = "onboardOwner",
    summary = "Onboard an owner",
    description = "Creates a user and, when a serial number is given, \
        registers that device for them. A taken serial creates no user. \
        The purchase date defaults to today in the configured timezone.",
    request_body = NewOwner,
    responses(
        (status = 201, description = "Owner created", body = Onboarded),
        (status = 400, description = "Invalid user fields", body = ErrorResponse),
        (status = 409, description = "Device already registered", body = ErrorResponse)
    )
)]
pub async fn onboard_owner(
    State(state): State<SharedState>,
    Json(request): Json<NewOwner>,
) -> ApiResult<(StatusCode, Json<Onboarded>)> {
    let onboarded = state.registry.owners.onboard(request).await?;
    Ok((StatusCode::CREATED, Json(onboarded)))
}
