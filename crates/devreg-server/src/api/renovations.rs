//! Renovation API endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use devreg_core::{NewRenovation, Renovation};

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the renovations router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(record_renovation))
}

/// Record a renovation.
#[utoipa::path(
    post,
    path = "/api/renovations",
    tag = "renovations",
    operation_id = "recordRenovation",
    summary = "Record a renovation",
    description = "Appends a service record to a registered device. The \
        description must be non-empty and at most 1000 characters.",
    request_body = NewRenovation,
    responses(
        (status = 201, description = "Renovation recorded", body = Renovation),
        (status = 400, description = "Invalid description", body = ErrorResponse),
        (status = 404, description = "Device not registered", body = ErrorResponse)
    )
)]
pub async fn record_renovation(
    State(state): State<SharedState>,
    Json(request): Json<NewRenovation>,
) -> ApiResult<(StatusCode, Json<Renovation>)> {
    let renovation = state.registry.renovations.save(request).await?;
    Ok((StatusCode::CREATED, Json(renovation)))
}
