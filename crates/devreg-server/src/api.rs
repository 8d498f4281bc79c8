//! HTTP API routes and handlers.
//!
//! - `health` - Service health checks
//! - `passports` - Passport CRUD and serial resolution
//! - `devices` - Device registration, lookup, update and deletion
//! - `renovations` - Renovation recording
//! - `users` - Owner onboarding
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod devices;
pub mod error;
pub mod health;
pub mod openapi;
pub mod passports;
pub mod renovations;
pub mod users;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                           - Health check
/// /api
/// ├── /passports                    - Create
/// ├── /passports/{id}               - Get, update, delete
/// ├── /passports/by-serial/{serial} - Resolve a serial number
/// ├── /devices                      - Register for the x-user-id caller
/// ├── /devices/anonymous            - Register without owner
/// ├── /devices/{serial}             - Get, update, delete
/// ├── /devices/{serial}/renovations - Renovation history
/// ├── /renovations                  - Record a renovation
/// ├── /users                        - Onboard an owner
/// └── /openapi.json                 - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/passports", passports::router())
                .nest("/devices", devices::router())
                .nest("/renovations", renovations::router())
                .nest("/users", users::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
