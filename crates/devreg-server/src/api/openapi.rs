//! OpenAPI specification for the devreg API.

use axum::Json;
use utoipa::OpenApi;

use devreg_core::{
    Device, DevicePatch, HealthResponse, NewDevice, NewOwner, NewPassport, NewRenovation,
    Onboarded, Passport, PassportId, PassportPatch, Renovation, RenovationId, User, UserId,
};

use super::error::ErrorResponse;

/// Serve the OpenAPI specification at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty JSON, for the gen-openapi binary.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document for devreg.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "devreg API",
        version = "0.1.0",
        description = r#"
# devreg API

Device warranty registry.

1. **Passports** describe a product model and the serial numbers it covers,
   written as a prefix plus an inclusive numeric range (`SB` 1..2000 covers
   `SB1500`). Ranges with the same prefix never overlap.
2. **Devices** are registered by serial number. The warranty expiration is
   the purchase date plus the covering passport's warranty months.
3. **Renovations** are service records appended to a device. A device with
   renovations cannot be deleted.

Owned registration reads the caller from the `x-user-id` header.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local devreg server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "passports", description = "Model passports and serial range resolution"),
        (name = "devices", description = "Device registration and warranty"),
        (name = "renovations", description = "Service history"),
        (name = "users", description = "Owner onboarding")
    ),
    paths(
        super::health::health_check,
        super::passports::create_passport,
        super::passports::get_passport,
        super::passports::update_passport,
        super::passports::delete_passport,
        super::passports::resolve_passport,
        super::devices::register_device,
        super::devices::add_anonymous_device,
        super::devices::get_device,
        super::devices::update_device,
        super::devices::delete_device,
        super::devices::device_renovations,
        super::renovations::record_renovation,
        super::users::onboard_owner,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            PassportId,
            Passport,
            NewPassport,
            PassportPatch,
            Device,
            NewDevice,
            DevicePatch,
            RenovationId,
            Renovation,
            NewRenovation,
            UserId,
            User,
            NewOwner,
            Onboarded,
        )
    )
)]
pub struct ApiDoc;
