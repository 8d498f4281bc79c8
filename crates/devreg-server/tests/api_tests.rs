//! End-to-end tests of the HTTP API over an in-memory registry.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use devreg_core::{Device, Onboarded, Passport, RegistryConfig, Renovation};
use devreg_server::api::create_router;
use devreg_server::state::AppState;
use serde_json::{json, Value};

fn server() -> TestServer {
    TestServer::new(create_router(AppState::in_memory())).unwrap()
}

fn user_header(value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(value).unwrap(),
    )
}

async fn create_passport(
    server: &TestServer,
    prefix: &str,
    from: u64,
    to: u64,
    months: u32,
) -> Passport {
    let response = server
        .post("/api/passports")
        .json(&json!({
            "name": "Split A/C",
            "model": "SB-12",
            "serial_prefix": prefix,
            "from_serial_number": from,
            "to_serial_number": to,
            "warranty_months": months
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_health() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_anonymous_registration_computes_warranty() {
    let server = server();
    let passport = create_passport(&server, "SB", 1, 2000, 24).await;

    let response = server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB1500", "purchase_date": "2024-01-01" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let device: Device = response.json();
    assert_eq!(device.warranty_expiration_date.to_string(), "2026-01-01");
    assert_eq!(device.passport_id, Some(passport.id));
    assert!(device.owner.is_none());

    let fetched: Device = server.get("/api/devices/SB1500").await.json();
    assert_eq!(fetched, device);
}

#[tokio::test]
async fn test_anonymous_registration_rejects_unknown_serial() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;

    let response = server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "XX1", "purchase_date": "2024-01-01" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_SERIAL_NUMBER");
    assert_eq!(body["message"], "Invalid serial number");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;
    let body = json!({ "serial_number": "SB7", "purchase_date": "2024-01-01" });

    server
        .post("/api/devices/anonymous")
        .json(&body)
        .await
        .assert_status(StatusCode::CREATED);
    let response = server.post("/api/devices/anonymous").json(&body).await;
    response.assert_status(StatusCode::CONFLICT);
    let error: Value = response.json();
    assert_eq!(error["error"], "DEVICE_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_overlapping_passport_update_conflicts() {
    let server = server();
    let first = create_passport(&server, "SN-", 1, 100, 12).await;
    create_passport(&server, "SN-", 120, 200, 12).await;

    let response = server
        .patch(&format!("/api/passports/{}", first.id))
        .json(&json!({ "from_serial_number": 50, "to_serial_number": 150 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "SERIAL_RANGE_CONFLICT");
    assert_eq!(body["message"], "Serial number already exists");

    let unchanged: Passport = server
        .get(&format!("/api/passports/{}", first.id))
        .await
        .json();
    assert_eq!(unchanged.to_serial_number, 100);
}

#[tokio::test]
async fn test_passport_lookup_and_resolution() {
    let server = server();
    let passport = create_passport(&server, "SB", 1, 2000, 24).await;

    let resolved: Passport = server.get("/api/passports/by-serial/SB42").await.json();
    assert_eq!(resolved.id, passport.id);

    let response = server.get("/api/passports/by-serial/SB5000").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "Passport not found for serial number: SB5000");

    server
        .get("/api/passports/999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_referenced_passport_cannot_be_deleted() {
    let server = server();
    let used = create_passport(&server, "SB", 1, 2000, 24).await;
    let unused = create_passport(&server, "ZZ", 1, 10, 6).await;
    server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB1", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.delete(&format!("/api/passports/{}", used.id)).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["message"], "Can't delete passport");

    server
        .delete(&format!("/api/passports/{}", unused.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_renovations_block_device_deletion() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;
    server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB10", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/renovations")
        .json(&json!({
            "device_serial": "SB10",
            "description": "Changed compressor",
            "renovation_date": "2024-07-15"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let renovation: Renovation = response.json();
    assert_eq!(renovation.device.serial_number, "SB10");

    let history: Vec<Renovation> = server.get("/api/devices/SB10/renovations").await.json();
    assert_eq!(history.len(), 1);

    let response = server.delete("/api/devices/SB10").await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["message"], "Cannot delete device: renovations exist");
}

#[tokio::test]
async fn test_renovation_requires_registered_device() {
    let response = server()
        .post("/api/renovations")
        .json(&json!({
            "device_serial": "NOPE",
            "description": "Cleaned filters",
            "renovation_date": "2024-07-15"
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "DEVICE_NOT_REGISTERED");
}

#[tokio::test]
async fn test_device_without_renovations_can_be_deleted() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;
    server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB11", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .delete("/api/devices/SB11")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get("/api/devices/SB11")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owned_registration_uses_caller_header() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;

    let response = server
        .post("/api/users")
        .json(&json!({ "full_name": "Maria Ivanova" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let onboarded: Onboarded = response.json();
    assert!(onboarded.device.is_none());

    let (name, value) = user_header(&onboarded.user.id.to_string());
    let response = server
        .post("/api/devices")
        .add_header(name, value)
        .json(&json!({ "serial_number": "SB20", "purchase_date": "2024-03-31" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let device: Device = response.json();
    assert_eq!(device.owner, Some(onboarded.user.id));
    assert_eq!(device.warranty_expiration_date.to_string(), "2026-03-31");
}

#[tokio::test]
async fn test_owned_registration_requires_known_user() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;
    let body = json!({ "serial_number": "SB21", "purchase_date": "2024-01-01" });

    let response = server.post("/api/devices").json(&body).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let error: Value = response.json();
    assert_eq!(error["error"], "USER_NOT_FOUND");

    let (name, value) = user_header("not-a-uuid");
    server
        .post("/api/devices")
        .add_header(name, value)
        .json(&body)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_onboarding_with_taken_serial_creates_no_device_owner() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 24).await;
    server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB30", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/users")
        .json(&json!({
            "full_name": "Maria Ivanova",
            "device_serial_number": "SB30",
            "purchase_date": "2024-01-01"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let device: Device = server.get("/api/devices/SB30").await.json();
    assert!(device.owner.is_none());
}

#[tokio::test]
async fn test_update_device_recomputes_warranty() {
    let server = server();
    create_passport(&server, "SB", 1, 2000, 6).await;
    server
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB40", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .patch("/api/devices/SB40")
        .json(&json!({ "purchase_date": "2024-02-01", "comment": "new receipt" }))
        .await;
    response.assert_status_ok();
    let device: Device = response.json();
    assert_eq!(device.warranty_expiration_date.to_string(), "2024-08-01");
    assert_eq!(device.comment.as_deref(), Some("new receipt"));

    server
        .patch("/api/devices/MISSING")
        .json(&json!({ "comment": "x" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = server().get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "devreg API");
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RegistryConfig::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());

    let first = TestServer::new(create_router(AppState::from_config(&config).unwrap()))
        .unwrap();
    create_passport(&first, "SB", 1, 2000, 24).await;
    first
        .post("/api/devices/anonymous")
        .json(&json!({ "serial_number": "SB50", "purchase_date": "2024-01-01" }))
        .await
        .assert_status(StatusCode::CREATED);
    drop(first);

    let second = TestServer::new(create_router(AppState::from_config(&config).unwrap()))
        .unwrap();
    let device: Device = second.get("/api/devices/SB50").await.json();
    assert_eq!(device.warranty_expiration_date.to_string(), "2026-01-01");
}
