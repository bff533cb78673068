use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use catalog_manager::app::catalog_service::CatalogService;
use catalog_manager::app::media::MediaUploader;
use catalog_manager::app::ports::MediaHostPort;
use catalog_manager::infra::notifier::LogNotifier;
use catalog_manager::infra::session::StaticTokenSessions;
use catalog_manager::server::{create_router, AppState};
use catalog_manager::storage::InMemoryStorage;

const TOKEN: &str = "s3cret";
const BOUNDARY: &str = "catalog-test-boundary";

struct CountingMediaHost {
    uploads: AtomicU32,
}

#[async_trait]
impl MediaHostPort for CountingMediaHost {
    async fn upload(&self, _encoded: &str, folder: &str) -> Result<String, String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://media.test/{folder}/{n}.png"))
    }
}

fn app() -> Router {
    let host = Arc::new(CountingMediaHost {
        uploads: AtomicU32::new(0),
    });
    let catalog = Arc::new(CatalogService::new(
        Arc::new(InMemoryStorage::new()),
        MediaUploader::new(host),
    ));
    let sessions = Arc::new(StaticTokenSessions::new([(
        TOKEN.to_string(),
        "ops@example.com".to_string(),
    )]));
    let state = AppState::new(catalog, Arc::new(LogNotifier), sessions, 5);
    create_router(state, 1024 * 1024, None)
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn tank_a_parts() -> Vec<Part<'static>> {
    vec![
        Part::Text("name", "Tank A"),
        Part::Text("displayTitle", "Tank A 500L"),
        Part::Text("group", "Tanks"),
        Part::Text("price", "1299.50"),
        Part::Text("customSections", r#"[{"title":"Warranty","content":"5 years"}]"#),
        Part::File("displayImage", "tank.png", b"\x89PNG"),
    ]
}

fn multipart_request(method: &str, uri: &str, parts: &[Part], token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart(parts))).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn create_tank_a(app: &Router) -> String {
    let (status, body) = send(
        app,
        multipart_request("POST", "/api/products/step1", &tank_a_parts(), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn tank_a_scenario_over_http() {
    let app = app();
    let id = create_tank_a(&app).await;

    let (status, entity) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/products/step2/{id}"),
            json!({"specifications": [{"title": "Capacity", "value": "500L"}]}),
            Some(TOKEN),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entity["specifications"][0]["value"], "500L");

    let (status, entity) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/products/step3/{id}"),
            json!({"queries": [{"title": "Quantity", "type": "number"}]}),
            Some(TOKEN),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entity["id"], id.as_str());
    assert_eq!(entity["displayImage"], "https://media.test/products/1.png");
    assert_eq!(entity["price"], 1299.5);
    assert_eq!(entity["customSections"][0]["title"], "Warranty");

    let (_, check) = send(
        &app,
        empty_request("GET", "/api/products/check-name?name=Tank%20A", Some(TOKEN)),
    )
    .await;
    assert_eq!(check, json!({"exists": true}));

    let (_, check) = send(
        &app,
        empty_request(
            "GET",
            &format!("/api/products/check-name?name=tank%20a&excludeId={id}"),
            Some(TOKEN),
        ),
    )
    .await;
    assert_eq!(check, json!({"exists": false}));

    let (status, error) = send(
        &app,
        multipart_request("POST", "/api/products/step1", &tank_a_parts(), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "duplicate_name");

    // names are unique per kind only
    let (status, _) = send(
        &app,
        multipart_request("POST", "/api/services/step1", &tank_a_parts(), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = send(&app, empty_request("GET", "/api/products", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn untouched_file_inputs_are_ignored() {
    let app = app();
    let mut parts = tank_a_parts();
    parts.push(Part::File("additionalImages", "", b""));

    let (status, body) = send(
        &app,
        multipart_request("POST", "/api/products/step1", &parts, Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let id = body["id"].as_str().unwrap();
    let (_, entity) = send(&app, empty_request("GET", &format!("/api/products/{id}"), None)).await;
    assert_eq!(entity["additionalImages"], json!([]));
    assert_eq!(entity["status"], "draft");
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = app();

    let (status, error) = send(
        &app,
        multipart_request("POST", "/api/products/step1", &tank_a_parts(), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["kind"], "unauthorized");

    let (status, _) = send(
        &app,
        multipart_request("POST", "/api/products/step1", &tank_a_parts(), Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        empty_request("GET", "/api/products/check-name?name=Tank", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, empty_request("GET", "/api/products", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bad_ids_and_missing_entities() {
    let app = app();
    let specs = json!({"specifications": []});

    let (status, error) = send(
        &app,
        json_request("PUT", "/api/products/step2/not-an-id", specs.clone(), Some(TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "invalid_id");

    let (status, error) = send(
        &app,
        json_request(
            "PUT",
            "/api/products/step2/65f1c0de0000000000000000",
            specs,
            Some(TOKEN),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["kind"], "not_found");

    let (status, _) = send(&app, empty_request("GET", "/api/gadgets", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = create_tank_a(&app).await;
    let (status, error) = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri(format!("/api/products/step3/{id}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "bad_request");
}

#[tokio::test]
async fn full_update_mixes_new_files_and_existing_urls() {
    let app = app();
    let id = create_tank_a(&app).await;
    let existing = "https://media.test/products/1.png";

    let parts = vec![
        Part::Text("name", "Tank A"),
        Part::Text("displayTitle", "Tank A (2024)"),
        Part::Text("group", "Tanks"),
        Part::Text("displayImage", existing),
        Part::File("additionalImages", "side.png", b"\x89PNG-side"),
        Part::Text("additionalImages", "https://cdn.example.com/legacy.png"),
    ];
    let (status, entity) = send(
        &app,
        multipart_request("PUT", &format!("/api/products/{id}"), &parts, Some(TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{entity}");
    assert_eq!(entity["displayImage"], existing);
    assert_eq!(
        entity["additionalImages"],
        json!(["https://media.test/products/2.png", "https://cdn.example.com/legacy.png"])
    );
    assert_eq!(entity["displayTitle"], "Tank A (2024)");

    let (status, fetched) = send(&app, empty_request("GET", &format!("/api/products/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, entity);

    let (status, _) = send(
        &app,
        multipart_request("PUT", &format!("/api/products/{id}"), &parts, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn enquiries_and_storefront_are_public() {
    let app = app();
    let id = create_tank_a(&app).await;
    send(
        &app,
        json_request(
            "PUT",
            &format!("/api/products/step3/{id}"),
            json!({"queries": [{"title": "Quantity", "type": "number"}]}),
            Some(TOKEN),
        ),
    )
    .await;

    let enquiry = json!({
        "interest": "purchase",
        "contactName": "Dana Reyes",
        "contactEmail": "dana@example.com",
        "answers": [{"title": "Quantity", "value": "2"}]
    });
    let (status, receipt) = send(
        &app,
        json_request("POST", &format!("/api/products/{id}/enquiry"), enquiry, None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["entityId"], id.as_str());

    let (status, page) = send(&app, empty_request("GET", "/storefront/products", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert!(page.get("unavailable").is_none());

    let (status, entity) = send(&app, empty_request("GET", "/storefront/products/tank-a", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entity["name"], "Tank A");

    let (status, health) = send(&app, empty_request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let app = app();
    let id = create_tank_a(&app).await;
    let uri = format!("/api/products/{id}");

    let (status, body) = send(&app, empty_request("DELETE", &uri, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, _) = send(&app, empty_request("DELETE", &uri, Some(TOKEN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
