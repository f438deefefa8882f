//! HTTP dispatch over the mock deployment.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bmi_einstein::api::{create_router, Command, ExecuteRequest};
use bmi_einstein::authz::Credentials;
use common::Harness;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    create_router(h.app_state())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/execute")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn execute(credentials: Credentials, command: &Command) -> Value {
    serde_json::to_value(ExecuteRequest::new(credentials, command).unwrap()).unwrap()
}

fn alice(project: &str) -> Credentials {
    Credentials::new(common::TENANT_USER, "secret", project)
}

#[tokio::test]
async fn test_healthz() {
    let h = Harness::new();
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "einstein");
}

#[tokio::test]
async fn test_execute_create_disk() {
    let h = Harness::scenario();
    let command = Command::CreateDisk {
        disk_name: "disk1".into(),
        image_name: "ubuntu".into(),
    };

    let (status, body) = post(router(&h), execute(alice("tenantA"), &command)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status_code": 200, "return_value": "4img12"}));
    assert!(h.cluster().targets().contains_key("4img12"));
    assert_eq!(h.cluster().acquires(), h.cluster().releases());
}

#[tokio::test]
async fn test_failures_travel_in_the_envelope() {
    let h = Harness::scenario();
    let command = Command::CreateDisk {
        disk_name: "disk1".into(),
        image_name: "centos".into(),
    };

    let (status, body) = post(router(&h), execute(alice("tenantA"), &command)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status_code": 404, "message": "Image centos does not exist"})
    );
}

#[tokio::test]
async fn test_command_without_args() {
    let h = Harness::scenario();
    let body = json!({
        "credentials": alice("tenantA"),
        "command": "list_images",
    });

    let (status, body) = post(router(&h), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status_code": 200, "return_value": ["ubuntu"]}));
}

#[tokio::test]
async fn test_unknown_command_is_bad_request() {
    let h = Harness::scenario();
    let body = json!({
        "credentials": alice("tenantA"),
        "command": "format_disk",
        "args": {},
    });

    let (status, body) = post(router(&h), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
    assert!(h.cluster().calls().is_empty());
}

#[tokio::test]
async fn test_missing_args_is_bad_request() {
    let h = Harness::scenario();
    let body = json!({
        "credentials": alice("tenantA"),
        "command": "create_disk",
        "args": {"disk_name": "disk1"},
    });

    let (status, body) = post(router(&h), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let h = Harness::scenario();
    let (status, body) = post(router(&h), json!({"command": "list_images"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let h = Harness::scenario();
    let credentials = Credentials {
        token: "not base64!".into(),
        project: "tenantA".into(),
    };

    let (status, body) = post(router(&h), execute(credentials, &Command::ListDisks)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 401);
    assert_eq!(h.cluster().acquires(), 0);
}

#[tokio::test]
async fn test_unknown_project() {
    let h = Harness::scenario();

    let (status, body) = post(router(&h), execute(alice("tenantZ"), &Command::ListDisks)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status_code": 404, "message": "Project tenantZ does not exist"})
    );
    assert_eq!(h.cluster().acquires(), 1);
    assert_eq!(h.cluster().releases(), 1);
}

#[tokio::test]
async fn test_admin_listing_over_http() {
    let h = Harness::scenario();
    let root = Credentials::new(common::ADMIN_USER, "secret", "bmi_admin");

    let (_, body) = post(router(&h), execute(root, &Command::ListProjects)).await;
    let names: Vec<&str> = body["return_value"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bmi_admin", "tenantA", "tenantB"]);

    let (_, body) = post(router(&h), execute(alice("tenantA"), &Command::ListProjects)).await;
    assert_eq!(
        body,
        json!({"status_code": 403, "message": "Authorization failed"})
    );
}
