#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chartcast_core::dataset::{Dataset, DataSource};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use chartcast_api::config::ServerConfig;
use chartcast_api::router::build_app_router;
use chartcast_api::state::AppState;

/// Build a test `ServerConfig` writing artifacts into `output_dir`.
///
/// Server-side capture is disabled (no WebDriver) and the recorder points at
/// `sh` so tests can supply a shell script.
pub fn test_config(output_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        public_base_url: "http://localhost:8000".to_string(),
        webdriver_url: None,
        browser_headless: true,
        settle_delay_ms: 0,
        capture_call_timeout_secs: 5,
        job_timeout_secs: 60,
        frame_retries: 0,
        job_retention_secs: 300,
        recorder_program: "sh".to_string(),
        recorder_script: None,
        recorder_workdir: output_dir.clone(),
        recorder_timeout_secs: 10,
        output_dir,
    }
}

/// A router plus handles to its state and scratch directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router, with the production middleware stack,
/// around a small fixed dataset.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| {})
}

/// Like [`build_test_app`], letting the caller adjust the config first.
pub fn build_test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    adjust(&mut config);
    let state = AppState::new(config.clone(), DataSource::new(fixture_dataset()));
    let router = build_app_router(state.clone(), &config);
    TestApp { router, state, dir }
}

/// Four rows with numeric, string and boolean columns.
pub fn fixture_dataset() -> Dataset {
    let records = vec![
        json!({"id": 1, "revenue": 100.0, "profit": 10.0, "region": "North", "active": true}),
        json!({"id": 2, "revenue": 250.5, "profit": 40.0, "region": "South", "active": false}),
        json!({"id": 3, "revenue": 75.0, "profit": -5.0, "region": "North", "active": true}),
        json!({"id": 4, "revenue": 310.0, "profit": 55.5, "region": "East", "active": true}),
    ];
    Dataset::from_json_records(records).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a single-file multipart form with the file in the `file` field.
pub async fn post_file(app: Router, uri: &str, filename: &str, contents: &[u8]) -> Response {
    let boundary = "chartcast-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A solid-colour PNG as a `data:` URL, the way the capture script posts it.
pub fn png_data_url(width: u32, height: u32, shade: u8) -> String {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([shade, 0, 0, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", BASE64.encode(bytes.into_inner()))
}

/// Poll a job until it reaches a terminal status or the deadline passes.
pub async fn wait_for_terminal(app: &Router, session_id: &str) -> Value {
    let uri = format!("/api/v1/animations/{session_id}");
    for _ in 0..200 {
        let response = get(app.clone(), &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {session_id} did not finish in time");
}
