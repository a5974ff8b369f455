#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use ocrflow_api::config::ServerConfig;
use ocrflow_api::routes;
use ocrflow_api::state::AppState;
use ocrflow_core::config::LifecycleConfig;
use ocrflow_core::job::{FileMeta, Job, JobResult, JobState};
use ocrflow_core::types::JobId;
use ocrflow_events::EventBus;
use ocrflow_jobs::{JobLifecycle, JobRegistry, PollerSupervisor, SharedView, ViewDriver};
use ocrflow_ocr::{
    DocumentSubmitter, FanoutStore, LocalResourceStore, OcrError, ResourceStore, StatusSource, StoreError,
    SubmittedDocument,
};

/// Upload limit used by tests: 1 KB.
pub const TEST_MAX_UPLOAD_BYTES: usize = 1024;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
        upload_dir: dir.join("uploads"),
        output_dir: dir.join("outputs"),
        ocr_api_url: "http://127.0.0.1:9".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Always reports the job as still processing.
pub struct StillProcessing;

#[async_trait::async_trait]
impl StatusSource for StillProcessing {
    async fn fetch_status(&self, _job_id: JobId) -> Result<JobState, OcrError> {
        Ok(JobState::processing(10, "Processing page 1"))
    }
}

#[derive(Default)]
pub struct FakeOcr {
    pub submitted: AtomicUsize,
    pub deleted: AtomicUsize,
    pub fail_deletes: AtomicBool,
}

#[async_trait::async_trait]
impl DocumentSubmitter for FakeOcr {
    async fn submit_document(
        &self,
        _job_id: JobId,
        _document: &SubmittedDocument,
    ) -> Result<(), OcrError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceStore for FakeOcr {
    async fn delete_resource(&self, _job_id: JobId) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Remote(OcrError::Api {
                status: 500,
                body: "storage offline".into(),
            }));
        }
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Handles into the running test app.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<JobRegistry>,
    pub view: SharedView,
    pub ocr: Arc<FakeOcr>,
    pub config: ServerConfig,
    _dir: tempfile::TempDir,
}

impl TestApp {
    /// Register a completed job directly, bypassing upload.
    pub async fn completed_job(&self, text: &str) -> Job {
        let job = Job::new(
            JobId::new_v4(),
            FileMeta {
                name: "done.pdf".into(),
                file_size: 100,
            },
            chrono::Duration::days(2),
            chrono::Utc::now(),
        );
        self.registry.register(job.clone()).await.unwrap();
        self.registry
            .update(
                job.id,
                JobState::Completed {
                    result: JobResult::new(text, vec![]),
                },
            )
            .await
            .unwrap();
        self.registry.get(job.id).await.unwrap()
    }
}

/// Build the full application router with all middleware layers and fake
/// OCR collaborators.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack.
pub async fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let lifecycle_config = LifecycleConfig::default();

    let uploads = Arc::new(LocalResourceStore::new(
        config.upload_dir.clone(),
        config.output_dir.clone(),
    ));
    uploads.ensure_dirs().await.unwrap();
    let ocr = Arc::new(FakeOcr::default());

    let event_bus = Arc::new(EventBus::default());
    let registry = Arc::new(JobRegistry::new(Arc::clone(&event_bus)));
    let pollers = PollerSupervisor::new(
        Arc::clone(&registry),
        Arc::new(StillProcessing),
        (&lifecycle_config).into(),
    );
    let driver = ViewDriver::new(Arc::clone(&registry), lifecycle_config.auto_advance_grace);
    let view = driver.view();
    tokio::spawn(driver.run(
        event_bus.subscribe(),
        tokio_util::sync::CancellationToken::new(),
    ));

    let lifecycle = Arc::new(JobLifecycle::new(
        Arc::clone(&registry),
        pollers,
        Arc::new(FanoutStore::new(vec![
            ocr.clone() as Arc<dyn ResourceStore>,
            uploads.clone() as Arc<dyn ResourceStore>,
        ])),
        ocr.clone(),
        lifecycle_config,
    ));
    let state = AppState {
        config: Arc::new(config.clone()),
        lifecycle,
        view: Arc::clone(&view),
        uploads,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::api_routes())
        .layer(DefaultBodyLimit::max(config.max_request_bytes()))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    TestApp {
        router,
        registry,
        view,
        ocr,
        config,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, Method::POST, uri, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    json_request(app, Method::PUT, uri, body).await
}

async fn json_request(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

const BOUNDARY: &str = "ocrflow-test-boundary";

/// POST a multipart body with one part per `(field, file_name, bytes)`.
pub async fn post_multipart(app: &TestApp, uri: &str, files: &[(&str, &str, &[u8])]) -> Response {
    let mut body = Vec::new();
    for (field, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Number of files currently in the upload directory.
pub fn upload_count(app: &TestApp) -> usize {
    std::fs::read_dir(&app.config.upload_dir).unwrap().count()
}
