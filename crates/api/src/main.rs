use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocrflow_api::config::ServerConfig;
use ocrflow_api::{routes, state};
use ocrflow_core::config::LifecycleConfig;
use ocrflow_events::EventBus;
use ocrflow_jobs::{EvictionSweeper, JobLifecycle, JobRegistry, PollerSupervisor, ViewDriver};
use ocrflow_ocr::{FanoutStore, LocalResourceStore, OcrApi, ResourceStore};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ocrflow_api=debug,ocrflow_jobs=debug,ocrflow_ocr=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let lifecycle_config = LifecycleConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        retention_hours = lifecycle_config.retention.num_hours(),
        poll_interval_ms = lifecycle_config.poll_interval.as_millis() as u64,
        max_fetch_retries = lifecycle_config.max_fetch_retries,
        "Loaded lifecycle configuration"
    );

    // --- Storage ---
    let uploads = Arc::new(LocalResourceStore::new(
        config.upload_dir.clone(),
        config.output_dir.clone(),
    ));
    uploads
        .ensure_dirs()
        .await
        .expect("Failed to create upload/output directories");

    // --- OCR service client ---
    let http = reqwest::Client::builder()
        .timeout(lifecycle_config.fetch_timeout)
        .build()
        .expect("Failed to build HTTP client");
    let ocr = Arc::new(OcrApi::with_client(http, config.ocr_api_url.clone()));
    tracing::info!(url = %config.ocr_api_url, "OCR service client created");

    let store: Arc<dyn ResourceStore> = Arc::new(FanoutStore::new(vec![
        ocr.clone() as Arc<dyn ResourceStore>,
        uploads.clone() as Arc<dyn ResourceStore>,
    ]));

    // --- Event bus + registry ---
    let event_bus = Arc::new(EventBus::default());
    let registry = Arc::new(JobRegistry::new(Arc::clone(&event_bus)));

    // --- Background tasks ---
    let background_cancel = CancellationToken::new();

    let pollers = PollerSupervisor::new(
        Arc::clone(&registry),
        ocr.clone(),
        (&lifecycle_config).into(),
    );

    // Subscribe before any job exists so no completion is missed.
    let view_driver = ViewDriver::new(Arc::clone(&registry), lifecycle_config.auto_advance_grace);
    let view = view_driver.view();
    let view_handle = tokio::spawn(view_driver.run(event_bus.subscribe(), background_cancel.clone()));

    let sweeper = EvictionSweeper::new(Arc::clone(&registry), Arc::clone(&store), &lifecycle_config);
    let sweeper_handle = tokio::spawn(sweeper.run(background_cancel.clone()));

    tracing::info!("Background services started (view driver, eviction sweeper)");

    // --- App state ---
    let lifecycle = Arc::new(JobLifecycle::new(
        Arc::clone(&registry),
        Arc::clone(&pollers),
        store,
        ocr,
        lifecycle_config,
    ));
    let state = AppState {
        config: Arc::new(config.clone()),
        lifecycle,
        view,
        uploads,
    };

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api).
        .merge(routes::health::router())
        .nest("/api", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(DefaultBodyLimit::max(config.max_request_bytes()))
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    // Pollers first: they may have fetches in flight.
    pollers.shutdown().await;

    background_cancel.cancel();
    let _ = tokio::time::timeout(grace, sweeper_handle).await;
    let _ = tokio::time::timeout(grace, view_handle).await;
    tracing::info!("Background services stopped");

    drop(registry);
    drop(event_bus);

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
