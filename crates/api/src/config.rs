use std::path::PathBuf;

/// Upper bound on files accepted by one batch upload request.
pub const MAX_BATCH_FILES: usize = 20;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables. Lifecycle timing
/// lives in [`ocrflow_core::config::LifecycleConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after the server exits
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted PDF in bytes (default: 150 MB).
    pub max_upload_bytes: usize,
    /// Where uploaded PDFs are written (default: `uploads`).
    pub upload_dir: PathBuf,
    /// Where converter outputs are written (default: `outputs`).
    pub output_dir: PathBuf,
    /// Base URL of the OCR service (default: `http://localhost:8100`).
    pub ocr_api_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `MAX_UPLOAD_MB`        | `150`                      |
    /// | `UPLOAD_DIR`           | `uploads`                  |
    /// | `OUTPUT_DIR`           | `outputs`                  |
    /// | `OCR_API_URL`          | `http://localhost:8100`    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("MAX_UPLOAD_MB must be a valid usize");

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
        let output_dir = std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "outputs".into());
        let ocr_api_url =
            std::env::var("OCR_API_URL").unwrap_or_else(|_| "http://localhost:8100".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            ocr_api_url,
        }
    }

    /// Request body limit for upload routes: room for a full batch.
    pub fn max_request_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_mul(MAX_BATCH_FILES)
    }
}
