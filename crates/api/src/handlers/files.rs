//! Handlers for the `/files` resource: uploads, job lookup, deletion and
//! text edits.

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ocrflow_core::error::CoreError;
use ocrflow_core::job::{FileMeta, Job};
use ocrflow_core::types::JobId;
use ocrflow_ocr::SubmittedDocument;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::config::MAX_BATCH_FILES;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub selected_text: String,
    pub correction: String,
}

/// A file left out of a batch upload.
#[derive(Debug, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SkippedFile>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An upload already streamed to disk under its job id.
struct StoredUpload {
    job_id: JobId,
    name: String,
    path: PathBuf,
    size: u64,
}

fn is_pdf(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Stream one multipart field to the upload directory.
///
/// Non-PDF names are rejected before any byte is read. Empty and oversized
/// files are rejected and their partial file removed.
async fn store_upload(state: &AppState, mut field: Field<'_>) -> AppResult<StoredUpload> {
    let name = field.file_name().unwrap_or("").to_string();
    if !is_pdf(&name) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file '{name}'. Only PDF files are accepted"
        )));
    }

    let job_id = JobId::new_v4();
    let path = state.uploads.upload_path(job_id, &name);
    match write_field(&mut field, &path, &name, state.config.max_upload_bytes).await {
        Ok(0) => {
            remove_upload(&path).await;
            Err(AppError::BadRequest(format!("File '{name}' is empty")))
        }
        Ok(size) => Ok(StoredUpload {
            job_id,
            name,
            path,
            size,
        }),
        Err(e) => {
            remove_upload(&path).await;
            Err(e)
        }
    }
}

async fn write_field(
    field: &mut Field<'_>,
    path: &std::path::Path,
    name: &str,
    max_bytes: usize,
) -> AppResult<u64> {
    let io_error = |e: std::io::Error| AppError::InternalError(format!("Failed to store upload: {e}"));

    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes as u64 {
            return Err(AppError::PayloadTooLarge(format!(
                "File '{name}' exceeds the {} MB limit",
                max_bytes / (1024 * 1024)
            )));
        }
        file.write_all(&chunk).await.map_err(io_error)?;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

async fn remove_upload(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
        }
    }
}

/// Hand a stored upload to the lifecycle. The file is removed again if no
/// job could be created for it.
async fn accept_upload(state: &AppState, upload: StoredUpload) -> AppResult<Job> {
    let meta = FileMeta {
        name: upload.name.clone(),
        file_size: upload.size,
    };
    let document = SubmittedDocument {
        name: upload.name,
        path: upload.path.clone(),
    };
    match state.lifecycle.create_job(upload.job_id, meta, document).await {
        Ok(job) => Ok(job),
        Err(e) => {
            remove_upload(&upload.path).await;
            Err(e.into())
        }
    }
}

/// `Content-Disposition` for serving `name` inline. Characters that cannot
/// appear in a quoted header value are replaced.
fn inline_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            ' ' => ' ',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    format!("inline; filename=\"{safe}\"")
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/files
///
/// Multipart upload of one PDF in the `file` field. Returns 201 with the
/// new job, which starts in `processing`.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(store_upload(&state, field).await?);
            break;
        }
    }

    let upload =
        upload.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let job = accept_upload(&state, upload).await?;
    tracing::info!(job_id = %job.id, name = %job.name, file_size = job.file_size, "File uploaded");

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// POST /api/files/batch
///
/// Multipart upload of several PDFs (`files` or `file` fields). Files that
/// are not PDFs, are empty, or are too large are skipped and reported.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        seen += 1;
        if seen > MAX_BATCH_FILES {
            skipped.push(SkippedFile {
                name: field.file_name().unwrap_or("").to_string(),
                reason: format!("Batch limit of {MAX_BATCH_FILES} files reached"),
            });
            continue;
        }
        let name = field.file_name().unwrap_or("").to_string();
        let upload = match store_upload(&state, field).await {
            Ok(upload) => upload,
            Err(e @ (AppError::BadRequest(_) | AppError::PayloadTooLarge(_))) => {
                tracing::warn!(%name, error = %e, "Skipping batch file");
                skipped.push(SkippedFile {
                    name,
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };
        jobs.push(accept_upload(&state, upload).await?);
    }

    if seen == 0 {
        return Err(AppError::BadRequest("No files in batch upload".into()));
    }
    tracing::info!(created = jobs.len(), skipped = skipped.len(), "Batch uploaded");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BatchUploadResponse { jobs, skipped },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/files
pub async fn list_files(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.lifecycle.registry().list().await;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .lifecycle
        .registry()
        .get(id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/files/{id}/pdf
///
/// Streams the uploaded PDF back, e.g. for side-by-side display in the
/// editor.
pub async fn get_pdf(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Response> {
    let job = state
        .lifecycle
        .registry()
        .get(id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;

    let path = state.uploads.upload_path(id, &job.name);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "PdfFile",
                id,
            }))
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (header::CONTENT_DISPOSITION, inline_disposition(&job.name)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/files/{id}
///
/// Deletes the job's files and OCR-side data, then forgets the job. If the
/// backing delete fails the job is kept and 500 is returned.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<StatusCode> {
    state.lifecycle.delete_job(id).await?;
    tracing::info!(job_id = %id, "File deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// PUT /api/files/{id}/text
pub async fn update_text(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Json(input): Json<UpdateTextRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state.lifecycle.replace_text(id, input.text).await?;
    Ok(Json(DataResponse { data: job }))
}

/// POST /api/files/{id}/correct
///
/// Replaces every occurrence of `selected_text` with `correction`.
pub async fn correct_text(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Json(input): Json<CorrectionRequest>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .lifecycle
        .apply_correction(id, &input.selected_text, &input.correction)
        .await?;
    Ok(Json(DataResponse { data: job }))
}
