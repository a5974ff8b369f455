//! Local backing storage for uploads and generated outputs.
//!
//! Uploads are written as `{upload_dir}/{job_id}_{safe_name}`; anything the
//! converter produces lands in `{output_dir}` with a name starting with the
//! job id. Deleting a job removes every file matching those prefixes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocrflow_core::types::JobId;

use crate::source::{ResourceStore, StoreError};

#[derive(Debug, Clone)]
pub struct LocalResourceStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl LocalResourceStore {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Create both directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    /// Where the upload for `job_id` named `file_name` is stored.
    pub fn upload_path(&self, job_id: JobId, file_name: &str) -> PathBuf {
        self.upload_dir
            .join(format!("{job_id}_{}", sanitize_file_name(file_name)))
    }

    async fn delete_prefixed(&self, dir: &Path, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: dir.to_path_buf(),
                        source,
                    })
                }
            };

            if !entry.file_name().to_string_lossy().starts_with(prefix) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                // Someone else got there first.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::Io { path, source }),
            }
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ResourceStore for LocalResourceStore {
    async fn delete_resource(&self, job_id: JobId) -> Result<(), StoreError> {
        let id = job_id.to_string();
        let uploads = self
            .delete_prefixed(&self.upload_dir, &format!("{id}_"))
            .await?;
        let outputs = self.delete_prefixed(&self.output_dir, &id).await?;

        tracing::debug!(%job_id, uploads, outputs, "Deleted local job files");
        Ok(())
    }
}

/// Deletes from several stores in order.
///
/// Every store is attempted even if an earlier one fails; the first error is
/// returned. Since each store is idempotent, the next attempt simply retries
/// the ones that failed.
#[derive(Clone, Default)]
pub struct FanoutStore {
    stores: Vec<Arc<dyn ResourceStore>>,
}

impl FanoutStore {
    pub fn new(stores: Vec<Arc<dyn ResourceStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait::async_trait]
impl ResourceStore for FanoutStore {
    async fn delete_resource(&self, job_id: JobId) -> Result<(), StoreError> {
        let mut first_error = None;
        for store in &self.stores {
            if let Err(e) = store.delete_resource(job_id).await {
                tracing::warn!(%job_id, error = %e, "Backing store delete failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Replace characters that are unsafe in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}
