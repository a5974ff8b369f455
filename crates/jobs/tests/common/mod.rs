#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use ocrflow_core::job::{FileMeta, Job, JobResult, JobState};
use ocrflow_core::types::{JobId, Timestamp};
use ocrflow_events::EventBus;
use ocrflow_jobs::{JobRegistry, PollConfig};
use ocrflow_ocr::{
    DocumentSubmitter, OcrError, ResourceStore, StatusSource, StoreError, SubmittedDocument,
};
use tokio::time::Instant;

/// Registry wired to a fresh event bus.
pub fn registry() -> (Arc<JobRegistry>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::default());
    (Arc::new(JobRegistry::new(Arc::clone(&bus))), bus)
}

pub fn job_created_at(created: Timestamp) -> Job {
    Job::new(
        JobId::new_v4(),
        FileMeta {
            name: "scan.pdf".into(),
            file_size: 2048,
        },
        chrono::Duration::days(2),
        created,
    )
}

/// Register a fresh processing job and return it.
pub async fn register_job(registry: &JobRegistry) -> Job {
    let job = job_created_at(Utc::now());
    registry.register(job.clone()).await.unwrap();
    job
}

pub fn poll_config() -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(2),
        max_retries: 3,
        fetch_timeout: Duration::from_secs(30),
    }
}

pub fn completed(text: &str) -> JobState {
    JobState::Completed {
        result: JobResult::new(text, vec![]),
    }
}

// ---------------------------------------------------------------------------
// Status source
// ---------------------------------------------------------------------------

/// One scripted reply of [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum Step {
    Reply(JobState),
    Fail,
    /// Never answers within any sane timeout.
    Hang,
}

/// Status source that replays a script. Once the script is exhausted every
/// fetch fails.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::with_delay(steps, Duration::ZERO)
    }

    pub fn with_delay(steps: Vec<Step>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, _job_id: JobId) -> Result<JobState, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Fail);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Step::Reply(state) => Ok(state),
            Step::Fail => Err(OcrError::Api {
                status: 503,
                body: "service unavailable".into(),
            }),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(OcrError::Api {
                    status: 504,
                    body: "gateway timeout".into(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Resource store
// ---------------------------------------------------------------------------

/// Resource store recording deletes; fails the first `failures` calls.
#[derive(Default)]
pub struct FakeStore {
    deleted: Mutex<Vec<JobId>>,
    failures: AtomicUsize,
    hang: bool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            ..Self::default()
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang: true,
            ..Self::default()
        })
    }

    pub fn deleted(&self) -> Vec<JobId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ResourceStore for FakeStore {
    async fn delete_resource(&self, job_id: JobId) -> Result<(), StoreError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io {
                path: PathBuf::from(format!("uploads/{job_id}_scan.pdf")),
                source: std::io::Error::other("disk unavailable"),
            });
        }
        self.deleted.lock().unwrap().push(job_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSubmitter {
    submitted: Mutex<Vec<(JobId, SubmittedDocument)>>,
    reject: bool,
    delay: Duration,
}

impl FakeSubmitter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    /// Accepts every document after `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn submitted(&self) -> Vec<(JobId, SubmittedDocument)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DocumentSubmitter for FakeSubmitter {
    async fn submit_document(
        &self,
        job_id: JobId,
        document: &SubmittedDocument,
    ) -> Result<(), OcrError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject {
            return Err(OcrError::Api {
                status: 422,
                body: "not a PDF".into(),
            });
        }
        self.submitted
            .lock()
            .unwrap()
            .push((job_id, document.clone()));
        Ok(())
    }
}

pub fn document(name: &str) -> SubmittedDocument {
    SubmittedDocument {
        name: name.into(),
        path: PathBuf::from(format!("uploads/{name}")),
    }
}
