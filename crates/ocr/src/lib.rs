//! Collaborators of the job lifecycle: the OCR service and backing storage.
//!
//! The lifecycle crates only see the traits in [`source`]. [`api::OcrApi`]
//! implements them over HTTP; [`storage::LocalResourceStore`] removes the
//! uploaded and generated files of a job from local disk.

pub mod api;
pub mod source;
pub mod storage;
pub mod wire;

pub use api::OcrApi;
pub use source::{
    DocumentSubmitter, OcrError, ResourceStore, StatusSource, StoreError, SubmittedDocument,
};
pub use storage::{FanoutStore, LocalResourceStore};
