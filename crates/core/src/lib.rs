//! Domain types shared by every ocrflow crate.
//!
//! Pure logic only: the job record and its transition rules, text
//! statistics, lifecycle timing configuration and the navigation state
//! machine. Nothing here performs I/O or spawns tasks.

pub mod config;
pub mod error;
pub mod job;
pub mod job_events;
pub mod text;
pub mod types;
pub mod view;
