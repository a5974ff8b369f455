//! ocrflow event bus.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`] — envelope for every accepted registry mutation.

pub mod bus;

pub use bus::{EventBus, JobEvent, JobEventKind, RemovalReason};
