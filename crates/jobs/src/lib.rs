//! Job lifecycle: the registry, per-job status pollers, the eviction
//! sweeper and the view driver.

pub mod lifecycle;
pub mod poller;
pub mod registry;
pub mod sweeper;
pub mod view_driver;

pub use lifecycle::{JobLifecycle, LifecycleError};
pub use poller::{ExitReason, JobPoller, PollConfig, PollExit, PollerSupervisor};
pub use registry::{JobRegistry, RegistryError, UpdateOutcome};
pub use sweeper::{EvictionSweeper, SweepReport};
pub use view_driver::{SharedView, ViewDriver};
