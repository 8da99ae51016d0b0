pub mod backend;
pub mod clock;
pub mod debounce;
pub mod permission;
pub mod plan;
pub mod scheduler;
pub mod spool;
pub mod state;

pub use backend::{BackendError, MemoryBackend, NotificationBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use debounce::Debouncer;
pub use permission::{PermissionGateway, PermissionPlatform, PermissionStatus};
pub use plan::ReminderSettings;
pub use scheduler::{NotificationScheduler, PassOutcome};
pub use spool::SpoolBackend;
pub use state::{MemoryStateStore, MetaStateStore, SchedulerState, StateStore};
