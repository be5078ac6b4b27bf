//! # Pitcrew Core
//!
//! Domain model and collaborator contracts for the maintenance lifecycle
//! engine. Everything stateful lives behind the [`Storage`] and [`Mailer`]
//! traits — persistence and delivery are external collaborators.
//!
//! ## Architecture
//! ```text
//! MaintenancePlan (cadence: event_count | time_interval | odometer | engine_hours)
//!   └── PlanChecklistItem (offset, matcher spec)
//! VehiclePlan (plan ⇄ vehicle assignment, activation baselines)
//!   └── MaintenanceTask (trigger context, status state machine)
//!         └── TaskEvent (append-only audit trail)
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod traits;
pub mod types;

pub use cancel::CancelFlag;
pub use config::PitcrewConfig;
pub use error::{PitcrewError, Result};
pub use memory::MemoryStore;
pub use traits::{EmailMessage, Mailer, Storage};
pub use types::{
    Cadence, CompletionSource, DueOffset, MaintenanceLog, MaintenancePlan, MaintenanceTask,
    MatcherSpec, NotificationPreferences, PlanChecklistItem, TaskEvent, TaskStatus, Trackday,
    TriggerContext, User, Vehicle, VehiclePlan, VehiclePlanStatus,
};
