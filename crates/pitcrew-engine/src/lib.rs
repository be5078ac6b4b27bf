//! # Pitcrew Engine
//!
//! The maintenance lifecycle engine: turns declarative plans into dated
//! tasks, advances task status, and matches real-world maintenance logs
//! against open tasks.
//!
//! ## Control flow
//! ```text
//! run_maintenance_job (tokio interval)
//!   ├── TriggerProcessor::process_all_triggers   (cadence → new pending tasks)
//!   ├── TriggerProcessor::update_task_statuses   (pending → due)
//!   └── notification callback                    (wired by the embedder)
//!
//! maintenance-log creation (request-scoped)
//!   └── TriggerProcessor::apply_auto_complete    (matcher → completed task)
//! ```

pub mod cadence;
pub mod job;
pub mod matcher;
pub mod processor;

pub use cadence::{DueCandidate, VehicleHistory};
pub use job::run_maintenance_job;
pub use matcher::{MatchSuggestion, TaskMatch, match_log_to_tasks, suggest_best_match};
pub use processor::TriggerProcessor;
