//! Domain model — plans, vehicles, tasks, and the records that drive them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// How often a checklist item comes due. Exactly one variant per plan —
/// a plan can never carry a cadence type with a mismatched config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cadence {
    /// After every N completed trackdays.
    EventCount { after_every_n: u32 },
    /// Every `interval_days` calendar days, anchored at `start_date`
    /// (or the vehicle plan's activation date when unset).
    TimeInterval {
        interval_days: u32,
        #[serde(default)]
        start_date: Option<NaiveDate>,
    },
    /// Every `interval_km` of odometer distance.
    Odometer {
        interval_km: u32,
        #[serde(default)]
        start_odometer_km: Option<u32>,
    },
    /// Every `interval_hours` of engine running time.
    EngineHours {
        interval_hours: u32,
        #[serde(default)]
        start_hours: Option<u32>,
    },
}

impl Cadence {
    /// Short name for logging and display.
    pub fn kind(&self) -> &'static str {
        match self {
            Cadence::EventCount { .. } => "event_count",
            Cadence::TimeInterval { .. } => "time_interval",
            Cadence::Odometer { .. } => "odometer",
            Cadence::EngineHours { .. } => "engine_hours",
        }
    }
}

/// A declarative maintenance plan. Authoring is a data-entry concern;
/// the engine only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub id: String,
    pub name: String,
    /// Templates are system-owned starting points, never assigned directly.
    pub is_template: bool,
    /// Owning user; `None` for system plans.
    pub owner_id: Option<String>,
    pub cadence: Cadence,
    pub created_at: DateTime<Utc>,
}

impl MaintenancePlan {
    pub fn new(name: &str, cadence: Cadence) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            is_template: false,
            owner_id: None,
            cadence,
            created_at: Utc::now(),
        }
    }
}

/// Extra delay applied on top of a cadence trigger before the task is due.
/// Only the days component is applied today; the other units are reserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DueOffset {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub trackdays: u32,
    #[serde(default)]
    pub odometer_km: u32,
}

/// How the auto-complete matcher recognizes a maintenance log as satisfying
/// a checklist item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherSpec {
    /// Exact maintenance-type to match; falls back to the item's own type tag.
    #[serde(default)]
    pub maintenance_type: Option<String>,
    /// Accept logs whose odometer is within this distance of the service target.
    #[serde(default)]
    pub odometer_tolerance_km: Option<u32>,
    /// Keywords expected in the log notes (case-insensitive substring).
    #[serde(default)]
    pub required_parts: Vec<String>,
}

/// One maintenance action belonging to a plan (e.g. "check tire pressure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanChecklistItem {
    pub id: String,
    pub plan_id: String,
    pub title: String,
    pub description: String,
    /// Type tag, e.g. "oil_change", "brake_fluid".
    pub maintenance_type: String,
    #[serde(default)]
    pub due_offset: DueOffset,
    #[serde(default)]
    pub matcher: MatcherSpec,
    pub sequence: u32,
    pub critical: bool,
}

impl PlanChecklistItem {
    pub fn new(plan_id: &str, title: &str, maintenance_type: &str) -> Self {
        Self {
            id: new_id(),
            plan_id: plan_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            maintenance_type: maintenance_type.to_string(),
            due_offset: DueOffset::default(),
            matcher: MatcherSpec::default(),
            sequence: 0,
            critical: false,
        }
    }
}

/// Assignment status of a plan on a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehiclePlanStatus {
    Active,
    Paused,
    Ended,
}

/// A maintenance plan assigned to one vehicle, with activation baselines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePlan {
    pub id: String,
    pub plan_id: String,
    pub vehicle_id: String,
    pub activated_at: DateTime<Utc>,
    /// Odometer reading when the plan was activated.
    #[serde(default)]
    pub start_odometer_km: Option<u32>,
    /// Engine-hours reading when the plan was activated.
    #[serde(default)]
    pub start_engine_hours: Option<u32>,
    /// Authoritative current engine-hours reading for this vehicle plan.
    #[serde(default)]
    pub current_engine_hours: Option<u32>,
    pub status: VehiclePlanStatus,
}

impl VehiclePlan {
    pub fn new(plan_id: &str, vehicle_id: &str) -> Self {
        Self {
            id: new_id(),
            plan_id: plan_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            activated_at: Utc::now(),
            start_odometer_km: None,
            start_engine_hours: None,
            current_engine_hours: None,
            status: VehiclePlanStatus::Active,
        }
    }
}

/// Task status state machine. Transitions are monotonic except for snooze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Due,
    Snoozed,
    Completed,
    Dismissed,
}

impl TaskStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Dismissed)
    }

    /// Open tasks are eligible for auto-complete matching.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Due)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Due => write!(f, "due"),
            TaskStatus::Snoozed => write!(f, "snoozed"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// How a task was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSource {
    Manual,
    AutoMatched,
}

/// Why a task was generated. One shape per cadence type; also the
/// de-duplication key — see [`TriggerContext::is_duplicate_of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerContext {
    EventCount {
        completed_events: u32,
        every_n: u32,
        trackday_id: String,
    },
    TimeInterval {
        scheduled_for: NaiveDate,
    },
    Odometer {
        service_km: u32,
    },
    EngineHours {
        service_hours: u32,
    },
}

impl TriggerContext {
    /// Whether an existing task with `other` as its trigger makes a new task
    /// with `self` redundant. Time-interval triggers tolerate ±1 day of drift
    /// around the scheduled date; the rest compare their threshold exactly.
    pub fn is_duplicate_of(&self, other: &TriggerContext) -> bool {
        match (self, other) {
            (
                TriggerContext::EventCount {
                    completed_events: a,
                    every_n: n,
                    ..
                },
                TriggerContext::EventCount {
                    completed_events: b,
                    every_n: m,
                    ..
                },
            ) => a == b && n == m,
            (
                TriggerContext::TimeInterval { scheduled_for: a },
                TriggerContext::TimeInterval { scheduled_for: b },
            ) => (*a - *b).num_days().abs() <= 1,
            (
                TriggerContext::Odometer { service_km: a },
                TriggerContext::Odometer { service_km: b },
            ) => a == b,
            (
                TriggerContext::EngineHours { service_hours: a },
                TriggerContext::EngineHours { service_hours: b },
            ) => a == b,
            _ => false,
        }
    }

    /// The odometer threshold this trigger aims at, if any. Used by the
    /// matcher as the target-odometer hint.
    pub fn service_km_hint(&self) -> Option<u32> {
        match self {
            TriggerContext::Odometer { service_km } => Some(*service_km),
            _ => None,
        }
    }

    /// Human-readable summary for notifications and display.
    pub fn describe(&self) -> String {
        match self {
            TriggerContext::EventCount {
                completed_events,
                every_n,
                ..
            } => format!("after {completed_events} trackdays (every {every_n})"),
            TriggerContext::TimeInterval { scheduled_for } => {
                format!("scheduled for {scheduled_for}")
            }
            TriggerContext::Odometer { service_km } => format!("service at {service_km} km"),
            TriggerContext::EngineHours { service_hours } => {
                format!("service at {service_hours} engine hours")
            }
        }
    }
}

/// A generated unit of maintenance work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: String,
    pub vehicle_plan_id: String,
    /// Checklist item this task was generated from, if any.
    pub checklist_item_id: Option<String>,
    /// Free-text title for tasks created outside a plan.
    pub custom_title: Option<String>,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub trigger: TriggerContext,
    pub last_notification_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub completion_source: Option<CompletionSource>,
    /// Maintenance log that completed this task, when auto-matched or linked.
    pub maintenance_log_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceTask {
    /// Task generated from a plan checklist item.
    pub fn from_checklist_item(
        vehicle_plan_id: &str,
        checklist_item_id: &str,
        due_at: DateTime<Utc>,
        trigger: TriggerContext,
    ) -> Self {
        Self {
            id: new_id(),
            vehicle_plan_id: vehicle_plan_id.to_string(),
            checklist_item_id: Some(checklist_item_id.to_string()),
            custom_title: None,
            due_at,
            status: TaskStatus::Pending,
            trigger,
            last_notification_at: None,
            snoozed_until: None,
            completed_at: None,
            dismissed_at: None,
            completion_source: None,
            maintenance_log_id: None,
            created_at: Utc::now(),
        }
    }

    /// Task with a free-text title, outside any checklist item.
    pub fn custom(
        vehicle_plan_id: &str,
        title: &str,
        due_at: DateTime<Utc>,
        trigger: TriggerContext,
    ) -> Self {
        Self {
            custom_title: Some(title.to_string()),
            checklist_item_id: None,
            ..Self::from_checklist_item(vehicle_plan_id, "", due_at, trigger)
        }
    }
}

/// Append-only audit record of a task status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: String,
    pub task_id: String,
    pub from: Option<TaskStatus>,
    pub to: TaskStatus,
    /// Who or what drove the transition ("trigger_processor", "user:<id>", ...).
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn transition(task_id: &str, from: Option<TaskStatus>, to: TaskStatus, actor: &str) -> Self {
        Self {
            id: new_id(),
            task_id: task_id.to_string(),
            from,
            to,
            actor: actor.to_string(),
            at: Utc::now(),
        }
    }
}

/// A scheduled or completed trackday for a vehicle. Completed vs upcoming is
/// derived from `date` relative to now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trackday {
    pub id: String,
    pub vehicle_id: String,
    pub date: DateTime<Utc>,
    pub name: String,
}

impl Trackday {
    pub fn new(vehicle_id: &str, date: DateTime<Utc>, name: &str) -> Self {
        Self {
            id: new_id(),
            vehicle_id: vehicle_id.to_string(),
            date,
            name: name.to_string(),
        }
    }
}

/// A recorded real-world service action. Read-only input to the matcher and
/// the odometer evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceLog {
    pub id: String,
    pub vehicle_id: String,
    pub maintenance_type: String,
    pub performed_at: DateTime<Utc>,
    pub odometer_km: Option<u32>,
    pub notes: String,
    pub cost: Option<f64>,
}

impl MaintenanceLog {
    pub fn new(vehicle_id: &str, maintenance_type: &str, performed_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            vehicle_id: vehicle_id.to_string(),
            maintenance_type: maintenance_type.to_string(),
            performed_at,
            odometer_km: None,
            notes: String::new(),
            cost: None,
        }
    }
}

/// A vehicle and its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub owner_id: String,
    pub name: String,
}

impl Vehicle {
    pub fn new(owner_id: &str, name: &str) -> Self {
        Self {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        }
    }
}

/// A user, as far as this engine cares: an id and maybe an email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// Per-user notification opt-in/opt-out. Absent record means enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: String,
    pub email_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_cadence_serde_tagging() {
        let cadence = Cadence::Odometer {
            interval_km: 5000,
            start_odometer_km: Some(12000),
        };
        let json = serde_json::to_value(&cadence).unwrap();
        assert_eq!(json["type"], "odometer");
        assert_eq!(json["interval_km"], 5000);

        let back: Cadence = serde_json::from_value(json).unwrap();
        assert_eq!(back, cadence);
    }

    #[test]
    fn test_trigger_dedup_exact() {
        let a = TriggerContext::Odometer { service_km: 10000 };
        let b = TriggerContext::Odometer { service_km: 10000 };
        let c = TriggerContext::Odometer { service_km: 15000 };
        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&c));
        assert!(!a.is_duplicate_of(&TriggerContext::EngineHours { service_hours: 10000 }));
    }

    #[test]
    fn test_trigger_dedup_time_interval_window() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let a = TriggerContext::TimeInterval { scheduled_for: day(10) };
        assert!(a.is_duplicate_of(&TriggerContext::TimeInterval { scheduled_for: day(11) }));
        assert!(a.is_duplicate_of(&TriggerContext::TimeInterval { scheduled_for: day(9) }));
        assert!(!a.is_duplicate_of(&TriggerContext::TimeInterval { scheduled_for: day(12) }));
    }

    #[test]
    fn test_status_predicates() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Dismissed.is_terminal());
        assert!(!TaskStatus::Snoozed.is_terminal());
        assert!(TaskStatus::Pending.is_open());
        assert!(TaskStatus::Due.is_open());
        assert!(!TaskStatus::Snoozed.is_open());
    }
}
