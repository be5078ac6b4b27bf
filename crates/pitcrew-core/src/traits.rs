//! Collaborator contracts. Persistence and email delivery live outside this
//! engine; these traits are the whole surface it relies on.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    MaintenanceLog, MaintenancePlan, MaintenanceTask, NotificationPreferences, PlanChecklistItem,
    TaskEvent, TaskStatus, Trackday, User, Vehicle, VehiclePlan,
};

/// Typed persistence operations the engine needs. Implementations decide
/// where the data lives; [`crate::memory::MemoryStore`] is the in-process
/// reference used by tests.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn user(&self, id: &str) -> Result<Option<User>>;
    async fn vehicle(&self, id: &str) -> Result<Option<Vehicle>>;

    async fn plan(&self, id: &str) -> Result<Option<MaintenancePlan>>;
    async fn checklist_item(&self, id: &str) -> Result<Option<PlanChecklistItem>>;
    /// Items of a plan, in sequence order.
    async fn checklist_items(&self, plan_id: &str) -> Result<Vec<PlanChecklistItem>>;

    async fn vehicle_plan(&self, id: &str) -> Result<Option<VehiclePlan>>;
    async fn active_vehicle_plans(&self) -> Result<Vec<VehiclePlan>>;

    async fn task(&self, id: &str) -> Result<Option<MaintenanceTask>>;
    async fn tasks_for_vehicle_plan(&self, vehicle_plan_id: &str) -> Result<Vec<MaintenanceTask>>;
    async fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<MaintenanceTask>>;
    /// Open (pending/due) tasks across all plans of one vehicle.
    async fn open_tasks_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<MaintenanceTask>>;
    async fn create_task(&self, task: &MaintenanceTask) -> Result<()>;
    async fn update_task(&self, task: &MaintenanceTask) -> Result<()>;

    async fn append_task_event(&self, event: &TaskEvent) -> Result<()>;
    async fn task_events(&self, task_id: &str) -> Result<Vec<TaskEvent>>;

    /// All trackdays of a vehicle, past and upcoming, sorted by date.
    async fn trackdays_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<Trackday>>;
    /// All maintenance logs of a vehicle, sorted by date.
    async fn maintenance_logs_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<MaintenanceLog>>;

    async fn notification_preferences(&self, user_id: &str)
    -> Result<Option<NotificationPreferences>>;
}

/// A fully assembled outbound email.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email transport. Success or failure only — no delivery
/// confirmation beyond the send itself.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}
