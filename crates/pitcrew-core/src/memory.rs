//! In-memory [`Storage`] backend. The reference implementation used by the
//! engine's tests; also embeddable where no real persistence is wired up.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PitcrewError, Result};
use crate::traits::Storage;
use crate::types::{
    MaintenanceLog, MaintenancePlan, MaintenanceTask, NotificationPreferences, PlanChecklistItem,
    TaskEvent, TaskStatus, Trackday, User, Vehicle, VehiclePlan, VehiclePlanStatus,
};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    vehicles: HashMap<String, Vehicle>,
    plans: HashMap<String, MaintenancePlan>,
    checklist_items: HashMap<String, PlanChecklistItem>,
    vehicle_plans: HashMap<String, VehiclePlan>,
    tasks: HashMap<String, MaintenanceTask>,
    task_events: Vec<TaskEvent>,
    trackdays: HashMap<String, Trackday>,
    logs: HashMap<String, MaintenanceLog>,
    preferences: HashMap<String, NotificationPreferences>,
}

/// Concurrent in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| PitcrewError::Storage(format!("store lock poisoned: {e}")))
    }

    // Fixture helpers — insert an entity and hand back its id.

    pub fn add_user(&self, user: User) -> String {
        let id = user.id.clone();
        self.inner.lock().unwrap().users.insert(id.clone(), user);
        id
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) -> String {
        let id = vehicle.id.clone();
        self.inner.lock().unwrap().vehicles.insert(id.clone(), vehicle);
        id
    }

    pub fn add_plan(&self, plan: MaintenancePlan) -> String {
        let id = plan.id.clone();
        self.inner.lock().unwrap().plans.insert(id.clone(), plan);
        id
    }

    pub fn add_checklist_item(&self, item: PlanChecklistItem) -> String {
        let id = item.id.clone();
        self.inner
            .lock()
            .unwrap()
            .checklist_items
            .insert(id.clone(), item);
        id
    }

    pub fn add_vehicle_plan(&self, vehicle_plan: VehiclePlan) -> String {
        let id = vehicle_plan.id.clone();
        self.inner
            .lock()
            .unwrap()
            .vehicle_plans
            .insert(id.clone(), vehicle_plan);
        id
    }

    pub fn add_trackday(&self, trackday: Trackday) -> String {
        let id = trackday.id.clone();
        self.inner.lock().unwrap().trackdays.insert(id.clone(), trackday);
        id
    }

    pub fn add_log(&self, log: MaintenanceLog) -> String {
        let id = log.id.clone();
        self.inner.lock().unwrap().logs.insert(id.clone(), log);
        id
    }

    pub fn set_preferences(&self, prefs: NotificationPreferences) {
        self.inner
            .lock()
            .unwrap()
            .preferences
            .insert(prefs.user_id.clone(), prefs);
    }

    /// Total task count, all statuses.
    pub fn task_count(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    async fn vehicle(&self, id: &str) -> Result<Option<Vehicle>> {
        Ok(self.lock()?.vehicles.get(id).cloned())
    }

    async fn plan(&self, id: &str) -> Result<Option<MaintenancePlan>> {
        Ok(self.lock()?.plans.get(id).cloned())
    }

    async fn checklist_item(&self, id: &str) -> Result<Option<PlanChecklistItem>> {
        Ok(self.lock()?.checklist_items.get(id).cloned())
    }

    async fn checklist_items(&self, plan_id: &str) -> Result<Vec<PlanChecklistItem>> {
        let mut items: Vec<_> = self
            .lock()?
            .checklist_items
            .values()
            .filter(|i| i.plan_id == plan_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.sequence);
        Ok(items)
    }

    async fn vehicle_plan(&self, id: &str) -> Result<Option<VehiclePlan>> {
        Ok(self.lock()?.vehicle_plans.get(id).cloned())
    }

    async fn active_vehicle_plans(&self) -> Result<Vec<VehiclePlan>> {
        Ok(self
            .lock()?
            .vehicle_plans
            .values()
            .filter(|vp| vp.status == VehiclePlanStatus::Active)
            .cloned()
            .collect())
    }

    async fn task(&self, id: &str) -> Result<Option<MaintenanceTask>> {
        Ok(self.lock()?.tasks.get(id).cloned())
    }

    async fn tasks_for_vehicle_plan(&self, vehicle_plan_id: &str) -> Result<Vec<MaintenanceTask>> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| t.vehicle_plan_id == vehicle_plan_id)
            .cloned()
            .collect())
    }

    async fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<MaintenanceTask>> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect())
    }

    async fn open_tasks_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<MaintenanceTask>> {
        let inner = self.lock()?;
        let plan_ids: Vec<&String> = inner
            .vehicle_plans
            .values()
            .filter(|vp| vp.vehicle_id == vehicle_id)
            .map(|vp| &vp.id)
            .collect();
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.status.is_open() && plan_ids.contains(&&t.vehicle_plan_id))
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: &MaintenanceTask) -> Result<()> {
        self.lock()?.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &MaintenanceTask) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.tasks.contains_key(&task.id) {
            return Err(PitcrewError::NotFound(format!("task {}", task.id)));
        }
        inner.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn append_task_event(&self, event: &TaskEvent) -> Result<()> {
        self.lock()?.task_events.push(event.clone());
        Ok(())
    }

    async fn task_events(&self, task_id: &str) -> Result<Vec<TaskEvent>> {
        Ok(self
            .lock()?
            .task_events
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn trackdays_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<Trackday>> {
        let mut days: Vec<_> = self
            .lock()?
            .trackdays
            .values()
            .filter(|t| t.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        days.sort_by_key(|t| t.date);
        Ok(days)
    }

    async fn maintenance_logs_for_vehicle(&self, vehicle_id: &str) -> Result<Vec<MaintenanceLog>> {
        let mut logs: Vec<_> = self
            .lock()?
            .logs
            .values()
            .filter(|l| l.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.performed_at);
        Ok(logs)
    }

    async fn notification_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<NotificationPreferences>> {
        Ok(self.lock()?.preferences.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cadence, TriggerContext};
    use chrono::Utc;

    #[tokio::test]
    async fn test_checklist_items_sorted_by_sequence() {
        let store = MemoryStore::new();
        let plan_id = store.add_plan(MaintenancePlan::new(
            "track prep",
            Cadence::EventCount { after_every_n: 1 },
        ));
        let mut second = PlanChecklistItem::new(&plan_id, "bleed brakes", "brakes");
        second.sequence = 2;
        let mut first = PlanChecklistItem::new(&plan_id, "check pads", "brakes");
        first.sequence = 1;
        store.add_checklist_item(second);
        store.add_checklist_item(first);

        let items = store.checklist_items(&plan_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "check pads");
    }

    #[tokio::test]
    async fn test_open_tasks_for_vehicle_spans_plans() {
        let store = MemoryStore::new();
        let user = store.add_user(User {
            id: crate::types::new_id(),
            name: "sam".into(),
            email: None,
        });
        let vehicle = store.add_vehicle(Vehicle::new(&user, "NA Miata"));
        let plan = store.add_plan(MaintenancePlan::new(
            "oil",
            Cadence::Odometer {
                interval_km: 5000,
                start_odometer_km: None,
            },
        ));
        let vp1 = store.add_vehicle_plan(VehiclePlan::new(&plan, &vehicle));
        let vp2 = store.add_vehicle_plan(VehiclePlan::new(&plan, &vehicle));

        let open = MaintenanceTask::from_checklist_item(
            &vp1,
            "item-a",
            Utc::now(),
            TriggerContext::Odometer { service_km: 5000 },
        );
        let mut done = MaintenanceTask::from_checklist_item(
            &vp2,
            "item-b",
            Utc::now(),
            TriggerContext::Odometer { service_km: 10000 },
        );
        done.status = TaskStatus::Completed;
        store.create_task(&open).await.unwrap();
        store.create_task(&done).await.unwrap();

        let found = store.open_tasks_for_vehicle(&vehicle).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, open.id);
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_found() {
        let store = MemoryStore::new();
        let task = MaintenanceTask::from_checklist_item(
            "vp",
            "item",
            Utc::now(),
            TriggerContext::EngineHours { service_hours: 50 },
        );
        assert!(matches!(
            store.update_task(&task).await,
            Err(PitcrewError::NotFound(_))
        ));
    }
}
