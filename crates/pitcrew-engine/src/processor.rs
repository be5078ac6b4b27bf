//! Trigger processor — walks active vehicle plans, turns cadence candidates
//! into pending tasks (dedup-gated), and advances task status over time.
//!
//! Idempotent by construction: correctness rests on the per-key duplicate
//! check against non-terminal tasks, not on locking, so overlapping runs are
//! tolerated. A failure in one vehicle plan is logged and never aborts the
//! rest of the batch.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use pitcrew_core::error::{PitcrewError, Result};
use pitcrew_core::types::{
    CompletionSource, MaintenanceLog, MaintenanceTask, TaskEvent, TaskStatus, VehiclePlan,
};
use pitcrew_core::{CancelFlag, Storage};

use crate::cadence::{self, VehicleHistory};
use crate::matcher;

/// Actor recorded on audit events written by batch passes.
const PROCESSOR_ACTOR: &str = "trigger_processor";

pub struct TriggerProcessor {
    storage: Arc<dyn Storage>,
    cancel: CancelFlag,
}

impl TriggerProcessor {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(storage: Arc<dyn Storage>, cancel: CancelFlag) -> Self {
        Self { storage, cancel }
    }

    /// One trigger pass over all active vehicle plans. Returns the number of
    /// tasks created.
    pub async fn process_all_triggers(&self) -> Result<usize> {
        let vehicle_plans = self.storage.active_vehicle_plans().await?;
        tracing::debug!("trigger pass over {} active vehicle plans", vehicle_plans.len());

        let mut created = 0;
        for vehicle_plan in &vehicle_plans {
            if self.cancel.is_cancelled() {
                tracing::info!("trigger pass cancelled after {created} tasks");
                break;
            }
            match self.process_vehicle_plan(vehicle_plan).await {
                Ok(n) => created += n,
                Err(e) => {
                    tracing::warn!("skipping vehicle plan {}: {e}", vehicle_plan.id);
                }
            }
        }

        if created > 0 {
            tracing::info!("trigger pass created {created} task(s)");
        }
        Ok(created)
    }

    async fn process_vehicle_plan(&self, vehicle_plan: &VehiclePlan) -> Result<usize> {
        let plan = self
            .storage
            .plan(&vehicle_plan.plan_id)
            .await?
            .ok_or_else(|| PitcrewError::NotFound(format!("plan {}", vehicle_plan.plan_id)))?;
        let items = self.storage.checklist_items(&plan.id).await?;
        if items.is_empty() {
            return Ok(0);
        }

        let existing = self
            .storage
            .tasks_for_vehicle_plan(&vehicle_plan.id)
            .await?;
        let history = VehicleHistory {
            trackdays: self
                .storage
                .trackdays_for_vehicle(&vehicle_plan.vehicle_id)
                .await?,
            logs: self
                .storage
                .maintenance_logs_for_vehicle(&vehicle_plan.vehicle_id)
                .await?,
            now: Utc::now(),
        };

        let candidates = cadence::evaluate(&plan, vehicle_plan, &history)?;

        let mut created = 0;
        for candidate in &candidates {
            for item in &items {
                let duplicate = existing.iter().any(|t| {
                    !t.status.is_terminal()
                        && t.checklist_item_id.as_deref() == Some(item.id.as_str())
                        && candidate.trigger.is_duplicate_of(&t.trigger)
                });
                if duplicate {
                    continue;
                }

                let due_at = candidate.trigger_date + Duration::days(item.due_offset.days);
                let task = MaintenanceTask::from_checklist_item(
                    &vehicle_plan.id,
                    &item.id,
                    due_at,
                    candidate.trigger.clone(),
                );
                self.storage.create_task(&task).await?;
                self.storage
                    .append_task_event(&TaskEvent::transition(
                        &task.id,
                        None,
                        TaskStatus::Pending,
                        PROCESSOR_ACTOR,
                    ))
                    .await?;
                tracing::debug!(
                    "task {} created for item '{}' ({})",
                    task.id,
                    item.title,
                    candidate.trigger.describe()
                );
                created += 1;
            }
        }
        Ok(created)
    }

    /// Second idempotent pass: pending tasks whose due date has passed
    /// become due. Returns the number of tasks advanced.
    pub async fn update_task_statuses(&self) -> Result<usize> {
        let pending = self.storage.tasks_with_status(TaskStatus::Pending).await?;
        let now = Utc::now();

        let mut advanced = 0;
        for mut task in pending {
            if self.cancel.is_cancelled() {
                break;
            }
            if task.due_at > now {
                continue;
            }
            task.status = TaskStatus::Due;
            if let Err(e) = self.persist_transition(&task, TaskStatus::Pending).await {
                tracing::warn!("failed to advance task {}: {e}", task.id);
                continue;
            }
            advanced += 1;
        }

        if advanced > 0 {
            tracing::info!("{advanced} task(s) advanced to due");
        }
        Ok(advanced)
    }

    /// Complete an open or snoozed task. `completed_at` is set exactly once —
    /// completing a terminal task is an error.
    pub async fn complete_task(
        &self,
        task_id: &str,
        source: CompletionSource,
        maintenance_log_id: Option<&str>,
        actor: &str,
    ) -> Result<MaintenanceTask> {
        let mut task = self.load_open(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.completion_source = Some(source);
        task.maintenance_log_id = maintenance_log_id.map(String::from);
        self.persist_manual_transition(&task, from, actor).await?;
        Ok(task)
    }

    /// Dismiss an open or snoozed task. Terminal, timestamp set exactly once.
    pub async fn dismiss_task(&self, task_id: &str, actor: &str) -> Result<MaintenanceTask> {
        let mut task = self.load_open(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Dismissed;
        task.dismissed_at = Some(Utc::now());
        self.persist_manual_transition(&task, from, actor).await?;
        Ok(task)
    }

    /// Snooze a task until the given time. Moving it back to due/pending is
    /// an action-path concern, not the processor's.
    pub async fn snooze_task(
        &self,
        task_id: &str,
        until: DateTime<Utc>,
        actor: &str,
    ) -> Result<MaintenanceTask> {
        let mut task = self.load_open(task_id).await?;
        let from = task.status;
        task.status = TaskStatus::Snoozed;
        task.snoozed_until = Some(until);
        self.persist_manual_transition(&task, from, actor).await?;
        Ok(task)
    }

    /// Score a fresh maintenance log against the vehicle's open tasks and
    /// complete the best match when it clears the auto-complete threshold.
    /// Returns the completed task, if any.
    pub async fn apply_auto_complete(
        &self,
        log: &MaintenanceLog,
    ) -> Result<Option<MaintenanceTask>> {
        let tasks = self.storage.open_tasks_for_vehicle(&log.vehicle_id).await?;
        if tasks.is_empty() {
            return Ok(None);
        }

        let mut items = std::collections::HashMap::new();
        for task in &tasks {
            if let Some(item_id) = &task.checklist_item_id
                && let Some(item) = self.storage.checklist_item(item_id).await?
            {
                items.insert(item_id.clone(), item);
            }
        }

        let Some(suggestion) = matcher::suggest_best_match(log, &tasks, &items) else {
            return Ok(None);
        };
        if !suggestion.should_auto_complete {
            tracing::debug!(
                "best match for log {} scored {} — below auto-complete threshold",
                log.id,
                suggestion.score
            );
            return Ok(None);
        }

        tracing::info!(
            "auto-completing task {} from log {} (score {})",
            suggestion.task_id,
            log.id,
            suggestion.score
        );
        let task = self
            .complete_task(
                &suggestion.task_id,
                CompletionSource::AutoMatched,
                Some(&log.id),
                PROCESSOR_ACTOR,
            )
            .await?;
        Ok(Some(task))
    }

    async fn load_open(&self, task_id: &str) -> Result<MaintenanceTask> {
        let task = self
            .storage
            .task(task_id)
            .await?
            .ok_or_else(|| PitcrewError::NotFound(format!("task {task_id}")))?;
        if task.status.is_terminal() {
            return Err(PitcrewError::InvalidTransition(format!(
                "task {task_id} is already {}",
                task.status
            )));
        }
        Ok(task)
    }

    async fn persist_manual_transition(
        &self,
        task: &MaintenanceTask,
        from: TaskStatus,
        actor: &str,
    ) -> Result<()> {
        self.storage.update_task(task).await?;
        self.storage
            .append_task_event(&TaskEvent::transition(
                &task.id,
                Some(from),
                task.status,
                actor,
            ))
            .await
    }

    async fn persist_transition(&self, task: &MaintenanceTask, from: TaskStatus) -> Result<()> {
        self.persist_manual_transition(task, from, PROCESSOR_ACTOR)
            .await
    }
}
