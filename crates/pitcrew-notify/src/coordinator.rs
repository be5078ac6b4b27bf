//! Notification coordinator — selects due tasks, groups them per owner,
//! and sends one consolidated email per user with signed action links.
//! A failure for one user never blocks the others.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use pitcrew_core::error::{PitcrewError, Result};
use pitcrew_core::traits::EmailMessage;
use pitcrew_core::types::{MaintenanceTask, TaskStatus};
use pitcrew_core::{CancelFlag, Mailer, Storage};

use crate::token::{TokenAction, TokenSigner};

/// Tasks due further out than this are left for a later pass.
pub const DUE_WINDOW_DAYS: i64 = 7;
/// A task already notified gets a repeat nudge after this long.
pub const REMINDER_AFTER_HOURS: i64 = 72;

pub struct NotificationCoordinator {
    storage: Arc<dyn Storage>,
    mailer: Arc<dyn Mailer>,
    signer: TokenSigner,
    base_url: String,
    cancel: CancelFlag,
}

impl NotificationCoordinator {
    pub fn new(
        storage: Arc<dyn Storage>,
        mailer: Arc<dyn Mailer>,
        signer: TokenSigner,
        base_url: &str,
    ) -> Self {
        Self {
            storage,
            mailer,
            signer,
            base_url: base_url.trim_end_matches('/').to_string(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Notify owners about due tasks that have never been notified.
    /// Returns the number of emails sent.
    pub async fn send_due_task_notifications(&self) -> Result<usize> {
        let now = Utc::now();
        let window_end = now + Duration::days(DUE_WINDOW_DAYS);
        let eligible: Vec<MaintenanceTask> = self
            .storage
            .tasks_with_status(TaskStatus::Due)
            .await?
            .into_iter()
            .filter(|t| t.last_notification_at.is_none() && t.due_at <= window_end)
            .collect();

        self.dispatch_grouped(eligible, "Maintenance due").await
    }

    /// Repeat nudge for tasks notified more than 72 hours ago and still
    /// overdue.
    pub async fn send_overdue_reminders(&self) -> Result<usize> {
        let now = Utc::now();
        let cutoff = now - Duration::hours(REMINDER_AFTER_HOURS);
        let eligible: Vec<MaintenanceTask> = self
            .storage
            .tasks_with_status(TaskStatus::Due)
            .await?
            .into_iter()
            .filter(|t| {
                t.due_at < now
                    && t.last_notification_at
                        .is_some_and(|notified| notified < cutoff)
            })
            .collect();

        self.dispatch_grouped(eligible, "Maintenance overdue").await
    }

    async fn dispatch_grouped(
        &self,
        tasks: Vec<MaintenanceTask>,
        subject_prefix: &str,
    ) -> Result<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }

        let mut by_user: HashMap<String, Vec<MaintenanceTask>> = HashMap::new();
        for task in tasks {
            match self.owner_of(&task).await {
                Ok(user_id) => by_user.entry(user_id).or_default().push(task),
                Err(e) => tracing::warn!("cannot resolve owner of task {}: {e}", task.id),
            }
        }

        let mut sent = 0;
        for (user_id, tasks) in by_user {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.notify_user(&user_id, &tasks, subject_prefix).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("notification to user {user_id} failed: {e}"),
            }
        }
        Ok(sent)
    }

    /// Owner resolution: vehicle plan → vehicle → owner.
    async fn owner_of(&self, task: &MaintenanceTask) -> Result<String> {
        let vehicle_plan = self
            .storage
            .vehicle_plan(&task.vehicle_plan_id)
            .await?
            .ok_or_else(|| {
                PitcrewError::NotFound(format!("vehicle plan {}", task.vehicle_plan_id))
            })?;
        let vehicle = self
            .storage
            .vehicle(&vehicle_plan.vehicle_id)
            .await?
            .ok_or_else(|| PitcrewError::NotFound(format!("vehicle {}", vehicle_plan.vehicle_id)))?;
        Ok(vehicle.owner_id)
    }

    /// Send one consolidated email. `Ok(false)` means skipped (preferences or
    /// missing address), `Ok(true)` means sent and stamped.
    async fn notify_user(
        &self,
        user_id: &str,
        tasks: &[MaintenanceTask],
        subject_prefix: &str,
    ) -> Result<bool> {
        if let Some(prefs) = self.storage.notification_preferences(user_id).await?
            && !prefs.email_enabled
        {
            tracing::debug!("user {user_id} has email notifications disabled");
            return Ok(false);
        }

        let user = self
            .storage
            .user(user_id)
            .await?
            .ok_or_else(|| PitcrewError::NotFound(format!("user {user_id}")))?;
        let Some(address) = user.email.clone() else {
            tracing::error!("user {user_id} has no email address, skipping notification");
            return Ok(false);
        };

        let message = self
            .build_message(&address, &user.name, user_id, tasks, subject_prefix)
            .await?;
        self.mailer.send(&message).await?;

        let now = Utc::now();
        for task in tasks {
            let mut task = task.clone();
            task.last_notification_at = Some(now);
            if let Err(e) = self.storage.update_task(&task).await {
                tracing::warn!("failed to stamp notification time on task {}: {e}", task.id);
            }
        }
        Ok(true)
    }

    async fn build_message(
        &self,
        address: &str,
        user_name: &str,
        user_id: &str,
        tasks: &[MaintenanceTask],
        subject_prefix: &str,
    ) -> Result<EmailMessage> {
        let list_url = format!("{}/maintenance/tasks", self.base_url);

        let mut text = format!(
            "Hi {user_name},\n\n{} maintenance task(s) need attention:\n\n",
            tasks.len()
        );
        let mut html = format!(
            "<p>Hi {user_name},</p><p>{} maintenance task(s) need attention:</p><ul>",
            tasks.len()
        );

        for task in tasks {
            let title = self.task_title(task).await?;
            let due = task.due_at.format("%Y-%m-%d");
            let complete = self.action_url(user_id, &task.id, TokenAction::Complete);
            let snooze = self.action_url(user_id, &task.id, TokenAction::Snooze);
            let dismiss = self.action_url(user_id, &task.id, TokenAction::Dismiss);

            text.push_str(&format!(
                "- {title} — due {due} ({})\n  Complete: {complete}\n  Snooze: {snooze}\n  Dismiss: {dismiss}\n\n",
                task.trigger.describe()
            ));
            html.push_str(&format!(
                "<li><strong>{title}</strong> — due {due} ({})<br>\
                 <a href=\"{complete}\">Complete</a> · \
                 <a href=\"{snooze}\">Snooze</a> · \
                 <a href=\"{dismiss}\">Dismiss</a></li>",
                task.trigger.describe()
            ));
        }

        text.push_str(&format!("All tasks: {list_url}\n"));
        html.push_str(&format!(
            "</ul><p><a href=\"{list_url}\">View all tasks</a></p>"
        ));

        Ok(EmailMessage {
            to: address.to_string(),
            subject: format!("{subject_prefix}: {} task(s)", tasks.len()),
            html,
            text,
        })
    }

    async fn task_title(&self, task: &MaintenanceTask) -> Result<String> {
        if let Some(item_id) = &task.checklist_item_id
            && let Some(item) = self.storage.checklist_item(item_id).await?
        {
            return Ok(item.title);
        }
        Ok(task
            .custom_title
            .clone()
            .unwrap_or_else(|| "Maintenance task".to_string()))
    }

    fn action_url(&self, user_id: &str, task_id: &str, action: TokenAction) -> String {
        let token = self.signer.generate(user_id, task_id, action);
        format!("{}/maintenance/action/{token}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pitcrew_core::MemoryStore;
    use pitcrew_core::types::{
        Cadence, MaintenancePlan, NotificationPreferences, PlanChecklistItem, TriggerContext, User,
        Vehicle, VehiclePlan, new_id,
    };

    /// Records messages; optionally fails for one address.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            if self.fail_for.as_deref() == Some(message.to.as_str()) {
                return Err(PitcrewError::Mail("simulated outage".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        coordinator: NotificationCoordinator,
        user_id: String,
        vehicle_plan_id: String,
        item_id: String,
    }

    fn fixture_with_mailer(mailer: RecordingMailer) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user_id = store.add_user(User {
            id: new_id(),
            name: "Robin".into(),
            email: Some("robin@example.com".into()),
        });
        let vehicle_id = store.add_vehicle(Vehicle::new(&user_id, "M2"));
        let plan_id = store.add_plan(MaintenancePlan::new(
            "track prep",
            Cadence::EventCount { after_every_n: 1 },
        ));
        let item_id =
            store.add_checklist_item(PlanChecklistItem::new(&plan_id, "check brake pads", "brakes"));
        let vehicle_plan_id = store.add_vehicle_plan(VehiclePlan::new(&plan_id, &vehicle_id));

        let mailer = Arc::new(mailer);
        let coordinator = NotificationCoordinator::new(
            store.clone() as Arc<dyn Storage>,
            mailer.clone() as Arc<dyn Mailer>,
            TokenSigner::new(b"test-secret".to_vec()),
            "https://pit.example.com/",
        );
        Fixture {
            store,
            mailer,
            coordinator,
            user_id,
            vehicle_plan_id,
            item_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_mailer(RecordingMailer::default())
    }

    async fn add_due_task(fx: &Fixture, hours_overdue: i64) -> MaintenanceTask {
        let mut task = MaintenanceTask::from_checklist_item(
            &fx.vehicle_plan_id,
            &fx.item_id,
            Utc::now() - Duration::hours(hours_overdue),
            TriggerContext::EventCount {
                completed_events: 1,
                every_n: 1,
                trackday_id: new_id(),
            },
        );
        task.status = TaskStatus::Due;
        fx.store.create_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_three_tasks_one_consolidated_email() {
        let fx = fixture();
        for i in 1..=3 {
            add_due_task(&fx, i).await;
        }

        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 1);

        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "robin@example.com");
        assert_eq!(sent[0].text.matches("check brake pads").count(), 3);
        assert_eq!(sent[0].text.matches("/maintenance/action/").count(), 9);
        drop(sent);

        // Every included task got stamped…
        for task in fx.store.tasks_with_status(TaskStatus::Due).await.unwrap() {
            assert!(task.last_notification_at.is_some());
        }
        // …so a second pass sends nothing.
        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_preferences_send_nothing() {
        let fx = fixture();
        fx.store.set_preferences(NotificationPreferences {
            user_id: fx.user_id.clone(),
            email_enabled: false,
        });
        add_due_task(&fx, 1).await;

        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 0);
        assert!(fx.mailer.sent.lock().unwrap().is_empty());
        // No timestamps changed.
        for task in fx.store.tasks_with_status(TaskStatus::Due).await.unwrap() {
            assert!(task.last_notification_at.is_none());
        }
    }

    #[tokio::test]
    async fn test_missing_email_is_logged_skip() {
        let fx = fixture();
        let silent_user = fx.store.add_user(User {
            id: new_id(),
            name: "no-mail".into(),
            email: None,
        });
        let vehicle = fx.store.add_vehicle(Vehicle::new(&silent_user, "Elise"));
        let plan = fx.store.add_plan(MaintenancePlan::new(
            "p",
            Cadence::EventCount { after_every_n: 1 },
        ));
        let vp = fx.store.add_vehicle_plan(VehiclePlan::new(&plan, &vehicle));
        let mut task = MaintenanceTask::custom(
            &vp,
            "custom job",
            Utc::now() - Duration::hours(1),
            TriggerContext::Odometer { service_km: 1000 },
        );
        task.status = TaskStatus::Due;
        fx.store.create_task(&task).await.unwrap();

        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 0);
        assert!(fx.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_far_future_tasks_wait_for_their_window() {
        let fx = fixture();
        let mut task = add_due_task(&fx, 0).await;
        task.due_at = Utc::now() + Duration::days(10);
        fx.store.update_task(&task).await.unwrap();

        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overdue_reminder_after_72_hours() {
        let fx = fixture();
        let mut stale = add_due_task(&fx, 100).await;
        stale.last_notification_at = Some(Utc::now() - Duration::hours(80));
        fx.store.update_task(&stale).await.unwrap();
        let mut fresh = add_due_task(&fx, 100).await;
        fresh.last_notification_at = Some(Utc::now() - Duration::hours(10));
        fx.store.update_task(&fresh).await.unwrap();

        assert_eq!(fx.coordinator.send_overdue_reminders().await.unwrap(), 1);
        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text.matches("/maintenance/action/").count(), 3);
        assert!(sent[0].subject.starts_with("Maintenance overdue"));
    }

    #[tokio::test]
    async fn test_one_user_failure_does_not_block_others() {
        let fx = fixture_with_mailer(RecordingMailer {
            sent: Mutex::new(Vec::new()),
            fail_for: Some("robin@example.com".into()),
        });
        add_due_task(&fx, 1).await;

        let other_user = fx.store.add_user(User {
            id: new_id(),
            name: "Kim".into(),
            email: Some("kim@example.com".into()),
        });
        let vehicle = fx.store.add_vehicle(Vehicle::new(&other_user, "GR86"));
        let plan = fx.store.add_plan(MaintenancePlan::new(
            "p2",
            Cadence::EventCount { after_every_n: 1 },
        ));
        let item = fx
            .store
            .add_checklist_item(PlanChecklistItem::new(&plan, "rotate tires", "tires"));
        let vp = fx.store.add_vehicle_plan(VehiclePlan::new(&plan, &vehicle));
        let mut task = MaintenanceTask::from_checklist_item(
            &vp,
            &item,
            Utc::now() - Duration::hours(1),
            TriggerContext::EventCount {
                completed_events: 1,
                every_n: 1,
                trackday_id: new_id(),
            },
        );
        task.status = TaskStatus::Due;
        fx.store.create_task(&task).await.unwrap();

        // Robin's send fails, Kim's still goes out.
        assert_eq!(fx.coordinator.send_due_task_notifications().await.unwrap(), 1);
        let sent = fx.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "kim@example.com");
    }

    #[tokio::test]
    async fn test_action_links_verify() {
        let fx = fixture();
        let task = add_due_task(&fx, 1).await;

        fx.coordinator.send_due_task_notifications().await.unwrap();
        let sent = fx.mailer.sent.lock().unwrap();
        let text = &sent[0].text;

        let token = text
            .lines()
            .find_map(|l| l.trim().strip_prefix("Complete: "))
            .and_then(|url| url.rsplit('/').next())
            .expect("complete link present");
        let claims = fx.coordinator.signer.verify(token).expect("valid token");
        assert_eq!(claims.task_id, task.id);
        assert_eq!(claims.user_id, fx.user_id);
        assert_eq!(claims.action, TokenAction::Complete);
    }
}
