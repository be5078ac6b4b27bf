//! The periodic maintenance job — trigger pass, status advancement, then
//! notifications, strictly in that order. Overlapping runs are harmless:
//! every pass is idempotent and deduplicated.

use std::future::Future;
use std::sync::Arc;

use pitcrew_core::CancelFlag;
use pitcrew_core::error::Result;

use crate::processor::TriggerProcessor;

/// Run the maintenance job loop until cancelled.
///
/// `notify` is called after each trigger/status pass and should run the
/// notification coordinator (due notifications, then overdue reminders).
/// It is a callback so this crate never depends on the notify crate.
pub async fn run_maintenance_job<F, Fut>(
    processor: Arc<TriggerProcessor>,
    notify: F,
    check_interval_secs: u64,
    cancel: CancelFlag,
) where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<usize>> + Send,
{
    tracing::info!("⏰ Maintenance job started (check every {check_interval_secs}s)");

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;
        if cancel.is_cancelled() {
            tracing::info!("maintenance job stopped");
            break;
        }

        if let Err(e) = processor.process_all_triggers().await {
            tracing::error!("trigger pass failed: {e}");
        }
        if let Err(e) = processor.update_task_statuses().await {
            tracing::error!("status pass failed: {e}");
        }
        match notify().await {
            Ok(sent) if sent > 0 => tracing::info!("sent {sent} notification(s)"),
            Ok(_) => {}
            Err(e) => tracing::error!("notification pass failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pitcrew_core::types::{Cadence, MaintenancePlan, PlanChecklistItem, VehiclePlan};
    use pitcrew_core::{MemoryStore, Storage};

    #[tokio::test]
    async fn test_job_runs_passes_then_notify_callback() {
        let store = Arc::new(MemoryStore::new());
        let plan_id = store.add_plan(MaintenancePlan::new(
            "hours",
            Cadence::EngineHours {
                interval_hours: 50,
                start_hours: Some(0),
            },
        ));
        store.add_checklist_item(PlanChecklistItem::new(&plan_id, "oil change", "oil"));
        let mut vp = VehiclePlan::new(&plan_id, "vehicle-1");
        vp.current_engine_hours = Some(50);
        store.add_vehicle_plan(vp);

        let processor = Arc::new(TriggerProcessor::new(store.clone() as Arc<dyn Storage>));
        let cancel = CancelFlag::new();
        let notify_calls = Arc::new(AtomicUsize::new(0));

        let calls = notify_calls.clone();
        let stop = cancel.clone();
        let job = run_maintenance_job(
            processor,
            move || {
                let calls = calls.clone();
                let stop = stop.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    // One pass is enough for the test.
                    stop.cancel();
                    Ok(0)
                }
            },
            1,
            cancel.clone(),
        );
        tokio::time::timeout(std::time::Duration::from_secs(5), job)
            .await
            .expect("job should stop after cancellation");

        assert_eq!(notify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.task_count(), 1);
    }
}
