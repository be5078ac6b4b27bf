//! Auto-complete matcher — scores a recorded maintenance log against open
//! tasks and recommends the best candidate. Scoring and recommending only:
//! the caller decides whether to actually complete anything.

use std::collections::HashMap;

use pitcrew_core::types::{MaintenanceLog, MaintenanceTask, PlanChecklistItem};

/// Matches at or above this score are safe to complete automatically.
pub const AUTO_COMPLETE_THRESHOLD: i32 = 60;

/// Points per scoring rule.
const MATCHER_TYPE_POINTS: i32 = 50;
const ITEM_TYPE_POINTS: i32 = 40;
const ODOMETER_POINTS: i32 = 30;
const KEYWORD_POINTS: i32 = 10;
const TITLE_WORD_POINTS: i32 = 5;
const TEMPORAL_POINTS: i32 = 20;
const CUSTOM_TITLE_POINTS: i32 = 30;

/// Days around the log date in which a due date counts as "near".
const TEMPORAL_WINDOW_PAST_DAYS: i64 = -7;
const TEMPORAL_WINDOW_FUTURE_DAYS: i64 = 30;

/// One scored task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMatch {
    pub task_id: String,
    pub score: i32,
}

/// The matcher's recommendation for a log.
#[derive(Debug, Clone)]
pub struct MatchSuggestion {
    pub task_id: String,
    pub score: i32,
    pub should_auto_complete: bool,
}

/// Score all open tasks against a log, highest first. Tasks that score zero
/// are not worth surfacing and are dropped.
pub fn match_log_to_tasks(
    log: &MaintenanceLog,
    tasks: &[MaintenanceTask],
    items: &HashMap<String, PlanChecklistItem>,
) -> Vec<TaskMatch> {
    let mut matches: Vec<TaskMatch> = tasks
        .iter()
        .filter(|t| t.status.is_open() && t.completed_at.is_none() && t.dismissed_at.is_none())
        .map(|task| {
            let item = task
                .checklist_item_id
                .as_ref()
                .and_then(|id| items.get(id));
            TaskMatch {
                task_id: task.id.clone(),
                score: score_task(log, task, item),
            }
        })
        .filter(|m| m.score > 0)
        .collect();
    matches.sort_by_key(|m| std::cmp::Reverse(m.score));
    matches
}

/// Best match plus the auto-complete verdict, or `None` when nothing scores.
pub fn suggest_best_match(
    log: &MaintenanceLog,
    tasks: &[MaintenanceTask],
    items: &HashMap<String, PlanChecklistItem>,
) -> Option<MatchSuggestion> {
    match_log_to_tasks(log, tasks, items)
        .into_iter()
        .next()
        .map(|m| MatchSuggestion {
            should_auto_complete: m.score >= AUTO_COMPLETE_THRESHOLD,
            task_id: m.task_id,
            score: m.score,
        })
}

fn score_task(
    log: &MaintenanceLog,
    task: &MaintenanceTask,
    item: Option<&PlanChecklistItem>,
) -> i32 {
    let Some(item) = item else {
        // Custom-titled tasks get a single simplified check.
        return match &task.custom_title {
            Some(title)
                if title
                    .to_lowercase()
                    .contains(&log.maintenance_type.to_lowercase()) =>
            {
                CUSTOM_TITLE_POINTS
            }
            _ => 0,
        };
    };

    let mut score = 0;
    let notes = log.notes.to_lowercase();

    match &item.matcher.maintenance_type {
        Some(matcher_type) if matcher_type.eq_ignore_ascii_case(&log.maintenance_type) => {
            score += MATCHER_TYPE_POINTS;
        }
        None if item.maintenance_type.eq_ignore_ascii_case(&log.maintenance_type) => {
            score += ITEM_TYPE_POINTS;
        }
        _ => {}
    }

    if let (Some(tolerance), Some(target_km), Some(log_km)) = (
        item.matcher.odometer_tolerance_km,
        task.trigger.service_km_hint(),
        log.odometer_km,
    ) && log_km.abs_diff(target_km) <= tolerance
    {
        score += ODOMETER_POINTS;
    }

    for part in &item.matcher.required_parts {
        if notes.contains(&part.to_lowercase()) {
            score += KEYWORD_POINTS;
        }
    }

    for word in item.title.split_whitespace() {
        if word.len() > 3 && notes.contains(&word.to_lowercase()) {
            score += TITLE_WORD_POINTS;
        }
    }

    let days_out = (task.due_at.date_naive() - log.performed_at.date_naive()).num_days();
    if (TEMPORAL_WINDOW_PAST_DAYS..=TEMPORAL_WINDOW_FUTURE_DAYS).contains(&days_out) {
        score += TEMPORAL_POINTS;
    }

    score
}
