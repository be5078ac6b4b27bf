//! Cadence evaluators — pure next-due computation, one per cadence type.
//! No storage access: callers hand in a [`VehicleHistory`] snapshot and get
//! back zero-or-more due candidates.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use pitcrew_core::error::{PitcrewError, Result};
use pitcrew_core::types::{
    Cadence, MaintenanceLog, MaintenancePlan, Trackday, TriggerContext, VehiclePlan,
};

/// Calendar triggers are only emitted this many days ahead.
pub const LOOKAHEAD_DAYS: i64 = 30;
/// Odometer triggers fire this many km before the service threshold.
pub const ODOMETER_EARLY_WINDOW_KM: u32 = 500;
/// Engine-hours triggers fire this many hours before the threshold.
pub const ENGINE_HOURS_EARLY_WINDOW: u32 = 5;

/// Everything an evaluator may look at about a vehicle, frozen at `now`.
#[derive(Debug, Clone)]
pub struct VehicleHistory {
    /// All trackdays, past and upcoming, sorted by date.
    pub trackdays: Vec<Trackday>,
    /// All maintenance logs, sorted by date.
    pub logs: Vec<MaintenanceLog>,
    pub now: DateTime<Utc>,
}

impl VehicleHistory {
    /// Most recent logged odometer reading, if any log carries one.
    pub fn latest_odometer(&self) -> Option<u32> {
        self.logs
            .iter()
            .filter(|l| l.odometer_km.is_some())
            .max_by_key(|l| l.performed_at)
            .and_then(|l| l.odometer_km)
    }
}

/// A point where a cadence says "maintenance is due".
#[derive(Debug, Clone)]
pub struct DueCandidate {
    pub trigger_date: DateTime<Utc>,
    pub trigger: TriggerContext,
}

/// Evaluate a plan's cadence against one vehicle plan. Returns candidates
/// (at most one per pass for every cadence type) or a configuration error
/// for a degenerate interval.
pub fn evaluate(
    plan: &MaintenancePlan,
    vehicle_plan: &VehiclePlan,
    history: &VehicleHistory,
) -> Result<Vec<DueCandidate>> {
    match &plan.cadence {
        Cadence::EventCount { after_every_n } => event_count(*after_every_n, vehicle_plan, history),
        Cadence::TimeInterval {
            interval_days,
            start_date,
        } => time_interval(*interval_days, *start_date, vehicle_plan, history),
        Cadence::Odometer {
            interval_km,
            start_odometer_km,
        } => odometer(*interval_km, *start_odometer_km, vehicle_plan, history),
        Cadence::EngineHours {
            interval_hours,
            start_hours,
        } => engine_hours(*interval_hours, *start_hours, vehicle_plan, history),
    }
}

/// "After every N trackdays": once the completed count hits a multiple of N,
/// the next upcoming trackday is the trigger. Short of a multiple, the
/// `remaining`-th upcoming trackday is — if it is already scheduled.
fn event_count(
    n: u32,
    vehicle_plan: &VehiclePlan,
    history: &VehicleHistory,
) -> Result<Vec<DueCandidate>> {
    if n == 0 {
        return Err(PitcrewError::Config("event_count: after_every_n is 0".into()));
    }

    let completed = history
        .trackdays
        .iter()
        .filter(|t| t.date > vehicle_plan.activated_at && t.date < history.now)
        .count() as u32;
    let upcoming: Vec<&Trackday> = history
        .trackdays
        .iter()
        .filter(|t| t.date >= history.now)
        .collect();

    let target = if completed > 0 && completed % n == 0 {
        upcoming.first()
    } else {
        let remaining = n - completed % n;
        upcoming.get(remaining as usize - 1)
    };

    // No qualifying trackday scheduled yet — deferred until more are.
    Ok(target
        .map(|trackday| DueCandidate {
            trigger_date: trackday.date,
            trigger: TriggerContext::EventCount {
                completed_events: completed,
                every_n: n,
                trackday_id: trackday.id.clone(),
            },
        })
        .into_iter()
        .collect())
}

/// Fixed calendar interval from an anchor date. Emits the first occurrence
/// not in the past, and only within the look-ahead window.
fn time_interval(
    interval_days: u32,
    start_date: Option<chrono::NaiveDate>,
    vehicle_plan: &VehiclePlan,
    history: &VehicleHistory,
) -> Result<Vec<DueCandidate>> {
    if interval_days == 0 {
        return Err(PitcrewError::Config("time_interval: interval_days is 0".into()));
    }

    let start = start_date.unwrap_or_else(|| vehicle_plan.activated_at.date_naive());
    let today = history.now.date_naive();

    let mut next = start;
    while next < today {
        next += Duration::days(interval_days as i64);
    }

    if (next - today).num_days() > LOOKAHEAD_DAYS {
        return Ok(Vec::new());
    }

    Ok(vec![DueCandidate {
        trigger_date: next.and_time(NaiveTime::MIN).and_utc(),
        trigger: TriggerContext::TimeInterval { scheduled_for: next },
    }])
}

/// Next multiple of `interval` past `current`, measured from `start`.
/// A reading still sitting on the baseline targets the first full interval.
fn next_threshold(current: u32, start: u32, interval: u32) -> u32 {
    let delta = current.saturating_sub(start);
    let intervals = delta.div_ceil(interval).max(1);
    start + intervals * interval
}

fn odometer(
    interval_km: u32,
    start_odometer_km: Option<u32>,
    vehicle_plan: &VehiclePlan,
    history: &VehicleHistory,
) -> Result<Vec<DueCandidate>> {
    if interval_km == 0 {
        return Err(PitcrewError::Config("odometer: interval_km is 0".into()));
    }

    let start = start_odometer_km
        .or(vehicle_plan.start_odometer_km)
        .unwrap_or(0);
    let current = history.latest_odometer().unwrap_or(start);
    let service_km = next_threshold(current, start, interval_km);

    if current + ODOMETER_EARLY_WINDOW_KM < service_km {
        return Ok(Vec::new());
    }

    Ok(vec![DueCandidate {
        trigger_date: history.now,
        trigger: TriggerContext::Odometer { service_km },
    }])
}

fn engine_hours(
    interval_hours: u32,
    start_hours: Option<u32>,
    vehicle_plan: &VehiclePlan,
    history: &VehicleHistory,
) -> Result<Vec<DueCandidate>> {
    if interval_hours == 0 {
        return Err(PitcrewError::Config("engine_hours: interval_hours is 0".into()));
    }

    let start = start_hours.or(vehicle_plan.start_engine_hours).unwrap_or(0);
    let current = vehicle_plan.current_engine_hours.unwrap_or(start);
    let service_hours = next_threshold(current, start, interval_hours);

    if current + ENGINE_HOURS_EARLY_WINDOW < service_hours {
        return Ok(Vec::new());
    }

    Ok(vec![DueCandidate {
        trigger_date: history.now,
        trigger: TriggerContext::EngineHours { service_hours },
    }])
}
