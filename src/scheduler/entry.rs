// Registry entries and next-run computation

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::capabilities::ScheduledAction;

/// When a scheduled task fires
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Fixed delay between firings
    Interval(Duration),
    /// Daily at a wall-clock time, "HH:MM" (UTC)
    Daily(String),
}

impl Cadence {
    /// Compute the next firing strictly after `now`.
    ///
    /// A malformed daily schedule never crashes the scheduler: it falls
    /// back to one hour from now and logs a warning.
    pub fn next_run(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Interval(every) => {
                let delta = ChronoDuration::from_std(*every)
                    .unwrap_or_else(|_| ChronoDuration::hours(1));
                now + delta
            }
            Cadence::Daily(spec) => match next_daily_occurrence(spec, now) {
                Some(at) => at,
                None => {
                    warn!("Malformed daily schedule {spec:?}; firing one hour from now");
                    now + ChronoDuration::hours(1)
                }
            },
        }
    }
}

/// Next "HH:MM" occurrence after `now`: today if still ahead, else tomorrow
fn next_daily_occurrence(spec: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (hour, minute) = spec.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        Some(today)
    } else {
        Some(today + ChronoDuration::days(1))
    }
}

/// One registered recurring job (internal, mutated under the registry lock)
pub(super) struct ScheduledEntry {
    pub id: Uuid,
    pub name: String,
    pub action: Arc<dyn ScheduledAction>,
    pub cadence: Cadence,
    pub last_run: Option<DateTime<Utc>>,
    /// None while disabled; always >= the time it was computed otherwise
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub enabled: bool,
    pub last_error: Option<String>,
}

impl ScheduledEntry {
    pub fn snapshot(&self) -> ScheduledTaskInfo {
        let (interval, schedule) = match &self.cadence {
            Cadence::Interval(every) => (Some(*every), None),
            Cadence::Daily(spec) => (None, Some(spec.clone())),
        };
        ScheduledTaskInfo {
            id: self.id,
            name: self.name.clone(),
            enabled: self.enabled,
            interval,
            schedule,
            last_run: self.last_run,
            next_run: self.next_run,
            run_count: self.run_count,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of one registered scheduled task
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTaskInfo {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    /// Set for interval-cadence tasks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    /// Set for daily-cadence tasks ("HH:MM", UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    // ── daily schedules ───────────────────────────────────────────────────────

    #[test]
    fn test_daily_time_already_passed_rolls_to_tomorrow() {
        // Registered at 10:00, schedule 09:30 -> tomorrow 09:30
        let next = Cadence::Daily("09:30".into()).next_run(at(10, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_daily_time_still_ahead_fires_today() {
        let next = Cadence::Daily("23:45".into()).next_run(at(10, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 10, 23, 45, 0).unwrap());
    }

    #[test]
    fn test_daily_exact_now_rolls_to_tomorrow() {
        // "strictly after now" - a due time equal to now is not reused
        let next = Cadence::Daily("10:00".into()).next_run(at(10, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_schedules_fall_back_one_hour() {
        let now = at(10, 0);
        for bad in ["9am", "25:00", "12:61", "noon", "", ":", "12:"] {
            let next = Cadence::Daily(bad.into()).next_run(now);
            assert_eq!(next, now + ChronoDuration::hours(1), "schedule {bad:?}");
        }
    }

    #[test]
    fn test_daily_parse_tolerates_padding() {
        assert_eq!(
            next_daily_occurrence(" 9:05", at(8, 0)),
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 9, 5, 0).unwrap())
        );
    }

    // ── intervals ─────────────────────────────────────────────────────────────

    #[test]
    fn test_interval_adds_to_now() {
        let now = at(10, 0);
        let next = Cadence::Interval(Duration::from_secs(5)).next_run(now);
        assert_eq!(next, now + ChronoDuration::seconds(5));
    }

    #[test]
    fn test_next_run_never_in_the_past() {
        let now = at(10, 0);
        for cadence in [
            Cadence::Interval(Duration::from_secs(1)),
            Cadence::Daily("09:30".into()),
            Cadence::Daily("garbage".into()),
        ] {
            assert!(cadence.next_run(now) > now);
        }
    }
}
