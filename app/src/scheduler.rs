//! Daily batch scheduler
//!
//! Runs one batch reconciliation per day at a wall-clock time in a named
//! time zone. A run that would overlap a batch already in progress (e.g. one
//! started through the API) is skipped.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tiergate_api::AppState;
use tiergate_core::{Error, ScheduleConfig};
use tokio::sync::watch;

/// A daily wall-clock trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    zone: Tz,
    at: NaiveTime,
}

impl DailySchedule {
    pub fn new(zone: Tz, at: NaiveTime) -> Self {
        Self { zone, at }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, Error> {
        let zone: Tz = config
            .time_zone
            .parse()
            .map_err(|_| Error::Config(format!("unknown time zone '{}'", config.time_zone)))?;
        let at = NaiveTime::parse_from_str(&config.run_at, "%H:%M").map_err(|_| {
            Error::Config(format!("run_at must be HH:MM, got '{}'", config.run_at))
        })?;
        Ok(Self::new(zone, at))
    }

    /// First trigger strictly after `now`.
    ///
    /// A time skipped by a DST jump fires one hour later; a time that occurs
    /// twice fires on its first occurrence.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.zone).date_naive();

        for offset in 0..3 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            if let Some(instant) = self.on(date) {
                if instant > now {
                    return instant;
                }
            }
        }

        now + chrono::Duration::days(1)
    }

    /// Next trigger after `now` that is also after `last`, the trigger that
    /// fired most recently. Keeps a wall clock lagging the timer from
    /// yielding the same trigger twice.
    pub fn following(&self, now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        self.next_after(last.map_or(now, |last| now.max(last)))
    }

    fn on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_time(self.at);
        self.zone
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                self.zone
                    .from_local_datetime(&(local + chrono::Duration::hours(1)))
                    .earliest()
            })
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Run batches on `schedule` until `shutdown` flips to true
pub async fn run(
    state: AppState,
    schedule: DailySchedule,
    run_on_startup: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    if run_on_startup {
        run_once(&state).await;
    }

    let mut last_trigger: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let next = schedule.following(now, last_trigger);
        tracing::info!(next = %next, "Next batch reconciliation scheduled");

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                last_trigger = Some(next);
                run_once(&state).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Scheduler stopped");
                    return;
                }
            }
        }
    }
}

async fn run_once(state: &AppState) {
    match state.try_run_batch().await {
        Some(Ok(summary)) => tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "Scheduled batch complete"
        ),
        Some(Err(e)) => tracing::error!("Scheduled batch failed: {}", e),
        None => tracing::warn!("Batch already running, skipping scheduled run"),
    }
}
