//! Cron trigger for the retention job.
//!
//! Accepts standard 5-field Unix cron expressions, evaluated as wall-clock
//! times in a configured timezone, and converts them to the 6-field format
//! (with seconds) the `cron` crate expects.

use crate::error::SchedulerError;
use crate::retention::RetentionJob;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn normalize_cron_expr(cron_expr: &str) -> String {
    let fields: Vec<&str> = cron_expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

/// A cron expression bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expr: String,
    schedule: Schedule,
    timezone: Tz,
}

impl CronTrigger {
    pub fn new(expr: &str, timezone: Tz) -> Result<Self, SchedulerError> {
        let schedule = Schedule::from_str(&normalize_cron_expr(expr)).map_err(|e| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
            timezone,
        })
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|next| next.with_timezone(&Utc))
            .ok_or_else(|| SchedulerError::NoUpcomingRun(self.expr.clone()))
    }
}

/// Background task running the job on every cron firing.
pub struct RetentionScheduler {
    job: Arc<RetentionJob>,
    trigger: CronTrigger,
    run_on_start: bool,
    shutdown_rx: watch::Receiver<bool>,
}

impl RetentionScheduler {
    pub fn new(
        job: Arc<RetentionJob>,
        trigger: CronTrigger,
        run_on_start: bool,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            job,
            trigger,
            run_on_start,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!(
            cron = %self.trigger.expr,
            timezone = %self.trigger.timezone,
            run_on_start = self.run_on_start,
            "retention scheduler started"
        );

        if self.run_on_start {
            self.fire().await;
        }

        loop {
            let now = Utc::now();
            let next = match self.trigger.next_after(now) {
                Ok(next) => next,
                Err(err) => {
                    error!(error = %err, "retention scheduler has nothing left to run");
                    break;
                }
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "next retention run scheduled");

            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("retention scheduler shutting down");
                        break;
                    }
                }
                _ = tokio::time::sleep(wait) => {
                    self.fire().await;
                }
            }
        }
    }

    /// One run. Failures are logged and left for the next firing.
    async fn fire(&self) {
        match self.job.run().await {
            Ok(report) if report.is_clean() => info!(
                objects_deleted = report.storage.succeeded,
                records_deleted = report.records.succeeded,
                "scheduled retention run completed"
            ),
            Ok(report) => warn!(
                objects_failed = report.storage.failed.len(),
                records_failed = report.records.failed.len(),
                "scheduled retention run completed with failures"
            ),
            Err(err) => error!(error = %err, "scheduled retention run aborted"),
        }
    }
}

pub fn spawn_scheduler(
    job: Arc<RetentionJob>,
    trigger: CronTrigger,
    run_on_start: bool,
) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = RetentionScheduler::new(job, trigger, run_on_start, shutdown_rx);
    let handle = tokio::spawn(scheduler.run());
    (handle, shutdown_tx)
}
