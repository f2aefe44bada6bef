//! Retention sweeper.
//!
//! Once a day at 02:00 UTC, rows soft-deleted more than the retention window
//! ago are hard-deleted. Each table is purged on its own; a failure on one
//! is logged and the others still run.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::db::{RetentionStore, RetentionTarget};

/// Hour of day (UTC) at which the sweep runs.
const RUN_HOUR_UTC: i64 = 2;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: Vec<(RetentionTarget, u64)>,
    pub failed: Vec<RetentionTarget>,
}

impl SweepReport {
    /// Rows deleted across all tables.
    #[must_use]
    pub fn total_purged(&self) -> u64 {
        self.purged.iter().map(|(_, count)| count).sum()
    }
}

/// The first scheduled run strictly after `now`.
#[must_use]
pub fn next_run_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc() + TimeDelta::hours(RUN_HOUR_UTC);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Purge every target once, using `now - retention_days` as the cutoff.
#[instrument(skip(store))]
pub async fn sweep(store: &dyn RetentionStore, now: DateTime<Utc>, retention_days: u32) -> SweepReport {
    let cutoff = now - TimeDelta::days(i64::from(retention_days));
    let mut report = SweepReport::default();

    for target in RetentionTarget::ALL {
        match store.purge(target, cutoff).await {
            Ok(count) => {
                info!(table = %target, count, %cutoff, "Retention purge complete");
                report.purged.push((target, count));
            }
            Err(e) => {
                error!(table = %target, error = %e, "Retention purge failed");
                report.failed.push(target);
            }
        }
    }

    report
}

/// Spawn the daily sweep. The task runs until the runtime shuts down.
pub fn spawn(store: Arc<dyn RetentionStore>, retention_days: u32) -> JoinHandle<()> {
    info!(retention_days, "Spawning retention sweeper");
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now);
            info!(next_run = %next, "Retention sweep scheduled");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

            let report = sweep(store.as_ref(), Utc::now(), retention_days).await;
            info!(
                purged = report.total_purged(),
                failed = report.failed.len(),
                "Retention sweep finished"
            );
        }
    })
}
