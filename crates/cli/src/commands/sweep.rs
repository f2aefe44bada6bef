//! One-shot retention sweep.

use chrono::Utc;
use mercato_api::db::RetentionRepository;
use mercato_api::sweeper;

use super::{CommandError, connect};

/// Purge soft-deleted rows older than `retention_days`.
///
/// A failure on one table is logged by the sweep and does not fail the
/// command; the counts are reported either way.
pub async fn run(retention_days: u32) -> Result<(), CommandError> {
    let pool = connect().await?;
    let store = RetentionRepository::new(pool);

    let report = sweeper::sweep(&store, Utc::now(), retention_days).await;
    for (target, count) in &report.purged {
        tracing::info!("  {target}: {count} row(s) purged");
    }
    if !report.failed.is_empty() {
        tracing::warn!("{} table(s) failed, see errors above", report.failed.len());
    }
    tracing::info!("Sweep complete: {} row(s) purged", report.total_purged());
    Ok(())
}
