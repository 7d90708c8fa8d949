use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{Database, StoreError};

/// Compact the journal if at least `threshold` records were appended since the
/// last compaction. Returns whether it compacted.
pub async fn maybe_compact(db: &Database, threshold: u64) -> Result<bool, StoreError> {
    let appends = db.journal_appends_since_compact().await?;
    if appends < threshold {
        return Ok(false);
    }
    db.compact_journal().await?;
    info!("compacted journal after {appends} appends");
    Ok(true)
}

/// Background task: check the journal every `every` and compact past `threshold`.
pub async fn run_compactor(db: Arc<Database>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = maybe_compact(&db, threshold).await {
            warn!("journal compaction skipped: {e}");
        }
    }
}
