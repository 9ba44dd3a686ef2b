//! Dedup stage: a single worker owning the URL-seen sets.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::queue::WorkQueue;
use crate::pipeline::stats::RunStats;
use crate::types::product::{FilterReason, ProductItem};

/// URL bookkeeping for one run.
///
/// `previous_run` is read-only reference data; only `current_run` grows.
#[derive(Debug, Default)]
pub struct UrlDeduplicator {
    current_run: HashSet<String>,
    previous_run: HashSet<String>,
}

impl UrlDeduplicator {
    pub fn new(previously_collected: impl IntoIterator<Item = String>) -> Self {
        Self {
            current_run: HashSet::new(),
            previous_run: previously_collected.into_iter().collect(),
        }
    }

    /// Flag `product` if its URL was already seen, otherwise remember it.
    ///
    /// Items that arrive already filtered are left untouched.
    pub fn check(&mut self, product: &mut ProductItem) -> Option<FilterReason> {
        if product.is_filtered() {
            return None;
        }
        let reason = if self.current_run.contains(product.url()) {
            FilterReason::CurrentRunDuplicate
        } else if self.previous_run.contains(product.url()) {
            FilterReason::PreviousRunDuplicate
        } else {
            self.current_run.insert(product.url().to_string());
            return None;
        };
        product.mark_filtered(reason);
        Some(reason)
    }

    pub fn current_run(&self) -> &HashSet<String> {
        &self.current_run
    }

    pub fn into_current_run(self) -> HashSet<String> {
        self.current_run
    }
}

/// Worker loop of the dedup stage. Returns the URLs first seen in this run.
///
/// Every item is forwarded, flagged or not.
pub(crate) async fn dedup_worker(
    mut dedup: UrlDeduplicator,
    queue_in: WorkQueue<ProductItem>,
    queue_out: WorkQueue<ProductItem>,
    stats: Arc<RunStats>,
) -> Result<HashSet<String>> {
    while let Some(mut product) = queue_in.next_item().await {
        if let Some(reason) = dedup.check(&mut product) {
            debug!(url = %product.url(), %reason, "Duplicate URL flagged");
            stats.record_duplicate();
        }
        let forwarded = queue_out.put(product).await;
        queue_in.task_done();
        forwarded?;
    }
    debug!(unique = dedup.current_run().len(), "Dedup worker received sentinel");
    Ok(dedup.into_current_run())
}
