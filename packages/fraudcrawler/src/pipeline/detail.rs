//! Detail stage: extracts product fields and applies the confidence filter.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::queue::WorkQueue;
use crate::pipeline::stats::RunStats;
use crate::traits::detail::DetailCollaborator;
use crate::types::product::{FilterReason, ProductItem};

pub(crate) async fn detail_worker(
    worker: usize,
    detailer: Arc<dyn DetailCollaborator>,
    threshold: f64,
    queue_in: WorkQueue<ProductItem>,
    queue_out: WorkQueue<ProductItem>,
    stats: Arc<RunStats>,
) -> Result<()> {
    while let Some(mut product) = queue_in.next_item().await {
        enrich_product(worker, detailer.as_ref(), threshold, &mut product, &stats).await;
        let forwarded = queue_out.put(product).await;
        queue_in.task_done();
        forwarded?;
    }
    debug!(worker, "Detail worker received sentinel");
    Ok(())
}

/// Fetch details for an unfiltered product and flag it if below `threshold`.
///
/// A failed fetch leaves the product unfiltered and without details.
pub(crate) async fn enrich_product(
    worker: usize,
    detailer: &dyn DetailCollaborator,
    threshold: f64,
    product: &mut ProductItem,
    stats: &RunStats,
) {
    if product.is_filtered() {
        return;
    }

    match detailer.fetch(product.url()).await {
        Ok(details) => {
            let keep = detailer.keep(&details, threshold);
            product.apply_details(details);
            if !keep {
                debug!(
                    worker,
                    url = %product.url(),
                    probability = ?product.probability,
                    threshold,
                    "Product below confidence threshold"
                );
                product.mark_filtered(FilterReason::ConfidenceThreshold);
                stats.record_below_threshold();
            }
        }
        Err(e) => {
            warn!(
                worker,
                url = %product.url(),
                error = %e,
                "Detail fetch failed; forwarding without details"
            );
            stats.record_detail_error();
        }
    }
}
