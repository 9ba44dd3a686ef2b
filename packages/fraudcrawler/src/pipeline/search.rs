//! Search stage: search tasks in, candidate items out.

use std::sync::Arc;
use tracing::{debug, error};

use crate::error::Result;
use crate::pipeline::queue::WorkQueue;
use crate::pipeline::stats::RunStats;
use crate::traits::searcher::SearchCollaborator;
use crate::types::product::{ProductItem, SearchTask};

/// Worker loop of the search stage.
///
/// A failed search is logged and the task skipped; the loop only ends on
/// its sentinel or when the downstream queue is gone.
pub(crate) async fn search_worker(
    worker: usize,
    searcher: Arc<dyn SearchCollaborator>,
    queue_in: WorkQueue<SearchTask>,
    queue_out: WorkQueue<ProductItem>,
    stats: Arc<RunStats>,
) -> Result<()> {
    while let Some(task) = queue_in.next_item().await {
        let forwarded = execute_search(worker, searcher.as_ref(), &task, &queue_out, &stats).await;
        queue_in.task_done();
        forwarded?;
    }
    debug!(worker, "Search worker received sentinel");
    Ok(())
}

async fn execute_search(
    worker: usize,
    searcher: &dyn SearchCollaborator,
    task: &SearchTask,
    queue_out: &WorkQueue<ProductItem>,
    stats: &RunStats,
) -> Result<()> {
    let results = match searcher
        .search(
            &task.search_term,
            &task.language,
            &task.location,
            task.num_results,
            task.marketplaces.as_deref(),
            task.excluded_urls.as_deref(),
        )
        .await
    {
        Ok(results) => results,
        Err(e) => {
            error!(
                worker,
                search_term = %task.search_term,
                error = %e,
                "Search failed; skipping task"
            );
            stats.record_search_error();
            return Ok(());
        }
    };

    debug!(
        worker,
        search_term = %task.search_term,
        search_term_type = %task.search_term_type,
        results = results.len(),
        "Search returned candidates"
    );

    for result in results {
        let product = ProductItem::from_serp(task, result);
        stats.record_candidate();
        queue_out.put(product).await?;
    }
    Ok(())
}
