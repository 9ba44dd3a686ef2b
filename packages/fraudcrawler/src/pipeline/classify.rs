//! Classify stage: runs every prompt against each surviving product.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::queue::WorkQueue;
use crate::pipeline::stats::RunStats;
use crate::traits::classifier::ClassifierCollaborator;
use crate::types::config::Prompt;
use crate::types::product::ProductItem;

pub(crate) async fn classify_worker(
    worker: usize,
    classifier: Arc<dyn ClassifierCollaborator>,
    prompts: Arc<[Prompt]>,
    queue_in: WorkQueue<ProductItem>,
    queue_out: WorkQueue<ProductItem>,
    stats: Arc<RunStats>,
) -> Result<()> {
    while let Some(mut product) = queue_in.next_item().await {
        classify_product(worker, classifier.as_ref(), &prompts, &mut product, &stats).await;
        let forwarded = queue_out.put(product).await;
        queue_in.task_done();
        forwarded?;
    }
    debug!(worker, "Classify worker received sentinel");
    Ok(())
}

/// Fill `classifications` with one entry per prompt. Filtered products are skipped.
pub(crate) async fn classify_product(
    worker: usize,
    classifier: &dyn ClassifierCollaborator,
    prompts: &[Prompt],
    product: &mut ProductItem,
    stats: &RunStats,
) {
    if product.is_filtered() {
        return;
    }
    for prompt in prompts {
        let class = match resolve_class(worker, classifier, prompt, product).await {
            Some(class) => class,
            None => {
                stats.record_classification_fallback();
                prompt.default_if_missing
            }
        };
        product.classifications.insert(prompt.name.clone(), class);
    }
}

/// `None` means the prompt falls back to its `default_if_missing`.
async fn resolve_class(
    worker: usize,
    classifier: &dyn ClassifierCollaborator,
    prompt: &Prompt,
    product: &ProductItem,
) -> Option<i32> {
    let (Some(name), Some(description)) = (
        product.product_name.as_deref(),
        product.product_description.as_deref(),
    ) else {
        debug!(
            worker,
            url = %product.url(),
            prompt = %prompt.name,
            "Missing name or description; using default class"
        );
        return None;
    };

    match classifier
        .classify(prompt, product.url(), name, description)
        .await
    {
        Ok(class) if prompt.allows(class) => Some(class),
        Ok(class) => {
            warn!(
                worker,
                url = %product.url(),
                prompt = %prompt.name,
                class,
                "Classifier returned a class outside the allowed set"
            );
            None
        }
        Err(e) => {
            warn!(
                worker,
                url = %product.url(),
                prompt = %prompt.name,
                error = %e,
                "Classification failed; using default class"
            );
            None
        }
    }
}
