//! Per-run counters shared by the stage workers.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::product::ProductItem;

#[derive(Debug, Default)]
pub struct RunStats {
    search_tasks: AtomicUsize,
    search_errors: AtomicUsize,
    candidates: AtomicUsize,
    duplicates: AtomicUsize,
    detail_errors: AtomicUsize,
    below_threshold: AtomicUsize,
    classification_fallbacks: AtomicUsize,
    collected: AtomicUsize,
    collected_filtered: AtomicUsize,
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Search tasks enqueued (seed plus enriched terms).
    pub search_tasks: usize,
    /// Search tasks that failed and were skipped.
    pub search_errors: usize,
    /// Items created from search results.
    pub candidates: usize,
    /// Items flagged as current- or previous-run duplicates.
    pub duplicates: usize,
    /// Detail fetches that failed; those items went on un-enriched.
    pub detail_errors: usize,
    /// Items flagged by the confidence threshold.
    pub below_threshold: usize,
    /// Prompt evaluations that resolved to `default_if_missing`.
    pub classification_fallbacks: usize,
    /// Items handed to the collector.
    pub collected: usize,
    /// Of those, items carrying a filter flag.
    pub collected_filtered: usize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RunStats {
    pub fn record_search_task(&self) {
        bump(&self.search_tasks);
    }

    pub fn record_search_error(&self) {
        bump(&self.search_errors);
    }

    pub fn record_candidate(&self) {
        bump(&self.candidates);
    }

    pub fn record_duplicate(&self) {
        bump(&self.duplicates);
    }

    pub fn record_detail_error(&self) {
        bump(&self.detail_errors);
    }

    pub fn record_below_threshold(&self) {
        bump(&self.below_threshold);
    }

    pub fn record_classification_fallback(&self) {
        bump(&self.classification_fallbacks);
    }

    pub fn record_collected(&self, product: &ProductItem) {
        bump(&self.collected);
        if product.is_filtered() {
            bump(&self.collected_filtered);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        StatsSnapshot {
            search_tasks: load(&self.search_tasks),
            search_errors: load(&self.search_errors),
            candidates: load(&self.candidates),
            duplicates: load(&self.duplicates),
            detail_errors: load(&self.detail_errors),
            below_threshold: load(&self.below_threshold),
            classification_fallbacks: load(&self.classification_fallbacks),
            collected: load(&self.collected),
            collected_filtered: load(&self.collected_filtered),
        }
    }
}
