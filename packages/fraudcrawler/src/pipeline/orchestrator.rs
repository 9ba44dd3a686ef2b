//! The Orchestrator - drives one pipeline run end to end.
//!
//! A run wires five stages with bounded queues:
//!
//! ```text
//! search tasks -> [search xN] -> [dedup x1] -> [detail xN] -> [classify xN] -> [collect x1]
//! ```
//!
//! All workers are spawned up front. Stages are then closed one at a time:
//! one sentinel per worker, await every worker, wait for the stage's queue
//! to drain, then move on. A stage is therefore only closed once everything
//! upstream has been fully forwarded into it.
//!
//! # Hangs
//!
//! The drain barrier counts every message, sentinels included. Collaborator
//! errors are absorbed per item, but a collaborator call that panics takes
//! its worker task down mid-item: the item is never confirmed, its sentinel
//! is never taken, and the run blocks in [`WorkQueue::join`]. The same holds
//! for a [`ResultCollector`] that stops reading before the end of its stream.
//! Collaborators must report failures as errors, never panic.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};
use crate::pipeline::classify::classify_worker;
use crate::pipeline::dedup::{dedup_worker, UrlDeduplicator};
use crate::pipeline::detail::detail_worker;
use crate::pipeline::queue::{ProductStream, WorkQueue};
use crate::pipeline::search::search_worker;
use crate::pipeline::stats::{RunStats, StatsSnapshot};
use crate::traits::{
    classifier::ClassifierCollaborator, collector::ResultCollector, detail::DetailCollaborator,
    enricher::EnrichmentCollaborator, searcher::SearchCollaborator,
};
use crate::types::{
    config::{validate_prompts, Deepness, OrchestratorConfig, Prompt},
    locale::{Host, Language, Location},
    product::{ProductItem, SearchTask, SearchTermType},
};

/// Everything that varies between runs of the same orchestrator.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub search_term: String,
    pub language: Language,
    pub location: Location,
    pub deepness: Deepness,
    pub prompts: Vec<Prompt>,
    pub marketplaces: Option<Vec<Host>>,
    pub excluded_urls: Option<Vec<Host>>,
    /// URLs collected by earlier runs; matches are flagged, not dropped.
    pub previously_collected_urls: Option<Vec<String>>,
}

impl RunRequest {
    pub fn new(
        search_term: impl Into<String>,
        language: Language,
        location: Location,
        deepness: Deepness,
    ) -> Self {
        Self {
            search_term: search_term.into(),
            language,
            location,
            deepness,
            prompts: Vec::new(),
            marketplaces: None,
            excluded_urls: None,
            previously_collected_urls: None,
        }
    }

    pub fn with_prompts(mut self, prompts: Vec<Prompt>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_marketplaces(mut self, marketplaces: Vec<Host>) -> Self {
        self.marketplaces = Some(marketplaces);
        self
    }

    pub fn with_excluded_urls(mut self, excluded_urls: Vec<Host>) -> Self {
        self.excluded_urls = Some(excluded_urls);
        self
    }

    pub fn with_previously_collected_urls(mut self, urls: Vec<String>) -> Self {
        self.previously_collected_urls = Some(urls);
        self
    }

    fn search_task(
        &self,
        search_term: String,
        search_term_type: SearchTermType,
        num_results: usize,
    ) -> SearchTask {
        SearchTask {
            search_term,
            search_term_type,
            language: self.language.clone(),
            location: self.location.clone(),
            num_results,
            marketplaces: self.marketplaces.clone(),
            excluded_urls: self.excluded_urls.clone(),
        }
    }
}

/// Number of workers spawned per stage for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerCounts {
    pub search: usize,
    pub dedup: usize,
    pub detail: usize,
    pub classify: usize,
    pub collect: usize,
}

impl WorkerCounts {
    /// Size each pool to the work it can possibly receive.
    ///
    /// Search gets at most one worker per term, detail and classify at most
    /// one per requested result. Every pool keeps at least one worker so the
    /// barrier protocol still terminates on an empty run.
    pub fn plan(config: &OrchestratorConfig, deepness: &Deepness) -> Self {
        let n_terms = 1 + deepness.enrichment.map_or(0, |e| e.additional_terms);
        Self {
            search: config.n_search_workers.min(n_terms).max(1),
            dedup: 1,
            detail: config.n_detail_workers.min(deepness.num_results).max(1),
            classify: config.n_classify_workers.min(deepness.num_results).max(1),
            collect: 1,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub search_term: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: WorkerCounts,
    pub stats: StatsSnapshot,
    /// URLs first seen in this run, suitable as the next run's
    /// `previously_collected_urls`.
    pub collected_urls: HashSet<String>,
}

/// One stage's input queue and the workers draining it.
struct StagePool<T, R = ()> {
    queue: WorkQueue<T>,
    workers: Vec<JoinHandle<Result<R>>>,
}

impl<T: Send, R> StagePool<T, R> {
    fn new(queue: WorkQueue<T>) -> Self {
        Self {
            queue,
            workers: Vec::new(),
        }
    }

    fn validate(&self, expected: usize) -> Result<()> {
        let stage = self.queue.name();
        if self.workers.is_empty() || self.workers.len() != expected {
            return Err(PipelineError::Setup {
                reason: format!(
                    "{stage} stage has {} workers, expected {expected}",
                    self.workers.len()
                ),
            });
        }
        if self.queue.is_closed() {
            return Err(PipelineError::Setup {
                reason: format!("{stage} queue is closed"),
            });
        }
        Ok(())
    }

    fn abort(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }

    /// Close the stage: one sentinel per worker, await all, then drain.
    ///
    /// Worker errors and panics are logged; the outputs of the workers that
    /// completed normally are returned.
    async fn finish(self) -> Vec<R> {
        let stage = self.queue.name();
        for _ in 0..self.workers.len() {
            if let Err(e) = self.queue.put_sentinel().await {
                error!(stage, error = %e, "Failed to enqueue sentinel");
            }
        }

        debug!(stage, workers = self.workers.len(), "Waiting for workers to conclude");
        let results = join_all(self.workers).await;

        let mut outputs = Vec::with_capacity(results.len());
        for (worker, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(e)) => error!(stage, worker, error = %e, "Worker ended with an error"),
                Err(e) => error!(stage, worker, error = %e, "Worker task did not complete"),
            }
        }

        self.queue.join().await;
        debug!(stage, "Stage drained");
        outputs
    }
}

/// The queues and worker pools of a single run.
struct Framework {
    search: StagePool<SearchTask>,
    dedup: StagePool<ProductItem, HashSet<String>>,
    detail: StagePool<ProductItem>,
    classify: StagePool<ProductItem>,
    collect: StagePool<ProductItem>,
}

impl Framework {
    fn validate(&self, counts: &WorkerCounts) -> Result<()> {
        self.search.validate(counts.search)?;
        self.dedup.validate(counts.dedup)?;
        self.detail.validate(counts.detail)?;
        self.classify.validate(counts.classify)?;
        self.collect.validate(counts.collect)
    }

    fn abort(&self) {
        self.search.abort();
        self.dedup.abort();
        self.detail.abort();
        self.classify.abort();
        self.collect.abort();
    }
}

/// Runs the crawler pipeline against a fixed set of collaborators.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::new(searcher, enricher, detailer, classifier, collector)
///     .with_config(OrchestratorConfig::default().with_detail_workers(4));
///
/// let request = RunRequest::new("sildenafil", language, location, Deepness::new(20))
///     .with_prompts(prompts);
/// let report = orchestrator.run(request).await?;
/// ```
pub struct Orchestrator {
    searcher: Arc<dyn SearchCollaborator>,
    enricher: Arc<dyn EnrichmentCollaborator>,
    detailer: Arc<dyn DetailCollaborator>,
    classifier: Arc<dyn ClassifierCollaborator>,
    collector: Arc<dyn ResultCollector>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        searcher: Arc<dyn SearchCollaborator>,
        enricher: Arc<dyn EnrichmentCollaborator>,
        detailer: Arc<dyn DetailCollaborator>,
        classifier: Arc<dyn ClassifierCollaborator>,
        collector: Arc<dyn ResultCollector>,
    ) -> Self {
        Self {
            searcher,
            enricher,
            detailer,
            classifier,
            collector,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the pipeline once.
    ///
    /// Only configuration and wiring problems are returned as errors.
    /// Failures of individual searches, fetches or classifications are
    /// logged and show up in the report's stats and the products' state.
    pub async fn run(&self, request: RunRequest) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "pipeline_run",
            %run_id,
            search_term = %request.search_term
        );
        self.execute(run_id, request).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, request: RunRequest) -> Result<RunReport> {
        self.config.validate()?;
        validate_prompts(&request.prompts)?;

        let started_at = Utc::now();
        let workers = WorkerCounts::plan(&self.config, &request.deepness);
        let stats = Arc::new(RunStats::default());
        info!(
            language = %request.language.code,
            location = %request.location.code,
            num_results = request.deepness.num_results,
            prompts = request.prompts.len(),
            ?workers,
            "Starting pipeline"
        );

        let framework = self.setup(&request, &workers, &stats);
        if let Err(e) = framework.validate(&workers) {
            framework.abort();
            error!(error = %e, "Pipeline setup failed");
            return Err(e);
        }

        if let Err(e) = self
            .enqueue_search_tasks(&framework.search.queue, &request, &stats)
            .await
        {
            framework.abort();
            return Err(e);
        }

        let Framework {
            search,
            dedup,
            detail,
            classify,
            collect,
        } = framework;

        search.finish().await;
        let collected_urls = dedup.finish().await.into_iter().next().unwrap_or_default();
        detail.finish().await;
        classify.finish().await;
        collect.finish().await;

        let stats = stats.snapshot();
        info!(
            candidates = stats.candidates,
            duplicates = stats.duplicates,
            below_threshold = stats.below_threshold,
            collected = stats.collected,
            "Pipeline concluded"
        );

        Ok(RunReport {
            run_id,
            search_term: request.search_term,
            started_at,
            finished_at: Utc::now(),
            workers,
            stats,
            collected_urls,
        })
    }

    /// Create every queue and spawn every worker for one run.
    fn setup(
        &self,
        request: &RunRequest,
        counts: &WorkerCounts,
        stats: &Arc<RunStats>,
    ) -> Framework {
        let capacity = self.config.queue_capacity;
        let mut search = StagePool::new(WorkQueue::new("search", capacity));
        let mut dedup = StagePool::new(WorkQueue::new("dedup", capacity));
        let mut detail = StagePool::new(WorkQueue::new("detail", capacity));
        let mut classify = StagePool::new(WorkQueue::new("classify", capacity));
        let mut collect = StagePool::new(WorkQueue::new("collect", capacity));

        for worker in 0..counts.search {
            let task = search_worker(
                worker,
                Arc::clone(&self.searcher),
                search.queue.clone(),
                dedup.queue.clone(),
                Arc::clone(stats),
            );
            search.workers.push(tokio::spawn(task.in_current_span()));
        }

        for _ in 0..counts.dedup {
            let previous = request.previously_collected_urls.clone().unwrap_or_default();
            let task = dedup_worker(
                UrlDeduplicator::new(previous),
                dedup.queue.clone(),
                detail.queue.clone(),
                Arc::clone(stats),
            );
            dedup.workers.push(tokio::spawn(task.in_current_span()));
        }

        for worker in 0..counts.detail {
            let task = detail_worker(
                worker,
                Arc::clone(&self.detailer),
                self.config.probability_threshold,
                detail.queue.clone(),
                classify.queue.clone(),
                Arc::clone(stats),
            );
            detail.workers.push(tokio::spawn(task.in_current_span()));
        }

        let prompts: Arc<[Prompt]> = request.prompts.clone().into();
        for worker in 0..counts.classify {
            let task = classify_worker(
                worker,
                Arc::clone(&self.classifier),
                Arc::clone(&prompts),
                classify.queue.clone(),
                collect.queue.clone(),
                Arc::clone(stats),
            );
            classify.workers.push(tokio::spawn(task.in_current_span()));
        }

        for _ in 0..counts.collect {
            let collector = Arc::clone(&self.collector);
            let products = ProductStream::new(collect.queue.clone(), Arc::clone(stats));
            let task = async move { collector.consume(products).await };
            collect.workers.push(tokio::spawn(task.in_current_span()));
        }

        Framework {
            search,
            dedup,
            detail,
            classify,
            collect,
        }
    }

    /// Seed the search queue: the initial term, then any enriched terms.
    ///
    /// A failed enrichment is logged and the run continues with the
    /// initial term only.
    async fn enqueue_search_tasks(
        &self,
        queue: &WorkQueue<SearchTask>,
        request: &RunRequest,
        stats: &RunStats,
    ) -> Result<()> {
        let initial = request.search_task(
            request.search_term.clone(),
            SearchTermType::Initial,
            request.deepness.num_results,
        );
        queue.put(initial).await?;
        stats.record_search_task();

        let Some(enrichment) = request.deepness.enrichment else {
            return Ok(());
        };
        if enrichment.additional_terms == 0 {
            return Ok(());
        }

        let terms = match self
            .enricher
            .apply(
                &request.search_term,
                &request.language,
                &request.location,
                enrichment.additional_terms,
            )
            .await
        {
            Ok(terms) => terms,
            Err(e) => {
                warn!(error = %e, "Enrichment failed; searching the initial term only");
                return Ok(());
            }
        };

        debug!(terms = ?terms, "Enriched search terms");
        for term in terms.into_iter().take(enrichment.additional_terms) {
            let task = request.search_task(
                term,
                SearchTermType::Enriched,
                enrichment.additional_urls_per_term,
            );
            queue.put(task).await?;
            stats.record_search_task();
        }
        Ok(())
    }
}
