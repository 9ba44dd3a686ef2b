//! End-to-end pipeline runs against mock collaborators.
//!
//! Every run is wrapped in a timeout so a broken drain barrier fails the
//! test instead of hanging it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fraudcrawler::{
    collectors::{JsonLinesCollector, MemoryCollector},
    pipeline::UrlDeduplicator,
    testing::{product_details, MockClassifier, MockDetail, MockEnricher, MockSearcher},
    CollaboratorResult, Deepness, DetailCollaborator, FilterReason, Language, Location,
    Orchestrator, OrchestratorConfig, PipelineError, ProductDetails, ProductItem, Prompt,
    ResultCollector, RunReport, RunRequest, SearchTermType,
};
use proptest::prelude::*;

const U1: &str = "https://www.shop.ch/p/1";
const U2: &str = "https://www.shop.ch/p/2";
const U3: &str = "https://www.shop.ch/p/3";

/// Mock collaborators plus the collector they feed.
struct Harness {
    searcher: MockSearcher,
    enricher: MockEnricher,
    detail: MockDetail,
    classifier: MockClassifier,
    collector: Arc<MemoryCollector>,
}

impl Harness {
    fn new(searcher: MockSearcher) -> Self {
        Self {
            searcher,
            enricher: MockEnricher::new(),
            detail: MockDetail::new().with_default_probability(0.9),
            classifier: MockClassifier::new(),
            collector: Arc::new(MemoryCollector::new()),
        }
    }

    fn orchestrator(&self, config: OrchestratorConfig) -> Orchestrator {
        self.orchestrator_with_collector(config, self.collector.clone())
    }

    fn orchestrator_with_collector(
        &self,
        config: OrchestratorConfig,
        collector: Arc<dyn ResultCollector>,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.searcher.clone()),
            Arc::new(self.enricher.clone()),
            Arc::new(self.detail.clone()),
            Arc::new(self.classifier.clone()),
            collector,
        )
        .with_config(config)
    }

    async fn run(&self, request: RunRequest) -> RunReport {
        run_with(&self.orchestrator(OrchestratorConfig::default()), request).await
    }
}

async fn run_with(orchestrator: &Orchestrator, request: RunRequest) -> RunReport {
    tokio::time::timeout(Duration::from_secs(10), orchestrator.run(request))
        .await
        .expect("pipeline run hung")
        .expect("pipeline run failed")
}

fn request(term: &str, num_results: usize) -> RunRequest {
    RunRequest::new(
        term,
        Language::new("German", "de"),
        Location::new("Switzerland", "ch"),
        Deepness::new(num_results),
    )
}

fn binary_prompt(name: &str) -> Prompt {
    Prompt::new(name, "We look for prescription drugs", "Answer 0 or 1", [0, 1])
}

fn with_url<'a>(products: &'a [ProductItem], url: &str) -> Vec<&'a ProductItem> {
    products.iter().filter(|p| p.url() == url).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_current_run_duplicate_is_flagged_not_dropped() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2, U1]));

    let report = harness.run(request("sildenafil", 3)).await;
    let products = harness.collector.products().await;

    assert_eq!(products.len(), 3);
    let u1 = with_url(&products, U1);
    assert_eq!(u1.len(), 2);
    assert_eq!(u1.iter().filter(|p| !p.is_filtered()).count(), 1);
    assert_eq!(
        u1.iter().filter_map(|p| p.filtered_at_stage()).collect::<Vec<_>>(),
        vec![FilterReason::CurrentRunDuplicate]
    );

    assert_eq!(report.stats.duplicates, 1);
    assert_eq!(
        report.collected_urls,
        HashSet::from([U1.to_string(), U2.to_string()])
    );
}

#[tokio::test]
async fn test_low_confidence_product_is_filtered() {
    let mut harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2]));
    harness.detail = MockDetail::new()
        .with_probability(U1, 0.9)
        .with_probability(U2, 0.05);

    let report = harness.run(request("sildenafil", 2)).await;
    let products = harness.collector.products().await;

    let u2 = with_url(&products, U2);
    assert_eq!(u2[0].filtered_at_stage(), Some(FilterReason::ConfidenceThreshold));
    assert_eq!(u2[0].probability, Some(0.05));

    let kept = harness.collector.unfiltered().await;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].url(), U1);
    assert_eq!(report.stats.below_threshold, 1);
}

#[tokio::test]
async fn test_each_prompt_is_stored_under_its_name() {
    let mut harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1]));
    harness.classifier = MockClassifier::new().with_class("P1", 1).with_class("P2", 0);

    harness
        .run(request("sildenafil", 1).with_prompts(vec![binary_prompt("P1"), binary_prompt("P2")]))
        .await;

    let products = harness.collector.products().await;
    assert_eq!(products.len(), 1);
    assert_eq!(
        products[0].classifications,
        HashMap::from([("P1".to_string(), 1), ("P2".to_string(), 0)])
    );
}

#[tokio::test]
async fn test_detail_failure_falls_back_without_classifier_call() {
    let mut harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U3]));
    harness.detail = MockDetail::new().failing_on(U3);
    harness.classifier = MockClassifier::new().with_class("P1", 1).with_class("P2", 1);

    let report = harness
        .run(
            request("sildenafil", 1).with_prompts(vec![
                binary_prompt("P1"),
                binary_prompt("P2").with_default_if_missing(7),
            ]),
        )
        .await;

    let products = harness.collector.products().await;
    let u3 = &products[0];
    assert!(!u3.is_filtered());
    assert!(u3.product_name.is_none());
    assert!(u3.product_description.is_none());
    assert_eq!(u3.classifications["P1"], -1);
    assert_eq!(u3.classifications["P2"], 7);
    assert!(harness.classifier.calls().is_empty());
    assert_eq!(report.stats.detail_errors, 1);
    assert_eq!(report.stats.classification_fallbacks, 2);
}

// =============================================================================
// Worker sizing and setup
// =============================================================================

#[tokio::test]
async fn test_detail_workers_clamped_to_num_results() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2, U3]));
    let config = OrchestratorConfig::default().with_detail_workers(10);

    let report = run_with(&harness.orchestrator(config), request("sildenafil", 3)).await;

    assert_eq!(report.workers.detail, 3);
    assert_eq!(report.workers.classify, 3);
    assert_eq!(report.workers.search, 1);
    assert_eq!(report.workers.dedup, 1);
    assert_eq!(report.workers.collect, 1);
}

#[tokio::test]
async fn test_zero_results_run_completes() {
    let harness = Harness::new(MockSearcher::new());

    let report = harness.run(request("nothing", 0)).await;

    assert_eq!(report.workers.detail, 1);
    assert_eq!(report.stats.collected, 0);
    assert!(harness.collector.is_empty().await);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_work() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1]));
    let orchestrator = harness.orchestrator(OrchestratorConfig::default().with_classify_workers(0));

    let result = orchestrator.run(request("sildenafil", 1)).await;

    assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    assert!(harness.searcher.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_prompt_names_are_rejected() {
    let harness = Harness::new(MockSearcher::new());
    let request =
        request("sildenafil", 1).with_prompts(vec![binary_prompt("P1"), binary_prompt("P1")]);

    let result = harness
        .orchestrator(OrchestratorConfig::default())
        .run(request)
        .await;

    assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
}

#[tokio::test]
async fn test_tiny_queues_do_not_deadlock() {
    let urls: Vec<String> = (0..60).map(|i| format!("https://shop.ch/p/{i}")).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &url_refs));
    let config = OrchestratorConfig::default()
        .with_queue_capacity(1)
        .with_detail_workers(4)
        .with_classify_workers(3);

    let report = run_with(
        &harness.orchestrator(config),
        request("sildenafil", 60).with_prompts(vec![binary_prompt("P1")]),
    )
    .await;

    assert_eq!(report.stats.collected, 60);
    assert_eq!(harness.collector.unfiltered().await.len(), 60);
}

#[tokio::test]
async fn test_slow_searches_finish_before_dedup_closes() {
    let mut harness = Harness::new(
        MockSearcher::new()
            .with_urls("sildenafil", &[U1])
            .with_urls("viagra", &[U2])
            .with_urls("kamagra", &[U3])
            .with_delay(Duration::from_millis(50)),
    );
    harness.enricher = MockEnricher::new().with_terms("sildenafil", &["viagra", "kamagra"]);

    let mut request = request("sildenafil", 3);
    request.deepness = Deepness::new(3).with_enrichment(2, 1);
    let report = harness.run(request).await;

    assert_eq!(report.workers.search, 3);
    assert_eq!(report.stats.candidates, 3);
    let urls: HashSet<String> = harness
        .collector
        .products()
        .await
        .iter()
        .map(|p| p.url().to_string())
        .collect();
    assert_eq!(urls, HashSet::from([U1, U2, U3].map(String::from)));
}

// =============================================================================
// Enrichment and search failures
// =============================================================================

#[tokio::test]
async fn test_failed_search_task_does_not_affect_others() {
    let mut harness = Harness::new(
        MockSearcher::new()
            .with_urls("sildenafil", &[U1])
            .failing_on("viagra")
            .with_urls("kamagra", &[U2, U3]),
    );
    harness.enricher = MockEnricher::new().with_terms("sildenafil", &["viagra", "kamagra"]);

    let mut request = request("sildenafil", 5);
    request.deepness = Deepness::new(5).with_enrichment(2, 4);
    let report = harness.run(request).await;

    assert_eq!(report.stats.search_tasks, 3);
    assert_eq!(report.stats.search_errors, 1);
    assert_eq!(report.workers.search, 3);

    let products = harness.collector.products().await;
    assert_eq!(products.len(), 3);
    let enriched: Vec<_> = products
        .iter()
        .filter(|p| p.search_term_type() == SearchTermType::Enriched)
        .collect();
    assert_eq!(enriched.len(), 2);
    assert!(enriched.iter().all(|p| p.search_term() == "kamagra"));

    let kamagra = harness
        .searcher
        .calls()
        .into_iter()
        .find(|c| c.term == "kamagra")
        .expect("kamagra searched");
    assert_eq!(kamagra.num_results, 4);
}

#[tokio::test]
async fn test_enrichment_failure_keeps_initial_term() {
    let mut harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1]));
    harness.enricher = MockEnricher::new().failing();

    let mut request = request("sildenafil", 1);
    request.deepness = Deepness::new(1).with_enrichment(3, 2);
    let report = harness.run(request).await;

    assert_eq!(report.stats.search_tasks, 1);
    assert_eq!(harness.searcher.calls().len(), 1);
    assert_eq!(harness.enricher.calls(), vec![("sildenafil".to_string(), 3)]);
    assert_eq!(harness.collector.len().await, 1);
}

// =============================================================================
// Cross-run deduplication
// =============================================================================

#[tokio::test]
async fn test_previous_run_urls_are_flagged() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2]));

    let report = harness
        .run(request("sildenafil", 2).with_previously_collected_urls(vec![U1.to_string()]))
        .await;

    let products = harness.collector.products().await;
    assert_eq!(
        with_url(&products, U1)[0].filtered_at_stage(),
        Some(FilterReason::PreviousRunDuplicate)
    );
    assert!(!with_url(&products, U2)[0].is_filtered());
    assert_eq!(report.collected_urls, HashSet::from([U2.to_string()]));
}

#[tokio::test]
async fn test_report_urls_feed_next_run() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2]));
    let first = harness.run(request("sildenafil", 2)).await;
    harness.collector.clear().await;

    let previous: Vec<String> = first.collected_urls.into_iter().collect();
    let second = harness
        .run(request("sildenafil", 2).with_previously_collected_urls(previous))
        .await;

    assert!(harness.collector.unfiltered().await.is_empty());
    assert!(second.collected_urls.is_empty());
    assert_ne!(first.run_id, second.run_id);
}

// =============================================================================
// Classification completeness
// =============================================================================

#[tokio::test]
async fn test_every_surviving_product_has_all_classifications() {
    let mut harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2, U3, U1]));
    harness.detail = MockDetail::new()
        .with_probability(U1, 0.8)
        .with_probability(U2, 0.01)
        .failing_on(U3);
    harness.classifier = MockClassifier::new()
        .with_class("availability", 1)
        .with_class("seriousness", 5)
        .failing_on("origin");
    let prompts = vec![
        binary_prompt("availability"),
        binary_prompt("seriousness"),
        binary_prompt("origin"),
    ];

    harness
        .run(request("sildenafil", 4).with_prompts(prompts.clone()))
        .await;

    for product in harness.collector.products().await {
        if product.is_filtered() {
            assert!(product.classifications.is_empty());
            continue;
        }
        assert_eq!(product.classifications.len(), prompts.len());
        for prompt in &prompts {
            let class = product.classifications[&prompt.name];
            assert!(prompt.allows(class) || class == prompt.default_if_missing);
        }
    }
}

// =============================================================================
// JSON Lines sink
// =============================================================================

#[tokio::test]
async fn test_json_lines_collector_writes_every_product() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("run.jsonl");
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2, U1]));
    let sink = Arc::new(JsonLinesCollector::new(&path));

    let report = run_with(
        &harness.orchestrator_with_collector(OrchestratorConfig::default(), sink.clone()),
        request("sildenafil", 3),
    )
    .await;

    let content = std::fs::read_to_string(&path).unwrap();
    let products: Vec<ProductItem> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(products.len(), 3);
    assert_eq!(sink.written(), 3);
    assert_eq!(report.stats.collected_filtered, 1);
    assert_eq!(products.iter().filter(|p| p.is_filtered()).count(), 1);
}

#[tokio::test]
async fn test_failing_collector_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2]));
    let sink = Arc::new(JsonLinesCollector::new(blocker.join("out.jsonl")));

    let report = run_with(
        &harness.orchestrator_with_collector(OrchestratorConfig::default(), sink.clone()),
        request("sildenafil", 2),
    )
    .await;

    assert_eq!(report.stats.candidates, 2);
    assert_eq!(report.stats.collected, report.stats.candidates);
    assert_eq!(sink.written(), 0);
}

// =============================================================================
// Panicking collaborators
// =============================================================================

/// Detail collaborator that panics instead of returning an error for one URL.
struct PanickingDetail {
    url: &'static str,
}

#[async_trait]
impl DetailCollaborator for PanickingDetail {
    async fn fetch(&self, url: &str) -> CollaboratorResult<ProductDetails> {
        if url == self.url {
            panic!("extraction crashed on {url}");
        }
        Ok(product_details(url, 0.9))
    }
}

#[tokio::test]
async fn test_panicking_detail_call_blocks_the_drain_barrier() {
    let harness = Harness::new(MockSearcher::new().with_urls("sildenafil", &[U1, U2]));
    let orchestrator = Orchestrator::new(
        Arc::new(harness.searcher.clone()),
        Arc::new(harness.enricher.clone()),
        Arc::new(PanickingDetail { url: U2 }),
        Arc::new(harness.classifier.clone()),
        harness.collector.clone(),
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(500),
        orchestrator.run(request("sildenafil", 2)),
    )
    .await;

    assert!(outcome.is_err(), "run should still be waiting on the detail stage");
}

// =============================================================================
// Properties
// =============================================================================

fn filter_reason() -> impl Strategy<Value = FilterReason> {
    prop_oneof![
        Just(FilterReason::SerpLocale),
        Just(FilterReason::SerpExcludedUrl),
        Just(FilterReason::CurrentRunDuplicate),
        Just(FilterReason::PreviousRunDuplicate),
        Just(FilterReason::ConfidenceThreshold),
    ]
}

proptest! {
    #[test]
    fn prop_filtering_keeps_first_reason(reasons in prop::collection::vec(filter_reason(), 1..8)) {
        let mut product = ProductItem::new("t", SearchTermType::Initial, U1, "shop.ch", "Google");
        for reason in &reasons {
            product.mark_filtered(*reason);
            prop_assert!(product.is_filtered());
        }
        prop_assert_eq!(product.filtered_at_stage(), Some(reasons[0]));
    }

    #[test]
    fn prop_dedup_leaves_each_url_unfiltered_once(
        urls in prop::collection::vec(0u8..12, 0..40),
        previous in prop::collection::btree_set(0u8..12, 0..5),
    ) {
        let url = |n: u8| format!("https://shop.ch/p/{n}");
        let mut dedup = UrlDeduplicator::new(previous.iter().map(|n| url(*n)));
        let mut unfiltered = Vec::new();
        for n in &urls {
            let mut product =
                ProductItem::new("t", SearchTermType::Initial, url(*n), "shop.ch", "Google");
            dedup.check(&mut product);
            if !product.is_filtered() {
                unfiltered.push(*n);
            }
        }

        let expected: BTreeSet<u8> = urls
            .iter()
            .copied()
            .filter(|n| !previous.contains(n))
            .collect();
        let unique: BTreeSet<u8> = unfiltered.iter().copied().collect();
        prop_assert_eq!(unique.len(), unfiltered.len());
        prop_assert_eq!(unique, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_pipeline_conserves_items(
        ids in prop::collection::vec(0u8..20, 0..30),
        workers in 1usize..6,
        capacity in 1usize..4,
    ) {
        let urls: Vec<String> = ids.iter().map(|n| format!("https://shop.ch/p/{n}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let harness = Harness::new(MockSearcher::new().with_urls("t", &url_refs));
        let config = OrchestratorConfig::default()
            .with_detail_workers(workers)
            .with_classify_workers(workers)
            .with_queue_capacity(capacity);

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (report, products) = runtime.block_on(async {
            let report = run_with(&harness.orchestrator(config), request("t", urls.len())).await;
            (report, harness.collector.products().await)
        });

        prop_assert_eq!(products.len(), urls.len());
        prop_assert_eq!(report.stats.candidates, urls.len());

        let distinct: HashSet<&str> = url_refs.iter().copied().collect();
        let unfiltered: Vec<&str> = products
            .iter()
            .filter(|p| !p.is_filtered())
            .map(|p| p.url())
            .collect();
        prop_assert_eq!(unfiltered.len(), distinct.len());
        prop_assert_eq!(report.collected_urls.len(), distinct.len());
    }
}
