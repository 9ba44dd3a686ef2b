// Command-line entry point for a single fraud crawler run

mod args;
mod config;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fraudcrawler::clients::{DataForSeo, OpenAiClassifier, RateLimitExt, SerpApi, ZyteApi};
use fraudcrawler::collectors::jsonl::result_filename;
use fraudcrawler::{DetailCollaborator, JsonLinesCollector, Orchestrator};

use args::Args;
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fraudcrawler=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("Failed to load configuration")?;
    let request = args.run_request()?;

    let searcher = SerpApi::new(settings.serpapi_key.expose()).with_retry_policy(settings.retry);
    let enricher = DataForSeo::new(&settings.dataforseo_user, settings.dataforseo_pwd.expose())
        .with_retry_policy(settings.retry);
    let zyte = ZyteApi::new(settings.zyteapi_key.expose())
        .with_geolocation(&request.location.code)
        .with_retry_policy(settings.retry);
    let detailer: Arc<dyn DetailCollaborator> = match settings.zyte_requests_per_second {
        Some(rps) => Arc::new(zyte.rate_limited(rps)),
        None => Arc::new(zyte),
    };
    let classifier = OpenAiClassifier::new(settings.openaiapi_key.expose())
        .with_model(&settings.model)
        .with_retry_policy(settings.retry);

    let out_path = args.out_dir.join(result_filename(
        &request.search_term,
        &request.language,
        &request.location,
        Utc::now(),
    ));
    let collector = Arc::new(JsonLinesCollector::new(&out_path));

    let orchestrator = Orchestrator::new(
        Arc::new(searcher),
        Arc::new(enricher),
        detailer,
        Arc::new(classifier),
        collector.clone(),
    )
    .with_config(settings.orchestrator.clone());

    info!(
        search_term = %request.search_term,
        out = %out_path.display(),
        model = %settings.model,
        "Starting run"
    );
    let report = orchestrator.run(request).await.context("Pipeline run failed")?;

    if let Some(path) = &args.save_urls {
        args::save_urls(path, &report.collected_urls)?;
        info!(path = %path.display(), urls = report.collected_urls.len(), "Saved collected URLs");
    }

    info!(
        run_id = %report.run_id,
        written = collector.written(),
        "Run finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
