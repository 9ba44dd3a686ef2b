use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use fraudcrawler::{validate_prompts, Deepness, Host, Language, Location, Prompt, RunRequest};

/// Search for product listings and classify them.
#[derive(Debug, Parser)]
#[command(name = "fraudcrawler", version, about)]
pub struct Args {
    /// Seed search term
    #[arg(long)]
    pub term: String,

    #[arg(long, default_value = "German")]
    pub language_name: String,

    #[arg(long, default_value = "de")]
    pub language_code: String,

    #[arg(long, default_value = "Switzerland")]
    pub location_name: String,

    #[arg(long, default_value = "ch")]
    pub location_code: String,

    /// Results requested for the seed term
    #[arg(long, default_value_t = 20)]
    pub num_results: usize,

    /// Related terms to add through keyword enrichment
    #[arg(long)]
    pub additional_terms: Option<usize>,

    /// Results requested per related term
    #[arg(long, default_value_t = 10, requires = "additional_terms")]
    pub urls_per_term: usize,

    /// JSON file holding an array of classification prompts
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Restrict the search to a marketplace: `Name=domain1,domain2` or `domain`
    #[arg(long = "marketplace", value_parser = parse_host)]
    pub marketplaces: Vec<Host>,

    /// Exclude a site from the search: `Name=domain1,domain2` or `domain`
    #[arg(long = "exclude", value_parser = parse_host)]
    pub excluded: Vec<Host>,

    /// File with URLs collected by earlier runs, one per line
    #[arg(long)]
    pub previous_urls: Option<PathBuf>,

    /// Where this run's collected URLs are written, one per line
    #[arg(long)]
    pub save_urls: Option<PathBuf>,

    /// Directory for the JSON Lines results
    #[arg(long, default_value = "data/results")]
    pub out_dir: PathBuf,
}

impl Args {
    pub fn language(&self) -> Language {
        Language::new(&self.language_name, &self.language_code)
    }

    pub fn location(&self) -> Location {
        Location::new(&self.location_name, &self.location_code)
    }

    pub fn deepness(&self) -> Deepness {
        let deepness = Deepness::new(self.num_results);
        match self.additional_terms {
            Some(terms) => deepness.with_enrichment(terms, self.urls_per_term),
            None => deepness,
        }
    }

    /// Assemble the run request, reading the prompt and URL files.
    pub fn run_request(&self) -> Result<RunRequest> {
        let prompts = match &self.prompts {
            Some(path) => load_prompts(path)?,
            None => Vec::new(),
        };

        let mut request = RunRequest::new(
            &self.term,
            self.language(),
            self.location(),
            self.deepness(),
        )
        .with_prompts(prompts);
        if let Some(path) = &self.previous_urls {
            let previous = load_urls(path)?;
            request = request.with_previously_collected_urls(previous.into_iter().collect());
        }
        if !self.marketplaces.is_empty() {
            request = request.with_marketplaces(self.marketplaces.clone());
        }
        if !self.excluded.is_empty() {
            request = request.with_excluded_urls(self.excluded.clone());
        }
        Ok(request)
    }
}

/// Parse `Name=domain1,domain2`; a bare domain list is named after its first domain.
pub fn parse_host(raw: &str) -> Result<Host, String> {
    let (name, domains) = match raw.split_once('=') {
        Some((name, domains)) => (name.trim().to_string(), domains),
        None => {
            let first = raw.split(',').next().unwrap_or_default().trim();
            (first.to_string(), raw)
        }
    };
    if name.is_empty() {
        return Err(format!("missing host name in {raw:?}"));
    }
    let host = Host::new(name, domains);
    if host.domains.is_empty() {
        return Err(format!("no domains in {raw:?}"));
    }
    Ok(host)
}

pub fn load_prompts(path: &Path) -> Result<Vec<Prompt>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts from {}", path.display()))?;
    let prompts: Vec<Prompt> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid prompts file {}", path.display()))?;
    validate_prompts(&prompts)?;
    if prompts.iter().any(|p| p.allowed_classes.is_empty()) {
        bail!("every prompt needs at least one allowed class");
    }
    Ok(prompts)
}

/// Non-empty, trimmed lines; `#` starts a comment line.
pub fn load_urls(path: &Path) -> Result<HashSet<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read URLs from {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

pub fn save_urls(path: &Path, urls: &HashSet<String>) -> Result<()> {
    let mut sorted: Vec<&str> = urls.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut contents = sorted.join("\n");
    contents.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
