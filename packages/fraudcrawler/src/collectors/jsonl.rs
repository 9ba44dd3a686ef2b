//! JSON Lines result collector.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::queue::ProductStream;
use crate::traits::collector::ResultCollector;
use crate::types::{
    locale::{Language, Location},
    product::ProductItem,
};

/// Writes each product as one JSON object per line.
///
/// Write failures do not stop consumption: the rest of the stream is still
/// drained and the first error is returned once it ends.
#[derive(Debug)]
pub struct JsonLinesCollector {
    path: PathBuf,
    written: AtomicUsize,
}

impl JsonLinesCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written by the last run.
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    async fn open(&self) -> Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(BufWriter::new(File::create(&self.path).await?))
    }
}

async fn write_line(writer: &mut BufWriter<File>, product: &ProductItem) -> Result<()> {
    let mut line = serde_json::to_vec(product)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}

#[async_trait]
impl ResultCollector for JsonLinesCollector {
    async fn consume(&self, mut products: ProductStream) -> Result<()> {
        self.written.store(0, Ordering::Relaxed);
        let mut first_error: Option<PipelineError> = None;
        let mut writer = match self.open().await {
            Ok(writer) => Some(writer),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Cannot open result file");
                first_error = Some(e);
                None
            }
        };

        while let Some(product) = products.next().await {
            let failed = match writer.as_mut() {
                Some(w) => write_line(w, &product).await.err(),
                None => None,
            };
            match failed {
                Some(e) => {
                    error!(path = %self.path.display(), error = %e, "Writing results failed");
                    first_error.get_or_insert(e);
                    writer = None;
                }
                None if writer.is_some() => {
                    self.written.fetch_add(1, Ordering::Relaxed);
                }
                None => {}
            }
        }

        if let Some(mut writer) = writer {
            if let Err(e) = writer.flush().await {
                first_error.get_or_insert(e.into());
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(path = %self.path.display(), written = self.written(), "Results written");
                Ok(())
            }
        }
    }
}

/// `{search_term}_{language}_{location}_{timestamp}.jsonl` with the term made file-safe.
pub fn result_filename(
    search_term: &str,
    language: &Language,
    location: &Location,
    timestamp: DateTime<Utc>,
) -> String {
    let term: String = search_term
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "{}_{}_{}_{}.jsonl",
        term,
        language.code,
        location.code,
        timestamp.format("%Y%m%d%H%M%S")
    )
}
