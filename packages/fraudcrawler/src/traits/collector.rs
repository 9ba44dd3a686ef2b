//! Result sink at the end of the pipeline.

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::queue::ProductStream;

/// Consumer of the final item stream.
///
/// The orchestrator runs exactly one collector per run. It must read the
/// stream until [`ProductStream::next`] returns `None` (the end-of-stream
/// sentinel) before returning; stopping early leaves the final drain
/// barrier waiting forever.
///
/// ```rust,ignore
/// #[async_trait]
/// impl ResultCollector for CountingCollector {
///     async fn consume(&self, mut products: ProductStream) -> Result<()> {
///         while let Some(product) = products.next().await {
///             self.count.fetch_add(1, Ordering::Relaxed);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ResultCollector: Send + Sync {
    async fn consume(&self, products: ProductStream) -> Result<()>;
}
