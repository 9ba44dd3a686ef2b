//! In-memory result collector.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::pipeline::queue::ProductStream;
use crate::traits::collector::ResultCollector;
use crate::types::product::ProductItem;

/// Stores every collected product in arrival order.
///
/// Products from successive runs accumulate until [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct MemoryCollector {
    products: RwLock<Vec<ProductItem>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All products collected so far.
    pub async fn products(&self) -> Vec<ProductItem> {
        self.products.read().await.clone()
    }

    /// Collected products that were not filtered along the way.
    pub async fn unfiltered(&self) -> Vec<ProductItem> {
        self.products
            .read()
            .await
            .iter()
            .filter(|p| !p.is_filtered())
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.products.write().await.clear();
    }
}

#[async_trait]
impl ResultCollector for MemoryCollector {
    async fn consume(&self, mut products: ProductStream) -> Result<()> {
        while let Some(product) = products.next().await {
            self.products.write().await.push(product);
        }
        Ok(())
    }
}
