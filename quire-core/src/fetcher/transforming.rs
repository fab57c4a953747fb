//! Fetcher decorator applying a transform to every resource it serves

use super::{FetchResult, Fetcher};
use crate::publication::Link;
use async_trait::async_trait;
use std::sync::Arc;

/// Transform applied to the bytes of a resource, given its href
pub type ResourceTransform = Arc<dyn Fn(&str, Vec<u8>) -> FetchResult<Vec<u8>> + Send + Sync>;

/// Wraps a fetcher to layer decryption, deobfuscation or access control on its reads
pub struct TransformingFetcher {
    inner: Arc<dyn Fetcher>,
    transform: ResourceTransform,
}

impl TransformingFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, transform: ResourceTransform) -> Self {
        Self { inner, transform }
    }
}

#[async_trait]
impl Fetcher for TransformingFetcher {
    async fn links(&self) -> FetchResult<Vec<Link>> {
        self.inner.links().await
    }

    async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        let data = self.inner.get(href).await?;
        (self.transform)(href, data)
    }

    async fn contains(&self, href: &str) -> FetchResult<bool> {
        self.inner.contains(href).await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
