//! In-memory fetcher

use super::{normalize_href, FetchResult, Fetcher};
use crate::error::FetchError;
use crate::mediatype::MediaType;
use crate::publication::Link;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Fetcher serving resources held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    resources: BTreeMap<String, (Link, Vec<u8>)>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, guessing its media type from the href
    pub fn with_resource(mut self, href: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(href, data);
        self
    }

    pub fn insert(&mut self, href: impl Into<String>, data: impl Into<Vec<u8>>) {
        let href = href.into();
        let href = normalize_href(&href).unwrap_or(href);
        let mut link = Link::new(href.clone());
        link.media_type = MediaType::of_path(&href);
        self.resources.insert(href, (link, data.into()));
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn entry(&self, href: &str) -> FetchResult<&(Link, Vec<u8>)> {
        normalize_href(href)
            .and_then(|h| self.resources.get(&h))
            .ok_or_else(|| FetchError::NotFound(href.to_string()))
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn links(&self) -> FetchResult<Vec<Link>> {
        Ok(self.resources.values().map(|(link, _)| link.clone()).collect())
    }

    async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        self.entry(href).map(|(_, data)| data.clone())
    }

    async fn length(&self, href: &str) -> FetchResult<u64> {
        self.entry(href).map(|(_, data)| data.len() as u64)
    }
}
