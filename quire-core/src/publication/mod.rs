//! Publication model: manifest, builder, services and the finalized publication

mod builder;
mod legacy;
mod manifest;
mod service;

pub use builder::{BuilderTransform, PublicationBuilder};
pub use legacy::{css_style, LegacyTypeTable, PublicationType};
pub use manifest::{Layout, Link, Manifest, Metadata, ReadingProgression, TocEntry};
pub use service::{
    ContentProtectionService, PublicationService, ServiceContext, ServiceFactory,
    ServicesBuilder,
};

use crate::fetcher::{FetchResult, Fetcher};
use crate::pagination::{Pagination, PaginationInfo};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A finalized, enriched publication
///
/// Produced by [`PublicationBuilder::build`] and enriched by the streamer
/// before it is handed to the caller; read-only from then on.
pub struct Publication {
    manifest: Manifest,
    fetcher: Arc<dyn Fetcher>,
    services: Vec<Box<dyn PublicationService>>,
    publication_type: PublicationType,
    css_style: Option<String>,
    page_count: usize,
    pagination: BTreeMap<String, PaginationInfo>,
}

impl Publication {
    pub(crate) fn new(
        manifest: Manifest,
        fetcher: Arc<dyn Fetcher>,
        services: Vec<Box<dyn PublicationService>>,
    ) -> Self {
        Self {
            manifest,
            fetcher,
            services,
            publication_type: PublicationType::default(),
            css_style: None,
            page_count: 0,
            pagination: BTreeMap::new(),
        }
    }

    pub(crate) fn set_legacy_properties(
        &mut self,
        publication_type: PublicationType,
        css_style: Option<String>,
    ) {
        self.publication_type = publication_type;
        self.css_style = css_style;
    }

    pub(crate) fn set_pagination(&mut self, pagination: Pagination) {
        self.page_count = pagination.page_count;
        self.pagination = pagination.by_resource;
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn metadata(&self) -> &Metadata {
        &self.manifest.metadata
    }

    pub fn reading_order(&self) -> &[Link] {
        &self.manifest.reading_order
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Read a resource of the publication
    pub async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        self.fetcher.get(href).await
    }

    pub fn services(&self) -> impl Iterator<Item = &dyn PublicationService> {
        self.services.iter().map(|s| s.as_ref())
    }

    /// Find a service by its concrete type
    pub fn find_service<S: PublicationService>(&self) -> Option<&S> {
        self.services.iter().find_map(|s| s.as_any().downcast_ref::<S>())
    }

    /// Protection details, when a content protection claimed the publication
    pub fn protection(&self) -> Option<&ContentProtectionService> {
        self.find_service::<ContentProtectionService>()
    }

    /// Whether the publication content is locked
    pub fn is_restricted(&self) -> bool {
        self.protection().is_some_and(|p| p.is_restricted)
    }

    /// Legacy classification of the publication
    pub fn publication_type(&self) -> PublicationType {
        self.publication_type
    }

    /// Reading-system layout style, set for EPUB publications
    pub fn css_style(&self) -> Option<&str> {
        self.css_style.as_deref()
    }

    /// Total number of pages
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Pagination of each reading-order resource, keyed by href
    pub fn pagination(&self) -> &BTreeMap<String, PaginationInfo> {
        &self.pagination
    }

    /// Pagination of one reading-order resource
    pub fn pagination_of(&self, link: &Link) -> Option<&PaginationInfo> {
        self.pagination.get(&link.href)
    }
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("title", &self.manifest.metadata.title)
            .field("publication_type", &self.publication_type)
            .field("page_count", &self.page_count)
            .field("services", &self.services.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}
