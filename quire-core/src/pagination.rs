//! Pagination: page counts computed from a finalized publication

use crate::publication::{Layout, Link, Publication};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of bytes of reflowable content per page
pub const DEFAULT_CHARS_PER_PAGE: u64 = 1024;

/// Page boundaries of one reading-order resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationInfo {
    /// 1-based number of the first page of the resource
    pub first_page: usize,

    /// Number of pages spanned by the resource
    pub page_count: usize,
}

/// Result of a pagination computation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page_count: usize,

    /// Pagination of each reading-order resource, keyed by href
    pub by_resource: BTreeMap<String, PaginationInfo>,
}

/// Computes page counts for a publication
#[async_trait]
pub trait PaginationService: Send + Sync {
    async fn compute(&self, publication: &Publication) -> Pagination;
}

/// Paginates reflowable resources by length and everything else one page per resource
#[derive(Debug, Clone, Copy)]
pub struct LengthPagination {
    chars_per_page: u64,
}

impl Default for LengthPagination {
    fn default() -> Self {
        Self {
            chars_per_page: DEFAULT_CHARS_PER_PAGE,
        }
    }
}

impl LengthPagination {
    pub fn new(chars_per_page: u64) -> Self {
        Self {
            chars_per_page: chars_per_page.max(1),
        }
    }

    pub fn chars_per_page(&self) -> u64 {
        self.chars_per_page
    }

    async fn pages_of(&self, publication: &Publication, link: &Link) -> usize {
        let metadata = publication.metadata();
        let media_type = link.resolved_media_type();

        if media_type.as_ref().is_some_and(|m| m.is_pdf()) {
            if let (Some(pages), 1) = (metadata.number_of_pages, publication.reading_order().len()) {
                return (pages as usize).max(1);
            }
            return 1;
        }

        let fixed = metadata.layout == Layout::Fixed
            || media_type
                .as_ref()
                .is_some_and(|m| m.is_bitmap() || m.is_audio());
        if fixed {
            return 1;
        }

        match publication.fetcher().length(&link.href).await {
            Ok(length) => length.div_ceil(self.chars_per_page).max(1) as usize,
            Err(e) => {
                tracing::warn!(href = %link.href, error = %e, "Could not measure resource, counting one page");
                1
            }
        }
    }
}

#[async_trait]
impl PaginationService for LengthPagination {
    async fn compute(&self, publication: &Publication) -> Pagination {
        let mut pagination = Pagination::default();

        for link in publication.reading_order() {
            if pagination.by_resource.contains_key(&link.href) {
                continue;
            }
            let page_count = self.pages_of(publication, link).await;
            pagination.by_resource.insert(
                link.href.clone(),
                PaginationInfo {
                    first_page: pagination.page_count + 1,
                    page_count,
                },
            );
            pagination.page_count += page_count;
        }

        pagination
    }
}
