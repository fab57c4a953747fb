//! Fetcher abstraction: uniform read access to a publication's resources

mod file;
mod memory;
mod transforming;

pub use file::FileFetcher;
pub use memory::MemoryFetcher;
pub use transforming::{ResourceTransform, TransformingFetcher};

use crate::error::FetchError;
use crate::publication::Link;
use async_trait::async_trait;

/// Result type for fetcher operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Read-only view over the resource tree of an asset
///
/// Hrefs are relative to the publication root and use `/` separators;
/// implementations normalize them with [`normalize_href`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Links of every resource this fetcher can serve
    async fn links(&self) -> FetchResult<Vec<Link>>;

    /// Read the full content of a resource
    async fn get(&self, href: &str) -> FetchResult<Vec<u8>>;

    /// Size of a resource in bytes
    async fn length(&self, href: &str) -> FetchResult<u64> {
        Ok(self.get(href).await?.len() as u64)
    }

    /// Whether a resource exists
    async fn contains(&self, href: &str) -> FetchResult<bool> {
        let Some(href) = normalize_href(href) else {
            return Ok(false);
        };
        Ok(self.links().await?.iter().any(|link| link.href == href))
    }

    /// Read a resource as UTF-8 text, stripping any byte order mark
    async fn read_to_string(&self, href: &str) -> FetchResult<String> {
        let bytes = self.get(href).await?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes.as_slice());
        String::from_utf8(bytes.to_vec())
            .map_err(|e| FetchError::Other(format!("{} is not valid UTF-8: {}", href, e)))
    }

    /// Release underlying handles
    async fn close(&self) {}
}

/// Normalize an href against the publication root
///
/// Strips the fragment, query and leading `/`, and resolves `.` and `..`
/// segments. Returns `None` when the href escapes the root.
pub fn normalize_href(href: &str) -> Option<String> {
    let path = href.split(['#', '?']).next().unwrap_or_default();
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// Resolve an href found in a document relative to that document's href
pub fn resolve_href(base: &str, relative: &str) -> Option<String> {
    if relative.starts_with('/') {
        return normalize_href(relative);
    }
    let dir = match base.rfind('/') {
        Some(idx) => &base[..=idx],
        None => "",
    };
    normalize_href(&format!("{}{}", dir, relative))
}

/// Fetcher serving no resources
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyFetcher;

#[async_trait]
impl Fetcher for EmptyFetcher {
    async fn links(&self) -> FetchResult<Vec<Link>> {
        Ok(Vec::new())
    }

    async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        Err(FetchError::NotFound(href.to_string()))
    }
}
