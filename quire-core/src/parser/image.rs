//! Comic archive parser: bitmap-only archives read page by page

use super::{
    fallback_identifier, split_content, title_from_name, PublicationParser, WarningLogger,
    DIVINA_PROFILE,
};
use crate::asset::Asset;
use crate::error::ParseError;
use crate::fetcher::Fetcher;
use crate::mediatype::MediaType;
use crate::publication::{Layout, Manifest, Metadata, PublicationBuilder};
use async_trait::async_trait;
use std::sync::Arc;

/// Parser for CBZ archives and other collections of bitmaps
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageParser;

impl ImageParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationParser for ImageParser {
    fn name(&self) -> &str {
        "image"
    }

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        _warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError> {
        let declared = asset.media_type().await == MediaType::CBZ;
        let (pages, others) = split_content(fetcher, MediaType::is_bitmap).await?;

        if !declared && (pages.is_empty() || !others.is_empty()) {
            return Ok(None);
        }
        if pages.is_empty() {
            return Err(ParseError::MalformedContent(format!(
                "{} contains no images",
                asset.name()
            )));
        }

        let mut metadata = Metadata::new(title_from_name(asset.name()));
        metadata.identifier = Some(fallback_identifier(asset.name()));
        metadata.layout = Layout::Fixed;
        metadata.conforms_to.push(DIVINA_PROFILE.to_string());

        let mut manifest = Manifest::new(metadata);
        manifest.reading_order = pages;
        manifest.resources = others;
        if let Some(first) = manifest.reading_order.first_mut() {
            first.rels.push("cover".to_string());
        }

        tracing::debug!(pages = manifest.reading_order.len(), "Parsed comic archive");
        Ok(Some(PublicationBuilder::new(manifest, fetcher.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::BytesAsset;
    use crate::fetcher::MemoryFetcher;

    #[tokio::test]
    async fn test_pages_sorted_by_href() {
        let asset = BytesAsset::new("Issue 7.cbz", Vec::new()).with_media_type(MediaType::CBZ);
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            MemoryFetcher::new()
                .with_resource("page-10.png", "")
                .with_resource("page-02.png", "")
                .with_resource("ComicInfo.xml", "<ComicInfo/>")
                .with_resource("page-01.jpg", ""),
        );

        let builder = ImageParser.parse(&asset, &fetcher, None).await.unwrap().unwrap();
        let manifest = builder.manifest;
        let hrefs: Vec<&str> = manifest.reading_order.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["page-01.jpg", "page-02.png", "page-10.png"]);
        assert_eq!(manifest.resources[0].href, "ComicInfo.xml");
        assert_eq!(manifest.metadata.title, "Issue 7");
        assert_eq!(manifest.metadata.layout, Layout::Fixed);
        assert!(manifest.reading_order[0].has_rel("cover"));
    }

    #[tokio::test]
    async fn test_mixed_archive_is_skipped() {
        let asset = BytesAsset::new("bundle.zip", Vec::new()).with_media_type(MediaType::ZIP);
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            MemoryFetcher::new()
                .with_resource("cover.png", "")
                .with_resource("notes.txt", ""),
        );
        assert!(ImageParser.parse(&asset, &fetcher, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_declared_comic_without_images() {
        let asset = BytesAsset::new("empty.cbz", Vec::new()).with_media_type(MediaType::CBZ);
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(MemoryFetcher::new().with_resource("readme.txt", ""));
        let result = ImageParser.parse(&asset, &fetcher, None).await;
        assert!(matches!(result, Err(ParseError::MalformedContent(_))));
    }
}
