//! Audiobook archive parser: audio-only archives played in href order

use super::{
    fallback_identifier, report, split_content, title_from_name, PublicationParser,
    WarningLogger, AUDIOBOOK_PROFILE,
};
use crate::asset::Asset;
use crate::error::ParseError;
use crate::fetcher::Fetcher;
use crate::mediatype::MediaType;
use crate::publication::{Manifest, Metadata, PublicationBuilder};
use async_trait::async_trait;
use std::sync::Arc;

/// Parser for ZAB archives and other collections of audio files
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioParser;

impl AudioParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationParser for AudioParser {
    fn name(&self) -> &str {
        "audio"
    }

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError> {
        let declared = asset.media_type().await == MediaType::ZAB;
        let (tracks, others) = split_content(fetcher, MediaType::is_audio).await?;

        if !declared && (tracks.is_empty() || !others.is_empty()) {
            return Ok(None);
        }
        if tracks.is_empty() {
            return Err(ParseError::MalformedContent(format!(
                "{} contains no audio files",
                asset.name()
            )));
        }
        for other in &others {
            if !other.resolved_media_type().is_some_and(|m| m.is_bitmap()) {
                report(
                    warnings,
                    self.name(),
                    format!("Unexpected resource {} in audiobook", other.href),
                );
            }
        }

        let mut metadata = Metadata::new(title_from_name(asset.name()));
        metadata.identifier = Some(fallback_identifier(asset.name()));
        metadata.conforms_to.push(AUDIOBOOK_PROFILE.to_string());

        let mut manifest = Manifest::new(metadata);
        manifest.reading_order = tracks;
        manifest.resources = others;

        tracing::debug!(tracks = manifest.reading_order.len(), "Parsed audiobook archive");
        Ok(Some(PublicationBuilder::new(manifest, fetcher.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::BytesAsset;
    use crate::fetcher::MemoryFetcher;
    use crate::parser::ListWarningLogger;

    #[tokio::test]
    async fn test_tracks_in_href_order() {
        let asset = BytesAsset::new("stories.zab", Vec::new()).with_media_type(MediaType::ZAB);
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            MemoryFetcher::new()
                .with_resource("02 - Second.mp3", "")
                .with_resource("01 - First.mp3", "")
                .with_resource("cover.jpg", "")
                .with_resource("playlist.m3u", ""),
        );
        let warnings = ListWarningLogger::new();

        let builder = AudioParser.parse(&asset, &fetcher, Some(&warnings)).await.unwrap().unwrap();
        let manifest = builder.manifest;
        assert_eq!(manifest.reading_order[0].href, "01 - First.mp3");
        assert_eq!(manifest.reading_order[1].href, "02 - Second.mp3");
        assert_eq!(manifest.resources.len(), 2);
        assert!(manifest.conforms_to(AUDIOBOOK_PROFILE));
        assert_eq!(warnings.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_undeclared_audio_collection() {
        let asset = BytesAsset::new("tracks.zip", Vec::new()).with_media_type(MediaType::ZIP);
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            MemoryFetcher::new()
                .with_resource("a.ogg", "")
                .with_resource("b.flac", ""),
        );
        let builder = AudioParser.parse(&asset, &fetcher, None).await.unwrap().unwrap();
        assert_eq!(builder.manifest.reading_order.len(), 2);
        assert_eq!(builder.manifest.metadata.title, "tracks");
    }
}
