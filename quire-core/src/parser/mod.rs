//! Publication parsers: turn an (asset, fetcher) pair into a publication builder

mod audio;
mod epub;
mod image;
mod pdf;
mod webpub;

pub use audio::AudioParser;
pub use epub::EpubParser;
pub use image::ImageParser;
pub use pdf::{LopdfDocumentFactory, PdfDocument, PdfDocumentFactory, PdfParser};
pub use webpub::ReadiumWebPubParser;

use crate::asset::Asset;
use crate::error::ParseError;
use crate::fetcher::Fetcher;
use crate::mediatype::{is_hidden, MediaType};
use crate::publication::{Link, PublicationBuilder};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

pub(crate) const AUDIOBOOK_PROFILE: &str = "https://readium.org/webpub-manifest/profiles/audiobook";
pub(crate) const DIVINA_PROFILE: &str = "https://readium.org/webpub-manifest/profiles/divina";

/// A format parser
///
/// `Ok(None)` means the asset is not in this parser's format and resolution
/// moves on to the next parser. `Err(_)` means the format was recognized but
/// the content could not be decoded, which aborts the opening.
#[async_trait]
pub trait PublicationParser: Send + Sync {
    /// Name used in logs and warnings
    fn name(&self) -> &str;

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError>;
}

/// A non-fatal problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserWarning {
    /// Parser reporting the warning
    pub parser: String,
    pub message: String,
}

impl std::fmt::Display for ParserWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.parser, self.message)
    }
}

/// Sink for non-fatal parser warnings
pub trait WarningLogger: Send + Sync {
    fn log(&self, warning: ParserWarning);
}

/// Warning logger collecting every warning in memory
#[derive(Debug, Default)]
pub struct ListWarningLogger {
    warnings: Mutex<Vec<ParserWarning>>,
}

impl ListWarningLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the warnings collected so far
    pub fn warnings(&self) -> Vec<ParserWarning> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.lock().map(|w| w.is_empty()).unwrap_or(true)
    }
}

impl WarningLogger for ListWarningLogger {
    fn log(&self, warning: ParserWarning) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(warning);
        }
    }
}

/// Forward a warning to the caller's logger and to the trace log
pub(crate) fn report(
    warnings: Option<&dyn WarningLogger>,
    parser: &str,
    message: impl Into<String>,
) {
    let message = message.into();
    tracing::warn!(parser, "{}", message);
    if let Some(logger) = warnings {
        logger.log(ParserWarning {
            parser: parser.to_string(),
            message,
        });
    }
}

/// Stable identifier for publications whose format carries none
pub(crate) fn fallback_identifier(asset_name: &str) -> String {
    let digest = Sha256::digest(asset_name.as_bytes());
    format!("urn:sha256:{}", hex::encode(digest))
}

/// Title derived from the asset name (`Some Book.cbz` -> `Some Book`)
pub(crate) fn title_from_name(asset_name: &str) -> String {
    let file_name = asset_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(asset_name);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Parse a publication date: full timestamp, calendar date, year and month, or bare year
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok())
        .or_else(|| {
            value
                .parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        })?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Non-hidden resources of a fetcher, sorted by href
pub(crate) async fn content_links(fetcher: &Arc<dyn Fetcher>) -> Result<Vec<Link>, ParseError> {
    let mut links: Vec<Link> = fetcher
        .links()
        .await?
        .into_iter()
        .filter(|link| !is_hidden(&link.href))
        .collect();
    links.sort_by(|a, b| a.href.cmp(&b.href));
    Ok(links)
}

/// Content links matching `is_content`, and every other non-hidden link, both sorted by href
pub(crate) async fn split_content(
    fetcher: &Arc<dyn Fetcher>,
    is_content: fn(&MediaType) -> bool,
) -> Result<(Vec<Link>, Vec<Link>), ParseError> {
    Ok(content_links(fetcher)
        .await?
        .into_iter()
        .partition(|link| link.resolved_media_type().is_some_and(|m| is_content(&m))))
}

/// Parsers tried after the caller's, in order
pub fn default_parsers(
    pdf_factory: Arc<dyn PdfDocumentFactory>,
) -> Vec<Arc<dyn PublicationParser>> {
    let parsers: [Arc<dyn PublicationParser>; 5] = [
        Arc::new(EpubParser::new()),
        Arc::new(PdfParser::new(pdf_factory)),
        Arc::new(ReadiumWebPubParser::new()),
        Arc::new(ImageParser::new()),
        Arc::new(AudioParser::new()),
    ];
    parsers.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MemoryFetcher;

    #[test]
    fn test_fallback_identifier_is_stable() {
        let id = fallback_identifier("comic.cbz");
        assert_eq!(id, fallback_identifier("comic.cbz"));
        assert_ne!(id, fallback_identifier("other.cbz"));
        assert!(id.starts_with("urn:sha256:"));
        assert_eq!(id.len(), "urn:sha256:".len() + 64);
    }

    #[test]
    fn test_title_from_name() {
        assert_eq!(title_from_name("Some Book.cbz"), "Some Book");
        assert_eq!(title_from_name("/library/comics/issue-1.cbz"), "issue-1");
        assert_eq!(title_from_name(".hidden"), ".hidden");
        assert_eq!(title_from_name("noext"), "noext");
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2020-01-02T03:04:05Z").is_some());
        assert_eq!(
            parse_date("1999").map(|d| d.format("%Y-%m-%d").to_string()).as_deref(),
            Some("1999-01-01")
        );
        assert_eq!(
            parse_date("2004-07").map(|d| d.format("%Y-%m-%d").to_string()).as_deref(),
            Some("2004-07-01")
        );
        assert!(parse_date("someday").is_none());
    }

    #[test]
    fn test_list_warning_logger() {
        let logger = ListWarningLogger::new();
        assert!(logger.is_empty());
        report(Some(&logger), "epub", "missing title");
        report(None, "epub", "dropped");

        let warnings = logger.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].to_string(), "[epub] missing title");
    }

    #[tokio::test]
    async fn test_content_links_sorted_and_filtered() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            MemoryFetcher::new()
                .with_resource("b.png", "b")
                .with_resource(".DS_Store", "")
                .with_resource("__MACOSX/a.png", "")
                .with_resource("a.png", "a"),
        );
        let hrefs: Vec<String> = content_links(&fetcher)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.href)
            .collect();
        assert_eq!(hrefs, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_default_parser_order() {
        let names: Vec<String> = default_parsers(Arc::new(LopdfDocumentFactory))
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["epub", "pdf", "webpub", "image", "audio"]);
    }
}
