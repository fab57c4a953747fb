//! Readium Web Publication parser: packaged `manifest.json` and W3C LPF `publication.json`

use super::{
    fallback_identifier, parse_date, report, PublicationParser, WarningLogger, AUDIOBOOK_PROFILE,
    DIVINA_PROFILE,
};
use crate::asset::Asset;
use crate::error::{FetchError, ParseError};
use crate::fetcher::{resolve_href, Fetcher};
use crate::mediatype::MediaType;
use crate::publication::{
    Layout, Link, Manifest, Metadata, PublicationBuilder, ReadingProgression, TocEntry,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const MANIFEST_JSON: &str = "manifest.json";
const PUBLICATION_JSON: &str = "publication.json";

/// Parser for Readium Web Publication packages and Lightweight Packaging Format archives
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadiumWebPubParser;

impl ReadiumWebPubParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationParser for ReadiumWebPubParser {
    fn name(&self) -> &str {
        "webpub"
    }

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError> {
        let media_type = asset.media_type().await;

        let mut manifest = if fetcher.contains(MANIFEST_JSON).await? {
            let json = read_json(fetcher, MANIFEST_JSON).await?;
            parse_readium_manifest(&json, MANIFEST_JSON, self.name(), warnings)?
        } else if fetcher.contains(PUBLICATION_JSON).await? {
            let json = read_json(fetcher, PUBLICATION_JSON).await?;
            parse_w3c_manifest(&json, PUBLICATION_JSON)?
        } else if is_standalone_manifest(&media_type) {
            // The asset is the manifest itself, served as the only resource
            let links = fetcher.links().await?;
            let Some(link) = links.first() else {
                return Err(ParseError::InvalidManifest("asset has no content".into()));
            };
            let json = read_json(fetcher, &link.href).await?;
            parse_readium_manifest(&json, &link.href, self.name(), warnings)?
        } else if media_type.is_readium_webpub() {
            return Err(ParseError::InvalidManifest(format!(
                "{} package without {}",
                media_type, MANIFEST_JSON
            )));
        } else {
            return Ok(None);
        };

        if manifest.metadata.identifier.is_none() {
            manifest.metadata.identifier = Some(fallback_identifier(asset.name()));
        }
        if manifest.metadata.conforms_to.is_empty() {
            if let Some(profile) = implied_profile(&media_type) {
                manifest.metadata.conforms_to.push(profile.to_string());
            }
        }

        tracing::debug!(
            title = %manifest.metadata.title,
            reading_order = manifest.reading_order.len(),
            "Parsed web publication manifest"
        );
        Ok(Some(PublicationBuilder::new(manifest, fetcher.clone())))
    }
}

fn is_standalone_manifest(media_type: &MediaType) -> bool {
    [
        MediaType::READIUM_WEBPUB_MANIFEST,
        MediaType::READIUM_AUDIOBOOK_MANIFEST,
        MediaType::DIVINA_MANIFEST,
    ]
    .contains(media_type)
}

fn implied_profile(media_type: &MediaType) -> Option<&'static str> {
    if [
        MediaType::READIUM_AUDIOBOOK,
        MediaType::READIUM_AUDIOBOOK_MANIFEST,
        MediaType::LCP_PROTECTED_AUDIOBOOK,
    ]
    .contains(media_type)
    {
        Some(AUDIOBOOK_PROFILE)
    } else if [MediaType::DIVINA, MediaType::DIVINA_MANIFEST].contains(media_type) {
        Some(DIVINA_PROFILE)
    } else {
        None
    }
}

async fn read_json(fetcher: &Arc<dyn Fetcher>, href: &str) -> Result<String, ParseError> {
    fetcher.read_to_string(href).await.map_err(|e| match e {
        FetchError::Other(msg) => ParseError::InvalidManifest(msg),
        other => ParseError::Fetch(other),
    })
}

/// A string, or a map of language tags to translations
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocalizedString {
    Plain(String),
    Translations(BTreeMap<String, String>),
}

impl LocalizedString {
    fn value(&self) -> Option<&str> {
        match self {
            LocalizedString::Plain(value) => Some(value.as_str()),
            LocalizedString::Translations(map) => ["en", "und"]
                .iter()
                .find_map(|lang| map.get(*lang))
                .or_else(|| map.values().next())
                .map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// A contributor or subject: a bare name or an object with a `name`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Named {
    Object { name: LocalizedString },
    Name(LocalizedString),
}

impl Named {
    fn name(&self) -> Option<String> {
        match self {
            Named::Object { name } | Named::Name(name) => name.value().map(str::to_string),
        }
    }
}

fn names(values: OneOrMany<Named>) -> Vec<String> {
    values.into_vec().iter().filter_map(Named::name).collect()
}

#[derive(Debug, Default, Deserialize)]
struct Presentation {
    layout: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    identifier: Option<String>,
    title: Option<LocalizedString>,
    #[serde(default)]
    author: OneOrMany<Named>,
    #[serde(default)]
    subject: OneOrMany<Named>,
    #[serde(default)]
    language: OneOrMany<String>,
    #[serde(default)]
    publisher: OneOrMany<Named>,
    description: Option<String>,
    published: Option<String>,
    reading_progression: Option<String>,
    layout: Option<String>,
    #[serde(default)]
    presentation: Presentation,
    number_of_pages: Option<u32>,
    #[serde(default)]
    conforms_to: OneOrMany<String>,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    href: String,
    #[serde(rename = "type")]
    media_type: Option<String>,
    title: Option<String>,
    #[serde(default)]
    rel: OneOrMany<String>,
    #[serde(default)]
    properties: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    children: Vec<WireLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireManifest {
    metadata: WireMetadata,
    #[serde(default)]
    links: Vec<WireLink>,
    #[serde(default)]
    reading_order: Vec<WireLink>,
    #[serde(default)]
    resources: Vec<WireLink>,
    #[serde(default)]
    toc: Vec<WireLink>,
}

/// Resolve a manifest href against the manifest location, keeping absolute URLs
fn resolve(base: &str, href: &str) -> Option<String> {
    if href.contains("://") {
        return Some(href.to_string());
    }
    resolve_href(base, href)
}

fn link(base: &str, wire: WireLink) -> Option<Link> {
    let href = resolve(base, &wire.href)?;
    let mut link = Link::new(href);
    link.media_type = wire
        .media_type
        .as_deref()
        .and_then(MediaType::parse)
        .or_else(|| MediaType::of_path(&link.href));
    link.title = wire.title;
    link.rels = wire.rel.into_vec();
    link.properties = wire.properties;
    Some(link)
}

fn toc_entry(base: &str, wire: WireLink) -> Option<TocEntry> {
    let href = resolve(base, &wire.href)?;
    let children = wire
        .children
        .into_iter()
        .filter_map(|child| toc_entry(base, child))
        .collect();
    Some(TocEntry::new(wire.title.unwrap_or_default(), href).with_children(children))
}

fn links(base: &str, wires: Vec<WireLink>) -> Vec<Link> {
    wires.into_iter().filter_map(|wire| link(base, wire)).collect()
}

fn parse_readium_manifest(
    json: &str,
    manifest_href: &str,
    parser: &str,
    warnings: Option<&dyn WarningLogger>,
) -> Result<Manifest, ParseError> {
    let wire: WireManifest = serde_json::from_str(json)
        .map_err(|e| ParseError::InvalidManifest(format!("{}: {}", manifest_href, e)))?;
    let wire_metadata = wire.metadata;

    let title = wire_metadata
        .title
        .as_ref()
        .and_then(LocalizedString::value)
        .ok_or_else(|| ParseError::MissingField("metadata.title".into()))?;

    let mut metadata = Metadata::new(title);
    metadata.identifier = wire_metadata.identifier;
    metadata.creator = names(wire_metadata.author);
    metadata.subject = names(wire_metadata.subject);
    metadata.language = wire_metadata.language.into_vec().into_iter().next();
    metadata.publisher = names(wire_metadata.publisher).into_iter().next();
    metadata.description = wire_metadata.description;
    metadata.published = wire_metadata.published.as_deref().and_then(|date| {
        let parsed = parse_date(date);
        if parsed.is_none() {
            report(warnings, parser, format!("Unrecognized publication date {:?}", date));
        }
        parsed
    });
    metadata.reading_progression = match wire_metadata.reading_progression.as_deref() {
        Some("ltr") => ReadingProgression::Ltr,
        Some("rtl") => ReadingProgression::Rtl,
        Some("ttb") => ReadingProgression::Ttb,
        Some("btt") => ReadingProgression::Btt,
        _ => ReadingProgression::Auto,
    };
    let layout = wire_metadata.layout.or(wire_metadata.presentation.layout);
    metadata.layout = match layout.as_deref() {
        Some("fixed") => Layout::Fixed,
        Some("scrolled") => Layout::Scrolled,
        _ => Layout::Reflowable,
    };
    metadata.number_of_pages = wire_metadata.number_of_pages;
    metadata.conforms_to = wire_metadata.conforms_to.into_vec();

    let reading_order = links(manifest_href, wire.reading_order);
    if reading_order.is_empty() {
        return Err(ParseError::InvalidManifest(format!(
            "{}: readingOrder is empty",
            manifest_href
        )));
    }

    Ok(Manifest {
        metadata,
        links: links(manifest_href, wire.links),
        reading_order,
        resources: links(manifest_href, wire.resources),
        toc: wire
            .toc
            .into_iter()
            .filter_map(|entry| toc_entry(manifest_href, entry))
            .collect(),
    })
}

/// A W3C publication manifest resource: a bare URL or a link object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum W3cResource {
    Url(String),
    #[serde(rename_all = "camelCase")]
    Object {
        url: String,
        encoding_format: Option<String>,
        name: Option<LocalizedString>,
    },
}

impl W3cResource {
    fn into_link(self, base: &str) -> Option<Link> {
        match self {
            W3cResource::Url(url) => {
                let href = resolve(base, &url)?;
                let media_type = MediaType::of_path(&href);
                let mut link = Link::new(href);
                link.media_type = media_type;
                Some(link)
            }
            W3cResource::Object {
                url,
                encoding_format,
                name,
            } => {
                let href = resolve(base, &url)?;
                let mut link = Link::new(href);
                link.media_type = encoding_format
                    .as_deref()
                    .and_then(MediaType::parse)
                    .or_else(|| MediaType::of_path(&link.href));
                link.title = name.as_ref().and_then(LocalizedString::value).map(str::to_string);
                Some(link)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct W3cManifest {
    id: Option<String>,
    name: Option<LocalizedString>,
    #[serde(default)]
    author: OneOrMany<Named>,
    #[serde(default)]
    in_language: OneOrMany<String>,
    date_published: Option<String>,
    reading_progression: Option<String>,
    #[serde(default)]
    reading_order: Vec<W3cResource>,
    #[serde(default)]
    resources: Vec<W3cResource>,
}

fn parse_w3c_manifest(json: &str, manifest_href: &str) -> Result<Manifest, ParseError> {
    let wire: W3cManifest = serde_json::from_str(json)
        .map_err(|e| ParseError::InvalidManifest(format!("{}: {}", manifest_href, e)))?;

    let title = wire
        .name
        .as_ref()
        .and_then(LocalizedString::value)
        .ok_or_else(|| ParseError::MissingField("name".into()))?;
    let mut metadata = Metadata::new(title);
    metadata.identifier = wire.id;
    metadata.creator = names(wire.author);
    metadata.language = wire.in_language.into_vec().into_iter().next();
    metadata.published = wire.date_published.as_deref().and_then(parse_date);
    metadata.reading_progression = match wire.reading_progression.as_deref() {
        Some("rtl") => ReadingProgression::Rtl,
        Some("ltr") => ReadingProgression::Ltr,
        _ => ReadingProgression::Auto,
    };

    let reading_order: Vec<Link> = wire
        .reading_order
        .into_iter()
        .filter_map(|r| r.into_link(manifest_href))
        .collect();
    if reading_order.is_empty() {
        return Err(ParseError::InvalidManifest(format!(
            "{}: readingOrder is empty",
            manifest_href
        )));
    }

    let mut manifest = Manifest::new(metadata);
    manifest.reading_order = reading_order;
    manifest.resources = wire
        .resources
        .into_iter()
        .filter_map(|r| r.into_link(manifest_href))
        .collect();
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::BytesAsset;
    use crate::fetcher::MemoryFetcher;

    const AUDIOBOOK: &str = r#"{
        "@context": "https://readium.org/webpub-manifest/context.jsonld",
        "metadata": {
            "@type": "http://schema.org/Audiobook",
            "identifier": "urn:isbn:9780000000001",
            "title": {"fr": "Le Voyage", "en": "The Voyage"},
            "author": [{"name": "Jane Doe"}, "John Roe"],
            "language": ["en", "fr"],
            "readingProgression": "ltr",
            "published": "2019-03-01"
        },
        "links": [{"rel": "self", "href": "manifest.json", "type": "application/audiobook+json"}],
        "readingOrder": [
            {"href": "audio/01.mp3", "type": "audio/mpeg", "title": "Opening"},
            {"href": "audio/02.mp3", "type": "audio/mpeg"}
        ],
        "resources": [{"href": "cover.jpg", "rel": "cover"}],
        "toc": [{"href": "audio/01.mp3", "title": "Opening", "children": [
            {"href": "audio/01.mp3#t=30", "title": "Later"}
        ]}]
    }"#;

    fn package(manifest: &str) -> Arc<dyn Fetcher> {
        Arc::new(
            MemoryFetcher::new()
                .with_resource(MANIFEST_JSON, manifest.to_string())
                .with_resource("audio/01.mp3", "ID3")
                .with_resource("audio/02.mp3", "ID3"),
        )
    }

    #[tokio::test]
    async fn test_parse_packaged_manifest() {
        let asset = BytesAsset::new("voyage.audiobook", Vec::new())
            .with_media_type(MediaType::READIUM_AUDIOBOOK);
        let builder = ReadiumWebPubParser
            .parse(&asset, &package(AUDIOBOOK), None)
            .await
            .unwrap()
            .unwrap();
        let manifest = builder.manifest;

        assert_eq!(manifest.metadata.title, "The Voyage");
        assert_eq!(manifest.metadata.creator, vec!["Jane Doe", "John Roe"]);
        assert_eq!(manifest.metadata.language.as_deref(), Some("en"));
        assert_eq!(manifest.metadata.reading_progression, ReadingProgression::Ltr);
        assert!(manifest.conforms_to(AUDIOBOOK_PROFILE));
        assert_eq!(manifest.reading_order.len(), 2);
        assert_eq!(manifest.reading_order[0].media_type, Some(MediaType::MP3));
        assert_eq!(manifest.reading_order[0].title.as_deref(), Some("Opening"));
        assert!(manifest.link_with_rel("cover").is_some());
        assert_eq!(manifest.toc[0].children[0].title, "Later");
    }

    #[tokio::test]
    async fn test_missing_title_is_an_error() {
        let asset = BytesAsset::new("book.webpub", Vec::new());
        let fetcher = package(r#"{"metadata": {}, "readingOrder": [{"href": "a.html"}]}"#);
        let result = ReadiumWebPubParser.parse(&asset, &fetcher, None).await;
        assert!(matches!(result, Err(ParseError::MissingField(_))));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let asset = BytesAsset::new("book.webpub", Vec::new());
        let result = ReadiumWebPubParser.parse(&asset, &package("{not json"), None).await;
        assert!(matches!(result, Err(ParseError::InvalidManifest(_))));
    }

    #[tokio::test]
    async fn test_lpf_publication() {
        let publication = r#"{
            "@context": ["https://schema.org", "https://www.w3.org/ns/pub-context"],
            "conformsTo": "https://www.w3.org/TR/audiobooks/",
            "id": "urn:uuid:lpf-1",
            "name": "Field Recordings",
            "inLanguage": "en",
            "readingOrder": ["track1.mp3", {"url": "track2.mp3", "encodingFormat": "audio/mpeg", "name": "Second"}]
        }"#;
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(MemoryFetcher::new().with_resource(PUBLICATION_JSON, publication));
        let asset = BytesAsset::new("field.lpf", Vec::new()).with_media_type(MediaType::LPF);

        let builder = ReadiumWebPubParser.parse(&asset, &fetcher, None).await.unwrap().unwrap();
        assert_eq!(builder.manifest.metadata.title, "Field Recordings");
        assert_eq!(builder.manifest.metadata.identifier.as_deref(), Some("urn:uuid:lpf-1"));
        assert_eq!(builder.manifest.reading_order[1].title.as_deref(), Some("Second"));
    }

    #[tokio::test]
    async fn test_unrelated_asset_is_skipped() {
        let asset = BytesAsset::new("notes.txt", b"hello".to_vec());
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(MemoryFetcher::new().with_resource("notes.txt", "hello"));
        assert!(ReadiumWebPubParser.parse(&asset, &fetcher, None).await.unwrap().is_none());
    }
}
