//! EPUB parser: container.xml, OPF package document and navigation

use super::{
    fallback_identifier, parse_date, report, title_from_name, PublicationParser, WarningLogger,
};
use crate::asset::Asset;
use crate::error::{FetchError, ParseError};
use crate::fetcher::{resolve_href, Fetcher};
use crate::mediatype::MediaType;
use crate::publication::{
    Layout, Link, Manifest, Metadata, PublicationBuilder, ReadingProgression, TocEntry,
};
use crate::xml::{attribute, local_name, text};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::sync::Arc;

const CONTAINER_XML: &str = "META-INF/container.xml";

/// Parser for EPUB 2 and EPUB 3 publications
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubParser;

impl EpubParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationParser for EpubParser {
    fn name(&self) -> &str {
        "epub"
    }

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError> {
        let has_container = fetcher.contains(CONTAINER_XML).await?;
        if !has_container {
            if asset.media_type().await.is_epub() {
                return Err(ParseError::InvalidEpub(format!("missing {}", CONTAINER_XML)));
            }
            return Ok(None);
        }

        let container = fetcher.read_to_string(CONTAINER_XML).await?;
        let opf_path = parse_container(&container)?;
        let opf = fetcher.read_to_string(&opf_path).await.map_err(|e| match e {
            FetchError::NotFound(_) => {
                ParseError::InvalidEpub(format!("package document {} not found", opf_path))
            }
            other => ParseError::Fetch(other),
        })?;
        let package = parse_package(&opf)?;

        let mut manifest = package.manifest(&opf_path, self.name(), warnings)?;
        if manifest.metadata.title.is_empty() {
            report(warnings, self.name(), "Package document has no title");
            manifest.metadata.title = title_from_name(asset.name());
        }
        if manifest.metadata.identifier.is_none() {
            report(warnings, self.name(), "Package document has no identifier");
            manifest.metadata.identifier = Some(fallback_identifier(asset.name()));
        }

        manifest.toc = match package.navigation(&opf_path) {
            Some(nav) => match read_toc(fetcher, &nav).await {
                Ok(toc) => toc,
                Err(e) => {
                    report(
                        warnings,
                        self.name(),
                        format!("Could not read table of contents {}: {}", nav.href, e),
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        tracing::debug!(
            title = %manifest.metadata.title,
            version = %package.version,
            reading_order = manifest.reading_order.len(),
            "Parsed EPUB package"
        );
        Ok(Some(PublicationBuilder::new(manifest, fetcher.clone())))
    }
}

fn xml_error(e: quick_xml::Error) -> ParseError {
    ParseError::InvalidEpub(format!("XML error: {}", e))
}

/// Path of the package document declared by `container.xml`
fn parse_container(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(ParseError::InvalidEpub("container.xml declares no rootfile".into()))
}

#[derive(Debug, Default)]
struct Item {
    id: String,
    href: String,
    media_type: Option<String>,
    properties: Vec<String>,
}

#[derive(Debug)]
struct ItemRef {
    idref: String,
    linear: bool,
}

/// Package document contents, before href resolution
#[derive(Debug, Default)]
struct Package {
    version: String,
    unique_identifier: Option<String>,
    identifiers: Vec<(Option<String>, String)>,
    titles: Vec<String>,
    creators: Vec<String>,
    subjects: Vec<String>,
    languages: Vec<String>,
    publisher: Option<String>,
    description: Option<String>,
    date: Option<String>,
    rights: Option<String>,
    layout: Option<String>,
    items: Vec<Item>,
    spine: Vec<ItemRef>,
    page_progression: Option<String>,
    ncx_id: Option<String>,
}

/// Dublin Core and `<meta>` elements whose text is captured
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Identifier,
    Title,
    Creator,
    Subject,
    Language,
    Publisher,
    Description,
    Date,
    Rights,
    Layout,
}

fn parse_package(xml: &str) -> Result<Package, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut package = Package::default();
    let mut in_metadata = false;
    let mut seen_package = false;
    let mut field: Option<(Field, Option<String>)> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => {
                        seen_package = true;
                        package.version = attribute(&e, b"version").unwrap_or_default();
                        package.unique_identifier = attribute(&e, b"unique-identifier");
                    }
                    b"metadata" => in_metadata = true,
                    b"spine" => {
                        package.page_progression = attribute(&e, b"page-progression-direction");
                        package.ncx_id = attribute(&e, b"toc");
                    }
                    b"item" => package.items.push(item(&e)),
                    b"itemref" => package.spine.extend(itemref(&e)),
                    local if in_metadata => {
                        let captured = match local {
                            b"identifier" => Some(Field::Identifier),
                            b"title" => Some(Field::Title),
                            b"creator" => Some(Field::Creator),
                            b"subject" => Some(Field::Subject),
                            b"language" => Some(Field::Language),
                            b"publisher" => Some(Field::Publisher),
                            b"description" => Some(Field::Description),
                            b"date" => Some(Field::Date),
                            b"rights" => Some(Field::Rights),
                            b"meta" if attribute(&e, b"property").as_deref()
                                == Some("rendition:layout") =>
                            {
                                Some(Field::Layout)
                            }
                            _ => None,
                        };
                        if let Some(captured) = captured {
                            field = Some((captured, attribute(&e, b"id")));
                            buffer.clear();
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"item" => package.items.push(item(&e)),
                    b"itemref" => package.spine.extend(itemref(&e)),
                    // EPUB 2 style <meta name="..." content="..."/>
                    b"meta" if in_metadata => {
                        if attribute(&e, b"name").as_deref() == Some("rendition:layout") {
                            package.layout = attribute(&e, b"content");
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if field.is_some() => buffer.push_str(&text(&t)),
            Event::CData(t) if field.is_some() => {
                buffer.push_str(&String::from_utf8_lossy(&t));
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }
                if let Some((captured, id)) = field.take() {
                    let value = buffer.trim().to_string();
                    if !value.is_empty() {
                        package.record(captured, id, value);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_package {
        return Err(ParseError::InvalidEpub("no <package> element".into()));
    }
    Ok(package)
}

fn item(e: &quick_xml::events::BytesStart<'_>) -> Item {
    Item {
        id: attribute(e, b"id").unwrap_or_default(),
        href: attribute(e, b"href").unwrap_or_default(),
        media_type: attribute(e, b"media-type"),
        properties: attribute(e, b"properties")
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    }
}

fn itemref(e: &quick_xml::events::BytesStart<'_>) -> Option<ItemRef> {
    Some(ItemRef {
        idref: attribute(e, b"idref")?,
        linear: attribute(e, b"linear").as_deref() != Some("no"),
    })
}

/// Table of contents document and its format
struct Navigation {
    href: String,
    ncx: bool,
}

impl Package {
    fn record(&mut self, field: Field, id: Option<String>, value: String) {
        match field {
            Field::Identifier => self.identifiers.push((id, value)),
            Field::Title => self.titles.push(value),
            Field::Creator => self.creators.push(value),
            Field::Subject => self.subjects.push(value),
            Field::Language => self.languages.push(value),
            Field::Publisher => self.publisher = self.publisher.take().or(Some(value)),
            Field::Description => self.description = self.description.take().or(Some(value)),
            Field::Date => self.date = self.date.take().or(Some(value)),
            Field::Rights => self.rights = self.rights.take().or(Some(value)),
            Field::Layout => self.layout = Some(value),
        }
    }

    /// Identifier referenced by `unique-identifier`, else the first one
    fn identifier(&self) -> Option<String> {
        self.identifiers
            .iter()
            .find(|(id, _)| id.is_some() && *id == self.unique_identifier)
            .or_else(|| self.identifiers.first())
            .map(|(_, value)| value.clone())
    }

    fn link(&self, item: &Item, opf_path: &str) -> Option<Link> {
        let href = resolve_href(opf_path, &item.href)?;
        let mut link = Link::new(href);
        link.media_type = item
            .media_type
            .as_deref()
            .and_then(MediaType::parse)
            .or_else(|| MediaType::of_path(&link.href));
        for property in &item.properties {
            match property.as_str() {
                "nav" => link.rels.push("contents".to_string()),
                "cover-image" => link.rels.push("cover".to_string()),
                _ => {}
            }
        }
        if !item.properties.is_empty() {
            link.properties.insert(
                "epub".to_string(),
                serde_json::json!({ "properties": item.properties }),
            );
        }
        Some(link)
    }

    fn manifest(
        &self,
        opf_path: &str,
        parser: &str,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Manifest, ParseError> {
        if self.spine.is_empty() {
            return Err(ParseError::InvalidEpub("spine is empty".into()));
        }

        let mut metadata = Metadata::new(self.titles.first().cloned().unwrap_or_default());
        metadata.identifier = self.identifier();
        metadata.creator = self.creators.clone();
        metadata.subject = self.subjects.clone();
        metadata.language = self.languages.first().cloned();
        metadata.publisher = self.publisher.clone();
        metadata.description = self.description.clone();
        metadata.rights = self.rights.clone();
        metadata.published = self.date.as_deref().and_then(|date| {
            let parsed = parse_date(date);
            if parsed.is_none() {
                report(warnings, parser, format!("Unrecognized publication date {:?}", date));
            }
            parsed
        });
        metadata.reading_progression = match self.page_progression.as_deref() {
            Some("rtl") => ReadingProgression::Rtl,
            Some("ltr") => ReadingProgression::Ltr,
            _ => ReadingProgression::Auto,
        };
        if self.layout.as_deref() == Some("pre-paginated") {
            metadata.layout = Layout::Fixed;
        }

        let mut reading_order = Vec::new();
        let mut in_spine = HashSet::new();
        for itemref in &self.spine {
            let Some(item) = self.items.iter().find(|i| i.id == itemref.idref) else {
                report(
                    warnings,
                    parser,
                    format!("Spine references unknown item {:?}", itemref.idref),
                );
                continue;
            };
            let Some(mut link) = self.link(item, opf_path) else {
                report(warnings, parser, format!("Item {:?} escapes the container", item.id));
                continue;
            };
            if !itemref.linear {
                link.properties.insert("linear".to_string(), serde_json::json!(false));
            }
            in_spine.insert(item.id.as_str());
            reading_order.push(link);
        }
        if reading_order.is_empty() {
            return Err(ParseError::InvalidEpub("no spine item resolves to a resource".into()));
        }

        let resources = self
            .items
            .iter()
            .filter(|item| !in_spine.contains(item.id.as_str()))
            .filter_map(|item| self.link(item, opf_path))
            .collect();

        Ok(Manifest {
            metadata,
            links: Vec::new(),
            reading_order,
            resources,
            toc: Vec::new(),
        })
    }

    /// EPUB 3 navigation document, else the EPUB 2 NCX
    fn navigation(&self, opf_path: &str) -> Option<Navigation> {
        let nav = self
            .items
            .iter()
            .find(|item| item.properties.iter().any(|p| p == "nav"));
        if let Some(item) = nav {
            return resolve_href(opf_path, &item.href).map(|href| Navigation { href, ncx: false });
        }

        let ncx = self
            .ncx_id
            .as_deref()
            .and_then(|id| self.items.iter().find(|item| item.id == id))
            .or_else(|| {
                self.items
                    .iter()
                    .find(|item| item.media_type.as_deref() == Some(MediaType::NCX.as_str()))
            })?;
        resolve_href(opf_path, &ncx.href).map(|href| Navigation { href, ncx: true })
    }
}

async fn read_toc(
    fetcher: &Arc<dyn Fetcher>,
    nav: &Navigation,
) -> Result<Vec<TocEntry>, ParseError> {
    let document = fetcher.read_to_string(&nav.href).await?;
    let toc = if nav.ncx {
        parse_ncx(&document, &nav.href)
    } else {
        parse_nav(&document, &nav.href)
    };
    toc.map_err(|e| ParseError::MalformedContent(format!("{}: {}", nav.href, e)))
}

/// Attach a finished entry to its parent, or to the roots
fn close_entry(stack: &mut Vec<TocEntry>, roots: &mut Vec<TocEntry>, entry: TocEntry) {
    if entry.title.is_empty() && entry.href.is_empty() && entry.children.is_empty() {
        return;
    }
    match stack.last_mut() {
        Some(parent) => parent.add_child(entry),
        None => roots.push(entry),
    }
}

/// Table of contents from the `<nav epub:type="toc">` of an EPUB 3 navigation document
fn parse_nav(xml: &str, nav_href: &str) -> Result<Vec<TocEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<TocEntry> = Vec::new();
    let mut in_toc = false;
    let mut in_label = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    in_toc = attribute(&e, b"type")
                        .is_some_and(|t| t.split_whitespace().any(|t| t == "toc"));
                }
                b"li" if in_toc => stack.push(TocEntry::new("", "")),
                b"a" | b"span" if in_toc => {
                    in_label = true;
                    if let (Some(entry), Some(href)) = (stack.last_mut(), attribute(&e, b"href")) {
                        entry.href = toc_href(nav_href, &href);
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_label => {
                if let Some(entry) = stack.last_mut() {
                    if !entry.title.is_empty() {
                        entry.title.push(' ');
                    }
                    entry.title.push_str(text(&t).trim());
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"nav" if in_toc => {
                    in_toc = false;
                    while let Some(entry) = stack.pop() {
                        close_entry(&mut stack, &mut roots, entry);
                    }
                }
                b"li" if in_toc => {
                    if let Some(entry) = stack.pop() {
                        close_entry(&mut stack, &mut roots, entry);
                    }
                }
                b"a" | b"span" => in_label = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(roots)
}

/// Table of contents from the `<navMap>` of an EPUB 2 NCX document
fn parse_ncx(xml: &str, ncx_href: &str) -> Result<Vec<TocEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<TocEntry> = Vec::new();
    let mut in_map = false;
    let mut in_label = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navMap" => in_map = true,
                b"navPoint" if in_map => stack.push(TocEntry::new("", "")),
                b"text" if in_map => in_label = true,
                b"content" if in_map => set_ncx_src(&mut stack, &e, ncx_href),
                _ => {}
            },
            Event::Empty(e) if in_map && local_name(e.name().as_ref()) == b"content" => {
                set_ncx_src(&mut stack, &e, ncx_href);
            }
            Event::Text(t) if in_label => {
                if let Some(entry) = stack.last_mut() {
                    if entry.title.is_empty() {
                        entry.title = text(&t).trim().to_string();
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"navMap" => in_map = false,
                b"text" => in_label = false,
                b"navPoint" => {
                    if let Some(entry) = stack.pop() {
                        close_entry(&mut stack, &mut roots, entry);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(roots)
}

fn set_ncx_src(stack: &mut [TocEntry], e: &quick_xml::events::BytesStart<'_>, ncx_href: &str) {
    let (Some(entry), Some(src)) = (stack.last_mut(), attribute(e, b"src")) else {
        return;
    };
    entry.href = toc_href(ncx_href, &src);
}

/// Resolve a navigation target, keeping the fragment normalization drops
fn toc_href(base: &str, href: &str) -> String {
    match resolve_href(base, href) {
        Some(resolved) => match href.find('#') {
            Some(idx) => format!("{}{}", resolved, &href[idx..]),
            None => resolved,
        },
        None => href.to_string(),
    }
}
