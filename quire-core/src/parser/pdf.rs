//! PDF parser

use super::{fallback_identifier, report, title_from_name, PublicationParser, WarningLogger};
use crate::asset::Asset;
use crate::error::ParseError;
use crate::fetcher::Fetcher;
use crate::mediatype::MediaType;
use crate::publication::{Layout, Link, Manifest, Metadata, PublicationBuilder};
use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object};
use std::sync::Arc;

const PDF_PROFILE: &str = "https://readium.org/webpub-manifest/profiles/pdf";

/// What the PDF parser needs to know about a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfDocument {
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// Opens PDF documents
#[async_trait]
pub trait PdfDocumentFactory: Send + Sync {
    async fn open(&self, bytes: Vec<u8>, password: Option<&str>)
        -> Result<PdfDocument, ParseError>;
}

/// PDF factory backed by `lopdf`
///
/// Reads the page tree and the document information dictionary. The
/// information of encrypted documents is not decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDocumentFactory;

#[async_trait]
impl PdfDocumentFactory for LopdfDocumentFactory {
    async fn open(
        &self,
        bytes: Vec<u8>,
        _password: Option<&str>,
    ) -> Result<PdfDocument, ParseError> {
        tokio::task::spawn_blocking(move || load_document(&bytes))
            .await
            .map_err(|e| ParseError::InvalidPdf(format!("PDF task failed: {}", e)))?
    }
}

fn load_document(bytes: &[u8]) -> Result<PdfDocument, ParseError> {
    let document = Document::load_mem(bytes)
        .map_err(|e| ParseError::InvalidPdf(format!("Failed to load PDF: {}", e)))?;

    let mut pdf = PdfDocument {
        page_count: document.get_pages().len() as u32,
        ..Default::default()
    };
    if document.is_encrypted() {
        return Ok(pdf);
    }

    if let Some(info) = info_dictionary(&document) {
        pdf.title = info_string(info, b"Title");
        pdf.author = info_string(info, b"Author");
        pdf.subject = info_string(info, b"Subject");
    }
    Ok(pdf)
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = info.get(key).ok()?.as_str().ok()?;
    let value = decode_text_string(bytes);
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, else single-byte
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parser for standalone PDF documents
pub struct PdfParser {
    factory: Arc<dyn PdfDocumentFactory>,
}

impl PdfParser {
    pub fn new(factory: Arc<dyn PdfDocumentFactory>) -> Self {
        Self { factory }
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new(Arc::new(LopdfDocumentFactory))
    }
}

#[async_trait]
impl PublicationParser for PdfParser {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn parse(
        &self,
        asset: &dyn Asset,
        fetcher: &Arc<dyn Fetcher>,
        warnings: Option<&dyn WarningLogger>,
    ) -> Result<Option<PublicationBuilder>, ParseError> {
        if asset.media_type().await != MediaType::PDF {
            return Ok(None);
        }

        let link = pdf_resource(fetcher.links().await?)
            .ok_or_else(|| ParseError::InvalidPdf("no PDF resource in asset".into()))?;

        let bytes = fetcher.get(&link.href).await?;
        let document = self.factory.open(bytes, None).await?;
        if document.page_count == 0 {
            report(warnings, self.name(), "PDF document has no pages");
        }

        let mut metadata = Metadata::new(
            document
                .title
                .clone()
                .unwrap_or_else(|| title_from_name(asset.name())),
        );
        metadata.identifier = Some(fallback_identifier(asset.name()));
        metadata.creator.extend(document.author.clone());
        metadata.description = document.subject.clone();
        metadata.layout = Layout::Fixed;
        metadata.number_of_pages = Some(document.page_count);
        metadata.conforms_to.push(PDF_PROFILE.to_string());

        let mut reading_link = Link::new(link.href).with_media_type(MediaType::PDF);
        reading_link.title = link.title;

        let mut manifest = Manifest::new(metadata);
        manifest.reading_order.push(reading_link);

        tracing::debug!(pages = document.page_count, "Parsed PDF document");
        Ok(Some(PublicationBuilder::new(manifest, fetcher.clone())))
    }
}

/// The resource holding the document: the one typed as PDF, else the only resource
///
/// A sniffed PDF asset served under a name without extension has an untyped link.
fn pdf_resource(links: Vec<Link>) -> Option<Link> {
    if let [_] = links.as_slice() {
        return links.into_iter().next();
    }
    links
        .into_iter()
        .find(|link| link.resolved_media_type().is_some_and(|m| m.is_pdf()))
}
