//! Media types and best-effort format sniffing

use mime::Mime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// A media type reduced to its essence (`type/subtype`, lowercase, no parameters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaType(Cow<'static, str>);

impl MediaType {
    pub const AAC: MediaType = MediaType::from_static("audio/aac");
    pub const AVIF: MediaType = MediaType::from_static("image/avif");
    pub const BMP: MediaType = MediaType::from_static("image/bmp");
    pub const CBZ: MediaType = MediaType::from_static("application/vnd.comicbook+zip");
    pub const CSS: MediaType = MediaType::from_static("text/css");
    pub const DIVINA: MediaType = MediaType::from_static("application/divina+zip");
    pub const DIVINA_MANIFEST: MediaType = MediaType::from_static("application/divina+json");
    pub const EPUB: MediaType = MediaType::from_static("application/epub+zip");
    pub const FLAC: MediaType = MediaType::from_static("audio/flac");
    pub const GIF: MediaType = MediaType::from_static("image/gif");
    pub const HTML: MediaType = MediaType::from_static("text/html");
    pub const JPEG: MediaType = MediaType::from_static("image/jpeg");
    pub const JSON: MediaType = MediaType::from_static("application/json");
    pub const LCP_LICENSE: MediaType =
        MediaType::from_static("application/vnd.readium.lcp.license.v1.0+json");
    pub const LCP_PROTECTED_AUDIOBOOK: MediaType =
        MediaType::from_static("application/audiobook+lcp");
    pub const LCP_PROTECTED_PDF: MediaType = MediaType::from_static("application/pdf+lcp");
    pub const LPF: MediaType = MediaType::from_static("application/lpf+zip");
    pub const MP3: MediaType = MediaType::from_static("audio/mpeg");
    pub const MP4_AUDIO: MediaType = MediaType::from_static("audio/mp4");
    pub const NCX: MediaType = MediaType::from_static("application/x-dtbncx+xml");
    pub const OCTET_STREAM: MediaType = MediaType::from_static("application/octet-stream");
    pub const OGG: MediaType = MediaType::from_static("audio/ogg");
    pub const OPF: MediaType = MediaType::from_static("application/oebps-package+xml");
    pub const OPUS: MediaType = MediaType::from_static("audio/opus");
    pub const PDF: MediaType = MediaType::from_static("application/pdf");
    pub const PNG: MediaType = MediaType::from_static("image/png");
    pub const READIUM_AUDIOBOOK: MediaType = MediaType::from_static("application/audiobook+zip");
    pub const READIUM_AUDIOBOOK_MANIFEST: MediaType =
        MediaType::from_static("application/audiobook+json");
    pub const READIUM_WEBPUB: MediaType = MediaType::from_static("application/webpub+zip");
    pub const READIUM_WEBPUB_MANIFEST: MediaType =
        MediaType::from_static("application/webpub+json");
    pub const SVG: MediaType = MediaType::from_static("image/svg+xml");
    pub const TEXT: MediaType = MediaType::from_static("text/plain");
    pub const TIFF: MediaType = MediaType::from_static("image/tiff");
    pub const WAV: MediaType = MediaType::from_static("audio/wav");
    pub const WEBP: MediaType = MediaType::from_static("image/webp");
    pub const XHTML: MediaType = MediaType::from_static("application/xhtml+xml");
    pub const XML: MediaType = MediaType::from_static("application/xml");
    pub const ZAB: MediaType = MediaType::from_static("application/x.readium.zab+zip");
    pub const ZIP: MediaType = MediaType::from_static("application/zip");

    const fn from_static(essence: &'static str) -> Self {
        MediaType(Cow::Borrowed(essence))
    }

    /// Parse a media type string, dropping any parameters
    pub fn parse(value: &str) -> Option<Self> {
        let mime: Mime = value.trim().parse().ok()?;
        Some(MediaType(Cow::Owned(mime.essence_str().to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn top_level(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    fn subtype(&self) -> &str {
        self.0.split_once('/').map(|(_, sub)| sub).unwrap_or_default()
    }

    /// Whether this is a ZIP container or a ZIP-based format
    pub fn is_zip(&self) -> bool {
        *self == Self::ZIP || self.subtype().ends_with("+zip")
    }

    pub fn is_html(&self) -> bool {
        *self == Self::HTML || *self == Self::XHTML
    }

    /// Raster images (SVG is excluded)
    pub fn is_bitmap(&self) -> bool {
        self.top_level() == "image" && *self != Self::SVG
    }

    pub fn is_audio(&self) -> bool {
        self.top_level() == "audio"
    }

    pub fn is_epub(&self) -> bool {
        *self == Self::EPUB
    }

    pub fn is_pdf(&self) -> bool {
        *self == Self::PDF || *self == Self::LCP_PROTECTED_PDF
    }

    /// Readium Web Publication packages and standalone manifests of every profile
    pub fn is_readium_webpub(&self) -> bool {
        [
            Self::READIUM_WEBPUB,
            Self::READIUM_WEBPUB_MANIFEST,
            Self::READIUM_AUDIOBOOK,
            Self::READIUM_AUDIOBOOK_MANIFEST,
            Self::LCP_PROTECTED_AUDIOBOOK,
            Self::DIVINA,
            Self::DIVINA_MANIFEST,
            Self::LPF,
        ]
        .contains(self)
    }

    /// Guess a media type from a file extension (without the leading dot)
    pub fn of_extension(ext: &str) -> Option<Self> {
        let media_type = match ext.to_ascii_lowercase().as_str() {
            "epub" => Self::EPUB,
            "pdf" => Self::PDF,
            "lcpdf" => Self::LCP_PROTECTED_PDF,
            "cbz" => Self::CBZ,
            "zab" => Self::ZAB,
            "lpf" => Self::LPF,
            "webpub" => Self::READIUM_WEBPUB,
            "audiobook" => Self::READIUM_AUDIOBOOK,
            "lcpa" => Self::LCP_PROTECTED_AUDIOBOOK,
            "divina" => Self::DIVINA,
            "lcpl" => Self::LCP_LICENSE,
            "zip" => Self::ZIP,
            "json" => Self::JSON,
            "opf" => Self::OPF,
            "ncx" => Self::NCX,
            "xml" => Self::XML,
            "html" | "htm" => Self::HTML,
            "xhtml" | "xht" => Self::XHTML,
            "css" => Self::CSS,
            "txt" => Self::TEXT,
            "png" => Self::PNG,
            "jpg" | "jpeg" | "jpe" => Self::JPEG,
            "gif" => Self::GIF,
            "webp" => Self::WEBP,
            "bmp" => Self::BMP,
            "tif" | "tiff" => Self::TIFF,
            "avif" => Self::AVIF,
            "svg" => Self::SVG,
            "mp3" => Self::MP3,
            "m4a" | "m4b" | "mp4" => Self::MP4_AUDIO,
            "aac" => Self::AAC,
            "ogg" | "oga" => Self::OGG,
            "opus" => Self::OPUS,
            "flac" => Self::FLAC,
            "wav" => Self::WAV,
            _ => return None,
        };
        Some(media_type)
    }

    /// Guess a media type from the extension of a path or href
    pub fn of_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::of_extension(ext)
    }

    /// Sniff a media type from the leading bytes of a resource
    pub fn sniff_bytes(bytes: &[u8]) -> Option<Self> {
        const EPUB_MIMETYPE: &[u8] = b"mimetypeapplication/epub+zip";

        if bytes.starts_with(b"%PDF-") {
            return Some(Self::PDF);
        }
        if bytes.starts_with(b"PK\x03\x04") {
            // The EPUB OCF requires an uncompressed `mimetype` first entry,
            // whose name starts at offset 30 of the local file header
            if bytes.len() >= 30 + EPUB_MIMETYPE.len()
                && &bytes[30..30 + EPUB_MIMETYPE.len()] == EPUB_MIMETYPE
            {
                return Some(Self::EPUB);
            }
            return Some(Self::ZIP);
        }
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::PNG);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::JPEG);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::GIF);
        }
        if bytes.starts_with(b"ID3") {
            return Some(Self::MP3);
        }
        let trimmed = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .map(|start| &bytes[start..])
            .unwrap_or_default();
        if trimmed.starts_with(b"{") {
            return Some(Self::JSON);
        }
        None
    }

    /// Refine a generic ZIP media type from the names of its entries
    pub fn sniff_archive_entries<S: AsRef<str>>(entries: &[S]) -> Option<Self> {
        let names: Vec<&str> = entries
            .iter()
            .map(|e| e.as_ref())
            .filter(|name| !name.ends_with('/'))
            .collect();

        if names.contains(&"META-INF/container.xml") {
            return Some(Self::EPUB);
        }
        if names.contains(&"manifest.json") {
            return Some(Self::READIUM_WEBPUB);
        }
        if names.contains(&"publication.json") {
            return Some(Self::LPF);
        }

        let content: Vec<Option<Self>> = names
            .iter()
            .filter(|name| !is_hidden(name))
            .map(|name| Self::of_path(name))
            .collect();
        if content.is_empty() {
            return None;
        }
        if content.iter().all(|mt| mt.as_ref().is_some_and(|m| m.is_bitmap())) {
            return Some(Self::CBZ);
        }
        if content.iter().all(|mt| mt.as_ref().is_some_and(|m| m.is_audio())) {
            return Some(Self::ZAB);
        }
        None
    }
}

/// Hidden archive entries and sidecar files ignored when sniffing content families
pub(crate) fn is_hidden(href: &str) -> bool {
    let file_name = href.rsplit('/').next().unwrap_or(href);
    file_name.starts_with('.') || file_name == "Thumbs.db" || href.starts_with("__MACOSX/")
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MediaType::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid media type: {}", s)))
    }
}
