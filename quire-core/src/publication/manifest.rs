//! Manifest types: the structural description of a publication

use crate::mediatype::MediaType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structural description of a publication
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Publication metadata (title, creators, etc.)
    pub metadata: Metadata,

    /// Publication-level links (self, cover, license...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    /// Ordered resources making up the main content
    pub reading_order: Vec<Link>,

    /// Every other resource the publication needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Link>,

    /// Table of contents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toc: Vec<TocEntry>,
}

impl Manifest {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Find a link by href among the links, reading order and resources
    pub fn link_with_href(&self, href: &str) -> Option<&Link> {
        self.links
            .iter()
            .chain(&self.reading_order)
            .chain(&self.resources)
            .find(|link| link.href == href)
    }

    /// First link carrying the given relation
    pub fn link_with_rel(&self, rel: &str) -> Option<&Link> {
        self.links
            .iter()
            .chain(&self.reading_order)
            .chain(&self.resources)
            .find(|link| link.has_rel(rel))
    }

    /// Whether the metadata declares conformance to the given profile
    pub fn conforms_to(&self, profile: &str) -> bool {
        self.metadata.conforms_to.iter().any(|p| p == profile)
    }
}

/// Publication metadata following Dublin Core with reading-system extensions
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unique identifier (ISBN, URN, UUID...)
    pub identifier: Option<String>,

    /// Publication title
    pub title: String,

    /// Authors/creators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creator: Vec<String>,

    /// Subject/genre tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<String>,

    /// Language code (BCP 47)
    pub language: Option<String>,

    pub publisher: Option<String>,

    pub description: Option<String>,

    /// Publication date
    pub published: Option<DateTime<Utc>>,

    /// Copyright/rights information
    pub rights: Option<String>,

    #[serde(default)]
    pub reading_progression: ReadingProgression,

    #[serde(default)]
    pub layout: Layout,

    /// Page count declared by page-based formats (PDF)
    pub number_of_pages: Option<u32>,

    /// Profiles the publication conforms to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conforms_to: Vec<String>,
}

impl Metadata {
    /// Create new metadata with the required title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Add an author/creator
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator.push(creator.into());
        self
    }

    /// Set language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set identifier
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set reading progression
    pub fn with_reading_progression(mut self, progression: ReadingProgression) -> Self {
        self.reading_progression = progression;
        self
    }
}

/// Direction in which the reading order is consumed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingProgression {
    /// Decided by the reading system from the language
    #[default]
    Auto,

    /// Left to right (Latin, Cyrillic, etc.)
    Ltr,

    /// Right to left (Arabic, Hebrew, manga)
    Rtl,

    /// Top to bottom (traditional CJK)
    Ttb,

    /// Bottom to top
    Btt,
}

/// How resources are laid out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Reflowable,
    Fixed,
    Scrolled,
}

/// A reference to a resource of the publication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    /// Path of the resource, relative to the publication root
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "rel", default, skip_serializing_if = "Vec::is_empty")]
    pub rels: Vec<String>,

    /// Free-form properties (encryption, layout overrides...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: None,
            title: None,
            rels: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rels.push(rel.into());
        self
    }

    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r == rel)
    }

    /// Declared media type, or one guessed from the href extension
    pub fn resolved_media_type(&self) -> Option<MediaType> {
        self.media_type
            .clone()
            .or_else(|| MediaType::of_path(&self.href))
    }

    /// Whether a protection marked this resource as encrypted
    pub fn is_encrypted(&self) -> bool {
        self.properties.contains_key("encrypted")
    }
}

/// A single entry in the table of contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TocEntry {
    /// Display title
    pub title: String,

    /// Target resource, optionally with a fragment
    pub href: String,

    /// Child entries for nested TOC
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    /// Create a new TOC entry
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Add child entries
    pub fn with_children(mut self, children: Vec<TocEntry>) -> Self {
        self.children = children;
        self
    }

    /// Add a single child entry
    pub fn add_child(&mut self, child: TocEntry) {
        self.children.push(child);
    }
}
