//! Legacy publication type classification and layout style

use super::{Metadata, ReadingProgression};
use crate::mediatype::MediaType;
use serde::{Deserialize, Serialize};

/// Coarse publication classification expected by older reading systems
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationType {
    Epub,
    Cbz,
    Audio,
    Divina,
    #[default]
    WebPub,
}

impl std::fmt::Display for PublicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PublicationType::Epub => "epub",
            PublicationType::Cbz => "cbz",
            PublicationType::Audio => "audio",
            PublicationType::Divina => "divina",
            PublicationType::WebPub => "webpub",
        };
        f.write_str(name)
    }
}

/// Ordered media type → publication type rules; the first matching rule wins
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTypeTable {
    rules: Vec<(MediaType, PublicationType)>,
    fallback: PublicationType,
}

impl Default for LegacyTypeTable {
    fn default() -> Self {
        Self {
            rules: vec![
                (MediaType::ZAB, PublicationType::Audio),
                (MediaType::READIUM_AUDIOBOOK, PublicationType::Audio),
                (MediaType::READIUM_AUDIOBOOK_MANIFEST, PublicationType::Audio),
                (MediaType::LCP_PROTECTED_AUDIOBOOK, PublicationType::Audio),
                (MediaType::DIVINA, PublicationType::Divina),
                (MediaType::DIVINA_MANIFEST, PublicationType::Divina),
                (MediaType::CBZ, PublicationType::Cbz),
                (MediaType::EPUB, PublicationType::Epub),
            ],
            fallback: PublicationType::WebPub,
        }
    }
}

impl LegacyTypeTable {
    /// Table with no rules, classifying everything as `fallback`
    pub fn empty(fallback: PublicationType) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Add a rule taking precedence over the existing ones
    pub fn with_rule(mut self, media_type: MediaType, publication_type: PublicationType) -> Self {
        self.rules.insert(0, (media_type, publication_type));
        self
    }

    pub fn classify(&self, media_type: &MediaType) -> PublicationType {
        self.rules
            .iter()
            .find(|(mt, _)| mt == media_type)
            .map(|(_, ty)| *ty)
            .unwrap_or(self.fallback)
    }
}

/// Layout style for reflowable EPUB content, from language and reading progression
pub fn css_style(metadata: &Metadata) -> &'static str {
    let language = metadata
        .language
        .as_deref()
        .and_then(|l| l.split(['-', '_']).next())
        .map(str::to_ascii_lowercase);
    let vertical = matches!(
        metadata.reading_progression,
        ReadingProgression::Rtl | ReadingProgression::Ttb
    );

    match language.as_deref() {
        Some("zh" | "ja" | "ko") if vertical => "cjk-vertical",
        Some("zh" | "ja" | "ko") => "cjk-horizontal",
        Some("ar" | "fa" | "he") => "rtl",
        _ if metadata.reading_progression == ReadingProgression::Rtl => "rtl",
        _ => "ltr",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = LegacyTypeTable::default();
        assert_eq!(table.classify(&MediaType::EPUB), PublicationType::Epub);
        assert_eq!(table.classify(&MediaType::ZAB), PublicationType::Audio);
        assert_eq!(table.classify(&MediaType::DIVINA_MANIFEST), PublicationType::Divina);
        assert_eq!(table.classify(&MediaType::CBZ), PublicationType::Cbz);
        assert_eq!(table.classify(&MediaType::PDF), PublicationType::WebPub);
    }

    #[test]
    fn test_custom_rule_takes_precedence() {
        let table = LegacyTypeTable::default().with_rule(MediaType::EPUB, PublicationType::WebPub);
        assert_eq!(table.classify(&MediaType::EPUB), PublicationType::WebPub);

        let empty = LegacyTypeTable::empty(PublicationType::Epub);
        assert_eq!(empty.classify(&MediaType::PDF), PublicationType::Epub);
    }

    #[test]
    fn test_css_style() {
        assert_eq!(css_style(&Metadata::new("a").with_language("en")), "ltr");
        assert_eq!(css_style(&Metadata::new("a").with_language("ar")), "rtl");
        assert_eq!(
            css_style(
                &Metadata::new("a")
                    .with_language("ja-JP")
                    .with_reading_progression(ReadingProgression::Rtl)
            ),
            "cjk-vertical"
        );
        assert_eq!(css_style(&Metadata::new("a").with_language("zh")), "cjk-horizontal");
        assert_eq!(
            css_style(&Metadata::new("a").with_reading_progression(ReadingProgression::Rtl)),
            "rtl"
        );
    }
}
