//! Streamer: opens an asset into an enriched publication
//!
//! Opening runs these steps, one at a time:
//!
//! 1. the asset builds its fetcher,
//! 2. content protections are tried in order; the first to claim the asset
//!    may replace both the asset and the fetcher,
//! 3. parsers are tried in order, caller-supplied first, then the defaults,
//! 4. the builder goes through the protection, configuration and per-call
//!    transforms, in that order, and is built,
//! 5. the publication gets its legacy type, layout style and pagination.

use crate::archive::ArchiveFactory;
use crate::asset::{Asset, FetcherDependencies};
use crate::error::OpeningError;
use crate::pagination::{LengthPagination, PaginationService, DEFAULT_CHARS_PER_PAGE};
use crate::parser::{
    default_parsers, LopdfDocumentFactory, PdfDocumentFactory, PublicationParser, WarningLogger,
};
use crate::protection::{
    AdeptFallbackProtection, ContentProtection, InteractionContext, LcpFallbackProtection,
    UnlockRequest,
};
use crate::publication::{
    css_style, BuilderTransform, LegacyTypeTable, Publication, PublicationType,
};
use crate::resolve::first_applicable;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Data-level streamer settings, loadable from configuration files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamerSettings {
    /// Only use the parsers supplied by the caller
    pub ignore_default_parsers: bool,

    /// Bytes of reflowable content per page
    pub chars_per_page: u64,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            ignore_default_parsers: false,
            chars_per_page: DEFAULT_CHARS_PER_PAGE,
        }
    }
}

impl StreamerSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Collaborators and policies of a [`Streamer`]
#[derive(Clone)]
pub struct StreamerConfig {
    parsers: Vec<Arc<dyn PublicationParser>>,
    ignore_default_parsers: bool,
    content_protections: Vec<Arc<dyn ContentProtection>>,
    fetcher_dependencies: FetcherDependencies,
    pdf_factory: Arc<dyn PdfDocumentFactory>,
    on_create_publication: Option<BuilderTransform>,
    pagination: Arc<dyn PaginationService>,
    legacy_types: LegacyTypeTable,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            parsers: Vec::new(),
            ignore_default_parsers: false,
            content_protections: Vec::new(),
            fetcher_dependencies: FetcherDependencies::default(),
            pdf_factory: Arc::new(LopdfDocumentFactory),
            on_create_publication: None,
            pagination: Arc::new(LengthPagination::default()),
            legacy_types: LegacyTypeTable::default(),
        }
    }
}

impl StreamerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with the given settings applied to the defaults
    pub fn from_settings(settings: &StreamerSettings) -> Self {
        Self::default()
            .with_ignore_default_parsers(settings.ignore_default_parsers)
            .with_pagination(Arc::new(LengthPagination::new(settings.chars_per_page)))
    }

    /// Add a parser, tried before the defaults and after the parsers added earlier
    pub fn with_parser(mut self, parser: Arc<dyn PublicationParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn with_ignore_default_parsers(mut self, ignore: bool) -> Self {
        self.ignore_default_parsers = ignore;
        self
    }

    /// Add a content protection, tried after the ones added earlier
    pub fn with_content_protection(mut self, protection: Arc<dyn ContentProtection>) -> Self {
        self.content_protections.push(protection);
        self
    }

    /// Recognize LCP and ADEPT protected publications and open them restricted
    pub fn with_fallback_protections(self) -> Self {
        self.with_content_protection(Arc::new(LcpFallbackProtection::new()))
            .with_content_protection(Arc::new(AdeptFallbackProtection::new()))
    }

    pub fn with_archive_factory(mut self, factory: Arc<dyn ArchiveFactory>) -> Self {
        self.fetcher_dependencies.archive_factory = factory;
        self
    }

    /// PDF factory used by the default PDF parser
    pub fn with_pdf_factory(mut self, factory: Arc<dyn PdfDocumentFactory>) -> Self {
        self.pdf_factory = factory;
        self
    }

    /// Transform applied to every builder, after the protection's and before the per-call one
    pub fn with_on_create_publication(mut self, transform: BuilderTransform) -> Self {
        self.on_create_publication = Some(transform);
        self
    }

    pub fn with_pagination(mut self, pagination: Arc<dyn PaginationService>) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_legacy_types(mut self, table: LegacyTypeTable) -> Self {
        self.legacy_types = table;
        self
    }

    pub fn ignores_default_parsers(&self) -> bool {
        self.ignore_default_parsers
    }

    pub fn legacy_types(&self) -> &LegacyTypeTable {
        &self.legacy_types
    }
}

/// Per-call options of [`Streamer::open`]
#[derive(Clone, Default)]
pub struct OpenOptions {
    /// Whether protections may prompt the user
    ///
    /// When disallowed, a protection failing to unlock the asset does not
    /// abort the opening; parsing goes on with the locked asset.
    pub allow_user_interaction: bool,

    /// Password or passphrase for the archive and the protections
    pub credentials: Option<String>,

    /// UI context handed to protections
    pub context: Option<InteractionContext>,

    /// Transform applied last, to this opening only
    pub on_create_publication: Option<BuilderTransform>,

    /// Sink for non-fatal parser warnings
    pub warnings: Option<Arc<dyn WarningLogger>>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_interaction(mut self, allow: bool) -> Self {
        self.allow_user_interaction = allow;
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_context(mut self, context: InteractionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_on_create_publication(mut self, transform: BuilderTransform) -> Self {
        self.on_create_publication = Some(transform);
        self
    }

    pub fn with_warnings(mut self, warnings: Arc<dyn WarningLogger>) -> Self {
        self.warnings = Some(warnings);
        self
    }
}

/// Opens assets into publications
///
/// A streamer is `Send + Sync` and meant to be shared; concurrent `open`
/// calls only share the parser list, computed on first use.
pub struct Streamer {
    config: StreamerConfig,
    parsers: OnceLock<Vec<Arc<dyn PublicationParser>>>,
}

impl Default for Streamer {
    fn default() -> Self {
        Self::new(StreamerConfig::default())
    }
}

impl Streamer {
    pub fn new(config: StreamerConfig) -> Self {
        Self {
            config,
            parsers: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Parsers in resolution order: the configured ones, then the defaults
    pub fn parsers(&self) -> &[Arc<dyn PublicationParser>] {
        self.parsers.get_or_init(|| {
            let mut parsers = self.config.parsers.clone();
            if !self.config.ignore_default_parsers {
                parsers.extend(default_parsers(self.config.pdf_factory.clone()));
            }
            tracing::debug!(count = parsers.len(), "Initialized parser chain");
            parsers
        })
    }

    /// Open an asset into a publication
    pub async fn open(
        &self,
        asset: Arc<dyn Asset>,
        options: OpenOptions,
    ) -> Result<Publication, OpeningError> {
        tracing::debug!(asset = asset.name(), "Opening asset");
        let fetcher = asset
            .create_fetcher(&self.config.fetcher_dependencies, options.credentials.as_deref())
            .await?;

        let unlocked = {
            let request = UnlockRequest {
                asset: &asset,
                fetcher: &fetcher,
                credentials: options.credentials.as_deref(),
                allow_user_interaction: options.allow_user_interaction,
                context: options.context.as_ref(),
            };
            let request = &request;
            first_applicable(&self.config.content_protections, |protection| async move {
                tracing::debug!(protection = protection.name(), "Trying content protection");
                protection.open(request).await
            })
            .await
        };

        let mut protection_transform = None;
        let (asset, fetcher) = match unlocked {
            None => (asset, fetcher),
            Some(Ok(protected)) => {
                protection_transform = protected.on_create_publication;
                (protected.asset, protected.fetcher)
            }
            Some(Err(e)) if options.allow_user_interaction => return Err(e),
            Some(Err(e)) => {
                tracing::warn!(
                    asset = asset.name(),
                    error = %e,
                    "Content protection failed without user interaction, parsing the locked asset"
                );
                (asset, fetcher)
            }
        };

        let warnings = options.warnings.as_deref();
        let parsed = {
            let asset = asset.as_ref();
            let fetcher = &fetcher;
            first_applicable(self.parsers(), |parser| async move {
                tracing::debug!(parser = parser.name(), "Trying parser");
                parser.parse(asset, fetcher, warnings).await.transpose()
            })
            .await
        };

        let mut builder = match parsed {
            Some(Ok(builder)) => builder,
            Some(Err(e)) => return Err(OpeningError::ParsingFailed(e)),
            None => {
                return Err(OpeningError::UnsupportedFormat(format!(
                    "{} ({})",
                    asset.name(),
                    asset.media_type().await
                )))
            }
        };

        builder.apply(protection_transform.as_ref());
        builder.apply(self.config.on_create_publication.as_ref());
        builder.apply(options.on_create_publication.as_ref());
        let mut publication = builder.build();

        let media_type = asset.media_type().await;
        let publication_type = self.config.legacy_types.classify(&media_type);
        let style = (publication_type == PublicationType::Epub)
            .then(|| css_style(publication.metadata()).to_string());
        publication.set_legacy_properties(publication_type, style);

        let pagination = self.config.pagination.compute(&publication).await;
        publication.set_pagination(pagination);

        tracing::info!(
            asset = asset.name(),
            title = %publication.metadata().title,
            publication_type = %publication_type,
            pages = publication.page_count(),
            restricted = publication.is_restricted(),
            "Opened publication"
        );
        Ok(publication)
    }
}
