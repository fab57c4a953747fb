//! Quire Core Library
//!
//! This crate opens digital publications. An [`Asset`] is turned into a
//! [`Fetcher`], unlocked by the first applicable [`ContentProtection`],
//! recognized by the first applicable [`PublicationParser`], and finalized
//! into a [`Publication`] enriched with its legacy type and pagination.
//! [`Streamer`] drives the whole pipeline.

pub mod archive;
pub mod asset;
pub mod error;
pub mod fetcher;
pub mod mediatype;
pub mod pagination;
pub mod parser;
pub mod protection;
pub mod publication;
pub mod resolve;
pub mod streamer;

mod xml;

pub use asset::{Asset, BytesAsset, FetcherDependencies, FileAsset};
pub use error::{
    ArchiveError, FetchError, OpeningError, OpeningErrorKind, ParseError, ProtectionError, Result,
};
pub use fetcher::Fetcher;
pub use mediatype::MediaType;
pub use pagination::{Pagination, PaginationInfo, PaginationService};
pub use parser::{ListWarningLogger, ParserWarning, PublicationParser, WarningLogger};
pub use protection::{ContentProtection, ProtectedAsset, UnlockRequest};
pub use publication::{
    BuilderTransform, Layout, Link, Manifest, Metadata, Publication, PublicationBuilder,
    PublicationType, ReadingProgression, TocEntry,
};
pub use streamer::{OpenOptions, Streamer, StreamerConfig, StreamerSettings};

#[cfg(test)]
pub(crate) mod test_support;
