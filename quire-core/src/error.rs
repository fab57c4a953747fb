//! Error types for Quire Core

use thiserror::Error;

/// Result type alias using OpeningError
pub type Result<T> = std::result::Result<T, OpeningError>;

/// Terminal error of the publication-opening pipeline
#[derive(Debug, Error)]
pub enum OpeningError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Parsing failed: {0}")]
    ParsingFailed(#[source] ParseError),

    #[error("Protection failed: {0}")]
    ProtectionFailed(#[source] ProtectionError),

    #[error("Asset access failed: {0}")]
    AssetAccessFailed(#[source] FetchError),
}

/// Discriminant of an [`OpeningError`], for callers that only need to branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpeningErrorKind {
    UnsupportedFormat,
    ParsingFailed,
    ProtectionFailed,
    AssetAccessFailed,
}

impl OpeningError {
    pub fn kind(&self) -> OpeningErrorKind {
        match self {
            OpeningError::UnsupportedFormat(_) => OpeningErrorKind::UnsupportedFormat,
            OpeningError::ParsingFailed(_) => OpeningErrorKind::ParsingFailed,
            OpeningError::ProtectionFailed(_) => OpeningErrorKind::ProtectionFailed,
            OpeningError::AssetAccessFailed(_) => OpeningErrorKind::AssetAccessFailed,
        }
    }
}

impl From<ArchiveError> for OpeningError {
    fn from(e: ArchiveError) -> Self {
        OpeningError::AssetAccessFailed(FetchError::Archive(e))
    }
}

/// Errors that occur while reading resources through a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Fetcher error: {0}")]
    Other(String),
}

/// Errors that occur while opening or reading a container
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid archive: {0}")]
    Invalid(String),

    #[error("Archive entry is encrypted and no password was provided")]
    PasswordRequired,

    #[error("Invalid archive password")]
    InvalidPassword,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a parser that recognized its format but could not decode it
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Resource error: {0}")]
    Fetch(#[from] FetchError),
}

/// Errors raised by a content protection that rejected an unlock attempt
#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("License revoked: {0}")]
    LicenseRevoked(String),

    #[error("Unsupported protection: {0}")]
    Unsupported(String),

    #[error("Protection error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_failures() {
        let unsupported = OpeningError::UnsupportedFormat("blob.bin".into());
        let protected = OpeningError::ProtectionFailed(ProtectionError::AuthenticationFailed(
            "bad passphrase".into(),
        ));
        let corrupt = OpeningError::ParsingFailed(ParseError::InvalidEpub("no OPF".into()));

        assert_eq!(unsupported.kind(), OpeningErrorKind::UnsupportedFormat);
        assert_eq!(protected.kind(), OpeningErrorKind::ProtectionFailed);
        assert_eq!(corrupt.kind(), OpeningErrorKind::ParsingFailed);
    }

    #[test]
    fn test_archive_error_is_asset_access() {
        let err: OpeningError = ArchiveError::PasswordRequired.into();
        assert_eq!(err.kind(), OpeningErrorKind::AssetAccessFailed);
        assert!(err.to_string().contains("password"));
    }
}
