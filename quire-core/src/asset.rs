//! Assets: references to the physical storage of a publication

use crate::archive::{list_zip_entries, ArchiveFactory, ArchiveSource, ZipArchiveFactory};
use crate::error::{FetchError, OpeningError};
use crate::fetcher::{FileFetcher, Fetcher, MemoryFetcher};
use crate::mediatype::MediaType;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;

/// Number of leading bytes inspected when sniffing a media type
const SNIFF_LENGTH: u64 = 64;

/// Collaborators an asset may need to build its fetcher
#[derive(Clone)]
pub struct FetcherDependencies {
    pub archive_factory: Arc<dyn ArchiveFactory>,
}

impl Default for FetcherDependencies {
    fn default() -> Self {
        Self {
            archive_factory: Arc::new(ZipArchiveFactory::new()),
        }
    }
}

/// Opaque reference to a publication's physical storage
#[async_trait]
pub trait Asset: Send + Sync {
    /// Name of the asset, typically its file name
    fn name(&self) -> &str;

    /// Best-effort media type of the asset
    async fn media_type(&self) -> MediaType;

    /// Build a fetcher giving access to the resources of the asset
    async fn create_fetcher(
        &self,
        dependencies: &FetcherDependencies,
        credentials: Option<&str>,
    ) -> Result<Arc<dyn Fetcher>, OpeningError>;
}

/// Sniff a media type from leading bytes, archive entries and file name
async fn sniff_media_type(head: &[u8], name: &str, source: ArchiveSource) -> MediaType {
    let by_extension = MediaType::of_path(name);

    match MediaType::sniff_bytes(head) {
        Some(sniffed) if sniffed == MediaType::ZIP => {
            // A specific ZIP-based extension (.cbz, .audiobook...) wins over entry heuristics
            if let Some(ext) = by_extension.filter(|m| m.is_zip() && *m != MediaType::ZIP) {
                return ext;
            }
            match list_zip_entries(source).await {
                Ok(entries) => {
                    MediaType::sniff_archive_entries(&entries).unwrap_or(MediaType::ZIP)
                }
                Err(e) => {
                    tracing::debug!(asset = name, error = %e, "Could not list archive entries");
                    MediaType::ZIP
                }
            }
        }
        Some(sniffed) => sniffed,
        None => by_extension.unwrap_or(MediaType::OCTET_STREAM),
    }
}

/// A publication stored on the local filesystem, as a file or an exploded directory
pub struct FileAsset {
    path: PathBuf,
    name: String,
    media_type_hint: Option<MediaType>,
    sniffed: OnceCell<MediaType>,
}

impl FileAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            media_type_hint: None,
            sniffed: OnceCell::new(),
        }
    }

    /// Skip sniffing and use the given media type
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type_hint = Some(media_type);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn sniff(&self) -> MediaType {
        if tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return self.sniff_directory().await;
        }

        let mut head = Vec::new();
        match tokio::fs::File::open(&self.path).await {
            Ok(file) => {
                if let Err(e) = file.take(SNIFF_LENGTH).read_to_end(&mut head).await {
                    tracing::debug!(path = %self.path.display(), error = %e, "Could not read asset head");
                }
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Could not open asset");
            }
        }

        sniff_media_type(&head, &self.name, ArchiveSource::Path(self.path.clone())).await
    }

    async fn sniff_directory(&self) -> MediaType {
        let exists = |rel: &str| tokio::fs::try_exists(self.path.join(rel));
        if exists("META-INF/container.xml").await.unwrap_or(false) {
            MediaType::EPUB
        } else if exists("manifest.json").await.unwrap_or(false) {
            MediaType::READIUM_WEBPUB
        } else {
            MediaType::OCTET_STREAM
        }
    }
}

#[async_trait]
impl Asset for FileAsset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn media_type(&self) -> MediaType {
        if let Some(hint) = &self.media_type_hint {
            return hint.clone();
        }
        self.sniffed.get_or_init(|| self.sniff()).await.clone()
    }

    async fn create_fetcher(
        &self,
        dependencies: &FetcherDependencies,
        credentials: Option<&str>,
    ) -> Result<Arc<dyn Fetcher>, OpeningError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpeningError::AssetAccessFailed(FetchError::NotFound(
                    self.path.display().to_string(),
                ))
            } else {
                OpeningError::AssetAccessFailed(FetchError::Io(e))
            }
        })?;

        if metadata.is_dir() {
            return Ok(Arc::new(FileFetcher::directory(&self.path)));
        }

        if self.media_type().await.is_zip() {
            let fetcher = dependencies
                .archive_factory
                .open(ArchiveSource::Path(self.path.clone()), credentials)
                .await?;
            return Ok(fetcher);
        }

        Ok(Arc::new(FileFetcher::file(&self.path)))
    }
}

/// A publication held in memory, e.g. received from a stream
pub struct BytesAsset {
    name: String,
    bytes: Bytes,
    media_type_hint: Option<MediaType>,
    sniffed: OnceCell<MediaType>,
}

impl BytesAsset {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            media_type_hint: None,
            sniffed: OnceCell::new(),
        }
    }

    /// Skip sniffing and use the given media type
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type_hint = Some(media_type);
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[async_trait]
impl Asset for BytesAsset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn media_type(&self) -> MediaType {
        if let Some(hint) = &self.media_type_hint {
            return hint.clone();
        }
        self.sniffed
            .get_or_init(|| {
                let head_len = self.bytes.len().min(SNIFF_LENGTH as usize);
                sniff_media_type(
                    &self.bytes[..head_len],
                    &self.name,
                    ArchiveSource::Bytes(self.bytes.clone()),
                )
            })
            .await
            .clone()
    }

    async fn create_fetcher(
        &self,
        dependencies: &FetcherDependencies,
        credentials: Option<&str>,
    ) -> Result<Arc<dyn Fetcher>, OpeningError> {
        if self.media_type().await.is_zip() {
            let fetcher = dependencies
                .archive_factory
                .open(ArchiveSource::Bytes(self.bytes.clone()), credentials)
                .await?;
            return Ok(fetcher);
        }

        Ok(Arc::new(
            MemoryFetcher::new().with_resource(self.name.clone(), self.bytes.to_vec()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpeningErrorKind;
    use crate::test_support::{minimal_epub, zip_bytes};

    #[tokio::test]
    async fn test_bytes_asset_sniffing() {
        let epub = BytesAsset::new("book", minimal_epub("Sniffed"));
        assert_eq!(epub.media_type().await, MediaType::EPUB);

        let pdf = BytesAsset::new("doc", b"%PDF-1.4\n".to_vec());
        assert_eq!(pdf.media_type().await, MediaType::PDF);

        let comic = BytesAsset::new(
            "comic.zip",
            zip_bytes(&[("01.png", b"".as_slice()), ("02.png", b"".as_slice())]),
        );
        assert_eq!(comic.media_type().await, MediaType::CBZ);

        let blob = BytesAsset::new("blob.bin", vec![0u8, 1, 2, 3]);
        assert_eq!(blob.media_type().await, MediaType::OCTET_STREAM);

        let hinted = BytesAsset::new("x", vec![0u8]).with_media_type(MediaType::PDF);
        assert_eq!(hinted.media_type().await, MediaType::PDF);
    }

    #[tokio::test]
    async fn test_bytes_asset_fetchers() {
        let deps = FetcherDependencies::default();

        let epub = BytesAsset::new("book.epub", minimal_epub("Fetched"));
        let fetcher = epub.create_fetcher(&deps, None).await.unwrap();
        assert!(fetcher.contains("META-INF/container.xml").await.unwrap());

        let text = BytesAsset::new("notes.txt", b"hello".to_vec());
        let fetcher = text.create_fetcher(&deps, None).await.unwrap();
        assert_eq!(fetcher.get("notes.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_file_asset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        std::fs::write(&path, minimal_epub("On disk")).unwrap();

        let asset = FileAsset::new(&path);
        assert_eq!(asset.name(), "book.epub");
        assert_eq!(asset.media_type().await, MediaType::EPUB);

        let fetcher = asset
            .create_fetcher(&FetcherDependencies::default(), None)
            .await
            .unwrap();
        assert!(fetcher.contains("mimetype").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_asset() {
        let asset = FileAsset::new("/definitely/not/here.epub");
        let err = asset
            .create_fetcher(&FetcherDependencies::default(), None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), OpeningErrorKind::AssetAccessFailed);
    }
}
