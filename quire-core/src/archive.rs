//! Archive factory: opens containers into fetchers

use crate::error::{ArchiveError, FetchError};
use crate::fetcher::{normalize_href, FetchResult, Fetcher};
use crate::mediatype::MediaType;
use crate::publication::Link;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use zip::result::ZipError;
use zip::ZipArchive;

/// Where the bytes of a container live
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    Path(PathBuf),
    Bytes(Bytes),
}

/// Opens a container format into a fetcher
#[async_trait]
pub trait ArchiveFactory: Send + Sync {
    /// Open the container, using `password` for encrypted entries
    async fn open(
        &self,
        source: ArchiveSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn Fetcher>, ArchiveError>;
}

trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

fn open_zip(source: ArchiveSource) -> Result<ZipArchive<Box<dyn ReadSeek>>, ArchiveError> {
    let reader: Box<dyn ReadSeek> = match source {
        ArchiveSource::Path(path) => Box::new(std::fs::File::open(path)?),
        ArchiveSource::Bytes(bytes) => Box::new(Cursor::new(bytes)),
    };
    ZipArchive::new(reader).map_err(map_zip_error)
}

fn map_zip_error(e: ZipError) -> ArchiveError {
    match e {
        ZipError::Io(e) => ArchiveError::Io(e),
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            ArchiveError::PasswordRequired
        }
        other => ArchiveError::Invalid(other.to_string()),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ArchiveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}

/// List the entry names of a ZIP container
pub async fn list_zip_entries(source: ArchiveSource) -> Result<Vec<String>, ArchiveError> {
    blocking(move || {
        let archive = open_zip(source)?;
        Ok(archive.file_names().map(str::to_string).collect())
    })
    .await
}

/// Default archive factory backed by the `zip` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveFactory;

impl ZipArchiveFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveFactory for ZipArchiveFactory {
    async fn open(
        &self,
        source: ArchiveSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn Fetcher>, ArchiveError> {
        let password = password.map(|p| p.as_bytes().to_vec());
        let fetcher = blocking(move || ArchiveFetcher::from_archive(open_zip(source)?, password)).await?;
        tracing::debug!(entries = fetcher.entries.len(), "Opened ZIP archive");
        Ok(Arc::new(fetcher))
    }
}

struct Entry {
    index: usize,
    size: u64,
    link: Link,
}

type SharedArchive = Arc<Mutex<ZipArchive<Box<dyn ReadSeek>>>>;

/// Fetcher over the entries of a ZIP archive
///
/// Entries are decompressed on the blocking thread pool.
pub struct ArchiveFetcher {
    archive: SharedArchive,
    entries: BTreeMap<String, Entry>,
    password: Option<Arc<[u8]>>,
}

impl ArchiveFetcher {
    fn from_archive(
        mut archive: ZipArchive<Box<dyn ReadSeek>>,
        password: Option<Vec<u8>>,
    ) -> Result<Self, ArchiveError> {
        let mut entries = BTreeMap::new();
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(map_zip_error)?;
            if file.is_dir() {
                continue;
            }
            // Entries escaping the archive root are never served
            let Some(href) = normalize_href(file.name()) else {
                continue;
            };
            let mut link = Link::new(href.clone());
            link.media_type = MediaType::of_path(&href);
            entries.insert(
                href,
                Entry {
                    index,
                    size: file.size(),
                    link,
                },
            );
        }

        Ok(Self {
            archive: Arc::new(Mutex::new(archive)),
            entries,
            password: password.map(Arc::from),
        })
    }

    fn entry(&self, href: &str) -> FetchResult<&Entry> {
        normalize_href(href)
            .and_then(|h| self.entries.get(&h))
            .ok_or_else(|| FetchError::NotFound(href.to_string()))
    }

}

fn read_entry(
    archive: &Mutex<ZipArchive<Box<dyn ReadSeek>>>,
    index: usize,
    password: Option<&[u8]>,
) -> Result<Vec<u8>, ArchiveError> {
    let mut archive = archive
        .lock()
        .map_err(|_| ArchiveError::Invalid("archive lock poisoned".to_string()))?;

    let mut file = match password {
        Some(password) => archive
            .by_index_decrypt(index, password)
            .map_err(map_zip_error)?
            .map_err(|_| ArchiveError::InvalidPassword)?,
        None => archive.by_index(index).map_err(map_zip_error)?,
    };

    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

#[async_trait]
impl Fetcher for ArchiveFetcher {
    async fn links(&self) -> FetchResult<Vec<Link>> {
        Ok(self.entries.values().map(|e| e.link.clone()).collect())
    }

    async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        let index = self.entry(href)?.index;
        let archive = self.archive.clone();
        let password = self.password.clone();
        let data = blocking(move || read_entry(&archive, index, password.as_deref())).await?;
        Ok(data)
    }

    async fn length(&self, href: &str) -> FetchResult<u64> {
        Ok(self.entry(href)?.size)
    }

    async fn contains(&self, href: &str) -> FetchResult<bool> {
        Ok(self.entry(href).is_ok())
    }
}
