//! Fetcher over the local filesystem

use super::{normalize_href, FetchResult, Fetcher};
use crate::error::FetchError;
use crate::mediatype::MediaType;
use crate::publication::Link;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Serves either a single file or every file under a directory
pub struct FileFetcher {
    root: PathBuf,
    /// Href of the only resource, when serving a single file
    single: Option<String>,
}

impl FileFetcher {
    /// Serve every file under `root`, with hrefs relative to it
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            single: None,
        }
    }

    /// Serve a single file, addressed by its file name
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let href = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "publication".to_string());
        Self {
            root: path,
            single: Some(href),
        }
    }

    /// Safely resolve an href, preventing path traversal attacks
    fn full_path(&self, href: &str) -> FetchResult<PathBuf> {
        let href = normalize_href(href)
            .ok_or_else(|| FetchError::Forbidden(format!("{} escapes the root", href)))?;

        if let Some(single) = &self.single {
            return if *single == href {
                Ok(self.root.clone())
            } else {
                Err(FetchError::NotFound(href))
            };
        }

        let mut normalized = PathBuf::new();
        for component in Path::new(&href).components() {
            match component {
                Component::Normal(c) => normalized.push(c),
                Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    return Err(FetchError::Forbidden(
                        "Path traversal attempt detected".to_string(),
                    ));
                }
            }
        }

        Ok(self.root.join(normalized))
    }

    fn map_io(href: &str, e: std::io::Error) -> FetchError {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(href.to_string())
        } else {
            FetchError::Io(e)
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn links(&self) -> FetchResult<Vec<Link>> {
        if let Some(single) = &self.single {
            let mut link = Link::new(single.clone());
            link.media_type = MediaType::of_path(single);
            return Ok(vec![link]);
        }

        let mut hrefs = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Self::map_io(&prefix, e))?;

            while let Some(entry) = read_dir.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let href = format!("{}{}", prefix, name);
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), format!("{}/", href)));
                } else {
                    hrefs.push(href);
                }
            }
        }

        hrefs.sort();
        Ok(hrefs
            .into_iter()
            .map(|href| {
                let mut link = Link::new(href);
                link.media_type = MediaType::of_path(&link.href);
                link
            })
            .collect())
    }

    async fn get(&self, href: &str) -> FetchResult<Vec<u8>> {
        let full_path = self.full_path(href)?;
        tokio::fs::read(full_path)
            .await
            .map_err(|e| Self::map_io(href, e))
    }

    async fn length(&self, href: &str) -> FetchResult<u64> {
        let full_path = self.full_path(href)?;
        let metadata = tokio::fs::metadata(full_path)
            .await
            .map_err(|e| Self::map_io(href, e))?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("OEBPS/text")).unwrap();
        std::fs::write(dir.path().join("mimetype"), "application/epub+zip").unwrap();
        std::fs::write(dir.path().join("OEBPS/text/ch1.xhtml"), "<html/>").unwrap();

        let fetcher = FileFetcher::directory(dir.path());

        let hrefs: Vec<String> = fetcher
            .links()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.href)
            .collect();
        assert_eq!(hrefs, vec!["OEBPS/text/ch1.xhtml", "mimetype"]);

        assert_eq!(fetcher.get("/OEBPS/text/ch1.xhtml").await.unwrap(), b"<html/>");
        assert_eq!(fetcher.length("mimetype").await.unwrap(), 20);
        assert!(matches!(
            fetcher.get("missing.xhtml").await,
            Err(FetchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::directory(dir.path());

        assert!(matches!(
            fetcher.get("../etc/passwd").await,
            Err(FetchError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_single_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let fetcher = FileFetcher::file(&path);
        let links = fetcher.links().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "book.pdf");
        assert_eq!(links[0].media_type, Some(MediaType::PDF));

        assert_eq!(fetcher.get("book.pdf").await.unwrap(), b"%PDF-1.4");
        assert!(fetcher.get("other.pdf").await.is_err());
    }
}
