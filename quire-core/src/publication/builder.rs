//! Staging object for a publication that is not finalized yet

use super::service::{ServiceContext, ServicesBuilder};
use super::{Manifest, Publication};
use crate::fetcher::Fetcher;
use std::sync::Arc;

/// Callback allowed to mutate a builder before it is finalized
///
/// Transforms may edit the manifest, wrap or replace the root fetcher, and
/// register service factories.
pub type BuilderTransform = Arc<dyn Fn(&mut PublicationBuilder) + Send + Sync>;

/// Mutable staging object produced by a parser
///
/// `build` takes the builder by value, so a builder is finalized at most once
/// and cannot be used afterwards.
pub struct PublicationBuilder {
    pub manifest: Manifest,
    pub fetcher: Arc<dyn Fetcher>,
    pub services: ServicesBuilder,
}

impl PublicationBuilder {
    pub fn new(manifest: Manifest, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            manifest,
            fetcher,
            services: ServicesBuilder::new(),
        }
    }

    pub fn with_services(mut self, services: ServicesBuilder) -> Self {
        self.services = services;
        self
    }

    /// Run an optional transform on this builder
    pub fn apply(&mut self, transform: Option<&BuilderTransform>) {
        if let Some(transform) = transform {
            transform(self);
        }
    }

    /// Finalize into a publication, instantiating the service factories
    pub fn build(self) -> Publication {
        let services = self.services.build(&ServiceContext {
            manifest: &self.manifest,
            fetcher: &self.fetcher,
        });
        Publication::new(self.manifest, self.fetcher, services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchResult, MemoryFetcher, TransformingFetcher};
    use crate::publication::{ContentProtectionService, Metadata};

    #[tokio::test]
    async fn test_transforms_mutate_builder() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(MemoryFetcher::new().with_resource("a.txt", "abc"));
        let mut builder = PublicationBuilder::new(Manifest::new(Metadata::new("Hooks")), fetcher);

        let retitle: BuilderTransform = Arc::new(|b: &mut PublicationBuilder| {
            b.manifest.metadata.title = "Renamed".to_string();
        });
        let wrap: BuilderTransform = Arc::new(|b: &mut PublicationBuilder| {
            b.fetcher = Arc::new(TransformingFetcher::new(
                b.fetcher.clone(),
                Arc::new(|_: &str, data: Vec<u8>| -> FetchResult<Vec<u8>> {
                    Ok(data.to_ascii_uppercase())
                }),
            ));
            b.services.set(
                ContentProtectionService::NAME,
                ContentProtectionService::restricted_factory("urn:test", "Test"),
            );
        });

        builder.apply(Some(&retitle));
        builder.apply(None);
        builder.apply(Some(&wrap));

        let publication = builder.build();
        assert_eq!(publication.metadata().title, "Renamed");
        assert_eq!(publication.get("a.txt").await.unwrap(), b"ABC");
        assert!(publication.is_restricted());
    }
}
