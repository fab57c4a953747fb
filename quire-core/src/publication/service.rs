//! Pluggable capabilities attached to a finalized publication

use super::{Link, Manifest};
use crate::fetcher::Fetcher;
use std::any::Any;
use std::sync::Arc;

/// What a service factory gets to see when the publication is built
pub struct ServiceContext<'a> {
    pub manifest: &'a Manifest,
    pub fetcher: &'a Arc<dyn Fetcher>,
}

/// A capability attached to a publication (search, protection info, positions...)
pub trait PublicationService: Send + Sync + 'static {
    /// Key under which the service is registered
    fn name(&self) -> &str;

    /// Links to resources the service exposes
    fn links(&self) -> Vec<Link> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Creates a service once the manifest and fetcher are final; `None` skips it
pub type ServiceFactory =
    Arc<dyn Fn(&ServiceContext<'_>) -> Option<Box<dyn PublicationService>> + Send + Sync>;

/// Ordered set of service factories, keyed by service name
#[derive(Clone, Default)]
pub struct ServicesBuilder {
    factories: Vec<(String, ServiceFactory)>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing in place any factory with the same name
    pub fn set(&mut self, name: impl Into<String>, factory: ServiceFactory) {
        let name = name.into();
        match self.factories.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name, factory)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ServiceFactory> {
        let idx = self.factories.iter().position(|(n, _)| n == name)?;
        Some(self.factories.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub(crate) fn build(self, context: &ServiceContext<'_>) -> Vec<Box<dyn PublicationService>> {
        self.factories
            .into_iter()
            .filter_map(|(_, factory)| factory(context))
            .collect()
    }
}

/// Describes the content protection of a publication
#[derive(Debug, Clone, PartialEq)]
pub struct ContentProtectionService {
    /// Identifier of the protection scheme
    pub scheme: String,

    /// Human-readable name of the scheme
    pub scheme_name: String,

    /// Whether the publication content cannot be read
    pub is_restricted: bool,

    /// Why the publication is restricted, if known
    pub error: Option<String>,
}

impl ContentProtectionService {
    pub const NAME: &'static str = "content-protection";

    /// Factory producing a restricted service for a scheme this reader cannot unlock
    pub fn restricted_factory(scheme: &str, scheme_name: &str) -> ServiceFactory {
        let service = ContentProtectionService {
            scheme: scheme.to_string(),
            scheme_name: scheme_name.to_string(),
            is_restricted: true,
            error: Some(format!("{} protected publications are not supported", scheme_name)),
        };
        Arc::new(
            move |_: &ServiceContext<'_>| -> Option<Box<dyn PublicationService>> {
                Some(Box::new(service.clone()))
            },
        )
    }
}

impl PublicationService for ContentProtectionService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
