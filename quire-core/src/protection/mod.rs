//! Content protection: DRM and access-control schemes able to unlock an asset

mod fallback;

pub use fallback::{AdeptFallbackProtection, LcpFallbackProtection};

use crate::asset::Asset;
use crate::error::OpeningError;
use crate::fetcher::Fetcher;
use crate::publication::BuilderTransform;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Opaque UI context handed to protections that may prompt the user
pub type InteractionContext = Arc<dyn Any + Send + Sync>;

/// Result of a successful unlock
pub struct ProtectedAsset {
    /// Asset replacing the protected one
    pub asset: Arc<dyn Asset>,

    /// Fetcher giving access to the unlocked resources
    pub fetcher: Arc<dyn Fetcher>,

    /// Transform applied to the builder before any other
    pub on_create_publication: Option<BuilderTransform>,
}

impl ProtectedAsset {
    pub fn new(asset: Arc<dyn Asset>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            asset,
            fetcher,
            on_create_publication: None,
        }
    }

    pub fn with_transform(mut self, transform: BuilderTransform) -> Self {
        self.on_create_publication = Some(transform);
        self
    }
}

/// Request handed to a content protection
pub struct UnlockRequest<'a> {
    pub asset: &'a Arc<dyn Asset>,
    pub fetcher: &'a Arc<dyn Fetcher>,
    pub credentials: Option<&'a str>,
    pub allow_user_interaction: bool,
    pub context: Option<&'a InteractionContext>,
}

/// A DRM or access-control scheme
#[async_trait]
pub trait ContentProtection: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Try to unlock the asset
    ///
    /// Returns `None` when the asset is not protected by this scheme, and
    /// `Some(Err(_))` when it is but the unlock attempt was rejected.
    async fn open(
        &self,
        request: &UnlockRequest<'_>,
    ) -> Option<Result<ProtectedAsset, OpeningError>>;
}
