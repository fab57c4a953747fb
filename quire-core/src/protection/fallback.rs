//! Protections recognizing DRM schemes this crate cannot decrypt
//!
//! They claim the asset so that it opens as a restricted publication
//! instead of failing to parse or exposing ciphertext.

use super::{ContentProtection, ProtectedAsset, UnlockRequest};
use crate::error::{FetchError, OpeningError};
use crate::fetcher::{normalize_href, FetchResult, Fetcher, TransformingFetcher};
use crate::publication::{
    BuilderTransform, ContentProtectionService, Link, PublicationBuilder,
};
use crate::xml::{attribute, local_name};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::sync::Arc;

const ENCRYPTION_XML: &str = "META-INF/encryption.xml";
const ADEPT_NAMESPACE: &str = "http://ns.adobe.com/adept";

/// Font obfuscation algorithms, which are not DRM
const OBFUSCATION_ALGORITHMS: [&str; 2] = [
    "http://www.idpf.org/2008/embedding",
    "http://ns.adobe.com/pdf/enc#RC",
];

/// Readium LCP, recognized by its license document
#[derive(Debug, Default, Clone, Copy)]
pub struct LcpFallbackProtection;

impl LcpFallbackProtection {
    pub const SCHEME: &'static str = "http://readium.org/2014/01/lcp";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentProtection for LcpFallbackProtection {
    fn name(&self) -> &str {
        "lcp-fallback"
    }

    async fn open(
        &self,
        request: &UnlockRequest<'_>,
    ) -> Option<Result<ProtectedAsset, OpeningError>> {
        let fetcher = request.fetcher;
        let licensed = contains(fetcher, "META-INF/license.lcpl").await
            || contains(fetcher, "license.lcpl").await;
        if !licensed {
            return None;
        }

        Some(Ok(restricted(request, Self::SCHEME, "Readium LCP").await))
    }
}

/// Adobe ADEPT, recognized by its rights document or encryption namespace
#[derive(Debug, Default, Clone, Copy)]
pub struct AdeptFallbackProtection;

impl AdeptFallbackProtection {
    pub const SCHEME: &'static str = ADEPT_NAMESPACE;

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentProtection for AdeptFallbackProtection {
    fn name(&self) -> &str {
        "adept-fallback"
    }

    async fn open(
        &self,
        request: &UnlockRequest<'_>,
    ) -> Option<Result<ProtectedAsset, OpeningError>> {
        let fetcher = request.fetcher;
        let protected = if contains(fetcher, "META-INF/rights.xml").await {
            true
        } else {
            match fetcher.read_to_string(ENCRYPTION_XML).await {
                Ok(xml) => xml.contains(ADEPT_NAMESPACE),
                Err(_) => false,
            }
        };
        if !protected {
            return None;
        }

        Some(Ok(restricted(request, Self::SCHEME, "Adobe ADEPT").await))
    }
}

async fn contains(fetcher: &Arc<dyn Fetcher>, href: &str) -> bool {
    fetcher.contains(href).await.unwrap_or(false)
}

/// Keep the asset and fetcher, and install a transform locking the publication
async fn restricted(
    request: &UnlockRequest<'_>,
    scheme: &'static str,
    scheme_name: &'static str,
) -> ProtectedAsset {
    let encrypted = Arc::new(encrypted_resources(request.fetcher).await);
    tracing::info!(
        asset = request.asset.name(),
        scheme = scheme_name,
        encrypted = encrypted.len(),
        "Publication is protected by an unsupported scheme, opening as restricted"
    );

    let transform: BuilderTransform = Arc::new(move |builder: &mut PublicationBuilder| {
        lock_builder(builder, scheme, scheme_name, encrypted.clone());
    });

    ProtectedAsset::new(request.asset.clone(), request.fetcher.clone()).with_transform(transform)
}

fn lock_builder(
    builder: &mut PublicationBuilder,
    scheme: &str,
    scheme_name: &str,
    encrypted: Arc<BTreeMap<String, String>>,
) {
    let manifest = &mut builder.manifest;
    let links = manifest
        .reading_order
        .iter_mut()
        .chain(manifest.resources.iter_mut())
        .chain(manifest.links.iter_mut());
    for link in links {
        mark_encrypted(link, scheme, &encrypted);
    }

    builder.services.set(
        ContentProtectionService::NAME,
        ContentProtectionService::restricted_factory(scheme, scheme_name),
    );

    builder.fetcher = Arc::new(TransformingFetcher::new(
        builder.fetcher.clone(),
        Arc::new(move |href: &str, data: Vec<u8>| -> FetchResult<Vec<u8>> {
            let key = normalize_href(href).unwrap_or_else(|| href.to_string());
            if encrypted.contains_key(&key) {
                Err(FetchError::Forbidden(href.to_string()))
            } else {
                Ok(data)
            }
        }),
    ));
}

fn mark_encrypted(link: &mut Link, scheme: &str, encrypted: &BTreeMap<String, String>) {
    let Some(algorithm) = normalize_href(&link.href).and_then(|href| encrypted.get(&href)) else {
        return;
    };
    link.properties.insert(
        "encrypted".to_string(),
        serde_json::json!({ "scheme": scheme, "algorithm": algorithm }),
    );
}

/// Hrefs of the DRM-encrypted resources listed in `META-INF/encryption.xml`, with their algorithm
async fn encrypted_resources(fetcher: &Arc<dyn Fetcher>) -> BTreeMap<String, String> {
    let xml = match fetcher.read_to_string(ENCRYPTION_XML).await {
        Ok(xml) => xml,
        Err(FetchError::NotFound(_)) => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read encryption.xml");
            return BTreeMap::new();
        }
    };

    match parse_encryption(&xml) {
        Ok(resources) => resources,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed encryption.xml, no resource marked as encrypted");
            BTreeMap::new()
        }
    }
}

fn parse_encryption(xml: &str) -> Result<BTreeMap<String, String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut resources = BTreeMap::new();
    let mut algorithm: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"EncryptedData" => algorithm = None,
                b"EncryptionMethod" => algorithm = attribute(&e, b"Algorithm"),
                b"CipherReference" => {
                    let method = algorithm.clone().unwrap_or_default();
                    if OBFUSCATION_ALGORITHMS.contains(&method.as_str()) {
                        continue;
                    }
                    if let Some(href) = attribute(&e, b"URI").and_then(|uri| normalize_href(&uri)) {
                        resources.insert(href, method);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(resources)
}
