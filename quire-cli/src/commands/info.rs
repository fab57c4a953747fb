//! Info command implementation

use super::StreamerArgs;
use anyhow::{Context, Result};
use quire_core::{Asset, FileAsset, OpenOptions};
use serde::Serialize;
use std::sync::Arc;

/// Publication info output
#[derive(Serialize)]
struct PublicationInfo {
    title: String,
    authors: Vec<String>,
    language: Option<String>,
    publisher: Option<String>,
    publication_type: String,
    css_style: Option<String>,
    pages: usize,
    restricted: bool,
    reading_order: Vec<String>,
}

/// Display information about a publication
pub async fn info(
    args: &StreamerArgs,
    input: &str,
    json: bool,
    password: Option<String>,
) -> Result<()> {
    let streamer = args.build();
    let asset: Arc<dyn Asset> = Arc::new(FileAsset::new(input));

    let mut options = OpenOptions::new();
    if let Some(password) = password {
        options = options.with_credentials(password);
    }

    let publication = streamer
        .open(asset, options)
        .await
        .with_context(|| format!("Failed to open {}", input))?;

    let metadata = publication.metadata();
    let info = PublicationInfo {
        title: metadata.title.clone(),
        authors: metadata.creator.clone(),
        language: metadata.language.clone(),
        publisher: metadata.publisher.clone(),
        publication_type: publication.publication_type().to_string(),
        css_style: publication.css_style().map(str::to_string),
        pages: publication.page_count(),
        restricted: publication.is_restricted(),
        reading_order: publication
            .reading_order()
            .iter()
            .map(|link| link.href.clone())
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Title:       {}", info.title);
        if !info.authors.is_empty() {
            println!("Authors:     {}", info.authors.join(", "));
        }
        if let Some(language) = &info.language {
            println!("Language:    {}", language);
        }
        if let Some(publisher) = &info.publisher {
            println!("Publisher:   {}", publisher);
        }
        println!("Type:        {}", info.publication_type);
        if let Some(style) = &info.css_style {
            println!("Style:       {}", style);
        }
        println!("Pages:       {}", info.pages);
        if info.restricted {
            println!("Restricted:  yes");
        }
        println!("Reading order:");
        for href in &info.reading_order {
            println!("  {}", href);
        }
    }

    Ok(())
}
