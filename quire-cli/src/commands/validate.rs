//! Validate command implementation

use super::StreamerArgs;
use anyhow::{bail, Result};
use quire_core::{Asset, FileAsset, ListWarningLogger, OpenOptions};
use std::sync::Arc;

/// Validate that a publication can be opened
pub async fn validate(args: &StreamerArgs, input: &str, strict: bool) -> Result<()> {
    let streamer = args.build();
    let asset: Arc<dyn Asset> = Arc::new(FileAsset::new(input));
    let media_type = asset.media_type().await;
    let warnings = Arc::new(ListWarningLogger::new());

    let options = OpenOptions::new().with_warnings(warnings.clone());
    match streamer.open(asset, options).await {
        Ok(publication) => {
            println!("Valid publication ({})", media_type);
            println!("  Title: {}", publication.metadata().title);
            println!("  Resources: {}", publication.reading_order().len());
            println!("  Pages: {}", publication.page_count());

            let warnings = warnings.warnings();
            for warning in &warnings {
                println!("  Warning: {}", warning);
            }
            if strict && !warnings.is_empty() {
                bail!("Validation failed for {}: {} warnings", input, warnings.len());
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("Invalid publication ({}): {}", media_type, e);
            bail!("Validation failed for {}", input);
        }
    }
}
