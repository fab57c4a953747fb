//! Batch opening command implementation

use super::StreamerArgs;
use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use quire_core::{Asset, FileAsset, MediaType, OpenOptions, Streamer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Open every publication in a directory
pub async fn batch(args: &StreamerArgs, input_dir: &str, jobs: usize) -> Result<()> {
    let input_path = Path::new(input_dir);

    // Find all candidate publications
    let mut files: Vec<PathBuf> = std::fs::read_dir(input_path)
        .with_context(|| format!("Failed to read directory {}", input_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_publication(p))
        .collect();
    files.sort();

    if files.is_empty() {
        println!("No supported files found in {}", input_dir);
        return Ok(());
    }

    println!("Found {} files to open", files.len());

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );

    let streamer = Arc::new(args.build());
    let results: Vec<(PathBuf, Result<usize>)> = stream::iter(files)
        .map(|path| {
            let streamer = streamer.clone();
            async move {
                let result = open_one(&streamer, &path).await;
                (path, result)
            }
        })
        .buffer_unordered(jobs)
        .inspect(|_| progress.inc(1))
        .collect()
        .await;

    progress.finish();

    let mut errors = 0;
    for (path, result) in &results {
        match result {
            Ok(pages) => tracing::info!("Opened {:?} ({} pages)", path, pages),
            Err(e) => {
                errors += 1;
                tracing::error!("Failed to open {:?}: {:#}", path, e);
            }
        }
    }

    println!("\nBatch opening complete:");
    println!("  Success: {}", results.len() - errors);
    println!("  Errors:  {}", errors);

    if errors > 0 {
        bail!("Batch opening completed with {} errors", errors);
    }

    Ok(())
}

fn is_publication(path: &Path) -> bool {
    path.to_str()
        .and_then(MediaType::of_path)
        .is_some_and(|m| m.is_zip() || m.is_pdf() || m.is_readium_webpub())
}

async fn open_one(streamer: &Streamer, path: &Path) -> Result<usize> {
    let asset: Arc<dyn Asset> = Arc::new(FileAsset::new(path));
    let publication = streamer.open(asset, OpenOptions::new()).await?;
    Ok(publication.page_count())
}
