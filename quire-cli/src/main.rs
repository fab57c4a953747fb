//! Quire CLI - Command-line interface for opening and inspecting publications

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::StreamerArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse and validate jobs argument (must be at least 1)
fn parse_jobs(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if n < 1 {
        Err("jobs must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Bytes of reflowable content per page
    #[arg(long, global = true, env = "QUIRE_CHARS_PER_PAGE")]
    chars_per_page: Option<u64>,

    /// Disable the built-in format parsers, so every asset is reported as unsupported
    #[arg(long, global = true)]
    no_default_parsers: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about a publication
    Info {
        /// Input file or directory path
        input: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Password of a protected archive
        #[arg(long)]
        password: Option<String>,
    },

    /// Validate that a publication can be opened
    Validate {
        /// Input file or directory path
        input: String,

        /// Also fail on parser warnings
        #[arg(long)]
        strict: bool,
    },

    /// Open every publication in a directory
    Batch {
        /// Input directory
        input_dir: String,

        /// Number of concurrent openings (must be at least 1)
        #[arg(short, long, default_value = "4", value_parser = parse_jobs)]
        jobs: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "quire_cli=debug,quire_core=debug"
    } else {
        "quire_cli=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = StreamerArgs {
        chars_per_page: cli.chars_per_page,
        no_default_parsers: cli.no_default_parsers,
    };

    match cli.command {
        Commands::Info {
            input,
            json,
            password,
        } => commands::info(&args, &input, json, password).await,

        Commands::Validate { input, strict } => commands::validate(&args, &input, strict).await,

        Commands::Batch { input_dir, jobs } => commands::batch(&args, &input_dir, jobs).await,
    }
}
