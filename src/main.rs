//! CLI entry point for link-attach.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};
use clap::Parser;
use link_attach_core::{ConverterConfig, LinkConverter, load_file_config};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut config = ConverterConfig::default();
    if let Some(path) = &args.config {
        let file_config = load_file_config(path)?;
        debug!(path = %path.display(), ?file_config, "config file loaded");
        config = config.with_file(&file_config);
    }
    let config = args.apply_overrides(config);

    // Read input: from positional args or stdin
    let input_text = if !args.text.is_empty() {
        args.text.join(" ")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read input from stdin")?;
        buffer
    } else {
        info!("No input provided. Pipe text via stdin or pass it as arguments.");
        info!("Example: echo 'https://example.com/report.pdf' | link-attach");
        String::new()
    };

    let converter = LinkConverter::new(config).context("Failed to build HTTP client")?;
    let outcome = converter.convert(&input_text).await;

    let json = serde_json::to_string_pretty(&outcome)?;
    println!("{json}");
    Ok(())
}
