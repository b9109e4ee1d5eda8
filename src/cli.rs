//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use link_attach_core::{ConverterConfig, ExecutionMode};

/// Turn links into safely named attachments.
///
/// Reads text from arguments or stdin, resolves a file extension for every
/// link found, and prints the attachment list as JSON.
#[derive(Parser, Debug)]
#[command(name = "link-attach")]
#[command(author, version, about)]
pub struct Args {
    /// Text containing links (read from stdin when omitted)
    pub text: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Probe scheduling mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Payload ceiling in MiB (1-1024)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub max_size_mb: Option<u64>,

    /// Bytes sampled by the content sniffer (0 reads the whole body, else 64-1048576)
    #[arg(long, value_parser = parse_sniff_bytes)]
    pub sniff_bytes: Option<u64>,

    /// Skip the extra request that measures the real body size
    #[arg(long)]
    pub no_verify_size: bool,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Total request timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,
}

/// CLI spelling of [`ExecutionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Run every probe at once, best result wins
    Concurrent,
    /// Provider policy decides which probe runs first
    Strategy,
}

impl From<ModeArg> for ExecutionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Concurrent => Self::Concurrent,
            ModeArg::Strategy => Self::StrategyGuided,
        }
    }
}

impl Args {
    /// Applies flags that were given on top of `config`.
    #[must_use]
    pub fn apply_overrides(&self, mut config: ConverterConfig) -> ConverterConfig {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(mb) = self.max_size_mb {
            config.max_size_bytes = mb * 1024 * 1024;
        }
        if let Some(bytes) = self.sniff_bytes {
            config.sniff_prefix_bytes = (bytes > 0).then_some(bytes);
        }
        if self.no_verify_size {
            config.verify_actual_size = false;
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout {
            config.read_timeout_secs = secs;
        }
        config
    }
}

fn parse_sniff_bytes(raw: &str) -> Result<u64, String> {
    let value: u64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a byte count"))?;
    if value == 0 || (64..=1024 * 1024).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0 or 64..=1048576"))
    }
}
