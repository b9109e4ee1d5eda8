//! Converter configuration: built-in defaults plus an optional TOML file.
//!
//! Precedence is CLI flag > config file > default. The library only knows the
//! file and the defaults; the binary applies flags on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::orchestrator::ExecutionMode;
use crate::probe::DEFAULT_SNIFF_PREFIX_BYTES;
use crate::size_guard::DEFAULT_MAX_SIZE_BYTES;

/// Maximum URLs attempted from one input text.
pub const MAX_BATCH_URLS: usize = 5;

/// Default connect timeout for probe requests.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout for probe requests.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

const BYTES_PER_MB: u64 = 1024 * 1024;
const MIN_SNIFF_PREFIX_BYTES: u64 = 64;
const MAX_SNIFF_PREFIX_BYTES: u64 = 1024 * 1024;

/// Errors raised while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// Path that failed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("Invalid config value for `{field}`: {value}. Expected range: {expected}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Value as written.
        value: String,
        /// Accepted range.
        expected: &'static str,
    },
}

impl ConfigError {
    /// Creates an out-of-range error.
    #[must_use]
    pub fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Effective settings for one converter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterConfig {
    /// Payload ceiling in bytes; larger resources are dropped.
    pub max_size_bytes: u64,
    /// Probe scheduling mode.
    pub mode: ExecutionMode,
    /// Sniff prefix length, or `None` to sniff the full (bounded) body.
    pub sniff_prefix_bytes: Option<u64>,
    /// Measure the real body size when no probe observed it.
    pub verify_actual_size: bool,
    /// URLs attempted per input text.
    pub batch_limit: usize,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            mode: ExecutionMode::default(),
            sniff_prefix_bytes: Some(DEFAULT_SNIFF_PREFIX_BYTES),
            verify_actual_size: true,
            batch_limit: MAX_BATCH_URLS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl ConverterConfig {
    /// Overlays the values present in `file` onto `self`.
    #[must_use]
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if let Some(mb) = file.max_size_mb {
            self.max_size_bytes = mb * BYTES_PER_MB;
        }
        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        if let Some(prefix) = file.sniff_prefix_bytes {
            self.sniff_prefix_bytes = (prefix > 0).then_some(prefix);
        }
        if let Some(verify) = file.verify_actual_size {
            self.verify_actual_size = verify;
        }
        if let Some(limit) = file.batch_limit {
            self.batch_limit = limit;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(secs) = file.read_timeout_secs {
            self.read_timeout_secs = secs;
        }
        self
    }
}

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Payload ceiling in MiB (1..=1024).
    pub max_size_mb: Option<u64>,
    /// `"concurrent"` or `"strategy"`.
    pub mode: Option<ExecutionMode>,
    /// Sniff prefix in bytes (64..=1048576), or 0 for the full body.
    pub sniff_prefix_bytes: Option<u64>,
    /// Whether to measure real body sizes.
    pub verify_actual_size: Option<bool>,
    /// URLs attempted per input (1..=5).
    pub batch_limit: Option<usize>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Total request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates values against runtime and CLI constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mb) = self.max_size_mb
            && !(1..=1024).contains(&mb)
        {
            return Err(ConfigError::invalid("max_size_mb", mb, "1..=1024"));
        }
        if let Some(prefix) = self.sniff_prefix_bytes
            && prefix != 0
            && !(MIN_SNIFF_PREFIX_BYTES..=MAX_SNIFF_PREFIX_BYTES).contains(&prefix)
        {
            return Err(ConfigError::invalid(
                "sniff_prefix_bytes",
                prefix,
                "0 or 64..=1048576",
            ));
        }
        if let Some(limit) = self.batch_limit
            && !(1..=MAX_BATCH_URLS).contains(&limit)
        {
            return Err(ConfigError::invalid("batch_limit", limit, "1..=5"));
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(field, value, "1..=3600"));
    }
    Ok(())
}

/// Reads, parses and validates a config file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is unreadable, malformed, or out of range.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::from_toml_str(&raw, path)
}
