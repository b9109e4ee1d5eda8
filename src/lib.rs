//! Link Attach Core Library
//!
//! Resolves the most likely file extension for a remote resource known only
//! by its URL, and turns links found in free text into safely named
//! attachment descriptors, subject to a payload size ceiling.
//!
//! # Architecture
//!
//! - [`fetch`] - pluggable HTTP fetch capability with bounded body reads
//! - [`probe`] - independent detection signals (headers, URL, magic bytes)
//! - [`strategy`] - per-provider probe ordering
//! - [`orchestrator`] - runs probes and reconciles one decision
//! - [`size_guard`] - payload ceiling checks
//! - [`attachment`] - filename reconciliation and descriptors
//! - [`batch`] - text in, attachment list out
//! - [`config`] - defaults and TOML file config

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attachment;
pub mod batch;
pub mod config;
pub mod fetch;
pub mod formats;
pub mod orchestrator;
pub mod probe;
pub mod resource;
pub mod size_guard;
pub mod strategy;
mod user_agent;

// Re-export commonly used types
pub use attachment::{ATTACHMENT_CONTENT_TYPE, AttachmentDescriptor, reconcile_filename};
pub use batch::{BatchOutcome, BatchStatus, LinkConverter, extract_urls};
pub use config::{ConfigError, ConverterConfig, FileConfig, MAX_BATCH_URLS, load_file_config};
pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use formats::{FALLBACK_EXTENSION, MimeTable};
pub use orchestrator::{ExecutionMode, Orchestrator, Resolution, ResolutionDecision};
pub use probe::{Probe, ProbeMethod, ProbeResult, ProbeSet, ProbeVerdict};
pub use resource::ResourceRef;
pub use size_guard::{
    COMPACT_MAX_SIZE_BYTES, DEFAULT_MAX_SIZE_BYTES, SizeEvidence, SizeSource, SizeVerdict,
};
pub use strategy::{ProviderPolicy, StrategySelector};
