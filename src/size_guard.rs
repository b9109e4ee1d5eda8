//! Payload size ceiling checks.
//!
//! Sizes arrive from two places: a declared `content-length` header, which is
//! cheap but untrusted, and an observed byte count taken from the body itself.
//! The pipeline runs the guard against both; either verdict can drop a URL.

/// Default payload ceiling (25 MiB).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 25 * 1024 * 1024;

/// Smaller alternative ceiling (10 MiB) for constrained deployments.
pub const COMPACT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Where a byte count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSource {
    /// `content-length` or `content-range` header value.
    Declared,
    /// Bytes actually read from the response body.
    Observed,
}

impl std::fmt::Display for SizeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declared => write!(f, "declared"),
            Self::Observed => write!(f, "observed"),
        }
    }
}

/// Result of checking one byte count against the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeVerdict {
    /// Whether the byte count is over the ceiling.
    pub exceeds: bool,
    /// Human-readable byte count for diagnostics.
    pub formatted: String,
    /// Which signal produced the byte count.
    pub source: SizeSource,
}

impl SizeVerdict {
    /// Classifies `byte_count` against `limit_bytes`.
    #[must_use]
    pub fn check(byte_count: u64, limit_bytes: u64, source: SizeSource) -> Self {
        Self {
            exceeds: exceeds(byte_count, limit_bytes),
            formatted: format_bytes(byte_count),
            source,
        }
    }
}

/// Size signals collected while probing a single resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeEvidence {
    /// Largest declared size seen in any response header.
    pub declared: Option<u64>,
    /// Complete body length, when some probe read the whole body.
    pub observed: Option<u64>,
}

impl SizeEvidence {
    /// Evidence with only a declared size.
    #[must_use]
    pub fn declared(bytes: Option<u64>) -> Self {
        Self {
            declared: bytes,
            observed: None,
        }
    }

    /// Combines evidence from two probes, keeping the larger value of each kind.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            declared: max_known(self.declared, other.declared),
            observed: max_known(self.observed, other.observed),
        }
    }

    /// Returns true when neither kind of size is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declared.is_none() && self.observed.is_none()
    }
}

fn max_known(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Returns true when `byte_count` is strictly greater than `limit_bytes`.
#[must_use]
pub fn exceeds(byte_count: u64, limit_bytes: u64) -> bool {
    byte_count > limit_bytes
}

/// Formats a byte count with binary units, e.g. `512 B`, `1.50 KB`, `25.00 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(byte_count: u64) -> String {
    if byte_count < 1024 {
        return format!("{byte_count} B");
    }
    let mut value = byte_count as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}
