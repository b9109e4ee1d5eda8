//! Static format tables: media types, supported extensions, and aliases.
//!
//! Extensions are carried with a leading dot (`.png`) everywhere in the crate.

use std::sync::{Arc, LazyLock};

/// Extension used when no probe produced a trusted answer.
pub const FALLBACK_EXTENSION: &str = ".file";

/// Builtin media type to extension pairs.
const BUILTIN_MIME_ENTRIES: &[(&str, &str)] = &[
    // Documents
    ("text/html", ".html"),
    ("application/xhtml+xml", ".html"),
    ("text/plain", ".txt"),
    ("text/markdown", ".md"),
    ("text/csv", ".csv"),
    ("text/xml", ".xml"),
    ("application/xml", ".xml"),
    ("application/json", ".json"),
    ("application/pdf", ".pdf"),
    ("application/rtf", ".rtf"),
    ("application/epub+zip", ".epub"),
    ("application/msword", ".doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("application/vnd.ms-excel", ".xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/vnd.ms-powerpoint", ".ppt"),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
    ("application/vnd.oasis.opendocument.text", ".odt"),
    ("application/vnd.oasis.opendocument.spreadsheet", ".ods"),
    ("application/vnd.oasis.opendocument.presentation", ".odp"),
    // Images
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/pjpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
    ("image/svg", ".svg"),
    ("image/bmp", ".bmp"),
    ("image/x-ms-bmp", ".bmp"),
    ("image/x-icon", ".ico"),
    ("image/vnd.microsoft.icon", ".ico"),
    ("image/tiff", ".tiff"),
    ("image/avif", ".avif"),
    ("image/heic", ".heic"),
    // Audio
    ("audio/mpeg", ".mp3"),
    ("audio/mp3", ".mp3"),
    ("audio/wav", ".wav"),
    ("audio/x-wav", ".wav"),
    ("audio/wave", ".wav"),
    ("audio/ogg", ".ogg"),
    ("audio/flac", ".flac"),
    ("audio/x-flac", ".flac"),
    ("audio/aac", ".aac"),
    ("audio/mp4", ".m4a"),
    ("audio/x-m4a", ".m4a"),
    ("audio/opus", ".opus"),
    // Video
    ("video/mp4", ".mp4"),
    ("video/webm", ".webm"),
    ("video/quicktime", ".mov"),
    ("video/x-msvideo", ".avi"),
    ("video/x-matroska", ".mkv"),
    ("video/x-flv", ".flv"),
    ("video/x-m4v", ".m4v"),
    // Scripts and code
    ("text/css", ".css"),
    ("text/javascript", ".js"),
    ("application/javascript", ".js"),
    ("application/x-javascript", ".js"),
    ("application/typescript", ".ts"),
    ("text/x-python", ".py"),
    ("application/x-sh", ".sh"),
    ("application/yaml", ".yaml"),
    ("text/yaml", ".yaml"),
    ("application/toml", ".toml"),
    // Archives
    ("application/zip", ".zip"),
    ("application/x-zip-compressed", ".zip"),
    ("application/x-rar", ".rar"),
    ("application/x-rar-compressed", ".rar"),
    ("application/vnd.rar", ".rar"),
    ("application/x-7z-compressed", ".7z"),
    ("application/x-tar", ".tar"),
    ("application/gzip", ".gz"),
    ("application/x-gzip", ".gz"),
    ("application/x-bzip2", ".bz2"),
    ("application/x-xz", ".xz"),
    // Fonts
    ("font/ttf", ".ttf"),
    ("font/otf", ".otf"),
    ("font/woff", ".woff"),
    ("font/woff2", ".woff2"),
    ("application/font-woff", ".woff"),
    ("application/vnd.ms-fontobject", ".eot"),
    // Binaries
    ("application/wasm", ".wasm"),
    ("application/vnd.android.package-archive", ".apk"),
    ("application/x-msdownload", ".exe"),
    ("application/x-apple-diskimage", ".dmg"),
    ("application/x-iso9660-image", ".iso"),
];

/// Closed set of extensions the URL probe accepts (without the leading dot).
const SUPPORTED_EXTENSIONS: &[&str] = &[
    // Documents
    "html", "htm", "txt", "md", "csv", "xml", "json", "pdf", "rtf", "epub", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    // Images
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "tif", "tiff", "avif", "heic",
    // Audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "opus",
    // Video
    "mp4", "webm", "mov", "avi", "mkv", "flv", "m4v",
    // Code and scripts
    "css", "js", "mjs", "ts", "py", "sh", "yaml", "yml", "toml",
    // Archives
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Binaries
    "bin", "wasm", "apk", "exe", "dmg", "iso",
];

/// Spellings that name the same format.
const EXTENSION_ALIASES: &[(&str, &str)] = &[
    (".jpeg", ".jpg"),
    (".htm", ".html"),
    (".tif", ".tiff"),
    (".yml", ".yaml"),
    (".mjs", ".js"),
];

static BUILTIN_MIME_TABLE: LazyLock<Arc<MimeTable>> =
    LazyLock::new(|| Arc::new(MimeTable::from_pairs(BUILTIN_MIME_ENTRIES.iter().copied())));

/// Immutable media type to extension mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeTable {
    entries: Vec<(String, String)>,
}

impl MimeTable {
    /// Shared builtin table.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN_MIME_TABLE)
    }

    /// Builds a table from `(media type, extension)` pairs.
    ///
    /// Media types are lower-cased; extensions gain a leading dot if missing.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(mime, ext)| (mime.trim().to_ascii_lowercase(), dotted(ext)))
            .collect();
        Self { entries }
    }

    /// Maps a raw `content-type` value to an extension.
    ///
    /// The value is lower-cased and stripped of parameters before lookup.
    #[must_use]
    pub fn lookup(&self, content_type: &str) -> Option<&str> {
        let mime = normalize_media_type(content_type);
        if mime.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(known, _)| *known == mime)
            .map(|(_, ext)| ext.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lower-cases a media type and drops any `;` parameters.
#[must_use]
pub fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Normalizes a candidate (`PNG`, `.png`, ` png `) to `.png` if it is supported.
#[must_use]
pub fn supported_extension(candidate: &str) -> Option<String> {
    let bare = candidate.trim().trim_start_matches('.').to_ascii_lowercase();
    if bare.is_empty() {
        return None;
    }
    SUPPORTED_EXTENSIONS
        .contains(&bare.as_str())
        .then(|| format!(".{bare}"))
}

/// Maps alias spellings onto one canonical extension for comparisons.
#[must_use]
pub fn canonical_extension(extension: &str) -> String {
    let lowered = dotted(&extension.to_ascii_lowercase());
    EXTENSION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or(lowered, |(_, canonical)| (*canonical).to_string())
}

/// Returns true when two extensions name the same format.
#[must_use]
pub fn same_format(a: &str, b: &str) -> bool {
    canonical_extension(a) == canonical_extension(b)
}

fn dotted(ext: &str) -> String {
    let trimmed = ext.trim();
    if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}
