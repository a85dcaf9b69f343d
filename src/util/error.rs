// CleanLog - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every variant carries the path or artifact it concerns so a log line
// is actionable on its own.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all CleanLog operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum CleanLogError {
    /// File dedup scan failed.
    Scan(ScanError),

    /// Loading a bill, chat history or spreadsheet failed.
    Ingest(IngestError),

    /// Building a downloadable artifact failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// The launcher could not run a step.
    Launch(LaunchError),

    /// The dashboard could not bind or serve.
    Server { address: String, source: io::Error },

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for CleanLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(e) => write!(f, "Scan error: {e}"),
            Self::Ingest(e) => write!(f, "Ingest error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Launch(e) => write!(f, "Launch error: {e}"),
            Self::Server { address, source } => {
                write!(f, "Dashboard server error on {address}: {source}")
            }
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for CleanLogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scan(e) => Some(e),
            Self::Ingest(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Launch(e) => Some(e),
            Self::Server { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

/// Errors raised while indexing and fingerprinting files.
/// All of them are non-fatal for a scan and end up as warnings.
#[derive(Debug)]
pub enum ScanError {
    /// A scan root does not exist.
    RootNotFound { path: PathBuf },

    /// Walkdir traversal error (inaccessible directory or entry).
    Traversal {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// File metadata could not be read.
    Metadata { path: PathBuf, source: io::Error },

    /// File content could not be read for fingerprinting.
    Hash { path: PathBuf, source: io::Error },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Scan path '{}' does not exist", path.display())
            }
            Self::Traversal { path, source } => {
                write!(f, "Error traversing '{}': {source}", path.display())
            }
            Self::Metadata { path, source } => {
                write!(f, "Cannot read metadata for '{}': {source}", path.display())
            }
            Self::Hash { path, source } => {
                write!(f, "Cannot fingerprint '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Traversal { source, .. } => Some(source),
            Self::Metadata { source, .. } => Some(source),
            Self::Hash { source, .. } => Some(source),
            Self::RootNotFound { .. } => None,
        }
    }
}

impl From<ScanError> for CleanLogError {
    fn from(e: ScanError) -> Self {
        Self::Scan(e)
    }
}

// ---------------------------------------------------------------------------
// Ingest errors
// ---------------------------------------------------------------------------

/// Errors related to loading tabular or chat data.
#[derive(Debug)]
pub enum IngestError {
    /// None of the supported text encodings could decode the file.
    UndecodableText { file: String },

    /// No row carried enough header keywords.
    HeaderNotFound { file: String },

    /// No column could serve as the time column.
    MissingTimeColumn { file: String, columns: Vec<String> },

    /// The file extension is not a supported source.
    UnsupportedFormat { file: String },

    /// SQLite sources can only be opened from a local path.
    DatabaseNeedsPath { file: String },

    /// CSV parsing error.
    Csv { file: String, source: csv::Error },

    /// Spreadsheet reading error.
    Spreadsheet {
        file: String,
        source: calamine::Error,
    },

    /// SQLite query error.
    Sqlite {
        file: String,
        source: rusqlite::Error,
    },

    /// I/O error while reading the source.
    Io { file: String, source: io::Error },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndecodableText { file } => {
                write!(f, "'{file}': cannot decode text (tried UTF-8, GBK, GB18030)")
            }
            Self::HeaderNotFound { file } => write!(
                f,
                "'{file}': no valid header row found \
                 (expected keywords such as 交易时间 or 金额)"
            ),
            Self::MissingTimeColumn { file, columns } => write!(
                f,
                "'{file}': time column not found, columns: [{}]",
                columns.join(", ")
            ),
            Self::UnsupportedFormat { file } => write!(
                f,
                "'{file}': unsupported file type (expected .csv, .xlsx, .xls or .db)"
            ),
            Self::DatabaseNeedsPath { file } => write!(
                f,
                "'{file}': .db sources need a local path, uploaded bytes are not supported"
            ),
            Self::Csv { file, source } => write!(f, "'{file}': CSV error: {source}"),
            Self::Spreadsheet { file, source } => {
                write!(f, "'{file}': spreadsheet error: {source}")
            }
            Self::Sqlite { file, source } => write!(f, "'{file}': SQLite error: {source}"),
            Self::Io { file, source } => write!(f, "'{file}': I/O error: {source}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source, .. } => Some(source),
            Self::Spreadsheet { source, .. } => Some(source),
            Self::Sqlite { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<IngestError> for CleanLogError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to building downloadable artifacts.
#[derive(Debug)]
pub enum ExportError {
    /// CSV serialisation error.
    Csv {
        artifact: &'static str,
        source: csv::Error,
    },

    /// JSON serialisation error.
    Json {
        artifact: &'static str,
        source: serde_json::Error,
    },

    /// Workbook packaging error.
    Workbook { source: zip::result::ZipError },

    /// PNG encoding error.
    Image { source: image::ImageError },

    /// I/O error writing an artifact to disk.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv { artifact, source } => write!(f, "CSV export error ({artifact}): {source}"),
            Self::Json { artifact, source } => {
                write!(f, "JSON export error ({artifact}): {source}")
            }
            Self::Workbook { source } => write!(f, "Excel workbook error: {source}"),
            Self::Image { source } => write!(f, "Chart encoding error: {source}"),
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Workbook { source } => Some(source),
            Self::Image { source } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for CleanLogError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for CleanLogError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Launch errors
// ---------------------------------------------------------------------------

/// Errors related to the launcher's external commands.
#[derive(Debug)]
pub enum LaunchError {
    /// A command could not be spawned at all.
    Spawn { program: String, source: io::Error },

    /// Writing launcher output failed.
    Output { source: io::Error },
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, source } => write!(f, "Cannot run '{program}': {source}"),
            Self::Output { source } => write!(f, "Cannot write launcher output: {source}"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Output { source } => Some(source),
        }
    }
}

impl From<LaunchError> for CleanLogError {
    fn from(e: LaunchError) -> Self {
        Self::Launch(e)
    }
}

/// Convenience type alias for CleanLog results.
pub type Result<T> = std::result::Result<T, CleanLogError>;
