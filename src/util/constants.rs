// CleanLog - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "CleanLog";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "CleanLog";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dashboard subtitle shown under the title.
pub const APP_TAGLINE: &str = "Personal data governance center";

// =============================================================================
// Dashboard server
// =============================================================================

/// Default bind address (all interfaces, so the container port can be published).
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";

/// Default dashboard port.
pub const DEFAULT_SERVER_PORT: u16 = 8501;

/// Maximum accepted upload body in bytes (all files of one request).
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024; // 200 MB

/// Number of finished reports whose artifacts stay downloadable.
/// The oldest report is evicted once the store is full.
pub const MAX_STORED_REPORTS: usize = 32;

// =============================================================================
// File dedup
// =============================================================================

/// Read chunk size for MD5 fingerprinting.
pub const HASH_CHUNK_SIZE: usize = 8192;

/// Files at or above this size are fingerprinted through a memory map
/// instead of chunked reads.
pub const MMAP_HASH_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Default maximum directory recursion depth during a dedup scan.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard upper bound on dedup recursion depth.
pub const ABSOLUTE_MAX_DEPTH: usize = 256;

/// Number of duplicate groups that receive a keep/delete recommendation.
pub const MAX_RECOMMENDATION_GROUPS: usize = 10;

/// Recommendations listed as cleaning actions.
pub const ACTION_RECOMMENDATIONS: usize = 3;

/// Recommendations embedded in the report details.
pub const PREVIEW_RECOMMENDATIONS: usize = 5;

/// Default directories offered on the dedup page, relative to the home dir.
pub const DEFAULT_SCAN_DIRS: &[&str] = &["Downloads", "Documents"];

// =============================================================================
// Chat / bill insight
// =============================================================================

/// Keywords that identify a bill header row.
pub const HEADER_KEYWORDS: &[&str] = &[
    "交易时间",
    "交易类型",
    "交易对方",
    "商品",
    "金额",
    "收/支",
    "时间",
    "日期",
    "支付方式",
    "交易单号",
];

/// Keyword hits a row needs before it is accepted as the header.
pub const HEADER_MIN_KEYWORD_HITS: usize = 2;

/// Rows of an Excel sheet searched for the header.
pub const EXCEL_HEADER_SEARCH_ROWS: usize = 30;

/// Messages at or beyond this many characters are dropped as noise.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Night-owl window, inclusive hours.
pub const NIGHT_HOUR_START: u32 = 3;
pub const NIGHT_HOUR_END: u32 = 5;

/// Standard deviations a day's count must deviate to be flagged.
pub const ANOMALY_SIGMA: f64 = 3.0;

/// Contacts listed in the top-contacts insight.
pub const TOP_CONTACTS: usize = 10;

/// Messages included in the downloadable CSV.
pub const MAX_EXPORT_MESSAGES: usize = 1000;

// =============================================================================
// Ledger reconciliation
// =============================================================================

/// Default absolute amount tolerance when matching transactions.
pub const DEFAULT_AMOUNT_TOLERANCE: f64 = 0.01;

/// Default matching window in minutes.
pub const DEFAULT_TIME_WINDOW_MINUTES: i64 = 5;

/// Default counterparty similarity threshold for a candidate match.
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Similarity at or above which a candidate counts as a confirmed match.
pub const CONFIRMED_MATCH_SIMILARITY: f64 = 0.9;

/// Net amount (absolute, CNY) beyond which the ledger is unbalanced.
pub const BALANCE_TOLERANCE: f64 = 100.0;

/// Share of unilateral entries that triggers a completeness warning.
pub const UNILATERAL_WARNING_RATIO: f64 = 0.5;

/// Upper bound on the matching window.
pub const MAX_TIME_WINDOW_MINUTES: i64 = 24 * 60;

// =============================================================================
// Launcher
// =============================================================================

/// Container runtime probed on PATH.
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

/// Image tag used by the containerized launch path.
pub const DEFAULT_IMAGE_TAG: &str = "cleanlog";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
