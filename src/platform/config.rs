// CleanLog - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Resolved platform paths for CleanLog configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/cleanlog/ or %APPDATA%\CleanLog\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        match ProjectDirs::from("", "", constants::APP_ID) {
            Some(proj_dirs) => {
                let config_dir = proj_dirs.config_dir().to_path_buf();
                tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
                Self { config_dir }
            }
            None => {
                tracing::warn!("Could not determine platform directories, using current directory");
                Self {
                    config_dir: PathBuf::from("."),
                }
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file can be used
/// with an older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub server: ServerSection,
    pub dedup: DedupSection,
    pub ledger: LedgerSection,
    pub chat: ChatSection,
    pub launcher: LauncherSection,
    pub logging: LoggingSection,
}

/// `[server]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address, e.g. "0.0.0.0" or "127.0.0.1".
    pub address: Option<String>,
    /// Listen port.
    pub port: Option<i64>,
}

/// `[dedup]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DedupSection {
    /// Maximum directory recursion depth.
    pub max_depth: Option<usize>,
    /// Exclude glob patterns, matched against file and directory names.
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[ledger]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub amount_tolerance: Option<f64>,
    pub time_window_minutes: Option<i64>,
    pub name_similarity_threshold: Option<f64>,
}

/// `[chat]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Unit of integer timestamps in chat databases: "s" or "ms".
    pub time_unit: Option<String>,
}

/// `[launcher]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LauncherSection {
    /// Container runtime executable looked up on PATH.
    pub container_runtime: Option<String>,
    /// Image tag used for build and run.
    pub image_tag: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Server --
    pub server_address: String,
    pub server_port: u16,

    // -- Dedup --
    pub max_depth: usize,
    pub exclude_patterns: Vec<String>,

    // -- Ledger --
    pub amount_tolerance: f64,
    pub time_window_minutes: i64,
    pub name_similarity_threshold: f64,

    // -- Chat --
    /// "s" or "ms".
    pub chat_time_unit: String,

    // -- Launcher --
    pub container_runtime: String,
    pub image_tag: String,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_address: constants::DEFAULT_SERVER_ADDRESS.to_string(),
            server_port: constants::DEFAULT_SERVER_PORT,
            max_depth: constants::DEFAULT_MAX_DEPTH,
            exclude_patterns: Vec::new(),
            amount_tolerance: constants::DEFAULT_AMOUNT_TOLERANCE,
            time_window_minutes: constants::DEFAULT_TIME_WINDOW_MINUTES,
            name_similarity_threshold: constants::DEFAULT_NAME_SIMILARITY_THRESHOLD,
            chat_time_unit: "s".to_string(),
            container_runtime: constants::DEFAULT_CONTAINER_RUNTIME.to_string(),
            image_tag: constants::DEFAULT_IMAGE_TAG.to_string(),
            log_level: None,
            log_file: None,
        }
    }
}

fn out_of_range(field: &str, value: impl ToString, expected: impl Into<String>) -> String {
    let err = ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.into(),
    };
    format!("{err}. Using default.")
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). An
/// unreadable or unparseable file yields defaults with one warning; the
/// application still starts but the user is informed.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(source) => {
            let err = ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    match parse_config(&content, config_path) {
        Ok((config, mut field_warnings)) => {
            tracing::info!(path = %config_path.display(), "Loaded config.toml");
            warnings.append(&mut field_warnings);
            if !warnings.is_empty() {
                tracing::warn!(
                    count = warnings.len(),
                    "Config validation produced warnings"
                );
            }
            (config, warnings)
        }
        Err(err) => {
            let msg = format!(
                "{err}. Using defaults. See config.example.toml for the expected format."
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            (AppConfig::default(), warnings)
        }
    }
}

/// Parse and validate config text. Field-level problems are warnings;
/// only a TOML syntax error fails.
pub fn parse_config(content: &str, path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut warnings = Vec::new();
    let mut config = AppConfig::default();

    // -- Server --
    if let Some(ref address) = raw.server.address {
        if address.trim().parse::<IpAddr>().is_ok() {
            config.server_address = address.trim().to_string();
        } else {
            warnings.push(out_of_range(
                "[server] address",
                address,
                "an IPv4 or IPv6 address such as 0.0.0.0",
            ));
        }
    }
    if let Some(port) = raw.server.port {
        match u16::try_from(port) {
            Ok(p) if p > 0 => config.server_port = p,
            _ => warnings.push(out_of_range("[server] port", port, "1-65535")),
        }
    }

    // -- Dedup --
    if let Some(depth) = raw.dedup.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            warnings.push(out_of_range(
                "[dedup] max_depth",
                depth,
                format!("1-{}", constants::ABSOLUTE_MAX_DEPTH),
            ));
        }
    }
    if let Some(patterns) = raw.dedup.exclude_patterns {
        for p in patterns {
            match glob::Pattern::new(&p) {
                Ok(_) => config.exclude_patterns.push(p),
                Err(e) => warnings.push(format!(
                    "[dedup] exclude_patterns entry \"{p}\" is not a valid glob ({e}); ignored."
                )),
            }
        }
    }

    // -- Ledger --
    if let Some(tol) = raw.ledger.amount_tolerance {
        if tol.is_finite() && tol >= 0.0 {
            config.amount_tolerance = tol;
        } else {
            warnings.push(out_of_range("[ledger] amount_tolerance", tol, ">= 0"));
        }
    }
    if let Some(window) = raw.ledger.time_window_minutes {
        if (0..=constants::MAX_TIME_WINDOW_MINUTES).contains(&window) {
            config.time_window_minutes = window;
        } else {
            warnings.push(out_of_range(
                "[ledger] time_window_minutes",
                window,
                format!("0-{}", constants::MAX_TIME_WINDOW_MINUTES),
            ));
        }
    }
    if let Some(threshold) = raw.ledger.name_similarity_threshold {
        if (0.0..=1.0).contains(&threshold) {
            config.name_similarity_threshold = threshold;
        } else {
            warnings.push(out_of_range(
                "[ledger] name_similarity_threshold",
                threshold,
                "0.0-1.0",
            ));
        }
    }

    // -- Chat --
    if let Some(ref unit) = raw.chat.time_unit {
        match unit.trim().to_lowercase().as_str() {
            u @ ("s" | "ms") => config.chat_time_unit = u.to_string(),
            _ => warnings.push(out_of_range("[chat] time_unit", unit, "\"s\" or \"ms\"")),
        }
    }

    // -- Launcher --
    if let Some(ref runtime) = raw.launcher.container_runtime {
        if runtime.trim().is_empty() {
            warnings.push(out_of_range(
                "[launcher] container_runtime",
                runtime,
                "an executable name",
            ));
        } else {
            config.container_runtime = runtime.trim().to_string();
        }
    }
    if let Some(ref tag) = raw.launcher.image_tag {
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            warnings.push(out_of_range(
                "[launcher] image_tag",
                tag,
                "a non-empty tag without spaces",
            ));
        } else {
            config.image_tag = tag.clone();
        }
    }

    // -- Logging --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(out_of_range(
                "[logging] level",
                level,
                "error, warn, info, debug, trace",
            ));
        }
    }
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    Ok((config, warnings))
}
