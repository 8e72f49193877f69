//! Configuration management.
//!
//! Configuration is read from a TOML file and then adjusted by environment
//! variables. Every field has a default, so a missing file is not an error.

use crate::observability::LogFormat;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STASHD_CONFIG_PATH";
/// Environment variable overriding the storage root.
pub const DATABASE_ENV: &str = "STASHD_DATABASE";
/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "STASHD_LOG";

const APP_DIR: &str = "stashd";
pub(crate) const DB_FILE: &str = "history.db";
pub(crate) const BLOB_DIR: &str = "blob";

/// Main configuration for stashd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashConfig {
    /// Storage root holding `history.db` and `blob/`.
    pub database: PathBuf,
    /// Default number of search results.
    pub search_limit: usize,
    /// Upper bound on waiting for a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Whether primary-selection changes are captured too.
    pub primary_selection: bool,
    /// Capacity of the recent-capture cache used by `watch`.
    pub recent_capacity: usize,
    /// Program that receives restored content on stdin.
    pub restore_command: String,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging settings as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `None` keeps the verbosity default.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Storage root.
    pub database: Option<String>,
    /// Search section.
    pub search: Option<ConfigFileSearch>,
    /// Storage section.
    pub storage: Option<ConfigFileStorage>,
    /// Watch section.
    pub watch: Option<ConfigFileWatch>,
    /// Restore section.
    pub restore: Option<ConfigFileRestore>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// `[search]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSearch {
    /// Default result limit.
    pub limit: Option<usize>,
}

/// `[storage]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u64>,
}

/// `[watch]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileWatch {
    /// Capture primary selection.
    pub primary_selection: Option<bool>,
    /// Recent-capture cache size.
    pub recent_capacity: Option<usize>,
}

/// `[restore]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRestore {
    /// Restore program.
    pub command: Option<String>,
}

/// `[logging]` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub filter: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            search_limit: 40,
            busy_timeout_ms: 5000,
            primary_selection: true,
            recent_capacity: 256,
            restore_command: "wl-copy".to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_database() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".").join(APP_DIR),
        |dirs| dirs.data_dir().join(APP_DIR),
    )
}

/// Expands a leading `~/` against the home directory.
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}

impl StashConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::storage("read_config_file", format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on malformed TOML or unknown values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("config: {e}")))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Uses `STASHD_CONFIG_PATH` if set, then `<config dir>/stashd/config.toml`.
    /// Returns defaults when neither exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Self::load_from_file(Path::new(&path));
        }
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };
        let platform_config = base_dirs.config_dir().join(APP_DIR).join("config.toml");
        if platform_config.exists() {
            return Self::load_from_file(&platform_config);
        }
        Ok(Self::default())
    }

    /// Resolves configuration for the CLI: explicit path, else default
    /// location, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default()?,
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `STASHD_DATABASE` and `STASHD_LOG` using the given lookup.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.database = expand_home(&db);
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.logging.filter = Some(filter);
        }
        self
    }

    /// Converts a `ConfigFile` to `StashConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(database) = file.database {
            config.database = expand_home(&database);
        }
        if let Some(limit) = file.search.and_then(|s| s.limit) {
            config.search_limit = limit;
        }
        if let Some(ms) = file.storage.and_then(|s| s.busy_timeout_ms) {
            config.busy_timeout_ms = ms;
        }
        if let Some(watch) = file.watch {
            if let Some(v) = watch.primary_selection {
                config.primary_selection = v;
            }
            if let Some(v) = watch.recent_capacity {
                config.recent_capacity = v;
            }
        }
        if let Some(command) = file.restore.and_then(|r| r.command) {
            config.restore_command = command;
        }
        if let Some(logging) = file.logging {
            config.logging.filter = logging.filter;
            if let Some(format) = logging.format {
                config.logging.format = format.parse()?;
            }
            config.logging.file = logging.file.as_deref().map(expand_home);
        }

        Ok(config)
    }

    /// Sets the storage root.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Path of the row store inside the storage root.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.database.join(DB_FILE)
    }

    /// Directory of blob files inside the storage root.
    #[must_use]
    pub fn blob_dir(&self) -> PathBuf {
        self.database.join(BLOB_DIR)
    }
}
