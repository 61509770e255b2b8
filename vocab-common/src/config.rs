//! Configuration loading and path resolution
//!
//! The import job is configured by a TOML file. The file is looked up in this
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. `VOCAB_IMPORT_CONFIG` environment variable
//! 3. User config file (`~/.config/vocab-import/config.toml` on Linux)
//! 4. System config file (`/etc/vocab-import/config.toml`)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "VOCAB_IMPORT_CONFIG";

/// Environment variable naming the vocabulary database file
pub const DATABASE_ENV_VAR: &str = "VOCAB_IMPORT_DATABASE";

const APP_DIR: &str = "vocab-import";

/// Top-level import job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Local folder scanned for the newest `*.json` feed file, or the
    /// download folder when `[sftp]` is enabled
    pub source_folder: PathBuf,

    /// Vocabulary database file (falls back to env var, then platform default)
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote feed retrieval; local folder scanning when absent or disabled
    #[serde(default)]
    pub sftp: Option<SftpConfig>,

    /// Target vocabulary and field mapping
    pub vocabulary: VocabularyConfig,
}

/// `[sftp]` section
#[derive(Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    /// Set `use = false` to keep the section but scan `source_folder` instead
    #[serde(rename = "use", default = "default_true")]
    pub enabled: bool,

    pub hostname: String,

    #[serde(default = "default_sftp_port")]
    pub port: u16,

    pub username: String,

    /// Login password, or the key passphrase when `keyfile` is set
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Private key used instead of password authentication
    #[serde(default)]
    pub keyfile: Option<PathBuf>,

    /// OpenSSH known_hosts file (defaults to `~/.ssh/known_hosts`)
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,

    /// Remote folder listed for `*.json` files
    pub remote_folder: PathBuf,

    /// Comma-separated public key signature algorithms offered to the server
    #[serde(default)]
    pub pubkey_accepted_algorithms: Option<String>,
}

impl SftpConfig {
    /// Configured known_hosts file, else `~/.ssh/known_hosts`
    pub fn known_hosts_file(&self) -> PathBuf {
        self.known_hosts.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ssh")
                .join("known_hosts")
        })
    }
}

impl fmt::Debug for SftpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpConfig")
            .field("enabled", &self.enabled)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keyfile", &self.keyfile)
            .field("known_hosts", &self.known_hosts)
            .field("remote_folder", &self.remote_folder)
            .field("pubkey_accepted_algorithms", &self.pubkey_accepted_algorithms)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_sftp_port() -> u16 {
    22
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What happens to a mapped field when the source object has no value for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentValuePolicy {
    /// Leave whatever the record already holds for the field
    #[default]
    Keep,
    /// Remove the stored value; the field ends up empty
    Clear,
    /// Replace the stored value with an empty string
    WriteEmpty,
}

/// `[vocabulary]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Name of the vocabulary to enrich
    pub name: String,

    #[serde(default)]
    pub absent_values: AbsentValuePolicy,

    /// When set, values are stored as translations tagged with this language
    #[serde(default)]
    pub language: Option<String>,

    /// Permit a mapping without identifier entry (every element creates a new record)
    #[serde(default)]
    pub allow_missing_identifier: bool,

    /// Ordered field mapping entries (`[[vocabulary.field]]`)
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldConfig>,
}

/// One `[[vocabulary.field]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field name in the vocabulary schema
    pub field_name: String,
    /// JSON path evaluated against each source object
    pub json_path: String,
    /// Marks the field used to match source objects against existing records
    #[serde(default)]
    pub identifier: bool,
}

impl ImportConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), vocabulary = %config.vocabulary.name, "Loaded configuration");
        Ok(config)
    }

    /// The `[sftp]` section, when present and enabled
    pub fn active_sftp(&self) -> Option<&SftpConfig> {
        self.sftp.as_ref().filter(|sftp| sftp.enabled)
    }
}

/// Resolve the configuration file path
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3/4: user config dir, then system-wide
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    let system_config = PathBuf::from("/etc").join(APP_DIR).join("config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config(format!(
        "No config file found. Pass --config, set {}, or create ~/.config/{}/config.toml",
        CONFIG_ENV_VAR, APP_DIR
    )))
}

/// Resolve the vocabulary database path
///
/// Priority: CLI argument → TOML `database` → environment variable → platform default.
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &ImportConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = &config.database {
        return path.clone();
    }

    if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_folder().join("vocabulary.db")
}

/// Get OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/var/lib").join(APP_DIR))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("./vocab_import_data"))
    }
}
