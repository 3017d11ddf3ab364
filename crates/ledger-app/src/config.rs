// Configuration loading and parsing (ledger.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sport codes the lobby can be filtered on.
pub const SUPPORTED_SPORTS: &[&str] = &[
    "SOC", "NBA", "GOLF", "TEN", "XLF", "NHL", "EL", "NAS", "LOL", "CBB", "NFL", "MLB", "MMA",
    "CFL", "CFB",
];

/// Name of the config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "ledger.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// ledger.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub lineup: LineupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Data root. Empty resolves to `~/Documents/<sport>`.
    #[serde(default)]
    pub root: String,
    #[serde(default = "default_inbox")]
    pub inbox: String,
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub sport: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineupConfig {
    pub positions: Vec<String>,
}

impl Default for LineupConfig {
    fn default() -> Self {
        Self {
            positions: ledger_core::lineup::NBA_POSITIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ledger=info,warn".into(),
        }
    }
}

fn default_inbox() -> String {
    "inbox".into()
}

fn default_database() -> String {
    "ledger.db".into()
}

impl Config {
    /// The data root every dataset path hangs off.
    pub fn root_dir(&self) -> Result<PathBuf, ConfigError> {
        if !self.paths.root.trim().is_empty() {
            return Ok(PathBuf::from(self.paths.root.trim()));
        }
        let documents = directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
            .ok_or_else(|| ConfigError::ValidationError {
                field: "paths.root".into(),
                message: "empty and no Documents directory could be found".into(),
            })?;
        Ok(documents.join(&self.scrape.sport))
    }

    pub fn inbox_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(resolve_under(&self.root_dir()?, &self.paths.inbox))
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(resolve_under(&self.root_dir()?, &self.paths.database))
    }
}

fn resolve_under(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/ledger.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Seed `config/ledger.toml` from `defaults/ledger.toml` when there is no
/// local copy yet. Returns the path written, if any. An existing local copy
/// is never touched.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} under {base}/config or {base}/defaults; \
                 run from the ledger checkout or pass --config-dir",
                base = base_dir.display()
            ),
        });
    }

    if let Some(config_dir) = target.parent() {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
    }
    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
    })?;
    Ok(Some(target))
}

/// Seed the local config from the defaults if needed, then load it.
pub fn load_config_at(base_dir: &Path) -> Result<Config, ConfigError> {
    if let Some(path) = ensure_config_file(base_dir)? {
        tracing::info!("created {} from defaults", path.display());
    }
    load_config_from(base_dir)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_at(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let sport = config.scrape.sport.as_str();
    if !SUPPORTED_SPORTS.contains(&sport) {
        return Err(ConfigError::ValidationError {
            field: "scrape.sport".into(),
            message: format!(
                "`{sport}` is not supported, expected one of {}",
                SUPPORTED_SPORTS.join(", ")
            ),
        });
    }

    if config.lineup.positions.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "lineup.positions".into(),
            message: "must list at least one position".into(),
        });
    }
    for position in &config.lineup.positions {
        if position.is_empty() || position.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationError {
                field: "lineup.positions".into(),
                message: format!("`{position}` must be a single non-empty token"),
            });
        }
    }

    for (name, value) in [
        ("paths.inbox", &config.paths.inbox),
        ("paths.database", &config.paths.database),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.into(),
                message: "must not be empty".into(),
            });
        }
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.filter".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
