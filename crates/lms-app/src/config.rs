// Configuration loading and parsing (pool.toml, odds.toml, credentials.toml).

use lms_core::settings::{SeasonSettings, SettingsError, Strategy};
use lms_core::Week;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides `credentials.toml`'s API key.
pub const API_KEY_ENV: &str = "NFL_ODDS_API_KEY";
/// Environment variable that overrides `odds.base_url`.
pub const BASE_URL_ENV: &str = "NFL_ODDS_API_BASE_URL";
/// Environment variable that overrides `odds.bookmaker`.
pub const BOOKMAKER_ENV: &str = "NFL_ODDS_BOOKMAKER";

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
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub pool: PoolConfig,
    pub odds: OddsConfig,
    pub credentials: CredentialsConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

impl Config {
    /// Validated season settings for the core engine.
    pub fn season_settings(&self) -> Result<SeasonSettings, SettingsError> {
        SeasonSettings::new(
            self.pool.total_weeks,
            self.pool.horizon_weeks,
            self.pool.strategy,
        )
    }

    /// Apply the odds-related environment overrides. `lookup` is
    /// `std::env::var(..).ok()` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.credentials.odds_api_key = Some(key);
        }
        if let Some(url) = non_empty(BASE_URL_ENV) {
            self.odds.base_url = url;
        }
        if let Some(bookmaker) = non_empty(BOOKMAKER_ENV) {
            self.odds.bookmaker = bookmaker;
        }
    }
}

// ---------------------------------------------------------------------------
// pool.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pool.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PoolFile {
    pool: PoolConfig,
    #[serde(default)]
    data: DataPaths,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    /// Key under which this pool's picks are stored.
    pub id: String,
    pub total_weeks: Week,
    /// Weeks the search looks ahead, current week included.
    pub horizon_weeks: Week,
    #[serde(default)]
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPaths {
    /// JSON (`{"7": {"Chiefs": 0.788}}`) or CSV (`week,team,probability`).
    pub probabilities: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

// ---------------------------------------------------------------------------
// odds.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[odds]` table in odds.toml.
#[derive(Debug, Clone, Deserialize)]
struct OddsFile {
    odds: OddsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsConfig {
    pub base_url: String,
    pub regions: String,
    pub bookmaker: String,
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub odds_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pool.toml`,
/// `config/odds.toml`, and (optionally) `config/credentials.toml`, all
/// relative to `base_dir`. Environment overrides are not applied here.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- pool.toml (required) ---
    let pool_path = config_dir.join("pool.toml");
    let pool_text = read_file(&pool_path)?;
    let pool_file: PoolFile = toml::from_str(&pool_text).map_err(|e| ConfigError::ParseError {
        path: pool_path.clone(),
        source: e,
    })?;

    // --- odds.toml (required) ---
    let odds_path = config_dir.join("odds.toml");
    let odds_text = read_file(&odds_path)?;
    let odds_file: OddsFile = toml::from_str(&odds_text).map_err(|e| ConfigError::ParseError {
        path: odds_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let db_path = pool_file
        .database
        .path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(default_db_path);

    let config = Config {
        pool: pool_file.pool,
        odds: odds_file.odds,
        credentials,
        db_path,
        data_paths: pool_file.data,
    };

    validate(&config)?;

    Ok(config)
}

/// Config files that ship with a default under `defaults/`. Credentials
/// only have an `.example` and are never copied.
const DEFAULT_FILES: [&str; 2] = ["pool.toml", "odds.toml"];

/// Copy each missing file of `DEFAULT_FILES` from `defaults/` into
/// `config/`. Existing files are left alone. Returns the copied paths.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    let mut copied = Vec::new();
    for name in DEFAULT_FILES {
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "{} is missing and there is no default at {}",
                    target.display(),
                    source.display()
                ),
            });
        }
        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first and applying environment overrides last.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// `lms.db` in the platform data directory, or the working directory when
/// no home directory can be determined.
fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "lms")
        .map(|dirs| dirs.data_dir().join("lms.db").to_string_lossy().into_owned())
        .unwrap_or_else(|| "lms.db".to_string())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.pool.id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "pool.id".into(),
            message: "must not be empty".into(),
        });
    }

    if config.pool.total_weeks == 0 {
        return Err(ConfigError::ValidationError {
            field: "pool.total_weeks".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.pool.horizon_weeks == 0 {
        return Err(ConfigError::ValidationError {
            field: "pool.horizon_weeks".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.odds.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "odds.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    if config.odds.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "odds.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
