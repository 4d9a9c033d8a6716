//! On-disk configuration and per-run session resolution.
//!
//! Settings live in `config.toml` under the platform config directory; a
//! missing file is an empty config. The API key is only ever read from
//! the environment so it never lands on disk.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4";

pub const API_KEY_ENV: &str = "GLINT_API_KEY";
pub const BASE_URL_ENV: &str = "GLINT_BASE_URL";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Base URL of the chat API, overriding the built-in default.
    pub base_url: Option<String>,
    /// Model used when no `-m` flag is given.
    pub default_model: Option<String>,
}

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config at {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "permacommons", "glint")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Everything one run needs to reach the API.
pub struct Session {
    /// Raw `"<id>.<secret>"` key, still unparsed.
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Raised when no API key is present in the environment.
#[derive(Debug)]
pub struct MissingApiKey;

impl fmt::Display for MissingApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{API_KEY_ENV} is not set\n\nExport your GLM API key:\n  export {API_KEY_ENV}=\"<id>.<secret>\""
        )
    }
}

impl StdError for MissingApiKey {}

/// Resolve the session from flags, environment, and config file, in that
/// order of precedence.
pub fn resolve_session(
    config: &Config,
    model_flag: Option<&str>,
    base_url_flag: Option<&str>,
) -> Result<Session, MissingApiKey> {
    assemble_session(
        config,
        std::env::var(API_KEY_ENV).ok(),
        std::env::var(BASE_URL_ENV).ok(),
        model_flag,
        base_url_flag,
    )
}

fn assemble_session(
    config: &Config,
    env_key: Option<String>,
    env_base_url: Option<String>,
    model_flag: Option<&str>,
    base_url_flag: Option<&str>,
) -> Result<Session, MissingApiKey> {
    let api_key = env_key.filter(|key| !key.is_empty()).ok_or(MissingApiKey)?;

    let base_url = base_url_flag
        .map(str::to_string)
        .or(env_base_url)
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let model = model_flag
        .map(str::to_string)
        .or_else(|| config.default_model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    Ok(Session {
        api_key,
        base_url,
        model,
    })
}
