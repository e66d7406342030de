//! TOML-based configuration for Stratus.
//!
//! Supports a config file (stratus.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! user = "${STRATUS_USER}"
//! catalog = "hive"
//! schema = "default"
//!
//! [driver]
//! default_query_timeout_seconds = 18000   # 5 hours
//!
//! [metadata]
//! column_cache_ttl_seconds = 3600
//! partition_cache_ttl_seconds = 900
//! metadata_query_timeout_seconds = 60
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Engine session defaults.
    pub engine: EngineSettings,

    /// Query driver configuration.
    pub driver: DriverSettings,

    /// Metadata cache configuration.
    pub metadata: MetadataSettings,
}

/// Engine session defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// User the sessions run as (supports ${ENV_VAR} expansion).
    pub user: String,

    /// Default catalog for unqualified names.
    pub catalog: String,

    /// Default schema for unqualified names.
    pub schema: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            user: "stratus".to_string(),
            catalog: "hive".to_string(),
            schema: "default".to_string(),
        }
    }
}

impl EngineSettings {
    /// Get the user with environment variables expanded.
    pub fn resolved_user(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.user)
    }

    /// Build the per-invocation session context from these settings.
    pub fn session_handle(&self) -> Result<crate::engine::SessionHandle, SettingsError> {
        Ok(crate::engine::SessionHandle {
            user: self.resolved_user()?,
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
        })
    }
}

/// Query driver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Wall-clock budget for interactive queries, in seconds.
    pub default_query_timeout_seconds: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            // 5 hours
            default_query_timeout_seconds: 5 * 60 * 60,
        }
    }
}

impl DriverSettings {
    /// The default query budget as a [`Duration`].
    pub fn default_query_timeout(&self) -> Duration {
        Duration::from_secs(self.default_query_timeout_seconds)
    }
}

/// Metadata cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Lifetime of a loaded column entry, in seconds, from write time.
    pub column_cache_ttl_seconds: u64,

    /// Lifetime of a loaded partition entry, in seconds, from write time.
    pub partition_cache_ttl_seconds: u64,

    /// Budget for one introspection query. Kept short so metadata loads
    /// fail fast instead of inheriting the interactive default.
    pub metadata_query_timeout_seconds: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            column_cache_ttl_seconds: 3600,
            partition_cache_ttl_seconds: 900,
            metadata_query_timeout_seconds: 60,
        }
    }
}

impl MetadataSettings {
    /// Column cache TTL as a [`Duration`].
    pub fn column_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.column_cache_ttl_seconds)
    }

    /// Partition cache TTL as a [`Duration`].
    pub fn partition_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.partition_cache_ttl_seconds)
    }

    /// Introspection query budget as a [`Duration`].
    pub fn metadata_query_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_query_timeout_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATUS_CONFIG`
    /// 2. `./stratus.toml`
    ///
    /// Falls back to defaults if no config file is found.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STRATUS_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("stratus.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }
}

/// Expand `${VAR}` and `$VAR` references against the process environment.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(ch);
                    chars.next();
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
