// crates/migration-gate-cli/src/config.rs
// ============================================================================
// Module: CLI Configuration
// Description: Resolves server configuration from an optional TOML file
// layered under environment variables.
// Purpose: One place that decides the effective port, data directory, and
// LLM reasoner credentials before the server starts.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Precedence, low to high: built-in defaults, an optional `migration-gate.toml`
//! file, then environment variables. Environment variables always win so a
//! deployment can override a checked-in config file without editing it.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_DATA_DIR: &str = "./backend/data";

/// Errors encountered while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error message.
        source: String,
    },
    /// The config file was not valid TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error message.
        source: String,
    },
    /// An environment variable held a value that could not be parsed.
    #[error("environment variable {var} has an invalid value: {message}")]
    InvalidEnv {
        /// Name of the offending variable.
        var: &'static str,
        /// Description of why the value was rejected.
        message: String,
    },
}

/// Deserialized shape of an optional `migration-gate.toml` file. Every field
/// is optional; absence means "fall through to the environment or default".
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    llm_endpoint: Option<String>,
    llm_api_key: Option<String>,
    llm_deployment_name: Option<String>,
    cors_allowed_origins: Option<Vec<String>>,
}

/// Effective configuration the `serve` and `migrate` commands run against.
#[derive(Debug, Clone)]
pub struct MigrationGateConfig {
    /// Port the REST API listens on.
    pub port: u16,
    /// Root directory for `snapshot.json` and the artifact tree.
    pub data_dir: PathBuf,
    /// Chat-completions endpoint for the LLM reasoner, when configured.
    pub llm_endpoint: Option<Url>,
    /// Bearer token for the LLM endpoint.
    pub llm_api_key: Option<String>,
    /// Deployment or model name sent in LLM requests.
    pub llm_deployment_name: Option<String>,
    /// Origins allowed to call the REST API. `None` means unrestricted
    /// (development default); `Some` restricts CORS to exactly this list.
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl MigrationGateConfig {
    /// Resolves configuration from an optional file path, with environment
    /// variables layered on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed, or when an environment variable holds an unparsable value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(explicit) => read_file_config(explicit)?,
            None => {
                let default_path = Path::new("migration-gate.toml");
                if default_path.exists() {
                    read_file_config(default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                message: format!("{raw:?} is not a valid port number"),
            })?,
            Err(_) => file.port.unwrap_or(DEFAULT_PORT),
        };

        let data_dir = env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            file.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
        });

        let llm_endpoint_raw = env::var("LLM_ENDPOINT").ok().or(file.llm_endpoint);
        let llm_endpoint = llm_endpoint_raw
            .map(|raw| {
                Url::parse(&raw).map_err(|err| ConfigError::InvalidEnv {
                    var: "LLM_ENDPOINT",
                    message: err.to_string(),
                })
            })
            .transpose()?;

        let llm_api_key = env::var("LLM_API_KEY").ok().or(file.llm_api_key);
        let llm_deployment_name = env::var("LLM_DEPLOYMENT_NAME").ok().or(file.llm_deployment_name);

        let cors_allowed_origins = match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) => Some(raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()),
            Err(_) => file.cors_allowed_origins,
        };

        Ok(Self {
            port,
            data_dir,
            llm_endpoint,
            llm_api_key,
            llm_deployment_name,
            cors_allowed_origins,
        })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        source: err.to_string(),
    })?;
    toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        source: err.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
#[allow(unsafe_code, reason = "std::env::set_var/remove_var are unsafe as of this toolchain; serialized by ENV_GUARD")]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in ["PORT", "DATA_DIR", "LLM_ENDPOINT", "LLM_API_KEY", "LLM_DEPLOYMENT_NAME", "CORS_ALLOWED_ORIGINS"] {
            // SAFETY: serialized by ENV_GUARD, single-threaded test execution per lock.
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn defaults_without_file_or_env() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        let config = MigrationGateConfig::load(None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert!(config.llm_endpoint.is_none());
        assert!(config.cors_allowed_origins.is_none());
    }

    #[test]
    fn cors_allowed_origins_env_is_parsed_as_a_trimmed_list() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        // SAFETY: serialized by ENV_GUARD.
        unsafe { env::set_var("CORS_ALLOWED_ORIGINS", "https://a.test, https://b.test") };
        let config = MigrationGateConfig::load(None).unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            Some(vec!["https://a.test".to_string(), "https://b.test".to_string()])
        );
        clear_env();
    }

    #[test]
    fn env_overrides_file() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("migration-gate.toml");
        fs::write(&config_path, "port = 5000\ndata_dir = \"/file/data\"\n").expect("write config");

        // SAFETY: serialized by ENV_GUARD.
        unsafe { env::set_var("PORT", "6000") };
        let config = MigrationGateConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.port, 6000, "env PORT must win over the file value");
        assert_eq!(config.data_dir, PathBuf::from("/file/data"), "file value used when env is absent");
        clear_env();
    }

    #[test]
    fn rejects_invalid_port_env() {
        let _guard = ENV_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_env();
        // SAFETY: serialized by ENV_GUARD.
        unsafe { env::set_var("PORT", "not-a-port") };
        let result = MigrationGateConfig::load(None);
        assert!(matches!(result, Err(ConfigError::InvalidEnv { var: "PORT", .. })));
        clear_env();
    }
}
