//! Configuration loading and root folder resolution
//!
//! The service starts with no config file at all: every field has a
//! compiled default, and vendor credentials can be supplied purely through
//! environment variables.
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SCRIBA_CONFIG` environment variable
//! 3. OS config directory (`<config_dir>/scriba/scriba.toml`)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SCRIBA_CONFIG";

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub providers: ProviderConfig,
    /// External identity/session service. When absent the service runs in
    /// open mode with a single local user (used by the test suite).
    pub identity: Option<IdentityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root folder holding the database file and uploaded media blobs
    pub root_folder: PathBuf,
}

/// Speech vendor credentials and hints
///
/// Keys are optional: an unconfigured vendor is simply skipped by the
/// fallback cascade. Each key can be overridden by its conventional
/// environment variable (`ASSEMBLYAI_API_KEY` and friends).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub assemblyai_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepgram_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    /// Source-language hint passed to all vendors
    pub language: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            assemblyai_api_key: None,
            openai_api_key: None,
            deepgram_api_key: None,
            elevenlabs_api_key: None,
            language: "pt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub api_url: String,
    pub api_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            providers: ProviderConfig::default(),
            identity: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("scriba"))
        .unwrap_or_else(|| PathBuf::from("./scriba_data"))
}

impl AppConfig {
    /// Load configuration following the priority order documented above.
    ///
    /// A missing config file is not an error: defaults are used and a
    /// warning is logged. A file that exists but fails to parse is an
    /// error, since silently ignoring it would mask typos.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path);

        let mut config = match &path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let parsed: AppConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", p.display(), e)))?;
                tracing::info!("Loaded config from {}", p.display());
                parsed
            }
            Some(p) => {
                tracing::warn!("Config file {} not found, using defaults", p.display());
                AppConfig::default()
            }
            None => {
                tracing::warn!("No config file location available, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-variable overrides for vendor credentials
    pub fn apply_env_overrides(&mut self) {
        for (var, slot) in [
            ("ASSEMBLYAI_API_KEY", &mut self.providers.assemblyai_api_key),
            ("OPENAI_API_KEY", &mut self.providers.openai_api_key),
            ("DEEPGRAM_API_KEY", &mut self.providers.deepgram_api_key),
            ("ELEVENLABS_API_KEY", &mut self.providers.elevenlabs_api_key),
        ] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *slot = Some(value);
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(Error::Config("server.host must not be empty".to_string()));
        }
        if self.providers.language.is_empty() {
            return Err(Error::Config(
                "providers.language must not be empty".to_string(),
            ));
        }
        if let Some(identity) = &self.identity {
            if identity.api_url.is_empty() {
                return Err(Error::Config(
                    "identity.api_url must not be empty when [identity] is set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// `host:port` bind address for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Path of the SQLite database file under the root folder
    pub fn database_path(&self) -> PathBuf {
        self.storage.root_folder.join("scriba.db")
    }

    /// Directory holding uploaded media blobs
    pub fn uploads_path(&self) -> PathBuf {
        self.storage.root_folder.join("uploads")
    }

    /// Create the root folder (and uploads directory) if missing
    pub fn ensure_root_folder(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: OS config directory
    dirs::config_dir().map(|d| d.join("scriba").join("scriba.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_zero_config_startup() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5740);
        assert_eq!(config.providers.language, "pt");
        assert!(config.providers.assemblyai_api_key.is_none());
        assert!(config.identity.is_none());
        assert!(!config.storage.root_folder.as_os_str().is_empty());
    }

    #[test]
    fn database_and_uploads_live_under_root_folder() {
        let mut config = AppConfig::default();
        config.storage.root_folder = PathBuf::from("/tmp/scriba-test");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/scriba-test/scriba.db"));
        assert_eq!(config.uploads_path(), PathBuf::from("/tmp/scriba-test/uploads"));
    }

    #[test]
    fn partial_toml_fills_remaining_fields_from_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [providers]
            deepgram_api_key = "dg-key"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.providers.deepgram_api_key.as_deref(), Some("dg-key"));
        assert_eq!(parsed.providers.language, "pt");
    }

    #[test]
    fn validate_rejects_empty_language() {
        let mut config = AppConfig::default();
        config.providers.language.clear();
        assert!(config.validate().is_err());
    }
}
