//! Configuration management for logocluster
//!
//! All configuration is loaded from `./config/logocluster.toml` (or the path
//! given with `--config`). Defaults live only in the bundled template.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/logocluster.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/logocluster.toml");

/// Placeholder substituted with the hostname in service URL templates
pub const HOST_PLACEHOLDER: &str = "{host}";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL template in '{field}': {url} (expected http(s):// URL containing {{host}})")]
    InvalidUrlTemplate { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub fetch: FetchConfig,
    pub grouping: GroupingConfig,
    pub services: ServicesConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_redirects: usize,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Worker pool configuration for the fetch phase
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub workers: usize,
}

/// Similarity clustering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GroupingConfig {
    /// Inclusive Hamming distance limit between a seed and a member
    pub threshold: u32,
}

/// Third-party logo and favicon lookup services
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub logo_api_url: String,
    pub favicon_api_url: String,
}

impl ServicesConfig {
    pub fn logo_api_for(&self, hostname: &str) -> String {
        self.logo_api_url.replace(HOST_PLACEHOLDER, hostname)
    }

    pub fn favicon_api_for(&self, hostname: &str) -> String {
        self.favicon_api_url.replace(HOST_PLACEHOLDER, hostname)
    }
}

/// Input file configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub domain_column: String,
}

/// Output file names, relative to the output directory
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub hashes_file: String,
    pub groups_file: String,
    pub failed_file: String,
    pub log_file: String,
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate the bundled template
    pub fn builtin() -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.fetch.workers == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "fetch.workers".to_string(),
            });
        }

        Self::validate_url_template("services.logo_api_url", &self.services.logo_api_url)?;
        Self::validate_url_template("services.favicon_api_url", &self.services.favicon_api_url)?;

        if self.input.domain_column.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "input.domain_column".to_string(),
            });
        }

        let outputs = [
            ("output.hashes_file", &self.output.hashes_file),
            ("output.groups_file", &self.output.groups_file),
            ("output.failed_file", &self.output.failed_file),
            ("output.log_file", &self.output.log_file),
        ];
        for (field, value) in outputs {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: field.to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_url_template(field: &str, url: &str) -> Result<(), ConfigError> {
        let scheme_ok = url.starts_with("https://") || url.starts_with("http://");
        if !scheme_ok || !url.contains(HOST_PLACEHOLDER) {
            return Err(ConfigError::InvalidUrlTemplate {
                field: field.to_string(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Create default configuration file at the given location
    pub fn create_default_config(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::builtin().expect("builtin config");
        assert_eq!(config.fetch.workers, 40);
        assert_eq!(config.grouping.threshold, 25);
        assert_eq!(config.http.request_timeout_secs, 10);
        assert_eq!(config.input.domain_column, "domain");
    }

    #[test]
    fn test_service_templates_substitute_host() {
        let config = AppConfig::builtin().unwrap();
        assert_eq!(
            config.services.logo_api_for("example.com"),
            "https://logo.clearbit.com/example.com"
        );
        assert_eq!(
            config.services.favicon_api_for("example.com"),
            "https://icons.duckduckgo.com/ip3/example.com.ico"
        );
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut config = AppConfig::builtin().unwrap();
        config.services.logo_api_url = "https://logo.example.com/static".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrlTemplate { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig::builtin().unwrap();
        config.http.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRequired { .. })));
    }

    #[test]
    fn test_missing_file_reported() {
        let err = AppConfig::load_from_path(Path::new("/nonexistent/logocluster.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_create_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("logocluster.toml");
        AppConfig::create_default_config(&path).unwrap();
        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.output.groups_file, "logo_groups.json");
    }
}
