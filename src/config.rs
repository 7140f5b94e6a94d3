use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::model::UserId;

/// Main configuration structure for runbook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunbookConfig {
    /// Database settings (optional; without them data lives in memory)
    pub database: Option<DatabaseConfig>,
    /// HTTP API settings
    pub server: ServerConfig,
    /// API token to user mapping
    pub auth: AuthConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Defaults for command line use
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Bearer tokens accepted by the API and the user each one acts as
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiToken {
    pub token: String,
    pub user: String,
}

impl AuthConfig {
    pub fn user_for(&self, token: &str) -> Option<UserId> {
        self.tokens
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| UserId::new(entry.user.clone()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    /// Identity recorded for CLI actions when --user is not given
    pub user: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://runbook.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

impl Default for RunbookConfig {
    fn default() -> Self {
        Self {
            database: Some(DatabaseConfig::default()),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            auth: AuthConfig::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            cli: CliConfig::default(),
        }
    }
}

impl RunbookConfig {
    /// Load configuration from the current directory. See [`Self::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files in `dir` (runbook.toml, .runbook-rc)
    /// 3. Environment variables (prefixed with RUNBOOK__, nested with __)
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("runbook.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".runbook-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("RUNBOOK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<RunbookConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = RunbookConfig::load_env_file();
        RunbookConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static RunbookConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_files() {
        let dir = TempDir::new().unwrap();
        let config = RunbookConfig::load_from(dir.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.is_some());
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("runbook.toml"),
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [[auth.tokens]]
            token = "s3cret"
            user = "alice"
            "#,
        )
        .unwrap();

        let config = RunbookConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.user_for("s3cret"), Some(UserId::new("alice")));
        assert_eq!(config.auth.user_for("guess"), None);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let mut config = RunbookConfig::default();
        config.cli.user = Some("ops".to_string());
        config.save_to_file(dir.path().join("runbook.toml")).unwrap();

        let loaded = RunbookConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.cli.user.as_deref(), Some("ops"));
    }
}
