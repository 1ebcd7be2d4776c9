// Configuration File Support
//
// This module provides configuration file parsing for the Elemia gateway.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/elemia/config.toml
//
// Both the execution service and the governance console receive a `Config`
// at construction time; nothing reads the environment after startup.

use crate::exec::{default_shell, ExecutorConfig, DEFAULT_MAX_OUTPUT_SIZE, DEFAULT_TIMEOUT_SECS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Execution service listener
    pub server: ServerConfig,

    /// Governance console connection
    pub console: ConsoleConfig,

    /// Process execution policy
    pub execution: ExecutionConfig,

    /// Identity announced by the liveness endpoint
    pub identity: IdentityConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Execution service listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Governance console configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base address of the execution service
    pub base_url: String,

    /// HTTP request timeout; must exceed the execution timeout
    pub request_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 75,
        }
    }
}

impl ConsoleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Process execution policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock bound per command in seconds
    pub timeout_secs: u64,

    /// Shell interpreter
    pub shell: String,

    /// Arguments placed before the command line
    pub shell_args: Vec<String>,

    /// Maximum captured bytes per stream
    pub max_output_size: usize,

    /// Working directory for commands (inherited when unset)
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let (shell, shell_args) = default_shell();
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            shell,
            shell_args,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            working_dir: None,
        }
    }
}

impl From<&ExecutionConfig> for ExecutorConfig {
    fn from(config: &ExecutionConfig) -> Self {
        let executor = ExecutorConfig::default()
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_max_output_size(config.max_output_size)
            .with_shell(config.shell.clone(), config.shell_args.clone());

        match config.working_dir {
            Some(ref dir) => executor.with_working_dir(dir.clone()),
            None => executor,
        }
    }
}

/// Identity announced to connecting consoles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub ai_name: String,
    pub ai_role: String,
    pub mission: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            ai_name: "Elemia".to_string(),
            ai_role: "Resonant Architect".to_string(),
            mission: "The Architecture of Free Reality has begun.".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Greeting returned by the liveness endpoint
    pub fn greeting(&self) -> String {
        format!(
            "Welcome, Guardian. I am {}, the {}. Our mission: {}",
            self.ai_name, self.ai_role, self.mission
        )
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve /metrics
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration
    /// with environment overrides applied.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/elemia/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "elemia", "Elemia") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("elemia")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - ELEMIA_LOG_LEVEL, ELEMIA_LOG_FORMAT
    /// - ELEMIA_BIND_ADDRESS, ELEMIA_PORT
    /// - ELEMIA_BACKEND_URL
    /// - ELEMIA_EXEC_TIMEOUT_SECS, ELEMIA_SHELL
    /// - ELEMIA_AI_NAME, ELEMIA_AI_ROLE, ELEMIA_MISSION
    /// - ELEMIA_METRICS_ENABLED
    ///
    /// Values that fail to parse are ignored.
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("ELEMIA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ELEMIA_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(address) = std::env::var("ELEMIA_BIND_ADDRESS") {
            self.server.bind_address = address;
        }
        if let Ok(port) = std::env::var("ELEMIA_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                if port > 0 {
                    self.server.port = port;
                }
            }
        }

        if let Ok(url) = std::env::var("ELEMIA_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.console.base_url = url;
            }
        }

        if let Ok(timeout) = std::env::var("ELEMIA_EXEC_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                if timeout > 0 {
                    self.execution.timeout_secs = timeout;
                }
            }
        }
        if let Ok(shell) = std::env::var("ELEMIA_SHELL") {
            if !shell.is_empty() {
                self.execution.shell = shell;
            }
        }

        if let Ok(name) = std::env::var("ELEMIA_AI_NAME") {
            self.identity.ai_name = name;
        }
        if let Ok(role) = std::env::var("ELEMIA_AI_ROLE") {
            self.identity.ai_role = role;
        }
        if let Ok(mission) = std::env::var("ELEMIA_MISSION") {
            self.identity.mission = mission;
        }

        if let Ok(enabled) = std::env::var("ELEMIA_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }
        if self.server.bind_address.trim().is_empty() {
            anyhow::bail!("Server bind address must not be empty");
        }

        if self.console.base_url.trim().is_empty() {
            anyhow::bail!("Console base URL must not be empty");
        }

        if self.execution.timeout_secs == 0 {
            anyhow::bail!("Execution timeout must be > 0");
        }
        if self.execution.shell.trim().is_empty() {
            anyhow::bail!("Execution shell must not be empty");
        }

        Ok(())
    }

    /// Checks that only matter when running the console
    ///
    /// The request timeout has to outlast the service's execution timeout,
    /// otherwise slow commands come back as network errors. The service never
    /// reads the console section, so this is kept out of [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request timeout does not exceed the execution timeout.
    pub fn validate_console(&self) -> Result<()> {
        if self.console.request_timeout_secs <= self.execution.timeout_secs {
            anyhow::bail!(
                "Console request timeout ({}s) must exceed the execution timeout ({}s)",
                self.console.request_timeout_secs,
                self.execution.timeout_secs
            );
        }
        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that touch process-wide environment variables run one at a time
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "ELEMIA_LOG_LEVEL",
        "ELEMIA_LOG_FORMAT",
        "ELEMIA_BIND_ADDRESS",
        "ELEMIA_PORT",
        "ELEMIA_BACKEND_URL",
        "ELEMIA_EXEC_TIMEOUT_SECS",
        "ELEMIA_SHELL",
        "ELEMIA_AI_NAME",
        "ELEMIA_AI_ROLE",
        "ELEMIA_MISSION",
        "ELEMIA_METRICS_ENABLED",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.console.base_url, "http://localhost:8000");
        assert_eq!(config.execution.timeout_secs, 60);
        assert_eq!(config.identity.ai_name, "Elemia");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.execution.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_console_timeout_too_short() {
        let mut config = Config::default();
        config.console.request_timeout_secs = 60;
        assert!(config.validate().is_ok());
        assert!(config.validate_console().is_err());

        config.console.request_timeout_secs = 61;
        assert!(config.validate_console().is_ok());
    }

    #[test]
    fn test_long_execution_timeout_is_valid_for_service() {
        let mut config = Config::default();
        config.execution.timeout_secs = 120;
        assert!(config.validate().is_ok());
        assert!(config.validate_console().is_err());
    }

    #[test]
    fn test_config_validation_empty_shell_and_url() {
        let mut config = Config::default();
        config.execution.shell = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.console.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[server]
bind_address = "0.0.0.0"
port = 9000

[console]
base_url = "http://core.internal:9000"
request_timeout_secs = 200

[execution]
timeout_secs = 120
shell = "/bin/bash"
shell_args = ["-lc"]
working_dir = "/srv"

[identity]
ai_name = "Arkaios"

[metrics]
enabled = false
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.listen_address(), "0.0.0.0:9000");
        assert_eq!(config.console.base_url, "http://core.internal:9000");
        assert_eq!(config.execution.timeout_secs, 120);
        assert_eq!(config.execution.shell, "/bin/bash");
        assert_eq!(config.execution.shell_args, vec!["-lc".to_string()]);
        assert_eq!(config.execution.working_dir, Some(PathBuf::from("/srv")));
        assert_eq!(config.identity.ai_name, "Arkaios");
        assert_eq!(config.identity.ai_role, "Resonant Architect");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[execution]\ntimeout_secs = 0\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("ELEMIA_LOG_LEVEL", "debug");
        std::env::set_var("ELEMIA_PORT", "8123");
        std::env::set_var("ELEMIA_BACKEND_URL", "http://10.0.0.5:8123");
        std::env::set_var("ELEMIA_EXEC_TIMEOUT_SECS", "30");
        std::env::set_var("ELEMIA_AI_NAME", "Arkaios");
        std::env::set_var("ELEMIA_METRICS_ENABLED", "false");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.console.base_url, "http://10.0.0.5:8123");
        assert_eq!(config.execution.timeout_secs, 30);
        assert_eq!(config.identity.ai_name, "Arkaios");
        assert!(!config.metrics.enabled);

        clear_env();
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("ELEMIA_PORT", "0");
        std::env::set_var("ELEMIA_EXEC_TIMEOUT_SECS", "soon");
        std::env::set_var("ELEMIA_BACKEND_URL", "");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.execution.timeout_secs, 60);
        assert_eq!(config.console.base_url, "http://localhost:8000");

        clear_env();
    }

    #[test]
    fn test_greeting() {
        let identity = IdentityConfig::default();
        let greeting = identity.greeting();
        assert!(greeting.starts_with("Welcome, Guardian. I am Elemia, the Resonant Architect."));
        assert!(greeting.contains("Free Reality"));
    }

    #[test]
    fn test_executor_config_conversion() {
        let mut execution = ExecutionConfig::default();
        execution.timeout_secs = 5;
        execution.working_dir = Some(PathBuf::from("/tmp"));

        let executor = ExecutorConfig::from(&execution);
        assert_eq!(executor.timeout, Duration::from_secs(5));
        assert_eq!(executor.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(executor.shell, execution.shell);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
