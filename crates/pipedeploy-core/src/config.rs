//! Configuration schema (pipedeploy.toml)

use serde::{Deserialize, Serialize};

/// Environments accepted when the config file does not list its own
fn default_allowed_environments() -> Vec<String> {
    vec!["DEV".to_string(), "PROD".to_string()]
}

/// Project-level configuration
///
/// Everything here is optional. Values from the process environment take
/// precedence over the file, and the file over built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Environment names a deploy may target (upper case).
    /// An empty list disables the membership check.
    #[serde(default = "default_allowed_environments")]
    pub allowed_environments: Vec<String>,

    /// Warehouse override for task execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,

    /// Role override for the deploy session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Directory relative paths (such as `SNOWFLAKE_PRIVATE_KEY_PATH`)
    /// resolve against: the config file's directory, else the working
    /// directory
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            allowed_environments: default_allowed_environments(),
            warehouse: None,
            role: None,
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl ProjectConfig {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Check whether an (already normalized) environment may be deployed
    pub fn is_environment_allowed(&self, environment: &str) -> bool {
        self.allowed_environments.is_empty()
            || self
                .allowed_environments
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(environment))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid environment name '{0}': expected letters, digits and underscores, starting with a letter")]
    InvalidEnvironment(String),

    #[error("Invalid value '{value}' for {origin}: expected letters, digits and underscores, starting with a letter")]
    InvalidOverride { origin: String, value: String },

    #[error("Unknown environment '{environment}'. Allowed: {}", .allowed.join(", "))]
    UnknownEnvironment {
        environment: String,
        allowed: Vec<String>,
    },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
