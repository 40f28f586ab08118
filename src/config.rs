use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for forks-sync
///
/// Constructed once at startup (config file merged with CLI flags) and
/// read-only for the rest of the run.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// GitHub personal access token (falls back to GITHUB_TOKEN)
    #[serde(default)]
    pub token: Option<String>,

    /// Execute mutating git commands; false means dry run
    #[serde(default)]
    pub force: bool,

    /// Maximum number of forks syncing concurrently
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Timeout for each git command in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Storage root under which forks and logs are kept
    #[serde(default = "default_location")]
    pub location: String,
}

// Default value functions
fn default_threads() -> usize {
    10
}
fn default_timeout() -> u64 {
    300
}
fn default_location() -> String {
    "~/forks-sync".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            force: false,
            threads: default_threads(),
            timeout: default_timeout(),
            location: default_location(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("forks-sync").join("config.yml"))
    }

    /// Expand environment variables and `~` in the storage location
    pub fn expand_paths(&mut self) -> Result<()> {
        self.location = shellexpand::full(&self.location)
            .context("Failed to expand location path")?
            .into_owned();

        Ok(())
    }

    /// Directory that holds the local fork clones
    pub fn forks_dir(&self) -> PathBuf {
        PathBuf::from(&self.location).join("forks")
    }

    /// Directory that holds the persistent log files
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.location).join("logs")
    }

    /// Per-command timeout as a Duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.token, None);
        assert!(!config.force);
        assert_eq!(config.threads, 10);
        assert_eq!(config.timeout, 300);
        assert_eq!(config.location, "~/forks-sync");
    }

    #[test]
    fn test_derived_directories() {
        let config = Config {
            location: "/srv/forks-sync".to_string(),
            ..Default::default()
        };

        assert_eq!(config.forks_dir(), PathBuf::from("/srv/forks-sync/forks"));
        assert_eq!(config.log_dir(), PathBuf::from("/srv/forks-sync/logs"));
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_expand_paths() {
        env::set_var("TEST_FORKS_SYNC_HOME", "/test/home");

        let mut config = Config {
            location: "${TEST_FORKS_SYNC_HOME}/forks-sync".to_string(),
            ..Default::default()
        };

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.location, "/test/home/forks-sync");

        env::remove_var("TEST_FORKS_SYNC_HOME");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yml");

        let config = Config {
            token: Some("ghp_testtoken".to_string()),
            force: true,
            threads: 4,
            timeout: 120,
            location: "/custom/path".to_string(),
        };

        config.save(&config_path).expect("Failed to save config");

        let loaded_config = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded_config.token, Some("ghp_testtoken".to_string()));
        assert!(loaded_config.force);
        assert_eq!(loaded_config.threads, 4);
        assert_eq!(loaded_config.timeout, 120);
        assert_eq!(loaded_config.location, "/custom/path");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
token: "ghp_abc123"
force: true
threads: 3
timeout: 600
location: "/tmp/forks"
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.token, Some("ghp_abc123".to_string()));
        assert!(config.force);
        assert_eq!(config.threads, 3);
        assert_eq!(config.timeout, 600);
        assert_eq!(config.location, "/tmp/forks");
    }

    #[test]
    fn test_yaml_parsing_defaults() {
        // An empty mapping should yield the built-in defaults
        let config: Config = serde_yaml::from_str("{}").expect("Failed to parse YAML");

        assert_eq!(config.token, None);
        assert!(!config.force);
        assert_eq!(config.threads, 10);
        assert_eq!(config.timeout, 300);
        assert_eq!(config.location, "~/forks-sync");
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("forks-sync"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }
}
