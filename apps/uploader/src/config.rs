//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/boxkit/config.toml`
//! - Windows: `%APPDATA%/boxkit/config.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use boxkit_client::ClientConfig;
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Times a failed upload is resumed before it is aborted.
    #[serde(default = "default_max_resume_attempts")]
    pub max_resume_attempts: u32,

    /// API endpoints and credentials.
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_max_resume_attempts() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            max_resume_attempts: default_max_resume_attempts(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform location.
    ///
    /// A missing file at the platform location is created with defaults; an
    /// explicit path must exist. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::read(&path)?
                } else {
                    let config = Config::default();
                    config.save_to(&path)?;
                    config
                }
            }
        };

        Ok(Self {
            client: config.client.with_env_overrides(),
            ..config
        })
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds an access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("boxkit")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("boxkit").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".boxkit").join("config.toml"))
    }
}
