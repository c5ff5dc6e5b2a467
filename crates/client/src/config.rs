//! Connection settings for [`UploadClient`](crate::UploadClient).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`ClientConfig::access_token`].
pub const ACCESS_TOKEN_ENV: &str = "BOXKIT_ACCESS_TOKEN";

/// API endpoints, credentials, and transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the metadata API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the upload API.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// OAuth2 bearer token.
    #[serde(default)]
    pub access_token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_api_url() -> String {
    "https://api.box.com/2.0".into()
}

fn default_upload_url() -> String {
    "https://upload.box.com/api/2.0".into()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("boxkit/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            upload_url: default_upload_url(),
            access_token: String::new(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_access_token(std::env::var(ACCESS_TOKEN_ENV).ok())
    }

    fn with_access_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.access_token = token.trim().to_string();
        }
        self
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
