//! Client configuration
//!
//! A [`ClientConfig`] is read from YAML and can be overridden from the
//! environment:
//!
//! ```yaml
//! endpoint: http://192.168.1.10:1400/MediaRenderer/AVTransport/Control
//! timeout_secs: 10
//! user_agent: PMOMusic/0.3.10
//! action_convention: soap_action_header
//! ```

use crate::client::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::Result;
use crate::request::ActionConvention;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

pub const ENV_ENDPOINT: &str = "PMOSOAP_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "PMOSOAP_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "PMOSOAP_USER_AGENT";

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Settings for building a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service endpoint URL
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub action_convention: ActionConvention,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            action_convention: ActionConvention::default(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_yaml_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), endpoint = %config.endpoint, "SOAP client configuration loaded");
        Ok(config)
    }

    /// Applies `PMOSOAP_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; unparsable values are ignored.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS).and_then(|v| v.trim().parse().ok()) {
            self.timeout_secs = timeout;
        }
        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            self.user_agent = user_agent;
        }
        self
    }
}
