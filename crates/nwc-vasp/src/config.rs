//! VASP client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how to reach the VASP's UMA auth API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaspConfig {
    /// Base URL of the UMA auth API, e.g. `https://vasp.example/umanwc`
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for VaspConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VASP_UMA_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9000/umanwc".to_string()),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl VaspConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "NWC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = VaspConfig::new("https://vasp.example/umanwc/");
        assert_eq!(config.url("/payments/bolt11"), "https://vasp.example/umanwc/payments/bolt11");
        assert_eq!(config.url("budget_estimate"), "https://vasp.example/umanwc/budget_estimate");
    }
}
