//! Configuration for the REST AUP plugin.

use serde::{Deserialize, Serialize};

/// Plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestAupPluginConfig {
    /// Root of the policy endpoints, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for RestAupPluginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5544/aup".to_owned(),
            timeout_ms: 2_000,
        }
    }
}
