//! Server configuration: defaults, then a YAML file, then `SSO__` variables.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use rest_aup_plugin::RestAupPluginConfig;
use serde::{Deserialize, Serialize};
use sso_engine::SsoEngineConfig;
use static_sso_plugin::StaticSsoPluginConfig;

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `SSO__SERVER__BIND_ADDR=0.0.0.0:8443`.
pub const ENV_PREFIX: &str = "SSO__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub engine: SsoEngineConfig,
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,tower_http=debug".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsConfig {
    /// Accounts, surrogate rules and the in-memory policy store.
    #[serde(rename = "static")]
    pub static_sso: StaticSsoPluginConfig,
    /// When set, the usage policy is delegated to this REST service
    /// instead of the static store.
    pub rest_aup: Option<RestAupPluginConfig>,
}

impl AppConfig {
    /// Layer the optional YAML file and environment overrides over the
    /// struct defaults. Secrets serialize redacted, so defaults are not
    /// fed through a serialized provider.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file '{}' not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}
