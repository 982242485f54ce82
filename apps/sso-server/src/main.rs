//! SSO server binary: loads configuration, wires the collaborator plugins
//! into the engine and serves HTTP until interrupted.

mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use sso_engine::domain::clock::SystemClock;
use sso_engine::{Collaborators, SsoEngine};
use sso_engine_sdk::AupPluginClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Ticket-based single sign-on server
#[derive(Parser, Debug)]
#[command(name = "sso-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "SSO_CONFIG")]
    config: Option<PathBuf>,

    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn collaborators(cfg: &AppConfig) -> anyhow::Result<Collaborators> {
    let static_plugin = Arc::new(static_sso_plugin::Service::from_config(&cfg.plugins.static_sso));

    let aup: Option<Arc<dyn AupPluginClient>> = match &cfg.plugins.rest_aup {
        Some(rest) => {
            info!(base_url = %rest.base_url, "Usage policy delegated to REST service");
            let service = rest_aup_plugin::Service::from_config(rest)
                .context("invalid rest_aup plugin config")?;
            Some(Arc::new(service))
        }
        None if static_plugin.aup_enabled() => Some(static_plugin.clone()),
        None => None,
    };

    Ok(Collaborators {
        credentials: static_plugin.clone(),
        second_factor: static_plugin.clone(),
        aup,
        surrogates: static_plugin,
    })
}

fn build_engine(cfg: &AppConfig) -> anyhow::Result<Arc<SsoEngine>> {
    if cfg.plugins.static_sso.users.is_empty() {
        warn!("No users configured; every login will fail");
    }
    SsoEngine::new(
        cfg.engine.clone(),
        collaborators(cfg)?,
        Arc::new(SystemClock),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = AppConfig::load(args.config.as_deref())?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    logging::init(&cfg.logging)?;

    let engine = build_engine(&cfg)?;
    if args.check {
        info!("Configuration is valid");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
            }
            cancel.cancel();
        });
    }

    let reclaimer = engine.spawn_reclaimer(cancel.clone());
    let result = engine.serve(cfg.server.bind_addr, cancel.clone()).await;
    cancel.cancel();
    if let Some(handle) = reclaimer
        && let Err(e) = handle.await
    {
        warn!(error = %e, "Ticket reclaimer task failed");
    }
    result
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn sample_config_builds_an_engine() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/sso.yaml");
        let cfg = AppConfig::load(Some(&path)).unwrap();
        let engine = build_engine(&cfg).unwrap();
        assert!(!engine.services().is_empty());
    }

    #[test]
    fn rest_aup_replaces_static_store() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            b"plugins:\n  static:\n    aup:\n      enabled: false\n  rest_aup:\n    base_url: \"http://127.0.0.1:5544/aup\"\n",
        )
        .unwrap();
        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert!(collaborators(&cfg).unwrap().aup.is_some());
    }

    #[test]
    fn rejects_bad_service_pattern() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            b"engine:\n  services:\n    - id: 1\n      name: broken\n      service_id: \"(unclosed\"\n",
        )
        .unwrap();
        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert!(build_engine(&cfg).is_err());
    }
}
