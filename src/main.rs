//! Loop strategy keeper.
//!
//! Evaluates one batch of monitored events against a deployment's
//! strategies, oracles and lending pool thresholds, then prints the matches.
//!
//! Usage: `keeper [--config deployment.toml] [payload.json]`. The payload is
//! read from stdin when no path is given. Without `--config` the deployment
//! file is taken from `KEEPER_CONFIG`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keeper_api::{HttpKeyValueStore, HttpNotificationClient, KeyValueStore, MemoryKeyValueStore};
use keeper_chain::ProviderManager;
use keeper_core::{
    load_deployment, load_deployment_from_env, Alerter, EpsStore, Evaluator, Keeper, Payload,
};

/// Payload secret overriding the configured store API key.
const STORE_API_KEY_SECRET: &str = "KV_STORE_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(version, about = "Loop strategy keeper: evaluates one batch of monitored events")]
struct Cli {
    /// Payload JSON file (stdin when omitted)
    payload: Option<PathBuf>,

    /// Deployment file, overriding KEEPER_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_deployment(path)?,
        None => load_deployment_from_env()?,
    };
    let config = Arc::new(config);
    config.log_summary();

    let payload = read_payload(cli.payload.as_deref())?;

    let provider = ProviderBuilder::new().on_http(
        config
            .rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", config.rpc_url))?,
    );
    let contracts = ProviderManager::new(provider);
    contracts.verify().await?;

    let store: Arc<dyn KeyValueStore> = match &config.store {
        Some(service) => {
            let api_key = payload
                .secrets
                .get(STORE_API_KEY_SECRET)
                .cloned()
                .or_else(|| service.api_key.clone());
            let mut client = HttpKeyValueStore::new(&service.url);
            if let Some(key) = api_key {
                client = client.with_api_key(key);
            }
            info!(url = %service.url, "Using remote key-value store");
            Arc::new(client)
        }
        None => {
            warn!("No store configured, equity per share history will not persist");
            Arc::new(MemoryKeyValueStore::new())
        }
    };

    let evaluator = Evaluator::new(config.clone(), Arc::new(contracts), EpsStore::new(store));
    let mut keeper = Keeper::new(evaluator);

    if let Some(service) = &config.notifications {
        let mut client = HttpNotificationClient::new(&service.url);
        if let Some(key) = &service.api_key {
            client = client.with_api_key(key);
        }
        let alerter = Alerter::new(Arc::new(client), config.clone());
        if let Err(e) = alerter.check_alert_channels_exist().await {
            warn!(error = %e, "Failed to list notification channels");
        }
        keeper = keeper.with_alerter(alerter);
    }

    let response = keeper.handle(&payload).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keeper_core=debug,keeper_chain=debug"));

    // Logs go to stderr so stdout carries only the response
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn read_payload(path: Option<&Path>) -> Result<Payload> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read payload from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Invalid payload JSON")
}
