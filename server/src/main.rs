//! Server entrypoint
//!
//! Wires the layers together with explicit dependency injection and runs
//! the line-delimited JSON loop over stdio. Logs go to stderr — stdout is
//! the wire.

mod rpc;
mod schema;

use anyhow::Result;
use clap::Parser;
use conclave_application::{RunChatUseCase, RunConsensusUseCase};
use conclave_infrastructure::{
    ConfigLoader, FileContextLoader, InMemoryContinuationStore, ProviderCredentials,
    StaticProviderRegistry,
};
use rpc::{Dispatcher, Request, Response};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conclave", about = "Multi-provider AI consensus server")]
struct Cli {
    /// Path to a configuration file (overrides ./conclave.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip configuration files and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };

    // Verbosity flag wins over the configured level
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting conclave server");

    // === Dependency Injection ===
    let registry = Arc::new(StaticProviderRegistry::from_credentials(
        ProviderCredentials::from_env(),
        config.model_timeout(),
    ));
    let store = InMemoryContinuationStore::new(config.store_config());
    let context = Arc::new(FileContextLoader::new());

    let chat = RunChatUseCase::new(registry.clone(), store.clone())
        .with_context_loader(context.clone())
        .with_default_temperature(config.consensus.temperature);
    let consensus = RunConsensusUseCase::new(registry, store.clone())
        .with_context_loader(context)
        .with_params(config.consensus_params());
    let dispatcher = Dispatcher::new(chat, consensus);

    // One JSON request per line in, one JSON response per line out
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatcher.dispatch(request).await,
            Err(error) => {
                warn!("Malformed request line: {}", error);
                Response::fail(serde_json::Value::Null, "invalid-request", error.to_string())
            }
        };
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        stdout.write_all(&payload).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    store.shutdown();
    Ok(())
}
