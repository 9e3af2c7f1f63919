mod api;
mod config;

use clap::Parser;
use ledger_core::{AccountId, BlockStore, Genesis, State, Worker};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> shared::Result<()> {
    let cli = config::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(path = %cli.genesis_path.display(), "loading genesis");
    let genesis = Genesis::load(&cli.genesis_path)?;

    let store = BlockStore::open(&cli.store_dir)?;
    let state = Arc::new(State::new(genesis, store)?);
    info!(number = state.latest_block_number(), "chain loaded");

    let beneficiary = cli.beneficiary.as_deref().map(AccountId::new).transpose()?;

    let worker = beneficiary.map(|beneficiary| {
        info!(%beneficiary, "mining worker enabled");
        let worker = Worker::spawn(Arc::clone(&state), beneficiary);
        state.set_mining_trigger(worker.mining_trigger());
        if cli.mine_on_start {
            worker.start_mining();
        }
        worker
    });

    if worker.is_none() {
        warn!("no beneficiary configured; node will serve reads and accept transactions only");
    }

    let app = api::router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&cli.bind_addr).await?;
    info!(addr = %cli.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = worker {
        worker.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to install Ctrl+C handler; shutdown must be signalled externally");
    }
}
