//! CLI flags and environment overrides for node startup.

use clap::Parser;
use std::path::PathBuf;

/// A self-contained proof-of-work ledger node.
#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Account-model proof-of-work ledger node")]
#[command(version)]
pub struct Cli {
    /// Path to the genesis JSON document.
    #[arg(long, default_value = "zblock/genesis.json", env = "LEDGER_GENESIS_PATH")]
    pub genesis_path: PathBuf,

    /// Directory blocks are persisted to.
    #[arg(long, default_value = "zblock/blocks", env = "LEDGER_STORE_DIR")]
    pub store_dir: PathBuf,

    /// Account credited with mining rewards. Required to mine; a node can
    /// still serve reads and accept transactions without it.
    #[arg(long, env = "LEDGER_BENEFICIARY")]
    pub beneficiary: Option<String>,

    /// Address the HTTP API binds to.
    #[arg(long, default_value = "127.0.0.1:8080", env = "LEDGER_BIND_ADDR")]
    pub bind_addr: String,

    /// `trace`, `debug`, `info`, `warn`, or `error`.
    #[arg(long, default_value = "info", env = "LEDGER_LOG_LEVEL")]
    pub log_level: String,

    /// Start the mining worker immediately instead of waiting for the
    /// first submitted transaction.
    #[arg(long)]
    pub mine_on_start: bool,
}
