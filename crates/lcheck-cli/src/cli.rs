use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lcheck",
    about = "Ledger database integrity auditor",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rebuild each ledger's state by full traversal and check its digest
    Objects(RunArgs),
    /// Check the first ledger by traversal, the rest through diff sets
    Diff(RunArgs),
    /// Check transaction digests and secondary indexes
    Tx(TxArgs),
    /// Check the ledger-hash reverse index
    LedgerHash(LedgerHashArgs),
    /// Write a simulated ledger history to a fixture file
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON fixture store to audit
    #[arg(long)]
    pub store: PathBuf,
    /// TOML audit configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// First ledger to check
    #[arg(short = 'f', long)]
    pub from: u64,
    /// Last ledger to check; 0 means the newest stored ledger
    #[arg(short = 'e', long, default_value = "0")]
    pub to: u64,
    /// Ledgers verified concurrently per wave
    #[arg(short = 's', long)]
    pub wave_size: Option<usize>,
    /// Preceding diff sets used to partition the key space
    #[arg(short = 'd', long)]
    pub fanout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct TxArgs {
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(long)]
    pub skip_digest: bool,
    #[arg(long)]
    pub skip_account_check: bool,
    #[arg(long)]
    pub skip_nft_check: bool,
    #[arg(long)]
    pub skip_diff_check: bool,
    /// Insert missing NFT URI rows
    #[arg(long)]
    pub fix_nft_uri: bool,
}

#[derive(Args, Debug)]
pub struct LedgerHashArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// Insert missing ledger-hash rows
    #[arg(long)]
    pub fix_ledger_hash: bool,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Fixture file to write
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, default_value = "20")]
    pub ledgers: u64,
    #[arg(long, default_value = "7")]
    pub seed: u64,
    /// Sequence of the first simulated ledger
    #[arg(long, default_value = "1")]
    pub first: u64,
    /// Ledgers whose header state digest gets overwritten
    #[arg(long, value_delimiter = ',')]
    pub corrupt_state: Vec<u64>,
    /// Ledgers whose header transaction digest gets overwritten
    #[arg(long, value_delimiter = ',')]
    pub corrupt_tx: Vec<u64>,
    /// Ledgers whose ledger-hash row gets dropped
    #[arg(long, value_delimiter = ',')]
    pub drop_ledger_hash: Vec<u64>,
    /// Ledgers whose NFT URI rows get dropped
    #[arg(long, value_delimiter = ',')]
    pub drop_nft_uri: Vec<u64>,
}
