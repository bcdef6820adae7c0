//! Keel node inspector.
//!
//! Opens a node data directory and reports on the chain it holds: the head,
//! a trace from the tail toward genesis, single block lookups, and the
//! Prometheus metrics. `demo` produces a short chain and a competing branch
//! to exercise a reorganization end to end.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use keel_core::constants::{MAINNET_CHAIN_ID, TESTNET_CHAIN_ID};
use keel_core::traits::TransactionPool;
use keel_core::types::{Hash256, Transaction};
use keel_node_lib::{Node, NodeConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "keel-node", version, about = "Keel chain-state node")]
struct Args {
    /// Data directory for chain storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// Follow the test network instead of mainnet
    #[arg(long, conflicts_with = "chain_id")]
    testnet: bool,

    /// Explicit chain id
    #[arg(long)]
    chain_id: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical head.
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Trace blocks from the tail toward genesis.
    Dump {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Look up a block by hex hash.
    Block { hash: String },
    /// Print chain metrics in Prometheus text format.
    Metrics,
    /// Produce blocks, then import a longer competing branch.
    Demo {
        #[arg(long, default_value_t = 3)]
        blocks: u64,
    },
}

impl Args {
    fn to_config(&self) -> NodeConfig {
        let defaults = NodeConfig::default();
        let chain_id = match (self.chain_id, self.testnet) {
            (Some(id), _) => id,
            (None, true) => TESTNET_CHAIN_ID,
            (None, false) => MAINNET_CHAIN_ID,
        };
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None if chain_id == MAINNET_CHAIN_ID => defaults.data_dir.clone(),
            None => defaults.data_dir.join(format!("chain-{chain_id}")),
        };
        NodeConfig {
            data_dir,
            chain_id,
            log_level: self.log_level.clone(),
            ..defaults
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.to_config();
    init_logging(&config.log_level, &args.log_format);

    info!("Keel node v{}", env!("CARGO_PKG_VERSION"));
    info!("chain_id: {}", config.chain_id);
    info!("data_dir: {:?}", config.data_dir);

    let node = Node::open(config).context("failed to open node")?;

    match args.command {
        Command::Status { json: true } => {
            let status = node.status();
            let value = serde_json::json!({
                "chainId": status.chain_id,
                "genesis": status.genesis.to_string(),
                "tail": status.tail.to_string(),
                "height": status.height,
                "detachedTips": status.detached_tips,
                "pendingTransactions": status.pending_transactions,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Status { json: false } => print_status(&node),
        Command::Dump { count } => println!("{}", node.chain().dump(count)),
        Command::Block { hash } => print_block(&node, &hash)?,
        Command::Metrics => print!("{}", node.metrics().encode()?),
        Command::Demo { blocks } => run_demo(&node, blocks)?,
    }
    Ok(())
}

fn print_status(node: &Node) {
    let status = node.status();
    println!("chain_id:      {}", status.chain_id);
    println!("genesis:       {}", status.genesis);
    println!("tail:          {}", status.tail);
    println!("height:        {}", status.height);
    println!("detached tips: {}", status.detached_tips);
    println!("pending txs:   {}", status.pending_transactions);
}

fn print_block(node: &Node, hash: &str) -> anyhow::Result<()> {
    let Some(hash) = Hash256::from_hex(hash) else {
        bail!("not a 32-byte hex hash: {hash}");
    };
    let Some(block) = node.chain().get_block(&hash) else {
        bail!("block {hash} not found");
    };
    println!("{}", block.summary());
    println!("timestamp: {}", block.header().timestamp);
    println!("txs_root:  {}", block.txs_root());
    for tx in block.transactions() {
        println!(
            "  tx {}  nonce={} value={} payload={}",
            tx.txid()?,
            tx.nonce,
            tx.value,
            hex::encode(&tx.payload)
        );
    }
    Ok(())
}

/// Build `blocks` blocks on the tail, then a branch one block longer from
/// the same starting point, and import it so fork choice reorganizes.
fn run_demo(node: &Node, blocks: u64) -> anyhow::Result<()> {
    let chain = node.chain();
    let start = chain.tail();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs();

    for i in 0..blocks {
        node.pool()
            .insert(demo_tx(start.height() + i, now))
            .context("pool rejected demo transaction")?;
        let outcome = node.produce_block(Hash256([0xA1; 32]), now + i)?;
        info!(tail = %outcome.tail, height = outcome.height, "produced block");
    }

    let mut branch = Vec::new();
    let mut parent = start;
    for i in 0..=blocks {
        let block = chain.new_block_from_parent(Hash256([0xB2; 32]), &parent, now + i)?;
        branch.push(block.block().clone());
        parent = block;
    }
    let outcome = node.import(branch)?;
    info!(
        tail = %outcome.tail,
        height = outcome.height,
        returned = node.pool().len(),
        "imported competing branch"
    );

    print_status(node);
    Ok(())
}

fn demo_tx(nonce: u64, timestamp: u64) -> Transaction {
    Transaction {
        version: 1,
        from: Hash256([0x01; 32]),
        to: Hash256([0x02; 32]),
        value: 1,
        nonce,
        payload: timestamp.to_le_bytes().to_vec(),
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
