//! wallet-session CLI
//!
//! Connects a local keypair wallet to a JSON-RPC node, reports its balance,
//! and sends test transfers.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI args / config file / env
//!            │
//!            ▼
//!   ┌──────────────────────────────────────────────┐
//!   │                WalletSession                 │
//!   │  in-flight guard → state (ArcSwap) → events  │
//!   └──────┬───────────────────────────┬───────────┘
//!          │                           │
//!          ▼                           ▼
//!   ┌──────────────┐           ┌───────────────┐
//!   │ KeypairWallet│           │   RpcClient   │──────▶ JSON-RPC node
//!   │ (sign)       │           │ (balance/send)│
//!   └──────────────┘           └───────────────┘
//! ```
//!
//! Logs go to stderr; command results go to stdout.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::{self, error::RecvError};

use wallet_session::blockchain::KeypairWallet;
use wallet_session::config::validation::validate_config;
use wallet_session::config::{apply_env_overrides, load_config, ConfigError, WalletConfig};
use wallet_session::observability::init_logging;
use wallet_session::session::{SessionEvent, WalletSession};

#[derive(Parser)]
#[command(name = "wallet-session")]
#[command(about = "Connect a keypair wallet, check its balance, send test transfers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint (overrides config and environment)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Keypair file (JSON array of 64 bytes)
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print the wallet address
    Address,
    /// Connect, fetch the balance, and print the session state
    Balance,
    /// Send a native-token transfer and wait for confirmation
    Transfer {
        /// Destination address (base58)
        #[arg(long)]
        to: String,

        /// Amount in SOL
        #[arg(long)]
        amount: f64,
    },
    /// Generate a new keypair file
    Keygen {
        /// Output path
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = WalletConfig::default();
            apply_env_overrides(&mut config);
            config
        }
    };
    if let Some(url) = cli.rpc_url {
        config.rpc.endpoint = url;
    }
    if let Some(path) = &cli.keypair {
        config.wallet.keypair_path = Some(path.display().to_string());
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);
    tracing::debug!(
        endpoint = %config.rpc.endpoint,
        commitment = %config.rpc.commitment,
        "Configuration loaded"
    );

    let command = match cli.command {
        Commands::Keygen { out, force } => return keygen(&out, force),
        Commands::Address => SessionCommand::Address,
        Commands::Balance => SessionCommand::Balance,
        Commands::Transfer { to, amount } => SessionCommand::Transfer { to, amount },
    };

    let session = WalletSession::from_config(&config)?;
    let events = tokio::spawn(log_events(session.subscribe()));

    let outcome = run(&session, command).await;

    if session.state().is_connected() {
        if let Err(e) = session.disconnect().await {
            tracing::warn!(error = %e, "Disconnect on exit failed");
        }
    }
    drop(session);
    let _ = events.await;

    outcome
}

/// Commands that need a wallet session.
enum SessionCommand {
    Address,
    Balance,
    Transfer { to: String, amount: f64 },
}

async fn run(session: &WalletSession, command: SessionCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        SessionCommand::Address => {
            let address = session.connect().await?;
            println!("{}", address);
        }
        SessionCommand::Balance => {
            session.connect().await?;
            // connect already tried once; surface a failure as an error here
            if let Some(err) = session.state().last_error {
                return Err(err.into());
            }
            println!("{}", serde_json::to_string_pretty(&session.state())?);
        }
        SessionCommand::Transfer { to, amount } => {
            session.connect().await?;
            let signature = session.send_test_transfer(&to, amount).await?;
            println!("{}", signature);
        }
    }
    Ok(())
}

fn keygen(out: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if out.exists() && !force {
        return Err(format!("{} already exists; pass --force to overwrite", out.display()).into());
    }
    let wallet = KeypairWallet::generate("keygen");
    wallet.write_file(out)?;
    if let Some(address) = wallet.address() {
        println!("{}", address);
    }
    Ok(())
}

async fn log_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                tracing::debug!(operation_id = %event.operation_id(), event = %json, "Session event");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session event subscriber lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
