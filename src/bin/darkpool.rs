//! Command-line client for the dark pool.
//!
//! Run with:
//!   cargo run --bin darkpool -- --config darkpool.toml commit --instrument 0x.. \
//!       --kind limit --side buy --quantity 1000 --limit-price 500 --expires-in 2h
//!   cargo run --bin darkpool -- reveal 0x<commitment>

use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use dark_pool::adapters::bb_prover::BBProver;
use dark_pool::adapters::ethereum::EthereumLedger;
use dark_pool::adapters::file_store::FileSecretStore;
use dark_pool::clock::{Clock, SystemClock};
use dark_pool::config::{ConfigError, DarkPoolConfig};
use dark_pool::domain::commitment::Commitment;
use dark_pool::domain::order::{InstrumentRef, OrderKind, OrderParameters, Side};
use dark_pool::error::OrderError;
use dark_pool::orchestrator::{OrderOrchestrator, WriteOutcome};
use dark_pool::ports::ledger::LedgerError;
use dark_pool::ports::store::StoreError;

#[derive(Parser)]
#[command(name = "darkpool", about = "Commit-reveal client for dark-pool orders")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./darkpool.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Commit a new hidden order.
    Commit {
        /// Token contract of the instrument.
        #[arg(long)]
        instrument: Address,
        /// Token id within the contract (0 for fungible tokens).
        #[arg(long, default_value = "0")]
        instrument_id: U256,
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long, value_enum)]
        side: SideArg,
        #[arg(long)]
        quantity: U256,
        #[arg(long, default_value = "0")]
        limit_price: U256,
        #[arg(long, default_value = "0")]
        minimum_fill: U256,
        /// Order lifetime from now (e.g. "2h", "1d").
        #[arg(long, value_parser = parse_duration)]
        expires_in: Duration,
        /// Value escrowed with the commitment, in wei.
        #[arg(long, default_value = "0")]
        escrow: U256,
        /// Return once the commitment is broadcast instead of waiting for it to be mined.
        #[arg(long)]
        no_wait: bool,
    },
    /// Reveal a committed order.
    Reveal {
        commitment: Commitment,
        /// Run the local checks only; nothing is proved or sent.
        #[arg(long)]
        dry_run: bool,
    },
    /// Cancel a committed order and release its escrow.
    Cancel { commitment: Commitment },
    /// Show the phase and reveal timing of an order.
    Status { commitment: Commitment },
    /// List orders with a stored secret.
    Pending,
    /// Delete the secret of an expired order that never reached the ledger.
    Discard { commitment: Commitment },
    /// Reconcile stored secrets with the ledger.
    Recover {
        /// Re-broadcast commitments the ledger never received.
        #[arg(long)]
        retry: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Market,
    Limit,
    Iceberg,
    Vwap,
    Twap,
}

impl From<KindArg> for OrderKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Market => OrderKind::Market,
            KindArg::Limit => OrderKind::Limit,
            KindArg::Iceberg => OrderKind::Iceberg,
            KindArg::Vwap => OrderKind::VolumeWeighted,
            KindArg::Twap => OrderKind::TimeWeighted,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

fn parse_duration(s: &str) -> Result<Duration, humantime_serde::re::humantime::DurationError> {
    humantime_serde::re::humantime::parse_duration(s)
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Order(#[from] OrderError),
}

type Orchestrator = OrderOrchestrator<EthereumLedger, FileSecretStore, BBProver, SystemClock>;

async fn build(config: &DarkPoolConfig) -> Result<Orchestrator, CliError> {
    let ledger = EthereumLedger::new(
        &config.ledger.rpc_url,
        &config.ledger.private_key,
        config.ledger.contract,
    )
    .await?;
    let trader = ledger.trader();
    let store = FileSecretStore::open(&config.store.dir).await?;
    let prover = BBProver::new(config.prover.circuits_dir.clone());

    info!("  Trader:   {trader}");
    info!("  Contract: {}", config.ledger.contract);
    info!("  Secrets:  {}", store.dir().display());

    Ok(OrderOrchestrator::new(ledger, store, prover, SystemClock, trader)
        .with_reveal_gate(config.protocol.reveal_gate())
        .with_submission_timeout(config.protocol.submission_timeout))
}

fn log_outcome(outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Confirmed(tx) => info!("  tx: {:#x}", tx.tx_hash),
        WriteOutcome::AlreadyFinal => info!("  already recorded on the ledger; local secret removed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = DarkPoolConfig::load(&args.config)?;
    let orchestrator = build(&config).await?;

    match args.command {
        Command::Commit {
            instrument,
            instrument_id,
            kind,
            side,
            quantity,
            limit_price,
            minimum_fill,
            expires_in,
            escrow,
            no_wait,
        } => {
            let params = OrderParameters {
                instrument: InstrumentRef::new(instrument, instrument_id),
                kind: kind.into(),
                side: side.into(),
                quantity,
                limit_price,
                minimum_fill,
                expiry: SystemClock.now().saturating_add(expires_in.as_secs()),
            };
            let ticket = orchestrator.submit_commit(params, escrow).await?;
            info!("Committed {}", ticket.commitment);
            info!("  tx: {:#x}", ticket.tx_hash);
            if !no_wait {
                let tx = orchestrator.confirm_commit(&ticket).await?;
                info!("  confirmed: {:#x}", tx.tx_hash);
            }
            info!(
                "  reveal possible in {}",
                humantime_serde::re::humantime::format_duration(orchestrator.gate().delay())
            );
        }
        Command::Reveal {
            commitment,
            dry_run: true,
        } => {
            let report = orchestrator.dry_run_reveal(commitment).await?;
            info!("Dry run for {commitment}");
            match &report.integrity_error {
                None => info!("  secret:    matches commitment"),
                Some(e) => warn!("  secret:    {e}"),
            }
            info!("  committed: {:?}", report.committed_on_ledger);
            info!("  expired:   {}", report.expired);
            info!(
                "  gate:      {}",
                if report.reveal.allowed {
                    "open".to_string()
                } else {
                    format!("{}s remaining", report.reveal.remaining_secs)
                }
            );
            info!("  would prove: {}", report.would_prove());
        }
        Command::Reveal { commitment, .. } => {
            let outcome = orchestrator.submit_reveal(commitment).await?;
            info!("Revealed {commitment}");
            log_outcome(&outcome);
        }
        Command::Cancel { commitment } => {
            let outcome = orchestrator.cancel(commitment).await?;
            info!("Cancelled {commitment}");
            log_outcome(&outcome);
        }
        Command::Discard { commitment } => {
            orchestrator.discard_unsent(commitment).await?;
            info!("Discarded {commitment}");
        }
        Command::Status { commitment } => {
            let phase = orchestrator.order_phase(commitment).await?;
            info!("{commitment}: {phase:?}");
            match orchestrator.reveal_status(commitment).await {
                Ok(status) if status.allowed => info!("  reveal gate open"),
                Ok(status) => info!("  reveal in {}s", status.remaining_secs),
                Err(OrderError::NotFound(_)) => info!("  no local secret"),
                Err(e) => return Err(e.into()),
            }
            if let Some(state) = orchestrator.ledger_order_state(commitment.0).await? {
                info!("  ledger order state: {state:?}");
            }
        }
        Command::Pending => {
            let orders = orchestrator.pending_orders().await?;
            if orders.is_empty() {
                info!("No pending orders");
            }
            for order in orders {
                let timing = if order.expired {
                    "expired".to_string()
                } else if order.reveal.allowed {
                    "revealable".to_string()
                } else {
                    format!("reveal in {}s", order.reveal.remaining_secs)
                };
                info!(
                    "{} {:?} {:?} qty={} price={} ({timing})",
                    order.commitment,
                    order.params.side,
                    order.params.kind,
                    order.params.quantity,
                    order.params.limit_price
                );
            }
            info!("Active on ledger: {}", orchestrator.active_order_count().await?);
        }
        Command::Recover { retry } => {
            let report = orchestrator.recover().await?;
            for (commitment, phase) in &report.removed {
                info!("  removed {commitment} ({phase:?})");
            }
            for commitment in &report.live {
                info!("  live    {commitment}");
            }
            for commitment in &report.expired_unsent {
                info!("  expired {commitment} (never committed; `discard` to remove)");
            }
            for commitment in &report.needs_commit {
                if !retry {
                    info!("  unsent  {commitment} (rerun with --retry)");
                    continue;
                }
                match orchestrator.retry_commit(*commitment).await {
                    Ok(Some(tx)) => info!("  sent    {commitment} in {:#x}", tx.tx_hash),
                    Ok(None) => info!("  landed  {commitment}"),
                    Err(e) => warn!("  failed  {commitment}: {e}"),
                }
            }
        }
    }

    Ok(())
}
