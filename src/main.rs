//! OFT Transfer - cross-chain token transfers between two OFT deployments
//!
//! Makes sure the LayerZero endpoint may spend the tokens, links both OFT
//! contracts as peers, quotes the messaging fee and submits the `send`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers::types::Address;
use ethers::utils::format_ether;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

mod chain;
mod config;
mod coordination;
mod error;
mod events;
mod metrics;
mod tx;

use chain::resolver::parse_address;
use chain::{ChainResolver, EvmBridgeClient, TokenBridge};
use config::Settings;
use coordination::{PeeringOutcome, TransferEngine, TransferRequest};
use error::{Phase, TransferError};
use events::{CompositeObserver, TracingObserver};
use metrics::MetricsObserver;
use tx::TokenAmount;

#[derive(Parser)]
#[command(name = "oft-transfer", version, about = "Send OFT tokens between two chains")]
struct Cli {
    /// Configuration file (defaults to $OFT_TRANSFER_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Approve, link peers, quote and send
    Transfer(TransferArgs),
    /// Only register both contracts as each other's peers
    Wire(RouteArgs),
    /// Only quote the messaging fee; submits nothing
    Quote(TransferArgs),
}

#[derive(Args)]
struct RouteArgs {
    /// Source network name
    #[arg(long, default_value = "sepolia")]
    from: String,

    /// Destination network name
    #[arg(long, default_value = "baseSepolia")]
    to: String,

    /// OFT contract on the source network
    #[arg(long)]
    source_contract: Option<String>,

    /// OFT contract on the destination network
    #[arg(long)]
    destination_contract: Option<String>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TransferArgs {
    #[command(flatten)]
    route: RouteArgs,

    /// Amount in whole tokens, e.g. 1101 or 0.5
    #[arg(long)]
    amount: String,

    /// Receiving address on the destination network (defaults to its signer)
    #[arg(long)]
    recipient: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.log_json);

    let result = run(&cli).await;

    if let Err(ref e) = result {
        let kind = e
            .downcast_ref::<TransferError>()
            .map(TransferError::kind)
            .unwrap_or("configuration");
        metrics::record_failure(kind);
    }

    if let Some(ref path) = cli.metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics file: {:#}", e);
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let phase = e.downcast_ref::<TransferError>().map(TransferError::phase);
            if phase == Some(Phase::Transfer) {
                eprintln!("Confirmed steps stay on chain; rerunning skips them");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    info!(
        "Loaded configuration for {} networks",
        settings.networks.len()
    );

    let observer = Arc::new(
        CompositeObserver::new()
            .with(Arc::new(TracingObserver::new(settings.transfer.token_decimals)))
            .with(Arc::new(MetricsObserver)),
    );
    let engine = TransferEngine::new(&settings.transfer, observer)?;

    match &cli.command {
        Command::Transfer(args) => {
            let request = build_request(&settings, args).await?;
            let receipt = engine.transfer(&request).await?;

            if args.route.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                info!(
                    run_id = %receipt.run_id,
                    "Transferred {} tokens from {} to {}; txHash: {:?}",
                    receipt.amount,
                    receipt.source_network,
                    receipt.destination_network,
                    receipt.tx_hash
                );
            }
        }

        Command::Wire(route) => {
            let (source, destination) = connect_pair(&settings, route).await?;
            let outcomes = engine
                .peers()
                .ensure_mutual_peering(source.as_ref(), destination.as_ref())
                .await?;

            if route.json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                for outcome in &outcomes {
                    match &outcome.outcome {
                        PeeringOutcome::AlreadyLinked => {
                            info!("{}: already linked", outcome.direction)
                        }
                        PeeringOutcome::Registered(confirmation) => info!(
                            "{}: registered in tx {:?}",
                            outcome.direction, confirmation.tx_hash
                        ),
                    }
                }
            }
        }

        Command::Quote(args) => {
            let request = build_request(&settings, args).await?;
            let fee = engine.quote(&request).await?;

            if args.route.json {
                println!("{}", serde_json::to_string_pretty(&fee)?);
            } else {
                info!(
                    "Native fee for {} tokens from {} to {}: {} ETH",
                    request.amount,
                    args.route.from,
                    args.route.to,
                    format_ether(fee.native_fee)
                );
            }
        }
    }

    Ok(())
}

async fn build_request(settings: &Settings, args: &TransferArgs) -> Result<TransferRequest> {
    let amount = TokenAmount::parse(&args.amount, settings.transfer.token_decimals)?;

    let recipient = args
        .recipient
        .as_deref()
        .map(|r| {
            r.trim().parse::<Address>().map_err(|e| {
                TransferError::Configuration(format!("Invalid recipient {:?}: {}", r, e))
            })
        })
        .transpose()?;

    let (source, destination) = connect_pair(settings, &args.route).await?;

    Ok(TransferRequest {
        amount,
        source,
        destination,
        recipient,
    })
}

/// Resolve and connect both ends of the route
async fn connect_pair(
    settings: &Settings,
    route: &RouteArgs,
) -> Result<(Arc<dyn TokenBridge>, Arc<dyn TokenBridge>)> {
    if route.from == route.to {
        return Err(TransferError::Configuration(format!(
            "Source and destination are both {}",
            route.from
        ))
        .into());
    }

    let resolver = ChainResolver::new(settings);
    let source = resolve(&resolver, &route.from, route.source_contract.as_deref())?;
    let destination = resolve(&resolver, &route.to, route.destination_contract.as_deref())?;

    let (source, destination) = tokio::try_join!(
        EvmBridgeClient::connect(&source),
        EvmBridgeClient::connect(&destination),
    )?;

    let source: Arc<dyn TokenBridge> = Arc::new(source);
    let destination: Arc<dyn TokenBridge> = Arc::new(destination);
    Ok((source, destination))
}

fn resolve(
    resolver: &ChainResolver<'_>,
    network: &str,
    contract: Option<&str>,
) -> Result<chain::ChainContext> {
    let override_address = contract
        .map(|c| parse_address(network, c))
        .transpose()?;

    resolver
        .resolve_with_default(network, override_address)
        .with_context(|| format!("Failed to resolve network {}", network))
}

fn init_logging(json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,oft_transfer=debug,hyper=warn,reqwest=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
