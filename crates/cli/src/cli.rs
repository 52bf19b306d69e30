//! Command-line surface for the stowage tracker.
//!
//! Thin reference consumer: wires the HTTP collaborators into the
//! tracker core and prints the published plain data. No business logic
//! lives here.

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

use stowage_rpc::{DealRequest, HttpPinLookup, HttpRpcClient, StorageNetworkRpc};
use stowage_tracker::{
    propose_deal, reconstruct, DealBoard, DealStatusPoller, MonitorConfig, PollerConfig,
    ProbeTarget, ProviderMonitor, ScanCoordinator, ScanState,
};
use stowage_types::{ContentId, Deal, Discovery, Participant, ProposalId, TransferPreferences};

/// Stowage deal tracker CLI
#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Track content and storage deals across a storage network")]
#[command(version)]
pub struct Cli {
    /// Node RPC base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:7777")]
    pub rpc_url: String,

    /// Pinning service API base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:5001")]
    pub pin_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the known participants for content and print what is found
    Scan(ScanArgs),
    /// Propose a storage deal for content to a provider
    Propose(ProposeArgs),
    /// Watch tracked deals and print their reconstructed history
    Watch(WatchArgs),
    /// Monitor a storage provider's sectors and retrieval deals
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Content identifier to scan for
    pub cid: String,
}

#[derive(Args, Debug)]
pub struct ProposeArgs {
    /// Content identifier to store
    pub cid: String,
    /// Provider address to propose to
    #[arg(long)]
    pub provider: String,
    /// Wallet address funding the deal
    #[arg(long)]
    pub wallet: String,
    /// Price per epoch in atto units
    #[arg(long, default_value_t = 2500)]
    pub epoch_price: u128,
    /// Minimum deal duration in blocks
    #[arg(long, default_value_t = 300)]
    pub min_duration: u64,
    /// Ask for an unsealed fast-retrieval copy
    #[arg(long)]
    pub fast_retrieval: bool,
    /// Propose a verified-client deal
    #[arg(long)]
    pub verified: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Content identifier the deals store
    pub cid: String,
    /// Provider address behind the deals
    #[arg(long)]
    pub provider: String,
    /// Proposal ids to track (repeatable)
    #[arg(long = "proposal", required = true)]
    pub proposals: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Provider RPC base URL (defaults to --rpc-url)
    #[arg(long)]
    pub provider_url: Option<String>,
}

pub async fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<()> {
    let content: ContentId = args.cid.parse()?;
    let coordinator = ScanCoordinator::new(vec![
        ProbeTarget::pins(
            Participant::PinningService { index: 0 },
            Arc::new(HttpPinLookup::new(cli.pin_url.clone())),
        ),
        ProbeTarget::offers(
            Participant::Node { index: 0 },
            Arc::new(HttpRpcClient::node(cli.rpc_url.clone())),
        ),
    ]);
    let mut rx = coordinator.subscribe();
    coordinator.set_target(Some(content));

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.progress.state == ScanState::Finished {
            if snapshot.records.is_empty() {
                println!("not found on any participant");
            }
            for record in &snapshot.records {
                match &record.discovery {
                    Discovery::LocalPin => {
                        println!("{}: pinned locally", record.participant);
                    }
                    Discovery::RemoteOffer { size_bytes, terms } => {
                        println!(
                            "{}: remote offer, {size_bytes} bytes from {} (min price {} atto)",
                            record.participant, terms.provider, terms.min_price_atto
                        );
                    }
                }
            }
            return Ok(());
        }
        rx.changed().await?;
    }
}

pub async fn run_propose(cli: &Cli, args: &ProposeArgs) -> Result<()> {
    let rpc = HttpRpcClient::node(cli.rpc_url.clone());
    let request = DealRequest {
        content: args.cid.parse()?,
        wallet: args.wallet.clone(),
        provider_address: args.provider.clone(),
        prefs: TransferPreferences {
            transfer_type: "graphsync".to_string(),
            epoch_price_atto: args.epoch_price,
            min_duration_blocks: args.min_duration,
            fast_retrieval: args.fast_retrieval,
            verified: args.verified,
        },
    };
    let result = propose_deal(&rpc, &request).await;
    rpc.release().await;

    let deal = result?;
    println!(
        "proposal {} accepted: {} -> {}",
        deal.proposal, deal.content, args.provider
    );
    Ok(())
}

pub async fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<()> {
    let content: ContentId = args.cid.parse()?;
    let deals: Vec<Deal> = args
        .proposals
        .iter()
        .map(|proposal| Deal {
            content: content.clone(),
            provider: Participant::StorageProvider {
                address: args.provider.clone(),
            },
            proposal: ProposalId::new(proposal.clone()),
            created_at: Utc::now(),
            prefs: TransferPreferences::default(),
        })
        .collect();

    let rpc: Arc<dyn StorageNetworkRpc> = Arc::new(HttpRpcClient::node(cli.rpc_url.clone()));
    let poller = DealStatusPoller::new(rpc, deals.clone(), PollerConfig::default());
    let mut rx = poller.subscribe();
    let handle = poller.start();
    let mut printed = DealBoard::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let board = rx.borrow_and_update().clone();
                // Height samples alone arrive every second; only print
                // when something a reader cares about moved.
                if board.statuses == printed.statuses && board.histories == printed.histories {
                    continue;
                }
                print_board(&deals, &board);
                printed = board;
            }
        }
    }
    handle.stop().await;
    Ok(())
}

fn print_board(deals: &[Deal], board: &DealBoard) {
    let now = Utc::now();
    for deal in deals {
        let Some(status) = board.status(&deal.proposal) else {
            println!("{}: no status yet", deal.proposal);
            continue;
        };
        let message = if status.message.is_empty() {
            String::new()
        } else {
            format!(" ({})", status.message)
        };
        println!(
            "{} -> {}: {}{}",
            deal.proposal, deal.provider, status.state, message
        );
        if let Some(history) = board.history(&deal.proposal) {
            for row in reconstruct(history, board.height, now) {
                println!(
                    "  {:<24} {:<20} {}",
                    row.state.name(),
                    row.height_label(),
                    row.time_label()
                );
            }
        }
    }
}

pub async fn run_monitor(cli: &Cli, args: &MonitorArgs) -> Result<()> {
    let url = args
        .provider_url
        .clone()
        .unwrap_or_else(|| cli.rpc_url.clone());
    let monitor = ProviderMonitor::new(
        Arc::new(HttpRpcClient::provider(url)),
        MonitorConfig::default(),
    );
    let mut rx = monitor.subscribe();
    let handle = monitor.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(report) = rx.borrow_and_update().clone() {
                    println!(
                        "{}: {} sectors, {} retrieval deals",
                        report.observed_at.format("%H:%M:%S"),
                        report.sectors.len(),
                        report.retrieval_deals.len()
                    );
                    for deal in &report.retrieval_deals {
                        let payload = deal
                            .payload
                            .as_ref()
                            .map(|cid| cid.to_string())
                            .unwrap_or_default();
                        println!(
                            "  retrieval #{}: sent {} bytes {}",
                            deal.id, deal.total_sent_bytes, payload
                        );
                    }
                }
            }
        }
    }
    handle.stop().await;
    Ok(())
}
