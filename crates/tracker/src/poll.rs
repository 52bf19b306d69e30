//! Periodic reconciliation of deal status against the network.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::TrackerError;
use crate::session::ServiceHandle;
use stowage_rpc::StorageNetworkRpc;
use stowage_types::{Deal, DealHistory, DealStatusSnapshot, ProposalId};

/// Fixed cadences for the poll loops. No backoff: a failing cycle
/// re-arms after the normal delay.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Chain-height refresh cadence.
    pub height_interval: Duration,
    /// Per-deal status cadence.
    pub status_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            height_interval: Duration::from_millis(1000),
            status_interval: Duration::from_millis(5000),
        }
    }
}

/// Typed observation folded into the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A fresh chain-height sample.
    HeightObserved { height: u64, at: DateTime<Utc> },
    /// A fresh status snapshot for one tracked deal, taken at the
    /// given height and instant.
    StatusObserved {
        proposal: ProposalId,
        snapshot: DealStatusSnapshot,
        height: u64,
        at: DateTime<Utc>,
    },
}

/// Reconciled view of every tracked deal: latest height sample, latest
/// status per deal, and the append-only history per deal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealBoard {
    pub height: u64,
    pub height_observed_at: Option<DateTime<Utc>>,
    pub deals: Vec<Deal>,
    pub statuses: HashMap<ProposalId, DealStatusSnapshot>,
    pub histories: HashMap<ProposalId, DealHistory>,
}

impl DealBoard {
    pub fn with_deals(deals: Vec<Deal>) -> Self {
        Self {
            deals,
            ..Self::default()
        }
    }

    /// Pure state transition: the current board plus one event yields
    /// the next board. Never mutates `self`; a rejected event leaves
    /// the caller holding the unchanged board.
    ///
    /// A status snapshot replaces the previous one wholesale. A state
    /// change appends a history record at the event's height and time;
    /// an append that would not strictly increase the height is
    /// rejected as a whole.
    pub fn apply(&self, event: &PollEvent) -> Result<DealBoard, TrackerError> {
        let mut next = self.clone();
        match event {
            PollEvent::HeightObserved { height, at } => {
                next.height = *height;
                next.height_observed_at = Some(*at);
            }
            PollEvent::StatusObserved {
                proposal,
                snapshot,
                height,
                at,
            } => {
                next.histories
                    .entry(proposal.clone())
                    .or_default()
                    .observe(snapshot.state, *height, *at)?;
                next.statuses.insert(proposal.clone(), snapshot.clone());
            }
        }
        Ok(next)
    }

    pub fn status(&self, proposal: &ProposalId) -> Option<&DealStatusSnapshot> {
        self.statuses.get(proposal)
    }

    pub fn history(&self, proposal: &ProposalId) -> Option<&DealHistory> {
        self.histories.get(proposal)
    }
}

/// Polls the network for chain height and per-deal status, publishing
/// a fresh [`DealBoard`] after every accepted observation.
///
/// Two loops, one token: a height refresher and a per-deal status
/// monitor. Cycles never overlap; each loop re-arms only after its
/// previous cycle's calls resolve. Transport errors log, void the
/// cycle, and never tear the loops down.
pub struct DealStatusPoller {
    rpc: Arc<dyn StorageNetworkRpc>,
    config: PollerConfig,
    deals: Vec<Deal>,
    board: Arc<Mutex<DealBoard>>,
    tx: watch::Sender<DealBoard>,
}

impl DealStatusPoller {
    pub fn new(rpc: Arc<dyn StorageNetworkRpc>, deals: Vec<Deal>, config: PollerConfig) -> Self {
        let board = DealBoard::with_deals(deals.clone());
        let (tx, _) = watch::channel(board.clone());
        Self {
            rpc,
            config,
            deals,
            board: Arc::new(Mutex::new(board)),
            tx,
        }
    }

    /// Subscribe to published boards.
    pub fn subscribe(&self) -> watch::Receiver<DealBoard> {
        self.tx.subscribe()
    }

    /// Spawn the loops. The returned handle owns the exclusive client
    /// handle: it is released exactly once, after both loops have
    /// observed cancellation and exited, never on a transient error.
    pub fn start(self) -> ServiceHandle {
        let token = CancelToken::new();
        info!(deals = self.deals.len(), "deal status poller started");

        let height_task = {
            let rpc = self.rpc.clone();
            let board = self.board.clone();
            let tx = self.tx.clone();
            let token = token.clone();
            let interval = self.config.height_interval;
            tokio::spawn(async move {
                while !token.is_canceled() {
                    height_cycle(rpc.as_ref(), &token, &board, &tx).await;
                    sleep(interval).await;
                }
            })
        };

        let status_task = {
            let rpc = self.rpc.clone();
            let board = self.board.clone();
            let tx = self.tx.clone();
            let token = token.clone();
            let deals = self.deals.clone();
            let interval = self.config.status_interval;
            tokio::spawn(async move {
                while !token.is_canceled() {
                    status_cycle(rpc.as_ref(), &token, &deals, &board, &tx).await;
                    sleep(interval).await;
                }
            })
        };

        let rpc = self.rpc;
        let cleanup = tokio::spawn(async move {
            let _ = height_task.await;
            let _ = status_task.await;
            rpc.release().await;
            info!("deal status poller stopped");
        });
        ServiceHandle::new(token, cleanup)
    }
}

async fn height_cycle(
    rpc: &dyn StorageNetworkRpc,
    token: &CancelToken,
    board: &Mutex<DealBoard>,
    tx: &watch::Sender<DealBoard>,
) {
    match rpc.chain_height().await {
        Ok(height) => {
            if token.is_canceled() {
                return;
            }
            let event = PollEvent::HeightObserved {
                height,
                at: Utc::now(),
            };
            publish_event(board, tx, &event);
        }
        Err(err) => warn!(%err, "chain height fetch failed"),
    }
}

/// One pass over the tracked deals: sample the height once, then fetch
/// each deal's snapshot and fold the accepted observations in.
async fn status_cycle(
    rpc: &dyn StorageNetworkRpc,
    token: &CancelToken,
    deals: &[Deal],
    board: &Mutex<DealBoard>,
    tx: &watch::Sender<DealBoard>,
) {
    let height = match rpc.chain_height().await {
        Ok(height) => height,
        Err(err) => {
            // Whole cycle is a no-op; the loop re-arms normally.
            warn!(%err, "status cycle skipped: chain height fetch failed");
            return;
        }
    };
    for deal in deals {
        if token.is_canceled() {
            return;
        }
        match rpc.deal_status(&deal.proposal).await {
            Ok(snapshot) => {
                if token.is_canceled() {
                    return;
                }
                let event = PollEvent::StatusObserved {
                    proposal: deal.proposal.clone(),
                    snapshot,
                    height,
                    at: Utc::now(),
                };
                publish_event(board, tx, &event);
            }
            Err(err) => {
                warn!(proposal = %deal.proposal, %err, "deal status fetch failed");
            }
        }
    }
}

fn publish_event(board: &Mutex<DealBoard>, tx: &watch::Sender<DealBoard>, event: &PollEvent) {
    let mut guard = board.lock();
    match guard.apply(event) {
        Ok(next) => {
            *guard = next.clone();
            drop(guard);
            tx.send_replace(next);
        }
        Err(err) => warn!(%err, "observation rejected"),
    }
}
