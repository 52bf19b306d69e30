//! Periodic monitoring of one storage provider.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::session::ServiceHandle;
use stowage_rpc::{Result as RpcResult, RetrievalDealSummary, StorageNetworkRpc};

/// Cadence for provider monitoring.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
        }
    }
}

/// Snapshot of a provider's sector and retrieval activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    pub sectors: Vec<u64>,
    pub retrieval_deals: Vec<RetrievalDealSummary>,
    pub observed_at: DateTime<Utc>,
}

/// Polls one provider for its sector list and retrieval deals.
///
/// Same contract as the deal status poller: cycles never overlap, a
/// failing cycle logs and re-arms after the normal delay, and the
/// client handle is released exactly once on final teardown.
pub struct ProviderMonitor {
    rpc: Arc<dyn StorageNetworkRpc>,
    config: MonitorConfig,
    tx: watch::Sender<Option<ProviderReport>>,
}

impl ProviderMonitor {
    pub fn new(rpc: Arc<dyn StorageNetworkRpc>, config: MonitorConfig) -> Self {
        let (tx, _) = watch::channel(None);
        Self { rpc, config, tx }
    }

    /// Subscribe to published reports. `None` until the first
    /// successful cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<ProviderReport>> {
        self.tx.subscribe()
    }

    pub fn start(self) -> ServiceHandle {
        let token = CancelToken::new();
        info!("provider monitor started");

        let loop_task = {
            let rpc = self.rpc.clone();
            let tx = self.tx.clone();
            let token = token.clone();
            let interval = self.config.interval;
            tokio::spawn(async move {
                while !token.is_canceled() {
                    match monitor_cycle(rpc.as_ref()).await {
                        Ok(report) => {
                            if token.is_canceled() {
                                break;
                            }
                            tx.send_replace(Some(report));
                        }
                        Err(err) => warn!(%err, "provider monitor cycle failed"),
                    }
                    sleep(interval).await;
                }
            })
        };

        let rpc = self.rpc;
        let cleanup = tokio::spawn(async move {
            let _ = loop_task.await;
            rpc.release().await;
            info!("provider monitor stopped");
        });
        ServiceHandle::new(token, cleanup)
    }
}

async fn monitor_cycle(rpc: &dyn StorageNetworkRpc) -> RpcResult<ProviderReport> {
    let sectors = rpc.list_sectors().await?;
    let retrieval_deals = rpc.list_retrieval_deals().await?;
    Ok(ProviderReport {
        sectors,
        retrieval_deals,
        observed_at: Utc::now(),
    })
}
