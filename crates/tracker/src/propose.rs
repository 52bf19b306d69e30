//! Deal proposal: one terminal-result action.

use chrono::Utc;
use tracing::info;

use crate::error::{Result, TrackerError};
use stowage_rpc::{DealRequest, StorageNetworkRpc};
use stowage_types::{Deal, Participant};

/// Propose a storage deal to a provider.
///
/// Success yields a [`Deal`] ready for the poller's tracked set.
/// Failure is terminal for this one action and carries the underlying
/// message; it is never retried automatically.
pub async fn propose_deal(rpc: &dyn StorageNetworkRpc, request: &DealRequest) -> Result<Deal> {
    info!(content = %request.content, provider = %request.provider_address, "proposing deal");
    match rpc.start_deal(request).await {
        Ok(proposal) => {
            info!(%proposal, "deal proposed");
            Ok(Deal {
                content: request.content.clone(),
                provider: Participant::StorageProvider {
                    address: request.provider_address.clone(),
                },
                proposal,
                created_at: Utc::now(),
                prefs: request.prefs.clone(),
            })
        }
        Err(err) => Err(TrackerError::ProposalFailed {
            message: err.to_string(),
        }),
    }
}
