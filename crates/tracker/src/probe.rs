//! One bounded query against one participant.

use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use stowage_rpc::{PinLookup, StorageNetworkRpc};
use stowage_types::{ContentId, Discovery, DiscoveryRecord, Participant};

/// The capability handle a probe uses to reach its participant.
#[derive(Clone)]
pub enum ProbeCapability {
    /// Walk a pinning service's pin list.
    PinList(Arc<dyn PinLookup>),
    /// Ask a node or provider for retrieval offers.
    Offers(Arc<dyn StorageNetworkRpc>),
}

/// One probe-able participant: identity plus the handle to reach it.
#[derive(Clone)]
pub struct ProbeTarget {
    pub participant: Participant,
    pub capability: ProbeCapability,
}

impl ProbeTarget {
    pub fn pins(participant: Participant, pins: Arc<dyn PinLookup>) -> Self {
        Self {
            participant,
            capability: ProbeCapability::PinList(pins),
        }
    }

    pub fn offers(participant: Participant, rpc: Arc<dyn StorageNetworkRpc>) -> Self {
        Self {
            participant,
            capability: ProbeCapability::Offers(rpc),
        }
    }
}

/// Ask one participant whether it holds the content, and on what terms.
///
/// Transport failures are soft: logged and reported as "not found" for
/// this participant only, never aborting the probes of others. Offers
/// with a non-empty error field or a zero size are filtered, never
/// surfaced.
pub async fn probe_target(target: &ProbeTarget, content: &ContentId) -> Option<DiscoveryRecord> {
    match &target.capability {
        ProbeCapability::PinList(pins) => {
            probe_pin_list(pins.as_ref(), &target.participant, content).await
        }
        ProbeCapability::Offers(rpc) => {
            probe_offers(rpc.as_ref(), &target.participant, content).await
        }
    }
}

async fn probe_pin_list(
    pins: &dyn PinLookup,
    participant: &Participant,
    content: &ContentId,
) -> Option<DiscoveryRecord> {
    let mut stream = match pins.pinned_content().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%participant, %content, %err, "pin listing failed");
            return None;
        }
    };
    while let Some(next) = stream.next().await {
        match next {
            Ok(pinned) if pinned == *content => {
                debug!(%participant, %content, "content pinned locally");
                return Some(DiscoveryRecord {
                    participant: participant.clone(),
                    discovery: Discovery::LocalPin,
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%participant, %content, %err, "pin listing failed mid-stream");
                return None;
            }
        }
    }
    None
}

async fn probe_offers(
    rpc: &dyn StorageNetworkRpc,
    participant: &Participant,
    content: &ContentId,
) -> Option<DiscoveryRecord> {
    let offers = match rpc.find_content_offers(content).await {
        Ok(offers) => offers,
        Err(err) => {
            warn!(%participant, %content, %err, "offer query failed");
            return None;
        }
    };
    offers
        .into_iter()
        .find(|offer| offer.usable())
        .map(|offer| DiscoveryRecord {
            participant: participant.clone(),
            discovery: Discovery::RemoteOffer {
                size_bytes: offer.size_bytes,
                terms: offer.terms,
            },
        })
}
