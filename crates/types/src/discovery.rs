//! Discovery records produced by scanning participants for content.

use crate::participant::Participant;
use serde::{Deserialize, Serialize};

/// Declared terms attached to a remote retrieval offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    /// On-chain address of the provider backing the offer.
    pub provider: String,
    /// Minimum total price quoted for retrieval, in atto units.
    pub min_price_atto: u128,
    /// Bytes served between payment vouchers.
    pub payment_interval: u64,
    /// Increase applied to the interval after each voucher.
    pub payment_interval_increase: u64,
}

/// How a participant holds a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discovery {
    /// The content is pinned locally; no offer terms attached.
    LocalPin,
    /// A remote participant offers the content on the given terms.
    RemoteOffer { size_bytes: u64, terms: OfferTerms },
}

/// One participant's answer for one piece of content.
///
/// Owned by the scan session that created it and immutable once
/// created. A session holds at most one record per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub participant: Participant,
    pub discovery: Discovery,
}

impl DiscoveryRecord {
    /// Offered payload size, if this is a remote offer.
    pub fn size_bytes(&self) -> Option<u64> {
        match &self.discovery {
            Discovery::LocalPin => None,
            Discovery::RemoteOffer { size_bytes, .. } => Some(*size_bytes),
        }
    }

    pub fn is_local_pin(&self) -> bool {
        matches!(self.discovery, Discovery::LocalPin)
    }
}
