//! Storage deals and their lifecycle states.

use crate::content::ContentId;
use crate::participant::Participant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a storage deal as reported by the network.
///
/// The numeric codes follow the storage-market status table used on the
/// wire; codes outside the known range fold to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealState {
    Unknown,
    ProposalNotFound,
    ProposalRejected,
    ProposalAccepted,
    Staged,
    Sealing,
    Finalizing,
    Active,
    Expired,
    Slashed,
    Rejecting,
    Failing,
    FundsReserved,
    CheckForAcceptance,
    Validating,
    AcceptWait,
    StartDataTransfer,
    Transferring,
    WaitingForData,
    VerifyData,
    ReserveProviderFunds,
    ReserveClientFunds,
    ProviderFunding,
    ClientFunding,
    Publish,
    Publishing,
    Error,
    ProviderTransferAwaitRestart,
    ClientTransferRestart,
    AwaitingPreCommit,
}

impl DealState {
    const TABLE: [DealState; 30] = [
        DealState::Unknown,
        DealState::ProposalNotFound,
        DealState::ProposalRejected,
        DealState::ProposalAccepted,
        DealState::Staged,
        DealState::Sealing,
        DealState::Finalizing,
        DealState::Active,
        DealState::Expired,
        DealState::Slashed,
        DealState::Rejecting,
        DealState::Failing,
        DealState::FundsReserved,
        DealState::CheckForAcceptance,
        DealState::Validating,
        DealState::AcceptWait,
        DealState::StartDataTransfer,
        DealState::Transferring,
        DealState::WaitingForData,
        DealState::VerifyData,
        DealState::ReserveProviderFunds,
        DealState::ReserveClientFunds,
        DealState::ProviderFunding,
        DealState::ClientFunding,
        DealState::Publish,
        DealState::Publishing,
        DealState::Error,
        DealState::ProviderTransferAwaitRestart,
        DealState::ClientTransferRestart,
        DealState::AwaitingPreCommit,
    ];

    /// Decode a wire status code. Unrecognized codes map to `Unknown`.
    pub fn from_code(code: u64) -> Self {
        Self::TABLE
            .get(code as usize)
            .copied()
            .unwrap_or(DealState::Unknown)
    }

    /// The wire status code for this state. Declaration order matches
    /// the wire table, so the discriminant is the code.
    pub fn code(&self) -> u64 {
        *self as u64
    }

    pub fn name(&self) -> &'static str {
        match self {
            DealState::Unknown => "Unknown",
            DealState::ProposalNotFound => "ProposalNotFound",
            DealState::ProposalRejected => "ProposalRejected",
            DealState::ProposalAccepted => "ProposalAccepted",
            DealState::Staged => "Staged",
            DealState::Sealing => "Sealing",
            DealState::Finalizing => "Finalizing",
            DealState::Active => "Active",
            DealState::Expired => "Expired",
            DealState::Slashed => "Slashed",
            DealState::Rejecting => "Rejecting",
            DealState::Failing => "Failing",
            DealState::FundsReserved => "FundsReserved",
            DealState::CheckForAcceptance => "CheckForAcceptance",
            DealState::Validating => "Validating",
            DealState::AcceptWait => "AcceptWait",
            DealState::StartDataTransfer => "StartDataTransfer",
            DealState::Transferring => "Transferring",
            DealState::WaitingForData => "WaitingForData",
            DealState::VerifyData => "VerifyData",
            DealState::ReserveProviderFunds => "ReserveProviderFunds",
            DealState::ReserveClientFunds => "ReserveClientFunds",
            DealState::ProviderFunding => "ProviderFunding",
            DealState::ClientFunding => "ClientFunding",
            DealState::Publish => "Publish",
            DealState::Publishing => "Publishing",
            DealState::Error => "Error",
            DealState::ProviderTransferAwaitRestart => "ProviderTransferAwaitRestart",
            DealState::ClientTransferRestart => "ClientTransferRestart",
            DealState::AwaitingPreCommit => "AwaitingPreCommit",
        }
    }
}

impl fmt::Display for DealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Client-side preferences attached to a deal proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPreferences {
    /// Data transfer protocol requested from the provider.
    pub transfer_type: String,
    /// Price per epoch offered, in atto units.
    pub epoch_price_atto: u128,
    /// Minimum deal duration in blocks.
    pub min_duration_blocks: u64,
    /// Ask the provider to keep an unsealed copy for fast retrieval.
    pub fast_retrieval: bool,
    /// Propose a verified-client deal.
    pub verified: bool,
}

impl Default for TransferPreferences {
    fn default() -> Self {
        Self {
            transfer_type: "graphsync".to_string(),
            epoch_price_atto: 2500,
            min_duration_blocks: 300,
            fast_retrieval: false,
            verified: false,
        }
    }
}

/// Identifier assigned to a deal proposal by the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An accepted storage arrangement between the content owner and a
/// storage participant. Append-only once created; status and history
/// are tracked separately and attached by proposal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub content: ContentId,
    pub provider: Participant,
    pub proposal: ProposalId,
    pub created_at: DateTime<Utc>,
    pub prefs: TransferPreferences,
}

/// Latest known status for one deal, replaced wholesale each poll
/// cycle. Never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealStatusSnapshot {
    pub state: DealState,
    pub message: String,
    /// On-chain deal id, once the deal has been published.
    pub deal_id: Option<u64>,
    pub size_bytes: u64,
    pub updated_at: DateTime<Utc>,
}
