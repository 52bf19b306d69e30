//! JSON-RPC client for the storage network node and provider APIs.

use crate::error::{Result, RpcError};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use stowage_types::{ContentId, DealState, DealStatusSnapshot, OfferTerms, ProposalId,
    TransferPreferences};

/// A retrieval offer as reported by the network, before filtering.
///
/// Offers with a non-empty error field or a zero size are reported
/// as-is; filtering them is the probe's job, not the transport's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundOffer {
    pub error: Option<String>,
    pub size_bytes: u64,
    pub terms: OfferTerms,
}

impl FoundOffer {
    /// An offer is usable when it carries no error and a non-zero size.
    pub fn usable(&self) -> bool {
        self.error.is_none() && self.size_bytes > 0
    }
}

/// Parameters for proposing a new storage deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealRequest {
    pub content: ContentId,
    pub wallet: String,
    pub provider_address: String,
    pub prefs: TransferPreferences,
}

/// Compact view of one retrieval deal served by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalDealSummary {
    pub id: u64,
    pub payload: Option<ContentId>,
    pub status_code: u64,
    pub message: String,
    pub total_sent_bytes: u64,
}

/// The node/provider RPC surface the tracker depends on.
///
/// Implementations own their transport; the tracker only calls methods
/// on a handle it is given and calls [`release`](Self::release) exactly
/// once on final teardown.
#[async_trait]
pub trait StorageNetworkRpc: Send + Sync {
    /// Current chain height.
    async fn chain_height(&self) -> Result<u64>;

    /// All offers the network reports for the given content.
    async fn find_content_offers(&self, content: &ContentId) -> Result<Vec<FoundOffer>>;

    /// Latest status snapshot for one deal.
    async fn deal_status(&self, proposal: &ProposalId) -> Result<DealStatusSnapshot>;

    /// Submit a deal proposal; returns the assigned proposal id.
    async fn start_deal(&self, request: &DealRequest) -> Result<ProposalId>;

    /// Sector numbers held by the connected provider.
    async fn list_sectors(&self) -> Result<Vec<u64>>;

    /// Retrieval deals served by the connected provider.
    async fn list_retrieval_deals(&self) -> Result<Vec<RetrievalDealSummary>>;

    /// Release the underlying transport. Idempotent; calls made after
    /// release fail with [`RpcError::Released`].
    async fn release(&self);
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CidRef {
    #[serde(rename = "/")]
    cid: String,
}

#[derive(Debug, Deserialize)]
struct ChainHeadDto {
    #[serde(rename = "Height")]
    height: u64,
}

#[derive(Debug, Deserialize)]
struct QueryOfferDto {
    #[serde(rename = "Err", default)]
    err: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "MinPrice", default)]
    min_price: String,
    #[serde(rename = "PaymentInterval", default)]
    payment_interval: u64,
    #[serde(rename = "PaymentIntervalIncrease", default)]
    payment_interval_increase: u64,
    #[serde(rename = "Miner", default)]
    miner: String,
}

#[derive(Debug, Deserialize)]
struct DealInfoDto {
    #[serde(rename = "State")]
    state: u64,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "DealID", default)]
    deal_id: u64,
    #[serde(rename = "Size", default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct RetrievalDealDto {
    #[serde(rename = "ID", default)]
    id: u64,
    #[serde(rename = "PayloadCID", default)]
    payload_cid: Option<CidRef>,
    #[serde(rename = "Status", default)]
    status: u64,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "TotalSent", default)]
    total_sent: u64,
}

fn parse_atto(raw: &str) -> Result<u128> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u128>()
        .map_err(|_| RpcError::InvalidPayload(format!("bad price string: {raw:?}")))
}

fn offer_from_dto(dto: QueryOfferDto) -> Result<FoundOffer> {
    let error = if dto.err.is_empty() {
        None
    } else {
        Some(dto.err)
    };
    Ok(FoundOffer {
        error,
        size_bytes: dto.size,
        terms: OfferTerms {
            provider: dto.miner,
            min_price_atto: parse_atto(&dto.min_price)?,
            payment_interval: dto.payment_interval,
            payment_interval_increase: dto.payment_interval_increase,
        },
    })
}

/// JSON-RPC 2.0 client speaking to a node or provider `/rpc/v0`
/// endpoint over HTTP.
#[derive(Debug)]
pub struct HttpRpcClient {
    client: reqwest::Client,
    base_url: String,
    next_id: AtomicU64,
    released: AtomicBool,
}

impl HttpRpcClient {
    /// Client for a full-node endpoint, e.g. `http://127.0.0.1:7777`.
    pub fn node(base_url: impl Into<String>) -> Self {
        Self::with_base(base_url)
    }

    /// Client for a storage-provider endpoint (same wire envelope,
    /// different method subset).
    pub fn provider(base_url: impl Into<String>) -> Self {
        Self::with_base(base_url)
    }

    fn with_base(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            next_id: AtomicU64::new(1),
            released: AtomicBool::new(false),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rpc/v0", self.base_url.trim_end_matches('/'))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        if self.released.load(Ordering::SeqCst) {
            return Err(RpcError::Released);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": format!("Filecoin.{method}"),
            "params": params,
        });
        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status));
        }
        let envelope = response.json::<RpcEnvelope<T>>().await?;
        if let Some(error) = envelope.error {
            return Err(RpcError::Api {
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcError::InvalidPayload("missing result".to_string()))
    }
}

#[async_trait]
impl StorageNetworkRpc for HttpRpcClient {
    async fn chain_height(&self) -> Result<u64> {
        let head: ChainHeadDto = self.call("ChainHead", json!([])).await?;
        Ok(head.height)
    }

    async fn find_content_offers(&self, content: &ContentId) -> Result<Vec<FoundOffer>> {
        let offers: Vec<QueryOfferDto> = self
            .call(
                "ClientFindData",
                json!([{ "/": content.as_str() }, null]),
            )
            .await?;
        offers.into_iter().map(offer_from_dto).collect()
    }

    async fn deal_status(&self, proposal: &ProposalId) -> Result<DealStatusSnapshot> {
        let info: DealInfoDto = self
            .call("ClientGetDealInfo", json!([{ "/": proposal.as_str() }]))
            .await?;
        Ok(DealStatusSnapshot {
            state: DealState::from_code(info.state),
            message: info.message,
            deal_id: (info.deal_id != 0).then_some(info.deal_id),
            size_bytes: info.size,
            updated_at: Utc::now(),
        })
    }

    async fn start_deal(&self, request: &DealRequest) -> Result<ProposalId> {
        let prefs: &TransferPreferences = &request.prefs;
        let data_ref = json!({
            "Data": {
                "TransferType": prefs.transfer_type,
                "Root": { "/": request.content.as_str() },
                "PieceCid": null,
                "PieceSize": 0,
            },
            "Wallet": request.wallet,
            "Miner": request.provider_address,
            "EpochPrice": prefs.epoch_price_atto.to_string(),
            "MinBlocksDuration": prefs.min_duration_blocks,
            "FastRetrieval": prefs.fast_retrieval,
            "VerifiedDeal": prefs.verified,
        });
        let proposal: CidRef = self.call("ClientStartDeal", json!([data_ref])).await?;
        Ok(ProposalId::new(proposal.cid))
    }

    async fn list_sectors(&self) -> Result<Vec<u64>> {
        self.call("SectorsList", json!([])).await
    }

    async fn list_retrieval_deals(&self) -> Result<Vec<RetrievalDealSummary>> {
        let deals: Vec<RetrievalDealDto> =
            self.call("MarketListRetrievalDeals", json!([])).await?;
        let mut summaries = Vec::with_capacity(deals.len());
        for dto in deals {
            let payload = match dto.payload_cid {
                Some(cid_ref) => Some(ContentId::new(cid_ref.cid).map_err(|err| {
                    RpcError::InvalidPayload(format!("retrieval deal payload: {err}"))
                })?),
                None => None,
            };
            summaries.push(RetrievalDealSummary {
                id: dto.id,
                payload,
                status_code: dto.status,
                message: dto.message,
                total_sent_bytes: dto.total_sent,
            });
        }
        Ok(summaries)
    }

    async fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!(endpoint = %self.endpoint(), "rpc client released");
        }
    }
}
