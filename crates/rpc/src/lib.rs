//! Network RPC collaborators for the stowage tracker.
//!
//! The tracker core never talks to the network directly; it calls
//! methods on the opaque capabilities defined here. [`StorageNetworkRpc`]
//! covers the node/provider JSON-RPC surface and [`PinLookup`] the
//! incremental pinned-content listing. Construction and teardown of the
//! concrete clients belong to the consumer; the core only borrows a
//! handle and releases it once on final teardown.

pub mod client;
pub mod error;
pub mod pins;

pub use client::{
    DealRequest, FoundOffer, HttpRpcClient, RetrievalDealSummary, StorageNetworkRpc,
};
pub use error::{Result, RpcError};
pub use pins::{ContentStream, HttpPinLookup, PinLookup};
