//! Core engine of the stowage deal tracker.
//!
//! Two subsystems built to cope with concurrency, partial failure,
//! cancellation, and sparse asynchronous state reporting:
//!
//! - the **content discovery scanner** ([`scan`]) fans out bounded
//!   probes across the known participants for one content identifier,
//!   deduplicates the answers, and publishes an incrementally growing
//!   record set with coarse progress;
//! - the **deal-lifecycle reconciliation engine** ([`poll`], [`history`])
//!   polls the network for chain height and per-deal status, folds the
//!   observations into an append-only per-deal history through pure
//!   state transitions, and reconstructs gap-free timelines on demand.
//!
//! Network access goes exclusively through the capability traits in
//! `stowage-rpc`; every loop is guarded by a cooperative
//! [`CancelToken`](cancel::CancelToken) checked after each suspension
//! point.

pub mod cancel;
pub mod error;
pub mod history;
pub mod monitor;
pub mod poll;
pub mod probe;
pub mod propose;
pub mod scan;
pub mod session;

pub use cancel::CancelToken;
pub use error::{Result, TrackerError};
pub use history::{reconstruct, HistoryRow};
pub use monitor::{MonitorConfig, ProviderMonitor, ProviderReport};
pub use poll::{DealBoard, DealStatusPoller, PollEvent, PollerConfig};
pub use probe::{probe_target, ProbeCapability, ProbeTarget};
pub use propose::propose_deal;
pub use scan::{ScanCoordinator, ScanProgress, ScanSnapshot, ScanState};
pub use session::{ServiceHandle, SessionRegistry};

#[cfg(test)]
mod tests;
