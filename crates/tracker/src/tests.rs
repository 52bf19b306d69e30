//! Integration tests for the tracker crate, driven by scripted
//! in-memory collaborators.

mod fakes {
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    use stowage_rpc::{
        ContentStream, DealRequest, FoundOffer, PinLookup, Result as RpcResult,
        RetrievalDealSummary, RpcError, StorageNetworkRpc,
    };
    use stowage_types::{
        ContentId, Deal, DealState, DealStatusSnapshot, OfferTerms, Participant, ProposalId,
        TransferPreferences,
    };

    pub fn cid(s: &str) -> ContentId {
        ContentId::new(s).unwrap()
    }

    pub fn offer(size: u64) -> FoundOffer {
        FoundOffer {
            error: None,
            size_bytes: size,
            terms: OfferTerms {
                provider: "t01000".to_string(),
                min_price_atto: 500_000,
                payment_interval: 1 << 20,
                payment_interval_increase: 1 << 20,
            },
        }
    }

    pub fn deal(proposal: &str) -> Deal {
        Deal {
            content: cid("bafy123"),
            provider: Participant::StorageProvider {
                address: "t01000".to_string(),
            },
            proposal: ProposalId::new(proposal),
            created_at: Utc::now(),
            prefs: TransferPreferences::default(),
        }
    }

    pub fn rpc_err() -> RpcError {
        RpcError::Api {
            code: -1,
            message: "injected failure".to_string(),
        }
    }

    /// Scripted outcome for one `deal_status` call.
    pub enum StatusStep {
        Ok(DealState),
        Err,
    }

    /// Scripted RPC collaborator. Chain height auto-increments on each
    /// fetch so appended history records always see a moving chain.
    #[derive(Default)]
    pub struct FakeRpc {
        pub height: AtomicU64,
        pub height_fail: AtomicBool,
        pub offers: Mutex<Vec<FoundOffer>>,
        pub offers_fail: AtomicBool,
        /// When set, `find_content_offers` blocks on this gate.
        pub gate: Mutex<Option<Arc<Notify>>>,
        /// Notified whenever `find_content_offers` is entered.
        pub entered: Arc<Notify>,
        pub statuses: Mutex<VecDeque<StatusStep>>,
        pub proposal_result: Mutex<Option<Result<String, String>>>,
        pub sectors: Mutex<Vec<u64>>,
        pub retrievals: Mutex<Vec<RetrievalDealSummary>>,
        pub listing_fail: AtomicBool,
        pub releases: AtomicU64,
    }

    #[async_trait]
    impl StorageNetworkRpc for FakeRpc {
        async fn chain_height(&self) -> RpcResult<u64> {
            if self.height_fail.load(Ordering::SeqCst) {
                return Err(rpc_err());
            }
            Ok(self.height.fetch_add(1, Ordering::SeqCst))
        }

        async fn find_content_offers(&self, _content: &ContentId) -> RpcResult<Vec<FoundOffer>> {
            self.entered.notify_one();
            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.offers_fail.load(Ordering::SeqCst) {
                return Err(rpc_err());
            }
            Ok(self.offers.lock().clone())
        }

        async fn deal_status(&self, _proposal: &ProposalId) -> RpcResult<DealStatusSnapshot> {
            match self.statuses.lock().pop_front() {
                Some(StatusStep::Ok(state)) => Ok(DealStatusSnapshot {
                    state,
                    message: String::new(),
                    deal_id: None,
                    size_bytes: 2048,
                    updated_at: Utc::now(),
                }),
                Some(StatusStep::Err) | None => Err(rpc_err()),
            }
        }

        async fn start_deal(&self, _request: &DealRequest) -> RpcResult<ProposalId> {
            match &*self.proposal_result.lock() {
                Some(Ok(id)) => Ok(ProposalId::new(id.clone())),
                Some(Err(message)) => Err(RpcError::Api {
                    code: 1,
                    message: message.clone(),
                }),
                None => Err(rpc_err()),
            }
        }

        async fn list_sectors(&self) -> RpcResult<Vec<u64>> {
            if self.listing_fail.load(Ordering::SeqCst) {
                return Err(rpc_err());
            }
            Ok(self.sectors.lock().clone())
        }

        async fn list_retrieval_deals(&self) -> RpcResult<Vec<RetrievalDealSummary>> {
            if self.listing_fail.load(Ordering::SeqCst) {
                return Err(rpc_err());
            }
            Ok(self.retrievals.lock().clone())
        }

        async fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Scripted pin-listing collaborator.
    #[derive(Default)]
    pub struct FakePins {
        pub pinned: Mutex<Vec<String>>,
        pub fail: AtomicBool,
    }

    #[async_trait]
    impl PinLookup for FakePins {
        async fn pinned_content(&self) -> RpcResult<ContentStream> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(rpc_err());
            }
            let ids: Vec<RpcResult<ContentId>> =
                self.pinned.lock().iter().map(|s| Ok(cid(s))).collect();
            Ok(futures::stream::iter(ids).boxed())
        }
    }
}

mod scan_tests {
    use super::fakes::*;
    use crate::probe::ProbeTarget;
    use crate::scan::{ScanCoordinator, ScanSnapshot, ScanState};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{watch, Notify};
    use tokio::time::timeout;

    use stowage_rpc::FoundOffer;
    use stowage_types::Participant;

    async fn wait_finished(rx: &mut watch::Receiver<ScanSnapshot>) -> ScanSnapshot {
        timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.progress.state == ScanState::Finished {
                    return snapshot;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("scan did not finish")
    }

    #[tokio::test]
    async fn test_not_found_and_remote_offer() {
        let pins = Arc::new(FakePins::default());
        let rpc = Arc::new(FakeRpc::default());
        rpc.offers.lock().push(offer(2048));

        let coordinator = ScanCoordinator::new(vec![
            ProbeTarget::pins(Participant::PinningService { index: 0 }, pins),
            ProbeTarget::offers(Participant::Node { index: 1 }, rpc),
        ]);
        let mut rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        let snapshot = wait_finished(&mut rx).await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(
            snapshot.records[0].participant,
            Participant::Node { index: 1 }
        );
        assert_eq!(snapshot.records[0].size_bytes(), Some(2048));
        assert_eq!(snapshot.progress.completed_participants, 2);
        assert_eq!(snapshot.progress.total_participants, 2);
    }

    #[tokio::test]
    async fn test_local_pin_discovered() {
        let pins = Arc::new(FakePins::default());
        pins.pinned.lock().push("bafy123".to_string());

        let coordinator = ScanCoordinator::new(vec![ProbeTarget::pins(
            Participant::PinningService { index: 0 },
            pins,
        )]);
        let mut rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        let snapshot = wait_finished(&mut rx).await;
        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.records[0].is_local_pin());
    }

    #[tokio::test]
    async fn test_duplicate_reports_deduplicated() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.offers.lock().push(offer(2048));

        // The probe layer reports the same participant twice.
        let coordinator = ScanCoordinator::new(vec![
            ProbeTarget::offers(Participant::Node { index: 0 }, rpc.clone()),
            ProbeTarget::offers(Participant::Node { index: 0 }, rpc),
        ]);
        let mut rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        let snapshot = wait_finished(&mut rx).await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.progress.completed_participants, 2);
    }

    #[tokio::test]
    async fn test_probe_failure_is_isolated() {
        let failing = Arc::new(FakeRpc::default());
        failing
            .offers_fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let healthy = Arc::new(FakeRpc::default());
        healthy.offers.lock().push(offer(2048));

        let coordinator = ScanCoordinator::new(vec![
            ProbeTarget::offers(Participant::Node { index: 0 }, failing),
            ProbeTarget::offers(Participant::Node { index: 1 }, healthy),
        ]);
        let mut rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        let snapshot = wait_finished(&mut rx).await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(
            snapshot.records[0].participant,
            Participant::Node { index: 1 }
        );
    }

    #[tokio::test]
    async fn test_zero_size_and_errored_offers_filtered() {
        let rpc = Arc::new(FakeRpc::default());
        {
            let mut offers = rpc.offers.lock();
            offers.push(offer(0));
            offers.push(FoundOffer {
                error: Some("routing failure".to_string()),
                ..offer(4096)
            });
        }

        let coordinator = ScanCoordinator::new(vec![ProbeTarget::offers(
            Participant::Node { index: 0 },
            rpc,
        )]);
        let mut rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        let snapshot = wait_finished(&mut rx).await;
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_canceled_session_never_publishes() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.offers.lock().push(offer(2048));
        let gate = Arc::new(Notify::new());
        *rpc.gate.lock() = Some(gate.clone());

        let coordinator = ScanCoordinator::new(vec![ProbeTarget::offers(
            Participant::Node { index: 0 },
            rpc.clone(),
        )]);
        let rx = coordinator.subscribe();
        coordinator.set_target(Some(cid("bafy123")));

        // The probe is in flight but has not resolved yet.
        rpc.entered.notified().await;
        coordinator.set_target(None);
        // Let the probe resolve after cancellation.
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.progress.state, ScanState::Idle);
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_retarget_discards_previous_session() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.offers.lock().push(offer(2048));
        let gate = Arc::new(Notify::new());
        *rpc.gate.lock() = Some(gate.clone());

        let coordinator = ScanCoordinator::new(vec![ProbeTarget::offers(
            Participant::Node { index: 0 },
            rpc.clone(),
        )]);
        let mut rx = coordinator.subscribe();

        coordinator.set_target(Some(cid("bafy-old")));
        rpc.entered.notified().await;
        coordinator.set_target(Some(cid("bafy-new")));

        // Release both probes, in whichever order they wake.
        gate.notify_one();
        gate.notify_one();

        let snapshot = wait_finished(&mut rx).await;
        assert_eq!(snapshot.content, Some(cid("bafy-new")));
        assert_eq!(snapshot.records.len(), 1);

        coordinator.shutdown();
    }
}

mod poll_tests {
    use super::fakes::*;
    use crate::poll::{DealStatusPoller, PollerConfig};
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use stowage_types::{DealState, ProposalId};

    fn fast_config() -> PollerConfig {
        PollerConfig {
            height_interval: Duration::from_millis(5),
            status_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_transitions_append_and_errors_do_not_kill_the_loop() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.height.store(100, Ordering::SeqCst);
        *rpc.statuses.lock() = VecDeque::from([
            StatusStep::Err,
            StatusStep::Ok(DealState::Staged),
            StatusStep::Ok(DealState::Staged),
            StatusStep::Ok(DealState::Sealing),
        ]);

        let poller = DealStatusPoller::new(rpc.clone(), vec![deal("bafyprop")], fast_config());
        let mut rx = poller.subscribe();
        let handle = poller.start();

        let proposal = ProposalId::new("bafyprop");
        timeout(Duration::from_secs(5), async {
            loop {
                let board = rx.borrow_and_update().clone();
                if board.history(&proposal).is_some_and(|h| h.len() >= 2) {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("history never reached two records");

        handle.stop().await;
        assert_eq!(rpc.releases.load(Ordering::SeqCst), 1);

        let board = rx.borrow().clone();
        let records = board.history(&proposal).unwrap().records().to_vec();
        assert_eq!(records[0].state, DealState::Staged);
        assert_eq!(records[1].state, DealState::Sealing);
        assert!(records
            .windows(2)
            .all(|w| w[0].start_height < w[1].start_height));
    }

    #[tokio::test]
    async fn test_height_failure_voids_the_cycle_and_rearms() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.height.store(100, Ordering::SeqCst);
        rpc.height_fail.store(true, Ordering::SeqCst);
        *rpc.statuses.lock() = VecDeque::from([StatusStep::Ok(DealState::Staged)]);

        let poller = DealStatusPoller::new(rpc.clone(), vec![deal("bafyprop")], fast_config());
        let mut rx = poller.subscribe();
        let handle = poller.start();

        // Several failing cycles: nothing is appended, nothing panics.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let proposal = ProposalId::new("bafyprop");
        assert!(rx.borrow_and_update().history(&proposal).is_none());

        // Recovery: the loop was still re-arming all along.
        rpc.height_fail.store(false, Ordering::SeqCst);
        timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow_and_update().history(&proposal).is_some() {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("poller never recovered");

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_network_calls_and_releases_once() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.height.store(100, Ordering::SeqCst);

        let poller = DealStatusPoller::new(rpc.clone(), vec![deal("bafyprop")], fast_config());
        let handle = poller.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Teardown is synchronous from the caller's perspective.
        handle.shutdown();
        assert!(handle.cancel_token().is_canceled());
        handle.stop().await;

        assert_eq!(rpc.releases.load(Ordering::SeqCst), 1);
        let calls_after_stop = rpc.height.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // The height counter only moves on fetches; no calls after stop.
        assert_eq!(rpc.height.load(Ordering::SeqCst), calls_after_stop);
    }
}

mod monitor_tests {
    use super::fakes::*;
    use crate::monitor::{MonitorConfig, ProviderMonitor};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_reports_sectors_and_retrieval_deals() {
        let rpc = Arc::new(FakeRpc::default());
        *rpc.sectors.lock() = vec![1, 2, 7];
        *rpc.retrievals.lock() = vec![stowage_rpc::RetrievalDealSummary {
            id: 4,
            payload: Some(cid("bafy123")),
            status_code: 0,
            message: String::new(),
            total_sent_bytes: 1024,
        }];

        let monitor = ProviderMonitor::new(
            rpc.clone(),
            MonitorConfig {
                interval: Duration::from_millis(5),
            },
        );
        let mut rx = monitor.subscribe();
        let handle = monitor.start();

        let report = timeout(Duration::from_secs(5), async {
            loop {
                if let Some(report) = rx.borrow_and_update().clone() {
                    return report;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("no report published");

        assert_eq!(report.sectors, vec![1, 2, 7]);
        assert_eq!(report.retrieval_deals.len(), 1);
        assert_eq!(report.retrieval_deals[0].total_sent_bytes, 1024);

        handle.stop().await;
        assert_eq!(rpc.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_cycles_rearm() {
        let rpc = Arc::new(FakeRpc::default());
        rpc.listing_fail.store(true, Ordering::SeqCst);
        *rpc.sectors.lock() = vec![9];

        let monitor = ProviderMonitor::new(
            rpc.clone(),
            MonitorConfig {
                interval: Duration::from_millis(5),
            },
        );
        let mut rx = monitor.subscribe();
        let handle = monitor.start();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.borrow_and_update().is_none());

        rpc.listing_fail.store(false, Ordering::SeqCst);
        timeout(Duration::from_secs(5), async {
            loop {
                if rx.borrow_and_update().is_some() {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("monitor never recovered");

        handle.stop().await;
    }
}

mod propose_tests {
    use super::fakes::*;
    use crate::error::TrackerError;
    use crate::propose::propose_deal;

    use stowage_rpc::DealRequest;
    use stowage_types::{Participant, TransferPreferences};

    fn request() -> DealRequest {
        DealRequest {
            content: cid("bafy123"),
            wallet: "t3wallet".to_string(),
            provider_address: "t01000".to_string(),
            prefs: TransferPreferences::default(),
        }
    }

    #[tokio::test]
    async fn test_success_yields_tracked_deal() {
        let rpc = FakeRpc::default();
        *rpc.proposal_result.lock() = Some(Ok("bafyproposal".to_string()));

        let deal = propose_deal(&rpc, &request()).await.unwrap();
        assert_eq!(deal.proposal.as_str(), "bafyproposal");
        assert_eq!(deal.content, cid("bafy123"));
        assert_eq!(
            deal.provider,
            Participant::StorageProvider {
                address: "t01000".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failure_is_terminal_with_message() {
        let rpc = FakeRpc::default();
        *rpc.proposal_result.lock() = Some(Err("insufficient funds".to_string()));

        let err = propose_deal(&rpc, &request()).await.unwrap_err();
        match err {
            TrackerError::ProposalFailed { message } => {
                assert!(message.contains("insufficient funds"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
