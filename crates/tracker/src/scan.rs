//! Fan-out content scanning across the known participants.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::cancel::CancelToken;
use crate::probe::{probe_target, ProbeTarget};
use crate::session::SessionRegistry;
use stowage_types::{ContentId, DiscoveryRecord, Participant};

/// Coarse phase of a scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning,
    Finished,
}

/// Progress indicator published alongside the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub state: ScanState,
    pub completed_participants: usize,
    pub total_participants: usize,
}

/// Everything a consumer needs to render one scan: the target, the
/// deduplicated records accumulated so far, and the progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSnapshot {
    pub content: Option<ContentId>,
    pub records: Vec<DiscoveryRecord>,
    pub progress: ScanProgress,
}

impl ScanSnapshot {
    fn idle() -> Self {
        Self {
            content: None,
            records: Vec::new(),
            progress: ScanProgress {
                state: ScanState::Idle,
                completed_participants: 0,
                total_participants: 0,
            },
        }
    }
}

#[derive(Default)]
struct SessionState {
    records: Vec<DiscoveryRecord>,
    seen: HashSet<Participant>,
    completed: usize,
}

struct SessionShared {
    content: ContentId,
    token: CancelToken,
    total: usize,
    state: Mutex<SessionState>,
    tx: watch::Sender<ScanSnapshot>,
}

impl SessionShared {
    /// Fold one finished probe into the session and publish.
    ///
    /// Runs after a suspension point, so the cancellation token is
    /// re-checked before any shared state is touched: a probe that
    /// resolves after cancellation publishes nothing.
    fn complete_probe(&self, result: Option<DiscoveryRecord>) {
        if self.token.is_canceled() {
            return;
        }
        let snapshot = {
            let mut state = self.state.lock();
            state.completed += 1;
            if let Some(record) = result {
                if state.seen.insert(record.participant.clone()) {
                    state.records.push(record);
                }
            }
            self.snapshot_locked(&state)
        };
        self.tx.send_replace(snapshot);
    }

    fn snapshot_locked(&self, state: &SessionState) -> ScanSnapshot {
        let phase = if state.completed == self.total {
            ScanState::Finished
        } else {
            ScanState::Scanning
        };
        ScanSnapshot {
            content: Some(self.content.clone()),
            records: state.records.clone(),
            progress: ScanProgress {
                state: phase,
                completed_participants: state.completed,
                total_participants: self.total,
            },
        }
    }
}

/// Fans out participant probes for one content identifier at a time.
///
/// Changing the target cancels the in-flight session before a new one
/// starts; results of canceled probes are discarded on completion and
/// never published, regardless of resolution order. Each session is a
/// single pass: failed probes are not retried.
pub struct ScanCoordinator {
    targets: Vec<ProbeTarget>,
    sessions: SessionRegistry<ContentId>,
    tx: watch::Sender<ScanSnapshot>,
}

impl ScanCoordinator {
    pub fn new(targets: Vec<ProbeTarget>) -> Self {
        let (tx, _) = watch::channel(ScanSnapshot::idle());
        Self {
            targets,
            sessions: SessionRegistry::new(),
            tx,
        }
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.tx.subscribe()
    }

    /// Point the scanner at new content.
    ///
    /// A changed target cancels the in-flight session and starts a
    /// fresh one; `None` cancels without starting another; repeating
    /// the current target is a no-op.
    pub fn set_target(&self, target: Option<ContentId>) {
        match target {
            None => {
                self.sessions.clear();
                self.tx.send_replace(ScanSnapshot::idle());
            }
            Some(content) => {
                if self.sessions.active_key().as_ref() == Some(&content) {
                    return;
                }
                let token = self.sessions.begin(content.clone());
                self.start_session(content, token);
            }
        }
    }

    /// Cancel any in-flight session.
    pub fn shutdown(&self) {
        self.sessions.clear();
    }

    fn start_session(&self, content: ContentId, token: CancelToken) {
        let total = self.targets.len();
        info!(%content, participants = total, "scan session started");
        let shared = Arc::new(SessionShared {
            content,
            token,
            total,
            state: Mutex::new(SessionState::default()),
            tx: self.tx.clone(),
        });
        shared
            .tx
            .send_replace(shared.snapshot_locked(&shared.state.lock()));

        for target in self.targets.clone() {
            let shared = shared.clone();
            tokio::spawn(async move {
                if shared.token.is_canceled() {
                    return;
                }
                let result = probe_target(&target, &shared.content).await;
                shared.complete_probe(result);
            });
        }
    }
}
