//! Append-only deal lifecycle history.

use crate::deal::DealState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when an appended record would break history ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("record height {height} does not exceed predecessor height {last_height}")]
    NonMonotonicHeight { height: u64, last_height: u64 },

    #[error("record time {time} precedes predecessor time {last_time}")]
    NonMonotonicTime {
        time: DateTime<Utc>,
        last_time: DateTime<Utc>,
    },
}

/// One state transition in a deal's lifecycle: the state entered and
/// the chain height / wall-clock instant it was first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealHistoryRecord {
    pub state: DealState,
    pub start_height: u64,
    pub start_time: DateTime<Utc>,
}

/// Append-only log of state transitions for one deal.
///
/// Records are strictly ordered by `start_height` and monotonically by
/// `start_time`; they are never reordered or deleted. A record whose
/// height does not exceed its predecessor's is rejected, never
/// silently accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealHistory {
    records: Vec<DealHistoryRecord>,
}

impl DealHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DealHistoryRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&DealHistoryRecord> {
        self.records.last()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Record an observed state at the given height and time.
    ///
    /// Appends only when the state differs from the latest record (or
    /// the history is empty); returns whether a record was appended.
    pub fn observe(
        &mut self,
        state: DealState,
        height: u64,
        time: DateTime<Utc>,
    ) -> Result<bool, HistoryError> {
        if let Some(last) = self.records.last() {
            if last.state == state {
                return Ok(false);
            }
            if height <= last.start_height {
                return Err(HistoryError::NonMonotonicHeight {
                    height,
                    last_height: last.start_height,
                });
            }
            if time < last.start_time {
                return Err(HistoryError::NonMonotonicTime {
                    time,
                    last_time: last.start_time,
                });
            }
        }
        self.records.push(DealHistoryRecord {
            state,
            start_height: height,
            start_time: time,
        });
        Ok(true)
    }
}
