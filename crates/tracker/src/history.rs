//! Reconstruction of gap-free deal timelines.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stowage_types::{DealHistory, DealState};

/// One display row of a reconstructed timeline: the span a deal spent
/// in one state, in both chain-height and wall-clock terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub state: DealState,
    pub start_height: u64,
    pub end_height: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl HistoryRow {
    pub fn span_blocks(&self) -> u64 {
        self.end_height.saturating_sub(self.start_height)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Label in the form `"100 (40 blocks)"`.
    pub fn height_label(&self) -> String {
        format!("{} ({} blocks)", self.start_height, self.span_blocks())
    }

    /// Label in the form `"13:45:10 (40s)"`.
    pub fn time_label(&self) -> String {
        format!(
            "{} ({}s)",
            self.start_time.format("%H:%M:%S"),
            self.elapsed().num_seconds()
        )
    }
}

/// Expand a sparse history into gap-free spans.
///
/// Each record yields one row covering `[start_height, next start)` in
/// height and `[start_time, next start)` in time; the supplied current
/// height and instant close the last interval. Empty history yields
/// empty rows. Pure and idempotent: identical inputs produce identical
/// rows and the input is never mutated.
pub fn reconstruct(
    history: &DealHistory,
    current_height: u64,
    now: DateTime<Utc>,
) -> Vec<HistoryRow> {
    let records = history.records();
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let (end_height, end_time) = match records.get(i + 1) {
                Some(next) => (next.start_height, next.start_time),
                None => (current_height, now),
            };
            HistoryRow {
                state: record.state,
                start_height: record.start_height,
                end_height,
                start_time: record.start_time,
                end_time,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn history(entries: &[(DealState, u64, i64)]) -> DealHistory {
        let mut history = DealHistory::new();
        for (state, height, ms) in entries {
            history.observe(*state, *height, at(*ms)).unwrap();
        }
        history
    }

    #[test]
    fn test_empty_history_yields_no_rows() {
        let rows = reconstruct(&DealHistory::new(), 200, at(2000));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_single_record_spans_to_now() {
        let history = history(&[(DealState::Staged, 100, 1000)]);
        let rows = reconstruct(&history, 200, at(2000));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_height, 100);
        assert_eq!(rows[0].end_height, 200);
        assert_eq!(rows[0].start_time, at(1000));
        assert_eq!(rows[0].end_time, at(2000));
    }

    #[test]
    fn test_staged_sealing_scenario() {
        let history = history(&[
            (DealState::Staged, 100, 1000),
            (DealState::Sealing, 140, 1400),
        ]);
        let rows = reconstruct(&history, 200, at(2000));
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].state, DealState::Staged);
        assert_eq!(rows[0].height_label(), "100 (40 blocks)");
        assert_eq!(rows[0].start_time, at(1000));
        assert_eq!(rows[0].end_time, at(1400));

        assert_eq!(rows[1].state, DealState::Sealing);
        assert_eq!(rows[1].height_label(), "140 (60 blocks)");
        assert_eq!(rows[1].start_time, at(1400));
        assert_eq!(rows[1].end_time, at(2000));
    }

    #[test]
    fn test_idempotent() {
        let history = history(&[
            (DealState::Staged, 100, 1000),
            (DealState::Sealing, 140, 1400),
            (DealState::Active, 180, 1800),
        ]);
        let first = reconstruct(&history, 250, at(2500));
        let second = reconstruct(&history, 250, at(2500));
        assert_eq!(first, second);
        // Input is untouched.
        assert_eq!(history.len(), 3);
    }

    proptest! {
        /// Rows partition [first start, current] with no gaps or
        /// overlaps, in both height and time.
        #[test]
        fn rows_partition_height_and_time(
            steps in prop::collection::vec((1u64..50, 1i64..50_000), 1..12),
            height_slack in 0u64..100,
            time_slack in 0i64..100_000,
        ) {
            let mut history = DealHistory::new();
            let mut height = 100u64;
            let mut time_ms = 1_000i64;
            for (i, (dh, dt)) in steps.iter().enumerate() {
                // Cycle through distinct states so every step appends.
                let state = DealState::from_code((i % 29) as u64);
                let appended = history.observe(state, height, at(time_ms)).unwrap();
                prop_assert!(appended);
                height += dh;
                time_ms += dt;
            }
            let current_height = height + height_slack;
            let now = at(time_ms + time_slack);

            let rows = reconstruct(&history, current_height, now);
            let records = history.records();
            prop_assert_eq!(rows.len(), records.len());

            prop_assert_eq!(rows[0].start_height, records[0].start_height);
            for pair in rows.windows(2) {
                prop_assert_eq!(pair[0].end_height, pair[1].start_height);
                prop_assert_eq!(pair[0].end_time, pair[1].start_time);
            }
            let last = rows.last().unwrap();
            prop_assert_eq!(last.end_height, current_height);
            prop_assert_eq!(last.end_time, now);
        }
    }
}
