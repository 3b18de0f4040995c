use std::collections::VecDeque;

use solana_program::pubkey::Pubkey;

use crate::state::NcnSnapshot;

/// Default rolling window for detection, in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 3_600;

/// True when a sample at `timestamp` has aged out of a window ending at `now`.
/// A sample exactly `window_secs` old is out.
#[inline]
pub fn is_expired(timestamp: i64, now: i64, window_secs: i64) -> bool {
    now.saturating_sub(timestamp) >= window_secs
}

/// Rolling telemetry history of a single NCN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceWindow {
    samples: VecDeque<NcnSnapshot>,
}

impl PerformanceWindow {
    /// Append `snapshot` and drop everything that aged out relative to it.
    pub fn push(&mut self, snapshot: NcnSnapshot, window_secs: i64) {
        let now = snapshot.timestamp;
        self.samples.push_back(snapshot);
        self.evict(now, window_secs);
    }

    pub fn evict(&mut self, now: i64, window_secs: i64) {
        while let Some(oldest) = self.samples.front() {
            if !is_expired(oldest.timestamp, now, window_secs) {
                break;
            }
            self.samples.pop_front();
        }
    }

    pub fn oldest(&self) -> Option<&NcnSnapshot> {
        self.samples.front()
    }

    pub fn latest(&self) -> Option<&NcnSnapshot> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NcnSnapshot> {
        self.samples.iter()
    }

    /// Average uptime across the window.
    pub fn average_uptime(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u128 = self.samples.iter().map(|s| s.uptime_e6 as u128).sum();
        Some((sum / self.samples.len() as u128) as u64)
    }
}

/// Cross-network log of slashing events, used for contagion checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashingLog {
    events: Vec<(Pubkey, i64)>,
}

impl SlashingLog {
    pub fn record(&mut self, ncn: Pubkey, timestamp: i64) {
        self.events.push((ncn, timestamp));
    }

    /// Timestamps from different NCNs interleave, so this scans the whole log.
    pub fn evict(&mut self, now: i64, window_secs: i64) {
        self.events.retain(|(_, ts)| !is_expired(*ts, now, window_secs));
    }

    /// Distinct NCNs other than `ncn` with a slashing event in the log.
    pub fn distinct_others(&self, ncn: &Pubkey) -> usize {
        let mut others: Vec<&Pubkey> = self
            .events
            .iter()
            .map(|(k, _)| k)
            .filter(|k| *k != ncn)
            .collect();
        others.sort_unstable();
        others.dedup();
        others.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snap(ncn: Pubkey, ts: i64) -> NcnSnapshot {
        NcnSnapshot::new(ncn, 999_000, 1_000, 10, false, ts).unwrap()
    }

    #[test]
    fn test_sample_exactly_window_old_is_evicted() {
        let ncn = Pubkey::new_unique();
        let mut w = PerformanceWindow::default();
        w.push(snap(ncn, 1_000), DEFAULT_WINDOW_SECS);
        w.push(snap(ncn, 1_000 + 3_600), DEFAULT_WINDOW_SECS);
        assert_eq!(w.len(), 1);
        assert_eq!(w.oldest().map(|s| s.timestamp), Some(4_600));
    }

    #[test]
    fn test_sample_3599_seconds_old_is_retained() {
        let ncn = Pubkey::new_unique();
        let mut w = PerformanceWindow::default();
        w.push(snap(ncn, 1_000), DEFAULT_WINDOW_SECS);
        w.push(snap(ncn, 1_000 + 3_599), DEFAULT_WINDOW_SECS);
        assert_eq!(w.len(), 2);
        assert_eq!(w.oldest().map(|s| s.timestamp), Some(1_000));
        assert_eq!(w.latest().map(|s| s.timestamp), Some(4_599));
    }

    #[test]
    fn test_average_uptime() {
        let ncn = Pubkey::new_unique();
        let mut w = PerformanceWindow::default();
        assert_eq!(w.average_uptime(), None);
        w.push(NcnSnapshot::new(ncn, 1_000_000, 0, 0, false, 0).unwrap(), DEFAULT_WINDOW_SECS);
        w.push(NcnSnapshot::new(ncn, 900_001, 0, 0, false, 60).unwrap(), DEFAULT_WINDOW_SECS);
        assert_eq!(w.average_uptime(), Some(950_000));
    }

    #[test]
    fn test_slashing_log_counts_distinct_others() {
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let mut log = SlashingLog::default();
        log.record(a, 100);
        log.record(b, 200);
        log.record(b, 300);
        assert_eq!(log.distinct_others(&c), 2);
        assert_eq!(log.distinct_others(&a), 1);

        log.evict(100 + DEFAULT_WINDOW_SECS, DEFAULT_WINDOW_SECS);
        assert_eq!(log.len(), 2);
        assert_eq!(log.distinct_others(&c), 1);
    }

    proptest! {
        #[test]
        fn prop_window_only_holds_fresh_samples(gaps in proptest::collection::vec(0i64..2_000, 1..50)) {
            let ncn = Pubkey::new_unique();
            let mut w = PerformanceWindow::default();
            let mut ts = 0i64;
            for gap in gaps {
                ts += gap;
                w.push(snap(ncn, ts), DEFAULT_WINDOW_SECS);
                prop_assert!(w.iter().all(|s| ts - s.timestamp < DEFAULT_WINDOW_SECS));
                prop_assert_eq!(w.latest().map(|s| s.timestamp), Some(ts));
            }
        }
    }
}
