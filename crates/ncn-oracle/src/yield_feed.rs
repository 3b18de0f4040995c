use std::collections::VecDeque;

use restaking_yield_matcher::{OracleSyncArgs, YieldRegime, YIELD_MARK_SCALE};

use crate::state::{YieldObservation, YieldSample};

/// 7 days of hourly samples.
pub const MAX_YIELD_HISTORY: usize = 168;

pub const SECONDS_7D: i64 = 7 * 86_400;
pub const SECONDS_30D: i64 = 30 * 86_400;

/// Classify yield regime based on variance
pub fn classify_regime(variance_bps: u64) -> YieldRegime {
    match variance_bps {
        0..=50 => YieldRegime::VeryLow,
        51..=150 => YieldRegime::Low,
        151..=400 => YieldRegime::Normal,
        401..=800 => YieldRegime::High,
        _ => YieldRegime::Extreme,
    }
}

/// Sample standard deviation of `apys` in bps, Bessel-corrected around an
/// integer mean. Zero with fewer than two samples.
pub fn calculate_variance<I>(apys: I) -> u64
where
    I: IntoIterator<Item = u64>,
    I::IntoIter: Clone,
{
    let iter = apys.into_iter();
    let n = iter.clone().count() as u128;
    if n < 2 {
        return 0;
    }

    let avg = iter.clone().map(u128::from).sum::<u128>() / n;
    let sum_sq = iter.fold(0u128, |acc, apy| {
        let diff = u128::from(apy).abs_diff(avg);
        acc.saturating_add(diff.saturating_mul(diff))
    });

    ((sum_sq / (n - 1)) as f64).sqrt() as u64
}

/// Per-NCN yield feed: a bounded hourly history plus the figures derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldHistory {
    samples: VecDeque<YieldSample>,
    pub current_apy_bps: u64,
    pub apy_7d_avg: u64,
    pub apy_30d_avg: u64,
    pub yield_variance_bps: u64,
    pub yield_regime: YieldRegime,
    pub base_staking_apy_bps: u64,
    pub mev_apy_bps: u64,
    pub restaking_premium_bps: u64,
    pub last_updated: i64,
}

impl YieldHistory {
    pub fn new(initial_apy_bps: u64, now: i64) -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_YIELD_HISTORY + 1),
            current_apy_bps: initial_apy_bps,
            apy_7d_avg: initial_apy_bps,
            apy_30d_avg: initial_apy_bps,
            yield_variance_bps: 0,
            yield_regime: YieldRegime::Normal,
            base_staking_apy_bps: 0,
            mev_apy_bps: 0,
            restaking_premium_bps: 0,
            last_updated: now,
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &YieldSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record a yield observation and return the new regime.
    pub fn record(&mut self, obs: &YieldObservation, now: i64) -> YieldRegime {
        self.current_apy_bps = obs.current_apy_bps;
        self.base_staking_apy_bps = obs.base_staking_apy_bps;
        self.mev_apy_bps = obs.mev_apy_bps;
        self.restaking_premium_bps = obs.restaking_premium_bps;

        self.samples.push_back(YieldSample {
            apy_bps: obs.current_apy_bps,
            variance_bps: self.yield_variance_bps,
            timestamp: now,
        });
        while self.samples.len() > MAX_YIELD_HISTORY {
            self.samples.pop_front();
        }

        if let Some(avg) = self.window_average(now, SECONDS_7D) {
            self.apy_7d_avg = avg;
        }
        if let Some(avg) = self.window_average(now, SECONDS_30D) {
            self.apy_30d_avg = avg;
        }

        self.yield_variance_bps = calculate_variance(self.samples.iter().map(|s| s.apy_bps));
        let previous = self.yield_regime;
        self.yield_regime = classify_regime(self.yield_variance_bps);
        self.last_updated = now;

        if previous != self.yield_regime {
            tracing::info!(
                from = ?previous,
                to = ?self.yield_regime,
                variance_bps = self.yield_variance_bps,
                "yield regime changed"
            );
        }

        self.yield_regime
    }

    fn window_average(&self, now: i64, window_secs: i64) -> Option<u64> {
        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| now.saturating_sub(s.timestamp) <= window_secs)
            .fold((0u128, 0u128), |(sum, count), s| (sum + u128::from(s.apy_bps), count + 1));
        (count > 0).then(|| (sum / count) as u64)
    }

    /// OracleSync payload carrying the current figures to a yield matcher.
    pub fn oracle_sync_args(&self) -> OracleSyncArgs {
        OracleSyncArgs {
            current_yield_bps: self.current_apy_bps,
            yield_mark_price_e6: self.current_apy_bps.saturating_mul(YIELD_MARK_SCALE),
            regime: self.yield_regime,
            yield_7d_avg_bps: self.apy_7d_avg,
            yield_30d_avg_bps: self.apy_30d_avg,
        }
    }
}
