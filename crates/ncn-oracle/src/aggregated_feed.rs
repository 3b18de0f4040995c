use solana_program::pubkey::Pubkey;

use crate::errors::OracleError;

/// Most NCNs one aggregated feed tracks.
pub const MAX_NCN_FEEDS: usize = 32;

/// Latest per-NCN figures feeding the aggregate. Either side may still be
/// unknown when the NCN has only been observed through one kind of market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NcnFeedEntry {
    pub ncn: Pubkey,
    pub apy_bps: Option<u64>,
    /// Lamports
    pub total_restaked_sol: Option<u64>,
}

/// Protocol-level view across tracked NCNs: total restaked SOL and the
/// TVL-weighted average APY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRestakingFeed {
    entries: Vec<NcnFeedEntry>,
    pub total_restaked_sol: u64,
    pub weighted_avg_apy_bps: u64,
    pub last_updated: i64,
}

impl AggregatedRestakingFeed {
    pub fn new(now: i64) -> Self {
        Self {
            entries: Vec::with_capacity(MAX_NCN_FEEDS),
            total_restaked_sol: 0,
            weighted_avg_apy_bps: 0,
            last_updated: now,
        }
    }

    pub fn ncn_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &NcnFeedEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, ncn: &Pubkey) -> Option<&NcnFeedEntry> {
        self.entries.iter().find(|e| e.ncn == *ncn)
    }

    /// Start tracking `ncn`. Adding a tracked NCN again is a no-op.
    pub fn add_ncn(&mut self, ncn: Pubkey) -> Result<(), OracleError> {
        self.slot(ncn).map(|_| ())
    }

    /// Record the NCN's current APY and refresh the aggregate.
    pub fn record_apy(&mut self, ncn: Pubkey, apy_bps: u64, now: i64) -> Result<(), OracleError> {
        self.slot(ncn)?.apy_bps = Some(apy_bps);
        self.recompute(now);
        Ok(())
    }

    /// Record the NCN's restaked lamports and refresh the aggregate.
    pub fn record_tvl(&mut self, ncn: Pubkey, lamports: u64, now: i64) -> Result<(), OracleError> {
        self.slot(ncn)?.total_restaked_sol = Some(lamports);
        self.recompute(now);
        Ok(())
    }

    fn slot(&mut self, ncn: Pubkey) -> Result<&mut NcnFeedEntry, OracleError> {
        let index = match self.entries.iter().position(|e| e.ncn == ncn) {
            Some(index) => index,
            None => {
                if self.entries.len() >= MAX_NCN_FEEDS {
                    return Err(OracleError::MaxNcnFeedsReached(MAX_NCN_FEEDS));
                }
                self.entries.push(NcnFeedEntry {
                    ncn,
                    apy_bps: None,
                    total_restaked_sol: None,
                });
                self.entries.len() - 1
            }
        };
        Ok(&mut self.entries[index])
    }

    /// Total counts every NCN with a known TVL; the weighted average only
    /// those with both figures. Zero when no weighted TVL is known.
    fn recompute(&mut self, now: i64) {
        let total = self
            .entries
            .iter()
            .filter_map(|e| e.total_restaked_sol)
            .fold(0u128, |acc, tvl| acc + u128::from(tvl));

        let (weighted, weight) = self
            .entries
            .iter()
            .filter_map(|e| Some((e.apy_bps?, e.total_restaked_sol?)))
            .fold((0u128, 0u128), |(sum, weight), (apy, tvl)| {
                (sum + u128::from(apy) * u128::from(tvl), weight + u128::from(tvl))
            });

        self.total_restaked_sol = u64::try_from(total).unwrap_or(u64::MAX);
        self.weighted_avg_apy_bps = if weight == 0 {
            0
        } else {
            u64::try_from(weighted / weight).unwrap_or(u64::MAX)
        };
        self.last_updated = now;

        tracing::debug!(
            ncns = self.entries.len(),
            total_restaked_sol = self.total_restaked_sol,
            weighted_avg_apy_bps = self.weighted_avg_apy_bps,
            "aggregated feed updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weighted_by_tvl() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut feed = AggregatedRestakingFeed::new(0);
        feed.record_apy(a, 800, 10).unwrap();
        feed.record_tvl(a, 3_000, 10).unwrap();
        feed.record_apy(b, 1_200, 20).unwrap();
        feed.record_tvl(b, 1_000, 20).unwrap();

        // (800 * 3000 + 1200 * 1000) / 4000
        assert_eq!(feed.weighted_avg_apy_bps, 900);
        assert_eq!(feed.total_restaked_sol, 4_000);
        assert_eq!(feed.ncn_count(), 2);
        assert_eq!(feed.last_updated, 20);
    }

    #[test]
    fn test_weighted_average_truncates() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut feed = AggregatedRestakingFeed::new(0);
        feed.record_apy(a, 700, 0).unwrap();
        feed.record_tvl(a, 2, 0).unwrap();
        feed.record_apy(b, 800, 0).unwrap();
        feed.record_tvl(b, 1, 0).unwrap();
        // 2200 / 3 = 733.33
        assert_eq!(feed.weighted_avg_apy_bps, 733);
    }

    #[test]
    fn test_partial_entries() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut feed = AggregatedRestakingFeed::new(0);

        feed.record_apy(a, 800, 0).unwrap();
        assert_eq!((feed.total_restaked_sol, feed.weighted_avg_apy_bps), (0, 0));

        // TVL without APY counts toward the total but not the average
        feed.record_tvl(b, 5_000, 0).unwrap();
        assert_eq!((feed.total_restaked_sol, feed.weighted_avg_apy_bps), (5_000, 0));

        feed.record_tvl(a, 1_000, 0).unwrap();
        assert_eq!((feed.total_restaked_sol, feed.weighted_avg_apy_bps), (6_000, 800));
    }

    #[test]
    fn test_later_figures_replace_earlier() {
        let a = Pubkey::new_unique();
        let mut feed = AggregatedRestakingFeed::new(0);
        feed.record_apy(a, 800, 0).unwrap();
        feed.record_tvl(a, 1_000, 0).unwrap();
        feed.record_apy(a, 650, 60).unwrap();
        feed.record_tvl(a, 400, 60).unwrap();

        assert_eq!(feed.ncn_count(), 1);
        assert_eq!(feed.total_restaked_sol, 400);
        assert_eq!(feed.weighted_avg_apy_bps, 650);
        assert_eq!(
            feed.entry(&a),
            Some(&NcnFeedEntry { ncn: a, apy_bps: Some(650), total_restaked_sol: Some(400) })
        );
    }

    #[test]
    fn test_cap_on_tracked_ncns() {
        let mut feed = AggregatedRestakingFeed::new(0);
        let ncns: Vec<Pubkey> = (0..MAX_NCN_FEEDS).map(|_| Pubkey::new_unique()).collect();
        for ncn in &ncns {
            feed.add_ncn(*ncn).unwrap();
        }
        assert_eq!(feed.ncn_count(), MAX_NCN_FEEDS);

        let extra = Pubkey::new_unique();
        assert_eq!(feed.add_ncn(extra), Err(OracleError::MaxNcnFeedsReached(MAX_NCN_FEEDS)));
        assert_eq!(
            feed.record_tvl(extra, 1_000, 0),
            Err(OracleError::MaxNcnFeedsReached(MAX_NCN_FEEDS))
        );
        assert!(feed.entry(&extra).is_none());
        assert_eq!(feed.total_restaked_sol, 0);

        // tracked NCNs still update when full
        feed.add_ncn(ncns[0]).unwrap();
        feed.record_tvl(ncns[31], 1_000, 5).unwrap();
        assert_eq!(feed.total_restaked_sol, 1_000);
        assert_eq!(feed.ncn_count(), MAX_NCN_FEEDS);
    }

    #[test]
    fn test_total_saturates() {
        let mut feed = AggregatedRestakingFeed::new(0);
        feed.record_tvl(Pubkey::new_unique(), u64::MAX, 0).unwrap();
        feed.record_tvl(Pubkey::new_unique(), u64::MAX, 0).unwrap();
        assert_eq!(feed.total_restaked_sol, u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_weighted_average_within_bounds(
            figures in proptest::collection::vec((0u64..5_000, 1u64..1_000_000_000_000), 1..MAX_NCN_FEEDS)
        ) {
            let mut feed = AggregatedRestakingFeed::new(0);
            for (apy, tvl) in &figures {
                let ncn = Pubkey::new_unique();
                feed.record_apy(ncn, *apy, 0).unwrap();
                feed.record_tvl(ncn, *tvl, 0).unwrap();
            }
            let lo = figures.iter().map(|(apy, _)| *apy).min().unwrap();
            let hi = figures.iter().map(|(apy, _)| *apy).max().unwrap();
            prop_assert!(feed.weighted_avg_apy_bps >= lo);
            prop_assert!(feed.weighted_avg_apy_bps <= hi);
            prop_assert_eq!(feed.total_restaked_sol, figures.iter().map(|(_, tvl)| *tvl).sum::<u64>());
        }
    }
}
