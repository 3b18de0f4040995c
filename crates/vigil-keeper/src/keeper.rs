use std::collections::HashMap;

use async_trait::async_trait;
use ncn_oracle::{max_severity, AggregatedRestakingFeed, AnomalyDetector, YieldHistory};
use ncn_uptime_matcher::{SignalSeverity, UptimeSyncArgs};
use solana_program::pubkey::Pubkey;

use crate::accounts::{decode_matcher_account, AccountSource, MatcherAccount};
use crate::config::{KeeperConfig, MarketConfig, MarketKind};
use crate::error::KeeperError;
use crate::retry::with_retry;
use crate::telemetry::{Observation, TelemetryFeed, TelemetryProvider};

/// An oracle sync payload addressed to one matcher context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInstruction {
    pub market: String,
    pub kind: MarketKind,
    pub context: Pubkey,
    pub data: Vec<u8>,
}

/// Where built payloads go. Signing and submission live behind this trait.
#[async_trait]
pub trait InstructionSink: Send + Sync {
    async fn submit(&self, ix: &SyncInstruction) -> Result<(), KeeperError>;
}

/// Logs payloads instead of submitting them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl InstructionSink for DryRunSink {
    async fn submit(&self, ix: &SyncInstruction) -> Result<(), KeeperError> {
        tracing::info!(
            market = %ix.market,
            kind = ?ix.kind,
            context = %ix.context,
            tag = ix.data.first().copied().unwrap_or_default(),
            len = ix.data.len(),
            data = ?ix.data,
            "dry run: sync instruction not submitted"
        );
        Ok(())
    }
}

/// Outcome counts of one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub uptime_synced: usize,
    pub yield_synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Uptime figures for one NCN this tick; `None` when only a placeholder was available.
type UptimeSignal = Option<(u64, SignalSeverity)>;

/// Main keeper service: telemetry in, sync payloads out.
pub struct Keeper<P> {
    config: KeeperConfig,
    feed: TelemetryFeed<P>,
    detector: AnomalyDetector,
    yield_histories: HashMap<Pubkey, YieldHistory>,
    aggregated: AggregatedRestakingFeed,
    sink: Box<dyn InstructionSink>,
    accounts: Option<Box<dyn AccountSource>>,
}

impl<P: TelemetryProvider> Keeper<P> {
    pub fn new(
        config: KeeperConfig,
        provider: P,
        sink: Box<dyn InstructionSink>,
    ) -> Result<Self, KeeperError> {
        config.validate()?;
        let detector = AnomalyDetector::new(config.detector.clone())?;
        let feed = TelemetryFeed::new(provider, config.retry.clone());
        let mut aggregated = AggregatedRestakingFeed::new(0);
        for market in config.markets.iter().filter(|m| m.enabled) {
            aggregated.add_ncn(market.ncn)?;
        }
        Ok(Self {
            config,
            feed,
            detector,
            yield_histories: HashMap::new(),
            aggregated,
            sink,
            accounts: None,
        })
    }

    /// Read matcher contexts before syncing them; resolved markets are skipped.
    pub fn with_account_source(mut self, source: Box<dyn AccountSource>) -> Self {
        self.accounts = Some(source);
        self
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn yield_history(&self, ncn: &Pubkey) -> Option<&YieldHistory> {
        self.yield_histories.get(ncn)
    }

    /// Total restaked SOL and TVL-weighted APY across the configured NCNs.
    pub fn aggregated(&self) -> &AggregatedRestakingFeed {
        &self.aggregated
    }

    pub fn provider(&self) -> &P {
        self.feed.provider()
    }

    /// Run one full pass over every enabled market. Each NCN is observed at
    /// most once per tick even when several markets track it.
    pub async fn tick(&mut self, now: i64) -> TickReport {
        let mut report = TickReport::default();

        let uptime_markets: Vec<MarketConfig> =
            self.config.enabled_markets(MarketKind::Uptime).cloned().collect();
        let mut uptime_signals: HashMap<Pubkey, UptimeSignal> = HashMap::new();
        for market in &uptime_markets {
            match self.sync_uptime_market(market, now, &mut uptime_signals).await {
                Ok(true) => report.uptime_synced += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(market = %market.name, error = %e, "uptime market sync failed");
                    report.failed += 1;
                }
            }
        }

        let yield_markets: Vec<MarketConfig> =
            self.config.enabled_markets(MarketKind::Yield).cloned().collect();
        let mut observed_yield: HashMap<Pubkey, bool> = HashMap::new();
        for market in &yield_markets {
            match self.sync_yield_market(market, now, &mut observed_yield).await {
                Ok(true) => report.yield_synced += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(market = %market.name, error = %e, "yield market sync failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            uptime_synced = report.uptime_synced,
            yield_synced = report.yield_synced,
            skipped = report.skipped,
            failed = report.failed,
            total_restaked_sol = self.aggregated.total_restaked_sol,
            weighted_avg_apy_bps = self.aggregated.weighted_avg_apy_bps,
            "tick complete"
        );
        report
    }

    async fn load_account(&self, key: &Pubkey) -> Result<Option<MatcherAccount>, KeeperError> {
        let Some(source) = self.accounts.as_deref() else {
            return Ok(None);
        };
        let label = format!("account {key}");
        let data = with_retry(&self.config.retry, &label, move || source.account_data(key)).await?;
        Ok(Some(decode_matcher_account(&data)?))
    }

    async fn sync_uptime_market(
        &mut self,
        market: &MarketConfig,
        now: i64,
        signals: &mut HashMap<Pubkey, UptimeSignal>,
    ) -> Result<bool, KeeperError> {
        match self.load_account(&market.context).await? {
            None => {}
            Some(MatcherAccount::Uptime(ctx)) => {
                if ctx.ensure_open().is_err() {
                    tracing::debug!(
                        market = %market.name,
                        outcome = ctx.resolution_outcome,
                        "market resolved, skipping"
                    );
                    return Ok(false);
                }
            }
            Some(_) => {
                return Err(KeeperError::UnexpectedMarketKind {
                    account: market.context,
                    expected: "uptime",
                })
            }
        }

        let signal = match signals.get(&market.ncn) {
            Some(signal) => *signal,
            None => {
                let signal = self.observe_uptime(&market.ncn, now).await;
                signals.insert(market.ncn, signal);
                signal
            }
        };

        let Some((uptime_e6, severity)) = signal else {
            tracing::warn!(market = %market.name, "no telemetry for NCN yet, not syncing");
            return Ok(false);
        };

        let args = UptimeSyncArgs::new(uptime_e6, severity)?;
        self.sink
            .submit(&SyncInstruction {
                market: market.name.clone(),
                kind: MarketKind::Uptime,
                context: market.context,
                data: args.pack(),
            })
            .await?;
        Ok(true)
    }

    async fn observe_uptime(&mut self, ncn: &Pubkey, now: i64) -> UptimeSignal {
        let snapshot = match self.feed.observe_performance(ncn, now).await {
            Observation::Fresh(s) | Observation::Stale(s) => s,
            Observation::Default(_) => return None,
        };
        if let Err(e) = self.aggregated.record_tvl(*ncn, snapshot.total_restaked_sol, now) {
            tracing::warn!(%ncn, error = %e, "NCN left out of aggregated feed");
        }
        let events = self.detector.detect(&snapshot);
        let severity = max_severity(&events);
        tracing::debug!(
            %ncn,
            uptime_e6 = snapshot.uptime_e6,
            events = events.len(),
            ?severity,
            "performance observed"
        );
        Some((snapshot.uptime_e6, severity))
    }

    async fn sync_yield_market(
        &mut self,
        market: &MarketConfig,
        now: i64,
        observed: &mut HashMap<Pubkey, bool>,
    ) -> Result<bool, KeeperError> {
        match self.load_account(&market.context).await? {
            None | Some(MatcherAccount::Yield(_)) => {}
            Some(_) => {
                return Err(KeeperError::UnexpectedMarketKind {
                    account: market.context,
                    expected: "yield",
                })
            }
        }

        if !observed.contains_key(&market.ncn) {
            let usable = self.observe_yield(&market.ncn, now).await;
            observed.insert(market.ncn, usable);
        }

        let history = match self.yield_histories.get(&market.ncn) {
            Some(history) if observed.get(&market.ncn).copied().unwrap_or(false) => history,
            _ => {
                tracing::warn!(market = %market.name, "no yield telemetry for NCN yet, not syncing");
                return Ok(false);
            }
        };

        self.sink
            .submit(&SyncInstruction {
                market: market.name.clone(),
                kind: MarketKind::Yield,
                context: market.context,
                data: history.oracle_sync_args().pack(),
            })
            .await?;
        Ok(true)
    }

    /// Record a fresh observation into the NCN's history. Stale observations
    /// reuse the history as is. Returns whether there is anything to sync.
    async fn observe_yield(&mut self, ncn: &Pubkey, now: i64) -> bool {
        let apy_bps = match self.feed.observe_yield(ncn).await {
            Observation::Fresh(obs) => {
                let history = self
                    .yield_histories
                    .entry(*ncn)
                    .or_insert_with(|| YieldHistory::new(obs.current_apy_bps, now));
                let regime = history.record(&obs, now);
                tracing::debug!(%ncn, apy_bps = obs.current_apy_bps, ?regime, "yield observed");
                history.current_apy_bps
            }
            Observation::Stale(_) => match self.yield_histories.get(ncn) {
                Some(history) => history.current_apy_bps,
                None => return false,
            },
            Observation::Default(_) => return false,
        };
        if let Err(e) = self.aggregated.record_apy(*ncn, apy_bps, now) {
            tracing::warn!(%ncn, error = %e, "NCN left out of aggregated feed");
        }
        true
    }
}
