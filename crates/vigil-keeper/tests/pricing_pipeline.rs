//! File telemetry through a keeper tick into matcher contexts and quotes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ncn_uptime_matcher::{
    SignalSeverity, UptimeMatcherContext, UptimeMatcherMode, UptimeSyncArgs, UPTIME_MATCHER_MAGIC,
};
use restaking_yield_matcher::{
    OracleSyncArgs, YieldMatcherContext, YieldMatcherMode, YieldRegime, YIELD_MATCHER_MAGIC,
};
use solana_program::pubkey::Pubkey;
use vigil_keeper::{
    decode_matcher_account, AccountSource, FileTelemetryProvider, InstructionSink, Keeper, KeeperConfig,
    KeeperError, MarketKind, MatcherAccount, ProviderError, SyncInstruction,
};

#[derive(Default, Clone)]
struct RecordingSink(Arc<Mutex<Vec<SyncInstruction>>>);

impl RecordingSink {
    fn take(&self) -> Vec<SyncInstruction> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl InstructionSink for RecordingSink {
    async fn submit(&self, ix: &SyncInstruction) -> Result<(), KeeperError> {
        self.0.lock().unwrap().push(ix.clone());
        Ok(())
    }
}

struct InMemoryAccounts(HashMap<Pubkey, Vec<u8>>);

#[async_trait]
impl AccountSource for InMemoryAccounts {
    async fn account_data(&self, key: &Pubkey) -> Result<Vec<u8>, ProviderError> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable(format!("no account {key}")))
    }
}

fn uptime_context() -> UptimeMatcherContext {
    UptimeMatcherContext {
        last_return: Default::default(),
        magic: UPTIME_MATCHER_MAGIC,
        version: 1,
        mode: UptimeMatcherMode::Continuous as u8,
        lp_pda: Pubkey::new_unique(),
        base_spread_bps: 20,
        edge_spread_bps: 30,
        max_spread_bps: 500,
        impact_k_bps: 0,
        current_uptime_e6: 0,
        uptime_mark_e6: 0,
        last_update_slot: 0,
        resolution_timestamp: 0,
        is_resolved: false,
        resolution_outcome: 0,
        signal_severity: 0,
        signal_adjusted_spread: 0,
        liquidity_notional_e6: 0,
        max_fill_abs: 1_000_000,
        ncn_oracle: Pubkey::new_unique(),
    }
}

fn yield_context() -> YieldMatcherContext {
    YieldMatcherContext {
        last_return: Default::default(),
        magic: YIELD_MATCHER_MAGIC,
        version: 1,
        mode: YieldMatcherMode::SingleNcn as u8,
        lp_pda: Pubkey::new_unique(),
        base_spread_bps: 20,
        yield_vol_spread_bps: 40,
        max_spread_bps: 300,
        impact_k_bps: 0,
        current_yield_bps: 0,
        yield_mark_price_e6: 0,
        last_update_slot: 0,
        yield_regime: YieldRegime::Normal.as_u8(),
        yield_7d_avg_bps: 0,
        yield_30d_avg_bps: 0,
        liquidity_notional_e6: 0,
        max_fill_abs: 1_000_000,
        ncn_yield_feed: Pubkey::new_unique(),
        ncn_performance_feed: Pubkey::new_unique(),
    }
}

fn write_telemetry(root: &Path, ncn: &Pubkey, performance: &str, yields: &str) {
    let dir = root.join(ncn.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("performance.json"), performance).unwrap();
    std::fs::write(dir.join("yield.json"), yields).unwrap();
}

fn single(sent: &[SyncInstruction], kind: MarketKind) -> &SyncInstruction {
    let matching: Vec<_> = sent.iter().filter(|ix| ix.kind == kind).collect();
    assert_eq!(matching.len(), 1, "expected one {kind:?} instruction in {sent:?}");
    matching[0]
}

#[tokio::test]
async fn test_degrading_ncn_widens_uptime_spread() {
    let telemetry = tempfile::tempdir().unwrap();
    let ncn = Pubkey::new_unique();
    let uptime_key = Pubkey::new_unique();
    let yield_key = Pubkey::new_unique();

    let config = KeeperConfig::from_toml(&format!(
        r#"
interval_secs = 60
telemetry_dir = "{dir}"

[retry]
max_attempts = 2
base_delay_ms = 1
max_delay_ms = 2
timeout_ms = 1000

[[markets]]
name = "ncn-uptime"
kind = "uptime"
ncn = "{ncn}"
context = "{uptime_key}"

[[markets]]
name = "ncn-yield"
kind = "yield"
ncn = "{ncn}"
context = "{yield_key}"
"#,
        dir = telemetry.path().display(),
    ))
    .unwrap();

    let mut uptime_ctx = uptime_context();
    let mut yield_ctx = yield_context();
    let accounts = InMemoryAccounts(HashMap::from([
        (uptime_key, uptime_ctx.encode().to_vec()),
        (yield_key, yield_ctx.encode().to_vec()),
    ]));
    assert!(matches!(
        decode_matcher_account(&accounts.0[&uptime_key]),
        Ok(MatcherAccount::Uptime(_))
    ));

    let sink = RecordingSink::default();
    let provider = FileTelemetryProvider::new(config.telemetry_dir.clone());
    let mut keeper = Keeper::new(config, provider, Box::new(sink.clone()))
        .unwrap()
        .with_account_source(Box::new(accounts));

    // Healthy NCN.
    write_telemetry(
        telemetry.path(),
        &ncn,
        r#"{"uptime": 0.999, "totalStakedLamports": 1000, "restakerCount": 50}"#,
        r#"{"totalApy": 8.0, "baseStakingApy": 6.5, "tipApy": 1.0}"#,
    );
    let report = keeper.tick(1_000).await;
    assert_eq!((report.uptime_synced, report.yield_synced, report.failed), (1, 1, 0));

    let sent = sink.take();
    let sync = UptimeSyncArgs::unpack(&single(&sent, MarketKind::Uptime).data).unwrap();
    assert_eq!(sync.signal_severity, SignalSeverity::None);
    uptime_ctx.apply_uptime_sync(&sync, 500).unwrap();
    let calm = uptime_ctx.quote(550).unwrap();
    // 20 base + 300 edge at the 10x cap
    assert_eq!(calm.total_spread, 320);
    assert_eq!(calm.exec_price, 1_030_968);

    let oracle = OracleSyncArgs::unpack(&single(&sent, MarketKind::Yield).data).unwrap();
    assert_eq!(oracle.current_yield_bps, 800);
    assert_eq!(oracle.regime, YieldRegime::VeryLow);
    yield_ctx.current_yield_bps = oracle.current_yield_bps;
    yield_ctx.yield_mark_price_e6 = oracle.yield_mark_price_e6;
    yield_ctx.yield_regime = oracle.regime.as_u8();
    yield_ctx.last_update_slot = 500;
    let yq = yield_ctx.quote(550).unwrap();
    assert_eq!(yq.total_spread, 40);
    assert_eq!(yq.exec_price, 803_200_000);

    // A fifth of the stake leaves within the hour.
    write_telemetry(
        telemetry.path(),
        &ncn,
        r#"{"uptime": 0.999, "tvl": 800, "delegatorCount": 50}"#,
        r#"{"totalApy": 8.0}"#,
    );
    keeper.tick(1_060).await;
    let sent = sink.take();
    let degraded = UptimeSyncArgs::unpack(&single(&sent, MarketKind::Uptime).data).unwrap();
    assert_eq!(degraded.signal_severity, SignalSeverity::High);
    assert_eq!(degraded.signal_adjusted_spread, 50);
    uptime_ctx.apply_uptime_sync(&degraded, 600).unwrap();
    let wide = uptime_ctx.quote(650).unwrap();
    assert_eq!(wide.total_spread, 370);
    assert_eq!(wide.exec_price, 1_035_963);
    assert!(wide.exec_price > calm.exec_price);

    // Telemetry disappears: the last good figures keep being synced.
    std::fs::remove_dir_all(telemetry.path().join(ncn.to_string())).unwrap();
    let report = keeper.tick(1_120).await;
    assert_eq!((report.uptime_synced, report.yield_synced), (1, 1));
    let stale = sink.take();
    assert_eq!(single(&stale, MarketKind::Uptime).data, degraded.pack());
    assert_eq!(single(&stale, MarketKind::Yield), single(&sent, MarketKind::Yield));
    assert_eq!(keeper.yield_history(&ncn).map(|h| h.len()), Some(2));
}
