//! Anomaly detection over rolling NCN telemetry.
//!
//! Each call to [`AnomalyDetector::detect`] records one snapshot and runs four
//! independent checks against the NCN's trailing window:
//!
//! 1. uptime below the warn/alert/critical thresholds
//! 2. TVL decline from the oldest retained sample
//! 3. restaker count decline over the same window
//! 4. slashing: a direct slash on this NCN is always Critical, otherwise
//!    slashes on enough *other* NCNs within the window raise contagion (High)
//!
//! The caller reduces the resulting events with [`max_severity`](crate::max_severity).

use std::collections::{BTreeMap, HashMap};

use ncn_uptime_matcher::SignalSeverity;
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::errors::OracleError;
use crate::performance_feed::{PerformanceWindow, SlashingLog, DEFAULT_WINDOW_SECS};
use crate::state::{NcnSnapshot, SignalEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub window_secs: i64,
    pub uptime_warn_e6: u64,
    pub uptime_alert_e6: u64,
    pub uptime_critical_e6: u64,
    pub tvl_decline_low_pct: f64,
    pub tvl_decline_high_pct: f64,
    pub tvl_decline_critical_pct: f64,
    pub restaker_decline_low_pct: f64,
    pub restaker_decline_high_pct: f64,
    pub restaker_decline_critical_pct: f64,
    /// Other NCNs slashed within the window before contagion fires.
    pub contagion_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            uptime_warn_e6: 990_000,
            uptime_alert_e6: 950_000,
            uptime_critical_e6: 900_000,
            tvl_decline_low_pct: 5.0,
            tvl_decline_high_pct: 15.0,
            tvl_decline_critical_pct: 30.0,
            restaker_decline_low_pct: 3.0,
            restaker_decline_high_pct: 10.0,
            restaker_decline_critical_pct: 25.0,
            contagion_threshold: 2,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.window_secs <= 0 {
            return Err(OracleError::InvalidConfig("window_secs must be greater than 0".into()));
        }
        if !(self.uptime_warn_e6 >= self.uptime_alert_e6 && self.uptime_alert_e6 >= self.uptime_critical_e6) {
            return Err(OracleError::InvalidConfig(
                "uptime thresholds must satisfy warn >= alert >= critical".into(),
            ));
        }
        if self.uptime_warn_e6 > ncn_uptime_matcher::MAX_PROBABILITY {
            return Err(OracleError::InvalidConfig("uptime_warn_e6 above 1_000_000".into()));
        }
        check_pct_ladder(
            "tvl_decline",
            self.tvl_decline_low_pct,
            self.tvl_decline_high_pct,
            self.tvl_decline_critical_pct,
        )?;
        check_pct_ladder(
            "restaker_decline",
            self.restaker_decline_low_pct,
            self.restaker_decline_high_pct,
            self.restaker_decline_critical_pct,
        )?;
        if self.contagion_threshold == 0 {
            return Err(OracleError::InvalidConfig("contagion_threshold must be at least 1".into()));
        }
        Ok(())
    }
}

fn check_pct_ladder(name: &str, low: f64, high: f64, critical: f64) -> Result<(), OracleError> {
    if !(0.0 < low && low <= high && high <= critical && critical <= 100.0) {
        return Err(OracleError::InvalidConfig(format!(
            "{name} thresholds must satisfy 0 < low <= high <= critical <= 100"
        )));
    }
    Ok(())
}

/// Percentage drop from `from` to `to`; `None` when `from` is zero.
fn decline_pct(from: u64, to: u64) -> Option<f64> {
    if from == 0 {
        return None;
    }
    Some(from.saturating_sub(to) as f64 * 100.0 / from as f64)
}

fn grade(value: f64, low: f64, high: f64, critical: f64) -> SignalSeverity {
    if value >= critical {
        SignalSeverity::Critical
    } else if value >= high {
        SignalSeverity::High
    } else if value >= low {
        SignalSeverity::Low
    } else {
        SignalSeverity::None
    }
}

/// Owns every per-NCN window and the shared slashing log.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    windows: HashMap<Pubkey, PerformanceWindow>,
    slashing_log: SlashingLog,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, OracleError> {
        config.validate()?;
        Ok(Self {
            config,
            windows: HashMap::new(),
            slashing_log: SlashingLog::default(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn window(&self, ncn: &Pubkey) -> Option<&PerformanceWindow> {
        self.windows.get(ncn)
    }

    pub fn tracked_ncns(&self) -> impl Iterator<Item = &Pubkey> {
        self.windows.keys()
    }

    /// Record `snapshot` and return every check that fired for it.
    pub fn detect(&mut self, snapshot: &NcnSnapshot) -> Vec<SignalEvent> {
        let window_secs = self.config.window_secs;
        let now = snapshot.timestamp;

        let window = self.windows.entry(snapshot.ncn).or_default();
        window.push(*snapshot, window_secs);
        let oldest = window.oldest().copied().unwrap_or(*snapshot);

        if snapshot.slashing_event {
            self.slashing_log.record(snapshot.ncn, now);
        }
        self.slashing_log.evict(now, window_secs);

        let mut events = Vec::new();
        let mut emit = |severity: SignalSeverity, reason: String, metrics: &[(&str, f64)]| {
            events.push(SignalEvent {
                ncn: snapshot.ncn,
                severity,
                reason,
                timestamp: now,
                metrics: metrics
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), *v))
                    .collect::<BTreeMap<_, _>>(),
            });
        };

        let cfg = &self.config;

        // 1. Uptime thresholds
        let uptime_severity = if snapshot.uptime_e6 < cfg.uptime_critical_e6 {
            SignalSeverity::Critical
        } else if snapshot.uptime_e6 < cfg.uptime_alert_e6 {
            SignalSeverity::High
        } else if snapshot.uptime_e6 < cfg.uptime_warn_e6 {
            SignalSeverity::Low
        } else {
            SignalSeverity::None
        };
        if uptime_severity != SignalSeverity::None {
            emit(
                uptime_severity,
                format!("uptime {:.2}% below threshold", snapshot.uptime_e6 as f64 / 10_000.0),
                &[("uptimeE6", snapshot.uptime_e6 as f64)],
            );
        }

        // 2. TVL decline over the window
        if let Some(pct) = decline_pct(oldest.total_restaked_sol, snapshot.total_restaked_sol) {
            let severity = grade(
                pct,
                cfg.tvl_decline_low_pct,
                cfg.tvl_decline_high_pct,
                cfg.tvl_decline_critical_pct,
            );
            if severity != SignalSeverity::None {
                emit(
                    severity,
                    format!("TVL declined {pct:.2}% within window"),
                    &[
                        ("declinePct", pct),
                        ("fromLamports", oldest.total_restaked_sol as f64),
                        ("toLamports", snapshot.total_restaked_sol as f64),
                    ],
                );
            }
        }

        // 3. Restaker drain over the window
        if let Some(pct) = decline_pct(oldest.restaker_count as u64, snapshot.restaker_count as u64) {
            let severity = grade(
                pct,
                cfg.restaker_decline_low_pct,
                cfg.restaker_decline_high_pct,
                cfg.restaker_decline_critical_pct,
            );
            if severity != SignalSeverity::None {
                emit(
                    severity,
                    format!("restaker count declined {pct:.2}% within window"),
                    &[
                        ("declinePct", pct),
                        ("fromCount", oldest.restaker_count as f64),
                        ("toCount", snapshot.restaker_count as f64),
                    ],
                );
            }
        }

        // 4. Slashing, direct or contagion
        let others = self.slashing_log.distinct_others(&snapshot.ncn);
        if snapshot.slashing_event {
            emit(
                SignalSeverity::Critical,
                "slashing event on this NCN".to_string(),
                &[("otherSlashedNcns", others as f64)],
            );
        } else if others >= cfg.contagion_threshold {
            emit(
                SignalSeverity::High,
                format!("slashing contagion: {others} other NCNs slashed within window"),
                &[("otherSlashedNcns", others as f64)],
            );
        }

        for event in &events {
            tracing::warn!(
                ncn = %event.ncn,
                severity = ?event.severity,
                reason = %event.reason,
                "anomaly detected"
            );
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::max_severity;

    const SOL: u64 = 1_000_000_000;

    fn snapshot(ncn: Pubkey, uptime: u64, tvl: u64, restakers: u32, slashed: bool, ts: i64) -> NcnSnapshot {
        NcnSnapshot::new(ncn, uptime, tvl, restakers, slashed, ts).unwrap()
    }

    fn healthy(ncn: Pubkey, ts: i64) -> NcnSnapshot {
        snapshot(ncn, 999_000, 1_000 * SOL, 100, false, ts)
    }

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_healthy_ncn_raises_nothing() {
        let mut d = detector();
        let ncn = Pubkey::new_unique();
        assert!(d.detect(&healthy(ncn, 0)).is_empty());
        assert!(d.detect(&healthy(ncn, 60)).is_empty());
        assert_eq!(d.window(&ncn).map(|w| w.len()), Some(2));
    }

    #[test]
    fn test_uptime_thresholds() {
        let ncn = Pubkey::new_unique();
        let cases = [
            (990_000, SignalSeverity::None),
            (989_999, SignalSeverity::Low),
            (950_000, SignalSeverity::Low),
            (949_999, SignalSeverity::High),
            (900_000, SignalSeverity::High),
            (899_999, SignalSeverity::Critical),
        ];
        for (uptime, expected) in cases {
            let mut d = detector();
            let events = d.detect(&snapshot(ncn, uptime, 0, 0, false, 0));
            assert_eq!(max_severity(&events), expected, "uptime {uptime}");
        }
    }

    #[test]
    fn test_tvl_decline_grades() {
        let ncn = Pubkey::new_unique();
        for (remaining, expected) in [
            (96, SignalSeverity::None),
            (95, SignalSeverity::Low),
            (85, SignalSeverity::High),
            (70, SignalSeverity::Critical),
        ] {
            let mut d = detector();
            d.detect(&snapshot(ncn, 999_000, 100 * SOL, 0, false, 0));
            let events = d.detect(&snapshot(ncn, 999_000, remaining * SOL, 0, false, 600));
            assert_eq!(max_severity(&events), expected, "remaining {remaining}%");
        }
    }

    #[test]
    fn test_restaker_decline_grades() {
        let ncn = Pubkey::new_unique();
        for (remaining, expected) in [
            (98, SignalSeverity::None),
            (97, SignalSeverity::Low),
            (90, SignalSeverity::High),
            (75, SignalSeverity::Critical),
        ] {
            let mut d = detector();
            d.detect(&snapshot(ncn, 999_000, 0, 100, false, 0));
            let events = d.detect(&snapshot(ncn, 999_000, 0, remaining, false, 600));
            assert_eq!(max_severity(&events), expected, "remaining {remaining}");
        }
    }

    #[test]
    fn test_decline_measured_from_oldest_retained_sample() {
        let mut d = detector();
        let ncn = Pubkey::new_unique();
        d.detect(&snapshot(ncn, 999_000, 100 * SOL, 100, false, 0));
        // 3600s later the first sample is gone, so the drop is invisible
        d.detect(&snapshot(ncn, 999_000, 90 * SOL, 100, false, 1_800));
        let events = d.detect(&snapshot(ncn, 999_000, 90 * SOL, 100, false, 3_600));
        assert!(events.is_empty());

        // at 3599s it is still in the window
        let mut d = detector();
        d.detect(&snapshot(ncn, 999_000, 100 * SOL, 100, false, 0));
        let events = d.detect(&snapshot(ncn, 999_000, 90 * SOL, 100, false, 3_599));
        assert_eq!(max_severity(&events), SignalSeverity::Low);
        assert_eq!(events[0].metrics["declinePct"], 10.0);
    }

    #[test]
    fn test_zero_baseline_skips_decline_checks() {
        let mut d = detector();
        let ncn = Pubkey::new_unique();
        d.detect(&snapshot(ncn, 999_000, 0, 0, false, 0));
        assert!(d.detect(&snapshot(ncn, 999_000, 0, 0, false, 60)).is_empty());
    }

    #[test]
    fn test_direct_slash_is_critical() {
        let mut d = detector();
        let ncn = Pubkey::new_unique();
        let events = d.detect(&snapshot(ncn, 999_000, SOL, 10, true, 0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, SignalSeverity::Critical);
    }

    #[test]
    fn test_contagion_needs_two_other_ncns() {
        let mut d = detector();
        let (a, b, target) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());

        d.detect(&snapshot(a, 999_000, SOL, 10, true, 0));
        d.detect(&snapshot(a, 999_000, SOL, 10, true, 10));
        assert!(d.detect(&healthy(target, 20)).is_empty());

        d.detect(&snapshot(b, 999_000, SOL, 10, true, 30));
        let events = d.detect(&healthy(target, 40));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, SignalSeverity::High);
        assert_eq!(events[0].metrics["otherSlashedNcns"], 2.0);

        // a's slashes leave the window exactly 3600s later
        assert!(d.detect(&healthy(target, 3_610)).is_empty());
    }

    #[test]
    fn test_checks_co_fire() {
        let mut d = detector();
        let ncn = Pubkey::new_unique();
        d.detect(&snapshot(ncn, 999_000, 100 * SOL, 100, false, 0));
        let events = d.detect(&snapshot(ncn, 940_000, 80 * SOL, 95, true, 300));
        let severities: Vec<_> = events.iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![
                SignalSeverity::High,
                SignalSeverity::High,
                SignalSeverity::Low,
                SignalSeverity::Critical,
            ]
        );
        assert_eq!(max_severity(&events), SignalSeverity::Critical);
    }

    #[test]
    fn test_windows_are_isolated_per_ncn() {
        let mut d = detector();
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        d.detect(&snapshot(a, 999_000, 100 * SOL, 100, false, 0));
        assert!(d.detect(&snapshot(b, 999_000, 10 * SOL, 100, false, 60)).is_empty());
        assert_eq!(d.tracked_ncns().count(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());

        let bad = DetectorConfig { uptime_alert_e6: 995_000, ..Default::default() };
        assert!(matches!(bad.validate(), Err(OracleError::InvalidConfig(_))));

        let bad = DetectorConfig { tvl_decline_high_pct: 40.0, ..Default::default() };
        assert!(bad.validate().is_err());

        let bad = DetectorConfig { window_secs: 0, ..Default::default() };
        assert!(AnomalyDetector::new(bad).is_err());
    }

    #[test]
    fn test_config_fields_default_individually() {
        let cfg: DetectorConfig = serde_json::from_str(r#"{"contagion_threshold": 3}"#).unwrap();
        assert_eq!(cfg.contagion_threshold, 3);
        assert_eq!(cfg.window_secs, 3_600);
        assert_eq!(cfg.uptime_critical_e6, 900_000);
    }
}
