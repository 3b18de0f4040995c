use std::collections::BTreeMap;

use ncn_uptime_matcher::{SignalSeverity, MAX_PROBABILITY};
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::errors::OracleError;

// =============================================================================
// NCN Oracle State: telemetry samples and the signals derived from them
// =============================================================================

/// One telemetry observation of an NCN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NcnSnapshot {
    #[serde(with = "pubkey_serde")]
    pub ncn: Pubkey,
    /// Uptime as probability (0-1,000,000 = 0%-100%)
    pub uptime_e6: u64,
    /// Total restaked SOL in lamports
    pub total_restaked_sol: u64,
    pub restaker_count: u32,
    pub slashing_event: bool,
    /// Unix timestamp
    pub timestamp: i64,
}

impl NcnSnapshot {
    pub fn new(
        ncn: Pubkey,
        uptime_e6: u64,
        total_restaked_sol: u64,
        restaker_count: u32,
        slashing_event: bool,
        timestamp: i64,
    ) -> Result<Self, OracleError> {
        if uptime_e6 > MAX_PROBABILITY {
            return Err(OracleError::InvalidUptimeProbability(uptime_e6));
        }
        Ok(Self {
            ncn,
            uptime_e6,
            total_restaked_sol,
            restaker_count,
            slashing_event,
            timestamp,
        })
    }
}

/// Yield observation for one NCN, all figures in bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldObservation {
    pub current_apy_bps: u64,
    /// Base SOL staking APY component
    pub base_staking_apy_bps: u64,
    /// MEV APY component
    pub mev_apy_bps: u64,
    /// Extra yield from NCN security
    pub restaking_premium_bps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldSample {
    /// APY in bps at sample time
    pub apy_bps: u64,
    /// Yield variance at sample time (before this sample was included)
    pub variance_bps: u64,
    pub timestamp: i64,
}

/// Output of anomaly detection for one check on one NCN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    #[serde(with = "pubkey_serde")]
    pub ncn: Pubkey,
    pub severity: SignalSeverity,
    pub reason: String,
    pub timestamp: i64,
    pub metrics: BTreeMap<String, f64>,
}

/// Highest severity in `events`, `None` when there are none.
pub fn max_severity(events: &[SignalEvent]) -> SignalSeverity {
    events
        .iter()
        .map(|e| e.severity)
        .max()
        .unwrap_or(SignalSeverity::None)
}

/// Pubkeys as base58 strings.
pub mod pubkey_serde {
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};
    use solana_program::pubkey::Pubkey;

    pub fn serialize<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(severity: SignalSeverity) -> SignalEvent {
        SignalEvent {
            ncn: Pubkey::new_unique(),
            severity,
            reason: "test".to_string(),
            timestamp: 0,
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn test_snapshot_rejects_out_of_range_uptime() {
        let ncn = Pubkey::new_unique();
        assert!(NcnSnapshot::new(ncn, MAX_PROBABILITY, 0, 0, false, 0).is_ok());
        assert_eq!(
            NcnSnapshot::new(ncn, MAX_PROBABILITY + 1, 0, 0, false, 0),
            Err(OracleError::InvalidUptimeProbability(MAX_PROBABILITY + 1))
        );
    }

    #[test]
    fn test_max_severity() {
        assert_eq!(max_severity(&[]), SignalSeverity::None);
        let events = vec![
            event(SignalSeverity::Low),
            event(SignalSeverity::Critical),
            event(SignalSeverity::High),
        ];
        assert_eq!(max_severity(&events), SignalSeverity::Critical);
    }

    #[test]
    fn test_signal_event_json_shape() {
        let mut e = event(SignalSeverity::High);
        e.metrics.insert("uptimeE6".to_string(), 940_000.0);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["severity"], "HIGH");
        assert_eq!(json["ncn"], e.ncn.to_string());
        assert_eq!(json["metrics"]["uptimeE6"], 940_000.0);

        let back: SignalEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }
}
