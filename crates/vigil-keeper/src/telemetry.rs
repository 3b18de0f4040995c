//! Telemetry ingestion with a fail-safe-to-stale policy.
//!
//! Providers are external collaborators; only their JSON result shapes are
//! modelled here. [`TelemetryFeed`] wraps a provider in [`with_retry`] and,
//! once retries are exhausted, answers with the last good observation for the
//! NCN instead of an error.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use ncn_oracle::{NcnSnapshot, YieldObservation};
use ncn_uptime_matcher::MAX_PROBABILITY;
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::config::RetryConfig;
use crate::error::{KeeperError, ProviderError};
use crate::retry::with_retry;

/// Per-NCN performance response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// 0.0 - 1.0
    pub uptime: Option<f64>,
    #[serde(alias = "tvl")]
    pub total_staked_lamports: Option<u64>,
    #[serde(alias = "delegatorCount")]
    pub restaker_count: Option<u32>,
    #[serde(default)]
    pub recent_slashing: bool,
}

/// Per-NCN yield response, all figures in percent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldReport {
    #[serde(alias = "totalApy")]
    pub apy: Option<f64>,
    pub base_staking_apy: Option<f64>,
    #[serde(alias = "tipApy")]
    pub mev_apy: Option<f64>,
}

fn pct_to_bps(field: &'static str, pct: f64) -> Result<u64, ProviderError> {
    if !pct.is_finite() || pct < 0.0 {
        return Err(ProviderError::InvalidValue {
            field,
            value: pct.to_string(),
        });
    }
    Ok((pct * 100.0).round() as u64)
}

impl PerformanceReport {
    pub fn to_snapshot(&self, ncn: Pubkey, timestamp: i64) -> Result<NcnSnapshot, ProviderError> {
        let uptime = self.uptime.ok_or(ProviderError::MissingField("uptime"))?;
        if !(0.0..=1.0).contains(&uptime) {
            return Err(ProviderError::InvalidValue {
                field: "uptime",
                value: uptime.to_string(),
            });
        }
        let uptime_e6 = ((uptime * MAX_PROBABILITY as f64).round() as u64).min(MAX_PROBABILITY);

        Ok(NcnSnapshot {
            ncn,
            uptime_e6,
            total_restaked_sol: self.total_staked_lamports.unwrap_or(0),
            restaker_count: self.restaker_count.unwrap_or(0),
            slashing_event: self.recent_slashing,
            timestamp,
        })
    }
}

impl YieldReport {
    pub fn to_observation(&self) -> Result<YieldObservation, ProviderError> {
        let apy = pct_to_bps("apy", self.apy.ok_or(ProviderError::MissingField("apy"))?)?;
        let base = pct_to_bps("baseStakingApy", self.base_staking_apy.unwrap_or(0.0))?;
        let mev = pct_to_bps("mevApy", self.mev_apy.unwrap_or(0.0))?;

        Ok(YieldObservation {
            current_apy_bps: apy,
            base_staking_apy_bps: base,
            mev_apy_bps: mev,
            restaking_premium_bps: apy.saturating_sub(base).saturating_sub(mev),
        })
    }
}

#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn performance(&self, ncn: &Pubkey) -> Result<PerformanceReport, ProviderError>;

    async fn yield_report(&self, ncn: &Pubkey) -> Result<YieldReport, ProviderError>;
}

/// Reads `<root>/<ncn>/performance.json` and `<root>/<ncn>/yield.json`.
#[derive(Debug, Clone)]
pub struct FileTelemetryProvider {
    root: PathBuf,
}

impl FileTelemetryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        ncn: &Pubkey,
        file: &str,
    ) -> Result<T, ProviderError> {
        let path = self.root.join(ncn.to_string()).join(file);
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl TelemetryProvider for FileTelemetryProvider {
    async fn performance(&self, ncn: &Pubkey) -> Result<PerformanceReport, ProviderError> {
        self.read_json(ncn, "performance.json").await
    }

    async fn yield_report(&self, ncn: &Pubkey) -> Result<YieldReport, ProviderError> {
        self.read_json(ncn, "yield.json").await
    }
}

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation<T> {
    /// Fetched this tick.
    Fresh(T),
    /// Last good value, reused after the provider failed.
    Stale(T),
    /// Nothing has ever been observed; a safe placeholder.
    Default(T),
}

impl<T> Observation<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(v) | Self::Stale(v) | Self::Default(v) => v,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }
}

/// Provider plus retry policy plus last-known-good cache.
pub struct TelemetryFeed<P> {
    provider: P,
    retry: RetryConfig,
    last_performance: HashMap<Pubkey, NcnSnapshot>,
    last_yield: HashMap<Pubkey, YieldObservation>,
}

impl<P: TelemetryProvider> TelemetryFeed<P> {
    pub fn new(provider: P, retry: RetryConfig) -> Self {
        Self {
            provider,
            retry,
            last_performance: HashMap::new(),
            last_yield: HashMap::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Performance snapshot for `ncn` stamped `now`. Never fails.
    pub async fn observe_performance(&mut self, ncn: &Pubkey, now: i64) -> Observation<NcnSnapshot> {
        let provider = &self.provider;
        let label = format!("performance {ncn}");
        let fetched = with_retry(&self.retry, &label, move || async move {
            provider.performance(ncn).await?.to_snapshot(*ncn, now)
        })
        .await;

        match fetched {
            Ok(snapshot) => {
                self.last_performance.insert(*ncn, snapshot);
                Observation::Fresh(snapshot)
            }
            Err(e) => match self.last_performance.get(ncn) {
                Some(last) => {
                    tracing::warn!(%ncn, error = %e, "using last good performance observation");
                    // Re-stamped so the window keeps moving; a past slash is not replayed.
                    Observation::Stale(NcnSnapshot {
                        timestamp: now,
                        slashing_event: false,
                        ..*last
                    })
                }
                None => {
                    tracing::error!(%ncn, error = %e, "{}", KeeperError::NoFallbackAvailable(*ncn));
                    Observation::Default(NcnSnapshot {
                        ncn: *ncn,
                        uptime_e6: MAX_PROBABILITY,
                        total_restaked_sol: 0,
                        restaker_count: 0,
                        slashing_event: false,
                        timestamp: now,
                    })
                }
            },
        }
    }

    /// Yield observation for `ncn`. Never fails.
    pub async fn observe_yield(&mut self, ncn: &Pubkey) -> Observation<YieldObservation> {
        let provider = &self.provider;
        let label = format!("yield {ncn}");
        let fetched = with_retry(&self.retry, &label, move || async move {
            provider.yield_report(ncn).await?.to_observation()
        })
        .await;

        match fetched {
            Ok(obs) => {
                self.last_yield.insert(*ncn, obs);
                Observation::Fresh(obs)
            }
            Err(e) => match self.last_yield.get(ncn) {
                Some(last) => {
                    tracing::warn!(%ncn, error = %e, "using last good yield observation");
                    Observation::Stale(*last)
                }
                None => {
                    tracing::error!(%ncn, error = %e, "{}", KeeperError::NoFallbackAvailable(*ncn));
                    Observation::Default(YieldObservation::default())
                }
            },
        }
    }
}
