//! NCN oracle: turns raw NCN telemetry into the regime and severity signals the
//! restaking matchers price with.
//!
//! - [`yield_feed`] keeps a 7-day hourly APY history per NCN and classifies its
//!   variance into a [`YieldRegime`](restaking_yield_matcher::YieldRegime).
//! - [`signal`] keeps a one-hour window per NCN plus a cross-network slashing
//!   log and raises [`SignalEvent`]s.
//! - [`aggregated_feed`] rolls up to 32 NCNs into total restaked SOL and a
//!   TVL-weighted APY.

pub mod aggregated_feed;
pub mod errors;
pub mod performance_feed;
pub mod signal;
pub mod state;
pub mod yield_feed;

pub use aggregated_feed::{AggregatedRestakingFeed, NcnFeedEntry, MAX_NCN_FEEDS};
pub use errors::OracleError;
pub use performance_feed::{PerformanceWindow, SlashingLog, DEFAULT_WINDOW_SECS};
pub use signal::{AnomalyDetector, DetectorConfig};
pub use state::{max_severity, pubkey_serde, NcnSnapshot, SignalEvent, YieldObservation, YieldSample};
pub use yield_feed::{calculate_variance, classify_regime, YieldHistory};
