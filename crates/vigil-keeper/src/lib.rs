pub mod accounts;
pub mod config;
pub mod error;
pub mod keeper;
pub mod retry;
pub mod telemetry;

pub use accounts::{decode_matcher_account, AccountSource, MatcherAccount};
pub use config::{KeeperConfig, MarketConfig, MarketKind, RetryConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use error::{KeeperError, ProviderError};
pub use keeper::{DryRunSink, InstructionSink, Keeper, SyncInstruction, TickReport};
pub use retry::{backoff_delay, with_retry};
pub use telemetry::{
    FileTelemetryProvider, Observation, PerformanceReport, TelemetryFeed, TelemetryProvider, YieldReport,
};
