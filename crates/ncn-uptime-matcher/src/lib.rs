//! Client-side view of the NCN uptime matcher: a binary market on whether an
//! NCN keeps running without being slashed. Covers the 320-byte context codec,
//! instruction payloads, the edge-spread pricing engine and the one-way
//! resolution lifecycle.

pub mod errors;
pub mod instructions;
pub mod market;
pub mod state;
pub mod uptime_pricing;

pub use errors::UptimeMatcherError;
pub use instructions::{InitArgs, PayloadError, ResolveArgs, UptimeMatcherInstruction, UptimeSyncArgs};
pub use market::MarketState;
pub use state::{
    verify_magic, ResolutionOutcome, SignalSeverity, UptimeMatcherContext, UptimeMatcherMode,
    MAX_PROBABILITY, UPTIME_MATCHER_MAGIC,
};
pub use uptime_pricing::{compute_uptime_price, UptimeQuote, MAX_EDGE_FACTOR};
