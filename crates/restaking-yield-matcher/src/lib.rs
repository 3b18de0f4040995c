//! Client-side view of the restaking yield matcher: the 320-byte context
//! codec, instruction payloads, and the regime-scaled pricing engine that
//! reproduces the program's integer arithmetic.

pub mod errors;
pub mod instructions;
pub mod state;
pub mod yield_pricing;

pub use errors::YieldMatcherError;
pub use instructions::{InitArgs, OracleSyncArgs, SyncPayloadError, YieldMatcherInstruction};
pub use state::{
    verify_magic, YieldMatcherContext, YieldMatcherMode, YieldRegime, YIELD_MATCHER_MAGIC,
    YIELD_MARK_SCALE,
};
pub use yield_pricing::{compute_yield_price, YieldQuote};
