//! Resolution lifecycle of an uptime market.
//!
//! `Open` is the initial state. A single authorized Resolve moves the market to
//! `Resolved(outcome)`, after which nothing can be priced, synced or resolved
//! again. Yield markets are perpetual and have no equivalent.

use crate::errors::UptimeMatcherError;
use crate::instructions::UptimeSyncArgs;
use crate::state::{ResolutionOutcome, UptimeMatcherContext};
use crate::uptime_pricing::{compute_uptime_price, UptimeQuote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketState {
    #[default]
    Open,
    Resolved(ResolutionOutcome),
}

impl MarketState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn outcome(&self) -> Option<ResolutionOutcome> {
        match self {
            Self::Open => None,
            Self::Resolved(outcome) => Some(*outcome),
        }
    }

    pub fn ensure_open(&self) -> Result<(), UptimeMatcherError> {
        match self {
            Self::Open => Ok(()),
            Self::Resolved(_) => Err(UptimeMatcherError::MarketResolved),
        }
    }

    /// Open -> Resolved. Returns the final probability the market settles at.
    pub fn resolve(&mut self, outcome: ResolutionOutcome) -> Result<u64, UptimeMatcherError> {
        self.ensure_open()?;
        *self = Self::Resolved(outcome);
        Ok(outcome.final_probability())
    }

    /// Price a trade, refusing once the market is resolved whatever the inputs.
    pub fn price(
        &self,
        base_spread_bps: u32,
        edge_spread_bps: u32,
        max_spread_bps: u32,
        uptime_e6: u64,
        signal_adjusted_spread: u64,
    ) -> Result<UptimeQuote, UptimeMatcherError> {
        self.ensure_open()?;
        compute_uptime_price(
            base_spread_bps,
            edge_spread_bps,
            max_spread_bps,
            uptime_e6,
            signal_adjusted_spread,
        )
    }
}

impl UptimeMatcherContext {
    /// Rejects on the resolved flag alone; the outcome byte is not consulted.
    pub fn ensure_open(&self) -> Result<(), UptimeMatcherError> {
        if self.is_resolved {
            return Err(UptimeMatcherError::MarketResolved);
        }
        Ok(())
    }

    /// Apply the effects of an UptimeSync the way the program does.
    pub fn apply_uptime_sync(
        &mut self,
        args: &UptimeSyncArgs,
        slot: u64,
    ) -> Result<(), UptimeMatcherError> {
        self.ensure_open()?;
        self.current_uptime_e6 = args.uptime_e6;
        self.uptime_mark_e6 = args.uptime_e6;
        self.last_update_slot = slot;
        self.signal_severity = args.signal_severity.as_u64();
        self.signal_adjusted_spread = args.signal_adjusted_spread;
        Ok(())
    }

    /// Apply a Resolve: snaps current and mark probability to the outcome.
    pub fn apply_resolve(&mut self, outcome: ResolutionOutcome) -> Result<u64, UptimeMatcherError> {
        self.ensure_open()?;
        let final_probability = MarketState::Open.resolve(outcome)?;
        self.is_resolved = true;
        self.resolution_outcome = outcome as u8;
        self.current_uptime_e6 = final_probability;
        self.uptime_mark_e6 = final_probability;
        tracing::info!(?outcome, final_probability, "uptime market resolved");
        Ok(final_probability)
    }
}
