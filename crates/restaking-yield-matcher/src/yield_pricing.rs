use matcher_common::compute_exec_price;

use crate::errors::YieldMatcherError;
use crate::state::*;

/// Intermediate and final values of one yield-regime pricing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldQuote {
    pub regime_multiplier: u64,
    pub adjusted_yield_vol: u64,
    pub total_spread: u64,
    pub exec_price: u64,
}

/// Yield-regime-adjusted execution price, bit-identical to the matcher's Match.
///
///   adjusted_yield_vol = yield_vol_spread * regime_multiplier / 100
///   total_spread       = min(base_spread + adjusted_yield_vol, max_spread)
///   exec_price         = mark * (10_000 + total_spread) / 10_000
///
/// Every division truncates.
pub fn compute_yield_price(
    base_spread_bps: u32,
    yield_vol_spread_bps: u32,
    max_spread_bps: u32,
    regime: YieldRegime,
    yield_mark_price_e6: u64,
) -> Result<YieldQuote, YieldMatcherError> {
    let regime_multiplier = regime.spread_multiplier();
    let adjusted_yield_vol = (yield_vol_spread_bps as u64)
        .checked_mul(regime_multiplier)
        .ok_or(YieldMatcherError::ArithmeticOverflow)?
        / 100;

    let total_spread = std::cmp::min(
        (base_spread_bps as u64).saturating_add(adjusted_yield_vol),
        max_spread_bps as u64,
    );

    let exec_price = compute_exec_price(yield_mark_price_e6, total_spread)
        .ok_or(YieldMatcherError::ArithmeticOverflow)?;

    Ok(YieldQuote {
        regime_multiplier,
        adjusted_yield_vol,
        total_spread,
        exec_price,
    })
}

impl YieldMatcherContext {
    /// Price a match against this context as of `current_slot`.
    pub fn quote(&self, current_slot: u64) -> Result<YieldQuote, YieldMatcherError> {
        if !self.is_synced() {
            tracing::debug!("yield mark price not set -- oracle sync required");
            return Err(YieldMatcherError::OracleNotSynced);
        }

        if current_slot.saturating_sub(self.last_update_slot) > MAX_ORACLE_STALENESS_SLOTS {
            tracing::debug!(
                last_update_slot = self.last_update_slot,
                current_slot,
                "yield oracle stale"
            );
            return Err(YieldMatcherError::OracleStale);
        }

        compute_yield_price(
            self.base_spread_bps,
            self.yield_vol_spread_bps,
            self.max_spread_bps,
            self.regime(),
            self.yield_mark_price_e6,
        )
    }
}
