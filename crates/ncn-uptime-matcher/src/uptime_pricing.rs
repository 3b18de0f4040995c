use matcher_common::compute_exec_price;

use crate::errors::UptimeMatcherError;
use crate::state::*;

/// Saturating ceiling for the edge factor (10x in 1e6 fixed point).
pub const MAX_EDGE_FACTOR: u128 = 10_000_000;

const EDGE_SCALE: u128 = 1_000_000;
const PROBABILITY_SQ_SCALE: u128 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeQuote {
    pub edge_denominator: u128,
    pub edge_factor: u128,
    pub adjusted_edge: u128,
    pub total_spread: u64,
    pub exec_price: u64,
}

/// `4 * p * (1-p)` in 1e12 fixed point, before truncation: 1e12 at 50%, 0 at
/// either end. Out-of-range probabilities price like 100%.
fn uncertainty_product(uptime_e6: u64) -> u128 {
    let p = uptime_e6 as u128;
    let one_minus_p = (MAX_PROBABILITY as u128).saturating_sub(p);
    p.checked_mul(one_minus_p)
        .and_then(|v| v.checked_mul(4))
        .unwrap_or(0)
}

/// Probability-based pricing with edge spread, bit-identical to the matcher's Match.
///
/// Edge factor = 1 / (p * (1-p) * 4), capped at 10x:
///   at 50%:   factor = 1.0 (no extra spread)
///   at 99.5%: denominator truncates to 0, factor = 10x
///   at 10%:   denominator 0.36 truncates to 0, factor = 10x
///
/// Mark price is the uptime probability itself (already e6).
pub fn compute_uptime_price(
    base_spread_bps: u32,
    edge_spread_bps: u32,
    max_spread_bps: u32,
    uptime_e6: u64,
    signal_adjusted_spread: u64,
) -> Result<UptimeQuote, UptimeMatcherError> {
    // p * (1-p) * 4 / 1e12 gives us the denominator scaled appropriately
    let edge_denominator = uncertainty_product(uptime_e6) / PROBABILITY_SQ_SCALE;

    let edge_factor = if edge_denominator > 0 {
        std::cmp::min(EDGE_SCALE / edge_denominator, MAX_EDGE_FACTOR)
    } else {
        MAX_EDGE_FACTOR
    };

    let adjusted_edge = (edge_spread_bps as u128)
        .checked_mul(edge_factor)
        .unwrap_or(0)
        / EDGE_SCALE;

    // Total spread = base + edge_adjustment + signal_adjustment
    let total_spread = std::cmp::min(
        (base_spread_bps as u64)
            .saturating_add(adjusted_edge as u64)
            .saturating_add(signal_adjusted_spread),
        max_spread_bps as u64,
    );

    let exec_price = compute_exec_price(uptime_e6, total_spread)
        .ok_or(UptimeMatcherError::ArithmeticOverflow)?;

    Ok(UptimeQuote {
        edge_denominator,
        edge_factor,
        adjusted_edge,
        total_spread,
        exec_price,
    })
}

impl UptimeMatcherContext {
    /// Price a match against this context as of `current_slot`.
    pub fn quote(&self, current_slot: u64) -> Result<UptimeQuote, UptimeMatcherError> {
        if let Err(e) = self.ensure_open() {
            tracing::debug!("market is resolved -- no more trading");
            return Err(e);
        }

        if self.current_uptime_e6 == 0 {
            return Err(UptimeMatcherError::ProbabilityNotSet);
        }

        if current_slot.saturating_sub(self.last_update_slot) > MAX_ORACLE_STALENESS_SLOTS {
            tracing::debug!(
                last_update_slot = self.last_update_slot,
                current_slot,
                "uptime oracle stale"
            );
            return Err(UptimeMatcherError::OracleStale);
        }

        compute_uptime_price(
            self.base_spread_bps,
            self.edge_spread_bps,
            self.max_spread_bps,
            self.current_uptime_e6,
            self.signal_adjusted_spread,
        )
    }
}
