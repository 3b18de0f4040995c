use matcher_common::{CodecError, PayloadReader, PayloadWriter};
use shank::ShankInstruction;
use solana_program::pubkey::Pubkey;

use crate::errors::YieldMatcherError;
use crate::state::{YieldMatcherContext, YieldMatcherMode, YieldRegime};

#[derive(ShankInstruction, Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMatcherInstruction {
    /// Execute match: compute yield-regime-adjusted execution price
    #[account(0, signer, name = "lp_pda", desc = "LP PDA (must be signer)")]
    #[account(1, writable, name = "matcher_context", desc = "Matcher context account (320 bytes)")]
    Match,

    /// Initialize restaking yield matcher context
    #[account(0, name = "lp_pda", desc = "LP PDA to store")]
    #[account(1, writable, name = "matcher_context", desc = "Matcher context account (320 bytes, writable)")]
    Init,

    /// Sync oracle: keeper updates yield data from NCN oracle
    #[account(0, writable, name = "matcher_context", desc = "Matcher context account")]
    #[account(1, name = "ncn_yield_feed", desc = "NcnYieldFeed account")]
    #[account(2, name = "ncn_performance_feed", desc = "NcnPerformanceFeed account")]
    OracleSync,
}

impl YieldMatcherInstruction {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Match => 0x00,
            Self::Init => 0x02,
            Self::OracleSync => 0x03,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::Match),
            0x02 => Some(Self::Init),
            0x03 => Some(Self::OracleSync),
            _ => None,
        }
    }
}

pub const MATCH_LEN: usize = 1;
pub const INIT_LEN: usize = 114;
pub const ORACLE_SYNC_LEN: usize = 34;

/// Tag 0x00. The matcher ignores everything after the tag.
pub fn pack_match() -> Vec<u8> {
    vec![YieldMatcherInstruction::Match.tag()]
}

/// Tag 0x02 payload.
///   [0]    tag (0x02)
///   [1]    mode (u8: 0=AllNCN, 1=SingleNCN)
///   [2..6] base_spread_bps (u32 LE)
///   [6..10] yield_vol_spread_bps (u32 LE)
///   [10..14] max_spread_bps (u32 LE)
///   [14..18] impact_k_bps (u32 LE)
///   [18..34] liquidity_notional_e6 (u128 LE)
///   [34..50] max_fill_abs (u128 LE)
///   [50..82] ncn_yield_feed pubkey (32 bytes)
///   [82..114] ncn_performance_feed pubkey (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitArgs {
    pub mode: YieldMatcherMode,
    pub base_spread_bps: u32,
    pub yield_vol_spread_bps: u32,
    pub max_spread_bps: u32,
    pub impact_k_bps: u32,
    pub liquidity_notional_e6: u128,
    pub max_fill_abs: u128,
    pub ncn_yield_feed: Pubkey,
    pub ncn_performance_feed: Pubkey,
}

impl InitArgs {
    pub fn pack(&self) -> Vec<u8> {
        PayloadWriter::with_tag(YieldMatcherInstruction::Init.tag(), INIT_LEN)
            .u8(self.mode as u8)
            .u32(self.base_spread_bps)
            .u32(self.yield_vol_spread_bps)
            .u32(self.max_spread_bps)
            .u32(self.impact_k_bps)
            .u128(self.liquidity_notional_e6)
            .u128(self.max_fill_abs)
            .pubkey(&self.ncn_yield_feed)
            .pubkey(&self.ncn_performance_feed)
            .finish()
    }
}

/// Tag 0x03 payload.
///   [0]    tag (0x03)
///   [1..9] current_yield_bps (u64 LE): from keeper reading NCN oracle
///   [9..17] yield_mark_price_e6 (u64 LE): yield * 1e6
///   [17]   regime (u8)
///   [18..26] yield_7d_avg_bps (u64 LE)
///   [26..34] yield_30d_avg_bps (u64 LE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleSyncArgs {
    pub current_yield_bps: u64,
    pub yield_mark_price_e6: u64,
    pub regime: YieldRegime,
    pub yield_7d_avg_bps: u64,
    pub yield_30d_avg_bps: u64,
}

impl OracleSyncArgs {
    pub fn pack(&self) -> Vec<u8> {
        PayloadWriter::with_tag(YieldMatcherInstruction::OracleSync.tag(), ORACLE_SYNC_LEN)
            .u64(self.current_yield_bps)
            .u64(self.yield_mark_price_e6)
            .u8(self.regime.as_u8())
            .u64(self.yield_7d_avg_bps)
            .u64(self.yield_30d_avg_bps)
            .finish()
    }

    /// Parse a sync payload. A regime byte above 4 is rejected the way the
    /// program rejects it, instead of falling back to Normal.
    pub fn unpack(data: &[u8]) -> Result<Self, SyncPayloadError> {
        let mut r = PayloadReader::new(data, YieldMatcherInstruction::OracleSync.tag(), ORACLE_SYNC_LEN)?;
        let current_yield_bps = r.u64();
        let yield_mark_price_e6 = r.u64();
        let regime = r.u8();
        if regime > YieldRegime::Extreme.as_u8() {
            return Err(YieldMatcherError::InvalidRegime.into());
        }
        Ok(Self {
            current_yield_bps,
            yield_mark_price_e6,
            regime: YieldRegime::from_u8(regime),
            yield_7d_avg_bps: r.u64(),
            yield_30d_avg_bps: r.u64(),
        })
    }
}

/// The sync that would reproduce the context's oracle fields. Fails on a
/// regime byte the program would not accept in a sync.
impl TryFrom<&YieldMatcherContext> for OracleSyncArgs {
    type Error = YieldMatcherError;

    fn try_from(ctx: &YieldMatcherContext) -> Result<Self, Self::Error> {
        if ctx.yield_regime > YieldRegime::Extreme.as_u8() {
            return Err(YieldMatcherError::InvalidRegime);
        }
        Ok(Self {
            current_yield_bps: ctx.current_yield_bps,
            yield_mark_price_e6: ctx.yield_mark_price_e6,
            regime: ctx.regime(),
            yield_7d_avg_bps: ctx.yield_7d_avg_bps,
            yield_30d_avg_bps: ctx.yield_30d_avg_bps,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyncPayloadError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Matcher(#[from] YieldMatcherError),
}
