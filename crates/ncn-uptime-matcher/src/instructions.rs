use matcher_common::{CodecError, PayloadReader, PayloadWriter};
use shank::ShankInstruction;
use solana_program::pubkey::Pubkey;

use crate::errors::UptimeMatcherError;
use crate::state::*;

#[derive(ShankInstruction, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UptimeMatcherInstruction {
    /// Execute match: probability-based pricing with edge spread for NCN uptime
    #[account(0, signer, name = "lp_pda", desc = "LP PDA (must be signer)")]
    #[account(1, writable, name = "matcher_context", desc = "Matcher context account (320 bytes)")]
    Match,

    /// Initialize NCN uptime matcher context
    #[account(0, name = "lp_pda", desc = "LP PDA to store")]
    #[account(1, writable, name = "matcher_context", desc = "Matcher context account (320 bytes, writable)")]
    Init,

    /// Sync uptime probability from NCN oracle
    #[account(0, writable, name = "matcher_context", desc = "Matcher context account")]
    #[account(1, name = "ncn_oracle", desc = "NcnPerformanceFeed account")]
    UptimeSync,

    /// Resolve NCN slashing event (SLASHED/SAFE)
    #[account(0, writable, name = "matcher_context", desc = "Matcher context account")]
    #[account(1, signer, name = "ncn_oracle", desc = "NCN oracle (must be signer)")]
    Resolve,
}

impl UptimeMatcherInstruction {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Match => 0x00,
            Self::Init => 0x02,
            Self::UptimeSync => 0x03,
            Self::Resolve => 0x04,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::Match),
            0x02 => Some(Self::Init),
            0x03 => Some(Self::UptimeSync),
            0x04 => Some(Self::Resolve),
            _ => None,
        }
    }
}

pub const MATCH_LEN: usize = 1;
pub const INIT_LEN: usize = 98;
pub const UPTIME_SYNC_LEN: usize = 25;
pub const RESOLVE_LEN: usize = 2;

pub fn pack_match() -> Vec<u8> {
    vec![UptimeMatcherInstruction::Match.tag()]
}

/// Tag 0x02 payload.
///   [0]    tag (0x02)
///   [1]    mode (u8: 0=Continuous, 1=SlashingSettlement)
///   [2..6] base_spread_bps (u32 LE)
///   [6..10] edge_spread_bps (u32 LE)
///   [10..14] max_spread_bps (u32 LE)
///   [14..18] impact_k_bps (u32 LE)
///   [18..26] initial_uptime_e6 (u64 LE)
///   [26..34] resolution_timestamp (i64 LE, 0 = no expiry)
///   [34..50] liquidity_notional_e6 (u128 LE)
///   [50..66] max_fill_abs (u128 LE)
///   [66..98] ncn_oracle pubkey (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitArgs {
    pub mode: UptimeMatcherMode,
    pub base_spread_bps: u32,
    pub edge_spread_bps: u32,
    pub max_spread_bps: u32,
    pub impact_k_bps: u32,
    pub initial_uptime_e6: u64,
    pub resolution_timestamp: i64,
    pub liquidity_notional_e6: u128,
    pub max_fill_abs: u128,
    pub ncn_oracle: Pubkey,
}

impl InitArgs {
    pub fn pack(&self) -> Result<Vec<u8>, UptimeMatcherError> {
        if self.initial_uptime_e6 > MAX_PROBABILITY {
            return Err(UptimeMatcherError::InvalidProbability);
        }
        Ok(PayloadWriter::with_tag(UptimeMatcherInstruction::Init.tag(), INIT_LEN)
            .u8(self.mode as u8)
            .u32(self.base_spread_bps)
            .u32(self.edge_spread_bps)
            .u32(self.max_spread_bps)
            .u32(self.impact_k_bps)
            .u64(self.initial_uptime_e6)
            .i64(self.resolution_timestamp)
            .u128(self.liquidity_notional_e6)
            .u128(self.max_fill_abs)
            .pubkey(&self.ncn_oracle)
            .finish())
    }
}

/// Tag 0x03 payload.
///   [0]    tag (0x03)
///   [1..9] new_uptime_e6 (u64 LE, 0-1_000_000)
///   [9..17] signal_severity (u64 LE, 0-3)
///   [17..25] signal_adjusted_spread (u64 LE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeSyncArgs {
    pub uptime_e6: u64,
    pub signal_severity: SignalSeverity,
    pub signal_adjusted_spread: u64,
}

impl UptimeSyncArgs {
    /// Sync with the standard spread for `severity`.
    pub fn new(uptime_e6: u64, severity: SignalSeverity) -> Result<Self, UptimeMatcherError> {
        Self::with_spread(uptime_e6, severity, severity.adjusted_spread_bps())
    }

    pub fn with_spread(
        uptime_e6: u64,
        signal_severity: SignalSeverity,
        signal_adjusted_spread: u64,
    ) -> Result<Self, UptimeMatcherError> {
        if uptime_e6 > MAX_PROBABILITY {
            return Err(UptimeMatcherError::InvalidProbability);
        }
        Ok(Self {
            uptime_e6,
            signal_severity,
            signal_adjusted_spread,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        PayloadWriter::with_tag(UptimeMatcherInstruction::UptimeSync.tag(), UPTIME_SYNC_LEN)
            .u64(self.uptime_e6)
            .u64(self.signal_severity.as_u64())
            .u64(self.signal_adjusted_spread)
            .finish()
    }

    pub fn unpack(data: &[u8]) -> Result<Self, PayloadError> {
        let mut r = PayloadReader::new(data, UptimeMatcherInstruction::UptimeSync.tag(), UPTIME_SYNC_LEN)?;
        let uptime_e6 = r.u64();
        let severity = SignalSeverity::try_from(r.u64())?;
        Ok(Self::with_spread(uptime_e6, severity, r.u64())?)
    }
}

/// The sync that would reproduce the context's mutable signal fields.
impl TryFrom<&UptimeMatcherContext> for UptimeSyncArgs {
    type Error = UptimeMatcherError;

    fn try_from(ctx: &UptimeMatcherContext) -> Result<Self, Self::Error> {
        Self::with_spread(
            ctx.current_uptime_e6,
            ctx.signal_severity()?,
            ctx.signal_adjusted_spread,
        )
    }
}

/// Tag 0x04 payload.
///   [0] tag (0x04)
///   [1] outcome (u8: 0=SLASHED -> prob=0, 1=SAFE -> prob=1_000_000)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveArgs {
    pub outcome: ResolutionOutcome,
}

impl ResolveArgs {
    pub fn pack(&self) -> Vec<u8> {
        PayloadWriter::with_tag(UptimeMatcherInstruction::Resolve.tag(), RESOLVE_LEN)
            .u8(self.outcome as u8)
            .finish()
    }

    pub fn unpack(data: &[u8]) -> Result<Self, PayloadError> {
        let mut r = PayloadReader::new(data, UptimeMatcherInstruction::Resolve.tag(), RESOLVE_LEN)?;
        Ok(Self {
            outcome: ResolutionOutcome::try_from(r.u8())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Matcher(#[from] UptimeMatcherError),
}
