use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

use crate::errors::UptimeMatcherError;
use crate::market::MarketState;

// Re-export shared constants and functions from matcher-common
pub use matcher_common::{
    read_lp_pda, verify_magic as verify_magic_generic, CodecError, MatcherHeader, MatcherReturn,
    CTX_SIZE, LP_PDA_OFFSET, MAGIC_OFFSET, RETURN_DATA_OFFSET, RETURN_DATA_SIZE,
};

/// Magic bytes: "NCNUMATC" as u64 LE
pub const UPTIME_MATCHER_MAGIC: u64 = 0x4e43_4e55_4d41_5443;

// Field offsets (ncn-uptime-matcher-specific)
pub const VERSION_OFFSET: usize = 72;                      // u32
pub const MODE_OFFSET: usize = 76;                         // u8: 0=Continuous, 1=SlashingSettlement
pub const BASE_SPREAD_OFFSET: usize = 112;                 // u32
pub const EDGE_SPREAD_OFFSET: usize = 116;                 // u32: extra spread near 0%/100% uptime
pub const MAX_SPREAD_OFFSET: usize = 120;                  // u32
pub const IMPACT_K_OFFSET: usize = 124;                    // u32
pub const CURRENT_UPTIME_OFFSET: usize = 128;              // u64 (0 - 1_000_000)
pub const UPTIME_MARK_OFFSET: usize = 136;                 // u64: mark price = uptime prob * 1e6
pub const LAST_UPDATE_SLOT_OFFSET: usize = 144;            // u64
pub const RESOLUTION_TIMESTAMP_OFFSET: usize = 152;        // i64 (0 = no expiry)
pub const IS_RESOLVED_OFFSET: usize = 160;                 // u8
pub const RESOLUTION_OUTCOME_OFFSET: usize = 161;          // u8: 0=SLASHED, 1=SAFE
pub const SIGNAL_SEVERITY_OFFSET: usize = 168;             // u64 (0-3)
pub const SIGNAL_ADJUSTED_SPREAD_OFFSET: usize = 176;      // u64
pub const LIQUIDITY_OFFSET: usize = 184;                   // u128 (16 bytes)
pub const MAX_FILL_OFFSET: usize = 200;                    // u128 (16 bytes)
pub const NCN_ORACLE_OFFSET: usize = 216;                  // Pubkey (32): NcnPerformanceFeed account
pub const RESERVED_OFFSET: usize = 248;                    // 248..320 = reserved

/// Maximum probability value (100% uptime = 1_000_000)
pub const MAX_PROBABILITY: u64 = 1_000_000;

/// Slots after which a Match rejects the synced uptime as stale.
pub const MAX_ORACLE_STALENESS_SLOTS: u64 = 200;

/// Signal severity levels (Kalshify-style)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSeverity {
    #[default]
    None = 0,
    Low = 1,
    High = 2,
    Critical = 3,
}

pub const SIGNAL_NONE: u64 = SignalSeverity::None as u64;
pub const SIGNAL_LOW: u64 = SignalSeverity::Low as u64;
pub const SIGNAL_HIGH: u64 = SignalSeverity::High as u64;
pub const SIGNAL_CRITICAL: u64 = SignalSeverity::Critical as u64;

impl SignalSeverity {
    pub fn as_u64(self) -> u64 {
        self as u64
    }

    /// Extra spread pushed as `signal_adjusted_spread` on UptimeSync.
    pub fn adjusted_spread_bps(self) -> u64 {
        match self {
            Self::None => 0,
            Self::Low => 20,
            Self::High => 50,
            Self::Critical => 200,
        }
    }
}

/// No fallback: a severity outside 0-3 is a caller bug, not a default.
impl TryFrom<u64> for SignalSeverity {
    type Error = UptimeMatcherError;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Low),
            2 => Ok(Self::High),
            3 => Ok(Self::Critical),
            _ => Err(UptimeMatcherError::InvalidSignalSeverity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionOutcome {
    Slashed = 0,
    Safe = 1,
}

impl ResolutionOutcome {
    /// SLASHED -> 0%, SAFE -> 100%
    pub fn final_probability(self) -> u64 {
        match self {
            Self::Slashed => 0,
            Self::Safe => MAX_PROBABILITY,
        }
    }
}

impl TryFrom<u8> for ResolutionOutcome {
    type Error = UptimeMatcherError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Slashed),
            1 => Ok(Self::Safe),
            _ => Err(UptimeMatcherError::InvalidOutcome),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UptimeMatcherMode {
    Continuous = 0,
    SlashingSettlement = 1,
}

impl UptimeMatcherMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Continuous),
            1 => Some(Self::SlashingSettlement),
            _ => None,
        }
    }
}

/// Byte-exact image of an NCN uptime matcher context account.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct UptimeContextLayout {
    pub header: MatcherHeader,
    pub base_spread_bps: [u8; 4],
    pub edge_spread_bps: [u8; 4],
    pub max_spread_bps: [u8; 4],
    pub impact_k_bps: [u8; 4],
    pub current_uptime_e6: [u8; 8],
    pub uptime_mark_e6: [u8; 8],
    pub last_update_slot: [u8; 8],
    pub resolution_timestamp: [u8; 8],
    pub is_resolved: u8,
    pub resolution_outcome: u8,
    pub _resolution_padding: [u8; 6],
    pub signal_severity: [u8; 8],
    pub signal_adjusted_spread: [u8; 8],
    pub liquidity_notional_e6: [u8; 16],
    pub max_fill_abs: [u8; 16],
    pub ncn_oracle: [u8; 32],
    pub _reserved: [u8; CTX_SIZE - RESERVED_OFFSET],
}

const _: () = assert!(core::mem::size_of::<UptimeContextLayout>() == CTX_SIZE);

/// Decoded NCN uptime matcher context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeMatcherContext {
    pub last_return: MatcherReturn,
    pub magic: u64,
    pub version: u32,
    pub mode: u8,
    pub lp_pda: Pubkey,
    pub base_spread_bps: u32,
    pub edge_spread_bps: u32,
    pub max_spread_bps: u32,
    pub impact_k_bps: u32,
    pub current_uptime_e6: u64,
    pub uptime_mark_e6: u64,
    pub last_update_slot: u64,
    pub resolution_timestamp: i64,
    pub is_resolved: bool,
    /// Raw outcome byte; only meaningful once `is_resolved`.
    pub resolution_outcome: u8,
    /// Raw severity word; see `signal_severity()`.
    pub signal_severity: u64,
    pub signal_adjusted_spread: u64,
    pub liquidity_notional_e6: u128,
    pub max_fill_abs: u128,
    pub ncn_oracle: Pubkey,
}

impl UptimeMatcherContext {
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        matcher_common::ensure_ctx_len(data)?;
        let raw: UptimeContextLayout = bytemuck::pod_read_unaligned(&data[..CTX_SIZE]);

        let magic = raw.header.magic();
        if magic != UPTIME_MATCHER_MAGIC {
            return Err(CodecError::UnknownMagic { found: magic });
        }

        Ok(Self {
            last_return: raw.header.matcher_return(),
            magic,
            version: raw.header.version(),
            mode: raw.header.mode,
            lp_pda: raw.header.lp_pda(),
            base_spread_bps: u32::from_le_bytes(raw.base_spread_bps),
            edge_spread_bps: u32::from_le_bytes(raw.edge_spread_bps),
            max_spread_bps: u32::from_le_bytes(raw.max_spread_bps),
            impact_k_bps: u32::from_le_bytes(raw.impact_k_bps),
            current_uptime_e6: u64::from_le_bytes(raw.current_uptime_e6),
            uptime_mark_e6: u64::from_le_bytes(raw.uptime_mark_e6),
            last_update_slot: u64::from_le_bytes(raw.last_update_slot),
            resolution_timestamp: i64::from_le_bytes(raw.resolution_timestamp),
            // The program only ever writes 0 or 1 and tests `== 1`.
            is_resolved: raw.is_resolved == 1,
            resolution_outcome: raw.resolution_outcome,
            signal_severity: u64::from_le_bytes(raw.signal_severity),
            signal_adjusted_spread: u64::from_le_bytes(raw.signal_adjusted_spread),
            liquidity_notional_e6: u128::from_le_bytes(raw.liquidity_notional_e6),
            max_fill_abs: u128::from_le_bytes(raw.max_fill_abs),
            ncn_oracle: Pubkey::new_from_array(raw.ncn_oracle),
        })
    }

    pub fn encode(&self) -> [u8; CTX_SIZE] {
        let mut header = MatcherHeader::new(self.magic, self.mode, &self.lp_pda);
        header.version = self.version.to_le_bytes();
        header.return_data = self.last_return.to_prefix();

        let raw = UptimeContextLayout {
            header,
            base_spread_bps: self.base_spread_bps.to_le_bytes(),
            edge_spread_bps: self.edge_spread_bps.to_le_bytes(),
            max_spread_bps: self.max_spread_bps.to_le_bytes(),
            impact_k_bps: self.impact_k_bps.to_le_bytes(),
            current_uptime_e6: self.current_uptime_e6.to_le_bytes(),
            uptime_mark_e6: self.uptime_mark_e6.to_le_bytes(),
            last_update_slot: self.last_update_slot.to_le_bytes(),
            resolution_timestamp: self.resolution_timestamp.to_le_bytes(),
            is_resolved: self.is_resolved as u8,
            resolution_outcome: self.resolution_outcome,
            _resolution_padding: [0; 6],
            signal_severity: self.signal_severity.to_le_bytes(),
            signal_adjusted_spread: self.signal_adjusted_spread.to_le_bytes(),
            liquidity_notional_e6: self.liquidity_notional_e6.to_le_bytes(),
            max_fill_abs: self.max_fill_abs.to_le_bytes(),
            ncn_oracle: self.ncn_oracle.to_bytes(),
            _reserved: [0; CTX_SIZE - RESERVED_OFFSET],
        };

        let mut out = [0u8; CTX_SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&raw));
        out
    }

    pub fn mode(&self) -> Option<UptimeMatcherMode> {
        UptimeMatcherMode::from_u8(self.mode)
    }

    pub fn signal_severity(&self) -> Result<SignalSeverity, UptimeMatcherError> {
        SignalSeverity::try_from(self.signal_severity)
    }

    pub fn market_state(&self) -> Result<MarketState, UptimeMatcherError> {
        if !self.is_resolved {
            return Ok(MarketState::Open);
        }
        ResolutionOutcome::try_from(self.resolution_outcome).map(MarketState::Resolved)
    }
}

pub fn verify_magic(ctx_data: &[u8]) -> bool {
    verify_magic_generic(ctx_data, UPTIME_MATCHER_MAGIC)
}
