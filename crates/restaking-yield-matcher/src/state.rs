use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

// Re-export shared constants and functions from matcher-common
pub use matcher_common::{
    read_lp_pda, verify_magic as verify_magic_generic, CodecError, MatcherHeader, MatcherReturn,
    CTX_SIZE, LP_PDA_OFFSET, MAGIC_OFFSET, RETURN_DATA_OFFSET, RETURN_DATA_SIZE,
};

/// Magic bytes: "RSTKMATC" as u64 LE
pub const YIELD_MATCHER_MAGIC: u64 = 0x5253_544B_4d41_5443;

// Restaking-yield-matcher-specific field offsets
pub const VERSION_OFFSET: usize = 72;                   // u32
pub const MODE_OFFSET: usize = 76;                      // u8: 0=AllNCN, 1=SingleNCN
pub const BASE_SPREAD_OFFSET: usize = 112;              // u32
pub const YIELD_VOL_SPREAD_OFFSET: usize = 116;         // u32: extra spread for yield volatility
pub const MAX_SPREAD_OFFSET: usize = 120;               // u32
pub const IMPACT_K_OFFSET: usize = 124;                 // u32
pub const CURRENT_YIELD_OFFSET: usize = 128;            // u64: current restaking yield in bps
pub const YIELD_MARK_PRICE_OFFSET: usize = 136;         // u64: mark price = yield * 1e6
pub const LAST_UPDATE_SLOT_OFFSET: usize = 144;         // u64
pub const YIELD_REGIME_OFFSET: usize = 152;             // u8: 0=VeryLow..4=Extreme
pub const YIELD_7D_AVG_OFFSET: usize = 160;             // u64
pub const YIELD_30D_AVG_OFFSET: usize = 168;            // u64
pub const LIQUIDITY_OFFSET: usize = 176;                // u128 (16 bytes)
pub const MAX_FILL_OFFSET: usize = 192;                 // u128 (16 bytes)
pub const NCN_YIELD_FEED_OFFSET: usize = 208;           // Pubkey (32): NcnYieldFeed account
pub const NCN_PERFORMANCE_FEED_OFFSET: usize = 240;     // Pubkey (32): NcnPerformanceFeed account
pub const RESERVED_OFFSET: usize = 272;                 // 272..320 = reserved

/// Slots after which a Match rejects the synced yield as stale.
pub const MAX_ORACLE_STALENESS_SLOTS: u64 = 100;

/// Yield mark price scale: mark = yield_bps * 1e6
pub const YIELD_MARK_SCALE: u64 = 1_000_000;

/// Yield regime enum: the vol-matcher's VolatilityRegime concept
/// applied to restaking yield variance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YieldRegime {
    VeryLow = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Extreme = 4,
}

impl YieldRegime {
    /// Out-of-range bytes read as Normal, matching the on-chain Match.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::VeryLow,
            1 => Self::Low,
            2 => Self::Normal,
            3 => Self::High,
            4 => Self::Extreme,
            _ => Self::Normal,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Spread multiplier: how much to scale yield vol spread
    /// Same scale as vol-matcher: 50=0.5x, 100=1.0x, 250=2.5x
    pub fn spread_multiplier(&self) -> u64 {
        match self {
            Self::VeryLow => 50,   // 0.5x: very stable yield
            Self::Low => 75,       // 0.75x
            Self::Normal => 100,   // 1.0x
            Self::High => 150,     // 1.5x: yield getting volatile
            Self::Extreme => 250,  // 2.5x: slashing events, NCN instability
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMatcherMode {
    /// Tracks the aggregate yield across all NCNs
    AllNcn = 0,
    /// Tracks a single NCN's yield
    SingleNcn = 1,
}

impl YieldMatcherMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::AllNcn),
            1 => Some(Self::SingleNcn),
            _ => None,
        }
    }
}

/// Byte-exact image of a yield matcher context account.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct YieldContextLayout {
    pub header: MatcherHeader,
    pub base_spread_bps: [u8; 4],
    pub yield_vol_spread_bps: [u8; 4],
    pub max_spread_bps: [u8; 4],
    pub impact_k_bps: [u8; 4],
    pub current_yield_bps: [u8; 8],
    pub yield_mark_price_e6: [u8; 8],
    pub last_update_slot: [u8; 8],
    pub yield_regime: u8,
    pub _regime_padding: [u8; 7],
    pub yield_7d_avg_bps: [u8; 8],
    pub yield_30d_avg_bps: [u8; 8],
    pub liquidity_notional_e6: [u8; 16],
    pub max_fill_abs: [u8; 16],
    pub ncn_yield_feed: [u8; 32],
    pub ncn_performance_feed: [u8; 32],
    pub _reserved: [u8; CTX_SIZE - RESERVED_OFFSET],
}

const _: () = assert!(core::mem::size_of::<YieldContextLayout>() == CTX_SIZE);

/// Decoded restaking yield matcher context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldMatcherContext {
    pub last_return: MatcherReturn,
    pub magic: u64,
    pub version: u32,
    /// Raw mode byte; see `mode()`.
    pub mode: u8,
    pub lp_pda: Pubkey,
    pub base_spread_bps: u32,
    pub yield_vol_spread_bps: u32,
    pub max_spread_bps: u32,
    pub impact_k_bps: u32,
    pub current_yield_bps: u64,
    pub yield_mark_price_e6: u64,
    pub last_update_slot: u64,
    /// Raw regime byte; see `regime()`.
    pub yield_regime: u8,
    pub yield_7d_avg_bps: u64,
    pub yield_30d_avg_bps: u64,
    pub liquidity_notional_e6: u128,
    pub max_fill_abs: u128,
    pub ncn_yield_feed: Pubkey,
    pub ncn_performance_feed: Pubkey,
}

impl YieldMatcherContext {
    /// Decode a context account. Fails with `TruncatedAccount` for short
    /// buffers and `UnknownMagic` when the tag is not the yield matcher's.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        matcher_common::ensure_ctx_len(data)?;
        let raw: YieldContextLayout = bytemuck::pod_read_unaligned(&data[..CTX_SIZE]);

        let magic = raw.header.magic();
        if magic != YIELD_MATCHER_MAGIC {
            return Err(CodecError::UnknownMagic { found: magic });
        }

        Ok(Self {
            last_return: raw.header.matcher_return(),
            magic,
            version: raw.header.version(),
            mode: raw.header.mode,
            lp_pda: raw.header.lp_pda(),
            base_spread_bps: u32::from_le_bytes(raw.base_spread_bps),
            yield_vol_spread_bps: u32::from_le_bytes(raw.yield_vol_spread_bps),
            max_spread_bps: u32::from_le_bytes(raw.max_spread_bps),
            impact_k_bps: u32::from_le_bytes(raw.impact_k_bps),
            current_yield_bps: u64::from_le_bytes(raw.current_yield_bps),
            yield_mark_price_e6: u64::from_le_bytes(raw.yield_mark_price_e6),
            last_update_slot: u64::from_le_bytes(raw.last_update_slot),
            yield_regime: raw.yield_regime,
            yield_7d_avg_bps: u64::from_le_bytes(raw.yield_7d_avg_bps),
            yield_30d_avg_bps: u64::from_le_bytes(raw.yield_30d_avg_bps),
            liquidity_notional_e6: u128::from_le_bytes(raw.liquidity_notional_e6),
            max_fill_abs: u128::from_le_bytes(raw.max_fill_abs),
            ncn_yield_feed: Pubkey::new_from_array(raw.ncn_yield_feed),
            ncn_performance_feed: Pubkey::new_from_array(raw.ncn_performance_feed),
        })
    }

    /// Full 320-byte account image; padding and reserved bytes are zero.
    pub fn encode(&self) -> [u8; CTX_SIZE] {
        let mut header = MatcherHeader::new(self.magic, self.mode, &self.lp_pda);
        header.version = self.version.to_le_bytes();
        header.return_data = self.last_return.to_prefix();

        let raw = YieldContextLayout {
            header,
            base_spread_bps: self.base_spread_bps.to_le_bytes(),
            yield_vol_spread_bps: self.yield_vol_spread_bps.to_le_bytes(),
            max_spread_bps: self.max_spread_bps.to_le_bytes(),
            impact_k_bps: self.impact_k_bps.to_le_bytes(),
            current_yield_bps: self.current_yield_bps.to_le_bytes(),
            yield_mark_price_e6: self.yield_mark_price_e6.to_le_bytes(),
            last_update_slot: self.last_update_slot.to_le_bytes(),
            yield_regime: self.yield_regime,
            _regime_padding: [0; 7],
            yield_7d_avg_bps: self.yield_7d_avg_bps.to_le_bytes(),
            yield_30d_avg_bps: self.yield_30d_avg_bps.to_le_bytes(),
            liquidity_notional_e6: self.liquidity_notional_e6.to_le_bytes(),
            max_fill_abs: self.max_fill_abs.to_le_bytes(),
            ncn_yield_feed: self.ncn_yield_feed.to_bytes(),
            ncn_performance_feed: self.ncn_performance_feed.to_bytes(),
            _reserved: [0; CTX_SIZE - RESERVED_OFFSET],
        };

        let mut out = [0u8; CTX_SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&raw));
        out
    }

    pub fn mode(&self) -> Option<YieldMatcherMode> {
        YieldMatcherMode::from_u8(self.mode)
    }

    /// Regime used for pricing; an unknown byte prices as Normal.
    pub fn regime(&self) -> YieldRegime {
        YieldRegime::from_u8(self.yield_regime)
    }

    /// Whether an oracle sync has ever populated the mark price.
    pub fn is_synced(&self) -> bool {
        self.yield_mark_price_e6 != 0
    }
}

/// Local convenience wrapper that checks magic against YIELD_MATCHER_MAGIC
pub fn verify_magic(ctx_data: &[u8]) -> bool {
    verify_magic_generic(ctx_data, YIELD_MATCHER_MAGIC)
}
