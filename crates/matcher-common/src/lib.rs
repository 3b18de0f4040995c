//! Shared layout for Percolator matcher context accounts.
//!
//! Every matcher context is a 320-byte account. The first 112 bytes are common
//! to all matcher kinds:
//!
//! ```text
//!   0..64   return-data prefix written by Match (see `MatcherReturn`)
//!  64..72   magic (u64 LE) identifying the matcher kind
//!  72..76   version (u32 LE)
//!  76       mode (u8, matcher-specific meaning)
//!  77..80   padding
//!  80..112  LP PDA
//! ```
//!
//! Everything after offset 112 is owned by the individual matcher crates.

use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;
use thiserror::Error;

pub const CTX_SIZE: usize = 320;
pub const RETURN_DATA_OFFSET: usize = 0;
pub const RETURN_DATA_SIZE: usize = 64;
pub const MAGIC_OFFSET: usize = 64;
pub const VERSION_OFFSET: usize = 72;
pub const MODE_OFFSET: usize = 76;
pub const LP_PDA_OFFSET: usize = 80;
pub const HEADER_SIZE: usize = 112;

/// Context version written by `Init`.
pub const MATCHER_VERSION: u32 = 1;

/// Denominator for spreads expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

// Matcher return prefix offsets (relative to RETURN_DATA_OFFSET)
pub const RET_OFF_ABI_VERSION: usize = 0;
pub const RET_OFF_FLAGS: usize = 4;
pub const RET_OFF_EXEC_PRICE: usize = 8;
pub const RET_OFF_EXEC_SIZE: usize = 16;
pub const RET_OFF_REQ_ID: usize = 32;
pub const RET_OFF_LP_ACCOUNT_ID: usize = 40;
pub const RET_OFF_ORACLE_PRICE: usize = 48;
pub const RET_OFF_RESERVED: usize = 56;

pub const FLAG_VALID: u32 = 1;
pub const FLAG_PARTIAL_OK: u32 = 2;
pub const FLAG_REJECTED: u32 = 4;

/// Decoding and payload-building failures shared by every matcher codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("account truncated: need {expected} bytes, got {actual}")]
    TruncatedAccount { expected: usize, actual: usize },

    #[error("unknown matcher magic {found:#018x}")]
    UnknownMagic { found: u64 },

    #[error("instruction payload truncated: need {expected} bytes, got {actual}")]
    TruncatedInstruction { expected: usize, actual: usize },

    #[error("unexpected instruction tag {found:#04x} (expected {expected:#04x})")]
    UnexpectedTag { expected: u8, found: u8 },
}

/// Header shared by every matcher context. All fields are byte arrays so the
/// struct has alignment 1 and can be read from any slice offset.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MatcherHeader {
    pub return_data: [u8; RETURN_DATA_SIZE],
    pub magic: [u8; 8],
    pub version: [u8; 4],
    pub mode: u8,
    pub _padding: [u8; 3],
    pub lp_pda: [u8; 32],
}

const _: () = assert!(core::mem::size_of::<MatcherHeader>() == HEADER_SIZE);

impl MatcherHeader {
    /// Header for a freshly initialized context (empty return data).
    pub fn new(magic: u64, mode: u8, lp_pda: &Pubkey) -> Self {
        Self {
            return_data: [0; RETURN_DATA_SIZE],
            magic: magic.to_le_bytes(),
            version: MATCHER_VERSION.to_le_bytes(),
            mode,
            _padding: [0; 3],
            lp_pda: lp_pda.to_bytes(),
        }
    }

    pub fn magic(&self) -> u64 {
        u64::from_le_bytes(self.magic)
    }

    pub fn version(&self) -> u32 {
        u32::from_le_bytes(self.version)
    }

    pub fn lp_pda(&self) -> Pubkey {
        Pubkey::new_from_array(self.lp_pda)
    }

    pub fn matcher_return(&self) -> MatcherReturn {
        MatcherReturn::from_prefix(&self.return_data)
    }
}

/// Result of the last Match, as written into the first 64 bytes of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatcherReturn {
    pub abi_version: u32,
    pub flags: u32,
    pub exec_price_e6: u64,
    pub exec_size: i128,
    pub req_id: u64,
    pub lp_account_id: u64,
    pub oracle_price_e6: u64,
    pub reserved: u64,
}

impl MatcherReturn {
    pub fn from_prefix(prefix: &[u8; RETURN_DATA_SIZE]) -> Self {
        Self {
            abi_version: u32::from_le_bytes(le_array(prefix, RET_OFF_ABI_VERSION)),
            flags: u32::from_le_bytes(le_array(prefix, RET_OFF_FLAGS)),
            exec_price_e6: u64::from_le_bytes(le_array(prefix, RET_OFF_EXEC_PRICE)),
            exec_size: i128::from_le_bytes(le_array(prefix, RET_OFF_EXEC_SIZE)),
            req_id: u64::from_le_bytes(le_array(prefix, RET_OFF_REQ_ID)),
            lp_account_id: u64::from_le_bytes(le_array(prefix, RET_OFF_LP_ACCOUNT_ID)),
            oracle_price_e6: u64::from_le_bytes(le_array(prefix, RET_OFF_ORACLE_PRICE)),
            reserved: u64::from_le_bytes(le_array(prefix, RET_OFF_RESERVED)),
        }
    }

    pub fn to_prefix(&self) -> [u8; RETURN_DATA_SIZE] {
        let mut out = [0u8; RETURN_DATA_SIZE];
        out[RET_OFF_ABI_VERSION..RET_OFF_FLAGS].copy_from_slice(&self.abi_version.to_le_bytes());
        out[RET_OFF_FLAGS..RET_OFF_EXEC_PRICE].copy_from_slice(&self.flags.to_le_bytes());
        out[RET_OFF_EXEC_PRICE..RET_OFF_EXEC_SIZE].copy_from_slice(&self.exec_price_e6.to_le_bytes());
        out[RET_OFF_EXEC_SIZE..RET_OFF_REQ_ID].copy_from_slice(&self.exec_size.to_le_bytes());
        out[RET_OFF_REQ_ID..RET_OFF_LP_ACCOUNT_ID].copy_from_slice(&self.req_id.to_le_bytes());
        out[RET_OFF_LP_ACCOUNT_ID..RET_OFF_ORACLE_PRICE].copy_from_slice(&self.lp_account_id.to_le_bytes());
        out[RET_OFF_ORACLE_PRICE..RET_OFF_RESERVED].copy_from_slice(&self.oracle_price_e6.to_le_bytes());
        out[RET_OFF_RESERVED..RETURN_DATA_SIZE].copy_from_slice(&self.reserved.to_le_bytes());
        out
    }

    pub fn is_valid(&self) -> bool {
        self.flags & FLAG_VALID != 0 && self.flags & FLAG_REJECTED == 0
    }
}

fn le_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// Fail with `TruncatedAccount` unless `data` holds a full context.
pub fn ensure_ctx_len(data: &[u8]) -> Result<(), CodecError> {
    if data.len() < CTX_SIZE {
        return Err(CodecError::TruncatedAccount {
            expected: CTX_SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Read the magic tag at offset 64.
pub fn read_magic(ctx_data: &[u8]) -> Result<u64, CodecError> {
    if ctx_data.len() < MAGIC_OFFSET + 8 {
        return Err(CodecError::TruncatedAccount {
            expected: CTX_SIZE,
            actual: ctx_data.len(),
        });
    }
    Ok(u64::from_le_bytes(le_array(ctx_data, MAGIC_OFFSET)))
}

pub fn verify_magic(ctx_data: &[u8], expected: u64) -> bool {
    ctx_data.len() >= CTX_SIZE && read_magic(ctx_data).map_or(false, |m| m == expected)
}

pub fn read_lp_pda(ctx_data: &[u8]) -> Result<Pubkey, CodecError> {
    ensure_ctx_len(ctx_data)?;
    Ok(Pubkey::new_from_array(le_array(ctx_data, LP_PDA_OFFSET)))
}

/// exec_price = floor(mark * (10_000 + spread_bps) / 10_000).
///
/// Intermediate math is u128; `None` only when the result exceeds u64.
pub fn compute_exec_price(mark_e6: u64, total_spread_bps: u64) -> Option<u64> {
    let spread_mult = BPS_DENOMINATOR.saturating_add(total_spread_bps) as u128;
    let price = (mark_e6 as u128).checked_mul(spread_mult)? / BPS_DENOMINATOR as u128;
    u64::try_from(price).ok()
}

/// Little-endian builder for fixed-layout instruction payloads.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn with_tag(tag: u8, len: usize) -> Self {
        let mut buf = Vec::with_capacity(len);
        buf.push(tag);
        Self { buf }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u128(mut self, v: u128) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn pubkey(mut self, key: &Pubkey) -> Self {
        self.buf.extend_from_slice(key.as_ref());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an instruction payload; the tag is checked on construction.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8], tag: u8, len: usize) -> Result<Self, CodecError> {
        if data.len() < len {
            return Err(CodecError::TruncatedInstruction {
                expected: len,
                actual: data.len(),
            });
        }
        if data[0] != tag {
            return Err(CodecError::UnexpectedTag {
                expected: tag,
                found: data[0],
            });
        }
        Ok(Self { data, pos: 1 })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let out = le_array(self.data, self.pos);
        self.pos += N;
        out
    }

    pub fn u8(&mut self) -> u8 {
        let v = self.data[self.pos];
        self.pos += 1;
        v
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    pub fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    pub fn u128(&mut self) -> u128 {
        u128::from_le_bytes(self.take())
    }

    pub fn pubkey(&mut self) -> Pubkey {
        Pubkey::new_from_array(self.take())
    }
}
