use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Mirrors the matcher program's custom error codes so failures seen on-chain
/// and failures caught client-side compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum YieldMatcherError {
    #[error("yield mark price not set, oracle sync required")]
    OracleNotSynced = 0x30,
    #[error("oracle data is stale")]
    OracleStale = 0x31,
    #[error("oracle account does not match the context")]
    OracleAccountMismatch = 0x32,
    #[error("invalid yield regime (must be 0-4)")]
    InvalidRegime = 0x33,
    #[error("arithmetic overflow")]
    ArithmeticOverflow = 0x34,
}

impl YieldMatcherError {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl From<YieldMatcherError> for ProgramError {
    fn from(e: YieldMatcherError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_error_codes() {
        assert_eq!(ProgramError::from(YieldMatcherError::OracleNotSynced), ProgramError::Custom(0x30));
        assert_eq!(ProgramError::from(YieldMatcherError::ArithmeticOverflow), ProgramError::Custom(0x34));
        assert_eq!(YieldMatcherError::InvalidRegime.code(), 0x33);
    }
}
