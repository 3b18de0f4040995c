use solana_program::program_error::ProgramError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UptimeMatcherError {
    #[error("market is resolved -- no more trading")]
    MarketResolved = 0x300,
    #[error("invalid probability (must be 0-1_000_000)")]
    InvalidProbability = 0x301,
    #[error("uptime probability not set")]
    ProbabilityNotSet = 0x302,
    #[error("oracle data is stale")]
    OracleStale = 0x303,
    #[error("oracle account does not match the context")]
    OracleMismatch = 0x304,
    #[error("invalid outcome (must be 0=SLASHED or 1=SAFE)")]
    InvalidOutcome = 0x305,
    #[error("invalid signal severity (must be 0-3)")]
    InvalidSignalSeverity = 0x306,
    #[error("arithmetic overflow")]
    ArithmeticOverflow = 0x307,
}

impl UptimeMatcherError {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl From<UptimeMatcherError> for ProgramError {
    fn from(e: UptimeMatcherError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_error_codes() {
        assert_eq!(ProgramError::from(UptimeMatcherError::MarketResolved), ProgramError::Custom(0x300));
        assert_eq!(UptimeMatcherError::InvalidSignalSeverity.code(), 0x306);
    }
}
