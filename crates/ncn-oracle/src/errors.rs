use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("invalid uptime probability {0} (must be 0-1_000_000)")]
    InvalidUptimeProbability(u64),

    #[error("invalid detector config: {0}")]
    InvalidConfig(String),

    #[error("aggregated feed already tracks the maximum of {0} NCNs")]
    MaxNcnFeedsReached(usize),
}
