//! Error types for the keeper service

use matcher_common::CodecError;
use ncn_oracle::OracleError;
use ncn_uptime_matcher::UptimeMatcherError;
use solana_program::pubkey::Pubkey;
use thiserror::Error;

/// Failure of a single telemetry fetch.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("{label} failed after {attempts} attempts: {reason}")]
    TransientProvider {
        label: String,
        attempts: u32,
        reason: String,
    },

    #[error("No fallback observation available for NCN {0}")]
    NoFallbackAvailable(Pubkey),

    #[error("Account decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("Account {account} is not a {expected} matcher context")]
    UnexpectedMarketKind {
        account: Pubkey,
        expected: &'static str,
    },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Uptime matcher error: {0}")]
    UptimeMatcher(#[from] UptimeMatcherError),

    #[error("Instruction sink error: {0}")]
    Sink(String),
}
