use async_trait::async_trait;
use matcher_common::{read_magic, CodecError};
use ncn_uptime_matcher::{UptimeMatcherContext, UPTIME_MATCHER_MAGIC};
use restaking_yield_matcher::{YieldMatcherContext, YIELD_MATCHER_MAGIC};
use solana_program::pubkey::Pubkey;

use crate::error::ProviderError;

/// A decoded matcher context of either market type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherAccount {
    Yield(YieldMatcherContext),
    Uptime(UptimeMatcherContext),
}

impl MatcherAccount {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Yield(_) => "yield",
            Self::Uptime(_) => "uptime",
        }
    }
}

/// Classify raw account bytes by magic and decode them.
pub fn decode_matcher_account(data: &[u8]) -> Result<MatcherAccount, CodecError> {
    match read_magic(data)? {
        YIELD_MATCHER_MAGIC => Ok(MatcherAccount::Yield(YieldMatcherContext::decode(data)?)),
        UPTIME_MATCHER_MAGIC => Ok(MatcherAccount::Uptime(UptimeMatcherContext::decode(data)?)),
        found => Err(CodecError::UnknownMagic { found }),
    }
}

/// Source of raw matcher account data, e.g. an RPC client.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn account_data(&self, key: &Pubkey) -> Result<Vec<u8>, ProviderError>;
}
