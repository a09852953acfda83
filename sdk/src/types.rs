use solana_sdk::{
    instruction::InstructionError, pubkey::Pubkey, signature::Signature,
    transaction::TransactionError,
};
use thiserror::Error;

use crate::drift::MarketType;

pub type SdkResult<T> = Result<T, SdkError>;

/// Account data paired with the slot it was observed at
#[derive(Debug, Clone, Default)]
pub struct DataAndSlot<T> {
    pub slot: u64,
    pub data: T,
}

/// User and stats accounts of the party that referred a taker
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReferrerInfo {
    pub referrer: Pubkey,
    pub referrer_stats: Pubkey,
}

/// Signature of a submitted transaction and the slot it was sent at
#[derive(Debug, Clone)]
pub struct TxSigAndSlot {
    pub tx_sig: Signature,
    pub slot: u64,
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("{0}")]
    Rpc(#[from] solana_client::client_error::ClientError),
    #[error("{0}")]
    Ws(#[from] solana_client::nonblocking::pubsub_client::PubsubClientError),
    #[error("error while deserializing")]
    Deserializing,
    #[error("invalid drift account")]
    InvalidAccount,
    #[error("invalid oracle account")]
    InvalidOracle,
    #[error("invalid keypair seed")]
    InvalidSeed,
    #[error("invalid base58 value")]
    InvalidBase58,
    #[error("unknown {0:?} market {1}")]
    UnknownMarket(MarketType, u16),
    #[error("no user for sub account {0}")]
    NoUser(u16),
    #[error("{0}")]
    Signing(#[from] solana_sdk::signer::SignerError),
    #[error("Couldn't send unsubscribe message: {0}")]
    CouldntUnsubscribe(#[from] tokio::sync::mpsc::error::SendError<()>),
    #[error("{0}")]
    Generic(String),
}

impl SdkError {
    /// extract the custom program error code from the SdkError if it exists
    pub fn to_program_error_code(&self) -> Option<u32> {
        if let SdkError::Rpc(inner) = self {
            if let Some(TransactionError::InstructionError(_, InstructionError::Custom(code))) =
                inner.get_transaction_error()
            {
                return Some(code);
            }
        }
        None
    }
}
