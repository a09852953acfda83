use borsh::{BorshDeserialize, BorshSerialize};
use sdk::{
    drift::{self, User},
    types::{ReferrerInfo, SdkError},
};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type JitResult<T> = Result<T, JitError>;

#[derive(Debug, Error)]
pub enum JitError {
    #[error("{0}")]
    Sdk(#[from] SdkError),
    #[error("taker order {0} not found")]
    OrderNotFound(u32),
    #[error("{0}")]
    Generic(String),
}

/// How the maker order interacts with resting liquidity, transported verbatim
/// to the on-chain program
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostOnlyParam {
    #[default]
    None,
    MustPostOnly,
    TryPostOnly,
    Slide,
}

/// Whether maker bid/ask are absolute prices or offsets against the oracle
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriceType {
    #[default]
    Limit,
    Oracle,
}

/// The proxy program's market kind discriminants. Note these are the reverse
/// of the drift program's own `MarketType` encoding.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketType {
    Perp,
    Spot,
}

impl From<drift::MarketType> for MarketType {
    fn from(market_type: drift::MarketType) -> Self {
        match market_type {
            drift::MarketType::Perp => MarketType::Perp,
            drift::MarketType::Spot => MarketType::Spot,
        }
    }
}

/// Payload of the pre-flight constraint check instruction
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderConstraint {
    pub max_position: i64,
    pub min_position: i64,
    pub market_index: u16,
    pub market_type: MarketType,
}

/// Everything needed to build one jit instruction
#[derive(Clone, Debug)]
pub struct JitIxParams {
    pub taker_key: Pubkey,
    pub taker_stats_key: Pubkey,
    pub taker: User,
    pub taker_order_id: u32,
    pub max_position: i64,
    pub min_position: i64,
    pub bid: i64,
    pub ask: i64,
    pub post_only: Option<PostOnlyParam>,
    pub price_type: PriceType,
    pub referrer_info: Option<ReferrerInfo>,
    pub sub_account_id: Option<u16>,
}

/// A maker whose resting orders an arb instruction matches against
#[derive(Clone, Debug)]
pub struct MakerInfo {
    pub maker: Pubkey,
    pub maker_stats: Pubkey,
    pub maker_user_account: User,
}

#[derive(Clone, Debug)]
pub struct ArbIxParams {
    pub maker_infos: Vec<MakerInfo>,
    pub market_index: u16,
    pub referrer_info: Option<ReferrerInfo>,
}

/// Custom error codes of the on-chain proxy program
pub mod error_code {
    pub const BID_NOT_CROSSED: u32 = 6000;
    pub const ASK_NOT_CROSSED: u32 = 6001;
    pub const TAKER_ORDER_NOT_FOUND: u32 = 6002;
    pub const ORDER_SIZE_BREACHED: u32 = 6003;
    pub const NO_BEST_BID: u32 = 6004;
    pub const NO_BEST_ASK: u32 = 6005;
    pub const NO_ARB_OPPORTUNITY: u32 = 6006;
    pub const UNPROFITABLE_ARB: u32 = 6007;
    pub const POSITION_LIMIT_BREACHED: u32 = 6008;

    // drift errors surfaced through the proxy's inner call
    pub const ORDER_COULD_NOT_FILL: u32 = 6009;
    pub const ORACLE_INVALID: u32 = 6035;
}

/// What a strategy should do with a failed fill attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Transient, worth retrying within the auction window
    Retry,
    /// The auction is settled for this order, stop cleanly
    Terminal,
    /// Infrastructure failure, cool down and abandon the order
    Fatal,
}

pub fn disposition_for_code(code: Option<u32>) -> ErrorDisposition {
    use error_code::*;

    match code {
        Some(
            BID_NOT_CROSSED | ASK_NOT_CROSSED | NO_BEST_BID | NO_BEST_ASK | ORDER_COULD_NOT_FILL
            | ORACLE_INVALID,
        ) => ErrorDisposition::Retry,
        Some(
            TAKER_ORDER_NOT_FOUND | ORDER_SIZE_BREACHED | NO_ARB_OPPORTUNITY | UNPROFITABLE_ARB
            | POSITION_LIMIT_BREACHED,
        ) => ErrorDisposition::Terminal,
        _ => ErrorDisposition::Fatal,
    }
}

impl JitError {
    /// Classify by the structured program error code rather than any message text
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            JitError::Sdk(err) => disposition_for_code(err.to_program_error_code()),
            JitError::OrderNotFound(_) => ErrorDisposition::Terminal,
            JitError::Generic(_) => ErrorDisposition::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use borsh::BorshSerialize;

    use super::*;

    #[test]
    fn enum_discriminants_match_the_idl() {
        assert_eq!(PostOnlyParam::None.try_to_vec().unwrap(), vec![0]);
        assert_eq!(PostOnlyParam::MustPostOnly.try_to_vec().unwrap(), vec![1]);
        assert_eq!(PostOnlyParam::TryPostOnly.try_to_vec().unwrap(), vec![2]);
        assert_eq!(PostOnlyParam::Slide.try_to_vec().unwrap(), vec![3]);

        assert_eq!(PriceType::Limit.try_to_vec().unwrap(), vec![0]);
        assert_eq!(PriceType::Oracle.try_to_vec().unwrap(), vec![1]);

        // the proxy program's market type encoding is perp-first
        assert_eq!(MarketType::Perp.try_to_vec().unwrap(), vec![0]);
        assert_eq!(MarketType::Spot.try_to_vec().unwrap(), vec![1]);
        assert_eq!(
            MarketType::from(sdk::drift::MarketType::Perp),
            MarketType::Perp
        );
    }

    #[test]
    fn order_constraint_wire_layout() {
        let constraint = OrderConstraint {
            max_position: 2,
            min_position: -3,
            market_index: 7,
            market_type: MarketType::Spot,
        };
        let mut expected = Vec::new();
        expected.extend_from_slice(&2_i64.to_le_bytes());
        expected.extend_from_slice(&(-3_i64).to_le_bytes());
        expected.extend_from_slice(&7_u16.to_le_bytes());
        expected.push(1);
        assert_eq!(constraint.try_to_vec().unwrap(), expected);

        let decoded = OrderConstraint::try_from_slice(&expected).unwrap();
        assert_eq!(decoded, constraint);
    }

    #[test]
    fn error_codes_classify_per_the_retry_policy() {
        use error_code::*;

        // 0x1770 / 0x1771: not crossing yet
        assert_eq!(
            disposition_for_code(Some(BID_NOT_CROSSED)),
            ErrorDisposition::Retry
        );
        assert_eq!(
            disposition_for_code(Some(ASK_NOT_CROSSED)),
            ErrorDisposition::Retry
        );
        // 0x1779 / 0x1793: transient fill/oracle conditions
        assert_eq!(
            disposition_for_code(Some(ORDER_COULD_NOT_FILL)),
            ErrorDisposition::Retry
        );
        assert_eq!(
            disposition_for_code(Some(ORACLE_INVALID)),
            ErrorDisposition::Retry
        );
        // 0x1772: the order is gone, never retry
        assert_eq!(
            disposition_for_code(Some(TAKER_ORDER_NOT_FOUND)),
            ErrorDisposition::Terminal
        );
        assert_eq!(
            disposition_for_code(Some(POSITION_LIMIT_BREACHED)),
            ErrorDisposition::Terminal
        );
        // anything else is infrastructure trouble
        assert_eq!(disposition_for_code(Some(1)), ErrorDisposition::Fatal);
        assert_eq!(disposition_for_code(None), ErrorDisposition::Fatal);

        assert_eq!(
            JitError::OrderNotFound(1).disposition(),
            ErrorDisposition::Terminal
        );
        assert_eq!(
            JitError::Generic("boom".to_string()).disposition(),
            ErrorDisposition::Fatal
        );
    }

    #[test]
    fn hex_codes_match_the_program_errors() {
        assert_eq!(error_code::BID_NOT_CROSSED, 0x1770);
        assert_eq!(error_code::ASK_NOT_CROSSED, 0x1771);
        assert_eq!(error_code::TAKER_ORDER_NOT_FOUND, 0x1772);
        assert_eq!(error_code::ORDER_COULD_NOT_FILL, 0x1779);
        assert_eq!(error_code::ORACLE_INVALID, 0x1793);
    }
}
