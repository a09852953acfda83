use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, Eq, PartialEq)]
pub struct User {
    /// The owner/authority of the account
    pub authority: Pubkey,
    /// An address that can control the account on the authority's behalf. Has limited power, cant withdraw
    pub delegate: Pubkey,
    /// Encoded display name e.g. "toly"
    pub name: [u8; 32],
    pub spot_positions: [SpotPosition; 8],
    pub perp_positions: [PerpPosition; 8],
    pub orders: [Order; 32],
    pub last_add_perp_lp_shares_ts: i64,
    /// precision: QUOTE_PRECISION
    pub total_deposits: u64,
    /// precision: QUOTE_PRECISION
    pub total_withdraws: u64,
    /// precision: QUOTE_PRECISION
    pub total_social_loss: u64,
    /// precision: QUOTE_PRECISION
    pub settled_perp_pnl: i64,
    /// precision: QUOTE_PRECISION
    pub cumulative_spot_fees: i64,
    /// precision: QUOTE_PRECISION
    pub cumulative_perp_funding: i64,
    /// precision: QUOTE_PRECISION
    pub liquidation_margin_freed: u64,
    /// The last slot a user was active. Used to determine if a user is idle
    pub last_active_slot: u64,
    /// Every user order has an order id. This is the next order id to be used
    pub next_order_id: u32,
    /// Custom max initial margin ratio for the user
    pub max_margin_ratio: u32,
    pub next_liquidation_id: u16,
    /// The sub account id for this user
    pub sub_account_id: u16,
    /// Whether the user is active, being liquidated or bankrupt
    pub status: u8,
    pub is_margin_trading_enabled: bool,
    /// User is idle if they haven't interacted with the protocol in 1 week and have no orders, perp positions or borrows
    pub idle: bool,
    /// number of open orders
    pub open_orders: u8,
    pub has_open_order: bool,
    /// number of open orders with auction
    pub open_auctions: u8,
    pub has_open_auction: bool,
    pub padding: [u8; 21],
}

impl User {
    pub fn get_perp_position(&self, market_index: u16) -> Option<&PerpPosition> {
        self.perp_positions
            .iter()
            .find(|p| p.market_index == market_index && !p.is_available())
    }
}

#[derive(BorshSerialize, BorshDeserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpotPosition {
    /// The scaled balance of the position. To get the token amount, multiply by the cumulative deposit/borrow
    /// interest of the corresponding market.
    /// precision: SPOT_BALANCE_PRECISION
    pub scaled_balance: u64,
    /// precision: token mint precision
    pub open_bids: i64,
    /// precision: token mint precision
    pub open_asks: i64,
    /// precision: token mint precision
    pub cumulative_deposits: i64,
    pub market_index: u16,
    /// Whether the position is deposit or borrow
    pub balance_type: SpotBalanceType,
    pub open_orders: u8,
    pub padding: [u8; 4],
}

impl SpotPosition {
    pub fn is_available(&self) -> bool {
        self.scaled_balance == 0 && self.open_orders == 0
    }
}

#[derive(BorshSerialize, BorshDeserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PerpPosition {
    /// The perp market's last cumulative funding rate. Used to calculate the funding payment owed to user
    /// precision: FUNDING_RATE_PRECISION
    pub last_cumulative_funding_rate: i64,
    /// The size of the user's perp position
    /// precision: BASE_PRECISION
    pub base_asset_amount: i64,
    /// precision: QUOTE_PRECISION
    pub quote_asset_amount: i64,
    /// precision: QUOTE_PRECISION
    pub quote_break_even_amount: i64,
    /// precision: QUOTE_PRECISION
    pub quote_entry_amount: i64,
    /// precision: BASE_PRECISION
    pub open_bids: i64,
    /// precision: BASE_PRECISION
    pub open_asks: i64,
    /// precision: QUOTE_PRECISION
    pub settled_pnl: i64,
    /// precision: BASE_PRECISION
    pub lp_shares: u64,
    /// precision: BASE_PRECISION
    pub last_base_asset_amount_per_lp: i64,
    /// precision: QUOTE_PRECISION
    pub last_quote_asset_amount_per_lp: i64,
    /// Remainder of an lp settle smaller than the market step size
    /// precision: BASE_PRECISION
    pub remainder_base_asset_amount: i32,
    pub market_index: u16,
    pub open_orders: u8,
    pub per_lp_base: i8,
}

impl PerpPosition {
    pub fn is_available(&self) -> bool {
        self.base_asset_amount == 0
            && self.quote_asset_amount == 0
            && self.open_orders == 0
            && self.lp_shares == 0
    }
}

#[derive(BorshSerialize, BorshDeserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Order {
    /// The slot the order was placed
    pub slot: u64,
    /// The limit price for the order (can be 0 for market orders)
    /// For orders with an auction, this price isn't used until the auction is complete
    /// precision: PRICE_PRECISION
    pub price: u64,
    /// precision for perps: BASE_PRECISION, for spot: token mint precision
    pub base_asset_amount: u64,
    /// The amount of the order already filled, same precision as `base_asset_amount`
    pub base_asset_amount_filled: u64,
    /// precision: QUOTE_PRECISION
    pub quote_asset_amount_filled: u64,
    /// At what price the order will be triggered. Only relevant for trigger orders
    /// precision: PRICE_PRECISION
    pub trigger_price: u64,
    /// The start price for the auction. An oracle offset for oracle orders
    /// precision: PRICE_PRECISION
    pub auction_start_price: i64,
    /// The end price for the auction. An oracle offset for oracle orders
    /// precision: PRICE_PRECISION
    pub auction_end_price: i64,
    /// The time when the order will expire
    pub max_ts: i64,
    /// If set, the order limit price is the oracle price + this offset
    /// precision: PRICE_PRECISION
    pub oracle_price_offset: i32,
    /// The id for the order. Each user has their own order id space
    pub order_id: u32,
    pub market_index: u16,
    /// Whether the order is open or unused
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub market_type: MarketType,
    /// User generated order id. Can make it easier to place/cancel orders
    pub user_order_id: u8,
    /// What the user's position was when the order was placed
    pub existing_position_direction: PositionDirection,
    /// Whether the user is going long or short. LONG = bid, SHORT = ask
    pub direction: PositionDirection,
    pub reduce_only: bool,
    /// Whether the order must be a maker
    pub post_only: bool,
    /// Whether the order must be canceled the same slot it is placed
    pub immediate_or_cancel: bool,
    pub trigger_condition: OrderTriggerCondition,
    /// How many slots the auction lasts
    pub auction_duration: u8,
    pub padding: [u8; 3],
}

#[derive(
    BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum OrderStatus {
    /// The order is not in use
    #[default]
    Init,
    /// Order is open
    Open,
    /// Order has been filled
    Filled,
    /// Order has been canceled
    Canceled,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderType {
    Market,
    #[default]
    Limit,
    TriggerMarket,
    TriggerLimit,
    /// Market order where the auction prices are oracle offsets
    Oracle,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderTriggerCondition {
    #[default]
    Above,
    Below,
    TriggeredAbove,
    TriggeredBelow,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MarketType {
    #[default]
    Spot,
    Perp,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Spot => write!(f, "Spot"),
            MarketType::Perp => write!(f, "Perp"),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PositionDirection {
    #[default]
    Long,
    Short,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpotBalanceType {
    #[default]
    Deposit,
    Borrow,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct UserStats {
    /// The authority for all of a user's sub accounts
    pub authority: Pubkey,
    /// The address that referred this user
    pub referrer: Pubkey,
    /// Stats on the fees paid by the user
    pub fees: UserFees,
    /// The timestamp of the next epoch. Epochs are used to limit referrer rewards within a period
    pub next_epoch_ts: i64,
    /// precision: QUOTE_PRECISION
    pub maker_volume_30d: u64,
    /// precision: QUOTE_PRECISION
    pub taker_volume_30d: u64,
    /// precision: QUOTE_PRECISION
    pub filler_volume_30d: u64,
    pub last_maker_volume_30d_ts: i64,
    pub last_taker_volume_30d_ts: i64,
    pub last_filler_volume_30d_ts: i64,
    /// The amount of tokens staked in the quote spot market's insurance fund
    pub if_staked_quote_asset_amount: u64,
    pub number_of_sub_accounts: u16,
    pub number_of_sub_accounts_created: u16,
    /// Whether the user is a referrer. Sub account 0 can not be deleted if the user is a referrer
    pub is_referrer: bool,
    pub disable_update_perp_bid_ask_twap: bool,
    pub padding: [u8; 50],
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            authority: Pubkey::default(),
            referrer: Pubkey::default(),
            fees: UserFees::default(),
            next_epoch_ts: 0,
            maker_volume_30d: 0,
            taker_volume_30d: 0,
            filler_volume_30d: 0,
            last_maker_volume_30d_ts: 0,
            last_taker_volume_30d_ts: 0,
            last_filler_volume_30d_ts: 0,
            if_staked_quote_asset_amount: 0,
            number_of_sub_accounts: 0,
            number_of_sub_accounts_created: 0,
            is_referrer: false,
            disable_update_perp_bid_ask_twap: false,
            padding: [0; 50],
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct UserFees {
    /// precision: QUOTE_PRECISION
    pub total_fee_paid: u64,
    /// precision: QUOTE_PRECISION
    pub total_fee_rebate: u64,
    /// precision: QUOTE_PRECISION
    pub total_token_discount: u64,
    /// precision: QUOTE_PRECISION
    pub total_referee_discount: u64,
    /// precision: QUOTE_PRECISION
    pub total_referrer_reward: u64,
    /// precision: QUOTE_PRECISION
    pub current_epoch_referrer_reward: u64,
}

#[cfg(test)]
mod tests {
    use borsh::BorshSerialize;

    use super::*;

    #[test]
    fn layouts_match_the_on_chain_sizes() {
        assert_eq!(Order::default().try_to_vec().unwrap().len(), 96);
        assert_eq!(SpotPosition::default().try_to_vec().unwrap().len(), 40);
        assert_eq!(PerpPosition::default().try_to_vec().unwrap().len(), 96);
        assert_eq!(User::default().try_to_vec().unwrap().len(), 4368);
        assert_eq!(UserStats::default().try_to_vec().unwrap().len(), 232);
    }

    #[test]
    fn enum_discriminants_match_the_idl() {
        assert_eq!(MarketType::Spot.try_to_vec().unwrap(), vec![0]);
        assert_eq!(MarketType::Perp.try_to_vec().unwrap(), vec![1]);
        assert_eq!(PositionDirection::Long.try_to_vec().unwrap(), vec![0]);
        assert_eq!(PositionDirection::Short.try_to_vec().unwrap(), vec![1]);
        assert_eq!(OrderStatus::Open.try_to_vec().unwrap(), vec![1]);
        assert_eq!(OrderType::Oracle.try_to_vec().unwrap(), vec![4]);
    }
}
