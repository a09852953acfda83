use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sdk::{
    drift::{MarketType, Order, OrderType, PositionDirection, User},
    drift_client::{AccountProvider, DriftClient},
    math::auction::{get_auction_price, get_auction_price_for_oracle_offset_auction},
    oracle_map::Oracle,
    slot_subscriber::SlotSubscriber,
};
use solana_sdk::pubkey::Pubkey;

use crate::{
    jit_proxy_client::JitProxyClient,
    types::{ErrorDisposition, JitIxParams, JitResult, PostOnlyParam, PriceType},
};

use super::{FillStrategy, JitParams, OngoingAuctions, ParamsRegistry};

const SNIPER_COOLDOWN: tokio::time::Duration = tokio::time::Duration::from_secs(3);
const SNIPER_MAX_ATTEMPTS: u8 = 3;
const JIT_RETRY_GAP: tokio::time::Duration = tokio::time::Duration::from_millis(50);
const SLOT_POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_millis(50);

/// Where and when an auction crosses the maker's quotes.
///
/// All prices are fixed-point at the chain's price precision; floats are for
/// logs only.
#[derive(Clone, Copy, Debug)]
pub struct AuctionAndOrderDetails {
    pub slots_until_cross: u8,
    pub will_cross: bool,
    pub bid: i64,
    pub ask: i64,
    pub auction_start_price: i64,
    pub auction_end_price: i64,
    pub step_size: i64,
    pub oracle_price: i64,
}

/// Project where the auction price line crosses the maker's quote.
///
/// The maker takes the other side of the taker's order, so a taker buying
/// (Long) crosses the maker's ask, and a taker selling crosses the maker's bid.
/// `slots_until_cross` is left at the auction duration when no slot crosses.
pub fn get_auction_and_order_details(
    order: &Order,
    oracle_price: i64,
    params: &JitParams,
) -> AuctionAndOrderDetails {
    let maker_sells = order.direction == PositionDirection::Long;

    let (auction_start_price, auction_end_price) = if order.order_type == OrderType::Oracle {
        let last_auction_slot = order.slot + order.auction_duration.saturating_sub(1) as u64;
        (
            get_auction_price_for_oracle_offset_auction(order, order.slot, oracle_price),
            get_auction_price_for_oracle_offset_auction(order, last_auction_slot, oracle_price),
        )
    } else {
        (order.auction_start_price, order.auction_end_price)
    };

    let (bid, ask) = match params.price_type {
        PriceType::Oracle => (oracle_price + params.bid, oracle_price + params.ask),
        PriceType::Limit => (params.bid, params.ask),
    };

    let step_size = if order.auction_duration > 1 {
        (auction_end_price - auction_start_price) / (order.auction_duration as i64 - 1)
    } else {
        0
    };

    let mut slots_until_cross: u8 = 0;
    let mut will_cross = false;
    while slots_until_cross < order.auction_duration {
        let auction_price =
            get_auction_price(order, order.slot + slots_until_cross as u64, oracle_price);
        let crossed = if maker_sells {
            auction_price >= ask
        } else {
            auction_price <= bid
        };
        if crossed {
            will_cross = true;
            break;
        }
        slots_until_cross += 1;
    }

    AuctionAndOrderDetails {
        slots_until_cross,
        will_cross,
        bid,
        ask,
        auction_start_price,
        auction_end_price,
        step_size,
        oracle_price,
    }
}

/// Waits for the slot where the auction is predicted to cross the maker's
/// quotes, then fires a short burst of jit attempts. One transaction per
/// auction instead of ten, at the cost of depending on slot feed latency.
pub struct Sniper<T: AccountProvider + Clone> {
    drift_client: DriftClient<T>,
    jit_proxy_client: JitProxyClient<T>,
    slot_subscriber: SlotSubscriber,
    registry: Arc<ParamsRegistry>,
    ongoing_auctions: Arc<OngoingAuctions>,
}

impl<T: AccountProvider + Clone> Sniper<T> {
    pub fn new(
        drift_client: DriftClient<T>,
        jit_proxy_client: JitProxyClient<T>,
        slot_subscriber: SlotSubscriber,
        registry: Arc<ParamsRegistry>,
        ongoing_auctions: Arc<OngoingAuctions>,
    ) -> Self {
        Self {
            drift_client,
            jit_proxy_client,
            slot_subscriber,
            registry,
            ongoing_auctions,
        }
    }

    fn oracle_for(&self, order: &Order) -> Option<Oracle> {
        match order.market_type {
            MarketType::Perp => self
                .drift_client
                .get_oracle_price_data_for_perp_market(order.market_index),
            MarketType::Spot => self
                .drift_client
                .get_oracle_price_data_for_spot_market(order.market_index),
        }
    }

    fn details_for(&self, order: &Order) -> Option<AuctionAndOrderDetails> {
        let params = self
            .registry
            .params_for(order.market_type, order.market_index)?;
        let oracle = self.oracle_for(order)?;
        Some(get_auction_and_order_details(
            order,
            oracle.data.price,
            &params,
        ))
    }

    /// Filling would push the maker's inventory through its configured bounds
    fn breaches_inventory_limits(&self, order: &Order, params: &JitParams) -> bool {
        if order.market_type != MarketType::Perp {
            return false;
        }
        let Some(user) = self.drift_client.get_user(params.sub_account_id) else {
            return false;
        };
        let Some(position) = user.get_perp_position(order.market_index) else {
            return false;
        };

        let base = position.base_asset_amount;
        if base < 0
            && order.direction == PositionDirection::Short
            && base <= params.min_position
        {
            return true;
        }
        if base > 0 && order.direction == PositionDirection::Long && base >= params.max_position {
            return true;
        }
        false
    }

    /// Sleep until the auction crosses at or past `target_slot`, re-deriving
    /// the crossing slot whenever the oracle moves. Returns the observed slot
    /// and the freshest details, or None when the auction expired first.
    async fn wait_for_slot_or_cross_or_expiry(
        &self,
        mut target_slot: u64,
        order: &Order,
        initial_details: AuctionAndOrderDetails,
    ) -> Option<(u64, AuctionAndOrderDetails)> {
        let auction_end_slot = order.slot + order.auction_duration as u64;
        let mut details = initial_details;

        loop {
            let current_slot = self.slot_subscriber.current_slot();
            if current_slot > auction_end_slot {
                return None;
            }

            if let Some(updated) = self.details_for(order) {
                details = updated;
                if details.will_cross {
                    target_slot = order.slot + details.slots_until_cross as u64;
                }
            }

            if details.will_cross && current_slot >= target_slot {
                return Some((current_slot, details));
            }

            tokio::time::sleep(SLOT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl<T: AccountProvider + Clone> FillStrategy for Sniper<T> {
    async fn subscribe(&self) -> JitResult<()> {
        self.slot_subscriber.subscribe().await?;
        Ok(())
    }

    async fn try_fill(
        &self,
        taker: User,
        taker_key: Pubkey,
        taker_stats_key: Pubkey,
        order: Order,
        order_sig: String,
    ) {
        info!("sniper: trying to fill {order_sig}");

        let Some(params) = self
            .registry
            .params_for(order.market_type, order.market_index)
        else {
            debug!("{order_sig}: params removed, abandoning");
            self.ongoing_auctions.release(&order_sig);
            return;
        };

        let taker_stats = match self.drift_client.get_user_stats(&taker.authority).await {
            Ok(taker_stats) => taker_stats,
            Err(e) => {
                error!("could not fetch taker stats of {}: {e}", taker.authority);
                self.ongoing_auctions.release(&order_sig);
                return;
            }
        };
        let referrer_info = self.drift_client.get_referrer_info(&taker_stats);

        let Some(oracle) = self.oracle_for(&order) else {
            warn!(
                "{order_sig}: no oracle price for {} market {}",
                order.market_type, order.market_index
            );
            self.ongoing_auctions.release(&order_sig);
            return;
        };
        let details = get_auction_and_order_details(&order, oracle.data.price, &params);

        if self.breaches_inventory_limits(&order, &params) {
            warn!(
                "{order_sig} would push {} market {} inventory past its limit",
                order.market_type, order.market_index
            );
            self.ongoing_auctions.release(&order_sig);
            return;
        }

        info!(
            "{order_sig}: taker {:?} from slot {}, my market {}@{}, auction {} -> {} (step {}), \
             will cross: {} in {} slots",
            order.direction,
            order.slot,
            details.bid,
            details.ask,
            details.auction_start_price,
            details.auction_end_price,
            details.step_size,
            details.will_cross,
            details.slots_until_cross,
        );

        let target_slot = if details.will_cross {
            order.slot + details.slots_until_cross as u64
        } else {
            // past-expiry sentinel, the wait below can still see the oracle move
            order.slot + order.auction_duration as u64 + 1
        };

        let Some((slot, details)) = self
            .wait_for_slot_or_cross_or_expiry(target_slot, &order, details)
            .await
        else {
            info!("{order_sig}: auction expired without crossing");
            self.ongoing_auctions.release(&order_sig);
            return;
        };

        // params may have moved while waiting
        let Some(params) = self
            .registry
            .params_for(order.market_type, order.market_index)
        else {
            warn!("{order_sig}: params removed while waiting, abandoning");
            self.ongoing_auctions.release(&order_sig);
            return;
        };

        let auction_price = get_auction_price(&order, slot, details.oracle_price);
        info!(
            "{order_sig}: firing at slot {slot} (wanted {target_slot}), auction price \
             {auction_price}, submitting {}@{}",
            details.bid, details.ask,
        );

        for attempt in 0..SNIPER_MAX_ATTEMPTS {
            if params.max_position == 0 && params.min_position == 0 {
                info!("{order_sig}: market disabled by params");
                break;
            }

            let result = self
                .jit_proxy_client
                .jit(&JitIxParams {
                    taker_key,
                    taker_stats_key,
                    taker: taker.clone(),
                    taker_order_id: order.order_id,
                    max_position: params.max_position,
                    min_position: params.min_position,
                    bid: params.bid,
                    ask: params.ask,
                    post_only: Some(PostOnlyParam::TryPostOnly),
                    price_type: params.price_type,
                    referrer_info,
                    sub_account_id: params.sub_account_id,
                })
                .await;

            match result {
                Ok(tx) => {
                    info!("filled {order_sig}: {} at slot {}", tx.tx_sig, tx.slot);
                    tokio::time::sleep(SNIPER_COOLDOWN).await;
                    self.ongoing_auctions.release(&order_sig);
                    return;
                }
                Err(err) => match err.disposition() {
                    ErrorDisposition::Retry => {
                        warn!("attempt {attempt} on {order_sig} did not fill, retrying: {err}");
                    }
                    ErrorDisposition::Terminal => {
                        info!("{order_sig} settled without us: {err}");
                        break;
                    }
                    ErrorDisposition::Fatal => {
                        error!("failed to fill {order_sig}: {err}");
                        tokio::time::sleep(SNIPER_COOLDOWN).await;
                        self.ongoing_auctions.release(&order_sig);
                        return;
                    }
                },
            }

            tokio::time::sleep(JIT_RETRY_GAP).await;
        }

        self.ongoing_auctions.release(&order_sig);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use sdk::{
        drift::{OrderStatus, PerpMarket, UserStats, AMM},
        drift_client_config::ClientOpts,
        oracle_map::Oracle,
        drift::{OraclePriceData, OracleSource},
        types::{DataAndSlot, SdkError, SdkResult},
        user::DriftUser,
        utils::encode_account,
        wallet::Wallet,
    };
    use solana_sdk::{
        account::Account, commitment_config::CommitmentConfig, signature::Keypair,
    };

    use crate::jitter::order_signature;

    use super::*;

    #[derive(Clone, Default)]
    struct MockAccountProvider {
        accounts: Arc<HashMap<Pubkey, Account>>,
    }

    impl MockAccountProvider {
        fn with_user_stats(authority: Pubkey) -> Self {
            let stats = UserStats {
                authority,
                ..Default::default()
            };
            let pubkey = sdk::addresses::pda::get_user_stats_account_pubkey(
                &sdk::constants::drift_program(),
                authority,
            );
            let account = Account {
                lamports: 1,
                data: encode_account(&stats).unwrap(),
                owner: sdk::constants::drift_program(),
                executable: false,
                rent_epoch: 0,
            };
            Self {
                accounts: Arc::new(HashMap::from([(pubkey, account)])),
            }
        }
    }

    #[async_trait]
    impl AccountProvider for MockAccountProvider {
        fn endpoint(&self) -> String {
            "http://localhost:8899".to_string()
        }

        fn commitment_config(&self) -> CommitmentConfig {
            CommitmentConfig::processed()
        }

        async fn get_account(&self, account: Pubkey) -> SdkResult<Account> {
            self.accounts
                .get(&account)
                .cloned()
                .ok_or(SdkError::InvalidAccount)
        }
    }

    fn limit_params(bid: i64, ask: i64) -> JitParams {
        JitParams::new(bid, ask, -10_000, 10_000, PriceType::Limit, None)
    }

    fn auction_order(direction: PositionDirection, start: i64, end: i64) -> Order {
        Order {
            order_id: 9,
            status: OrderStatus::Open,
            order_type: sdk::drift::OrderType::Market,
            market_type: MarketType::Perp,
            market_index: 0,
            direction,
            slot: 100,
            auction_duration: 10,
            auction_start_price: start,
            auction_end_price: end,
            base_asset_amount: 1_000,
            ..Default::default()
        }
    }

    struct Fixture {
        sniper: Sniper<MockAccountProvider>,
        registry: Arc<ParamsRegistry>,
        ongoing_auctions: Arc<OngoingAuctions>,
        slot_subscriber: SlotSubscriber,
        client: DriftClient<MockAccountProvider>,
        oracle_pubkey: Pubkey,
    }

    fn fixture(authority: Pubkey) -> Fixture {
        let mut client = DriftClient::new(
            MockAccountProvider::with_user_stats(authority),
            Wallet::new(Keypair::new()),
            ClientOpts::default(),
        )
        .unwrap();
        let user = DriftUser::new(client.wallet.sub_account(0), 0);
        user.update_data(User::default(), 1);
        client.users.push(user);

        let oracle_pubkey = Pubkey::new_unique();
        let mut market = PerpMarket::default();
        market.pubkey = Pubkey::new_unique();
        market.amm = AMM {
            oracle: oracle_pubkey,
            min_order_size: 1,
            ..AMM::default()
        };
        client.backend.perp_market_map.map.insert(
            0,
            DataAndSlot {
                slot: 1,
                data: market,
            },
        );
        set_oracle_price(&client, oracle_pubkey, 1_000_000);

        let registry = Arc::new(ParamsRegistry::default());
        let ongoing_auctions = Arc::new(OngoingAuctions::default());
        let slot_subscriber = SlotSubscriber::new("ws://localhost:8900");
        let sniper = Sniper::new(
            client.clone(),
            JitProxyClient::new(client.clone(), None),
            slot_subscriber.clone(),
            registry.clone(),
            ongoing_auctions.clone(),
        );

        Fixture {
            sniper,
            registry,
            ongoing_auctions,
            slot_subscriber,
            client,
            oracle_pubkey,
        }
    }

    fn set_oracle_price(
        client: &DriftClient<MockAccountProvider>,
        oracle_pubkey: Pubkey,
        price: i64,
    ) {
        client.backend.oracle_map.map.insert(
            oracle_pubkey,
            Oracle {
                pubkey: oracle_pubkey,
                data: OraclePriceData {
                    price,
                    confidence: 1,
                    delay: 0,
                    has_sufficient_number_of_data_points: true,
                },
                source: OracleSource::Pyth,
                slot: 1,
            },
        );
    }

    #[test]
    fn predicts_the_crossing_slot() {
        let order = auction_order(PositionDirection::Long, 1_005_000, 1_020_000);
        let params = limit_params(900_000, 1_010_000);

        let details = get_auction_and_order_details(&order, 1_000_000, &params);
        assert!(details.will_cross);
        assert_eq!(details.slots_until_cross, 3);
        assert_eq!(details.step_size, (1_020_000 - 1_005_000) / 9);

        // law: the target slot stays inside the auction window
        let target_slot = order.slot + details.slots_until_cross as u64;
        assert!(target_slot >= order.slot);
        assert!(target_slot <= order.slot + order.auction_duration as u64);
    }

    #[test]
    fn never_crossing_auctions_run_the_full_window() {
        let order = auction_order(PositionDirection::Long, 1_005_000, 1_020_000);
        let params = limit_params(900_000, 5_000_000);

        let details = get_auction_and_order_details(&order, 1_000_000, &params);
        assert!(!details.will_cross);
        assert_eq!(details.slots_until_cross, order.auction_duration);
    }

    #[test]
    fn crossing_slot_is_monotone_in_the_maker_quote() {
        // taker sells, the auction sweeps down into the maker's bid
        let order = auction_order(PositionDirection::Short, 1_020_000, 1_005_000);

        // a more aggressive bid can only cross sooner
        let mut last_cross = u8::MAX;
        for bid in [1_005_000, 1_010_000, 1_015_000, 1_020_000] {
            let details =
                get_auction_and_order_details(&order, 1_000_000, &limit_params(bid, 5_000_000));
            assert!(details.will_cross);
            assert!(details.slots_until_cross <= last_cross);
            last_cross = details.slots_until_cross;
        }
        // the best bid crosses immediately, the worst crosses last
        let best = get_auction_and_order_details(&order, 1_000_000, &limit_params(1_020_000, 0));
        assert_eq!(best.slots_until_cross, 0);
        let worst = get_auction_and_order_details(&order, 1_000_000, &limit_params(1_005_000, 0));
        assert_eq!(worst.slots_until_cross, 9);
    }

    #[test]
    fn oracle_moves_change_the_prediction() {
        // oracle offset auction: offsets -2_000 -> 4_000, maker asks 51 flat
        let mut order = auction_order(PositionDirection::Long, -2_000, 4_000);
        order.order_type = OrderType::Oracle;
        let params = limit_params(900_000, 51_000_000);

        let details = get_auction_and_order_details(&order, 50_000_000, &params);
        assert!(!details.will_cross);

        let details = get_auction_and_order_details(&order, 51_000_000, &params);
        assert!(details.will_cross);
        assert_eq!(details.slots_until_cross, 3);
    }

    #[tokio::test]
    async fn wait_returns_none_once_the_auction_expires() {
        let fixture = fixture(Pubkey::new_unique());
        let order = auction_order(PositionDirection::Long, 1_005_000, 1_020_000);
        fixture
            .registry
            .update_perp_params(0, limit_params(900_000, 5_000_000));

        fixture
            .slot_subscriber
            .update_slot(order.slot + order.auction_duration as u64 + 1);

        let details = fixture.sniper.details_for(&order).unwrap();
        let target_slot = order.slot + order.auction_duration as u64 + 1;
        let result = fixture
            .sniper
            .wait_for_slot_or_cross_or_expiry(target_slot, &order, details)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn wait_reacts_to_an_oracle_move() {
        let fixture = fixture(Pubkey::new_unique());
        let order = auction_order(PositionDirection::Long, 1_005_000, 1_020_000);
        fixture.registry.update_perp_params(
            0,
            JitParams::new(-1_000, 1_000, -10_000, 10_000, PriceType::Oracle, None),
        );
        // oracle above the auction: the maker's ask never crosses
        set_oracle_price(&fixture.client, fixture.oracle_pubkey, 1_030_000);
        fixture.slot_subscriber.update_slot(order.slot);

        let details = fixture.sniper.details_for(&order).unwrap();
        assert!(!details.will_cross);
        let target_slot = order.slot + order.auction_duration as u64 + 1;

        let client = fixture.client.clone();
        let oracle_pubkey = fixture.oracle_pubkey;
        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(120)).await;
            // the oracle drops, the whole auction now sits above the maker ask
            set_oracle_price(&client, oracle_pubkey, 1_000_000);
        });

        let result = tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            fixture
                .sniper
                .wait_for_slot_or_cross_or_expiry(target_slot, &order, details),
        )
        .await
        .expect("wait should resolve before the timeout");

        let (slot, details) = result.expect("the moved oracle crosses");
        assert_eq!(slot, order.slot);
        assert!(details.will_cross);
        assert_eq!(details.slots_until_cross, 0);
    }

    #[tokio::test]
    async fn expired_auctions_release_without_submitting() {
        let authority = Pubkey::new_unique();
        let fixture = fixture(authority);
        let order = auction_order(PositionDirection::Long, 1_005_000, 1_020_000);
        fixture
            .registry
            .update_perp_params(0, limit_params(900_000, 5_000_000));
        fixture
            .slot_subscriber
            .update_slot(order.slot + order.auction_duration as u64 + 1);

        let mut taker = User::default();
        taker.authority = authority;
        let order_sig = order_signature("taker", order.order_id);
        assert!(fixture.ongoing_auctions.claim(order_sig.clone()));

        fixture
            .sniper
            .try_fill(
                taker,
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                order,
                order_sig,
            )
            .await;

        assert!(fixture.ongoing_auctions.is_empty());
    }

    #[tokio::test]
    async fn inventory_limits_short_circuit_the_fill() {
        let authority = Pubkey::new_unique();
        let fixture = fixture(authority);

        // the maker is already short to the configured bound
        let mut maker_account = User::default();
        maker_account.perp_positions[0].market_index = 0;
        maker_account.perp_positions[0].base_asset_amount = -10_000;
        fixture.client.users[0].update_data(maker_account, 2);

        let order = auction_order(PositionDirection::Short, 1_020_000, 1_005_000);
        fixture
            .registry
            .update_perp_params(0, limit_params(1_020_000, 5_000_000));

        let mut taker = User::default();
        taker.authority = authority;
        let order_sig = order_signature("taker", order.order_id);
        assert!(fixture.ongoing_auctions.claim(order_sig.clone()));

        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            fixture.sniper.try_fill(
                taker,
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                order,
                order_sig,
            ),
        )
        .await
        .expect("inventory check must fire before the slot wait");

        // released without ever reaching the slot wait
        assert!(fixture.ongoing_auctions.is_empty());
        assert_eq!(fixture.slot_subscriber.current_slot(), 0);
    }
}
