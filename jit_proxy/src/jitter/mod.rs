use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, info, warn};
use sdk::{
    addresses::pda::get_user_stats_account_pubkey,
    auction_subscriber::{AuctionSubscriber, AuctionUpdate},
    constants::drift_program,
    drift::{MarketType, Order, OrderStatus, User},
    drift_client::{AccountProvider, DriftClient},
    event_emitter::Event,
    math::auction::has_auction_price,
    slot_subscriber::SlotSubscriber,
};
use solana_sdk::pubkey::Pubkey;

use crate::{
    jit_proxy_client::JitProxyClient,
    types::{JitResult, PriceType},
};

pub mod shotgun;
pub mod sniper;

pub use shotgun::Shotgun;
pub use sniper::Sniper;

/// Per-market maker parameters, updateable at runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitParams {
    pub bid: i64,
    pub ask: i64,
    pub min_position: i64,
    pub max_position: i64,
    pub price_type: PriceType,
    pub sub_account_id: Option<u16>,
}

impl JitParams {
    pub fn new(
        bid: i64,
        ask: i64,
        min_position: i64,
        max_position: i64,
        price_type: PriceType,
        sub_account_id: Option<u16>,
    ) -> Self {
        Self {
            bid,
            ask,
            min_position,
            max_position,
            price_type,
            sub_account_id,
        }
    }
}

/// Returning true drops the rest of the taker's snapshot
pub type UserFilter = Arc<dyn Fn(&User, &str, &Order) -> bool + Send + Sync>;

/// The stable identifier of one fill attempt
pub fn order_signature(taker_key: &str, order_id: u32) -> String {
    format!("{taker_key}-{order_id}")
}

/// The maker parameters the strategies read on every attempt
#[derive(Default)]
pub struct ParamsRegistry {
    perp_params: DashMap<u16, JitParams>,
    spot_params: DashMap<u16, JitParams>,
}

impl ParamsRegistry {
    pub fn update_perp_params(&self, market_index: u16, params: JitParams) {
        self.perp_params.insert(market_index, params);
    }

    pub fn update_spot_params(&self, market_index: u16, params: JitParams) {
        self.spot_params.insert(market_index, params);
    }

    pub fn params_for(&self, market_type: MarketType, market_index: u16) -> Option<JitParams> {
        match market_type {
            MarketType::Perp => self.perp_params.get(&market_index).map(|params| *params),
            MarketType::Spot => self.spot_params.get(&market_index).map(|params| *params),
        }
    }
}

/// In-flight fill attempts keyed by order signature.
///
/// Holds at most one entry per signature; claiming is atomic so two dispatches
/// can never race the same order into two tasks.
#[derive(Default)]
pub struct OngoingAuctions(DashMap<String, Instant>);

impl OngoingAuctions {
    /// Returns false if the order is already owned by a fill task
    pub fn claim(&self, order_sig: String) -> bool {
        match self.0.entry(order_sig) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                true
            }
        }
    }

    /// Idempotent; every fill task exit path calls this
    pub fn release(&self, order_sig: &str) {
        if let Some((_, claimed_at)) = self.0.remove(order_sig) {
            debug!("released {order_sig} after {:?}", claimed_at.elapsed());
        }
    }

    pub fn contains(&self, order_sig: &str) -> bool {
        self.0.contains_key(order_sig)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fill strategy owns the whole lifecycle of one claimed order: attempt the
/// fill however it sees fit and release the order signature on every exit path.
#[async_trait]
pub trait FillStrategy: Send + Sync {
    async fn try_fill(
        &self,
        taker: User,
        taker_key: Pubkey,
        taker_stats_key: Pubkey,
        order: Order,
        order_sig: String,
    );

    async fn subscribe(&self) -> JitResult<()> {
        Ok(())
    }
}

/// Watches the auction stream and hands fillable orders to the strategy,
/// at most one concurrent attempt per order
#[derive(Clone)]
pub struct Jitter<T: AccountProvider + Clone> {
    drift_client: DriftClient<T>,
    auction_subscriber: AuctionSubscriber,
    registry: Arc<ParamsRegistry>,
    ongoing_auctions: Arc<OngoingAuctions>,
    user_filter: Arc<RwLock<Option<UserFilter>>>,
    strategy: Arc<dyn FillStrategy>,
}

impl<T: AccountProvider + Clone> Jitter<T> {
    pub fn new(
        drift_client: DriftClient<T>,
        auction_subscriber: AuctionSubscriber,
        registry: Arc<ParamsRegistry>,
        ongoing_auctions: Arc<OngoingAuctions>,
        strategy: Arc<dyn FillStrategy>,
    ) -> Self {
        Self {
            drift_client,
            auction_subscriber,
            registry,
            ongoing_auctions,
            user_filter: Arc::new(RwLock::new(None)),
            strategy,
        }
    }

    /// A jitter that fires across the whole auction window
    pub fn new_with_shotgun(
        drift_client: DriftClient<T>,
        jit_proxy_client: JitProxyClient<T>,
        auction_subscriber: AuctionSubscriber,
    ) -> Self {
        let registry = Arc::new(ParamsRegistry::default());
        let ongoing_auctions = Arc::new(OngoingAuctions::default());
        let strategy = Arc::new(Shotgun::new(
            drift_client.clone(),
            jit_proxy_client,
            registry.clone(),
            ongoing_auctions.clone(),
        ));
        Self::new(
            drift_client,
            auction_subscriber,
            registry,
            ongoing_auctions,
            strategy,
        )
    }

    /// A jitter that waits for the predicted crossing slot before firing
    pub fn new_with_sniper(
        drift_client: DriftClient<T>,
        jit_proxy_client: JitProxyClient<T>,
        auction_subscriber: AuctionSubscriber,
        slot_subscriber: SlotSubscriber,
    ) -> Self {
        let registry = Arc::new(ParamsRegistry::default());
        let ongoing_auctions = Arc::new(OngoingAuctions::default());
        let strategy = Arc::new(Sniper::new(
            drift_client.clone(),
            jit_proxy_client,
            slot_subscriber,
            registry.clone(),
            ongoing_auctions.clone(),
        ));
        Self::new(
            drift_client,
            auction_subscriber,
            registry,
            ongoing_auctions,
            strategy,
        )
    }

    pub fn update_perp_params(&self, market_index: u16, params: JitParams) {
        self.registry.update_perp_params(market_index, params);
    }

    pub fn update_spot_params(&self, market_index: u16, params: JitParams) {
        self.registry.update_spot_params(market_index, params);
    }

    pub fn set_user_filter(&self, user_filter: Option<UserFilter>) {
        let mut filter = self.user_filter.write().expect("user filter");
        *filter = user_filter;
    }

    pub fn ongoing_auctions(&self) -> &OngoingAuctions {
        &self.ongoing_auctions
    }

    /// Subscribe the drift client, the strategy and the auction stream, then
    /// dispatch every incoming snapshot
    pub async fn subscribe(&self) -> JitResult<()> {
        self.drift_client.subscribe().await?;
        self.strategy.subscribe().await?;
        self.auction_subscriber.subscribe().await?;

        let jitter = self.clone();
        self.auction_subscriber.event_emitter.subscribe(
            AuctionSubscriber::SUBSCRIPTION_ID,
            move |event| {
                if let Some(update) = event.as_any().downcast_ref::<AuctionUpdate>() {
                    let jitter = jitter.clone();
                    let update = update.clone();
                    tokio::spawn(async move {
                        jitter
                            .on_account_update(update.user, update.pubkey, update.slot)
                            .await;
                    });
                }
            },
        );

        Ok(())
    }

    /// Filter the taker snapshot down to fillable orders and hand each one to
    /// the strategy, claiming its signature first
    pub async fn on_account_update(&self, taker: User, taker_key: Pubkey, slot: u64) {
        let taker_key_str = taker_key.to_string();
        let taker_stats_key = get_user_stats_account_pubkey(&drift_program(), taker.authority);

        debug!("auction received from {taker_key} at slot {slot}");

        for order in taker.orders.iter() {
            if order.status != OrderStatus::Open {
                continue;
            }

            if !has_auction_price(order, slot) {
                continue;
            }

            {
                let user_filter = self.user_filter.read().expect("user filter");
                if let Some(filter) = user_filter.as_ref() {
                    if filter(&taker, &taker_key_str, order) {
                        info!("taker {taker_key} filtered out");
                        return;
                    }
                }
            }

            let order_sig = order_signature(&taker_key_str, order.order_id);
            if self.ongoing_auctions.contains(&order_sig) {
                continue;
            }

            if self
                .registry
                .params_for(order.market_type, order.market_index)
                .is_none()
            {
                debug!(
                    "not listening to {} market {}",
                    order.market_type, order.market_index
                );
                return;
            }

            let min_order_size = match order.market_type {
                MarketType::Perp => self
                    .drift_client
                    .get_perp_market_account(order.market_index)
                    .map(|market| market.amm.min_order_size),
                MarketType::Spot => self
                    .drift_client
                    .get_spot_market_account(order.market_index)
                    .map(|market| market.min_order_size),
            };
            let Some(min_order_size) = min_order_size else {
                warn!(
                    "no {} market account for {}",
                    order.market_type, order.market_index
                );
                return;
            };
            if order.base_asset_amount - order.base_asset_amount_filled <= min_order_size {
                debug!("order {order_sig} filled within min_order_size");
                return;
            }

            self.log_details(order);

            if !self.ongoing_auctions.claim(order_sig.clone()) {
                continue;
            }

            let strategy = self.strategy.clone();
            let taker = taker.clone();
            let order = *order;
            tokio::spawn(async move {
                strategy
                    .try_fill(taker, taker_key, taker_stats_key, order, order_sig)
                    .await;
            });
        }
    }

    fn log_details(&self, order: &Order) {
        info!(
            "order {}: {} market {}, {:?} {:?}, auction {} -> {} over {} slots, {} of {} filled",
            order.order_id,
            order.market_type,
            order.market_index,
            order.order_type,
            order.direction,
            order.auction_start_price,
            order.auction_end_price,
            order.auction_duration,
            order.base_asset_amount_filled,
            order.base_asset_amount,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sdk::{
        drift::{OrderType, SpotMarket, AMM},
        drift_client_config::ClientOpts,
        types::{DataAndSlot, SdkError, SdkResult},
        wallet::Wallet,
    };
    use solana_sdk::{
        account::Account, commitment_config::CommitmentConfig, signature::Keypair,
    };

    use super::*;

    #[derive(Clone)]
    struct NullAccountProvider;

    #[async_trait]
    impl AccountProvider for NullAccountProvider {
        fn endpoint(&self) -> String {
            "http://localhost:8899".to_string()
        }

        fn commitment_config(&self) -> CommitmentConfig {
            CommitmentConfig::processed()
        }

        async fn get_account(&self, _account: Pubkey) -> SdkResult<Account> {
            Err(SdkError::InvalidAccount)
        }
    }

    struct CountingStrategy {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FillStrategy for CountingStrategy {
        async fn try_fill(
            &self,
            _taker: User,
            _taker_key: Pubkey,
            _taker_stats_key: Pubkey,
            _order: Order,
            _order_sig: String,
        ) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // deliberately never releases, the dispatcher must not double-claim
        }
    }

    fn test_jitter() -> (Jitter<NullAccountProvider>, Arc<CountingStrategy>) {
        let client = DriftClient::new(
            NullAccountProvider,
            Wallet::new(Keypair::new()),
            ClientOpts::default(),
        )
        .unwrap();

        // perp market 0 with a tiny minimum order size
        let mut perp = sdk::drift::PerpMarket::default();
        perp.pubkey = Pubkey::new_unique();
        perp.amm = AMM {
            oracle: Pubkey::new_unique(),
            min_order_size: 10,
            ..AMM::default()
        };
        client
            .backend
            .perp_market_map
            .map
            .insert(0, DataAndSlot { slot: 1, data: perp });
        let mut spot = SpotMarket::default();
        spot.pubkey = Pubkey::new_unique();
        spot.oracle = Pubkey::new_unique();
        client
            .backend
            .spot_market_map
            .map
            .insert(0, DataAndSlot { slot: 1, data: spot });

        let strategy = Arc::new(CountingStrategy {
            calls: AtomicUsize::new(0),
        });
        let auction_subscriber =
            AuctionSubscriber::new("ws://localhost:8900", CommitmentConfig::processed());
        let jitter = Jitter::new(
            client,
            auction_subscriber,
            Arc::new(ParamsRegistry::default()),
            Arc::new(OngoingAuctions::default()),
            strategy.clone(),
        );
        (jitter, strategy)
    }

    fn params() -> JitParams {
        JitParams::new(1_000_000, 1_010_000, 1, 2, PriceType::Oracle, None)
    }

    fn taker_snapshot() -> (User, Pubkey) {
        let order = Order {
            order_id: 1,
            status: OrderStatus::Open,
            order_type: OrderType::Market,
            market_type: MarketType::Perp,
            market_index: 0,
            slot: 100,
            auction_duration: 10,
            auction_start_price: 1_005_000,
            auction_end_price: 1_020_000,
            base_asset_amount: 1_000,
            ..Default::default()
        };
        let mut taker = User::default();
        taker.authority = Pubkey::new_unique();
        taker.orders[0] = order;
        (taker, Pubkey::new_unique())
    }

    async fn settle() {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn duplicate_snapshots_spawn_one_fill_task() {
        let (jitter, strategy) = test_jitter();
        jitter.update_perp_params(0, params());
        let (taker, taker_key) = taker_snapshot();

        jitter.on_account_update(taker.clone(), taker_key, 100).await;
        jitter.on_account_update(taker, taker_key, 101).await;
        settle().await;

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(jitter.ongoing_auctions().len(), 1);
    }

    #[tokio::test]
    async fn closed_or_expired_orders_are_skipped() {
        let (jitter, strategy) = test_jitter();
        jitter.update_perp_params(0, params());
        let (mut taker, taker_key) = taker_snapshot();

        taker.orders[0].status = OrderStatus::Canceled;
        jitter.on_account_update(taker.clone(), taker_key, 100).await;

        // open again, but past the auction window
        taker.orders[0].status = OrderStatus::Open;
        jitter.on_account_update(taker, taker_key, 200).await;
        settle().await;

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
        assert!(jitter.ongoing_auctions().is_empty());
    }

    #[tokio::test]
    async fn unlisted_markets_stop_the_snapshot() {
        let (jitter, strategy) = test_jitter();
        // params for market 0 exist, but the snapshot leads with market 7
        jitter.update_perp_params(0, params());
        let (mut taker, taker_key) = taker_snapshot();
        taker.orders[1] = taker.orders[0];
        taker.orders[0].market_index = 7;
        taker.orders[1].order_id = 2;

        jitter.on_account_update(taker, taker_key, 100).await;
        settle().await;

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
        assert!(jitter.ongoing_auctions().is_empty());
    }

    #[tokio::test]
    async fn dust_remainders_are_not_dispatched() {
        let (jitter, strategy) = test_jitter();
        jitter.update_perp_params(0, params());
        let (mut taker, taker_key) = taker_snapshot();
        taker.orders[0].base_asset_amount = 100;
        taker.orders[0].base_asset_amount_filled = 95;

        jitter.on_account_update(taker, taker_key, 100).await;
        settle().await;

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
        assert!(jitter.ongoing_auctions().is_empty());
    }

    #[tokio::test]
    async fn user_filter_drops_the_whole_snapshot() {
        let (jitter, strategy) = test_jitter();
        jitter.update_perp_params(0, params());
        jitter.set_user_filter(Some(Arc::new(|_user, _key, _order| true)));

        let (mut taker, taker_key) = taker_snapshot();
        taker.orders[1] = taker.orders[0];
        taker.orders[1].order_id = 2;

        jitter.on_account_update(taker, taker_key, 100).await;
        settle().await;

        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
        assert!(jitter.ongoing_auctions().is_empty());
    }

    #[test]
    fn claims_are_exclusive_and_release_is_idempotent() {
        let ongoing = OngoingAuctions::default();
        let sig = order_signature("taker", 1);

        assert!(ongoing.claim(sig.clone()));
        assert!(!ongoing.claim(sig.clone()));
        assert!(ongoing.contains(&sig));

        ongoing.release(&sig);
        ongoing.release(&sig);
        assert!(ongoing.is_empty());
        assert!(ongoing.claim(sig));
    }
}
