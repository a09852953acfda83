use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::{
    addresses::pda::{get_user_account_pubkey, get_user_stats_account_pubkey},
    constants::{drift_program, state_account, QUOTE_SPOT_MARKET_INDEX},
    drift::{
        decode_account, DriftAccount, MarketType, OracleSource, PerpMarket, SpotMarket, User,
        UserStats,
    },
    drift_client_config::ClientOpts,
    market_map::MarketMap,
    oracle_map::{Oracle, OracleMap},
    types::{DataAndSlot, ReferrerInfo, SdkError, SdkResult, TxSigAndSlot},
    user::DriftUser,
    utils::get_ws_url,
    wallet::Wallet,
};

/// Source of raw account data
#[async_trait]
pub trait AccountProvider: Send + Sync + 'static {
    fn endpoint(&self) -> String;

    fn commitment_config(&self) -> CommitmentConfig;

    async fn get_account(&self, account: Pubkey) -> SdkResult<Account>;
}

/// `AccountProvider` that always fetches from the RPC node
#[derive(Clone)]
pub struct RpcAccountProvider {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
}

impl RpcAccountProvider {
    pub fn new(endpoint: &str) -> Self {
        Self::with_commitment(endpoint, CommitmentConfig::confirmed())
    }

    pub fn with_commitment(endpoint: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(
                endpoint.to_string(),
                commitment,
            )),
            endpoint: endpoint.to_string(),
            commitment,
        }
    }
}

#[async_trait]
impl AccountProvider for RpcAccountProvider {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn commitment_config(&self) -> CommitmentConfig {
        self.commitment
    }

    async fn get_account(&self, account: Pubkey) -> SdkResult<Account> {
        self.client
            .get_account(&account)
            .await
            .map_err(SdkError::Rpc)
    }
}

/// Markets and users a set of remaining accounts must cover
#[derive(Clone, Debug, Default)]
pub struct RemainingAccountParams {
    pub user_accounts: Vec<User>,
    pub writable_perp_market_indexes: Vec<u16>,
    pub writable_spot_market_indexes: Vec<u16>,
    pub readable_perp_market_indexes: Vec<u16>,
    pub readable_spot_market_indexes: Vec<u16>,
}

/// Drift Client API
///
/// It is cheaply clone-able and consumers are encouraged to do so
/// It is not recommended to create multiple instances with `::new()` as this will not re-use underlying resources such
/// as network connections or memory allocations
#[derive(Clone)]
#[must_use]
pub struct DriftClient<T: AccountProvider> {
    pub backend: &'static DriftClientBackend<T>,
    pub wallet: Wallet,
    pub active_sub_account_id: u16,
    pub sub_account_ids: Vec<u16>,
    pub users: Vec<DriftUser>,
}

impl<T: AccountProvider> DriftClient<T> {
    /// Construct the client. No network traffic happens until `subscribe`.
    pub fn new(account_provider: T, wallet: Wallet, opts: ClientOpts) -> SdkResult<Self> {
        Ok(Self {
            backend: Box::leak(Box::new(DriftClientBackend::new(account_provider)?)),
            wallet,
            active_sub_account_id: opts.active_sub_account_id(),
            sub_account_ids: opts.sub_account_ids().to_vec(),
            users: vec![],
        })
    }

    /// Sync the market and oracle caches and keep them fresh.
    /// This is a no-op if already subscribed.
    pub async fn subscribe(&self) -> SdkResult<()> {
        self.backend.subscribe().await
    }

    pub async fn unsubscribe(&self) -> SdkResult<()> {
        self.backend.unsubscribe().await
    }

    /// Start tracking the wallet's user account for `sub_account_id`
    pub async fn add_user(&mut self, sub_account_id: u16) -> SdkResult<()> {
        let pubkey = self.wallet.sub_account(sub_account_id);
        let user = DriftUser::new(pubkey, sub_account_id);
        user.subscribe(self.backend.rpc_client.clone()).await?;
        self.users.push(user);
        Ok(())
    }

    pub fn get_user(&self, sub_account_id: Option<u16>) -> Option<&DriftUser> {
        let sub_account_id = sub_account_id.unwrap_or(self.active_sub_account_id);
        self.users
            .iter()
            .find(|u| u.sub_account_id == sub_account_id)
    }

    /// Cached account data of one of the wallet's sub accounts
    pub fn get_user_account(&self, sub_account_id: Option<u16>) -> SdkResult<User> {
        let sub_account_id = sub_account_id.unwrap_or(self.active_sub_account_id);
        self.get_user(Some(sub_account_id))
            .map(|u| u.get_user_account())
            .ok_or(SdkError::NoUser(sub_account_id))
    }

    /// Fetch the stats account of `authority`
    pub async fn get_user_stats(&self, authority: &Pubkey) -> SdkResult<UserStats> {
        let user_stats_pubkey = get_user_stats_account_pubkey(&drift_program(), *authority);
        self.backend.get_account(&user_stats_pubkey).await
    }

    /// The referrer of `taker_stats`, if any
    pub fn get_referrer_info(&self, taker_stats: &UserStats) -> Option<ReferrerInfo> {
        if taker_stats.referrer == Pubkey::default() {
            return None;
        }
        Some(ReferrerInfo {
            referrer: get_user_account_pubkey(&drift_program(), taker_stats.referrer, Some(0)),
            referrer_stats: get_user_stats_account_pubkey(&drift_program(), taker_stats.referrer),
        })
    }

    pub fn get_user_account_public_key(&self, sub_account_id: Option<u16>) -> Pubkey {
        self.wallet
            .sub_account(self.get_sub_account_id_for_ix(sub_account_id))
    }

    pub fn get_user_stats_public_key(&self) -> Pubkey {
        self.wallet.stats_account()
    }

    pub fn get_state_public_key(&self) -> Pubkey {
        state_account()
    }

    pub fn program_id(&self) -> Pubkey {
        drift_program()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// The sub account id an instruction should act on
    pub fn get_sub_account_id_for_ix(&self, sub_account_id: Option<u16>) -> u16 {
        sub_account_id.unwrap_or(self.active_sub_account_id)
    }

    pub fn get_perp_market_account_and_slot(
        &self,
        market_index: u16,
    ) -> Option<DataAndSlot<PerpMarket>> {
        self.backend.perp_market_map.get(&market_index)
    }

    pub fn get_spot_market_account_and_slot(
        &self,
        market_index: u16,
    ) -> Option<DataAndSlot<SpotMarket>> {
        self.backend.spot_market_map.get(&market_index)
    }

    pub fn get_perp_market_account(&self, market_index: u16) -> Option<PerpMarket> {
        self.get_perp_market_account_and_slot(market_index)
            .map(|x| x.data)
    }

    pub fn get_spot_market_account(&self, market_index: u16) -> Option<SpotMarket> {
        self.get_spot_market_account_and_slot(market_index)
            .map(|x| x.data)
    }

    pub fn get_quote_spot_market_account(&self) -> Option<SpotMarket> {
        self.get_spot_market_account(QUOTE_SPOT_MARKET_INDEX)
    }

    pub fn get_oracle_price_data_for_perp_market(&self, market_index: u16) -> Option<Oracle> {
        let market = self.get_perp_market_account(market_index)?;
        self.backend.oracle_map.get(&market.amm.oracle)
    }

    pub fn get_oracle_price_data_for_spot_market(&self, market_index: u16) -> Option<Oracle> {
        let market = self.get_spot_market_account(market_index)?;
        self.backend.oracle_map.get(&market.oracle)
    }

    /// The trailing accounts the drift program reads when it operates on
    /// `params.user_accounts`, ordered oracles, then spot markets, then perp markets
    pub fn get_remaining_accounts(
        &self,
        params: RemainingAccountParams,
    ) -> SdkResult<Vec<AccountMeta>> {
        let mut oracle_accounts = BTreeMap::new();
        let mut spot_accounts = BTreeMap::new();
        let mut perp_accounts = BTreeMap::new();

        for user in &params.user_accounts {
            for spot_position in &user.spot_positions {
                if !spot_position.is_available() {
                    self.add_spot_market_to_remaining_accounts(
                        spot_position.market_index,
                        false,
                        &mut oracle_accounts,
                        &mut spot_accounts,
                    )?;

                    if spot_position.open_asks != 0 || spot_position.open_bids != 0 {
                        self.add_spot_market_to_remaining_accounts(
                            QUOTE_SPOT_MARKET_INDEX,
                            false,
                            &mut oracle_accounts,
                            &mut spot_accounts,
                        )?;
                    }
                }
            }

            for perp_position in &user.perp_positions {
                if !perp_position.is_available() {
                    self.add_perp_market_to_remaining_accounts(
                        perp_position.market_index,
                        false,
                        &mut oracle_accounts,
                        &mut spot_accounts,
                        &mut perp_accounts,
                    )?;
                }
            }
        }

        for index in params.readable_spot_market_indexes {
            self.add_spot_market_to_remaining_accounts(
                index,
                false,
                &mut oracle_accounts,
                &mut spot_accounts,
            )?;
        }
        for index in params.readable_perp_market_indexes {
            self.add_perp_market_to_remaining_accounts(
                index,
                false,
                &mut oracle_accounts,
                &mut spot_accounts,
                &mut perp_accounts,
            )?;
        }
        for index in params.writable_spot_market_indexes {
            self.add_spot_market_to_remaining_accounts(
                index,
                true,
                &mut oracle_accounts,
                &mut spot_accounts,
            )?;
        }
        for index in params.writable_perp_market_indexes {
            self.add_perp_market_to_remaining_accounts(
                index,
                true,
                &mut oracle_accounts,
                &mut spot_accounts,
                &mut perp_accounts,
            )?;
        }

        Ok(oracle_accounts
            .into_values()
            .chain(spot_accounts.into_values())
            .chain(perp_accounts.into_values())
            .collect())
    }

    fn add_spot_market_to_remaining_accounts(
        &self,
        market_index: u16,
        writable: bool,
        oracle_accounts: &mut BTreeMap<Pubkey, AccountMeta>,
        spot_accounts: &mut BTreeMap<u16, AccountMeta>,
    ) -> SdkResult<()> {
        let market = self
            .get_spot_market_account(market_index)
            .ok_or(SdkError::UnknownMarket(MarketType::Spot, market_index))?;

        upsert_account(
            spot_accounts,
            market_index,
            AccountMeta {
                pubkey: market.pubkey,
                is_signer: false,
                is_writable: writable,
            },
        );
        if market.oracle != Pubkey::default() {
            upsert_account(
                oracle_accounts,
                market.oracle,
                AccountMeta {
                    pubkey: market.oracle,
                    is_signer: false,
                    is_writable: false,
                },
            );
        }

        Ok(())
    }

    fn add_perp_market_to_remaining_accounts(
        &self,
        market_index: u16,
        writable: bool,
        oracle_accounts: &mut BTreeMap<Pubkey, AccountMeta>,
        spot_accounts: &mut BTreeMap<u16, AccountMeta>,
        perp_accounts: &mut BTreeMap<u16, AccountMeta>,
    ) -> SdkResult<()> {
        let market = self
            .get_perp_market_account(market_index)
            .ok_or(SdkError::UnknownMarket(MarketType::Perp, market_index))?;

        upsert_account(
            perp_accounts,
            market_index,
            AccountMeta {
                pubkey: market.pubkey,
                is_signer: false,
                is_writable: writable,
            },
        );
        let oracle_writable =
            writable && market.amm.oracle_source == OracleSource::Prelaunch;
        upsert_account(
            oracle_accounts,
            market.amm.oracle,
            AccountMeta {
                pubkey: market.amm.oracle,
                is_signer: false,
                is_writable: oracle_writable,
            },
        );
        self.add_spot_market_to_remaining_accounts(
            market.quote_spot_market_index,
            false,
            oracle_accounts,
            spot_accounts,
        )?;

        Ok(())
    }

    /// Sign and send `ixs` as a single transaction
    ///
    /// Returns the signature and the slot it was sent at
    pub async fn send_ixs(&self, ixs: Vec<Instruction>) -> SdkResult<TxSigAndSlot> {
        let recent_blockhash = self.backend.rpc_client.get_latest_blockhash().await?;
        let tx = self.wallet.sign_tx(&ixs, recent_blockhash)?;
        let tx_sig = self.backend.rpc_client.send_transaction(&tx).await?;
        let slot = self.backend.rpc_client.get_slot().await?;
        Ok(TxSigAndSlot { tx_sig, slot })
    }
}

fn upsert_account<K: Ord>(map: &mut BTreeMap<K, AccountMeta>, key: K, meta: AccountMeta) {
    map.entry(key)
        .and_modify(|existing| existing.is_writable |= meta.is_writable)
        .or_insert(meta);
}

/// Provides the heavy-lifting and network facing features of the SDK
/// It is intended to be a singleton
pub struct DriftClientBackend<T: AccountProvider> {
    pub rpc_client: Arc<RpcClient>,
    pub account_provider: T,
    pub perp_market_map: Arc<MarketMap<PerpMarket>>,
    pub spot_market_map: Arc<MarketMap<SpotMarket>>,
    pub oracle_map: Arc<OracleMap>,
}

impl<T: AccountProvider> DriftClientBackend<T> {
    fn new(account_provider: T) -> SdkResult<Self> {
        let rpc_client = Arc::new(RpcClient::new_with_commitment(
            account_provider.endpoint(),
            account_provider.commitment_config(),
        ));
        let ws_url = get_ws_url(&account_provider.endpoint())?;

        Ok(Self {
            perp_market_map: Arc::new(MarketMap::new(rpc_client.clone())),
            spot_market_map: Arc::new(MarketMap::new(rpc_client.clone())),
            oracle_map: Arc::new(OracleMap::new(rpc_client.clone(), ws_url)),
            rpc_client,
            account_provider,
        })
    }

    async fn subscribe(&self) -> SdkResult<()> {
        tokio::try_join!(self.perp_market_map.sync(), self.spot_market_map.sync())?;

        for (oracle, source) in self
            .perp_market_map
            .oracles()
            .into_iter()
            .chain(self.spot_market_map.oracles())
        {
            self.oracle_map.add_oracle(oracle, source);
        }
        self.oracle_map.sync().await?;

        self.perp_market_map.subscribe();
        self.spot_market_map.subscribe();
        self.oracle_map.subscribe();

        Ok(())
    }

    async fn unsubscribe(&self) -> SdkResult<()> {
        self.perp_market_map.unsubscribe();
        self.spot_market_map.unsubscribe();
        self.oracle_map.unsubscribe();
        Ok(())
    }

    /// Fetch an `account` as a drift account type
    async fn get_account<U: DriftAccount>(&self, account: &Pubkey) -> SdkResult<U> {
        let account_data = self.account_provider.get_account(*account).await?;
        decode_account(&account_data.data)
    }
}
