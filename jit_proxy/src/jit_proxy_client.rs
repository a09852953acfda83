use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use sdk::{
    constants::QUOTE_SPOT_MARKET_INDEX,
    drift,
    drift_client::{AccountProvider, DriftClient, RemainingAccountParams},
    types::{SdkError, TxSigAndSlot},
};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::types::{
    ArbIxParams, JitError, JitIxParams, JitResult, MarketType, OrderConstraint, PostOnlyParam,
    PriceType,
};

const JIT_IX_DISCRIMINATOR: [u8; 8] = [0x63, 0x2a, 0x61, 0x8c, 0x98, 0x3e, 0xa7, 0xea];
const ARB_PERP_IX_DISCRIMINATOR: [u8; 8] = [0x74, 0x69, 0x8a, 0x63, 0x1c, 0xab, 0x27, 0xe1];
const CHECK_ORDER_CONSTRAINTS_IX_DISCRIMINATOR: [u8; 8] =
    [0xb7, 0xae, 0x8e, 0xf5, 0x05, 0x1d, 0xcf, 0x02];

/// The on-chain proxy program
pub fn jit_proxy_program() -> Pubkey {
    Pubkey::from_str("J1TnP8zvVxbtF5KFp5xRmWuvG9McnhzmBd9XGfCyuxFP").expect("valid program id")
}

/// Wire layout of the jit instruction payload
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitParams {
    pub taker_order_id: u32,
    pub max_position: i64,
    pub min_position: i64,
    pub bid: i64,
    pub ask: i64,
    pub price_type: PriceType,
    pub post_only: Option<PostOnlyParam>,
}

/// Builds and submits the proxy program's instructions
#[derive(Clone)]
pub struct JitProxyClient<T: AccountProvider> {
    drift_client: DriftClient<T>,
    program_id: Pubkey,
}

impl<T: AccountProvider> JitProxyClient<T> {
    pub fn new(drift_client: DriftClient<T>, program_id: Option<Pubkey>) -> Self {
        Self {
            drift_client,
            program_id: program_id.unwrap_or_else(jit_proxy_program),
        }
    }

    /// Mint a maker order against the taker order named by `params` and settle
    /// the fill, atomically within its auction
    pub async fn jit(&self, params: &JitIxParams) -> JitResult<TxSigAndSlot> {
        let ix = self.jit_ix(params)?;
        Ok(self.drift_client.send_ixs(vec![ix]).await?)
    }

    pub fn jit_ix(&self, params: &JitIxParams) -> JitResult<Instruction> {
        let sub_account_id = self
            .drift_client
            .get_sub_account_id_for_ix(params.sub_account_id);
        let order = params
            .taker
            .orders
            .iter()
            .find(|order| order.order_id == params.taker_order_id)
            .ok_or(JitError::OrderNotFound(params.taker_order_id))?;
        let user_account = self.drift_client.get_user_account(Some(sub_account_id))?;

        let (writable_spot_market_indexes, writable_perp_market_indexes) = match order.market_type {
            drift::MarketType::Spot => (vec![order.market_index, QUOTE_SPOT_MARKET_INDEX], vec![]),
            drift::MarketType::Perp => (vec![], vec![order.market_index]),
        };
        let mut remaining_accounts =
            self.drift_client
                .get_remaining_accounts(RemainingAccountParams {
                    user_accounts: vec![params.taker.clone(), user_account],
                    writable_spot_market_indexes,
                    writable_perp_market_indexes,
                    ..Default::default()
                })?;

        if let Some(referrer_info) = &params.referrer_info {
            remaining_accounts.push(AccountMeta::new(referrer_info.referrer, false));
            remaining_accounts.push(AccountMeta::new(referrer_info.referrer_stats, false));
        }

        if order.market_type == drift::MarketType::Spot {
            let spot_market = self
                .drift_client
                .get_spot_market_account(order.market_index)
                .ok_or(SdkError::UnknownMarket(
                    drift::MarketType::Spot,
                    order.market_index,
                ))
                .map_err(JitError::Sdk)?;
            let quote_spot_market = self
                .drift_client
                .get_quote_spot_market_account()
                .ok_or(SdkError::UnknownMarket(
                    drift::MarketType::Spot,
                    QUOTE_SPOT_MARKET_INDEX,
                ))
                .map_err(JitError::Sdk)?;
            remaining_accounts.push(AccountMeta::new_readonly(spot_market.vault, false));
            remaining_accounts.push(AccountMeta::new_readonly(quote_spot_market.vault, false));
        }

        let mut accounts = vec![
            AccountMeta::new_readonly(self.drift_client.get_state_public_key(), false),
            AccountMeta::new(
                self.drift_client
                    .get_user_account_public_key(Some(sub_account_id)),
                false,
            ),
            AccountMeta::new(self.drift_client.get_user_stats_public_key(), false),
            AccountMeta::new(params.taker_key, false),
            AccountMeta::new(params.taker_stats_key, false),
            AccountMeta::new_readonly(*self.drift_client.wallet().authority(), true),
            AccountMeta::new_readonly(self.drift_client.program_id(), false),
        ];
        accounts.append(&mut remaining_accounts);

        let jit_params = JitParams {
            taker_order_id: params.taker_order_id,
            max_position: params.max_position,
            min_position: params.min_position,
            bid: params.bid,
            ask: params.ask,
            price_type: params.price_type,
            post_only: params.post_only,
        };
        let data = encode_ix_data(JIT_IX_DISCRIMINATOR, &jit_params)?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }

    /// Capture the spread between two crossing resting orders on a perp market
    pub async fn arb_perp(&self, params: &ArbIxParams) -> JitResult<TxSigAndSlot> {
        let ix = self.arb_perp_ix(params)?;
        Ok(self.drift_client.send_ixs(vec![ix]).await?)
    }

    pub fn arb_perp_ix(&self, params: &ArbIxParams) -> JitResult<Instruction> {
        let user_account = self.drift_client.get_user_account(None)?;

        let mut user_accounts = vec![user_account];
        user_accounts.extend(
            params
                .maker_infos
                .iter()
                .map(|maker| maker.maker_user_account.clone()),
        );

        let mut remaining_accounts =
            self.drift_client
                .get_remaining_accounts(RemainingAccountParams {
                    user_accounts,
                    writable_perp_market_indexes: vec![params.market_index],
                    ..Default::default()
                })?;

        for maker in &params.maker_infos {
            remaining_accounts.push(AccountMeta::new(maker.maker, false));
            remaining_accounts.push(AccountMeta::new(maker.maker_stats, false));
        }

        if let Some(referrer_info) = &params.referrer_info {
            let referrer_is_maker = params
                .maker_infos
                .iter()
                .any(|maker| maker.maker == referrer_info.referrer);
            if !referrer_is_maker {
                remaining_accounts.push(AccountMeta::new(referrer_info.referrer, false));
                remaining_accounts.push(AccountMeta::new(referrer_info.referrer_stats, false));
            }
        }

        let mut accounts = vec![
            AccountMeta::new_readonly(self.drift_client.get_state_public_key(), false),
            AccountMeta::new(self.drift_client.get_user_account_public_key(None), false),
            AccountMeta::new(self.drift_client.get_user_stats_public_key(), false),
            AccountMeta::new_readonly(*self.drift_client.wallet().authority(), true),
            AccountMeta::new_readonly(self.drift_client.program_id(), false),
        ];
        accounts.append(&mut remaining_accounts);

        let data = encode_ix_data(ARB_PERP_IX_DISCRIMINATOR, &params.market_index)?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }

    /// Ask the program to verify the maker's positions against `constraints`
    pub async fn check_order_constraints(
        &self,
        constraints: Vec<OrderConstraint>,
        sub_account_id: Option<u16>,
    ) -> JitResult<TxSigAndSlot> {
        let ix = self.check_order_constraints_ix(constraints, sub_account_id)?;
        Ok(self.drift_client.send_ixs(vec![ix]).await?)
    }

    pub fn check_order_constraints_ix(
        &self,
        constraints: Vec<OrderConstraint>,
        sub_account_id: Option<u16>,
    ) -> JitResult<Instruction> {
        let sub_account_id = self.drift_client.get_sub_account_id_for_ix(sub_account_id);
        let user_account = self.drift_client.get_user_account(Some(sub_account_id))?;

        let readable_perp_market_indexes = constraints
            .iter()
            .filter(|constraint| constraint.market_type == MarketType::Perp)
            .map(|constraint| constraint.market_index)
            .collect();
        let readable_spot_market_indexes = constraints
            .iter()
            .filter(|constraint| constraint.market_type == MarketType::Spot)
            .map(|constraint| constraint.market_index)
            .collect();

        let mut remaining_accounts =
            self.drift_client
                .get_remaining_accounts(RemainingAccountParams {
                    user_accounts: vec![user_account],
                    readable_perp_market_indexes,
                    readable_spot_market_indexes,
                    ..Default::default()
                })?;

        let mut accounts = vec![AccountMeta::new_readonly(
            self.drift_client
                .get_user_account_public_key(Some(sub_account_id)),
            false,
        )];
        accounts.append(&mut remaining_accounts);

        let data = encode_ix_data(CHECK_ORDER_CONSTRAINTS_IX_DISCRIMINATOR, &constraints)?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}

fn encode_ix_data<A: BorshSerialize>(discriminator: [u8; 8], args: &A) -> JitResult<Vec<u8>> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| JitError::Generic(format!("could not encode instruction args: {e}")))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sdk::{
        drift::{Order, OrderStatus, OrderType, SpotMarket, User, AMM},
        drift_client_config::ClientOpts,
        types::{DataAndSlot, ReferrerInfo, SdkResult},
        user::DriftUser,
        utils::instruction_discriminator,
        wallet::Wallet,
    };
    use solana_sdk::{
        account::Account, commitment_config::CommitmentConfig, signature::Keypair,
    };

    use super::*;
    use crate::types::MakerInfo;

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

    fn test_client() -> DriftClient<NullAccountProvider> {
        let mut client = DriftClient::new(
            NullAccountProvider,
            Wallet::new(Keypair::new()),
            ClientOpts::default(),
        )
        .unwrap();
        let user = DriftUser::new(client.wallet.sub_account(0), 0);
        user.update_data(User::default(), 1);
        client.users.push(user);
        client
    }

    fn insert_spot_market(client: &DriftClient<NullAccountProvider>, index: u16) -> SpotMarket {
        let market = SpotMarket {
            pubkey: Pubkey::new_unique(),
            oracle: Pubkey::new_unique(),
            vault: Pubkey::new_unique(),
            market_index: index,
            ..SpotMarket::default()
        };
        client.backend.spot_market_map.map.insert(
            index,
            DataAndSlot {
                slot: 1,
                data: market.clone(),
            },
        );
        market
    }

    fn insert_perp_market(client: &DriftClient<NullAccountProvider>, index: u16) -> sdk::drift::PerpMarket {
        let market = sdk::drift::PerpMarket {
            pubkey: Pubkey::new_unique(),
            market_index: index,
            quote_spot_market_index: QUOTE_SPOT_MARKET_INDEX,
            amm: AMM {
                oracle: Pubkey::new_unique(),
                ..AMM::default()
            },
            ..sdk::drift::PerpMarket::default()
        };
        client.backend.perp_market_map.map.insert(
            index,
            DataAndSlot {
                slot: 1,
                data: market.clone(),
            },
        );
        market
    }

    fn taker_with_order(market_type: drift::MarketType, market_index: u16) -> (User, Order) {
        let order = Order {
            order_id: 7,
            status: OrderStatus::Open,
            order_type: OrderType::Market,
            market_type,
            market_index,
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
        (taker, order)
    }

    fn jit_params_for(taker: User) -> JitIxParams {
        JitIxParams {
            taker_key: Pubkey::new_unique(),
            taker_stats_key: Pubkey::new_unique(),
            taker,
            taker_order_id: 7,
            max_position: 2,
            min_position: 1,
            bid: 1_000_000,
            ask: 1_010_000,
            post_only: Some(PostOnlyParam::MustPostOnly),
            price_type: PriceType::Oracle,
            referrer_info: None,
            sub_account_id: None,
        }
    }

    #[test]
    fn discriminators_are_the_anchor_sighashes() {
        assert_eq!(JIT_IX_DISCRIMINATOR, instruction_discriminator("jit"));
        assert_eq!(
            ARB_PERP_IX_DISCRIMINATOR,
            instruction_discriminator("arb_perp")
        );
        assert_eq!(
            CHECK_ORDER_CONSTRAINTS_IX_DISCRIMINATOR,
            instruction_discriminator("check_order_constraints")
        );
    }

    #[test]
    fn jit_params_wire_layout_round_trips() {
        let params = JitParams {
            taker_order_id: 1,
            max_position: 2,
            min_position: -3,
            bid: -4,
            ask: 5,
            price_type: PriceType::Oracle,
            post_only: Some(PostOnlyParam::TryPostOnly),
        };

        let mut expected = Vec::new();
        expected.extend_from_slice(&1_u32.to_le_bytes());
        expected.extend_from_slice(&2_i64.to_le_bytes());
        expected.extend_from_slice(&(-3_i64).to_le_bytes());
        expected.extend_from_slice(&(-4_i64).to_le_bytes());
        expected.extend_from_slice(&5_i64.to_le_bytes());
        expected.push(1); // PriceType::Oracle
        expected.extend_from_slice(&[1, 2]); // Some(TryPostOnly)

        let encoded = params.try_to_vec().unwrap();
        assert_eq!(encoded, expected);
        assert_eq!(JitParams::try_from_slice(&encoded).unwrap(), params);

        let no_post_only = JitParams {
            post_only: None,
            ..params
        };
        assert_eq!(*no_post_only.try_to_vec().unwrap().last().unwrap(), 0);
    }

    #[test]
    fn jit_ix_orders_the_head_accounts() {
        let client = test_client();
        insert_perp_market(&client, 0);
        insert_spot_market(&client, QUOTE_SPOT_MARKET_INDEX);

        let proxy = JitProxyClient::new(client.clone(), None);
        let (taker, _) = taker_with_order(drift::MarketType::Perp, 0);
        let params = jit_params_for(taker);
        let ix = proxy.jit_ix(&params).unwrap();

        assert_eq!(ix.program_id, jit_proxy_program());
        assert_eq!(ix.data[..8], JIT_IX_DISCRIMINATOR);

        let head = &ix.accounts[..7];
        assert_eq!(head[0].pubkey, client.get_state_public_key());
        assert!(!head[0].is_writable);
        assert_eq!(head[1].pubkey, client.get_user_account_public_key(None));
        assert!(head[1].is_writable);
        assert_eq!(head[2].pubkey, client.get_user_stats_public_key());
        assert!(head[2].is_writable);
        assert_eq!(head[3].pubkey, params.taker_key);
        assert!(head[3].is_writable);
        assert_eq!(head[4].pubkey, params.taker_stats_key);
        assert!(head[4].is_writable);
        assert_eq!(head[5].pubkey, *client.wallet().authority());
        assert!(head[5].is_signer);
        assert!(!head[5].is_writable);
        assert_eq!(head[6].pubkey, client.program_id());
        assert!(!head[6].is_signer);

        // perp order: the perp market itself is writable, no vaults appended
        let perp_market = client.get_perp_market_account(0).unwrap();
        let perp_meta = ix
            .accounts
            .iter()
            .find(|meta| meta.pubkey == perp_market.pubkey)
            .unwrap();
        assert!(perp_meta.is_writable);
    }

    #[test]
    fn spot_jit_ix_appends_referrer_then_vaults() {
        let client = test_client();
        let spot = insert_spot_market(&client, 5);
        let quote = insert_spot_market(&client, QUOTE_SPOT_MARKET_INDEX);

        let proxy = JitProxyClient::new(client.clone(), None);
        let (taker, _) = taker_with_order(drift::MarketType::Spot, 5);
        let mut params = jit_params_for(taker);
        let referrer_info = ReferrerInfo {
            referrer: Pubkey::new_unique(),
            referrer_stats: Pubkey::new_unique(),
        };
        params.referrer_info = Some(referrer_info);

        let ix = proxy.jit_ix(&params).unwrap();
        let tail = &ix.accounts[ix.accounts.len() - 4..];

        assert_eq!(tail[0].pubkey, referrer_info.referrer);
        assert!(tail[0].is_writable);
        assert_eq!(tail[1].pubkey, referrer_info.referrer_stats);
        assert!(tail[1].is_writable);
        assert_eq!(tail[2].pubkey, spot.vault);
        assert!(!tail[2].is_writable);
        assert_eq!(tail[3].pubkey, quote.vault);
        assert!(!tail[3].is_writable);

        // both spot markets are writable in the expansion
        for market in [&spot, &quote] {
            let meta = ix
                .accounts
                .iter()
                .find(|meta| meta.pubkey == market.pubkey)
                .unwrap();
            assert!(meta.is_writable);
        }
    }

    #[test]
    fn unknown_taker_order_is_rejected() {
        let client = test_client();
        insert_perp_market(&client, 0);
        insert_spot_market(&client, QUOTE_SPOT_MARKET_INDEX);

        let proxy = JitProxyClient::new(client, None);
        let (taker, _) = taker_with_order(drift::MarketType::Perp, 0);
        let mut params = jit_params_for(taker);
        params.taker_order_id = 99;

        assert!(matches!(
            proxy.jit_ix(&params),
            Err(JitError::OrderNotFound(99))
        ));
    }

    #[test]
    fn arb_perp_ix_skips_referrers_that_are_makers() {
        let client = test_client();
        insert_perp_market(&client, 2);
        insert_spot_market(&client, QUOTE_SPOT_MARKET_INDEX);

        let proxy = JitProxyClient::new(client.clone(), None);
        let maker = MakerInfo {
            maker: Pubkey::new_unique(),
            maker_stats: Pubkey::new_unique(),
            maker_user_account: User::default(),
        };

        let params = ArbIxParams {
            maker_infos: vec![maker.clone()],
            market_index: 2,
            referrer_info: Some(ReferrerInfo {
                referrer: maker.maker,
                referrer_stats: maker.maker_stats,
            }),
        };
        let ix = proxy.arb_perp_ix(&params).unwrap();

        assert_eq!(ix.data[..8], ARB_PERP_IX_DISCRIMINATOR);
        assert_eq!(ix.data[8..], 2_u16.to_le_bytes());
        // the maker pair appears exactly once
        let maker_metas = ix
            .accounts
            .iter()
            .filter(|meta| meta.pubkey == maker.maker)
            .count();
        assert_eq!(maker_metas, 1);

        // a distinct referrer is appended
        let referrer_info = ReferrerInfo {
            referrer: Pubkey::new_unique(),
            referrer_stats: Pubkey::new_unique(),
        };
        let params = ArbIxParams {
            referrer_info: Some(referrer_info),
            ..params
        };
        let ix = proxy.arb_perp_ix(&params).unwrap();
        let tail = &ix.accounts[ix.accounts.len() - 2..];
        assert_eq!(tail[0].pubkey, referrer_info.referrer);
        assert_eq!(tail[1].pubkey, referrer_info.referrer_stats);
    }

    #[test]
    fn check_order_constraints_partitions_by_market_kind() {
        let client = test_client();
        insert_perp_market(&client, 1);
        let spot = insert_spot_market(&client, 6);
        insert_spot_market(&client, QUOTE_SPOT_MARKET_INDEX);

        let proxy = JitProxyClient::new(client.clone(), None);
        let constraints = vec![
            OrderConstraint {
                max_position: 10,
                min_position: -10,
                market_index: 1,
                market_type: MarketType::Perp,
            },
            OrderConstraint {
                max_position: 5,
                min_position: 0,
                market_index: 6,
                market_type: MarketType::Spot,
            },
        ];
        let ix = proxy
            .check_order_constraints_ix(constraints.clone(), None)
            .unwrap();

        assert_eq!(ix.data[..8], CHECK_ORDER_CONSTRAINTS_IX_DISCRIMINATOR);
        // vec length prefix
        assert_eq!(ix.data[8..12], 2_u32.to_le_bytes());

        assert_eq!(ix.accounts[0].pubkey, client.get_user_account_public_key(None));
        assert!(!ix.accounts[0].is_writable);

        let perp_market = client.get_perp_market_account(1).unwrap();
        for pubkey in [perp_market.pubkey, spot.pubkey] {
            let meta = ix
                .accounts
                .iter()
                .find(|meta| meta.pubkey == pubkey)
                .unwrap();
            assert!(!meta.is_writable);
        }
    }
}
