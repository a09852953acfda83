use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use dashmap::DashMap;
use log::warn;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::pubkey::Pubkey;

use crate::{
    constants::drift_program,
    drift::{decode_account, DriftAccount, OracleSource, PerpMarket, SpotMarket},
    types::{DataAndSlot, SdkResult},
};

const MARKET_POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(20);

/// A drift market account that can be cached by index
pub trait MarketAccount: DriftAccount + Clone + Send + Sync + 'static {
    fn market_index(&self) -> u16;

    fn oracle_info(&self) -> (Pubkey, OracleSource);
}

impl MarketAccount for PerpMarket {
    fn market_index(&self) -> u16 {
        self.market_index
    }

    fn oracle_info(&self) -> (Pubkey, OracleSource) {
        (self.amm.oracle, self.amm.oracle_source)
    }
}

impl MarketAccount for SpotMarket {
    fn market_index(&self) -> u16 {
        self.market_index
    }

    fn oracle_info(&self) -> (Pubkey, OracleSource) {
        (self.oracle, self.oracle_source)
    }
}

/// Keeps every market account of one kind fresh, keyed by market index
pub struct MarketMap<T> {
    pub map: Arc<DashMap<u16, DataAndSlot<T>>>,
    rpc_client: Arc<RpcClient>,
    subscribed: AtomicBool,
    poll_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T: MarketAccount> MarketMap<T> {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            rpc_client,
            subscribed: AtomicBool::new(false),
            poll_task: Mutex::new(None),
        }
    }

    /// Fetch all market accounts of this kind into the cache
    pub async fn sync(&self) -> SdkResult<()> {
        sync_market_map(&self.rpc_client, &self.map).await
    }

    /// Keep the cache fresh by re-syncing in the background
    pub fn subscribe(&self) {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }

        let rpc_client = self.rpc_client.clone();
        let map = self.map.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(MARKET_POLL_INTERVAL).await;
                if let Err(e) = sync_market_map(&rpc_client, &map).await {
                    warn!("market map sync failed: {e}");
                }
            }
        });
        let mut poll_task = self.poll_task.lock().expect("poll task");
        *poll_task = Some(handle);
    }

    pub fn unsubscribe(&self) {
        let mut poll_task = self.poll_task.lock().expect("poll task");
        if let Some(handle) = poll_task.take() {
            handle.abort();
        }
        self.subscribed.store(false, Ordering::SeqCst);
    }

    pub fn get(&self, market_index: &u16) -> Option<DataAndSlot<T>> {
        self.map.get(market_index).map(|market| market.clone())
    }

    pub fn values(&self) -> Vec<T> {
        self.map.iter().map(|market| market.data.clone()).collect()
    }

    pub fn oracles(&self) -> Vec<(Pubkey, OracleSource)> {
        self.map
            .iter()
            .map(|market| market.data.oracle_info())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.map.len()
    }
}

async fn sync_market_map<T: MarketAccount>(
    rpc_client: &RpcClient,
    map: &DashMap<u16, DataAndSlot<T>>,
) -> SdkResult<()> {
    let config = RpcProgramAccountsConfig {
        filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
            0,
            T::discriminator().to_vec(),
        ))]),
        account_config: RpcAccountInfoConfig {
            commitment: Some(rpc_client.commitment()),
            encoding: Some(UiAccountEncoding::Base64Zstd),
            ..RpcAccountInfoConfig::default()
        },
        with_context: None,
    };

    let slot = rpc_client.get_slot().await?;
    let accounts = rpc_client
        .get_program_accounts_with_config(&drift_program(), config)
        .await?;

    for (pubkey, account) in accounts {
        match decode_account::<T>(&account.data) {
            Ok(market) => {
                map.insert(market.market_index(), DataAndSlot { slot, data: market });
            }
            Err(e) => warn!("skipping market account {pubkey}: {e}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::drift::AMM;

    use super::*;

    #[test]
    fn lookups_are_by_market_index() {
        let map: MarketMap<PerpMarket> =
            MarketMap::new(Arc::new(RpcClient::new("http://localhost:8899".to_string())));

        let oracle = Pubkey::new_unique();
        let market = PerpMarket {
            market_index: 4,
            amm: AMM {
                oracle,
                ..AMM::default()
            },
            ..PerpMarket::default()
        };
        map.map.insert(4, DataAndSlot { slot: 9, data: market });

        assert_eq!(map.size(), 1);
        assert!(map.get(&0).is_none());
        assert_eq!(map.get(&4).unwrap().slot, 9);
        assert_eq!(map.oracles(), vec![(oracle, OracleSource::Pyth)]);
    }
}
