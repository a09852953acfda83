use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use dashmap::DashMap;
use futures_util::StreamExt;
use log::{error, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::{pubsub_client::PubsubClient, rpc_client::RpcClient},
    rpc_config::RpcAccountInfoConfig,
};
use solana_sdk::{account::Account, pubkey::Pubkey};

use crate::{
    drift::{get_oracle_price, OraclePriceData, OracleSource},
    types::SdkResult,
};

/// A parsed oracle price and the slot it was observed at
#[derive(Clone, Debug)]
pub struct Oracle {
    pub pubkey: Pubkey,
    pub data: OraclePriceData,
    pub source: OracleSource,
    pub slot: u64,
}

/// Keeps the latest parsed price for every tracked oracle account.
///
/// Oracles are registered from the market maps, synced once over RPC, then
/// kept fresh by per-account websocket subscriptions.
pub struct OracleMap {
    pub map: Arc<DashMap<Pubkey, Oracle>>,
    sources: DashMap<Pubkey, OracleSource>,
    rpc_client: Arc<RpcClient>,
    ws_url: String,
    subscribed: AtomicBool,
    watch_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl OracleMap {
    pub fn new(rpc_client: Arc<RpcClient>, ws_url: String) -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            sources: DashMap::new(),
            rpc_client,
            ws_url,
            subscribed: AtomicBool::new(false),
            watch_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Track `oracle`. Takes effect on the next `sync`/`subscribe`.
    pub fn add_oracle(&self, oracle: Pubkey, source: OracleSource) {
        self.sources.insert(oracle, source);
    }

    pub fn get(&self, oracle: &Pubkey) -> Option<Oracle> {
        self.map.get(oracle).map(|oracle| oracle.clone())
    }

    /// Fetch and parse every tracked oracle account once
    pub async fn sync(&self) -> SdkResult<()> {
        let pubkeys: Vec<Pubkey> = self.sources.iter().map(|entry| *entry.key()).collect();
        if pubkeys.is_empty() {
            return Ok(());
        }

        let slot = self.rpc_client.get_slot().await?;
        let accounts = self.rpc_client.get_multiple_accounts(&pubkeys).await?;

        for (pubkey, account) in pubkeys.iter().zip(accounts) {
            let Some(account) = account else {
                warn!("oracle account {pubkey} does not exist");
                continue;
            };
            let source = match self.sources.get(pubkey) {
                Some(source) => *source,
                None => continue,
            };
            match get_oracle_price(source, &account.data, slot) {
                Ok(data) => {
                    self.map.insert(
                        *pubkey,
                        Oracle {
                            pubkey: *pubkey,
                            data,
                            source,
                            slot,
                        },
                    );
                }
                Err(e) => warn!("could not parse oracle {pubkey}: {e}"),
            }
        }

        Ok(())
    }

    /// Watch every tracked oracle account over websocket
    pub fn subscribe(&self) {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }
        let commitment = self.rpc_client.commitment();
        let mut watch_tasks = self.watch_tasks.lock().expect("watch tasks");
        for entry in self.sources.iter() {
            let ws_url = self.ws_url.clone();
            let map = self.map.clone();
            let pubkey = *entry.key();
            let source = *entry.value();
            watch_tasks.push(tokio::spawn(async move {
                watch_oracle(ws_url, map, pubkey, source, commitment).await;
            }));
        }
    }

    pub fn unsubscribe(&self) {
        let mut watch_tasks = self.watch_tasks.lock().expect("watch tasks");
        for task in watch_tasks.drain(..) {
            task.abort();
        }
        self.subscribed.store(false, Ordering::SeqCst);
    }
}

async fn watch_oracle(
    ws_url: String,
    map: Arc<DashMap<Pubkey, Oracle>>,
    pubkey: Pubkey,
    source: OracleSource,
    commitment: solana_sdk::commitment_config::CommitmentConfig,
) {
    let account_config = RpcAccountInfoConfig {
        commitment: Some(commitment),
        encoding: Some(UiAccountEncoding::Base64),
        ..RpcAccountInfoConfig::default()
    };

    loop {
        let pubsub = match PubsubClient::new(&ws_url).await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                error!("oracle watcher {pubkey}: websocket connect failed: {e}");
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                continue;
            }
        };

        match pubsub
            .account_subscribe(&pubkey, Some(account_config.clone()))
            .await
        {
            Ok((mut updates, account_unsubscribe)) => {
                while let Some(message) = updates.next().await {
                    let slot = message.context.slot;
                    let Some(account) = message.value.decode::<Account>() else {
                        warn!("oracle watcher {pubkey}: undecodable account");
                        continue;
                    };
                    match get_oracle_price(source, &account.data, slot) {
                        Ok(data) => {
                            map.insert(
                                pubkey,
                                Oracle {
                                    pubkey,
                                    data,
                                    source,
                                    slot,
                                },
                            );
                        }
                        Err(e) => warn!("oracle watcher {pubkey}: {e}"),
                    }
                }
                warn!("oracle watcher {pubkey}: stream interrupted");
                account_unsubscribe().await;
            }
            Err(e) => {
                error!("oracle watcher {pubkey}: failed to subscribe: {e}");
            }
        }

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    }
}
