use std::sync::{Arc, Mutex, RwLock};

use log::warn;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

use crate::{
    drift::{decode_account, PerpPosition, User},
    types::{DataAndSlot, SdkResult},
};

const USER_POLL_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(1);

/// Cached view of one of the operator's drift sub accounts
#[derive(Clone)]
pub struct DriftUser {
    pub pubkey: Pubkey,
    pub sub_account_id: u16,
    data_and_slot: Arc<RwLock<DataAndSlot<User>>>,
    poll_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl DriftUser {
    pub fn new(pubkey: Pubkey, sub_account_id: u16) -> Self {
        Self {
            pubkey,
            sub_account_id,
            data_and_slot: Arc::new(RwLock::new(DataAndSlot::default())),
            poll_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetch the account once and keep it fresh in the background
    pub async fn subscribe(&self, rpc_client: Arc<RpcClient>) -> SdkResult<()> {
        self.fetch(&rpc_client).await?;

        let user = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(USER_POLL_INTERVAL).await;
                if let Err(e) = user.fetch(&rpc_client).await {
                    warn!("user {} refresh failed: {e}", user.pubkey);
                }
            }
        });
        let mut poll_task = self.poll_task.lock().expect("poll task");
        if let Some(previous) = poll_task.replace(handle) {
            previous.abort();
        }

        Ok(())
    }

    pub async fn unsubscribe(&self) {
        let mut poll_task = self.poll_task.lock().expect("poll task");
        if let Some(handle) = poll_task.take() {
            handle.abort();
        }
    }

    async fn fetch(&self, rpc_client: &RpcClient) -> SdkResult<()> {
        let slot = rpc_client.get_slot().await?;
        let account = rpc_client.get_account(&self.pubkey).await?;
        let user = decode_account::<User>(&account.data)?;
        self.update_data(user, slot);
        Ok(())
    }

    pub fn update_data(&self, user: User, slot: u64) {
        let mut data_and_slot = self.data_and_slot.write().expect("user data");
        if slot >= data_and_slot.slot {
            *data_and_slot = DataAndSlot { slot, data: user };
        }
    }

    pub fn get_user_account_and_slot(&self) -> DataAndSlot<User> {
        self.data_and_slot.read().expect("user data").clone()
    }

    pub fn get_user_account(&self) -> User {
        self.get_user_account_and_slot().data
    }

    pub fn get_perp_position(&self, market_index: u16) -> Option<PerpPosition> {
        let data_and_slot = self.data_and_slot.read().expect("user data");
        data_and_slot
            .data
            .get_perp_position(market_index)
            .copied()
    }
}
