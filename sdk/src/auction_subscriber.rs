use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use futures_util::StreamExt;
use log::{debug, error, warn};
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::{
    constants::drift_program,
    drift::{decode_account, DriftAccount, User},
    event_emitter::{Event, EventEmitter},
    types::{SdkError, SdkResult},
};

/// Account offset of `User.has_open_auction`, used to filter the program
/// account subscription down to takers with a live auction.
const HAS_OPEN_AUCTION_OFFSET: usize = 4354;

/// A taker account snapshot observed while at least one of its orders is in auction
#[derive(Clone, Debug)]
pub struct AuctionUpdate {
    pub user: User,
    pub pubkey: Pubkey,
    pub slot: u64,
}

impl Event for AuctionUpdate {
    fn box_clone(&self) -> Box<dyn Event> {
        Box::new((*self).clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Streams `User` accounts with open auctions over a filtered program subscription
#[derive(Clone)]
pub struct AuctionSubscriber {
    url: String,
    commitment: CommitmentConfig,
    pub event_emitter: EventEmitter,
    subscribed: Arc<AtomicBool>,
    unsubscriber: Arc<Mutex<Option<tokio::sync::mpsc::Sender<()>>>>,
}

impl AuctionSubscriber {
    pub const SUBSCRIPTION_ID: &'static str = "auction";

    pub fn new(ws_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            url: ws_url.to_string(),
            commitment,
            event_emitter: EventEmitter::new(),
            subscribed: Arc::new(AtomicBool::new(false)),
            unsubscriber: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn subscribe(&self) -> SdkResult<()> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.subscribe_ws()
    }

    fn subscribe_ws(&self) -> SdkResult<()> {
        let account_config = RpcAccountInfoConfig {
            commitment: Some(self.commitment),
            encoding: Some(UiAccountEncoding::Base64),
            ..RpcAccountInfoConfig::default()
        };
        let program_config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, User::discriminator().to_vec())),
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(HAS_OPEN_AUCTION_OFFSET, vec![1])),
            ]),
            account_config,
            with_context: None,
        };

        let (unsub_tx, mut unsub_rx) = tokio::sync::mpsc::channel::<()>(1);
        {
            let mut unsubscriber = self.unsubscriber.lock().expect("unsubscriber");
            *unsubscriber = Some(unsub_tx);
        }

        let url = self.url.clone();
        let event_emitter = self.event_emitter.clone();

        tokio::spawn(async move {
            let mut attempt = 0_u32;
            let max_reconnection_attempts = 20;
            let base_delay = tokio::time::Duration::from_secs(2);
            let mut latest_slot = 0_u64;

            loop {
                let pubsub = match PubsubClient::new(&url).await {
                    Ok(pubsub) => pubsub,
                    Err(e) => {
                        error!("auction subscriber: websocket connect failed: {e}");
                        attempt += 1;
                        if attempt >= max_reconnection_attempts {
                            error!("auction subscriber: max reconnection attempts reached");
                            return;
                        }
                        tokio::time::sleep(base_delay * 2_u32.pow(attempt.min(5))).await;
                        continue;
                    }
                };

                match pubsub
                    .program_subscribe(&drift_program(), Some(program_config.clone()))
                    .await
                {
                    Ok((mut updates, program_unsubscribe)) => loop {
                        attempt = 0;
                        tokio::select! {
                            message = updates.next() => {
                                match message {
                                    Some(message) => {
                                        let slot = message.context.slot;
                                        if slot < latest_slot {
                                            continue;
                                        }
                                        latest_slot = slot;

                                        let Ok(pubkey) = Pubkey::from_str(&message.value.pubkey) else {
                                            warn!("auction subscriber: invalid pubkey {}", message.value.pubkey);
                                            continue;
                                        };
                                        let Some(account) = message.value.account.decode::<Account>() else {
                                            warn!("auction subscriber: undecodable account {pubkey}");
                                            continue;
                                        };
                                        match decode_account::<User>(&account.data) {
                                            Ok(user) => {
                                                event_emitter.emit(
                                                    AuctionSubscriber::SUBSCRIPTION_ID,
                                                    Box::new(AuctionUpdate { user, pubkey, slot }),
                                                );
                                            }
                                            Err(e) => warn!("auction subscriber: bad user account {pubkey}: {e}"),
                                        }
                                    }
                                    None => {
                                        warn!("auction subscriber: account stream interrupted");
                                        program_unsubscribe().await;
                                        break;
                                    }
                                }
                            }
                            _ = unsub_rx.recv() => {
                                debug!("auction subscriber: unsubscribing");
                                program_unsubscribe().await;
                                return;
                            }
                        }
                    },
                    Err(e) => {
                        error!("auction subscriber: failed to subscribe, retrying: {e}");
                        attempt += 1;
                        if attempt >= max_reconnection_attempts {
                            error!("auction subscriber: max reconnection attempts reached");
                            return;
                        }
                    }
                }

                tokio::time::sleep(base_delay * 2_u32.pow(attempt.min(5))).await;
            }
        });

        Ok(())
    }

    pub async fn unsubscribe(&self) -> SdkResult<()> {
        if !self.subscribed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let unsub_tx = {
            let unsubscriber = self.unsubscriber.lock().expect("unsubscriber");
            unsubscriber.clone()
        };
        if let Some(unsub_tx) = unsub_tx {
            unsub_tx.send(()).await.map_err(SdkError::CouldntUnsubscribe)?;
        }
        self.subscribed.store(false, Ordering::SeqCst);
        Ok(())
    }
}
