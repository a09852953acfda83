use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sdk::{
    drift::{Order, User},
    drift_client::{AccountProvider, DriftClient},
};
use solana_sdk::pubkey::Pubkey;

use crate::{
    jit_proxy_client::JitProxyClient,
    types::{ErrorDisposition, JitIxParams, PostOnlyParam},
};

use super::{FillStrategy, OngoingAuctions, ParamsRegistry};

/// Cooldown after a fill lands (or infrastructure trips) so the same order is
/// not immediately re-picked
const SHOTGUN_COOLDOWN: tokio::time::Duration = tokio::time::Duration::from_secs(10);

/// Fires a jit attempt on every slot of the auction window. Trades RPC
/// bandwidth for not having to predict where the auction crosses.
pub struct Shotgun<T: AccountProvider + Clone> {
    drift_client: DriftClient<T>,
    jit_proxy_client: JitProxyClient<T>,
    registry: Arc<ParamsRegistry>,
    ongoing_auctions: Arc<OngoingAuctions>,
}

impl<T: AccountProvider + Clone> Shotgun<T> {
    pub fn new(
        drift_client: DriftClient<T>,
        jit_proxy_client: JitProxyClient<T>,
        registry: Arc<ParamsRegistry>,
        ongoing_auctions: Arc<OngoingAuctions>,
    ) -> Self {
        Self {
            drift_client,
            jit_proxy_client,
            registry,
            ongoing_auctions,
        }
    }
}

#[async_trait]
impl<T: AccountProvider + Clone> FillStrategy for Shotgun<T> {
    async fn try_fill(
        &self,
        taker: User,
        taker_key: Pubkey,
        taker_stats_key: Pubkey,
        order: Order,
        order_sig: String,
    ) {
        info!("shotgun: trying to fill {order_sig}");

        let taker_stats = match self.drift_client.get_user_stats(&taker.authority).await {
            Ok(taker_stats) => taker_stats,
            Err(e) => {
                error!("could not fetch taker stats of {}: {e}", taker.authority);
                self.ongoing_auctions.release(&order_sig);
                return;
            }
        };
        let referrer_info = self.drift_client.get_referrer_info(&taker_stats);

        for attempt in 0..order.auction_duration {
            let Some(params) = self
                .registry
                .params_for(order.market_type, order.market_index)
            else {
                debug!("{order_sig}: params removed, abandoning");
                self.ongoing_auctions.release(&order_sig);
                return;
            };
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
                    post_only: Some(PostOnlyParam::MustPostOnly),
                    price_type: params.price_type,
                    referrer_info,
                    sub_account_id: params.sub_account_id,
                })
                .await;

            match result {
                Ok(tx) => {
                    info!("filled {order_sig}: {} at slot {}", tx.tx_sig, tx.slot);
                    tokio::time::sleep(SHOTGUN_COOLDOWN).await;
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
                        tokio::time::sleep(SHOTGUN_COOLDOWN).await;
                        self.ongoing_auctions.release(&order_sig);
                        return;
                    }
                },
            }
        }

        self.ongoing_auctions.release(&order_sig);
    }
}
