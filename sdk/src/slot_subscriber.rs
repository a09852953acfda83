use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use futures_util::StreamExt;
use log::{debug, error, warn};
use solana_client::nonblocking::pubsub_client::PubsubClient;

use crate::{
    event_emitter::{Event, EventEmitter},
    types::{SdkError, SdkResult},
};

/// Streams slot updates over websocket.
///
/// To react to slot updates, subscribe to the event_emitter's "slot" event type;
/// `current_slot` always holds the highest slot seen so far.
#[derive(Clone)]
pub struct SlotSubscriber {
    current_slot: Arc<AtomicU64>,
    pub event_emitter: EventEmitter,
    subscribed: Arc<AtomicBool>,
    url: String,
    unsubscriber: Arc<Mutex<Option<tokio::sync::mpsc::Sender<()>>>>,
}

#[derive(Clone, Debug)]
pub struct SlotUpdate {
    pub latest_slot: u64,
}

impl SlotUpdate {
    pub fn new(latest_slot: u64) -> Self {
        Self { latest_slot }
    }
}

impl Event for SlotUpdate {
    fn box_clone(&self) -> Box<dyn Event> {
        Box::new((*self).clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl SlotSubscriber {
    pub const SUBSCRIPTION_ID: &'static str = "slot";

    pub fn new(url: &str) -> Self {
        Self {
            current_slot: Arc::new(AtomicU64::new(0)),
            event_emitter: EventEmitter::new(),
            subscribed: Arc::new(AtomicBool::new(false)),
            url: url.to_string(),
            unsubscriber: Arc::new(Mutex::new(None)),
        }
    }

    pub fn current_slot(&self) -> u64 {
        self.current_slot.load(Ordering::Relaxed)
    }

    /// Record a newly observed slot, notifying subscribers. Stale slots are dropped.
    pub fn update_slot(&self, slot: u64) {
        if slot >= self.current_slot() {
            self.current_slot.store(slot, Ordering::Relaxed);
            self.event_emitter
                .emit(Self::SUBSCRIPTION_ID, Box::new(SlotUpdate::new(slot)));
        }
    }

    pub async fn subscribe(&self) -> SdkResult<()> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.subscribe_ws().await?;
        Ok(())
    }

    async fn subscribe_ws(&self) -> SdkResult<()> {
        let pubsub = PubsubClient::new(&self.url).await?;

        let (unsub_tx, mut unsub_rx) = tokio::sync::mpsc::channel::<()>(1);
        {
            let mut unsubscriber = self.unsubscriber.lock().expect("unsubscriber");
            *unsubscriber = Some(unsub_tx);
        }

        let subscriber = self.clone();
        tokio::spawn(async move {
            let (mut slot_updates, unsubscriber) =
                pubsub.slot_subscribe().await.expect("slot subscription");
            loop {
                tokio::select! {
                    message = slot_updates.next() => {
                        match message {
                            Some(message) => {
                                subscriber.update_slot(message.slot);
                            }
                            None => {
                                warn!("slot stream ended");
                                unsubscriber().await;
                                break;
                            }
                        }
                    }
                    _ = unsub_rx.recv() => {
                        debug!("unsubscribing from slot stream");
                        unsubscriber().await;
                        break;
                    }
                }
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
            if let Err(e) = unsub_tx.send(()).await {
                error!("Failed to send unsubscribe signal: {e:?}");
                return Err(SdkError::CouldntUnsubscribe(e));
            }
        }
        self.subscribed.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[test]
    fn slots_are_monotonic() {
        let subscriber = SlotSubscriber::new("ws://localhost:8900");
        let seen = Arc::new(AtomicU64::new(0));

        let seen_clone = seen.clone();
        subscriber
            .event_emitter
            .subscribe(SlotSubscriber::SUBSCRIPTION_ID, move |event| {
                if let Some(update) = event.as_any().downcast_ref::<SlotUpdate>() {
                    seen_clone.store(update.latest_slot, Ordering::Relaxed);
                }
            });

        subscriber.update_slot(100);
        subscriber.update_slot(105);
        subscriber.update_slot(101); // stale

        assert_eq!(subscriber.current_slot(), 105);
        assert_eq!(seen.load(Ordering::Relaxed), 105);
    }
}
