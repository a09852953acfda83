use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Payload of an [`EventEmitter`] subscription.
///
/// Events are cloned per subscriber, so implementors should stay cheap to clone.
pub trait Event: Send + Sync {
    fn box_clone(&self) -> Box<dyn Event>;

    fn as_any(&self) -> &dyn std::any::Any;
}

type Handler = Arc<dyn Fn(Box<dyn Event>) + Send + Sync>;

/// Name-keyed callback bus shared by the subscribers.
#[derive(Clone, Default)]
pub struct EventEmitter {
    handlers: Arc<RwLock<HashMap<&'static str, Vec<Handler>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event_type: &'static str, handler: F)
    where
        F: Fn(Box<dyn Event>) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().expect("event handlers");
        handlers
            .entry(event_type)
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn emit(&self, event_type: &'static str, event: Box<dyn Event>) {
        let handlers = self.handlers.read().expect("event handlers");
        if let Some(subscribed) = handlers.get(event_type) {
            for handler in subscribed {
                handler(event.box_clone());
            }
        }
    }
}
