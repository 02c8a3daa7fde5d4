// file: src/binder.rs
// description: keeps exactly one connection instance alive for the currently selected symbol

use crate::{
    client::{ChannelHandle, ChannelSettings, Connector, spawn_channel},
    events::EventSender,
    machine::{ConnectionMachine, ReconnectBudget},
    types::ChannelKey,
    view::{ConsumerSnapshot, RadarView},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Maps a channel key to the opaque target the transport connects to.
pub type TargetResolver = Arc<dyn Fn(&ChannelKey) -> String + Send + Sync>;

/// Binds the radar channel to one symbol at a time.
///
/// Rebinding tears the previous instance down and waits for its task to
/// finish before the next one is spawned, so two transports never overlap.
/// Consumers read through [`RadarSubscription::snapshot`] or a
/// [`watch::Receiver`] from [`RadarSubscription::watch`]; both survive
/// rebinding.
pub struct RadarSubscription<C: Connector> {
    connector: Arc<C>,
    settings: ChannelSettings,
    resolver: TargetResolver,
    publisher: Arc<watch::Sender<ConsumerSnapshot>>,
    events: Option<EventSender>,
    key: Option<ChannelKey>,
    active: Option<ChannelHandle>,
}

impl<C: Connector> RadarSubscription<C> {
    pub fn new<F>(connector: Arc<C>, settings: ChannelSettings, resolver: F) -> Self
    where
        F: Fn(&ChannelKey) -> String + Send + Sync + 'static,
    {
        let (publisher, _) = watch::channel(ConsumerSnapshot::default());
        Self {
            connector,
            settings,
            resolver: Arc::new(resolver),
            publisher: Arc::new(publisher),
            events: None,
            key: None,
            active: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Subscribes to `key`. A no-op when `key` is already bound and live.
    pub async fn bind(&mut self, key: ChannelKey) {
        if self.active.is_some() && self.key.as_ref() == Some(&key) {
            debug!("Radar channel already bound to {}", key);
            return;
        }
        if let Some(previous) = &self.key {
            info!("Rebinding radar channel {} -> {}", previous, key);
        }
        self.stop_active().await;
        self.publisher.send_replace(ConsumerSnapshot::default());
        self.start(key, RadarView::new());
    }

    /// Rebuilds the instance for the current key, keeping the data gathered
    /// so far. This is the way out of a failed channel. Returns `false` when
    /// nothing has been bound yet.
    pub async fn retry(&mut self) -> bool {
        let Some(key) = self.key.clone() else {
            return false;
        };
        let seed = match self.stop_active().await {
            Some(view) => RadarView::with_data(view.data().clone(), view.last_update()),
            None => RadarView::new(),
        };
        info!("Retrying radar channel for {}", key);
        self.start(key, seed);
        true
    }

    /// Tears the current instance down. The last published snapshot stays
    /// readable; nothing writes to it afterwards.
    pub async fn teardown(&mut self) {
        self.stop_active().await;
    }

    /// Tears down and consumes the subscription. Once this returns nothing
    /// publishes to receivers from [`RadarSubscription::watch`] again.
    pub async fn dispose(mut self) {
        self.teardown().await;
    }

    pub fn snapshot(&self) -> ConsumerSnapshot {
        self.publisher.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConsumerSnapshot> {
        self.publisher.subscribe()
    }

    pub fn key(&self) -> Option<&ChannelKey> {
        self.key.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    fn start(&mut self, key: ChannelKey, view: RadarView) {
        let target = (self.resolver)(&key);
        let budget =
            ReconnectBudget::new(self.settings.reconnect_delay, self.settings.max_attempts);
        let machine = ConnectionMachine::with_view(key.clone(), target, budget, view);
        self.active = Some(spawn_channel(
            Arc::clone(&self.connector),
            machine,
            self.settings.connect_timeout,
            Arc::clone(&self.publisher),
            self.events.clone(),
        ));
        self.key = Some(key);
    }

    async fn stop_active(&mut self) -> Option<RadarView> {
        let handle = self.active.take()?;
        handle.teardown().await
    }
}

/// Dropping only signals cancellation. The driver task may still publish a
/// frame it was handling at that moment; use [`RadarSubscription::dispose`]
/// when receivers must observe no further changes.
impl<C: Connector> Drop for RadarSubscription<C> {
    fn drop(&mut self) {
        if let Some(handle) = &self.active {
            handle.cancel();
        }
    }
}
