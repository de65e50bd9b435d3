use std::time::Duration;

use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio;
use rst_common::with_tokio::tokio::sync::broadcast::{self, error::RecvError};
use rst_common::with_tokio::tokio::task::JoinHandle;

use super::types::{AgentEvent, EventError, EventType};

const DEFAULT_CAPACITY: usize = 1024;

/// `EventBus` is the in-process publish/subscribe channel of one agent instance
///
/// Each subscriber owns its own receiver, so events are delivered to every subscriber in
/// publish order and a slow subscriber only lags itself
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// `publish` returns the number of subscribers that received the event
    pub fn publish(&self, event: AgentEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("event {:?} published without subscribers", event_type);
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter: None,
        }
    }

    pub fn subscribe_to(&self, event_type: EventType) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter: Some(event_type),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// `on` runs the handler for every event of the given type until the returned token
    /// is dropped or unsubscribed
    pub fn on<F>(&self, event_type: EventType, handler: F) -> SubscriptionToken
    where
        F: Fn(AgentEvent) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe_to(event_type);
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                handler(event)
            }
        });

        SubscriptionToken { handle }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<AgentEvent>,
    filter: Option<EventType>,
}

impl Subscription {
    /// `recv` returns `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        loop {
            match self.next_event().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    async fn next_event(&mut self) -> Result<AgentEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            let accepted = self
                .filter
                .map(|filter| filter == event.event_type())
                .unwrap_or(true);

            if accepted {
                return Ok(event);
            }
        }
    }

    /// `wait_for` blocks until an event satisfies the predicate or the timeout expires
    ///
    /// The subscription is consumed, so the listener is released on every exit path. A
    /// subscriber that fell behind fails with [`EventError::Lagged`] because the awaited
    /// event may be among the skipped ones.
    pub async fn wait_for<F>(mut self, predicate: F, timeout: Duration) -> Result<AgentEvent, EventError>
    where
        F: Fn(&AgentEvent) -> bool,
    {
        let waiting = async {
            loop {
                match self.next_event().await {
                    Ok(event) if predicate(&event) => return Ok(event),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("event waiter lagged, {} events skipped", skipped);
                        return Err(EventError::Lagged(skipped));
                    }
                    Err(RecvError::Closed) => return Err(EventError::Closed),
                }
            }
        };

        tokio::time::timeout(timeout, waiting)
            .await
            .map_err(|_| EventError::Timeout(format!("no matching event after {:?}", timeout)))?
    }
}

/// `SubscriptionToken` keeps a handler registered through [`EventBus::on`] alive
pub struct SubscriptionToken {
    handle: JoinHandle<()>,
}

impl SubscriptionToken {
    pub fn unsubscribe(self) {
        self.handle.abort()
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.handle.abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::basic_messages::BasicMessage;
    use crate::messaging::AgentMessage;

    fn build_processed_event(id: &str) -> AgentEvent {
        let body = BasicMessage::new(id.to_string());
        AgentEvent::AgentMessageProcessed {
            message: AgentMessage::new(&body).unwrap(),
            connection_id: Some(id.to_string()),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(build_processed_event("1")), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut subscription = bus.subscribe();

        assert_eq!(bus.publish(build_processed_event("1")), 1);
        assert_eq!(bus.publish(build_processed_event("2")), 1);

        for expected in ["1", "2"] {
            let event = subscription.recv().await.unwrap();
            match event {
                AgentEvent::AgentMessageProcessed { connection_id, .. } => {
                    assert_eq!(connection_id, Some(expected.to_string()))
                }
                _ => panic!("unexpected event"),
            }
        }
    }

    #[tokio::test]
    async fn test_wait_for_timeout_releases_listener() {
        let bus = EventBus::new();
        let subscription = bus.subscribe_to(EventType::ConnectionStateChanged);
        assert_eq!(bus.subscriber_count(), 1);

        let waited = subscription
            .wait_for(|_| true, Duration::from_millis(20))
            .await;

        assert!(matches!(waited.unwrap_err(), EventError::Timeout(_)));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_reports_lag() {
        let bus = EventBus::with_capacity(2);
        let subscription = bus.subscribe();

        for id in ["1", "2", "3", "4", "5"] {
            bus.publish(build_processed_event(id));
        }

        let waited = subscription
            .wait_for(|_| false, Duration::from_secs(1))
            .await;
        assert!(matches!(waited.unwrap_err(), EventError::Lagged(3)));
    }

    #[tokio::test]
    async fn test_wait_for_filters_event_type() {
        let bus = EventBus::new();
        let subscription = bus.subscribe_to(EventType::AgentMessageProcessed);

        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(build_processed_event("1"));
        });

        let waited = subscription
            .wait_for(|_| true, Duration::from_secs(1))
            .await;
        assert!(!waited.is_err());
    }

    #[tokio::test]
    async fn test_on_handler_and_unsubscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let handler_counter = counter.clone();
        let token = bus.on(EventType::AgentMessageProcessed, move |_| {
            handler_counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(build_processed_event("1"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(token.is_active());

        token.unsubscribe();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bus.subscriber_count(), 0);
    }
}
