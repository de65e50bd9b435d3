use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::{debug, warn};
use rst_common::with_tokio::tokio;
use rst_common::with_tokio::tokio::sync::Mutex;
use rst_common::with_tokio::tokio::task::JoinHandle;

use crate::agent::{MediatorPickupStrategy, MessageSender};
use crate::connections::{ConnectionRecord, TrustPing};
use crate::messaging::{AgentMessage, ReturnRoute};

use super::messages::BatchPickup;
use super::types::RoutingError;

const DEFAULT_BATCH_SIZE: usize = 10;

/// `PickupStrategy` decides how a recipient receives what its mediator queued
#[async_trait]
pub trait PickupStrategy: Send + Sync {
    fn strategy(&self) -> MediatorPickupStrategy;

    /// `initiate` starts receiving from the mediator connection
    async fn initiate(&self, mediator_connection: ConnectionRecord) -> Result<(), RoutingError>;

    async fn shutdown(&self);
}

/// `ImplicitPickup` opens a return route session with a trust ping, the mediator flushes
/// its queue into that session and keeps using it while it stays open
#[derive(Clone)]
pub struct ImplicitPickup {
    sender: MessageSender,
}

impl ImplicitPickup {
    pub fn new(sender: MessageSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl PickupStrategy for ImplicitPickup {
    fn strategy(&self) -> MediatorPickupStrategy {
        MediatorPickupStrategy::Implicit
    }

    async fn initiate(&self, mediator_connection: ConnectionRecord) -> Result<(), RoutingError> {
        let ping = AgentMessage::new(&TrustPing {
            comment: None,
            response_requested: false,
        })?
        .with_return_route(ReturnRoute::All);

        self.sender.send_message(ping, &mediator_connection).await?;
        debug!(
            "pickup: implicit session opened with connection {}",
            mediator_connection.id
        );
        Ok(())
    }

    async fn shutdown(&self) {}
}

/// `PollingPickup` sends a `batch-pickup` on every interval tick
#[derive(Clone)]
pub struct PollingPickup {
    sender: MessageSender,
    interval: Duration,
    batch_size: usize,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PollingPickup {
    pub fn new(sender: MessageSender, interval: Duration) -> Self {
        Self {
            sender,
            interval,
            batch_size: DEFAULT_BATCH_SIZE,
            handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    async fn pickup(
        sender: &MessageSender,
        connection: &ConnectionRecord,
        batch_size: usize,
    ) -> Result<(), RoutingError> {
        let message =
            AgentMessage::new(&BatchPickup { batch_size })?.with_return_route(ReturnRoute::All);
        sender.send_message(message, connection).await?;
        Ok(())
    }
}

#[async_trait]
impl PickupStrategy for PollingPickup {
    fn strategy(&self) -> MediatorPickupStrategy {
        MediatorPickupStrategy::Polling
    }

    async fn initiate(&self, mediator_connection: ConnectionRecord) -> Result<(), RoutingError> {
        let mut handle = self.handle.lock().await;
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        let sender = self.sender.clone();
        let interval = self.interval;
        let batch_size = self.batch_size;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = Self::pickup(&sender, &mediator_connection, batch_size).await {
                    warn!(
                        "pickup: polling connection {} failed: {}",
                        mediator_connection.id, err
                    );
                }
            }
        }));

        Ok(())
    }

    async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }
}

/// `NoPickup` leaves the queue untouched, used by agents with their own inbound endpoint
#[derive(Clone, Default)]
pub struct NoPickup;

#[async_trait]
impl PickupStrategy for NoPickup {
    fn strategy(&self) -> MediatorPickupStrategy {
        MediatorPickupStrategy::None
    }

    async fn initiate(&self, _: ConnectionRecord) -> Result<(), RoutingError> {
        Ok(())
    }

    async fn shutdown(&self) {}
}

pub fn build_pickup_strategy(
    strategy: MediatorPickupStrategy,
    sender: MessageSender,
    polling_interval: Duration,
) -> Arc<dyn PickupStrategy> {
    match strategy {
        MediatorPickupStrategy::Implicit => Arc::new(ImplicitPickup::new(sender)),
        MediatorPickupStrategy::Polling => Arc::new(PollingPickup::new(sender, polling_interval)),
        MediatorPickupStrategy::None => Arc::new(NoPickup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mockall::mock;
    use rst_common::standard::serde_json::Value;

    use crate::connections::{ConnectionRole, ConnectionState, DidDoc};
    use crate::transport::{
        InMemoryMessageQueue, OutboundPackage, OutboundTransport, SessionRegistry, TransportError,
    };
    use crate::wallet::{LocalWallet, Wallet};

    mock!(
        FakeTransport{}

        #[async_trait]
        impl OutboundTransport for FakeTransport {
            fn supported_schemes(&self) -> Vec<String>;
            async fn send(&self, package: OutboundPackage) -> Result<Option<Value>, TransportError>;
        }
    );

    async fn build_connection(wallet: &LocalWallet) -> ConnectionRecord {
        let ours = wallet.create_did(None).await.unwrap();
        let theirs = wallet.create_did(None).await.unwrap();

        let mut connection = ConnectionRecord::new(
            ConnectionRole::Invitee,
            ConnectionState::Completed,
            ours.did.to_owned(),
            ours.verkey.to_owned(),
            DidDoc::build(&ours.did, &ours.verkey, &["didcomm:transport/queue".to_string()], &[]),
        );

        connection.their_did_doc = Some(DidDoc::build(
            &theirs.did,
            &theirs.verkey,
            &["https://mediator.example".to_string()],
            &[],
        ));
        connection
    }

    fn build_sender(wallet: LocalWallet, transport: MockFakeTransport) -> MessageSender {
        MessageSender::new(
            Arc::new(wallet),
            vec![Arc::new(transport)],
            SessionRegistry::new(),
            Arc::new(InMemoryMessageQueue::new()),
            None,
        )
    }

    #[tokio::test]
    async fn test_implicit_pickup_requests_response() {
        let wallet = LocalWallet::new();
        let connection = build_connection(&wallet).await;

        let mut transport = MockFakeTransport::new();
        transport
            .expect_supported_schemes()
            .returning(|| vec!["https".to_string()]);
        transport
            .expect_send()
            .times(1)
            .withf(|package| package.response_requested)
            .returning(|_| Ok(None));

        let pickup = ImplicitPickup::new(build_sender(wallet, transport));
        let initiated = pickup.initiate(connection).await;
        assert!(!initiated.is_err());
    }

    #[tokio::test]
    async fn test_polling_pickup_until_shutdown() {
        let wallet = LocalWallet::new();
        let connection = build_connection(&wallet).await;

        let mut transport = MockFakeTransport::new();
        transport
            .expect_supported_schemes()
            .returning(|| vec!["https".to_string()]);
        transport
            .expect_send()
            .times(1..)
            .returning(|_| Ok(None));

        let pickup = PollingPickup::new(
            build_sender(wallet, transport),
            Duration::from_millis(10),
        );

        let initiated = pickup.initiate(connection).await;
        assert!(!initiated.is_err());

        tokio::time::sleep(Duration::from_millis(35)).await;
        pickup.shutdown().await;
        assert!(pickup.handle.lock().await.is_none());
    }

    #[test]
    fn test_build_pickup_strategy() {
        let sender = MessageSender::new(
            Arc::new(LocalWallet::new()),
            vec![],
            SessionRegistry::new(),
            Arc::new(InMemoryMessageQueue::new()),
            None,
        );

        let strategies = [
            MediatorPickupStrategy::Implicit,
            MediatorPickupStrategy::Polling,
            MediatorPickupStrategy::None,
        ];

        for strategy in strategies {
            let built = build_pickup_strategy(strategy, sender.clone(), Duration::from_secs(1));
            assert_eq!(built.strategy(), strategy);
        }
    }
}
