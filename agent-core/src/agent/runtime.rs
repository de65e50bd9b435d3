use std::sync::Arc;
use std::time::Duration;

use rst_common::standard::serde_json::Value;
use rst_common::with_logging::log::{debug, info};
use rst_common::with_tokio::tokio;
use rst_common::with_tokio::tokio::sync::Mutex;
use rst_common::with_tokio::tokio::task::JoinHandle;

use crate::basic_messages::{BasicMessageHandler, BasicMessageUsecase};
use crate::connections::{ConnectionAPI, ConnectionHandler, ConnectionUsecase};
use crate::credentials::{CredentialHandler, CredentialUsecase};
use crate::discover_features::{DiscoverFeaturesHandler, DiscoverFeaturesUsecase};
use crate::events::EventBus;
use crate::ledger::LedgerBuilder;
use crate::proofs::{ProofHandler, ProofUsecase};
use crate::routing::{
    build_pickup_strategy, MediationRecipientAPI, MediationRecipientHandler,
    MediationRecipientUsecase, MediatorHandler, MediatorUsecase, PickupStrategy,
};
use crate::storage::StorageBuilder;
use crate::transport::{
    InboundReceiver, InboundSender, MemoryInbound, MessageQueue, OutboundTransport,
    SessionRegistry, TransportSession,
};
use crate::wallet::{CredentialWallet, Wallet};

use super::config::AgentConfig;
use super::dispatcher::Dispatcher;
use super::receiver::MessageReceiver;
use super::sender::MessageSender;
use super::types::AgentError;

/// `AgentDependencies` are the backends an embedding node plugs into the engine
#[derive(Clone)]
pub struct AgentDependencies {
    pub wallet: Arc<dyn Wallet>,
    pub credential_wallet: Arc<dyn CredentialWallet>,
    pub ledger: Arc<dyn LedgerBuilder>,
    pub transports: Vec<Arc<dyn OutboundTransport>>,
    pub queue: Arc<dyn MessageQueue>,
}

/// `Agent` owns the component graph of one agent instance
///
/// Nothing is shared between two instances living in the same process except what the
/// caller passes in, so each agent gets its own storage, event bus and sessions.
#[derive(Clone)]
pub struct Agent<TStorage>
where
    TStorage: StorageBuilder,
{
    config: AgentConfig,
    events: EventBus,
    sender: MessageSender,
    receiver: MessageReceiver<TStorage>,
    connections: ConnectionUsecase<TStorage>,
    recipient: MediationRecipientUsecase<TStorage>,
    mediator: MediatorUsecase<TStorage>,
    credentials: CredentialUsecase<TStorage>,
    proofs: ProofUsecase<TStorage>,
    basic_messages: BasicMessageUsecase<TStorage>,
    discover_features: DiscoverFeaturesUsecase<TStorage>,
    pickup: Arc<dyn PickupStrategy>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<TStorage> Agent<TStorage>
where
    TStorage: StorageBuilder + 'static,
{
    /// `new` wires the graph, `inbound` is the channel transports and picked up batches
    /// feed back into this agent
    pub fn new(
        config: AgentConfig,
        storage: TStorage,
        deps: AgentDependencies,
        inbound: InboundSender,
    ) -> Self {
        let events = EventBus::new();
        let sender = MessageSender::new(
            deps.wallet.clone(),
            deps.transports,
            SessionRegistry::new(),
            deps.queue,
            Some(inbound),
        );

        let connections = ConnectionUsecase::new(
            storage.clone(),
            deps.wallet.clone(),
            sender.clone(),
            events.clone(),
            config.clone(),
        );

        let recipient = MediationRecipientUsecase::new(
            storage.clone(),
            connections.clone(),
            deps.wallet.clone(),
            sender.clone(),
            events.clone(),
            config.clone(),
        );

        let mediator = MediatorUsecase::new(
            storage.clone(),
            connections.clone(),
            deps.wallet.clone(),
            sender.clone(),
            events.clone(),
            config.clone(),
        );

        let credentials = CredentialUsecase::new(
            storage.clone(),
            connections.clone(),
            recipient.clone(),
            deps.credential_wallet.clone(),
            deps.ledger.clone(),
            sender.clone(),
            events.clone(),
        );

        let proofs = ProofUsecase::new(
            storage.clone(),
            connections.clone(),
            recipient.clone(),
            deps.wallet.clone(),
            deps.credential_wallet,
            deps.ledger,
            sender.clone(),
            events.clone(),
        );

        let basic_messages =
            BasicMessageUsecase::new(storage, connections.clone(), sender.clone(), events.clone());

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(ConnectionHandler::new(
            connections.clone(),
            recipient.clone(),
            config.clone(),
        )));
        dispatcher.register(Arc::new(CredentialHandler::new(
            credentials.clone(),
            config.clone(),
        )));
        dispatcher.register(Arc::new(ProofHandler::new(proofs.clone(), config.clone())));
        dispatcher.register(Arc::new(MediatorHandler::new(
            mediator.clone(),
            config.clone(),
        )));
        dispatcher.register(Arc::new(MediationRecipientHandler::new(recipient.clone())));
        dispatcher.register(Arc::new(BasicMessageHandler::new(basic_messages.clone())));

        let discover_features = DiscoverFeaturesUsecase::new(
            connections.clone(),
            sender.clone(),
            dispatcher.supported_messages(),
        );
        dispatcher.register(Arc::new(DiscoverFeaturesHandler::new(
            discover_features.clone(),
        )));

        let receiver = MessageReceiver::new(
            deps.wallet,
            connections.clone(),
            Arc::new(dispatcher),
            sender.clone(),
            events.clone(),
        );

        let pickup = build_pickup_strategy(
            config.mediator_pickup_strategy,
            sender.clone(),
            Duration::from_millis(config.mediator_polling_interval_ms),
        );

        Self {
            config,
            events,
            sender,
            receiver,
            connections,
            recipient,
            mediator,
            credentials,
            proofs,
            basic_messages,
            discover_features,
            pickup,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `initialize` starts processing `inbound`, then provisions the configured mediator
    /// and starts picking up from the default one
    pub async fn initialize(&self, inbound: InboundReceiver) -> Result<(), AgentError> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(AgentError::ConfigError(errors.join(", ")));
        }

        let receiver = self.receiver.clone();
        let handle = tokio::spawn(Self::process_inbound(receiver, inbound));
        self.tasks.lock().await.push(handle);

        if let Some(invitation_url) = &self.config.mediator_connections_invite {
            let mediation = self.recipient.provision(invitation_url.to_owned()).await?;
            info!(
                "agent {}: mediation {} provisioned",
                self.config.label, mediation.id
            );
        }

        if let Some(mediation) = self.recipient.get_default_mediator().await? {
            let connection = self
                .connections
                .get_by_id(mediation.connection_id.to_owned())
                .await?;
            self.pickup.initiate(connection).await?;
            debug!(
                "agent {}: {:?} pickup started for mediation {}",
                self.config.label,
                self.pickup.strategy(),
                mediation.id
            );
        }

        info!("agent {}: initialized", self.config.label);
        Ok(())
    }

    /// one task per inbound message, a slow handler never blocks the next message
    async fn process_inbound(receiver: MessageReceiver<TStorage>, mut inbound: InboundReceiver) {
        while let Some(raw) = inbound.recv().await {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                if let Err(err) = receiver.receive_message(raw, None).await {
                    debug!("agent: inbound message failed: {}", err);
                }
            });
        }

        debug!("agent: inbound channel closed");
    }

    /// `listen_memory` serves an endpoint registered on a [`crate::transport::MemoryHub`],
    /// every delivery keeps its session for return routes
    pub async fn listen_memory(
        &self,
        mut endpoint: tokio::sync::mpsc::UnboundedReceiver<MemoryInbound>,
    ) {
        let receiver = self.receiver.clone();
        let handle = tokio::spawn(async move {
            while let Some(delivery) = endpoint.recv().await {
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    let session: Arc<dyn TransportSession> = Arc::new(delivery.session);
                    if let Err(err) = receiver
                        .receive_message(delivery.payload, Some(session))
                        .await
                    {
                        debug!("agent: memory delivery failed: {}", err);
                    }
                });
            }
        });

        self.tasks.lock().await.push(handle);
    }

    pub async fn receive_message(
        &self,
        raw: Value,
        session: Option<Arc<dyn TransportSession>>,
    ) -> Result<(), AgentError> {
        self.receiver.receive_message(raw, session).await
    }

    pub async fn shutdown(&self) {
        self.pickup.shutdown().await;

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }

        info!("agent {}: shutdown", self.config.label);
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    pub fn connections(&self) -> ConnectionUsecase<TStorage> {
        self.connections.clone()
    }

    pub fn mediation_recipient(&self) -> MediationRecipientUsecase<TStorage> {
        self.recipient.clone()
    }

    pub fn mediator(&self) -> MediatorUsecase<TStorage> {
        self.mediator.clone()
    }

    pub fn credentials(&self) -> CredentialUsecase<TStorage> {
        self.credentials.clone()
    }

    pub fn proofs(&self) -> ProofUsecase<TStorage> {
        self.proofs.clone()
    }

    pub fn basic_messages(&self) -> BasicMessageUsecase<TStorage> {
        self.basic_messages.clone()
    }

    pub fn discover_features(&self) -> DiscoverFeaturesUsecase<TStorage> {
        self.discover_features.clone()
    }
}
