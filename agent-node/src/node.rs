use std::sync::Arc;
use std::time::Duration;

use rst_common::with_http_tokio::axum::{self, Router};
use rst_common::with_http_tokio::tower_http::timeout::TimeoutLayer;
use rst_common::with_http_tokio::tower_http::trace::TraceLayer;
use rst_common::with_logging::log::info;
use rst_common::with_tokio::tokio::net::TcpListener;
use rst_common::with_tokio::tokio::sync::mpsc;

use prople_agent_core::agent::{Agent, AgentConfig, AgentDependencies};
use prople_agent_core::ledger::CachedLedger;
use prople_agent_core::storage::StorageBuilder;
use prople_agent_core::transport::{InMemoryMessageQueue, InboundReceiver};
use prople_agent_core::wallet::LocalWallet;

use crate::backends::{UnsupportedCredentialWallet, UnsupportedLedger};
use crate::common::helpers;
use crate::common::types::CommonError;
use crate::config::{App, Config, Parser};
use crate::storage::{Builder as StorageBuilderFactory, RocksStorage};
use crate::transport::{inbound, HttpOutboundTransport};

/// `AgentNode` turns a configuration file into a runnable [`Node`]
pub struct AgentNode {
    config: Config,
}

impl AgentNode {
    pub fn new(conf_file: &str) -> Result<Self, CommonError> {
        let config = Parser::new(conf_file.to_string())
            .parse()
            .map_err(|err| CommonError::ConfigError(err.to_string()))?;

        helpers::validate(config.clone())?;
        Ok(Self { config })
    }

    pub fn build_app_config(&self) -> App {
        self.config.app().to_owned()
    }

    pub fn build_storage(&self) -> Result<RocksStorage, CommonError> {
        StorageBuilderFactory::new(self.config.to_owned()).build(|opts| {
            let agent_db = opts.db().agent.clone();
            (agent_db.get_common(), agent_db.get_db_options())
        })
    }

    pub fn build(&self) -> Result<Node<RocksStorage>, CommonError> {
        let storage = self.build_storage()?;
        Ok(build_node(
            self.build_app_config(),
            self.config.agent().to_owned(),
            storage,
        ))
    }
}

/// `build_node` wires an agent over HTTP transports with the development wallet
pub fn build_node<TStorage>(app: App, config: AgentConfig, storage: TStorage) -> Node<TStorage>
where
    TStorage: StorageBuilder,
{
    let (inbound, inbound_receiver) = mpsc::unbounded_channel();
    let deps = AgentDependencies {
        wallet: Arc::new(LocalWallet::new()),
        credential_wallet: Arc::new(UnsupportedCredentialWallet),
        ledger: Arc::new(CachedLedger::new(Arc::new(UnsupportedLedger))),
        transports: vec![Arc::new(HttpOutboundTransport::new())],
        queue: Arc::new(InMemoryMessageQueue::new()),
    };

    let agent = Agent::new(config, storage, deps, inbound);
    Node {
        app,
        agent,
        inbound: inbound_receiver,
    }
}

/// `Node` is one agent served over HTTP
pub struct Node<TStorage>
where
    TStorage: StorageBuilder,
{
    app: App,
    agent: Agent<TStorage>,
    inbound: InboundReceiver,
}

impl<TStorage> Node<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn agent(&self) -> Agent<TStorage> {
        self.agent.clone()
    }

    pub fn router(&self) -> Router {
        inbound::routes(self.agent.clone()).layer((
            TraceLayer::new_for_http(),
            TimeoutLayer::new(Duration::from_secs(10)),
        ))
    }

    pub async fn serve(self) -> Result<(), CommonError> {
        let listener = TcpListener::bind(self.app.address())
            .await
            .map_err(|err| CommonError::ServeError(err.to_string()))?;

        self.serve_with(listener).await
    }

    /// `serve_with` starts accepting before the agent initializes, a configured mediator
    /// answers provisioning requests on our endpoint
    pub async fn serve_with(self, listener: TcpListener) -> Result<(), CommonError> {
        let addr = listener
            .local_addr()
            .map_err(|err| CommonError::ServeError(err.to_string()))?;

        let app = self.router();
        let server = rst_common::with_tokio::tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await
        });

        info!("node: listening on {}", addr);
        self.agent
            .initialize(self.inbound)
            .await
            .map_err(|err| CommonError::AgentError(err.to_string()))?;

        let served = server
            .await
            .map_err(|err| CommonError::ServeError(err.to_string()))?;

        self.agent.shutdown().await;
        served.map_err(|err| CommonError::ServeError(err.to_string()))
    }
}
