use rst_common::with_tracing::tracing_subscriber::{
    self, layer::SubscriberExt, util::SubscriberInitExt,
};

use prople_agent_node::storage::RocksStorage;
use prople_agent_node::{AgentNode, Node};

use crate::errors::AgentdError;

pub struct AgentService {
    config: String,
}

impl AgentService {
    pub fn new(config: String) -> AgentService {
        Self { config }
    }

    /// `svc` installs the tracing subscriber and builds the node from the config file
    pub fn svc(&self) -> Result<Node<RocksStorage>, AgentdError> {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    format!(
                        "{}=debug,prople_agent_core=debug,prople_agent_node=debug,tower_http=debug,axum=trace",
                        env!("CARGO_CRATE_NAME")
                    )
                    .into()
                }),
            )
            .with(tracing_subscriber::fmt::layer().without_time())
            .init();

        let agent_node =
            AgentNode::new(&self.config).map_err(|err| AgentdError::ConfigError(err.to_string()))?;

        agent_node
            .build()
            .map_err(|err| AgentdError::NodeError(err.to_string()))
    }
}
