use rst_common::standard::serde::{self, Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "didcomm:transport/queue";

/// `AutoAccept` decides whether an exchange step is answered without the user
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "snake_case")]
pub enum AutoAccept {
    /// answer every step
    Always,

    /// answer only when the incoming content equals what this agent proposed or offered
    ContentApproved,

    Never,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "snake_case")]
pub enum MediatorPickupStrategy {
    Polling,
    Implicit,
    None,
}

/// `AgentConfig` holds the runtime policy of one agent instance
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(default)]
pub struct AgentConfig {
    pub label: String,
    pub endpoints: Vec<String>,
    pub auto_accept_connections: bool,
    pub auto_accept_credentials: AutoAccept,
    pub auto_accept_proofs: AutoAccept,
    pub auto_accept_mediation_requests: bool,
    pub mediator_connections_invite: Option<String>,
    pub mediator_pickup_strategy: MediatorPickupStrategy,
    pub mediator_polling_interval_ms: u64,
    pub connection_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            label: "prople-agent".to_string(),
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            auto_accept_connections: false,
            auto_accept_credentials: AutoAccept::Never,
            auto_accept_proofs: AutoAccept::Never,
            auto_accept_mediation_requests: false,
            mediator_connections_invite: None,
            mediator_pickup_strategy: MediatorPickupStrategy::Implicit,
            mediator_polling_interval_ms: 5000,
            connection_timeout_ms: 20000,
        }
    }
}

impl AgentConfig {
    /// `endpoint` is the first configured endpoint, the queue endpoint when none is set
    pub fn endpoint(&self) -> String {
        self.endpoints
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// `validate` returns every invalid field at once
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.label.is_empty() {
            errors.push("label was missing".to_string());
        }

        if self.endpoints.is_empty() {
            errors.push("endpoints was missing".to_string());
        }

        if self.mediator_pickup_strategy == MediatorPickupStrategy::Polling
            && self.mediator_polling_interval_ms == 0
        {
            errors.push("mediator_polling_interval_ms was missing".to_string());
        }

        errors
    }
}
