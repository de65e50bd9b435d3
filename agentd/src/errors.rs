use rst_common::with_errors::thiserror::{self, Error};

#[derive(Debug, Error)]
pub enum AgentdError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("node error: {0}")]
    NodeError(String),

    #[error("serve error: {0}")]
    ServeError(String),
}
