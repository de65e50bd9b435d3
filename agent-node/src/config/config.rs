use rst_common::standard::serde::{self, Deserialize};

use prople_agent_core::agent::AgentConfig;

use crate::common::types::{CommonError, ToValidate};

use super::{App, Database};

/// `Config` is the node configuration file: the HTTP listener, the agent policy and the
/// record database
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(crate = "self::serde")]
pub struct Config {
    pub(super) app: App,
    pub(super) agent: AgentConfig,
    pub(super) database: Database,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn db(&self) -> &Database {
        &self.database
    }
}

impl ToValidate for Config {
    fn validate(&self) -> Result<(), CommonError> {
        self.app.validate()?;
        ToValidate::validate(&self.agent)?;
        self.database.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::helpers;

    #[test]
    fn test_validation_failed() {
        let cfg = Config::new();
        let validation = helpers::validate(cfg);
        assert!(matches!(
            validation.unwrap_err(),
            CommonError::ValidationError(msg) if msg.contains("rocksdbcommon:cf_name")
        ))
    }
}
