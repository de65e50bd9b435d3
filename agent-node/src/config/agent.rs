use prople_agent_core::agent::AgentConfig;

use crate::common::types::{CommonError, ToValidate};

impl ToValidate for AgentConfig {
    fn validate(&self) -> Result<(), CommonError> {
        let errors = AgentConfig::validate(self);
        if let Some(first) = errors.first() {
            return Err(CommonError::ValidationError(format!(
                "config: agent:{}",
                first.replace(" was missing", " is missing")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use prople_agent_core::agent::{AutoAccept, MediatorPickupStrategy};

    use rstdev_config::format::use_toml;
    use rstdev_config::parser::from_file;
    use rstdev_config::{types::ConfigError, Builder};

    use crate::common::helpers::{self, testdb::fixture_path};

    #[test]
    fn test_parse_agent_config() -> Result<(), ConfigError> {
        let config_toml = {
            let config_builder: Result<AgentConfig, ConfigError> =
                Builder::new(from_file(fixture_path("config_agent.toml")))
                    .fetch()?
                    .parse(use_toml);

            config_builder
        };

        assert!(!config_toml.is_err());

        let agent = config_toml.unwrap();
        assert_eq!(agent.label, "faber".to_string());
        assert_eq!(agent.endpoints, vec!["http://localhost:8181".to_string()]);
        assert_eq!(agent.auto_accept_credentials, AutoAccept::ContentApproved);
        assert_eq!(agent.mediator_pickup_strategy, MediatorPickupStrategy::Polling);
        assert_eq!(agent.mediator_polling_interval_ms, 1000);
        assert!(helpers::validate(agent).is_ok());
        Ok(())
    }

    #[test]
    fn test_agent_validation_failed() {
        let agent = AgentConfig {
            label: "".to_string(),
            ..Default::default()
        };

        let validation = helpers::validate(agent);
        assert!(matches!(
            validation.unwrap_err(),
            CommonError::ValidationError(msg) if msg == "config: agent:label is missing"
        ))
    }
}
