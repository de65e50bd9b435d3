use rstdev_config::format::use_toml;
use rstdev_config::parser::from_file;
use rstdev_config::{types::ConfigError, Builder};

use super::Config;

pub struct Parser {
    conf_file: String,
}

impl Parser {
    pub fn new(conf_file: String) -> Self {
        Self { conf_file }
    }

    pub fn parse(&self) -> Result<Config, ConfigError> {
        let config: Config = Builder::new(from_file(self.conf_file.to_owned()))
            .fetch()?
            .parse(use_toml)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use prople_agent_core::agent::AutoAccept;

    use crate::common::helpers::{self, testdb::fixture_path};

    #[test]
    fn test_parse_config() {
        let parser = Parser::new(fixture_path("config.toml"));
        let config_builder = parser.parse();
        assert!(!config_builder.is_err());

        let config = config_builder.unwrap();
        let (host, port) = config.app().get_app_config();
        assert_eq!("localhost".to_string(), host);
        assert_eq!("8181".to_string(), port);

        assert_eq!(config.agent().label, "faber".to_string());
        assert_eq!(config.agent().auto_accept_proofs, AutoAccept::ContentApproved);
        assert!(config.agent().auto_accept_connections);

        let (dbpath, cfname) = config.db().agent.get_common().get();
        assert_eq!("./agent-storage-test".to_string(), dbpath);
        assert_eq!("agent-cf".to_string(), cfname);

        let db_opts = config.db().agent.get_db_options();
        assert_eq!(db_opts.get_set_wal_dir(), "./agent-storage-test-wal");
        assert!(db_opts.get_create_if_missing());
        assert!(db_opts.get_create_missing_columns());
        assert!(!db_opts.get_set_error_if_exists());

        assert!(helpers::validate(config).is_ok());
    }

    #[test]
    fn test_parse_missing_file() {
        let parser = Parser::new(fixture_path("unknown.toml"));
        assert!(parser.parse().is_err())
    }
}
