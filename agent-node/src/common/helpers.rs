use super::types::{CommonError, ToValidate};

pub fn validate(validator: impl ToValidate) -> Result<(), CommonError> {
    validator.validate()
}

#[cfg(test)]
pub mod testdb {
    use once_cell::sync::OnceCell;
    use std::env;
    use std::path::PathBuf;

    use crate::config::Parser as ConfigParser;
    use crate::storage::{Builder as StorageBuilder, RocksStorage};

    pub fn fixture_path(name: &str) -> String {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("src/config/fixtures");
        format!("{}/{}", path.display(), name)
    }

    /// `global_storage` opens the fixture database once per test binary, rocksdb only allows
    /// one handle per path
    pub fn global_storage() -> &'static RocksStorage {
        static INSTANCE: OnceCell<RocksStorage> = OnceCell::new();
        INSTANCE.get_or_init(|| {
            let config = ConfigParser::new(fixture_path("config.toml"))
                .parse()
                .unwrap();

            StorageBuilder::new(config)
                .build(|opts| {
                    let agent_db = opts.db().agent.clone();
                    (agent_db.get_common(), agent_db.get_db_options())
                })
                .unwrap()
        })
    }
}
