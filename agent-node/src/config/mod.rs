mod app;
pub use app::App;

mod database;
pub use database::{AgentDatabase, Database, RocksDBCommon, RocksDBOptions};

mod agent;

mod config;
pub use config::Config;

mod parser;
pub use parser::Parser;
