use rst_common::with_errors::thiserror::{self, Error};

use prople_agent_core::storage::StorageError;

#[derive(Error, PartialEq, Debug)]
pub enum DbError {
    #[error("db error: {0}")]
    InstanceError(String),

    #[error("bucket error: {0}")]
    BucketError(String),
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::BucketError(msg) => StorageError::SerializeError(msg),
            DbError::InstanceError(msg) => StorageError::BackendError(msg),
        }
    }
}

pub enum Instruction {
    SaveCf { key: String, value: Vec<u8> },
    GetCf { key: String },
    MultiGetCf { keys: Vec<String> },
    RemoveCf { key: String },
}

#[derive(Debug)]
pub enum OutputOpts {
    SingleByte {
        value: Option<Vec<u8>>,
    },
    MultiBytes {
        values: Vec<Result<Option<Vec<u8>>, DbError>>,
    },
    None,
}
