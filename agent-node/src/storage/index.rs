use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::types::DbError;

/// `RecordIndex` keeps the ids of one record type in insertion order
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(crate = "self::serde")]
pub struct RecordIndex {
    ids: Vec<String>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: String) {
        if !self.ids.contains(&id) {
            self.ids.push(id)
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|val| val != id)
    }

    pub fn ids(&self) -> &Vec<String> {
        &self.ids
    }
}

impl TryInto<Vec<u8>> for RecordIndex {
    type Error = DbError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| DbError::BucketError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for RecordIndex {
    type Error = DbError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&value).map_err(|err| DbError::BucketError(err.to_string()))
    }
}

impl ToJSON for RecordIndex {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(&self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}
