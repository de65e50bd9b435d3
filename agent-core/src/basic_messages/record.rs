use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

use crate::storage::{Record, TagValue, Tags};

use super::messages::BasicMessage;
use super::types::BasicMessageRole;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct BasicMessageRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub connection_id: String,
    pub role: BasicMessageRole,
    pub content: String,
    pub sent_time: DateTime<Utc>,

    #[serde(default)]
    version: u64,
}

impl BasicMessageRecord {
    pub fn new(connection_id: String, role: BasicMessageRole, message: &BasicMessage) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            connection_id,
            role,
            content: message.content.to_owned(),
            sent_time: message.sent_time,
            version: 0,
        }
    }
}

impl Record for BasicMessageRecord {
    fn record_type() -> &'static str {
        "BasicMessageRecord"
    }

    fn get_id(&self) -> String {
        self.id.to_owned()
    }

    fn get_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(
            "connectionId".to_string(),
            TagValue::from(self.connection_id.to_owned()),
        );
        tags.insert("role".to_string(), TagValue::from(self.role.to_string()));
        tags
    }

    fn get_version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version
    }
}
