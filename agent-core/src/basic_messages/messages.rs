use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};

use crate::messaging::MessageBody;

pub const BASIC_MESSAGE: &str = "https://didcomm.org/basicmessage/1.0/message";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct BasicMessage {
    pub content: String,
    pub sent_time: DateTime<Utc>,
}

impl BasicMessage {
    pub fn new(content: String) -> Self {
        Self {
            content,
            sent_time: Utc::now(),
        }
    }
}

impl MessageBody for BasicMessage {
    const TYPE: &'static str = BASIC_MESSAGE;
}
