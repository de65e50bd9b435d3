use rst_common::standard::serde::de::DeserializeOwned;
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json::{self, Map, Value};
use rst_common::standard::uuid::Uuid;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::decorators::{ReturnRoute, ServiceDecorator, ThreadDecorator, TransportDecorator};
use super::message_type::MessageType;
use super::types::MessageError;

/// `MessageBody` is implemented by every typed protocol message
///
/// `validate` returns all failed rules at once, an empty list means the body is valid
pub trait MessageBody: Serialize + DeserializeOwned + Clone + Send + Sync {
    const TYPE: &'static str;

    fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

/// `AgentMessage` is the plaintext DIDComm envelope
///
/// Protocol specific fields are kept in `body`, decorators are kept as typed fields
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct AgentMessage {
    #[serde(rename = "@id")]
    id: String,

    #[serde(rename = "@type")]
    message_type: String,

    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none", default)]
    thread: Option<ThreadDecorator>,

    #[serde(rename = "~service", skip_serializing_if = "Option::is_none", default)]
    service: Option<ServiceDecorator>,

    #[serde(rename = "~transport", skip_serializing_if = "Option::is_none", default)]
    transport: Option<TransportDecorator>,

    #[serde(flatten)]
    body: Map<String, Value>,
}

impl AgentMessage {
    pub fn new<T: MessageBody>(body: &T) -> Result<Self, MessageError> {
        Self::from_body(T::TYPE, body)
    }

    /// `from_body` is used when one body shape is shared by several message types,
    /// like the protocol specific problem reports
    pub fn from_body(message_type: &str, body: &impl Serialize) -> Result<Self, MessageError> {
        let value =
            serde_json::to_value(body).map_err(|err| MessageError::JSONError(err.to_string()))?;

        let body = match value {
            Value::Object(map) => map,
            _ => {
                return Err(MessageError::JSONError(
                    "message body must be a json object".to_string(),
                ))
            }
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.to_string(),
            thread: None,
            service: None,
            transport: None,
            body,
        })
    }

    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let message: AgentMessage =
            serde_json::from_value(value).map_err(|err| MessageError::JSONError(err.to_string()))?;

        if message.id.is_empty() {
            return Err(MessageError::ValidationError(vec![
                "@id was missing".to_string()
            ]));
        }

        Ok(message)
    }

    pub fn to_value(&self) -> Result<Value, MessageError> {
        serde_json::to_value(self).map_err(|err| MessageError::JSONError(err.to_string()))
    }

    pub fn with_thread_id(mut self, thread_id: &str) -> Self {
        let mut thread = self.thread.unwrap_or_default();
        thread.thid = Some(thread_id.to_string());
        self.thread = Some(thread);
        self
    }

    pub fn with_parent_thread_id(mut self, parent_thread_id: &str) -> Self {
        let mut thread = self.thread.unwrap_or_default();
        thread.pthid = Some(parent_thread_id.to_string());
        self.thread = Some(thread);
        self
    }

    pub fn with_service(mut self, service: ServiceDecorator) -> Self {
        self.service = Some(service);
        self
    }

    pub fn set_service(&mut self, service: Option<ServiceDecorator>) {
        self.service = service
    }

    pub fn with_return_route(mut self, return_route: ReturnRoute) -> Self {
        self.transport = Some(TransportDecorator {
            return_route: Some(return_route),
        });
        self
    }

    pub fn get_id(&self) -> String {
        self.id.to_owned()
    }

    pub fn get_type(&self) -> String {
        self.message_type.to_owned()
    }

    pub fn message_type(&self) -> Result<MessageType, MessageError> {
        MessageType::parse(&self.message_type)
    }

    /// `thread_id` falls back to the message id, the first message of a thread opens it
    pub fn thread_id(&self) -> String {
        self.thread
            .as_ref()
            .and_then(|thread| thread.thid.to_owned())
            .unwrap_or_else(|| self.id.to_owned())
    }

    pub fn parent_thread_id(&self) -> Option<String> {
        self.thread.as_ref().and_then(|thread| thread.pthid.to_owned())
    }

    pub fn get_service(&self) -> Option<ServiceDecorator> {
        self.service.to_owned()
    }

    pub fn has_return_route(&self) -> bool {
        self.transport
            .as_ref()
            .and_then(|transport| transport.return_route)
            .map(|route| route != ReturnRoute::None)
            .unwrap_or(false)
    }

    /// `decode` parses and validates the typed body
    pub fn decode<T: MessageBody>(&self) -> Result<T, MessageError> {
        let body: T = self.decode_as()?;
        let errors = body.validate();
        if !errors.is_empty() {
            return Err(MessageError::ValidationError(errors));
        }

        Ok(body)
    }

    /// `decode_as` parses the body without running its validation rules
    pub fn decode_as<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|err| MessageError::JSONError(err.to_string()))
    }
}

impl ToJSON for AgentMessage {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rst_common::standard::serde_json::json;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    #[serde(crate = "self::serde")]
    struct FakeBody {
        content: String,
        #[serde(default)]
        count: u32,
    }

    impl MessageBody for FakeBody {
        const TYPE: &'static str = "https://didcomm.org/fake-protocol/1.0/message";

        fn validate(&self) -> Vec<String> {
            let mut errors = Vec::new();
            if self.content.is_empty() {
                errors.push("content was missing".to_string());
            }

            if self.count == 0 {
                errors.push("count was missing".to_string());
            }

            errors
        }
    }

    #[test]
    fn test_serialize_envelope() {
        let body = FakeBody {
            content: "hello".to_string(),
            count: 1,
        };

        let message = AgentMessage::new(&body)
            .unwrap()
            .with_thread_id("thread-1")
            .with_return_route(ReturnRoute::All);

        let value = message.to_value().unwrap();
        assert_eq!(value["@type"], json!(FakeBody::TYPE));
        assert_eq!(value["~thread"]["thid"], json!("thread-1"));
        assert_eq!(value["~transport"]["return_route"], json!("all"));
        assert_eq!(value["content"], json!("hello"));
        assert!(value.get("~service").is_none());
    }

    #[test]
    fn test_to_json() {
        let message = AgentMessage::new(&FakeBody {
            content: "hello".to_string(),
            count: 0,
        })
        .unwrap();

        let json = message.to_json();
        assert!(!json.is_err());

        let decoded = AgentMessage::from_value(serde_json::from_str(&json.unwrap()).unwrap());
        assert_eq!(decoded.unwrap(), message);
    }

    #[test]
    fn test_thread_id_fallback() {
        let body = FakeBody {
            content: "hello".to_string(),
            count: 1,
        };

        let message = AgentMessage::new(&body).unwrap();
        assert_eq!(message.thread_id(), message.get_id());
        assert!(!message.has_return_route());

        let threaded = message.clone().with_thread_id("thread-1");
        assert_eq!(threaded.thread_id(), "thread-1".to_string());
    }

    #[test]
    fn test_decode_collects_validation_errors() {
        let value = json!({
            "@id": "1",
            "@type": FakeBody::TYPE,
            "content": "",
        });

        let message = AgentMessage::from_value(value).unwrap();
        let decoded = message.decode::<FakeBody>();

        match decoded.unwrap_err() {
            MessageError::ValidationError(errors) => {
                assert_eq!(
                    errors,
                    vec!["content was missing".to_string(), "count was missing".to_string()]
                )
            }
            _ => panic!("unexpected error"),
        }

        let raw = message.decode_as::<FakeBody>();
        assert!(!raw.is_err());
    }

    #[test]
    fn test_from_value_missing_id() {
        let value = json!({
            "@type": FakeBody::TYPE,
            "content": "hello",
        });

        let message = AgentMessage::from_value(value);
        assert!(matches!(message.unwrap_err(), MessageError::JSONError(_)))
    }

    #[test]
    fn test_from_body_rejects_non_object() {
        let message = AgentMessage::from_body(FakeBody::TYPE, &json!("plain"));
        assert!(matches!(message.unwrap_err(), MessageError::JSONError(_)))
    }
}
