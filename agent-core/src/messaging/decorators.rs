use rst_common::standard::serde::{self, Deserialize, Serialize};

/// `ThreadDecorator` is the `~thread` decorator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(crate = "self::serde")]
pub struct ThreadDecorator {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pthid: Option<String>,
}

/// `ServiceDecorator` is the `~service` decorator, a reply channel used by
/// connection-less exchanges
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct ServiceDecorator {
    #[serde(rename = "recipientKeys")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "routingKeys", default)]
    pub routing_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(crate = "self::serde")]
#[serde(rename_all = "lowercase")]
pub enum ReturnRoute {
    None,
    All,
    Thread,
}

/// `TransportDecorator` is the `~transport` decorator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "self::serde")]
pub struct TransportDecorator {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub return_route: Option<ReturnRoute>,
}
