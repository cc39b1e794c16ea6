use serde::{Deserialize, Serialize};

/// Sent by a subscriber after connecting, and again to add topics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisterMessage {
    pub token: String,
    #[serde(alias = "event")]
    pub topic: String,
}

/// Body of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushMessage {
    #[serde(alias = "userId")]
    pub identity: String,
    #[serde(alias = "event")]
    pub topic: String,
    pub message: String,
}

impl PushMessage {
    pub fn is_complete(&self) -> bool {
        !self.identity.is_empty() && !self.topic.is_empty() && !self.message.is_empty()
    }
}

/// Body of a drop request. An absent or empty topic drops every topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DropMessage {
    #[serde(alias = "userId")]
    pub identity: String,
    #[serde(default, alias = "event")]
    pub topic: String,
}
