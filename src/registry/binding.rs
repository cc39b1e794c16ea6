use std::sync::Arc;

use crate::connection::Connection;

/// One `(topic, connection)` entry under a subscriber identity.
#[derive(Debug, Clone)]
pub struct Binding {
    pub topic: String,
    pub conn: Arc<Connection>,
}

impl Binding {
    pub fn new(topic: &str, conn: Arc<Connection>) -> Self {
        Self {
            topic: topic.to_string(),
            conn,
        }
    }

    /// Matches `topic` exactly, or any topic when `topic` is empty.
    pub fn matches(&self, topic: &str) -> bool {
        topic.is_empty() || self.topic == topic
    }

    pub fn is_for(&self, conn: &Connection) -> bool {
        self.conn.id() == conn.id()
    }
}
