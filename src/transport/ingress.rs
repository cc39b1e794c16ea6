use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::TokenAuthorizer;
use crate::connection::{ConnHandler, Connection};
use crate::registry::Registry;
use crate::transport::message::RegisterMessage;
use crate::utils::Error;

/// Bridges freshly upgraded connections into the registry.
///
/// Every inbound message is tried as a [`RegisterMessage`]; anything that is
/// not one, or whose token is rejected, is ignored and the connection stays
/// open.
pub struct Ingress {
    registry: Arc<Registry>,
    authorizer: Arc<dyn TokenAuthorizer>,
}

impl Ingress {
    pub fn new(registry: Arc<Registry>, authorizer: Arc<dyn TokenAuthorizer>) -> Self {
        Self {
            registry,
            authorizer,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs the connection's read loop until it ends, then removes whatever
    /// is still bound to it.
    ///
    /// A register frame read while a server-side close is in progress can
    /// bind the connection after the closer unbound it, so the final unbind
    /// runs however the loop ended.
    pub async fn serve(&self, conn: Arc<Connection>) {
        info!(conn_id = %conn.id(), "connection opened");
        conn.listen(self).await;
        self.release(&conn);
        info!(conn_id = %conn.id(), "connection finished");
    }

    fn release(&self, conn: &Connection) {
        match self.registry.unbind(conn) {
            Ok(()) => {}
            // never registered, or already released
            Err(Error::NotFound(msg)) => debug!(conn_id = %conn.id(), %msg, "unbind on close"),
            Err(e) => warn!(conn_id = %conn.id(), error = %e, "unbind on close failed"),
        }
    }
}

impl ConnHandler for Ingress {
    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]) {
        let register: RegisterMessage = match serde_json::from_slice(payload) {
            Ok(register) => register,
            Err(err) => {
                debug!(conn_id = %conn.id(), error = %err, "ignoring non-register message");
                return;
            }
        };

        let Some(identity) = self.authorizer.authorize(&register.token) else {
            debug!(conn_id = %conn.id(), "register token rejected");
            return;
        };

        match self.registry.bind(&identity, &register.topic, conn) {
            Ok(()) => info!(conn_id = %conn.id(), %identity, topic = %register.topic, "registered"),
            Err(e) if e.is_closed() => debug!(conn_id = %conn.id(), %identity, "register after close ignored"),
            Err(e) => warn!(conn_id = %conn.id(), %identity, error = %e, "register failed"),
        }
    }

    fn on_close(&self, conn: &Arc<Connection>) {
        self.release(conn);
    }
}
