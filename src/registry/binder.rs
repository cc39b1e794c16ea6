use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::connection::{ConnId, Connection};
use crate::registry::binding::Binding;
use crate::utils::{Error, Result};

/// Concurrency-safe mapping between subscriber identities and connections.
///
/// Mutations take the write lock for their whole duration. Lookups take the
/// read lock only long enough to copy what they return, so callers can write
/// to the returned connections without holding any registry lock.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    /// identity -> bindings
    pub(crate) by_identity: HashMap<String, Vec<Binding>>,
    /// connection id -> identity
    pub(crate) by_connection: HashMap<ConnId, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `conn` under `identity` for `topic`.
    ///
    /// Rebinding an existing triple is a no-op. A connection can only be
    /// bound under one identity at a time, and a closed one not at all.
    pub fn bind(&self, identity: &str, topic: &str, conn: &Arc<Connection>) -> Result<()> {
        if identity.is_empty() {
            return Err(Error::invalid_argument("identity can't be empty"));
        }
        if topic.is_empty() {
            return Err(Error::invalid_argument("topic can't be empty"));
        }

        let mut guard = self.tables.write();
        let tables = &mut *guard;

        if !conn.is_open() {
            return Err(Error::ConnectionClosed);
        }
        if let Some(owner) = tables.by_connection.get(conn.id()) {
            if owner != identity {
                return Err(Error::invalid_argument(format!(
                    "conn {} is already bound to another identity",
                    conn.id()
                )));
            }
        }

        let bindings = tables.by_identity.entry(identity.to_string()).or_default();
        if bindings.iter().any(|b| b.topic == topic && b.is_for(conn)) {
            return Ok(());
        }
        bindings.push(Binding::new(topic, conn.clone()));
        tables
            .by_connection
            .insert(conn.id().clone(), identity.to_string());

        debug!(%identity, %topic, conn_id = %conn.id(), "bound");
        Ok(())
    }

    /// Removes every binding that references `conn`.
    ///
    /// The connection itself is left untouched; callers pair this with
    /// [`Connection::close`].
    pub fn unbind(&self, conn: &Connection) -> Result<()> {
        let mut guard = self.tables.write();
        let tables = &mut *guard;

        let Some(identity) = tables.by_connection.get(conn.id()).cloned() else {
            return Err(Error::not_found(format!(
                "can't find identity by conn id: {}",
                conn.id()
            )));
        };

        let Some(bindings) = tables.by_identity.get_mut(&identity) else {
            return Err(Error::not_found(format!(
                "can't find bindings of identity: {identity}"
            )));
        };

        let before = bindings.len();
        bindings.retain(|b| !b.is_for(conn));
        let removed = before - bindings.len();
        if removed == 0 {
            return Err(Error::not_found(format!(
                "can't find the conn of id: {}",
                conn.id()
            )));
        }

        // delete the identity once its last binding is gone
        if bindings.is_empty() {
            tables.by_identity.remove(&identity);
        }
        tables.by_connection.remove(conn.id());

        debug!(%identity, conn_id = %conn.id(), removed, "unbound");
        Ok(())
    }

    /// Returns the connections bound under `identity`, restricted to `topic`
    /// unless it is empty.
    ///
    /// A connection bound to several topics appears once per binding when
    /// `topic` is empty.
    pub fn filter_connections(&self, identity: &str, topic: &str) -> Result<Vec<Arc<Connection>>> {
        if identity.is_empty() {
            return Err(Error::invalid_argument("identity can't be empty"));
        }

        let tables = self.tables.read();
        let conns: Vec<Arc<Connection>> = tables
            .by_identity
            .get(identity)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|b| b.matches(topic))
                    .map(|b| b.conn.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(conns)
    }

    /// Looks up a bound connection by id.
    pub fn find_connection(&self, conn_id: &str) -> Option<Arc<Connection>> {
        let tables = self.tables.read();

        if let Some(identity) = tables.by_connection.get(conn_id) {
            let found = tables.by_identity.get(identity).and_then(|bindings| {
                bindings
                    .iter()
                    .find(|b| b.conn.id().as_str() == conn_id)
                    .map(|b| b.conn.clone())
            });
            if found.is_some() {
                return found;
            }
        }

        let found = tables
            .by_identity
            .values()
            .flatten()
            .find(|b| b.conn.id().as_str() == conn_id)
            .map(|b| b.conn.clone());
        if found.is_some() {
            warn!(%conn_id, "reverse index is stale, connection found by full scan");
        }
        found
    }

    /// Identity the connection is bound under, if any.
    pub fn identity_of(&self, conn_id: &str) -> Option<String> {
        self.tables.read().by_connection.get(conn_id).cloned()
    }

    /// Snapshot of every identity with at least one binding.
    pub fn identities(&self) -> Vec<String> {
        self.tables.read().by_identity.keys().cloned().collect()
    }

    pub fn identity_count(&self) -> usize {
        self.tables.read().by_identity.len()
    }

    /// Number of distinct bound connections.
    pub fn connection_count(&self) -> usize {
        self.tables.read().by_connection.len()
    }

    pub fn binding_count(&self) -> usize {
        self.tables.read().by_identity.values().map(Vec::len).sum()
    }
}
