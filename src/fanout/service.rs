use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::registry::Registry;
use crate::utils::{Error, Result};

/// Outcome of a push, for callers that need more than the delivered count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Connections in the registry snapshot.
    pub matched: usize,
    /// Connections that accepted the write.
    pub delivered: usize,
    /// Connections evicted because their write failed.
    pub evicted: usize,
}

/// Push and drop over a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct FanOut {
    registry: Arc<Registry>,
}

impl FanOut {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Writes `payload` to every connection bound to `identity` for `topic`
    /// and returns how many accepted it.
    ///
    /// Zero subscribers and all-writes-failed both return `Ok(0)`; use
    /// [`push_report`](FanOut::push_report) to tell them apart.
    pub async fn push(&self, identity: &str, topic: &str, payload: &str) -> Result<usize> {
        self.push_report(identity, topic, payload)
            .await
            .map(|report| report.delivered)
    }

    pub async fn push_report(
        &self,
        identity: &str,
        topic: &str,
        payload: &str,
    ) -> Result<PushReport> {
        if identity.is_empty() || topic.is_empty() || payload.is_empty() {
            return Err(Error::invalid_argument(
                "parameters (identity, topic, message) can't be empty",
            ));
        }

        let conns = self.registry.filter_connections(identity, topic)?;
        let mut report = PushReport {
            matched: conns.len(),
            ..PushReport::default()
        };

        for conn in &conns {
            match conn.write(payload).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!(%identity, %topic, conn_id = %conn.id(), error = %e, "write failed, evicting");
                    self.evict(conn).await;
                    report.evicted += 1;
                }
            }
        }

        debug!(
            %identity,
            %topic,
            matched = report.matched,
            delivered = report.delivered,
            "pushed"
        );
        Ok(report)
    }

    /// Unbinds and closes every connection bound to `identity` (for `topic`,
    /// unless it is empty). Returns how many connections this call closed.
    pub async fn drop(&self, identity: &str, topic: &str) -> Result<usize> {
        let conns = self.registry.filter_connections(identity, topic)?;

        let mut seen = HashSet::new();
        let mut dropped = 0;
        for conn in conns.iter().filter(|c| seen.insert(c.id().clone())) {
            if let Err(e) = self.registry.unbind(conn) {
                debug!(conn_id = %conn.id(), error = %e, "conn unbind fail");
                continue;
            }
            match conn.close().await {
                Ok(()) => dropped += 1,
                Err(e) => debug!(conn_id = %conn.id(), error = %e, "conn close fail"),
            }
        }

        debug!(%identity, %topic, dropped, "dropped");
        Ok(dropped)
    }

    /// Removes a connection whose write failed.
    async fn evict(&self, conn: &Connection) {
        if let Err(e) = self.registry.unbind(conn) {
            debug!(conn_id = %conn.id(), error = %e, "evicted conn was already unbound");
        }
        if let Err(e) = conn.close().await {
            debug!(conn_id = %conn.id(), error = %e, "evicted conn was already closed");
        }
    }
}
