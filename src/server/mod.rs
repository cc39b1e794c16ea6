//! One server instance: a registry shared by the WebSocket listener, the
//! ingress handler and the push/drop API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{self, PushAuthorizer, TokenAuthorizer};
use crate::config::Settings;
use crate::fanout::{FanOut, PushReport};
use crate::registry::Registry;
use crate::transport::http::{AdminState, build_router, start_admin_server};
use crate::transport::websocket::start_websocket_server;
use crate::transport::Ingress;
use crate::utils::Result;

pub struct Server {
    settings: Settings,
    fanout: FanOut,
    token_authorizer: Arc<dyn TokenAuthorizer>,
    push_authorizer: Arc<dyn PushAuthorizer>,
}

impl Server {
    /// Creates a server whose authorizers follow `settings`.
    pub fn new(settings: Settings) -> Self {
        let token_authorizer = Arc::from(auth::token_authorizer_from(&settings));
        let push_authorizer = Arc::from(auth::push_authorizer_from(&settings));
        Self {
            settings,
            fanout: FanOut::new(Arc::new(Registry::new())),
            token_authorizer,
            push_authorizer,
        }
    }

    /// Replaces the register-token check.
    pub fn with_token_authorizer(mut self, authorizer: impl TokenAuthorizer + 'static) -> Self {
        self.token_authorizer = Arc::new(authorizer);
        self
    }

    /// Replaces the push/drop request check.
    pub fn with_push_authorizer(mut self, authorizer: impl PushAuthorizer + 'static) -> Self {
        self.push_authorizer = Arc::new(authorizer);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.fanout.registry()
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    pub async fn push(&self, identity: &str, topic: &str, message: &str) -> Result<usize> {
        self.fanout.push(identity, topic, message).await
    }

    pub async fn push_report(
        &self,
        identity: &str,
        topic: &str,
        message: &str,
    ) -> Result<PushReport> {
        self.fanout.push_report(identity, topic, message).await
    }

    pub async fn drop(&self, identity: &str, topic: &str) -> Result<usize> {
        self.fanout.drop(identity, topic).await
    }

    /// Binds both listeners and starts serving in the background.
    ///
    /// Failing to bind is the only error; everything after that is isolated
    /// per connection or per request.
    pub async fn start(self) -> std::io::Result<ServerHandle> {
        let server = &self.settings.server;
        let ws_listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        let admin_listener = TcpListener::bind((server.host.as_str(), server.admin_port)).await?;
        let ws_addr = ws_listener.local_addr()?;
        let admin_addr = admin_listener.local_addr()?;

        let ingress = Arc::new(Ingress::new(
            self.fanout.registry().clone(),
            self.token_authorizer.clone(),
        ));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let ws_task = tokio::spawn(start_websocket_server(
            ws_listener,
            server.ws_path.clone(),
            self.settings.connection.clone(),
            ingress,
            shutdown_rx,
        ));

        let router = build_router(
            AdminState {
                fanout: self.fanout.clone(),
                authorizer: self.push_authorizer.clone(),
            },
            &server.push_path,
            &server.drop_path,
        );
        let admin_task = tokio::spawn(start_admin_server(admin_listener, router));

        info!(%ws_addr, %admin_addr, "server started");
        Ok(ServerHandle {
            ws_addr,
            admin_addr,
            fanout: self.fanout,
            drain_timeout: self.settings.connection.write_timeout() * 2,
            shutdown,
            ws_task,
            admin_task,
        })
    }
}

/// Handle returned by [`Server::start`]; keeps the listener tasks alive.
pub struct ServerHandle {
    pub ws_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    fanout: FanOut,
    drain_timeout: Duration,
    shutdown: watch::Sender<bool>,
    ws_task: JoinHandle<()>,
    admin_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn registry(&self) -> &Arc<Registry> {
        self.fanout.registry()
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    /// Resolves when either listener task stops.
    pub async fn wait(&mut self) {
        tokio::select! {
            _ = &mut self.ws_task => {}
            _ = &mut self.admin_task => {}
        }
    }

    /// Stops accepting connections and requests, then closes every open
    /// WebSocket connection, including those that never registered.
    pub async fn shutdown(mut self) {
        self.admin_task.abort();
        self.shutdown.send_replace(true);

        if !self.ws_task.is_finished() {
            match tokio::time::timeout(self.drain_timeout, &mut self.ws_task).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("connections did not close in time");
                    self.ws_task.abort();
                }
            }
        }

        // anything bound outside the listener
        for identity in self.fanout.registry().identities() {
            if let Err(e) = self.fanout.drop(&identity, "").await {
                debug!(%identity, error = %e, "drop on shutdown failed");
            }
        }
        info!("server stopped");
    }
}
