//! WebSocket listener
//!
//! Accepts TCP connections, performs the upgrade on the configured path and
//! runs each resulting [`Connection`] on its own task under the [`Ingress`]
//! handler. A failed handshake only affects its own socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_hdr_async_with_config;
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::WebSocketConfig;

use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::transport::Ingress;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` flips to `true`.
///
/// On shutdown every connection still served by this listener is closed,
/// registered or not, and the function returns once their tasks are done.
pub async fn start_websocket_server(
    listener: TcpListener,
    ws_path: String,
    settings: ConnectionSettings,
    ingress: Arc<Ingress>,
    mut shutdown: watch::Receiver<bool>,
) {
    match listener.local_addr() {
        Ok(addr) => info!("WebSocket server listening on ws://{addr}{ws_path}"),
        Err(e) => warn!(error = %e, "WebSocket server listening on unknown address"),
    }

    let mut tasks = JoinSet::new();
    loop {
        let (stream, peer) = tokio::select! {
            Ok(()) = shutdown.changed() => break,
            Some(_) = tasks.join_next(), if !tasks.is_empty() => continue,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let ws_path = ws_path.clone();
        let settings = settings.clone();
        let ingress = ingress.clone();
        let mut shutdown = shutdown.clone();

        tasks.spawn(async move {
            let upgraded = tokio::select! {
                biased;
                upgraded = upgrade(stream, &ws_path, &settings) => upgraded,
                Ok(()) = shutdown.changed() => return,
            };
            let conn = match upgraded {
                Ok(conn) => Arc::new(conn),
                Err(e) => {
                    debug!(%peer, error = %e, "WebSocket handshake error");
                    return;
                }
            };

            let serve = ingress.serve(conn.clone());
            tokio::pin!(serve);
            tokio::select! {
                _ = &mut serve => return,
                Ok(()) = shutdown.changed() => {}
            }
            if let Err(e) = conn.close().await {
                debug!(conn_id = %conn.id(), error = %e, "close on shutdown");
            }
            serve.await;
        });
    }

    drop(listener);
    let open = tasks.len();
    while tasks.join_next().await.is_some() {}
    info!(connections = open, "WebSocket server stopped");
}

async fn upgrade(
    stream: TcpStream,
    ws_path: &str,
    settings: &ConnectionSettings,
) -> Result<Connection, tungstenite::Error> {
    let config = WebSocketConfig::default()
        .max_message_size(Some(settings.max_message_bytes))
        .max_frame_size(Some(settings.max_message_bytes));

    let expected = ws_path.to_string();
    let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if expected.is_empty() || req.uri().path() == expected {
            Ok(resp)
        } else {
            let mut refused = ErrorResponse::new(Some("not found".to_string()));
            *refused.status_mut() = StatusCode::NOT_FOUND;
            Err(refused)
        }
    };

    let ws_stream = accept_hdr_async_with_config(stream, check_path, Some(config)).await?;
    Ok(Connection::new(ws_stream, settings.write_timeout()))
}
