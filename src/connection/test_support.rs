//! In-memory WebSocket pairs for tests that need a live [`Connection`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tungstenite::protocol::Role;

use super::Connection;

pub(crate) type Peer = WebSocketStream<DuplexStream>;

/// Returns a server-side connection and the client end talking to it.
pub(crate) async fn pair() -> (Arc<Connection>, Peer) {
    pair_with_timeout(Duration::from_secs(1)).await
}

pub(crate) async fn pair_with_timeout(write_timeout: Duration) -> (Arc<Connection>, Peer) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (Arc::new(Connection::new(server, write_timeout)), client)
}
