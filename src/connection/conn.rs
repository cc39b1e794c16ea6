use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, warn};
use tungstenite::Error as WsError;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::{Error, Result};

type WsSink = Pin<Box<dyn Sink<WsMessage, Error = WsError> + Send>>;
type WsSource = Pin<Box<dyn Stream<Item = std::result::Result<WsMessage, WsError>> + Send>>;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Unique connection identifier, assigned once at construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(String);

impl ConnId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for ConnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Open,
    Closing,
    Closed,
}

impl ConnState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            OPEN => ConnState::Open,
            CLOSING => ConnState::Closing,
            _ => ConnState::Closed,
        }
    }
}

/// Callbacks invoked by [`Connection::listen`].
///
/// `on_message` runs for every text or binary frame. `on_close` runs at most
/// once, when the peer closes the stream or a read fails; it is not called
/// when the server itself closed the connection.
pub trait ConnHandler: Send + Sync {
    fn on_message(&self, conn: &Arc<Connection>, payload: &[u8]);
    fn on_close(&self, conn: &Arc<Connection>);
}

/// One upgraded WebSocket stream.
pub struct Connection {
    id: ConnId,
    state: AtomicU8,
    sink: AsyncMutex<Option<WsSink>>,
    source: Mutex<Option<WsSource>>,
    shutdown: watch::Sender<bool>,
    write_timeout: Duration,
}

impl Connection {
    /// Wraps an already-upgraded stream. Writes that take longer than
    /// `write_timeout` fail with [`Error::Timeout`].
    pub fn new<S>(stream: S, write_timeout: Duration) -> Self
    where
        S: Stream<Item = std::result::Result<WsMessage, WsError>>
            + Sink<WsMessage, Error = WsError>
            + Send
            + 'static,
    {
        let (sink, source) = stream.split();
        let sink: WsSink = Box::pin(sink);
        let source: WsSource = Box::pin(source);
        let (shutdown, _) = watch::channel(false);
        Self {
            id: ConnId::generate(),
            state: AtomicU8::new(OPEN),
            sink: AsyncMutex::new(Some(sink)),
            source: Mutex::new(Some(source)),
            shutdown,
            write_timeout,
        }
    }

    pub fn id(&self) -> &ConnId {
        &self.id
    }

    pub fn state(&self) -> ConnState {
        ConnState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnState::Open
    }

    /// Sends `payload` as a single text message and returns its length.
    pub async fn write(&self, payload: &str) -> Result<usize> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let mut guard = self.sink.lock().await;
        // close() may have won the race for the sink while we waited
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        let sink = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        let message = WsMessage::text(payload.to_owned());
        match tokio::time::timeout(self.write_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(payload.len()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout(self.write_timeout)),
        }
    }

    /// Closes the connection exactly once.
    ///
    /// Stops the read loop, sends a close frame and releases the stream.
    /// Every call after the first returns [`Error::AlreadyClosed`].
    pub async fn close(&self) -> Result<()> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == CLOSED {
                return Err(Error::AlreadyClosed);
            }
            match self.state.compare_exchange(
                current,
                CLOSED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.shutdown.send_replace(true);
        // listen() never started; nothing else will drop the read half
        drop(self.source.lock().take());

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match tokio::time::timeout(self.write_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "close frame not delivered"),
                Err(_) => debug!(conn_id = %self.id, "close frame timed out"),
            }
        }
        Ok(())
    }

    /// Reads messages until the peer closes, a read fails or [`close`] is
    /// called, feeding each payload to `handler`.
    ///
    /// [`close`]: Connection::close
    pub async fn listen<H>(self: &Arc<Self>, handler: &H)
    where
        H: ConnHandler + ?Sized,
    {
        let Some(mut source) = self.source.lock().take() else {
            warn!(conn_id = %self.id, "listen called on a connection without a read half");
            return;
        };
        let mut shutdown = self.shutdown.subscribe();
        if self.state() == ConnState::Closed {
            return;
        }

        let peer_gone = loop {
            tokio::select! {
                _ = shutdown.changed() => break false,
                frame = source.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => handler.on_message(self, text.as_str().as_bytes()),
                    Some(Ok(WsMessage::Binary(data))) => handler.on_message(self, &data),
                    Some(Ok(WsMessage::Close(_))) | None => break true,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(conn_id = %self.id, error = %e, "read failed");
                        break true;
                    }
                },
            }
        };
        drop(source);

        if !peer_gone {
            return;
        }
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // the server closed it concurrently and already cleaned up
            return;
        }

        handler.on_close(self);

        if let Err(e) = self.close().await {
            debug!(conn_id = %self.id, error = %e, "connection finalized elsewhere");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
