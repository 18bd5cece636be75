//! WebSocket transport backed by tokio-tungstenite.
//!
//! Every connection runs in its own task which turns socket activity into
//! `(session id, TransportEvent)` pairs on a shared channel. The handle handed
//! to the controller only queues outgoing frames and close requests, so none
//! of its methods block.

use futures_util::{SinkExt, StreamExt};
use shared::protocol::TOKEN_QUERY_PARAM;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::connection::{Connection, ConnectionFactory, TransportEvent};
use crate::error::SessionError;

/// Sender half of the transport event channel
pub type EventSender = mpsc::UnboundedSender<(Uuid, TransportEvent)>;

/// Receiver half of the transport event channel
pub type EventReceiver = mpsc::UnboundedReceiver<(Uuid, TransportEvent)>;

/// Build the execution endpoint from a server address and optional token.
///
/// `http`/`https` are mapped to `ws`/`wss`; the token is passed as a query
/// parameter.
pub fn build_endpoint(server: &str, token: Option<&str>) -> Result<Url, SessionError> {
    let mut url = Url::parse(server)
        .map_err(|e| SessionError::InvalidEndpoint(format!("{}: {}", server, e)))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(SessionError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                server, other
            )))
        }
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme).map_err(|_| {
            SessionError::InvalidEndpoint(format!("{}: cannot switch to {}", server, scheme))
        })?;
    }

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
    }

    Ok(url)
}

/// Commands from a connection handle to its task
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close,
}

/// Opens one WebSocket per session against a fixed endpoint.
pub struct WsConnectionFactory {
    endpoint: Url,
    events: EventSender,
}

impl WsConnectionFactory {
    pub fn new(endpoint: Url, events: EventSender) -> Self {
        Self { endpoint, events }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ConnectionFactory for WsConnectionFactory {
    type Connection = WsConnection;

    fn connect(&mut self, session_id: Uuid) -> Result<WsConnection, SessionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_connection(
            self.endpoint.to_string(),
            session_id,
            outgoing_rx,
            self.events.clone(),
        ));

        Ok(WsConnection {
            session_id,
            outgoing: Some(outgoing_tx),
        })
    }
}

/// Handle to a WebSocket owned by a background task.
pub struct WsConnection {
    session_id: Uuid,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
}

impl Connection for WsConnection {
    fn send(&mut self, payload: String) -> Result<(), SessionError> {
        let tx = self.outgoing.as_ref().ok_or(SessionError::ConnectionClosed)?;
        tx.send(Outgoing::Text(payload))
            .map_err(|_| SessionError::ConnectionClosed)
    }

    fn close(&mut self) {
        if let Some(tx) = self.outgoing.take() {
            debug!("Closing connection for session {}", self.session_id);
            let _ = tx.send(Outgoing::Close);
        }
    }
}

/// Connection task: connect, then pump frames both ways until either side closes.
async fn run_connection(
    url: String,
    session_id: Uuid,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: EventSender,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send((session_id, event));
    };

    info!("Connecting to {}", redact(&url));
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    error!("Failed to connect: {}", e);
                    emit(TransportEvent::Error(e.to_string()));
                    emit(TransportEvent::Close);
                    return;
                }
            },
            cmd = outgoing.recv() => match cmd {
                Some(Outgoing::Text(_)) => {
                    warn!("Dropping frame queued before the connection opened");
                }
                Some(Outgoing::Close) | None => {
                    debug!("Connection for session {} abandoned while connecting", session_id);
                    return;
                }
            },
        }
    };

    emit(TransportEvent::Open);
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => emit(TransportEvent::Message(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    emit(TransportEvent::Message(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed by server");
                    emit(TransportEvent::Close);
                    break;
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    emit(TransportEvent::Error(e.to_string()));
                    emit(TransportEvent::Close);
                    break;
                }
                Some(Ok(_)) => {}
            },
            cmd = outgoing.recv() => match cmd {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        error!("Failed to send frame: {}", e);
                        emit(TransportEvent::Error(e.to_string()));
                        emit(TransportEvent::Close);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    emit(TransportEvent::Close);
                    break;
                }
            },
        }
    }

    debug!("Connection task for session {} finished", session_id);
}

/// Strip the query string (which may carry the token) for logging.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
