//! Websocket transport in front of the hub.
//!
//! Two endpoints, routed on the handshake path:
//!
//! - `/play?name=<name>&color=<color>` — one connection per player. Inbound
//!   text frames carry JSON [`ActionMessage`]s; outbound frames carry JSON
//!   snapshots. Each connection runs two tasks: an inbound relay feeding the
//!   hub and an outbound pump draining the session mailbox plus a periodic
//!   ping keepalive.
//! - `/control?secret=<secret>` — admin connection gated by the shared
//!   secret; carries JSON [`ControlRequest`]s that start and stop the game.
//!
//! Everything here is replaceable glue: the hub and game never see a socket.

use crate::hub::HubHandle;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ActionMessage, ControlRequest, StateSnapshot};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

/// Period allowed for writing one frame to a socket.
const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Period between keepalive pings.
const PING_PERIOD: Duration = Duration::from_secs(60);

/// Period allowed between inbound frames; any frame (pong included)
/// extends the deadline.
const READ_WAIT: Duration = Duration::from_secs(65);

/// Accepts websocket connections and hands them to the hub.
pub struct NetworkServer {
    listener: TcpListener,
    secret: String,
}

impl NetworkServer {
    pub async fn bind(addr: &str, secret: String) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, secret })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub async fn run(self, hub: HubHandle) -> Result<(), std::io::Error> {
        info!("listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tokio::spawn(handle_connection(
                stream,
                peer,
                hub.clone(),
                self.secret.clone(),
            ));
        }
    }
}

enum Route {
    Play { name: String, color: String },
    Control,
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: HubHandle, secret: String) {
    let mut route = None;
    let callback = |request: &Request, response: Response| {
        match route_request(request.uri().path(), request.uri().query(), &secret) {
            Ok(matched) => {
                route = Some(matched);
                Ok(response)
            }
            Err(reason) => {
                warn!("rejecting handshake from {}: {}", peer, reason);
                let mut rejection = ErrorResponse::new(Some(reason.to_string()));
                *rejection.status_mut() = StatusCode::BAD_REQUEST;
                Err(rejection)
            }
        }
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("handshake with {} failed: {}", peer, e);
            return;
        }
    };

    match route {
        Some(Route::Play { name, color }) => play_connection(ws, peer, hub, name, color).await,
        Some(Route::Control) => control_connection(ws, peer, hub).await,
        None => {}
    }
}

fn route_request(
    path: &str,
    query: Option<&str>,
    secret: &str,
) -> Result<Route, &'static str> {
    let params = parse_query(query.unwrap_or(""));
    match path {
        "/play" => {
            let name = params.get("name").cloned().unwrap_or_default();
            let color = params.get("color").cloned().unwrap_or_default();
            if name.is_empty() || color.is_empty() {
                return Err("missing name or color");
            }
            Ok(Route::Play { name, color })
        }
        "/control" => {
            if params.get("secret").map(String::as_str) == Some(secret) {
                Ok(Route::Control)
            } else {
                Err("bad control secret")
            }
        }
        _ => Err("unknown path"),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

async fn play_connection(
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
    hub: HubHandle,
    name: String,
    color: String,
) {
    info!("player {} ({}) connecting from {}", name, color, peer);
    let session = hub.register(name, color);
    let (id, snapshots, hub) = session.into_parts();

    let (ws_tx, ws_rx) = ws.split();
    tokio::spawn(pump_snapshots(ws_tx, snapshots, id));
    relay_actions(ws_rx, hub, id).await;
    info!("session {}: connection from {} closed", id, peer);
}

/// Drains the session mailbox into the socket and pings on a fixed period.
/// Ends when the hub closes the mailbox or a write fails.
async fn pump_snapshots(
    mut ws_tx: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut snapshots: mpsc::Receiver<StateSnapshot>,
    id: u32,
) {
    let mut ping = interval(PING_PERIOD);
    ping.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else {
                    debug!("session {}: mailbox closed, closing socket", id);
                    let _ = timeout(WRITE_WAIT, ws_tx.send(Message::Close(None))).await;
                    break;
                };
                let json = match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("session {}: snapshot serialization failed: {}", id, e);
                        break;
                    }
                };
                match timeout(WRITE_WAIT, ws_tx.send(Message::Text(json))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!("session {}: snapshot write failed", id);
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match timeout(WRITE_WAIT, ws_tx.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!("session {}: ping write failed", id);
                        break;
                    }
                }
            }
        }
    }
}

/// Forwards inbound commands to the hub. Any read failure, close frame or
/// expired read deadline unregisters the session; undecodable frames are
/// no-ops.
async fn relay_actions(mut ws_rx: SplitStream<WebSocketStream<TcpStream>>, hub: HubHandle, id: u32) {
    loop {
        let frame = match timeout(READ_WAIT, ws_rx.next()).await {
            Err(_) => {
                debug!("session {}: read deadline expired", id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!("session {}: read failed: {}", id, e);
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<ActionMessage>(&text) {
                Ok(message) => hub.submit(id, message.command),
                Err(e) => debug!("session {}: ignoring unrecognized frame: {}", id, e),
            },
            Message::Close(_) => break,
            // Pongs and other frames only refresh the read deadline.
            _ => {}
        }
    }
    hub.unregister(id);
}

/// Serves one admin connection: start/stop requests routed into the hub.
async fn control_connection(mut ws: WebSocketStream<TcpStream>, peer: SocketAddr, hub: HubHandle) {
    info!("control connection from {}", peer);
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ControlRequest>(&text) {
                Ok(ControlRequest::Start(config)) => {
                    if config.is_valid() {
                        info!("control: start requested by {}", peer);
                        hub.start(config);
                    } else {
                        warn!("control: dropping invalid config {:?}", config);
                    }
                }
                Ok(ControlRequest::Stop) => {
                    info!("control: stop requested by {}", peer);
                    hub.stop();
                }
                Err(e) => debug!("control: ignoring unrecognized frame: {}", e),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    info!("control connection from {} closed", peer);
}
