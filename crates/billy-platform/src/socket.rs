//! Streaming adapter: one Socket.IO connection per exchange.
//!
//! `open` performs the Engine.IO/Socket.IO handshake, emits the request
//! and hands the socket to a pump task spawned with `spawn_local`. The
//! pump answers pings and forwards fragments into an unbounded channel
//! until the server closes, the transport fails, or the handle is closed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};
use futures::future::{select, Either};
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::{futures::WebSocket, Message, WebSocketError};
use serde_json::Value;
use wasm_bindgen_futures::spawn_local;

use billy_core::ports::{ChannelEvent, ChannelHandle, ExchangeChannel, StreamPort};
use billy_types::{
    BillyError, Result,
    config::BillyConfig,
    event::{StreamFragment, StreamRequest},
};
use crate::socketio::{
    decode_engine, decode_socket, encode_event, socket_url, EnginePacket, OpenPayload,
    SocketPacket, CONNECT, DISCONNECT, PONG,
};

pub struct SocketIoStream {
    url: String,
    event: String,
}

impl SocketIoStream {
    pub fn new(api_url: &str, event: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: socket_url(api_url)?,
            event: event.into(),
        })
    }

    pub fn from_config(config: &BillyConfig) -> Result<Self> {
        Self::new(&config.api_url, config.socket_event.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait(?Send)]
impl StreamPort for SocketIoStream {
    async fn open(&self, request: &StreamRequest) -> Result<ExchangeChannel> {
        let mut ws = WebSocket::open(&self.url)
            .map_err(|e| BillyError::Socket(format!("Failed to open {}: {}", self.url, e)))?;

        let open = handshake(&mut ws).await?;
        log::info!("Socket connected (sid {}) for chat {}", open.sid, request.session());

        send_frame(&mut ws, &encode_event(&self.event, request)?).await?;

        let (tx, rx) = mpsc::unbounded();
        let (close_tx, close_rx) = oneshot::channel();
        let alive = Rc::new(Cell::new(true));
        spawn_local(pump(ws, self.event.clone(), tx, close_rx, alive.clone()));

        Ok(ExchangeChannel {
            events: Box::pin(rx),
            handle: Box::new(SocketHandle {
                close_tx: RefCell::new(Some(close_tx)),
                alive,
            }),
        })
    }
}

struct SocketHandle {
    close_tx: RefCell<Option<oneshot::Sender<()>>>,
    alive: Rc<Cell<bool>>,
}

impl ChannelHandle for SocketHandle {
    fn close(&self) {
        if let Some(tx) = self.close_tx.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    fn is_open(&self) -> bool {
        self.alive.get() && self.close_tx.borrow().is_some()
    }
}

async fn send_frame(ws: &mut WebSocket, frame: &str) -> Result<()> {
    ws.send(Message::Text(frame.to_string()))
        .await
        .map_err(|e| BillyError::Socket(e.to_string()))
}

async fn recv_frame(ws: &mut WebSocket) -> Result<String> {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => Ok(text),
        Some(Ok(Message::Bytes(_))) => Err(BillyError::Protocol("unexpected binary frame".to_string())),
        Some(Err(WebSocketError::ConnectionClose(_))) | None => Err(BillyError::ConnectionClosed),
        Some(Err(e)) => Err(BillyError::Socket(e.to_string())),
    }
}

/// Wait for the engine open packet, connect to the default namespace and
/// wait for the acknowledgement.
async fn handshake(ws: &mut WebSocket) -> Result<OpenPayload> {
    let open = loop {
        match decode_engine(&recv_frame(ws).await?)? {
            EnginePacket::Open(open) => break open,
            EnginePacket::Close => return Err(BillyError::ConnectionClosed),
            other => log::debug!("Ignoring {:?} before open", other),
        }
    };

    send_frame(ws, CONNECT).await?;

    loop {
        match decode_engine(&recv_frame(ws).await?)? {
            EnginePacket::Message(packet) => match decode_socket(&packet)? {
                SocketPacket::Connect { sid, .. } => {
                    log::debug!("Namespace connected (sid {:?})", sid);
                    return Ok(open);
                }
                SocketPacket::ConnectError { message, .. } => {
                    return Err(BillyError::Socket(format!("Connection refused: {}", message)));
                }
                other => log::debug!("Ignoring {:?} before connect", other),
            },
            EnginePacket::Ping(data) => send_frame(ws, &format!("{}{}", PONG, data)).await?,
            EnginePacket::Close => return Err(BillyError::ConnectionClosed),
            _ => {}
        }
    }
}

/// What to do with one inbound text frame once connected
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Fragment(StreamFragment),
    /// Write this frame back (pong)
    Reply(String),
    Closed,
    Error(String),
    Ignore,
}

/// Classify a text frame received on an established connection.
pub fn classify_frame(frame: &str, event: &str) -> Inbound {
    let packet = match decode_engine(frame) {
        Ok(EnginePacket::Ping(data)) => return Inbound::Reply(format!("{}{}", PONG, data)),
        Ok(EnginePacket::Close) => return Inbound::Closed,
        Ok(EnginePacket::Message(packet)) => packet,
        Ok(_) => return Inbound::Ignore,
        Err(e) => {
            log::warn!("Dropping bad frame: {}", e);
            return Inbound::Ignore;
        }
    };

    match decode_socket(&packet) {
        Ok(SocketPacket::Event { name, args, .. }) if name == event => {
            match args.into_iter().next().map(parse_fragment) {
                Some(Ok(fragment)) => Inbound::Fragment(fragment),
                Some(Err(e)) => {
                    log::warn!("Dropping malformed fragment: {}", e);
                    Inbound::Ignore
                }
                None => Inbound::Ignore,
            }
        }
        Ok(SocketPacket::Event { name, .. }) => {
            log::debug!("Ignoring event {}", name);
            Inbound::Ignore
        }
        Ok(SocketPacket::Disconnect { .. }) => Inbound::Closed,
        Ok(SocketPacket::ConnectError { message, .. }) => Inbound::Error(message),
        Ok(_) => Inbound::Ignore,
        Err(e) => {
            log::warn!("Dropping bad packet: {}", e);
            Inbound::Ignore
        }
    }
}

/// Fragments usually arrive as objects; some servers emit them as JSON
/// text instead.
fn parse_fragment(arg: Value) -> Result<StreamFragment> {
    match arg {
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

enum Step {
    Frame(Option<std::result::Result<Message, WebSocketError>>),
    Close,
}

async fn pump(
    mut ws: WebSocket,
    event: String,
    tx: mpsc::UnboundedSender<ChannelEvent>,
    mut close_rx: oneshot::Receiver<()>,
    alive: Rc<Cell<bool>>,
) {
    let mut server_closed = false;

    loop {
        let step = match select(ws.next(), &mut close_rx).await {
            Either::Left((frame, _)) => Step::Frame(frame),
            Either::Right(_) => Step::Close,
        };

        let forward = match step {
            Step::Close => break,
            Step::Frame(None) | Step::Frame(Some(Err(WebSocketError::ConnectionClose(_)))) => {
                server_closed = true;
                ChannelEvent::Closed
            }
            Step::Frame(Some(Err(e))) => {
                server_closed = true;
                ChannelEvent::Error(e.to_string())
            }
            Step::Frame(Some(Ok(Message::Bytes(_)))) => {
                log::debug!("Ignoring binary frame");
                continue;
            }
            Step::Frame(Some(Ok(Message::Text(text)))) => match classify_frame(&text, &event) {
                Inbound::Fragment(fragment) => ChannelEvent::Fragment(fragment),
                Inbound::Reply(frame) => {
                    if let Err(e) = send_frame(&mut ws, &frame).await {
                        log::warn!("Failed to answer ping: {}", e);
                    }
                    continue;
                }
                Inbound::Closed => {
                    server_closed = true;
                    ChannelEvent::Closed
                }
                Inbound::Error(message) => ChannelEvent::Error(message),
                Inbound::Ignore => continue,
            },
        };

        let terminal = !matches!(forward, ChannelEvent::Fragment(_));
        if tx.unbounded_send(forward).is_err() {
            log::debug!("Exchange dropped its channel");
            break;
        }
        if terminal {
            break;
        }
    }

    alive.set(false);
    if !server_closed {
        let _ = send_frame(&mut ws, DISCONNECT).await;
    }
    if let Err(e) = ws.close(Some(1000), Some("exchange finished")) {
        log::debug!("Socket close: {}", e);
    }
    log::debug!("Socket pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use billy_types::event::FragmentKind;

    #[test]
    fn test_classify_fragment() {
        let frame = r#"42["billy",{"type":"answer","status":"done","response":"Hello!"}]"#;
        assert_eq!(classify_frame(frame, "billy"), Inbound::Fragment(StreamFragment::done("Hello!")));
    }

    #[test]
    fn test_classify_string_payload() {
        let frame = r#"42["billy","{\"type\":\"query\",\"response\":\"SELECT 1\"}"]"#;
        match classify_frame(frame, "billy") {
            Inbound::Fragment(f) => {
                assert_eq!(f.kind, FragmentKind::Query);
                assert_eq!(f.response, "SELECT 1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_ping_replies_pong() {
        assert_eq!(classify_frame("2", "billy"), Inbound::Reply("3".to_string()));
        assert_eq!(classify_frame("2keepalive", "billy"), Inbound::Reply("3keepalive".to_string()));
    }

    #[test]
    fn test_classify_close_and_disconnect() {
        assert_eq!(classify_frame("1", "billy"), Inbound::Closed);
        assert_eq!(classify_frame("41", "billy"), Inbound::Closed);
    }

    #[test]
    fn test_classify_ignores_other_events_and_garbage() {
        assert_eq!(classify_frame(r#"42["other",{}]"#, "billy"), Inbound::Ignore);
        assert_eq!(classify_frame(r#"42["billy",{"response":"no type"}]"#, "billy"), Inbound::Ignore);
        assert_eq!(classify_frame("4not json", "billy"), Inbound::Ignore);
        assert_eq!(classify_frame("", "billy"), Inbound::Ignore);
    }
}
