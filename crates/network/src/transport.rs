// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Transport abstractions for dependency injection and testing.
//!
//! The realtime client never touches a socket directly. It asks a [`Connector`] to open
//! a socket for a URL and receives a [`TransportHandle`]: a stream of [`TransportEvent`]s
//! (open, frames, errors, close) and a command channel for outbound frames and closing.
//! Opening never blocks, progress is reported through events in the order the socket
//! produces them.
//!
//! [`TungsteniteConnector`] is the production implementation. Tests script the other
//! end of a [`TransportHandle::pair`] directly.

use std::fmt::Debug;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Error, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderName, HeaderValue},
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use url::Url;

use crate::tls::ensure_crypto_provider;

/// Close code for a deliberate, non-error disconnect.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code synthesised when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code the backend uses to reject credentials (policy violation).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Close code and reason of a closed socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn normal() -> Self {
        Self::new(CLOSE_NORMAL, "")
    }

    #[must_use]
    pub const fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }

    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        self.code == CLOSE_POLICY_VIOLATION
    }
}

/// Events reported by a socket.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// The handshake completed.
    Open,
    Text(String),
    Binary(Bytes),
    /// A transport failure. A `Close` event always follows.
    Error(String),
    /// The socket closed. No further events follow.
    Close(CloseInfo),
}

/// Commands accepted by a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    SendText(String),
    Close(CloseInfo),
}

/// The client side of a socket.
///
/// Dropping the handle abandons the socket.
#[derive(Debug)]
pub struct TransportHandle {
    events: UnboundedReceiver<TransportEvent>,
    commands: UnboundedSender<TransportCommand>,
}

/// The socket side of a [`TransportHandle`].
#[derive(Debug)]
pub struct TransportPeer {
    events: UnboundedSender<TransportEvent>,
    commands: UnboundedReceiver<TransportCommand>,
}

impl TransportHandle {
    /// Creates a connected handle and peer.
    #[must_use]
    pub fn pair() -> (Self, TransportPeer) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        (
            Self {
                events: events_rx,
                commands: commands_tx,
            },
            TransportPeer {
                events: events_tx,
                commands: commands_rx,
            },
        )
    }

    /// Receives the next event, or `None` once the socket side is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Queues a text frame. Returns false if the socket side is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.commands.send(TransportCommand::SendText(text)).is_ok()
    }

    /// Asks the socket to close with the given code.
    pub fn close(&self, code: u16, reason: &str) {
        if self
            .commands
            .send(TransportCommand::Close(CloseInfo::new(code, reason)))
            .is_err()
        {
            tracing::trace!("Close requested for a socket that is already gone");
        }
    }
}

impl TransportPeer {
    /// Reports an event to the client side. Returns false if the handle was dropped.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Receives the next command, or `None` once the handle was dropped.
    pub async fn next_command(&mut self) -> Option<TransportCommand> {
        self.commands.recv().await
    }

    /// Receives a queued command without waiting.
    pub fn try_next_command(&mut self) -> Option<TransportCommand> {
        self.commands.try_recv().ok()
    }

    /// Returns true once the client side dropped its handle.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.events.is_closed()
    }

    fn fail(&self, error: &str) {
        self.emit(TransportEvent::Error(error.to_string()));
        self.emit(TransportEvent::Close(CloseInfo::new(CLOSE_ABNORMAL, error)));
    }
}

/// Opens sockets for the realtime client.
pub trait Connector: Send + Sync + Debug + 'static {
    /// Starts opening a socket to `url` and returns immediately.
    fn open(&self, url: &Url) -> TransportHandle;
}

/// Returns the URL without its query string, suitable for logs.
#[must_use]
pub fn redacted_url(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}

/// Production connector backed by `tokio-tungstenite`.
///
/// Each socket runs in its own task which performs the handshake and then pumps
/// inbound frames into events and outbound commands into the socket. Must be used
/// from within a tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct TungsteniteConnector {
    headers: Vec<(String, String)>,
}

impl TungsteniteConnector {
    /// Creates a new [`TungsteniteConnector`] sending `headers` with every handshake.
    #[must_use]
    pub const fn new(headers: Vec<(String, String)>) -> Self {
        Self { headers }
    }
}

impl Connector for TungsteniteConnector {
    fn open(&self, url: &Url) -> TransportHandle {
        let (handle, peer) = TransportHandle::pair();
        tokio::spawn(run_socket(url.clone(), self.headers.clone(), peer));
        handle
    }
}

fn build_request(url: &Url, headers: &[(String, String)]) -> Result<Request, Error> {
    let mut request = url.as_str().into_client_request()?;
    let req_headers = request.headers_mut();

    for (key, val) in headers {
        let header_value = HeaderValue::from_str(val)?;
        let header_name: HeaderName = key.parse()?;
        req_headers.insert(header_name, header_value);
    }

    Ok(request)
}

async fn run_socket(url: Url, headers: Vec<(String, String)>, mut peer: TransportPeer) {
    let target = redacted_url(&url);
    if url.scheme() == "wss" && !ensure_crypto_provider() {
        peer.fail("no TLS crypto provider available");
        return;
    }

    let request = match build_request(&url, &headers) {
        Ok(request) => request,
        Err(e) => {
            peer.fail(&e.to_string());
            return;
        }
    };

    tracing::debug!("Connecting to {target}");

    let connect = connect_async(request);
    tokio::pin!(connect);

    let result = loop {
        tokio::select! {
            result = &mut connect => break result,
            command = peer.next_command() => match command {
                Some(TransportCommand::SendText(_)) => {
                    tracing::debug!("Dropping send to {target} before open");
                }
                Some(TransportCommand::Close(_)) | None => {
                    tracing::debug!("Abandoned handshake with {target}");
                    return;
                }
            },
        }
    };

    let (mut writer, mut reader) = match result {
        Ok((stream, _response)) => stream.split(),
        Err(Error::Http(response)) if matches!(response.status().as_u16(), 401 | 403) => {
            let reason = format!("handshake rejected with HTTP {}", response.status());
            tracing::warn!("Connection to {target} {reason}");
            peer.emit(TransportEvent::Close(CloseInfo::new(
                CLOSE_POLICY_VIOLATION,
                reason,
            )));
            return;
        }
        Err(e) => {
            tracing::debug!("Connection to {target} failed: {e}");
            peer.fail(&e.to_string());
            return;
        }
    };

    tracing::debug!("Connected to {target}");
    peer.emit(TransportEvent::Open);

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    tracing::trace!("Received text frame: {}", text.as_str());
                    peer.emit(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!("Received binary frame, {} bytes", data.len());
                    peer.emit(TransportEvent::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map_or_else(
                        || CloseInfo::new(CLOSE_NO_STATUS, ""),
                        |f| CloseInfo::new(u16::from(f.code), f.reason.as_str()),
                    );
                    tracing::debug!("Received close frame {} from {target}", info.code);
                    peer.emit(TransportEvent::Close(info));
                    break;
                }
                Some(Ok(_)) => {} // Ping/pong handled by tungstenite
                Some(Err(e)) => {
                    tracing::debug!("Read error from {target}: {e}");
                    peer.fail(&e.to_string());
                    break;
                }
                None => {
                    peer.emit(TransportEvent::Close(CloseInfo::new(
                        CLOSE_ABNORMAL,
                        "stream ended without close frame",
                    )));
                    break;
                }
            },
            command = peer.next_command() => match command {
                Some(TransportCommand::SendText(text)) => {
                    if let Err(e) = writer.send(Message::Text(text.into())).await {
                        tracing::error!("Failed to send message to {target}: {e}");
                    }
                }
                Some(TransportCommand::Close(info)) => {
                    tracing::debug!("Closing {target} with code {}", info.code);
                    let frame = CloseFrame {
                        code: CloseCode::from(info.code),
                        reason: info.reason.into(),
                    };
                    // The peer may already be gone, nothing to report in that case
                    _ = writer.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => {
                    _ = writer.close().await;
                    break;
                }
            },
        }
    }

    tracing::debug!("Completed socket task for {target}");
}
