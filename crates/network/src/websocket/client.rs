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

//! Realtime client maintaining a single logical connection to the PsiChat backend.
//!
//! All connection state is owned by one controller task. [`RealtimeClient`] handles
//! translate calls into commands for that task and read the current state from an
//! atomic, so status queries never wait on the controller.
//!
//! Reconnection rules:
//!
//! - A close with code 1000 is deliberate and never retried.
//! - A close with code 1008 is an authentication rejection and is terminal.
//! - Any other close after the connection opened schedules automatic attempts with a
//!   linear backoff (`reconnect_delay * k` before attempt `k`) up to the configured bound,
//!   after which the client stays failed until a caller connects again.
//! - A caller-requested attempt that fails before opening is reported and not retried.

use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::{
        Arc,
        Weak,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender},
        oneshot,
    },
    time::Instant,
};
use url::Url;

use super::{
    config::RealtimeConfig,
    listeners::{ListenerRegistry, Subscription},
    messages::{AlertSeverity, OutboundMessage, Priority, SessionState},
    types::{ConnectionTarget, EventHandler, SessionId, UNPARSED_TEXT_EVENT, UserId, envelope_type},
};
use crate::{
    auth::AuthToken,
    backoff::LinearBackoff,
    error::RealtimeError,
    mode::{ConnectionState, ConnectionStatus},
    transport::{
        CLOSE_ABNORMAL, CLOSE_NORMAL, CloseInfo, Connector, TransportEvent, TransportHandle,
        TungsteniteConnector, redacted_url,
    },
};

type ConnectReply = oneshot::Sender<Result<(), RealtimeError>>;

struct ConnectRequest {
    target: ConnectionTarget,
    url: Url,
    reply: ConnectReply,
}

enum Command {
    Connect(ConnectRequest),
    Send(String),
    Disconnect(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the realtime connection.
///
/// Clones share the same connection, state and listeners. The controller task stops
/// after [`RealtimeClient::shutdown`] or once every clone has been dropped.
///
/// Listeners are owned by the controller, so a listener capturing a clone keeps the
/// controller alive until [`RealtimeClient::shutdown`] is called. Listeners that need
/// to reply should capture a [`WeakRealtimeClient`] from [`RealtimeClient::downgrade`].
#[derive(Clone)]
pub struct RealtimeClient {
    config: Arc<RealtimeConfig>,
    state: Arc<AtomicU8>,
    registry: Arc<ListenerRegistry>,
    cmd_tx: UnboundedSender<Command>,
}

impl Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RealtimeClient))
            .field("base_url", &self.config.base_url)
            .field("state", &self.connection_state())
            .field("listeners", &self.registry.len())
            .finish()
    }
}

impl RealtimeClient {
    /// Creates a new [`RealtimeClient`] opening sockets through `connector`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the controller task is spawned here.
    #[must_use]
    pub fn new(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        let state = Arc::new(AtomicU8::new(ConnectionState::Idle.as_u8()));
        let registry = Arc::new(ListenerRegistry::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let controller = Controller {
            connector,
            connect_timeout: config.connect_timeout(),
            backoff: LinearBackoff::new(config.reconnect_delay(), config.max_reconnect_attempts),
            state: state.clone(),
            registry: registry.clone(),
            cmd_rx,
            transport: None,
            target: None,
            automatic: false,
            pending: None,
            deferred: VecDeque::new(),
            connect_deadline: None,
            reconnect_at: None,
        };
        tokio::spawn(controller.run());

        Self {
            config: Arc::new(config),
            state,
            registry,
            cmd_tx,
        }
    }

    /// Creates a new [`RealtimeClient`] using the `tokio-tungstenite` connector.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn with_default_connector(config: RealtimeConfig) -> Self {
        Self::new(config, Arc::new(TungsteniteConnector::default()))
    }

    /// Returns a handle that does not keep the controller task alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakRealtimeClient {
        WeakRealtimeClient {
            config: Arc::downgrade(&self.config),
            state: Arc::downgrade(&self.state),
            registry: Arc::downgrade(&self.registry),
            cmd_tx: self.cmd_tx.downgrade(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Opens a connection scoped to `user_id`.
    ///
    /// Resolves immediately if a user connection is already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, malformed or expired, if the server
    /// rejects or closes the connection before it opens, or if it does not open within
    /// the connect timeout.
    pub async fn connect_as_user(&self, user_id: UserId, token: &str) -> Result<(), RealtimeError> {
        self.connect(ConnectionTarget::User { user_id }, token)
            .await
    }

    /// Opens a connection scoped to the tutoring session `session_id`.
    ///
    /// Resolves immediately if a tutor connection for the same session is already open.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`RealtimeClient::connect_as_user`].
    pub async fn connect_as_tutor_for_session(
        &self,
        session_id: SessionId,
        user_id: UserId,
        token: &str,
    ) -> Result<(), RealtimeError> {
        self.connect(
            ConnectionTarget::Tutor {
                session_id,
                user_id,
            },
            token,
        )
        .await
    }

    /// Opens a connection for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`RealtimeClient::connect_as_user`].
    pub async fn connect(&self, target: ConnectionTarget, token: &str) -> Result<(), RealtimeError> {
        let token = AuthToken::new(token)?;
        token.ensure_not_expired()?;
        let url = self.config.endpoint_url(&target, &token)?;

        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect(ConnectRequest { target, url, reply }))
            .map_err(|_| RealtimeError::ClientClosed)?;

        rx.await.map_err(|_| RealtimeError::ClientClosed)?
    }

    /// Sends `envelope` if the connection is open, otherwise drops it.
    pub fn send(&self, envelope: &Value) {
        if self.cmd_tx.send(Command::Send(envelope.to_string())).is_err() {
            tracing::debug!("Dropping send, client closed");
        }
    }

    /// Sends a typed outbound message if the connection is open, otherwise drops it.
    pub fn send_message(&self, message: &OutboundMessage) {
        match message.to_envelope() {
            Ok(envelope) => self.send(&envelope),
            Err(e) => tracing::error!("Failed to serialize '{}': {e}", message.message_type()),
        }
    }

    pub fn send_chat_message(&self, session_id: SessionId, message: &str) {
        self.send_message(&OutboundMessage::ChatMessage {
            session_id,
            message: message.to_string(),
        });
    }

    pub fn send_analysis_request(&self, session_id: SessionId, message: &str) {
        self.send_message(&OutboundMessage::AnalysisRequest {
            session_id,
            message: message.to_string(),
        });
    }

    pub fn send_tutor_chat_message(&self, session_id: SessionId, content: &str) {
        self.send_message(&OutboundMessage::TutorChatMessage {
            session_id,
            content: content.to_string(),
        });
    }

    pub fn send_typing_indicator(&self, session_id: SessionId, is_typing: bool) {
        self.send_message(&OutboundMessage::TutorTyping {
            session_id,
            is_typing,
        });
    }

    pub fn send_read_receipt(&self, session_id: SessionId, message_id: &str) {
        self.send_message(&OutboundMessage::TutorReadReceipt {
            session_id,
            message_id: message_id.to_string(),
        });
    }

    pub fn send_tutor_typing_indicator(
        &self,
        session_id: SessionId,
        user_id: UserId,
        is_typing: bool,
    ) {
        self.send_message(&OutboundMessage::TutorTypingIndicator {
            session_id,
            user_id,
            is_typing,
        });
    }

    pub fn send_message_with_analysis(&self, session_id: SessionId, content: &str, analysis: Value) {
        self.send_message(&OutboundMessage::TutorMessageWithAnalysis {
            session_id,
            content: content.to_string(),
            analysis,
        });
    }

    pub fn send_quick_action(&self, session_id: SessionId, action: &str, payload: Option<Value>) {
        self.send_message(&OutboundMessage::TutorQuickAction {
            session_id,
            action: action.to_string(),
            payload,
        });
    }

    pub fn send_session_state_change(&self, session_id: SessionId, state: SessionState) {
        self.send_message(&OutboundMessage::SessionStateChange { session_id, state });
    }

    pub fn send_priority_change(&self, session_id: SessionId, priority: Priority) {
        self.send_message(&OutboundMessage::PriorityChange {
            session_id,
            priority,
        });
    }

    pub fn send_emergency_alert(&self, session_id: SessionId, reason: &str, severity: AlertSeverity) {
        self.send_message(&OutboundMessage::EmergencyAlert {
            session_id,
            reason: reason.to_string(),
            severity,
        });
    }

    /// Registers `handler` for envelopes whose `type` is `event_type`.
    pub fn on(&self, event_type: &str, handler: EventHandler) {
        self.registry.subscribe(event_type, handler);
    }

    /// Removes the first registration of `handler` for `event_type`.
    pub fn off(&self, event_type: &str, handler: &EventHandler) -> bool {
        self.registry.remove_handler(event_type, handler)
    }

    /// Registers `handler` and returns a handle removing exactly this registration.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.registry.subscribe(event_type, Arc::new(handler))
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.registry.unsubscribe(subscription)
    }

    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry.listener_count(event_type)
    }

    /// Closes the connection, cancels reconnection and removes all listeners.
    ///
    /// Pending connect requests fail with [`RealtimeError::Disconnected`].
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Disconnect(reply)).is_err() || rx.await.is_err() {
            tracing::debug!("Disconnect on closed client");
            self.registry.clear();
        }
    }

    /// Disconnects and stops the controller task.
    ///
    /// Connect requests made afterwards fail with [`RealtimeError::ClientClosed`].
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown(reply)).is_ok() {
            _ = rx.await;
        }
        self.registry.clear();
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_atomic(&self.state)
    }

    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_state().status()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_open()
    }
}

/// Non-owning handle to a [`RealtimeClient`].
///
/// Does not count towards the clones keeping the controller task alive, so it can be
/// captured by listeners without forming a cycle.
#[derive(Clone)]
pub struct WeakRealtimeClient {
    config: Weak<RealtimeConfig>,
    state: Weak<AtomicU8>,
    registry: Weak<ListenerRegistry>,
    cmd_tx: WeakUnboundedSender<Command>,
}

impl Debug for WeakRealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(WeakRealtimeClient))
            .finish_non_exhaustive()
    }
}

impl WeakRealtimeClient {
    /// Returns a [`RealtimeClient`] if any strong clone is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RealtimeClient> {
        Some(RealtimeClient {
            cmd_tx: self.cmd_tx.upgrade()?,
            config: self.config.upgrade()?,
            state: self.state.upgrade()?,
            registry: self.registry.upgrade()?,
        })
    }
}

struct Controller {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    backoff: LinearBackoff,
    state: Arc<AtomicU8>,
    registry: Arc<ListenerRegistry>,
    cmd_rx: UnboundedReceiver<Command>,
    transport: Option<TransportHandle>,
    /// Target and endpoint of the current or most recent connection.
    target: Option<(ConnectionTarget, Url)>,
    /// Whether the in-flight attempt was started by the reconnect timer.
    automatic: bool,
    pending: Option<ConnectReply>,
    deferred: VecDeque<ConnectRequest>,
    connect_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
}

impl Controller {
    async fn run(mut self) {
        tracing::debug!("Started task 'controller'");

        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Connect(request)) => self.handle_connect(request),
                    Some(Command::Send(text)) => self.handle_send(text),
                    Some(Command::Disconnect(reply)) => {
                        self.reset("client disconnect");
                        self.registry.clear();
                        _ = reply.send(());
                    }
                    Some(Command::Shutdown(reply)) => {
                        self.reset("client shutdown");
                        self.registry.clear();
                        _ = reply.send(());
                        break;
                    }
                    None => {
                        self.reset("client dropped");
                        break;
                    }
                },
                event = next_event(&mut self.transport) => self.handle_event(event),
                () = wait_until(self.connect_deadline) => self.handle_connect_timeout(),
                () = wait_until(self.reconnect_at) => self.handle_reconnect_timer(),
            }
        }

        tracing::debug!("Completed task 'controller'");
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_atomic(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = ConnectionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            tracing::debug!("Connection state {previous} -> {state}");
        }
    }

    fn handle_connect(&mut self, request: ConnectRequest) {
        let state = self.state();

        if state.is_connecting() {
            tracing::debug!("Deferring connect for {} until attempt settles", request.target);
            self.deferred.push_back(request);
            return;
        }

        if state.is_open()
            && let Some((current, _)) = &self.target
            && current.same_scope(&request.target)
        {
            tracing::debug!("Already connected for {}", request.target);
            _ = request.reply.send(Ok(()));
            return;
        }

        if let Some(transport) = self.transport.take() {
            transport.close(CLOSE_NORMAL, "superseded");
        }
        self.reconnect_at = None;
        self.backoff.reset();

        self.pending = Some(request.reply);
        self.start_attempt(request.target, request.url, false);
    }

    fn start_attempt(&mut self, target: ConnectionTarget, url: Url, automatic: bool) {
        tracing::debug!("Connecting {target} to {}", redacted_url(&url));

        self.transport = Some(self.connector.open(&url));
        self.target = Some((target, url));
        self.automatic = automatic;
        self.connect_deadline = Some(Instant::now() + self.connect_timeout);
        self.set_state(ConnectionState::Connecting);
    }

    fn handle_send(&self, text: String) {
        match &self.transport {
            Some(transport) if self.state().is_open() => {
                if !transport.send_text(text) {
                    tracing::warn!("Dropping send, socket task is gone");
                }
            }
            _ => tracing::debug!("Dropping send while {}", self.state()),
        }
    }

    fn handle_event(&mut self, event: Option<TransportEvent>) {
        let connecting = self.state().is_connecting();

        match event {
            Some(TransportEvent::Open) => self.handle_open(),
            Some(TransportEvent::Text(text)) => self.dispatch_text(&text),
            Some(TransportEvent::Binary(data)) => {
                tracing::debug!("Ignoring binary frame, {} bytes", data.len());
            }
            Some(TransportEvent::Error(error)) if connecting => {
                self.attempt_failed(RealtimeError::Transport(error));
            }
            Some(TransportEvent::Error(error)) => {
                tracing::warn!("Transport error: {error}");
            }
            Some(TransportEvent::Close(info)) => self.handle_close(info, connecting),
            None => self.handle_close(
                CloseInfo::new(CLOSE_ABNORMAL, "socket task ended"),
                connecting,
            ),
        }
    }

    fn handle_open(&mut self) {
        self.connect_deadline = None;
        self.automatic = false;
        self.backoff.reset();
        self.set_state(ConnectionState::Open);

        if let Some((target, _)) = &self.target {
            tracing::info!("Connected {target}");
        }
        if let Some(reply) = self.pending.take() {
            _ = reply.send(Ok(()));
        }
        self.process_deferred();
    }

    fn handle_close(&mut self, info: CloseInfo, connecting: bool) {
        self.transport = None;
        self.connect_deadline = None;

        if info.is_auth_rejection() {
            tracing::warn!("Authentication rejected: {}", info.reason);
            self.automatic = false;
            self.set_state(ConnectionState::Failed);
            if let Some(reply) = self.pending.take() {
                _ = reply.send(Err(RealtimeError::AuthenticationRejected {
                    reason: info.reason,
                }));
            }
            self.process_deferred();
            return;
        }

        if connecting && info.is_normal() && self.automatic {
            tracing::info!("Server closed normally during reconnection, not retrying");
            self.automatic = false;
            self.set_state(ConnectionState::Idle);
            self.process_deferred();
            return;
        }

        if connecting {
            self.attempt_failed(RealtimeError::ClosedBeforeOpen {
                code: info.code,
                reason: info.reason,
            });
            return;
        }

        if info.is_normal() {
            tracing::info!("Connection closed normally");
            self.set_state(ConnectionState::Idle);
        } else {
            tracing::warn!("Connection closed unexpectedly (code {}): {}", info.code, info.reason);
            self.schedule_reconnect();
        }
    }

    fn handle_connect_timeout(&mut self) {
        tracing::warn!("Connection did not open within {:?}", self.connect_timeout);
        if let Some(transport) = self.transport.take() {
            transport.close(CLOSE_NORMAL, "connect timeout");
        }
        self.attempt_failed(RealtimeError::Timeout(self.connect_timeout));
    }

    /// Settles an attempt that failed before opening.
    fn attempt_failed(&mut self, error: RealtimeError) {
        self.transport = None;
        self.connect_deadline = None;

        if self.automatic {
            tracing::warn!("Reconnection attempt {} failed: {error}", self.backoff.attempt());
            self.schedule_reconnect();
        } else {
            tracing::debug!("Connection attempt failed: {error}");
            self.set_state(ConnectionState::Idle);
            if let Some(reply) = self.pending.take() {
                _ = reply.send(Err(error));
            }
        }
        self.process_deferred();
    }

    fn schedule_reconnect(&mut self) {
        self.automatic = false;

        match self.backoff.next_delay() {
            Some(delay) => {
                tracing::warn!(
                    "Reconnecting in {delay:?} (attempt {}/{})",
                    self.backoff.attempt(),
                    self.backoff.max_attempts()
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_state(ConnectionState::Reconnecting);
            }
            None => {
                tracing::error!(
                    "Giving up after {} reconnection attempts",
                    self.backoff.max_attempts()
                );
                self.reconnect_at = None;
                self.set_state(ConnectionState::Failed);
            }
        }
    }

    fn handle_reconnect_timer(&mut self) {
        self.reconnect_at = None;

        match self.target.clone() {
            Some((target, url)) => self.start_attempt(target, url, true),
            None => self.set_state(ConnectionState::Idle),
        }
    }

    fn process_deferred(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        for request in deferred {
            self.handle_connect(request);
        }
    }

    fn dispatch_text(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(envelope) => match envelope_type(&envelope) {
                Some(event_type) => {
                    let count = self.registry.dispatch(event_type, &envelope);
                    tracing::trace!("Dispatched '{event_type}' to {count} listener(s)");
                }
                None => {
                    tracing::debug!("Envelope has no string 'type', dispatching as unparsed text");
                    self.dispatch_unparsed(text);
                }
            },
            Err(e) => {
                tracing::debug!("Failed to parse inbound text: {e}");
                self.dispatch_unparsed(text);
            }
        }
    }

    fn dispatch_unparsed(&self, text: &str) {
        self.registry
            .dispatch(UNPARSED_TEXT_EVENT, &Value::String(text.to_string()));
    }

    /// Closes any socket and clears all connection state.
    fn reset(&mut self, reason: &str) {
        if let Some(transport) = self.transport.take() {
            transport.close(CLOSE_NORMAL, reason);
        }
        self.target = None;
        self.automatic = false;
        self.connect_deadline = None;
        self.reconnect_at = None;
        self.backoff.reset();

        if let Some(reply) = self.pending.take() {
            _ = reply.send(Err(RealtimeError::Disconnected));
        }
        for request in self.deferred.drain(..) {
            _ = request.reply.send(Err(RealtimeError::Disconnected));
        }
        self.set_state(ConnectionState::Idle);
    }
}

async fn next_event(transport: &mut Option<TransportHandle>) -> Option<TransportEvent> {
    match transport {
        Some(transport) => transport.next_event().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::transport::{TransportCommand, TransportPeer};

    #[derive(Debug)]
    struct MockConnector {
        urls: Mutex<Vec<Url>>,
        peers: UnboundedSender<TransportPeer>,
    }

    impl Connector for MockConnector {
        fn open(&self, url: &Url) -> TransportHandle {
            let (handle, peer) = TransportHandle::pair();
            self.urls.lock().unwrap().push(url.clone());
            self.peers.send(peer).unwrap();
            handle
        }
    }

    fn client() -> (RealtimeClient, UnboundedReceiver<TransportPeer>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = MockConnector {
            urls: Mutex::new(Vec::new()),
            peers: peers_tx,
        };
        let client = RealtimeClient::new(RealtimeConfig::default(), Arc::new(connector));
        (client, peers_rx)
    }

    async fn open_user(
        client: &RealtimeClient,
        peers: &mut UnboundedReceiver<TransportPeer>,
    ) -> TransportPeer {
        let connect = client.connect_as_user(UserId::new(1), "tok");
        let accept = async {
            let peer = peers.recv().await.unwrap();
            peer.emit(TransportEvent::Open);
            peer
        };
        let (result, peer) = tokio::join!(connect, accept);
        result.unwrap();
        peer
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[rstest]
    #[should_panic(expected = "no reactor running")]
    fn test_new_outside_runtime_panics() {
        let (peers_tx, _peers_rx) = mpsc::unbounded_channel();
        let connector = MockConnector {
            urls: Mutex::new(Vec::new()),
            peers: peers_tx,
        };

        let _client = RealtimeClient::new(RealtimeConfig::default(), Arc::new(connector));
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (client, _peers) = client();

        assert_eq!(client.connection_state(), ConnectionState::Idle);
        assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);
        assert!(!client.is_connected());
    }

    #[rstest]
    #[case("", RealtimeError::MissingToken)]
    #[case("   ", RealtimeError::MissingToken)]
    #[tokio::test]
    async fn test_invalid_token_fails_without_socket(
        #[case] token: &str,
        #[case] expected: RealtimeError,
    ) {
        let (client, mut peers) = client();

        let result = client.connect_as_user(UserId::new(1), token).await;

        assert_eq!(result, Err(expected));
        assert!(peers.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_only_while_open() {
        let (client, mut peers) = client();

        client.send_chat_message(SessionId::new(1), "dropped");
        let mut peer = open_user(&client, &mut peers).await;
        client.send_chat_message(SessionId::new(1), "delivered");

        let Some(TransportCommand::SendText(text)) = peer.next_command().await else {
            panic!("expected a text frame");
        };
        let sent: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            sent,
            json!({"type": "chat_message", "session_id": 1, "message": "delivered"})
        );
        settle().await;
        assert!(peer.try_next_command().is_none());
    }

    #[tokio::test]
    async fn test_envelope_without_type_goes_to_fallback() {
        let (client, mut peers) = client();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        client.subscribe(UNPARSED_TEXT_EVENT, move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        let peer = open_user(&client, &mut peers).await;
        peer.emit(TransportEvent::Text(r#"{"text":"hi"}"#.to_string()));
        peer.emit(TransportEvent::Binary(bytes::Bytes::from_static(b"\x00")));
        settle().await;

        assert_eq!(*received.lock().unwrap(), vec![json!(r#"{"text":"hi"}"#)]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_client() {
        let (client, mut peers) = client();
        let mut peer = open_user(&client, &mut peers).await;

        client.shutdown().await;

        assert!(!client.is_connected());
        assert_eq!(
            peer.next_command().await,
            Some(TransportCommand::Close(CloseInfo::new(
                CLOSE_NORMAL,
                "client shutdown"
            )))
        );
        assert_eq!(
            client.connect_as_user(UserId::new(1), "tok").await,
            Err(RealtimeError::ClientClosed)
        );
    }
}
