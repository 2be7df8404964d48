//! Auto-reconnecting WebSocket client.

use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chatwire_proto::{Frame, InboundEnvelope};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{ClientError, ConnectRefusal};
use crate::health::NetworkStatusProvider;
use crate::notice::{Notice, Notifier};
use crate::session::SessionGate;

use super::backoff::{Backoff, ReconnectConfig};
use super::dispatch::{Dispatcher, Handler};
use super::events::TransportEvent;
use super::heartbeat::{next_beat, Heartbeat, HeartbeatConfig};
use super::queue::{OutboundMessage, OutboundQueue};
use super::state::{AtomicConnectionStatus, ConnectionStatus};

/// Close code that ends the session for good.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
const NO_STATUS: u16 = 1005;

const MANUAL_DISCONNECT: &str = "manual disconnect";
const FORCED_RECONNECT: &str = "forced reconnect";
const EVENT_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingConnect = Pin<Box<dyn Future<Output = Result<WsStream, WsError>> + Send>>;

/// Configuration for the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
    /// Heartbeat behavior.
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug)]
enum Command {
    Connect(Url),
    Send(OutboundMessage),
    Disconnect,
    ForceReconnect,
    Shutdown,
}

/// Handle to the transport task.
///
/// Every method is non-blocking. The task owns the socket, the outbound
/// queue and all timers; the handle only sends commands, reads the status
/// snapshot and mutates the dispatcher. Dropping the handle stops the task.
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<AtomicConnectionStatus>,
    queued: Arc<AtomicUsize>,
    events: broadcast::Sender<TransportEvent>,
    dispatcher: Arc<Dispatcher>,
    gate: SessionGate,
    network: Arc<dyn NetworkStatusProvider>,
    notifier: Arc<dyn Notifier>,
    has_endpoint: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransportClient {
    /// Spawn the transport task. Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        config: TransportConfig,
        gate: SessionGate,
        network: Arc<dyn NetworkStatusProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let status = Arc::new(AtomicConnectionStatus::new(ConnectionStatus::Idle));
        let queued = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::new());

        let actor = Actor {
            config,
            commands: command_rx,
            status: Arc::clone(&status),
            queued: Arc::clone(&queued),
            events: events.clone(),
            dispatcher: Arc::clone(&dispatcher),
            endpoint: None,
            connecting: None,
            socket: None,
            retry: None,
            heartbeat: None,
            backoff: Backoff::new(config.reconnect),
            queue: OutboundQueue::default(),
            attempted: false,
        };
        let task = tokio::spawn(actor.run());

        Self {
            commands,
            status,
            queued,
            events,
            dispatcher,
            gate,
            network,
            notifier,
            has_endpoint: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        }
    }

    /// Open a connection to `endpoint`, authenticating with `token`.
    ///
    /// The session must be signed in and the network healthy; otherwise the
    /// request is refused with a notice and no socket is opened. The token
    /// travels as the `token` query parameter. Does nothing while a socket is
    /// already open.
    pub fn connect(&self, endpoint: &str, token: Option<&str>) -> Result<(), ClientError> {
        self.admit()?;
        let url = endpoint_url(endpoint, token)?;
        self.command(Command::Connect(url))?;
        self.has_endpoint.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Close the socket with a normal close and stop reconnecting.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect)
    }

    /// Drop the current socket and attempt a new one right away with the
    /// backoff back at its base delay.
    ///
    /// Unlike `connect`, neither the session nor the network is checked: a
    /// user-requested reconnect always goes through once an endpoint is known.
    pub fn force_reconnect(&self) -> Result<(), ClientError> {
        if !self.has_endpoint.load(Ordering::SeqCst) {
            return Err(ClientError::NoEndpoint);
        }
        self.command(Command::ForceReconnect)
    }

    /// Send a frame, or queue it until the socket opens.
    pub fn send(&self, message_type: &str, payload: Value) -> Result<(), ClientError> {
        self.command(Command::Send(OutboundMessage::new(message_type, payload)))
    }

    /// Register a handler for a message type.
    pub fn subscribe(&self, message_type: &str, handler: Handler) {
        self.dispatcher.subscribe(message_type, handler);
    }

    /// Remove a handler for a message type.
    pub fn unsubscribe(&self, message_type: &str, handler: &Handler) {
        self.dispatcher.unsubscribe(message_type, handler);
    }

    /// Number of handlers registered for a message type.
    #[must_use]
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.dispatcher.handler_count(message_type)
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.load()
    }

    /// Number of messages waiting for the socket to open.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Disconnect and wait for the task to finish.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "transport task failed");
            }
        }
    }

    fn admit(&self) -> Result<(), ClientError> {
        let refusal = match self.gate.check() {
            Err(refusal) => Some(refusal),
            Ok(()) => {
                let status = self.network.network_status();
                (!status.is_healthy()).then_some(ConnectRefusal::Network(status))
            }
        };
        match refusal {
            Some(refusal) => {
                warn!(reason = %refusal, "connect refused");
                self.notifier.notify(Notice::error(refusal.notice()));
                Err(ClientError::Refused(refusal))
            }
            None => Ok(()),
        }
    }

    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("status", &self.status())
            .field("queued", &self.queued())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

fn endpoint_url(endpoint: &str, token: Option<&str>) -> Result<Url, ClientError> {
    let mut url = Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ClientError::InvalidEndpoint(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

enum Step {
    Command(Option<Command>),
    Opened(Result<WsStream, WsError>),
    Inbound(Option<Result<Message, WsError>>),
    RetryDue,
    Beat,
}

struct Actor {
    config: TransportConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    status: Arc<AtomicConnectionStatus>,
    queued: Arc<AtomicUsize>,
    events: broadcast::Sender<TransportEvent>,
    dispatcher: Arc<Dispatcher>,
    endpoint: Option<Url>,
    connecting: Option<PendingConnect>,
    socket: Option<WsStream>,
    retry: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Heartbeat>,
    backoff: Backoff,
    queue: OutboundQueue,
    /// An attempt was made since the last manual disconnect.
    attempted: bool,
}

impl Actor {
    async fn run(mut self) {
        debug!("transport task started");
        loop {
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => Step::Command(command),
                result = pending_connect(&mut self.connecting) => Step::Opened(result),
                inbound = next_inbound(&mut self.socket) => Step::Inbound(inbound),
                () = retry_due(&mut self.retry) => Step::RetryDue,
                () = next_beat(&mut self.heartbeat) => Step::Beat,
            };

            match step {
                Step::Command(None | Some(Command::Shutdown)) => {
                    self.disconnect().await;
                    break;
                }
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Opened(result) => self.handle_opened(result).await,
                Step::Inbound(inbound) => self.handle_inbound(inbound).await,
                Step::RetryDue => {
                    self.retry = None;
                    self.begin_attempt();
                }
                Step::Beat => self.send_ping().await,
            }
        }
        debug!("transport task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(endpoint) => {
                if self.socket.is_some() {
                    debug!("already connected, ignoring connect");
                    return;
                }
                self.retry = None;
                self.endpoint = Some(endpoint);
                self.begin_attempt();
            }
            Command::Send(message) => {
                if self.socket.is_some() {
                    self.deliver(message).await;
                } else {
                    debug!(
                        message_type = %message.message_type,
                        queued = self.queue.len() + 1,
                        "not connected, queueing message"
                    );
                    self.queue.push_back(message);
                    self.publish_queued();
                }
            }
            Command::Disconnect => self.disconnect().await,
            Command::ForceReconnect => {
                info!("forcing reconnect");
                self.teardown(FORCED_RECONNECT).await;
                self.backoff.reset();
                self.begin_attempt();
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn begin_attempt(&mut self) {
        let Some(endpoint) = self.endpoint.as_ref() else {
            warn!("no endpoint to connect to");
            return;
        };

        let status = if self.attempted {
            ConnectionStatus::Reconnecting
        } else {
            ConnectionStatus::Connecting
        };
        self.attempted = true;
        self.status.store(status);

        let attempt = self.backoff.attempts().saturating_add(1);
        info!(
            host = endpoint.host_str().unwrap_or_default(),
            attempt,
            %status,
            "opening connection"
        );
        self.emit(TransportEvent::Connecting { attempt });

        let target = endpoint.to_string();
        self.connecting = Some(Box::pin(async move {
            connect_async(target).await.map(|(ws, _response)| ws)
        }));
    }

    async fn handle_opened(&mut self, result: Result<WsStream, WsError>) {
        self.connecting = None;
        match result {
            Ok(ws) => self.on_open(ws).await,
            Err(e) => {
                warn!(error = %e, "connection attempt failed");
                self.on_close(ABNORMAL_CLOSURE, e.to_string());
            }
        }
    }

    async fn on_open(&mut self, ws: WsStream) {
        self.socket = Some(ws);
        self.status.store(ConnectionStatus::Connected);
        self.backoff.reset();

        let mut flushed = 0;
        while let Some(message) = self.queue.pop_front() {
            trace!(
                message_type = %message.message_type,
                waited_ms = message.waited_ms(),
                "flushing queued message"
            );
            if !self.deliver(message).await {
                return;
            }
            flushed += 1;
        }
        self.publish_queued();

        self.heartbeat = Some(Heartbeat::start(self.config.heartbeat));
        info!(flushed, "connected");
        self.emit(TransportEvent::Connected { flushed });
    }

    async fn handle_inbound(&mut self, inbound: Option<Result<Message, WsError>>) {
        match inbound {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((NO_STATUS, String::new()), |f| {
                    (u16::from(f.code), f.reason.as_str().to_owned())
                });
                if let Some(mut ws) = self.socket.take() {
                    // Complete the closing handshake.
                    let _ = ws.close(None).await;
                }
                self.on_close(code, reason);
            }
            Some(Ok(Message::Binary(_))) => debug!("ignoring binary frame"),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket error");
                self.on_close(ABNORMAL_CLOSURE, e.to_string());
            }
            None => self.on_close(
                ABNORMAL_CLOSURE,
                "connection closed without close frame".to_string(),
            ),
        }
    }

    fn handle_text(&self, text: &str) {
        let envelope = match InboundEnvelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "dropping malformed frame");
                return;
            }
        };
        if envelope.is_control() {
            trace!(message_type = %envelope.message_type, "control frame");
            return;
        }
        let handled = self
            .dispatcher
            .dispatch(&envelope.message_type, &envelope.payload);
        trace!(message_type = %envelope.message_type, handled, "dispatched frame");
    }

    /// Apply a close. Code 1000 is final; anything else schedules a retry.
    fn on_close(&mut self, code: u16, reason: String) {
        self.heartbeat = None;
        self.socket = None;
        self.connecting = None;
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.clone(),
        });

        if code == NORMAL_CLOSURE {
            info!(reason = %reason, "connection closed normally");
            self.retry = None;
            self.status.store(ConnectionStatus::Disconnected);
            self.emit(TransportEvent::Disconnected);
            return;
        }

        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempts();
        self.status.store(ConnectionStatus::Reconnecting);
        self.retry = Some(Box::pin(sleep(delay)));
        warn!(code, reason = %reason, attempt, ?delay, "connection lost, reconnecting");
        self.emit(TransportEvent::Reconnecting { attempt, delay });
    }

    /// Write one message. On a write failure the message goes back to the
    /// head of the queue and the connection is treated as lost.
    async fn deliver(&mut self, message: OutboundMessage) -> bool {
        let frame = Frame::new(message.message_type.clone(), message.payload.clone());
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, message_type = %message.message_type, "dropping unencodable message");
                return true;
            }
        };

        match self.write_text(json).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, message_type = %message.message_type, "write failed, requeueing");
                self.queue.push_front(message);
                self.publish_queued();
                self.on_close(ABNORMAL_CLOSURE, e.to_string());
                false
            }
        }
    }

    async fn send_ping(&mut self) {
        if self.socket.is_none() {
            return;
        }
        let beats = self.heartbeat.as_ref().map_or(0, Heartbeat::beats);
        let json = match Frame::ping().to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to encode heartbeat");
                return;
            }
        };
        trace!(beats, "sending heartbeat");
        if let Err(e) = self.write_text(json).await {
            warn!(error = %e, "heartbeat failed");
            self.on_close(ABNORMAL_CLOSURE, e.to_string());
        }
    }

    async fn write_text(&mut self, text: String) -> Result<(), WsError> {
        match self.socket.as_mut() {
            Some(ws) => ws.send(Message::Text(text.into())).await,
            None => Err(WsError::AlreadyClosed),
        }
    }

    /// Cancel timers and any attempt, and close the socket normally.
    async fn teardown(&mut self, reason: &'static str) {
        self.retry = None;
        self.connecting = None;
        self.heartbeat = None;
        if let Some(mut ws) = self.socket.take() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: reason.into(),
            };
            if let Err(e) = ws.close(Some(frame)).await {
                debug!(error = %e, "close handshake failed");
            }
        }
    }

    async fn disconnect(&mut self) {
        self.teardown(MANUAL_DISCONNECT).await;
        self.attempted = false;
        self.status.store(ConnectionStatus::Disconnected);
        info!("disconnected");
        self.emit(TransportEvent::Disconnected);
    }

    fn publish_queued(&self) {
        self.queued.store(self.queue.len(), Ordering::SeqCst);
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn pending_connect(connecting: &mut Option<PendingConnect>) -> Result<WsStream, WsError> {
    match connecting {
        Some(attempt) => attempt.await,
        None => pending().await,
    }
}

async fn next_inbound(socket: &mut Option<WsStream>) -> Option<Result<Message, WsError>> {
    match socket {
        Some(ws) => ws.next().await,
        None => pending().await,
    }
}

async fn retry_due(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::NetworkStatus;
    use crate::notice::BroadcastNotifier;
    use crate::session::{Session, SessionProvider};
    use std::time::Duration;

    struct FixedSession(bool);

    impl SessionProvider for FixedSession {
        fn current_session(&self) -> Session {
            Session {
                is_authenticated: self.0,
            }
        }
    }

    struct FixedNetwork(NetworkStatus);

    impl NetworkStatusProvider for FixedNetwork {
        fn network_status(&self) -> NetworkStatus {
            self.0
        }
    }

    fn start_client(signed_in: bool, network: NetworkStatus) -> (TransportClient, Arc<BroadcastNotifier>) {
        let notifier = Arc::new(BroadcastNotifier::default());
        let client = TransportClient::start(
            TransportConfig::default(),
            SessionGate::new(Arc::new(FixedSession(signed_in))),
            Arc::new(FixedNetwork(network)),
            notifier.clone(),
        );
        (client, notifier)
    }

    #[test]
    fn test_endpoint_url_appends_token() {
        let url = endpoint_url("ws://localhost:9000/ws", Some("a b&c")).expect("url");
        assert_eq!(url.as_str(), "ws://localhost:9000/ws?token=a+b%26c");
    }

    #[test]
    fn test_endpoint_url_without_token() {
        let url = endpoint_url("wss://chat.example.com/ws", None).expect("url");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_endpoint_url_rejects_bad_input() {
        assert!(matches!(
            endpoint_url("not a url", None),
            Err(ClientError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            endpoint_url("http://localhost/ws", None),
            Err(ClientError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_when_signed_out() {
        let (client, notifier) = start_client(false, NetworkStatus::Healthy);
        let mut notices = notifier.subscribe();

        let err = client.connect("ws://127.0.0.1:1/ws", Some("t")).unwrap_err();

        assert!(matches!(
            err,
            ClientError::Refused(ConnectRefusal::NotAuthenticated)
        ));
        assert_eq!(notices.recv().await.expect("notice").message, "Please sign in first.");
        assert_eq!(client.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_connect_refused_when_unhealthy() {
        for (status, message) in [
            (
                NetworkStatus::Offline,
                "Offline, please check your internet connection.",
            ),
            (
                NetworkStatus::Connecting,
                "Still connecting to the server, please retry shortly.",
            ),
            (
                NetworkStatus::Unreachable,
                "Cannot reach the server, please retry later.",
            ),
        ] {
            let (client, notifier) = start_client(true, status);
            let mut notices = notifier.subscribe();

            let err = client.connect("ws://127.0.0.1:1/ws", None).unwrap_err();

            assert!(matches!(
                err,
                ClientError::Refused(ConnectRefusal::Network(s)) if s == status
            ));
            assert_eq!(notices.recv().await.expect("notice").message, message);
            assert_eq!(client.status(), ConnectionStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_force_reconnect_needs_endpoint() {
        let (client, _) = start_client(true, NetworkStatus::Healthy);
        assert!(matches!(
            client.force_reconnect(),
            Err(ClientError::NoEndpoint)
        ));
    }

    #[tokio::test]
    async fn test_send_while_idle_is_queued() {
        let (client, _) = start_client(true, NetworkStatus::Healthy);
        client.send("chat_message", serde_json::json!({"content": "a"})).expect("send");
        client.send("chat_message", serde_json::json!({"content": "b"})).expect("send");

        tokio::time::timeout(Duration::from_secs(1), async {
            while client.queued() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages queued");
        assert_eq!(client.status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_attempt_schedules_reconnect() {
        let (client, _) = start_client(true, NetworkStatus::Healthy);
        let mut events = client.events();

        // Nothing listens on port 1.
        client.connect("ws://127.0.0.1:1/ws", None).expect("connect");

        assert_eq!(
            events.recv().await.expect("event"),
            TransportEvent::Connecting { attempt: 1 }
        );
        assert!(matches!(
            events.recv().await.expect("event"),
            TransportEvent::Closed {
                code: ABNORMAL_CLOSURE,
                ..
            }
        ));
        assert_eq!(
            events.recv().await.expect("event"),
            TransportEvent::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(client.status(), ConnectionStatus::Reconnecting);
    }

    #[tokio::test]
    async fn test_disconnect_from_idle() {
        let (client, _) = start_client(true, NetworkStatus::Healthy);
        let mut events = client.events();

        client.disconnect().expect("disconnect");

        assert_eq!(
            events.recv().await.expect("event"),
            TransportEvent::Disconnected
        );
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_commands_fail_after_shutdown() {
        let (client, _) = start_client(true, NetworkStatus::Healthy);
        client.shutdown().await;

        assert!(matches!(
            client.send("typing", Value::Null),
            Err(ClientError::Closed)
        ));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
