use crate::config::JanusConfig;
use crate::error::{JanusError, Result};
use crate::protocol::envelope::{Envelope, IncomingMessage};
use crate::protocol::janus_session::JanusSession;
use crate::protocol::transaction_manager::TransactionManager;
use crate::transport::{Transport, TransportEvent, WebSocketTransport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Gateway identity, capabilities and plugin inventory, from `janus: "info"`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<u64>,
    pub version_string: Option<String>,
    pub plugins: Vec<String>,
}

impl ServerInfo {
    fn from_value(value: &Value) -> Self {
        Self {
            name: value["name"].as_str().map(str::to_string),
            version: value["version"].as_u64(),
            version_string: value["version_string"].as_str().map(str::to_string),
            plugins: value["plugins"]
                .as_object()
                .map(|plugins| plugins.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }
}

/// Client for one gateway connection.
///
/// Owns the transport, the transaction manager and the session registry.
/// All inbound traffic is processed by a single delivery task in arrival
/// order: direct replies resolve pending transactions, asynchronous events
/// route to the addressed session and handle. Cloning is cheap and clones
/// share the connection.
#[derive(Clone)]
pub struct JanusClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: JanusConfig,
    transport: Box<dyn Transport>,
    transactions: TransactionManager,
    sessions: Mutex<HashMap<u64, JanusSession>>,
    keepalive_tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    router_task: Mutex<Option<JoinHandle<()>>>,
}

impl JanusClient {
    /// Connect to the gateway over WebSocket.
    pub async fn connect(config: JanusConfig) -> Result<Self> {
        let transport = Box::new(WebSocketTransport::new(config.url.clone()));
        Self::connect_with(config, transport).await
    }

    /// Connect over a caller-supplied transport.
    pub async fn connect_with(config: JanusConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate().map_err(JanusError::InvalidConfig)?;

        let mut events = transport.connect().await?;
        tokio::time::timeout(config.connection_timeout, wait_for_connected(&mut events))
            .await
            .map_err(|_| {
                JanusError::Connection(format!(
                    "no connection within {:?}",
                    config.connection_timeout
                ))
            })??;

        let transactions = TransactionManager::new(config.max_pending_transactions);
        let inner = Arc::new(ClientInner {
            config,
            transport,
            transactions,
            sessions: Mutex::new(HashMap::new()),
            keepalive_tasks: Mutex::new(HashMap::new()),
            router_task: Mutex::new(None),
        });

        // The single sequential delivery path: the only completer of
        // transactions and the only source of event routing.
        let router = Arc::downgrade(&inner);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = router.upgrade() else {
                    break;
                };
                match event {
                    TransportEvent::Message(text) => inner.process_message(&text),
                    TransportEvent::Error(e) => log::error!("Transport error: {}", e),
                    TransportEvent::Closed { code, reason } => {
                        inner.on_transport_closed(code, &reason);
                        break;
                    }
                    TransportEvent::Connected => {}
                }
            }
        });
        *inner.router_task.lock().unwrap() = Some(task);

        Ok(Self { inner })
    }

    /// Create a gateway session and start its keepalive.
    pub async fn create_session(&self) -> Result<JanusSession> {
        let reply = self.inner.request(Envelope::create).await?;
        let session_id = IncomingMessage::from_value(reply)
            .data_id()
            .ok_or_else(|| JanusError::decode("data.id"))?;

        let session = JanusSession::new(session_id, Arc::downgrade(&self.inner));
        self.inner
            .sessions
            .lock()
            .unwrap()
            .insert(session_id, session.clone());
        ClientInner::start_keepalive(&self.inner, session_id);
        log::info!("Session created, session ID={}", session_id);
        Ok(session)
    }

    /// Ask the gateway for its identity and plugin inventory.
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let reply = self.inner.request(Envelope::info).await?;
        Ok(ServerInfo::from_value(&reply))
    }

    /// Look up a live session by ID.
    pub fn session(&self, session_id: u64) -> Option<JanusSession> {
        self.inner.sessions.lock().unwrap().get(&session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().unwrap().len()
    }

    pub fn pending_transactions(&self) -> usize {
        self.inner.transactions.pending_count()
    }

    /// Destroy every session and close the transport.
    pub async fn disconnect(&self) {
        log::info!("Disconnecting from Janus Gateway");
        let sessions: Vec<JanusSession> = {
            let mut registry = self.inner.sessions.lock().unwrap();
            registry.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            session.destroy().await;
        }
        self.inner.stop_all_keepalives();
        if let Err(e) = self.inner.transport.close().await {
            log::debug!("Transport close failed: {}", e);
        }
    }
}

async fn wait_for_connected(events: &mut mpsc::Receiver<TransportEvent>) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Connected => return Ok(()),
            TransportEvent::Error(e) => return Err(JanusError::Connection(e)),
            TransportEvent::Closed { code, reason } => {
                return Err(JanusError::Connection(format!(
                    "closed during connect: {} {}",
                    code, reason
                )));
            }
            TransportEvent::Message(_) => {}
        }
    }
    Err(JanusError::Connection(
        "transport ended before connecting".to_string(),
    ))
}

impl ClientInner {
    /// Register a transaction, send the envelope, await the direct reply.
    pub(crate) async fn request(
        &self,
        build: impl FnOnce(String) -> Envelope,
    ) -> Result<Value> {
        let transaction = self.transactions.create_transaction();
        // Registration happens before the send so a fast reply cannot race
        // the registration.
        let receiver = self.transactions.register(&transaction)?;
        let envelope = build(transaction.clone());

        if let Err(e) = self.send_envelope(&envelope).await {
            self.transactions.forget(&transaction);
            return Err(e);
        }

        self.transactions
            .wait_for_response(&transaction, receiver, self.config.request_timeout)
            .await
    }

    /// Send without registering a completion: the reply, if the gateway
    /// sends one, is dropped by the transaction manager as unknown.
    pub(crate) async fn fire_and_forget(
        &self,
        build: impl FnOnce(String) -> Envelope,
    ) -> Result<()> {
        let transaction = self.transactions.create_transaction();
        self.send_envelope(&build(transaction)).await
    }

    pub(crate) async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let text = envelope.to_json()?;
        log::debug!("Sending message: {}", text);
        self.transport.send(text).await
    }

    /// Deregister a session and stop its keepalive.
    pub(crate) fn remove_session(&self, session_id: u64) {
        self.sessions.lock().unwrap().remove(&session_id);
        if let Some(task) = self.keepalive_tasks.lock().unwrap().remove(&session_id) {
            task.abort();
        }
    }

    /// Inbound routing, one invocation per frame, in arrival order.
    fn process_message(&self, text: &str) {
        let message = match IncomingMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Discarding unparseable frame: {}", e);
                return;
            }
        };

        if message.is_direct_reply() {
            // Presence checked by is_direct_reply.
            let transaction = message.transaction().unwrap_or_default().to_string();
            self.transactions.complete(&transaction, &message);
            return;
        }

        match message.janus() {
            "timeout" => {
                if let Some(session_id) = message.session_id() {
                    log::warn!("Gateway timed out session {}", session_id);
                    self.reclaim_session(session_id);
                }
            }
            _ => {
                let Some(session_id) = message.session_id() else {
                    log::warn!(
                        "Event with no session ID dropped (janus={})",
                        message.janus()
                    );
                    return;
                };
                let session = self.sessions.lock().unwrap().get(&session_id).cloned();
                match session {
                    Some(session) => session.handle_event(&message),
                    None => log::warn!("Event for unknown session {} dropped", session_id),
                }
            }
        }
    }

    /// The gateway reclaimed (or we lost) a session: drop local state only.
    fn reclaim_session(&self, session_id: u64) {
        let session = self.sessions.lock().unwrap().remove(&session_id);
        if let Some(session) = session {
            session.teardown_local();
        }
        if let Some(task) = self.keepalive_tasks.lock().unwrap().remove(&session_id) {
            task.abort();
        }
    }

    fn on_transport_closed(&self, code: u16, reason: &str) {
        log::warn!("WebSocket closed: {} - {}", code, reason);

        let failed = self.transactions.fail_all();
        if failed > 0 {
            log::warn!("Failed {} outstanding transactions: transport closed", failed);
        }

        let sessions: Vec<JanusSession> = {
            let mut registry = self.sessions.lock().unwrap();
            registry.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            session.teardown_local();
        }
        self.stop_all_keepalives();
    }

    /// Periodic keepalive per session, strictly under the gateway's session
    /// timeout. Stops when the session is removed or a send fails.
    fn start_keepalive(inner: &Arc<Self>, session_id: u64) {
        let weak = Arc::downgrade(inner);
        let interval = inner.config.keepalive_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; the session was just
            // created, so skip it.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let transaction = inner.transactions.create_transaction();
                let envelope = Envelope::keepalive(session_id, transaction);
                if let Err(e) = inner.send_envelope(&envelope).await {
                    log::warn!("Failed to send keepalive for session {}: {}", session_id, e);
                    break;
                }
                log::debug!("Sent keepalive for session {}", session_id);
            }
        });

        inner.keepalive_tasks.lock().unwrap().insert(session_id, task);
    }

    fn stop_all_keepalives(&self) {
        for (_, task) in self.keepalive_tasks.lock().unwrap().drain() {
            task.abort();
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(task) = self.router_task.lock().unwrap().take() {
            task.abort();
        }
        self.stop_all_keepalives();
    }
}
