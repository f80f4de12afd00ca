use crate::error::{JanusError, Result};
use crate::plugins::audio_bridge::{self, AudioBridgeListener};
use crate::plugins::sip::{self, SipEventListener};
use crate::plugins::video_room::{self, VideoRoomListener};
use crate::plugins::{PluginEvent, PluginKind};
use crate::protocol::envelope::{Envelope, IncomingMessage};
use crate::protocol::janus_client::ClientInner;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Identifies one registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener for handles attached as [`PluginKind::Generic`], or for callers
/// that only want raw payloads.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PluginEvent);
}

/// A registered listener. The set of kinds is closed: dispatch matches
/// exhaustively instead of dynamic-casting through an open hierarchy.
#[derive(Clone)]
pub enum HandleListener {
    Generic(Arc<dyn EventListener>),
    Sip(Arc<dyn SipEventListener>),
    AudioBridge(Arc<dyn AudioBridgeListener>),
    VideoRoom(Arc<dyn VideoRoomListener>),
}

/// Typed form of one event, produced at most once per dispatch.
enum DecodedEvent {
    None,
    Sip(sip::SipEvent),
    AudioBridge(audio_bridge::AudioBridgeEvent),
    VideoRoom(video_room::VideoRoomEvent),
}

/// One gateway-side plugin attachment.
///
/// The session owns the handle; the handle only points back at the client
/// internals weakly, for building outbound envelopes. Every `message`
/// envelope built here embeds this handle's session and handle IDs.
pub struct JanusHandle {
    handle_id: u64,
    session_id: u64,
    kind: PluginKind,
    client: Weak<ClientInner>,
    listeners: Mutex<Vec<(u64, HandleListener)>>,
    next_listener_id: AtomicU64,
}

impl std::fmt::Debug for JanusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JanusHandle")
            .field("handle_id", &self.handle_id)
            .field("session_id", &self.session_id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl JanusHandle {
    pub(crate) fn new(
        handle_id: u64,
        session_id: u64,
        kind: PluginKind,
        client: Weak<ClientInner>,
    ) -> Self {
        Self {
            handle_id,
            session_id,
            kind,
            client,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn handle_id(&self) -> u64 {
        self.handle_id
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Send a plugin request and wait for the direct reply.
    ///
    /// The reply is frequently a bare `ack`: for asynchronous plugin actions
    /// the meaningful outcome arrives later as an event, matched by a
    /// listener rather than by this transaction.
    pub async fn send_message(&self, body: Value) -> Result<Value> {
        self.send(body, None).await
    }

    /// Same as [`send_message`](Self::send_message), with a JSEP blob
    /// attached to the envelope.
    pub async fn send_message_with_jsep(&self, body: Value, jsep: Value) -> Result<Value> {
        self.send(body, Some(jsep)).await
    }

    async fn send(&self, body: Value, jsep: Option<Value>) -> Result<Value> {
        let client = self.client.upgrade().ok_or(JanusError::SessionClosed)?;
        client
            .request(|transaction| {
                Envelope::message(self.session_id, self.handle_id, transaction, body, jsep)
            })
            .await
    }

    /// Detach from the gateway. Fire-and-forget: the reply, if any, is not
    /// awaited.
    pub async fn detach(&self) -> Result<()> {
        let client = self.client.upgrade().ok_or(JanusError::SessionClosed)?;
        client
            .fire_and_forget(|transaction| {
                Envelope::detach(self.session_id, self.handle_id, transaction)
            })
            .await
    }

    pub(crate) fn add_listener(&self, listener: HandleListener) -> ListenerId {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, listener));
        ListenerId(id)
    }

    /// Register a raw-event listener regardless of the handle's plugin kind.
    pub fn add_event_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        self.add_listener(HandleListener::Generic(listener))
    }

    /// Remove a listener. Safe while a dispatch is in progress: the
    /// in-flight dispatch operates on its own snapshot and is unaffected.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver one asynchronous event to every registered listener.
    ///
    /// Runs on the connection's sequential delivery task: events for a
    /// single handle reach listeners in gateway emission order, and a
    /// listener that blocks stalls all further inbound processing for the
    /// connection. Dispatch iterates a snapshot taken here; listeners
    /// added or removed mid-dispatch only affect subsequent events.
    pub(crate) fn fire_event(&self, message: &IncomingMessage) {
        let event = PluginEvent::from_message(message);
        let decoded = self.decode(&event);

        let snapshot: Vec<(u64, HandleListener)> = self.listeners.lock().unwrap().clone();
        for (_, listener) in &snapshot {
            // A faulty listener must not starve the remaining ones.
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                Self::dispatch_one(listener, &event, &decoded)
            }));
            if outcome.is_err() {
                log::error!(
                    "Listener on handle {} panicked during event dispatch; continuing",
                    self.handle_id
                );
            }
        }
    }

    fn decode(&self, event: &PluginEvent) -> DecodedEvent {
        let Some(data) = event.plugin_data() else {
            return DecodedEvent::None;
        };
        let decoded = match self.kind {
            PluginKind::Generic => Ok(DecodedEvent::None),
            PluginKind::Sip => sip::decode_event(data, event.jsep())
                .map(|e| e.map_or(DecodedEvent::None, DecodedEvent::Sip)),
            PluginKind::AudioBridge => audio_bridge::decode_event(data)
                .map(|e| e.map_or(DecodedEvent::None, DecodedEvent::AudioBridge)),
            PluginKind::VideoRoom => video_room::decode_event(data)
                .map(|e| e.map_or(DecodedEvent::None, DecodedEvent::VideoRoom)),
        };
        match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                // Listeners still see the raw payload through on_event.
                log::warn!("Failed to decode event on handle {}: {}", self.handle_id, e);
                DecodedEvent::None
            }
        }
    }

    fn dispatch_one(listener: &HandleListener, event: &PluginEvent, decoded: &DecodedEvent) {
        match listener {
            HandleListener::Generic(l) => l.on_event(event),
            HandleListener::Sip(l) => {
                l.on_event(event);
                if let DecodedEvent::Sip(typed) = decoded {
                    sip::dispatch(l.as_ref(), typed);
                }
            }
            HandleListener::AudioBridge(l) => {
                l.on_event(event);
                if let DecodedEvent::AudioBridge(typed) = decoded {
                    audio_bridge::dispatch(l.as_ref(), typed);
                }
            }
            HandleListener::VideoRoom(l) => {
                l.on_event(event);
                if let DecodedEvent::VideoRoom(typed) = decoded {
                    video_room::dispatch(l.as_ref(), typed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct CountingListener {
        raw_events: AtomicUsize,
        joined_events: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                raw_events: AtomicUsize::new(0),
                joined_events: AtomicUsize::new(0),
            })
        }
    }

    impl VideoRoomListener for CountingListener {
        fn on_event(&self, _event: &PluginEvent) {
            self.raw_events.fetch_add(1, Ordering::SeqCst);
        }
        fn on_joined(&self, _event: &video_room::JoinedEvent) {
            self.joined_events.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingListener;

    impl VideoRoomListener for PanickingListener {
        fn on_event(&self, _event: &PluginEvent) {
            panic!("listener bug");
        }
    }

    fn video_room_handle() -> JanusHandle {
        JanusHandle::new(9, 1, PluginKind::VideoRoom, Weak::new())
    }

    fn joined_message() -> IncomingMessage {
        IncomingMessage::from_value(json!({
            "janus": "event",
            "session_id": 1,
            "sender": 9,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {
                    "videoroom": "joined",
                    "room": 1234u64,
                    "description": "d",
                    "id": 55u64,
                    "private_id": 99u64,
                    "publishers": []
                }
            }
        }))
    }

    #[test]
    fn test_typed_and_raw_dispatch() {
        let handle = video_room_handle();
        let listener = CountingListener::new();
        handle.add_listener(HandleListener::VideoRoom(listener.clone()));

        handle.fire_event(&joined_message());

        assert_eq!(listener.raw_events.load(Ordering::SeqCst), 1);
        assert_eq!(listener.joined_events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let handle = video_room_handle();
        handle.add_listener(HandleListener::VideoRoom(Arc::new(PanickingListener)));
        let listener = CountingListener::new();
        handle.add_listener(HandleListener::VideoRoom(listener.clone()));

        handle.fire_event(&joined_message());

        assert_eq!(listener.raw_events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listener_no_longer_invoked() {
        let handle = video_room_handle();
        let listener = CountingListener::new();
        let id = handle.add_listener(HandleListener::VideoRoom(listener.clone()));

        handle.fire_event(&joined_message());
        handle.remove_listener(id);
        handle.fire_event(&joined_message());

        assert_eq!(listener.raw_events.load(Ordering::SeqCst), 1);
        assert_eq!(handle.listener_count(), 0);
    }

    #[test]
    fn test_malformed_payload_still_reaches_raw_listener() {
        let handle = video_room_handle();
        let listener = CountingListener::new();
        handle.add_listener(HandleListener::VideoRoom(listener.clone()));

        // Tagged as joined but missing required fields: decode fails, raw
        // delivery still happens.
        let message = IncomingMessage::from_value(json!({
            "janus": "event",
            "sender": 9,
            "plugindata": {"data": {"videoroom": "joined"}}
        }));
        handle.fire_event(&message);

        assert_eq!(listener.raw_events.load(Ordering::SeqCst), 1);
        assert_eq!(listener.joined_events.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_after_client_drop_fails() {
        let handle = video_room_handle();
        let result = handle.send_message(json!({"request": "list"})).await;
        assert!(matches!(result, Err(JanusError::SessionClosed)));
    }
}
