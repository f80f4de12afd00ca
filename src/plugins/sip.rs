//! SIP plugin (`janus.plugin.sip`): registration and call signaling against
//! a SIP server, with media negotiated out of band via JSEP blobs.
//!
//! Unlike the room plugins, SIP events are tagged explicitly: the payload is
//! `{sip: "event", result: {event: "<kind>", ...}}`.

use crate::error::Result;
use crate::plugins::{optional_str, require_i64, require_str, Jsep, PluginEvent};
use crate::protocol::janus_handle::{HandleListener, JanusHandle, ListenerId};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Typed events

/// Registration with the SIP server succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredEvent {
    pub username: String,
    pub master_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationFailedEvent {
    pub code: i64,
    pub reason: String,
}

/// An incoming call; the caller's JSEP offer rides along when present.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCallEvent {
    pub username: String,
    pub call_id: String,
    pub display_name: Option<String>,
    pub callee: String,
    pub jsep: Option<Jsep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissedCallEvent {
    pub caller: String,
    pub display_name: Option<String>,
    pub callee: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HangupEvent {
    pub code: i64,
    pub reason: String,
    pub call_id: Option<String>,
}

/// A SIP MESSAGE addressed to the registered identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub sender: String,
    pub content_type: Option<String>,
    pub content: String,
}

/// A NOTIFY for a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyEvent {
    pub notify: Option<String>,
    pub substate: Option<String>,
    pub content_type: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SipEvent {
    Registered(RegisteredEvent),
    RegistrationFailed(RegistrationFailedEvent),
    IncomingCall(IncomingCallEvent),
    MissedCall(MissedCallEvent),
    Hangup(HangupEvent),
    Message(MessageEvent),
    Notify(NotifyEvent),
}

/// Decode one `plugindata.data` payload, keyed by `result.event`.
///
/// `jsep` is the envelope-level blob, threaded into the events that carry
/// one. `Ok(None)` for result kinds this client does not type (e.g.
/// `calling`, `proceeding`), which reach listeners raw.
pub fn decode_event(data: &Value, jsep: Option<&Jsep>) -> Result<Option<SipEvent>> {
    let result = &data["result"];
    if result.is_null() {
        return Ok(None);
    }

    match result["event"].as_str() {
        Some("registered") => Ok(Some(SipEvent::Registered(RegisteredEvent {
            username: require_str(result, "username")?,
            master_id: result["master_id"].as_u64(),
        }))),
        Some("registration_failed") => Ok(Some(SipEvent::RegistrationFailed(
            RegistrationFailedEvent {
                code: require_i64(result, "code")?,
                reason: optional_str(result, "reason").unwrap_or_default(),
            },
        ))),
        Some("incomingcall") => Ok(Some(SipEvent::IncomingCall(IncomingCallEvent {
            username: require_str(result, "username")?,
            call_id: require_str(result, "call_id")?,
            display_name: optional_str(result, "displayname"),
            callee: require_str(result, "callee")?,
            jsep: jsep.cloned(),
        }))),
        Some("missed_call") => Ok(Some(SipEvent::MissedCall(MissedCallEvent {
            caller: require_str(result, "caller")?,
            display_name: optional_str(result, "displayname"),
            callee: require_str(result, "callee")?,
        }))),
        Some("hangup") => Ok(Some(SipEvent::Hangup(HangupEvent {
            code: require_i64(result, "code")?,
            reason: optional_str(result, "reason").unwrap_or_default(),
            call_id: optional_str(result, "call_id").or_else(|| optional_str(data, "call_id")),
        }))),
        Some("message") => Ok(Some(SipEvent::Message(MessageEvent {
            sender: require_str(result, "sender")?,
            content_type: optional_str(result, "content_type"),
            content: require_str(result, "content")?,
        }))),
        Some("notify") => Ok(Some(SipEvent::Notify(NotifyEvent {
            notify: optional_str(result, "notify"),
            substate: optional_str(result, "substate"),
            content_type: optional_str(result, "content-type"),
            content: optional_str(result, "content"),
        }))),
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Listener

/// Receives SIP events for one handle.
///
/// Callbacks run on the connection's delivery task; do not block in them.
pub trait SipEventListener: Send + Sync {
    /// Every event, raw, before typed dispatch.
    fn on_event(&self, event: &PluginEvent) {
        let _ = event;
    }
    fn on_registered(&self, event: &RegisteredEvent) {
        let _ = event;
    }
    fn on_registration_failed(&self, event: &RegistrationFailedEvent) {
        let _ = event;
    }
    fn on_incoming_call(&self, event: &IncomingCallEvent) {
        let _ = event;
    }
    fn on_missed_call(&self, event: &MissedCallEvent) {
        let _ = event;
    }
    fn on_hangup(&self, event: &HangupEvent) {
        let _ = event;
    }
    fn on_message(&self, event: &MessageEvent) {
        let _ = event;
    }
    fn on_notify(&self, event: &NotifyEvent) {
        let _ = event;
    }
}

pub(crate) fn dispatch(listener: &dyn SipEventListener, event: &SipEvent) {
    match event {
        SipEvent::Registered(e) => listener.on_registered(e),
        SipEvent::RegistrationFailed(e) => listener.on_registration_failed(e),
        SipEvent::IncomingCall(e) => listener.on_incoming_call(e),
        SipEvent::MissedCall(e) => listener.on_missed_call(e),
        SipEvent::Hangup(e) => listener.on_hangup(e),
        SipEvent::Message(e) => listener.on_message(e),
        SipEvent::Notify(e) => listener.on_notify(e),
    }
}

// ---------------------------------------------------------------------------
// Requests

/// Registration parameters. `username` is the full SIP URI
/// (`sip:alice@example.org`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ha1_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authuser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

// ---------------------------------------------------------------------------
// Handle

/// Typed surface over a handle attached to the SIP plugin.
///
/// Every call operation is asynchronous on the gateway side: the direct
/// reply is an acknowledgement, and progress (`registered`, `incomingcall`,
/// `hangup`, ...) arrives through the registered [`SipEventListener`]s.
#[derive(Clone)]
pub struct SipHandle {
    inner: Arc<JanusHandle>,
}

impl SipHandle {
    pub(crate) fn new(inner: Arc<JanusHandle>) -> Self {
        Self { inner }
    }

    /// The underlying protocol handle.
    pub fn handle(&self) -> &Arc<JanusHandle> {
        &self.inner
    }

    pub fn add_listener(&self, listener: Arc<dyn SipEventListener>) -> ListenerId {
        self.inner.add_listener(HandleListener::Sip(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.remove_listener(id);
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<()> {
        let mut body = serde_json::to_value(&request)?;
        body["request"] = json!("register");
        self.inner.send_message(body).await?;
        Ok(())
    }

    pub async fn unregister(&self) -> Result<()> {
        self.inner.send_message(json!({"request": "unregister"})).await?;
        Ok(())
    }

    /// Place a call; `jsep` is the local SDP offer, carried opaquely.
    pub async fn call(&self, uri: &str, jsep: Value) -> Result<()> {
        self.inner
            .send_message_with_jsep(json!({"request": "call", "uri": uri}), jsep)
            .await?;
        Ok(())
    }

    /// Accept an incoming call; `jsep` is the local SDP answer.
    pub async fn accept(&self, jsep: Value) -> Result<()> {
        self.inner
            .send_message_with_jsep(json!({"request": "accept"}), jsep)
            .await?;
        Ok(())
    }

    /// Decline an incoming call. `code` defaults to 486 Busy Here.
    pub async fn decline(&self, code: Option<i64>) -> Result<()> {
        let mut body = json!({"request": "decline"});
        if let Some(code) = code {
            body["code"] = json!(code);
        }
        self.inner.send_message(body).await?;
        Ok(())
    }

    pub async fn hangup(&self) -> Result<()> {
        self.inner.send_message(json!({"request": "hangup"})).await?;
        Ok(())
    }

    /// Send a DTMF digit sequence over SIP INFO.
    pub async fn send_dtmf(&self, digits: &str) -> Result<()> {
        self.inner
            .send_message(json!({"request": "dtmf_info", "digit": digits}))
            .await?;
        Ok(())
    }
}
