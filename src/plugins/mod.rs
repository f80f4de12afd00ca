pub mod audio_bridge;
pub mod sip;
pub mod video_room;

use crate::error::{JanusError, Result};
use crate::protocol::envelope::IncomingMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of plugin attachments this client understands.
///
/// The tag selects which request builders apply to a handle and which
/// decoder runs over its events; anything attached as `Generic` only ever
/// sees raw events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Generic,
    Sip,
    AudioBridge,
    VideoRoom,
}

impl PluginKind {
    /// Gateway-side package name, for the kinds that have one.
    pub fn plugin_name(&self) -> Option<&'static str> {
        match self {
            PluginKind::Sip => Some("janus.plugin.sip"),
            PluginKind::AudioBridge => Some("janus.plugin.audiobridge"),
            PluginKind::VideoRoom => Some("janus.plugin.videoroom"),
            PluginKind::Generic => None,
        }
    }
}

/// JSEP offer/answer blob, carried opaquely alongside protocol messages.
/// This client never interprets the SDP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

/// One asynchronous event as delivered to listeners: the raw envelope, the
/// extracted JSEP (if any), and the instant it was received.
#[derive(Debug, Clone)]
pub struct PluginEvent {
    envelope: Value,
    jsep: Option<Jsep>,
    received_at: DateTime<Utc>,
}

impl PluginEvent {
    pub(crate) fn from_message(message: &IncomingMessage) -> Self {
        let jsep = message
            .jsep()
            .and_then(|j| serde_json::from_value(j.clone()).ok());
        Self {
            envelope: message.value().clone(),
            jsep,
            received_at: Utc::now(),
        }
    }

    /// The full raw event envelope.
    pub fn raw(&self) -> &Value {
        &self.envelope
    }

    /// The `plugindata.data` object, when present.
    pub fn plugin_data(&self) -> Option<&Value> {
        let data = &self.envelope["plugindata"]["data"];
        if data.is_null() {
            None
        } else {
            Some(data)
        }
    }

    pub fn jsep(&self) -> Option<&Jsep> {
        self.jsep.as_ref()
    }

    pub fn sender(&self) -> Option<u64> {
        self.envelope["sender"].as_u64()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

// Field extraction for the event decoders. A matched shape with a missing or
// mistyped field must fail naming that field, never yield partial data.

pub(crate) fn require_u64(data: &Value, field: &str) -> Result<u64> {
    data[field].as_u64().ok_or_else(|| JanusError::decode(field))
}

pub(crate) fn require_i64(data: &Value, field: &str) -> Result<i64> {
    data[field].as_i64().ok_or_else(|| JanusError::decode(field))
}

pub(crate) fn require_str(data: &Value, field: &str) -> Result<String> {
    data[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| JanusError::decode(field))
}

pub(crate) fn optional_u64(data: &Value, field: &str) -> Option<u64> {
    data[field].as_u64()
}

pub(crate) fn optional_str(data: &Value, field: &str) -> Option<String> {
    data[field].as_str().map(str::to_string)
}

pub(crate) fn optional_bool(data: &Value, field: &str) -> bool {
    data[field].as_bool().unwrap_or(false)
}

/// Unwrap `plugindata.data` of a synchronous plugin reply and verify its
/// result tag (`videoroom`/`audiobridge` field). Plugin-level failures come
/// back as a tagged `event` payload carrying `error`, not as a `janus:
/// "error"` envelope.
pub(crate) fn plugin_reply_data(reply: &Value, tag_field: &str, expected: &str) -> Result<Value> {
    let data = &reply["plugindata"]["data"];
    if data.is_null() {
        return Err(JanusError::decode("plugindata.data"));
    }
    match data[tag_field].as_str() {
        Some(tag) if tag == expected => Ok(data.clone()),
        _ => {
            if let Some(error) = data["error"].as_str() {
                Err(JanusError::Gateway {
                    reason: error.to_string(),
                })
            } else {
                Err(JanusError::Gateway {
                    reason: format!(
                        "unexpected {} reply tag: {}",
                        tag_field,
                        data[tag_field].clone()
                    ),
                })
            }
        }
    }
}
