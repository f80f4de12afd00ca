//! AudioBridge plugin (`janus.plugin.audiobridge`): mixed audio conference
//! rooms.
//!
//! Most room management requests are synchronous (result in the direct
//! reply); joining and leaving are asynchronous, with the outcome delivered
//! as an event. [`AudioBridgeHandle::join_room_async`] bridges the two by
//! resolving a local completion from the `joined` event.

use crate::error::{JanusError, Result};
use crate::plugins::{
    optional_str, plugin_reply_data, require_u64, PluginEvent,
};
use crate::protocol::janus_handle::{HandleListener, JanusHandle, ListenerId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

const TAG: &str = "audiobridge";

// ---------------------------------------------------------------------------
// Models

/// One participant in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: u64,
    pub display: Option<String>,
    pub setup: Option<bool>,
    pub muted: Option<bool>,
    pub talking: Option<bool>,
}

impl Participant {
    fn decode(value: &Value) -> Result<Self> {
        Ok(Self {
            id: require_u64(value, "id")?,
            display: optional_str(value, "display"),
            setup: value["setup"].as_bool(),
            muted: value["muted"].as_bool(),
            talking: value["talking"].as_bool(),
        })
    }
}

fn decode_participants(data: &Value) -> Result<Vec<Participant>> {
    data["participants"]
        .as_array()
        .ok_or_else(|| JanusError::decode("participants"))?
        .iter()
        .map(Participant::decode)
        .collect()
}

// ---------------------------------------------------------------------------
// Typed events

/// The local user joined a room.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedEvent {
    pub room: u64,
    pub id: u64,
    pub display: Option<String>,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomDestroyedEvent {
    pub room: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantLeftEvent {
    pub room: u64,
    pub leaving: u64,
}

/// A remote participant joined or changed state.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantsUpdatedEvent {
    pub room: u64,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioBridgeEvent {
    Joined(JoinedEvent),
    RoomDestroyed(RoomDestroyedEvent),
    ParticipantLeft(ParticipantLeftEvent),
    ParticipantsUpdated(ParticipantsUpdatedEvent),
}

/// Decode one `plugindata.data` payload; `Ok(None)` when no known shape
/// matches.
pub fn decode_event(data: &Value) -> Result<Option<AudioBridgeEvent>> {
    match data[TAG].as_str() {
        Some("joined") => Ok(Some(AudioBridgeEvent::Joined(JoinedEvent {
            room: require_u64(data, "room")?,
            id: require_u64(data, "id")?,
            display: optional_str(data, "display"),
            participants: decode_participants(data)?,
        }))),
        Some("destroyed") => Ok(Some(AudioBridgeEvent::RoomDestroyed(RoomDestroyedEvent {
            room: require_u64(data, "room")?,
        }))),
        _ => {
            if !data["leaving"].is_null() {
                Ok(Some(AudioBridgeEvent::ParticipantLeft(ParticipantLeftEvent {
                    room: require_u64(data, "room")?,
                    leaving: require_u64(data, "leaving")?,
                })))
            } else if data["participants"].is_array() {
                Ok(Some(AudioBridgeEvent::ParticipantsUpdated(
                    ParticipantsUpdatedEvent {
                        room: require_u64(data, "room")?,
                        participants: decode_participants(data)?,
                    },
                )))
            } else {
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Listener

/// Receives AudioBridge events for one handle.
///
/// Callbacks run on the connection's delivery task; do not block in them.
pub trait AudioBridgeListener: Send + Sync {
    /// Every event, raw, before typed dispatch.
    fn on_event(&self, event: &PluginEvent) {
        let _ = event;
    }
    fn on_joined(&self, event: &JoinedEvent) {
        let _ = event;
    }
    fn on_room_destroyed(&self, event: &RoomDestroyedEvent) {
        let _ = event;
    }
    fn on_participant_left(&self, event: &ParticipantLeftEvent) {
        let _ = event;
    }
    fn on_participants_updated(&self, event: &ParticipantsUpdatedEvent) {
        let _ = event;
    }
}

pub(crate) fn dispatch(listener: &dyn AudioBridgeListener, event: &AudioBridgeEvent) {
    match event {
        AudioBridgeEvent::Joined(e) => listener.on_joined(e),
        AudioBridgeEvent::RoomDestroyed(e) => listener.on_room_destroyed(e),
        AudioBridgeEvent::ParticipantLeft(e) => listener.on_participant_left(e),
        AudioBridgeEvent::ParticipantsUpdated(e) => listener.on_participants_updated(e),
    }
}

// ---------------------------------------------------------------------------
// Requests

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateRoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permanent: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditRoomRequest {
    pub room: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_pin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinRoomRequest {
    pub room: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigureRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

/// Reply to a successful `create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomResponse {
    pub room: u64,
    #[serde(default)]
    pub permanent: bool,
}

/// One room as returned by `list`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    pub room: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sampling_rate: Option<u64>,
    #[serde(default)]
    pub num_participants: Option<u64>,
    #[serde(default)]
    pub record: Option<bool>,
}

// ---------------------------------------------------------------------------
// Handle

/// Typed surface over a handle attached to the AudioBridge plugin.
#[derive(Clone)]
pub struct AudioBridgeHandle {
    inner: Arc<JanusHandle>,
}

impl AudioBridgeHandle {
    pub(crate) fn new(inner: Arc<JanusHandle>) -> Self {
        Self { inner }
    }

    /// The underlying protocol handle.
    pub fn handle(&self) -> &Arc<JanusHandle> {
        &self.inner
    }

    pub fn add_listener(&self, listener: Arc<dyn AudioBridgeListener>) -> ListenerId {
        self.inner
            .add_listener(HandleListener::AudioBridge(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.remove_listener(id);
    }

    fn body(request: &str, payload: &impl Serialize) -> Result<Value> {
        let mut body = serde_json::to_value(payload)?;
        body["request"] = json!(request);
        Ok(body)
    }

    pub async fn create_room(&self, request: CreateRoomRequest) -> Result<CreateRoomResponse> {
        let reply = self.inner.send_message(Self::body("create", &request)?).await?;
        let data = plugin_reply_data(&reply, TAG, "created")?;
        serde_json::from_value(data).map_err(Into::into)
    }

    pub async fn destroy_room(&self, room: u64, secret: Option<String>) -> Result<()> {
        let mut body = json!({"request": "destroy", "room": room});
        if let Some(secret) = secret {
            body["secret"] = json!(secret);
        }
        let reply = self.inner.send_message(body).await?;
        plugin_reply_data(&reply, TAG, "destroyed")?;
        Ok(())
    }

    pub async fn edit_room(&self, request: EditRoomRequest) -> Result<()> {
        let reply = self.inner.send_message(Self::body("edit", &request)?).await?;
        plugin_reply_data(&reply, TAG, "edited")?;
        Ok(())
    }

    pub async fn exists(&self, room: u64) -> Result<bool> {
        let reply = self
            .inner
            .send_message(json!({"request": "exists", "room": room}))
            .await?;
        let data = plugin_reply_data(&reply, TAG, "success")?;
        Ok(data["exists"].as_bool().unwrap_or(false))
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>> {
        let reply = self.inner.send_message(json!({"request": "list"})).await?;
        let data = plugin_reply_data(&reply, TAG, "success")?;
        let list = data["list"]
            .as_array()
            .ok_or_else(|| JanusError::decode("list"))?;
        list.iter()
            .map(|room| serde_json::from_value(room.clone()).map_err(Into::into))
            .collect()
    }

    pub async fn list_participants(&self, room: u64) -> Result<Vec<Participant>> {
        let reply = self
            .inner
            .send_message(json!({"request": "listparticipants", "room": room}))
            .await?;
        let data = plugin_reply_data(&reply, TAG, "participants")?;
        decode_participants(&data)
    }

    /// Join a room. The direct reply only acknowledges receipt; the `joined`
    /// outcome arrives through [`AudioBridgeListener::on_joined`] (or use
    /// [`join_room_async`](Self::join_room_async)).
    pub async fn join_room(&self, request: JoinRoomRequest) -> Result<()> {
        self.inner.send_message(Self::body("join", &request)?).await?;
        Ok(())
    }

    /// Join a room and wait for the `joined` event itself.
    ///
    /// A temporary listener resolves a local completion when a payload with
    /// `audiobridge == "joined"` arrives on this handle; the direct reply is
    /// only an acknowledgement and is not what this waits on.
    pub async fn join_room_async(
        &self,
        request: JoinRoomRequest,
        deadline: Duration,
    ) -> Result<JoinedEvent> {
        let (tx, rx) = oneshot::channel();
        let waiter: Arc<JoinWaiter> = Arc::new(JoinWaiter {
            resolve: Mutex::new(Some(tx)),
        });
        let listener_id = self.add_listener(waiter);

        let outcome = async {
            self.join_room(request).await?;
            match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(event)) => Ok(event),
                Ok(Err(_)) => Err(JanusError::SessionClosed),
                Err(_) => Err(JanusError::Timeout {
                    transaction: "audiobridge-join".to_string(),
                    elapsed: deadline,
                }),
            }
        }
        .await;

        self.inner.remove_listener(listener_id);
        outcome
    }

    pub async fn configure(&self, request: ConfigureRequest) -> Result<()> {
        self.inner
            .send_message(Self::body("configure", &request)?)
            .await?;
        Ok(())
    }

    pub async fn mute(&self, room: u64, id: u64, secret: Option<String>) -> Result<()> {
        self.moderate("mute", room, id, secret).await
    }

    pub async fn unmute(&self, room: u64, id: u64, secret: Option<String>) -> Result<()> {
        self.moderate("unmute", room, id, secret).await
    }

    pub async fn kick(&self, room: u64, id: u64, secret: Option<String>) -> Result<()> {
        self.moderate("kick", room, id, secret).await
    }

    async fn moderate(
        &self,
        request: &str,
        room: u64,
        id: u64,
        secret: Option<String>,
    ) -> Result<()> {
        let mut body = json!({"request": request, "room": room, "id": id});
        if let Some(secret) = secret {
            body["secret"] = json!(secret);
        }
        let reply = self.inner.send_message(body).await?;
        plugin_reply_data(&reply, TAG, "success")?;
        Ok(())
    }

    /// Leave the current room; the departure arrives as an event.
    pub async fn leave(&self) -> Result<()> {
        self.inner.send_message(json!({"request": "leave"})).await?;
        Ok(())
    }
}

/// One-shot listener backing [`AudioBridgeHandle::join_room_async`].
struct JoinWaiter {
    resolve: Mutex<Option<oneshot::Sender<JoinedEvent>>>,
}

impl AudioBridgeListener for JoinWaiter {
    fn on_joined(&self, event: &JoinedEvent) {
        if let Some(sender) = self.resolve.lock().unwrap().take() {
            let _ = sender.send(event.clone());
        }
    }
}
