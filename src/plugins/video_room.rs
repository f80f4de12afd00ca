//! VideoRoom plugin (`janus.plugin.videoroom`): SFU-style rooms with
//! publishers and subscribers.
//!
//! Event payloads are matched against a closed set of shapes. The gateway
//! tags most events through the `videoroom` field; the generic `event`
//! payloads are told apart by field presence (`publishers`, `unpublished`,
//! `leaving`, `switched`), first match wins.

use crate::error::{JanusError, Result};
use crate::plugins::{
    optional_bool, optional_str, optional_u64, plugin_reply_data, require_i64, require_str,
    require_u64, PluginEvent,
};
use crate::protocol::janus_handle::{HandleListener, JanusHandle, ListenerId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const TAG: &str = "videoroom";

// ---------------------------------------------------------------------------
// Models

/// One media stream of a publisher or subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    pub media_type: Option<String>,
    pub mindex: Option<u64>,
    pub mid: Option<String>,
    pub description: Option<String>,
    pub feed_id: Option<u64>,
}

impl StreamDescription {
    fn decode(value: &Value) -> Self {
        Self {
            media_type: optional_str(value, "type"),
            mindex: optional_u64(value, "mindex"),
            mid: optional_str(value, "mid"),
            description: optional_str(value, "description"),
            feed_id: optional_u64(value, "feed_id"),
        }
    }
}

/// An active publisher in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Publisher {
    pub id: u64,
    pub display: Option<String>,
    pub dummy: bool,
    pub talking: bool,
    pub streams: Vec<StreamDescription>,
}

impl Publisher {
    fn decode(value: &Value) -> Result<Self> {
        Ok(Self {
            id: require_u64(value, "id")?,
            display: optional_str(value, "display"),
            dummy: optional_bool(value, "dummy"),
            talking: optional_bool(value, "talking"),
            streams: value["streams"]
                .as_array()
                .map(|streams| streams.iter().map(StreamDescription::decode).collect())
                .unwrap_or_default(),
        })
    }
}

/// A non-publishing attendee (reported when `notify_joining` is on).
#[derive(Debug, Clone, PartialEq)]
pub struct Attendee {
    pub id: u64,
    pub display: Option<String>,
}

impl Attendee {
    fn decode(value: &Value) -> Result<Self> {
        Ok(Self {
            id: require_u64(value, "id")?,
            display: optional_str(value, "display"),
        })
    }
}

fn decode_publishers(data: &Value) -> Result<Vec<Publisher>> {
    data["publishers"]
        .as_array()
        .ok_or_else(|| JanusError::decode("publishers"))?
        .iter()
        .map(Publisher::decode)
        .collect()
}

// ---------------------------------------------------------------------------
// Typed events

/// The local user joined a room as a publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedEvent {
    pub room: u64,
    pub description: Option<String>,
    pub id: u64,
    pub private_id: u64,
    pub publishers: Vec<Publisher>,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomDestroyedEvent {
    pub room: u64,
}

/// A subscriber handle attached; a JSEP offer accompanies this event.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedEvent {
    pub room: u64,
    pub streams: Vec<StreamDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedEvent {
    pub room: u64,
    pub streams: Vec<StreamDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TalkingEvent {
    pub room: u64,
    pub id: u64,
    pub audio_level_avg: i64,
}

/// New publishers became active in the room.
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherAddedEvent {
    pub room: u64,
    pub publishers: Vec<Publisher>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnpublishedEvent {
    pub room: u64,
    pub unpublished: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantLeftEvent {
    pub room: u64,
    pub leaving: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchedEvent {
    pub room: u64,
    pub id: Option<u64>,
}

/// Every VideoRoom event shape this client decodes.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoRoomEvent {
    Joined(JoinedEvent),
    RoomDestroyed(RoomDestroyedEvent),
    Attached(AttachedEvent),
    Updated(UpdatedEvent),
    Talking(TalkingEvent),
    StoppedTalking(TalkingEvent),
    PublisherAdded(PublisherAddedEvent),
    Unpublished(UnpublishedEvent),
    ParticipantLeft(ParticipantLeftEvent),
    Switched(SwitchedEvent),
}

/// Decode one `plugindata.data` payload.
///
/// Returns `Ok(None)` for payloads matching no known shape (those reach
/// listeners only through the raw-event callback). A payload that matches a
/// shape but is missing a field fails with the offending field named.
pub fn decode_event(data: &Value) -> Result<Option<VideoRoomEvent>> {
    match data[TAG].as_str() {
        Some("joined") => Ok(Some(VideoRoomEvent::Joined(JoinedEvent {
            room: require_u64(data, "room")?,
            description: optional_str(data, "description"),
            id: require_u64(data, "id")?,
            private_id: require_u64(data, "private_id")?,
            publishers: decode_publishers(data)?,
            attendees: match data["attendees"].as_array() {
                Some(attendees) => attendees
                    .iter()
                    .map(Attendee::decode)
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            },
        }))),
        Some("destroyed") => Ok(Some(VideoRoomEvent::RoomDestroyed(RoomDestroyedEvent {
            room: require_u64(data, "room")?,
        }))),
        Some("attached") => Ok(Some(VideoRoomEvent::Attached(AttachedEvent {
            room: require_u64(data, "room")?,
            streams: data["streams"]
                .as_array()
                .ok_or_else(|| JanusError::decode("streams"))?
                .iter()
                .map(StreamDescription::decode)
                .collect(),
        }))),
        Some("updated") => Ok(Some(VideoRoomEvent::Updated(UpdatedEvent {
            room: require_u64(data, "room")?,
            streams: data["streams"]
                .as_array()
                .map(|streams| streams.iter().map(StreamDescription::decode).collect())
                .unwrap_or_default(),
        }))),
        Some("talking") => Ok(Some(VideoRoomEvent::Talking(decode_talking(data)?))),
        Some("stopped-talking") => {
            Ok(Some(VideoRoomEvent::StoppedTalking(decode_talking(data)?)))
        }
        // Generic `event` payloads (and untagged ones) are told apart by
        // field presence, in this order.
        _ => {
            if data["publishers"].is_array() {
                Ok(Some(VideoRoomEvent::PublisherAdded(PublisherAddedEvent {
                    room: require_u64(data, "room")?,
                    publishers: decode_publishers(data)?,
                })))
            } else if !data["unpublished"].is_null() {
                Ok(Some(VideoRoomEvent::Unpublished(UnpublishedEvent {
                    room: require_u64(data, "room")?,
                    unpublished: require_u64(data, "unpublished")?,
                })))
            } else if !data["leaving"].is_null() {
                Ok(Some(VideoRoomEvent::ParticipantLeft(ParticipantLeftEvent {
                    room: require_u64(data, "room")?,
                    leaving: require_u64(data, "leaving")?,
                })))
            } else if data["switched"].as_str() == Some("ok") {
                Ok(Some(VideoRoomEvent::Switched(SwitchedEvent {
                    room: require_u64(data, "room")?,
                    id: optional_u64(data, "id"),
                })))
            } else {
                Ok(None)
            }
        }
    }
}

fn decode_talking(data: &Value) -> Result<TalkingEvent> {
    Ok(TalkingEvent {
        room: require_u64(data, "room")?,
        id: require_u64(data, "id")?,
        audio_level_avg: require_i64(data, "audio-level-dBov-avg")?,
    })
}

// ---------------------------------------------------------------------------
// Listener

/// Receives VideoRoom events for one handle.
///
/// Callbacks run on the connection's delivery task; a blocking callback
/// stalls all further inbound processing for that connection. Hand work off
/// to a channel or spawned task if it can block.
pub trait VideoRoomListener: Send + Sync {
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
    fn on_subscriber_attached(&self, event: &AttachedEvent) {
        let _ = event;
    }
    fn on_subscription_updated(&self, event: &UpdatedEvent) {
        let _ = event;
    }
    fn on_talking(&self, event: &TalkingEvent) {
        let _ = event;
    }
    fn on_stopped_talking(&self, event: &TalkingEvent) {
        let _ = event;
    }
    fn on_publisher_added(&self, event: &PublisherAddedEvent) {
        let _ = event;
    }
    fn on_unpublished(&self, event: &UnpublishedEvent) {
        let _ = event;
    }
    fn on_participant_left(&self, event: &ParticipantLeftEvent) {
        let _ = event;
    }
    fn on_switched(&self, event: &SwitchedEvent) {
        let _ = event;
    }
}

pub(crate) fn dispatch(listener: &dyn VideoRoomListener, event: &VideoRoomEvent) {
    match event {
        VideoRoomEvent::Joined(e) => listener.on_joined(e),
        VideoRoomEvent::RoomDestroyed(e) => listener.on_room_destroyed(e),
        VideoRoomEvent::Attached(e) => listener.on_subscriber_attached(e),
        VideoRoomEvent::Updated(e) => listener.on_subscription_updated(e),
        VideoRoomEvent::Talking(e) => listener.on_talking(e),
        VideoRoomEvent::StoppedTalking(e) => listener.on_stopped_talking(e),
        VideoRoomEvent::PublisherAdded(e) => listener.on_publisher_added(e),
        VideoRoomEvent::Unpublished(e) => listener.on_unpublished(e),
        VideoRoomEvent::ParticipantLeft(e) => listener.on_participant_left(e),
        VideoRoomEvent::Switched(e) => listener.on_switched(e),
    }
}

// ---------------------------------------------------------------------------
// Requests

/// Settings for a new room. Unset fields take the gateway's defaults.
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
    pub publishers: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<bool>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_publishers: Option<u64>,
}

/// Join options for a publisher. The outcome (`joined`) arrives as an event,
/// not in the direct reply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinPublisherRequest {
    pub room: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinSubscriberRequest {
    pub room: u64,
    pub feed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
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
    pub num_participants: Option<u64>,
    #[serde(default)]
    pub max_publishers: Option<u64>,
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub record: Option<bool>,
}

/// One participant as returned by `listparticipants`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantInfo {
    pub id: u64,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub publisher: Option<bool>,
    #[serde(default)]
    pub talking: Option<bool>,
}

// ---------------------------------------------------------------------------
// Handle

/// Typed surface over a handle attached to the VideoRoom plugin.
#[derive(Clone)]
pub struct VideoRoomHandle {
    inner: Arc<JanusHandle>,
}

impl VideoRoomHandle {
    pub(crate) fn new(inner: Arc<JanusHandle>) -> Self {
        Self { inner }
    }

    /// The underlying protocol handle.
    pub fn handle(&self) -> &Arc<JanusHandle> {
        &self.inner
    }

    pub fn add_listener(&self, listener: Arc<dyn VideoRoomListener>) -> ListenerId {
        self.inner.add_listener(HandleListener::VideoRoom(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.remove_listener(id);
    }

    fn body(request: &str, payload: &impl Serialize) -> Result<Value> {
        let mut body = serde_json::to_value(payload)?;
        body["request"] = json!(request);
        Ok(body)
    }

    /// Create a room. Synchronous on the gateway side: the result is in the
    /// direct reply.
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

    pub async fn list_participants(&self, room: u64) -> Result<Vec<ParticipantInfo>> {
        let reply = self
            .inner
            .send_message(json!({"request": "listparticipants", "room": room}))
            .await?;
        let data = plugin_reply_data(&reply, TAG, "participants")?;
        let participants = data["participants"]
            .as_array()
            .ok_or_else(|| JanusError::decode("participants"))?;
        participants
            .iter()
            .map(|p| serde_json::from_value(p.clone()).map_err(Into::into))
            .collect()
    }

    /// Join as a publisher. The direct reply only acknowledges receipt; the
    /// `joined` outcome arrives through [`VideoRoomListener::on_joined`].
    pub async fn join_as_publisher(&self, request: JoinPublisherRequest) -> Result<()> {
        let mut body = Self::body("join", &request)?;
        body["ptype"] = json!("publisher");
        self.inner.send_message(body).await?;
        Ok(())
    }

    /// Join as a subscriber; the `attached` event carries the JSEP offer.
    pub async fn join_as_subscriber(&self, request: JoinSubscriberRequest) -> Result<()> {
        let mut body = Self::body("join", &request)?;
        body["ptype"] = json!("subscriber");
        self.inner.send_message(body).await?;
        Ok(())
    }

    /// Start publishing; `jsep` is the local SDP offer, carried opaquely.
    pub async fn publish(&self, request: PublishRequest, jsep: Value) -> Result<()> {
        self.inner
            .send_message_with_jsep(Self::body("publish", &request)?, jsep)
            .await?;
        Ok(())
    }

    /// Stop publishing; a successful unpublish arrives as an `unpublished`
    /// event.
    pub async fn unpublish(&self) -> Result<()> {
        self.inner.send_message(json!({"request": "unpublish"})).await?;
        Ok(())
    }

    /// Answer a subscription offer; `jsep` is the local SDP answer.
    pub async fn start(&self, jsep: Value) -> Result<()> {
        self.inner
            .send_message_with_jsep(json!({"request": "start"}), jsep)
            .await?;
        Ok(())
    }

    /// Leave the room; a successful leave arrives as a `leaving` event.
    pub async fn leave(&self) -> Result<()> {
        self.inner.send_message(json!({"request": "leave"})).await?;
        Ok(())
    }

    pub async fn kick(&self, room: u64, id: u64, secret: Option<String>) -> Result<()> {
        let mut body = json!({"request": "kick", "room": room, "id": id});
        if let Some(secret) = secret {
            body["secret"] = json!(secret);
        }
        let reply = self.inner.send_message(body).await?;
        plugin_reply_data(&reply, TAG, "success")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_joined() {
        let data = json!({
            "videoroom": "joined",
            "room": 1234u64,
            "description": "d",
            "id": 55u64,
            "private_id": 99u64,
            "publishers": []
        });
        match decode_event(&data).unwrap() {
            Some(VideoRoomEvent::Joined(event)) => {
                assert_eq!(event.room, 1234);
                assert_eq!(event.id, 55);
                assert_eq!(event.private_id, 99);
                assert!(event.publishers.is_empty());
                assert_eq!(event.description.as_deref(), Some("d"));
            }
            other => panic!("expected Joined, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bare_leaving_without_tag() {
        let data = json!({"room": 42u64, "leaving": 7u64});
        match decode_event(&data).unwrap() {
            Some(VideoRoomEvent::ParticipantLeft(event)) => {
                assert_eq!(event.room, 42);
                assert_eq!(event.leaving, 7);
            }
            other => panic!("expected ParticipantLeft, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_publishers_wins_over_later_shapes() {
        // Ambiguous payload: first match (publishers) wins.
        let data = json!({
            "videoroom": "event",
            "room": 1u64,
            "publishers": [{"id": 8u64, "display": "alice"}],
            "leaving": 9u64
        });
        match decode_event(&data).unwrap() {
            Some(VideoRoomEvent::PublisherAdded(event)) => {
                assert_eq!(event.publishers.len(), 1);
                assert_eq!(event.publishers[0].id, 8);
                assert_eq!(event.publishers[0].display.as_deref(), Some("alice"));
            }
            other => panic!("expected PublisherAdded, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unpublished() {
        let data = json!({"videoroom": "event", "room": 3u64, "unpublished": 12u64});
        assert_eq!(
            decode_event(&data).unwrap(),
            Some(VideoRoomEvent::Unpublished(UnpublishedEvent {
                room: 3,
                unpublished: 12
            }))
        );
    }

    #[test]
    fn test_decode_talking() {
        let data = json!({
            "videoroom": "talking", "room": 5u64, "id": 6u64, "audio-level-dBov-avg": -40
        });
        match decode_event(&data).unwrap() {
            Some(VideoRoomEvent::Talking(event)) => assert_eq!(event.audio_level_avg, -40),
            other => panic!("expected Talking, got {:?}", other),
        }
    }

    #[test]
    fn test_matched_shape_with_missing_field_fails() {
        // Tagged as joined but missing the room field.
        let data = json!({"videoroom": "joined", "id": 55u64, "private_id": 9u64, "publishers": []});
        match decode_event(&data) {
            Err(JanusError::Decode { field }) => assert_eq!(field, "room"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_shape_decodes_to_none() {
        let data = json!({"videoroom": "event", "room": 1u64, "configured": "ok"});
        assert_eq!(decode_event(&data).unwrap(), None);
    }
}
