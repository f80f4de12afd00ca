//! End-to-end event decoding: raw frames pushed through the client reach
//! typed listeners with the right record fields.

use test_utils::*;

use janus_gateway::plugins::sip::{IncomingCallEvent, SipEventListener};
use janus_gateway::plugins::video_room::{
    JoinedEvent, ParticipantLeftEvent, VideoRoomListener,
};
use janus_gateway::PluginEvent;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingVideoRoomListener {
    raw: Mutex<Vec<serde_json::Value>>,
    joined: Mutex<Vec<JoinedEvent>>,
    left: Mutex<Vec<ParticipantLeftEvent>>,
}

impl VideoRoomListener for RecordingVideoRoomListener {
    fn on_event(&self, event: &PluginEvent) {
        self.raw.lock().unwrap().push(event.raw().clone());
    }
    fn on_joined(&self, event: &JoinedEvent) {
        self.joined.lock().unwrap().push(event.clone());
    }
    fn on_participant_left(&self, event: &ParticipantLeftEvent) {
        self.left.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
struct RecordingSipListener {
    incoming: Mutex<Vec<IncomingCallEvent>>,
}

impl SipEventListener for RecordingSipListener {
    fn on_incoming_call(&self, event: &IncomingCallEvent) {
        self.incoming.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_video_room_joined_event_flow() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 1).await;

    gateway.respond_next("attach", |request| success_with_id(request, 40));
    let video = session.attach_video_room().await.unwrap();

    let listener = Arc::new(RecordingVideoRoomListener::default());
    video.add_listener(listener.clone());

    gateway
        .push(json!({
            "janus": "event",
            "session_id": 1,
            "sender": 40,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {
                    "videoroom": "joined",
                    "room": 1234,
                    "description": "d",
                    "id": 55,
                    "private_id": 99,
                    "publishers": []
                }
            }
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let joined = listener.joined.lock().unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].room, 1234);
    assert_eq!(joined[0].id, 55);
    assert_eq!(joined[0].private_id, 99);
    assert!(joined[0].publishers.is_empty());
    assert_eq!(listener.raw.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_video_room_bare_leaving_event_flow() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 1).await;

    gateway.respond_next("attach", |request| success_with_id(request, 41));
    let video = session.attach_video_room().await.unwrap();

    let listener = Arc::new(RecordingVideoRoomListener::default());
    video.add_listener(listener.clone());

    // No `videoroom` tag at all: the leaving field alone selects the shape.
    gateway
        .push(json!({
            "janus": "event",
            "session_id": 1,
            "sender": 41,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {"room": 42, "leaving": 7}
            }
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let left = listener.left.lock().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].room, 42);
    assert_eq!(left[0].leaving, 7);
}

#[tokio::test]
async fn test_malformed_payload_reaches_raw_listener_only() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 1).await;

    gateway.respond_next("attach", |request| success_with_id(request, 42));
    let video = session.attach_video_room().await.unwrap();

    let listener = Arc::new(RecordingVideoRoomListener::default());
    video.add_listener(listener.clone());

    // Tagged as joined but missing every required field.
    gateway
        .push(json!({
            "janus": "event",
            "session_id": 1,
            "sender": 42,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {"videoroom": "joined"}
            }
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(listener.joined.lock().unwrap().len(), 0);
    assert_eq!(listener.raw.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sip_incoming_call_event_flow_with_jsep() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 2).await;

    gateway.respond_next("attach", |request| success_with_id(request, 50));
    let sip = session.attach_sip().await.unwrap();

    let listener = Arc::new(RecordingSipListener::default());
    sip.add_listener(listener.clone());

    gateway
        .push(json!({
            "janus": "event",
            "session_id": 2,
            "sender": 50,
            "plugindata": {
                "plugin": "janus.plugin.sip",
                "data": {
                    "sip": "event",
                    "call_id": "a1b2c3",
                    "result": {
                        "event": "incomingcall",
                        "username": "sip:alice@example.org",
                        "call_id": "a1b2c3",
                        "displayname": "Alice",
                        "callee": "sip:bob@example.org"
                    }
                }
            },
            "jsep": {"type": "offer", "sdp": "v=0\r\n"}
        }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let incoming = listener.incoming.lock().unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].username, "sip:alice@example.org");
    assert_eq!(incoming[0].call_id, "a1b2c3");
    assert_eq!(incoming[0].callee, "sip:bob@example.org");
    assert_eq!(incoming[0].jsep.as_ref().unwrap().kind, "offer");
    assert_eq!(incoming[0].jsep.as_ref().unwrap().sdp, "v=0\r\n");
}

#[tokio::test]
async fn test_events_delivered_in_emission_order() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 3).await;

    gateway.respond_next("attach", |request| success_with_id(request, 60));
    let video = session.attach_video_room().await.unwrap();

    let listener = Arc::new(RecordingVideoRoomListener::default());
    video.add_listener(listener.clone());

    for leaving in 1..=5u64 {
        gateway
            .push(json!({
                "janus": "event",
                "session_id": 3,
                "sender": 60,
                "plugindata": {"data": {"room": 1, "leaving": leaving}}
            }))
            .await;
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    let left = listener.left.lock().unwrap();
    let order: Vec<u64> = left.iter().map(|event| event.leaving).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
}
