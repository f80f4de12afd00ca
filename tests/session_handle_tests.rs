//! Session and handle behavior over the in-memory transport: attach flows,
//! message envelopes, plugin request/reply handling and the
//! listener-resolved join pattern.

use test_utils::*;

use janus_gateway::plugins::audio_bridge::JoinRoomRequest;
use janus_gateway::plugins::video_room::CreateRoomRequest;
use janus_gateway::{JanusError, PluginKind};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_attach_typed_handles() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 1).await;

    gateway.respond_next("attach", |request| {
        assert_eq!(request["plugin"], "janus.plugin.sip");
        assert_eq!(request["session_id"], 1);
        success_with_id(request, 51)
    });
    let sip = session.attach_sip().await.unwrap();
    assert_eq!(sip.handle().handle_id(), 51);
    assert_eq!(sip.handle().kind(), PluginKind::Sip);

    gateway.respond_next("attach", |request| success_with_id(request, 52));
    let audio = session.attach_audio_bridge().await.unwrap();
    assert_eq!(audio.handle().kind(), PluginKind::AudioBridge);

    gateway.respond_next("attach", |request| success_with_id(request, 53));
    let video = session.attach_video_room().await.unwrap();
    assert_eq!(video.handle().kind(), PluginKind::VideoRoom);

    assert_eq!(session.handle_count(), 3);
}

#[tokio::test]
async fn test_attach_on_destroyed_session_fails() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 1).await;
    session.destroy().await;

    match session.attach("janus.plugin.echotest").await {
        Err(JanusError::SessionClosed) => {}
        other => panic!("expected SessionClosed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_message_envelope_embeds_session_and_handle() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 9).await;

    gateway.respond_next("attach", |request| success_with_id(request, 77));
    let handle = session.attach("janus.plugin.videoroom").await.unwrap();

    gateway.respond_next("message", ack);
    handle
        .send_message(json!({"request": "configure", "bitrate": 128000}))
        .await
        .unwrap();

    let message = &gateway.sent_of_kind("message")[0];
    assert_eq!(message["session_id"], 9);
    assert_eq!(message["handle_id"], 77);
    assert_eq!(message["body"]["request"], "configure");
    assert!(message["transaction"].is_string());
    assert!(message["jsep"].is_null());
}

#[tokio::test]
async fn test_message_with_jsep_carries_blob() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 9).await;

    gateway.respond_next("attach", |request| success_with_id(request, 77));
    let handle = session.attach("janus.plugin.videoroom").await.unwrap();

    gateway.respond_next("message", ack);
    handle
        .send_message_with_jsep(
            json!({"request": "publish"}),
            json!({"type": "offer", "sdp": "v=0\r\n"}),
        )
        .await
        .unwrap();

    let message = &gateway.sent_of_kind("message")[0];
    assert_eq!(message["jsep"]["type"], "offer");
}

#[tokio::test]
async fn test_video_room_create_room_round_trip() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 2).await;

    gateway.respond_next("attach", |request| success_with_id(request, 60));
    let video = session.attach_video_room().await.unwrap();

    gateway.respond_next("message", |request| {
        assert_eq!(request["body"]["request"], "create");
        assert_eq!(request["body"]["description"], "demo");
        json!({
            "janus": "success",
            "transaction": request["transaction"],
            "sender": 60,
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {"videoroom": "created", "room": 4242, "permanent": false}
            }
        })
    });

    let created = video
        .create_room(CreateRoomRequest {
            description: Some("demo".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.room, 4242);
    assert!(!created.permanent);
}

#[tokio::test]
async fn test_plugin_level_error_surfaces_as_gateway_error() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 2).await;

    gateway.respond_next("attach", |request| success_with_id(request, 61));
    let video = session.attach_video_room().await.unwrap();

    gateway.respond_next("message", |request| {
        json!({
            "janus": "success",
            "transaction": request["transaction"],
            "plugindata": {
                "plugin": "janus.plugin.videoroom",
                "data": {"videoroom": "event", "error_code": 426, "error": "No such room"}
            }
        })
    });

    match video.destroy_room(99, None).await {
        Err(JanusError::Gateway { reason }) => assert_eq!(reason, "No such room"),
        other => panic!("expected gateway error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_audio_bridge_join_room_async_resolves_on_event() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 3).await;

    gateway.respond_next("attach", |request| success_with_id(request, 70));
    let audio = session.attach_audio_bridge().await.unwrap();

    // The direct reply is only an ack; the joined outcome follows as an
    // event addressed to the handle.
    let event_gateway = gateway.clone();
    tokio::spawn(async move {
        let request = event_gateway.wait_for("message").await;
        event_gateway.push(ack(&request)).await;
        event_gateway
            .push(json!({
                "janus": "event",
                "session_id": 3,
                "sender": 70,
                "plugindata": {
                    "plugin": "janus.plugin.audiobridge",
                    "data": {
                        "audiobridge": "joined",
                        "room": 1234,
                        "id": 888,
                        "participants": []
                    }
                }
            }))
            .await;
    });

    let joined = audio
        .join_room_async(
            JoinRoomRequest {
                room: 1234,
                display: Some("rust".to_string()),
                ..Default::default()
            },
            Duration::from_secs(2),
        )
        .await
        .unwrap();

    assert_eq!(joined.room, 1234);
    assert_eq!(joined.id, 888);
    // The temporary waiter removed itself.
    assert_eq!(audio.handle().listener_count(), 0);
}

#[tokio::test]
async fn test_join_room_async_times_out_without_event() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 3).await;

    gateway.respond_next("attach", |request| success_with_id(request, 71));
    let audio = session.attach_audio_bridge().await.unwrap();

    // Ack the join but never send the joined event.
    gateway.respond_next("message", ack);

    match audio
        .join_room_async(
            JoinRoomRequest {
                room: 1,
                ..Default::default()
            },
            Duration::from_millis(100),
        )
        .await
    {
        Err(JanusError::Timeout { .. }) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(audio.handle().listener_count(), 0);
}

#[tokio::test]
async fn test_send_message_timeout_without_reply() {
    let mut config = test_config();
    config.request_timeout = Duration::from_millis(100);
    let (client, gateway) = connect_client(config).await;
    let session = create_session(&client, &gateway, 5).await;

    gateway.respond_next("attach", |request| success_with_id(request, 90));
    let handle = session.attach("janus.plugin.echotest").await.unwrap();

    // Nobody answers the message: the caller gets a timeout, and the
    // transaction is reclaimed.
    match handle.send_message(json!({"request": "ping"})).await {
        Err(JanusError::Timeout { .. }) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(client.pending_transactions(), 0);

    // The late reply resolves nothing.
    let message = gateway.wait_for("message").await;
    gateway
        .push(json!({"janus": "success", "transaction": message["transaction"]}))
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(client.pending_transactions(), 0);
}

#[tokio::test]
async fn test_detach_is_fire_and_forget() {
    let (client, gateway) = connect_client(test_config()).await;
    let session = create_session(&client, &gateway, 4).await;

    gateway.respond_next("attach", |request| success_with_id(request, 80));
    let handle = session.attach("janus.plugin.echotest").await.unwrap();

    handle.detach().await.unwrap();
    let detach = &gateway.sent_of_kind("detach")[0];
    assert_eq!(detach["session_id"], 4);
    assert_eq!(detach["handle_id"], 80);

    // The gateway's success reply for it resolves nothing and harms nothing.
    gateway
        .push(json!({"janus": "success", "transaction": detach["transaction"]}))
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(client.pending_transactions(), 0);
}
