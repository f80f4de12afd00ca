//! # janus-gateway-client
//!
//! Async Rust client for the [Janus WebRTC Gateway] JSON-over-WebSocket API.
//! It covers the full control-plane lifecycle: sessions, plugin handles
//! (SIP, AudioBridge, VideoRoom, or any plugin by name), plugin requests,
//! and asynchronous server-pushed events decoded into typed records.
//!
//! The gateway multiplexes everything over one duplex connection and
//! correlates direct replies only by opaque transaction strings; this crate
//! turns that into safe concurrent request/response calls plus per-handle
//! event listeners. SDP/ICE/media are out of scope; JSEP blobs are carried
//! opaquely as JSON.
//!
//! [Janus WebRTC Gateway]: https://janus.conf.meetecho.com/
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use janus_gateway::{JanusClient, JanusConfig};
//! use janus_gateway::plugins::audio_bridge::JoinRoomRequest;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JanusConfig::new("ws://localhost:8188/janus");
//!     let client = JanusClient::connect(config).await?;
//!
//!     let info = client.server_info().await?;
//!     println!("Connected to {:?} ({:?})", info.name, info.version_string);
//!
//!     let session = client.create_session().await?;
//!     let audio = session.attach_audio_bridge().await?;
//!
//!     let joined = audio
//!         .join_room_async(
//!             JoinRoomRequest {
//!                 room: 1234,
//!                 display: Some("rust".to_string()),
//!                 ..Default::default()
//!             },
//!             Duration::from_secs(10),
//!         )
//!         .await?;
//!     println!("Joined room {} as participant {}", joined.room, joined.id);
//!
//!     session.destroy().await;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod plugins;
pub mod protocol;
pub mod transport;

// Configuration exports
pub use config::JanusConfig;

// Error exports
pub use error::JanusError;

// Result type alias
pub type Result<T> = std::result::Result<T, JanusError>;

// Protocol exports (client, session, handle, correlation)
pub use protocol::{
    Envelope, EventListener, IncomingMessage, JanusClient, JanusHandle, JanusSession, ListenerId,
    ServerInfo, TransactionManager,
};

// Plugin surface exports
pub use plugins::{Jsep, PluginEvent, PluginKind};

// Transport exports
pub use transport::{Transport, TransportEvent, WebSocketTransport};

/// Prelude module for convenient importing
pub mod prelude {
    pub use crate::plugins::audio_bridge::{AudioBridgeHandle, AudioBridgeListener};
    pub use crate::plugins::sip::{SipEventListener, SipHandle};
    pub use crate::plugins::video_room::{VideoRoomHandle, VideoRoomListener};
    pub use crate::{
        EventListener, JanusClient, JanusConfig, JanusError, JanusHandle, JanusSession, Jsep,
        PluginEvent, PluginKind, Result, ServerInfo,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "janus-gateway-client");
    }
}
