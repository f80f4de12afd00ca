use crate::error::{JanusError, Result};
use crate::plugins::audio_bridge::AudioBridgeHandle;
use crate::plugins::sip::SipHandle;
use crate::plugins::video_room::VideoRoomHandle;
use crate::plugins::PluginKind;
use crate::protocol::envelope::{Envelope, IncomingMessage};
use crate::protocol::janus_client::ClientInner;
use crate::protocol::janus_handle::JanusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// One gateway-side session: a container of plugin handles sharing a
/// keepalive.
///
/// Cloning is cheap and clones refer to the same session. The client's
/// registry owns the session; the session only points back weakly.
#[derive(Clone)]
pub struct JanusSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    session_id: u64,
    client: Weak<ClientInner>,
    handles: Mutex<HashMap<u64, Arc<JanusHandle>>>,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for JanusSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JanusSession")
            .field("session_id", &self.inner.session_id)
            .finish_non_exhaustive()
    }
}

impl JanusSession {
    pub(crate) fn new(session_id: u64, client: Weak<ClientInner>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id,
                client,
                handles: Mutex::new(HashMap::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.inner.session_id
    }

    pub fn handle_count(&self) -> usize {
        self.inner.handles.lock().unwrap().len()
    }

    /// Attach a plugin by package name with a typed kind.
    ///
    /// On success the new handle is registered under this session and
    /// starts receiving the events addressed to it.
    pub async fn attach_plugin(&self, plugin: &str, kind: PluginKind) -> Result<Arc<JanusHandle>> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(JanusError::SessionClosed);
        }
        let client = self.inner.client.upgrade().ok_or(JanusError::SessionClosed)?;

        let session_id = self.inner.session_id;
        let reply = client
            .request(|transaction| Envelope::attach(plugin, session_id, transaction))
            .await?;

        let handle_id = IncomingMessage::from_value(reply)
            .data_id()
            .ok_or_else(|| JanusError::decode("data.id"))?;

        let handle = Arc::new(JanusHandle::new(
            handle_id,
            session_id,
            kind,
            self.inner.client.clone(),
        ));
        self.inner
            .handles
            .lock()
            .unwrap()
            .insert(handle_id, handle.clone());
        log::info!(
            "Attached {} as handle {} on session {}",
            plugin,
            handle_id,
            session_id
        );
        Ok(handle)
    }

    /// Attach an arbitrary plugin; events are delivered raw only.
    pub async fn attach(&self, plugin: &str) -> Result<Arc<JanusHandle>> {
        self.attach_plugin(plugin, PluginKind::Generic).await
    }

    pub async fn attach_sip(&self) -> Result<SipHandle> {
        let handle = self
            .attach_plugin("janus.plugin.sip", PluginKind::Sip)
            .await?;
        Ok(SipHandle::new(handle))
    }

    pub async fn attach_audio_bridge(&self) -> Result<AudioBridgeHandle> {
        let handle = self
            .attach_plugin("janus.plugin.audiobridge", PluginKind::AudioBridge)
            .await?;
        Ok(AudioBridgeHandle::new(handle))
    }

    pub async fn attach_video_room(&self) -> Result<VideoRoomHandle> {
        let handle = self
            .attach_plugin("janus.plugin.videoroom", PluginKind::VideoRoom)
            .await?;
        Ok(VideoRoomHandle::new(handle))
    }

    /// Route one asynchronous event to the handle that produced it.
    ///
    /// An event for a handle not in the set is dropped quietly: the handle
    /// may have been detached locally while the event was in flight, which
    /// is an expected race, not an error.
    pub(crate) fn handle_event(&self, message: &IncomingMessage) {
        let Some(sender) = message.sender() else {
            log::debug!(
                "Session {}: event without sender dropped ({})",
                self.inner.session_id,
                message.janus()
            );
            return;
        };
        let handle = self.inner.handles.lock().unwrap().get(&sender).cloned();
        match handle {
            Some(handle) => handle.fire_event(message),
            None => log::debug!(
                "Session {}: event for unknown handle {} dropped",
                self.inner.session_id,
                sender
            ),
        }
    }

    /// Tear the session down.
    ///
    /// Detaches every owned handle (best-effort, fire-and-forget), tells
    /// the gateway to destroy the session, and deregisters from the client.
    /// Events still in flight for the old handles will be dropped.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles: Vec<Arc<JanusHandle>> = {
            let mut handles = self.inner.handles.lock().unwrap();
            handles.drain().map(|(_, handle)| handle).collect()
        };

        if let Some(client) = self.inner.client.upgrade() {
            for handle in &handles {
                if let Err(e) = handle.detach().await {
                    log::debug!("Detach for handle {} failed: {}", handle.handle_id(), e);
                }
            }
            let session_id = self.inner.session_id;
            if let Err(e) = client
                .fire_and_forget(|transaction| Envelope::destroy(session_id, transaction))
                .await
            {
                log::debug!("Destroy for session {} failed: {}", session_id, e);
            }
            client.remove_session(session_id);
        }
        log::info!("Session {} destroyed", self.inner.session_id);
    }

    /// Local-only teardown, used when the transport closed or the gateway
    /// already reclaimed the session: nothing is sent.
    pub(crate) fn teardown_local(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.handles.lock().unwrap().clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}
