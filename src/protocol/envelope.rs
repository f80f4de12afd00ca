use serde::Serialize;
use serde_json::Value;

/// Outbound wire envelope.
///
/// Every message this client sends is one of these, serialized as a single
/// JSON text frame. Optional fields are omitted from the wire entirely
/// rather than sent as null, which is what the gateway expects.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub janus: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsep: Option<Value>,
}

impl Envelope {
    fn bare(janus: &str, transaction: String) -> Self {
        Self {
            janus: janus.to_string(),
            transaction: Some(transaction),
            session_id: None,
            handle_id: None,
            plugin: None,
            body: None,
            jsep: None,
        }
    }

    /// `{janus:"create", transaction}`, the session bootstrap.
    pub fn create(transaction: String) -> Self {
        Self::bare("create", transaction)
    }

    /// `{janus:"info", transaction}`, the server info probe.
    pub fn info(transaction: String) -> Self {
        Self::bare("info", transaction)
    }

    /// `{janus:"attach", plugin, session_id, transaction}`
    pub fn attach(plugin: &str, session_id: u64, transaction: String) -> Self {
        let mut envelope = Self::bare("attach", transaction);
        envelope.plugin = Some(plugin.to_string());
        envelope.session_id = Some(session_id);
        envelope
    }

    /// `{janus:"message", body, session_id, handle_id, transaction[, jsep]}`
    pub fn message(
        session_id: u64,
        handle_id: u64,
        transaction: String,
        body: Value,
        jsep: Option<Value>,
    ) -> Self {
        let mut envelope = Self::bare("message", transaction);
        envelope.session_id = Some(session_id);
        envelope.handle_id = Some(handle_id);
        envelope.body = Some(body);
        envelope.jsep = jsep;
        envelope
    }

    /// `{janus:"detach", session_id, handle_id, transaction}`, fire-and-forget.
    pub fn detach(session_id: u64, handle_id: u64, transaction: String) -> Self {
        let mut envelope = Self::bare("detach", transaction);
        envelope.session_id = Some(session_id);
        envelope.handle_id = Some(handle_id);
        envelope
    }

    /// `{janus:"keepalive", session_id, transaction}`, sent periodically at an interval
    /// strictly under the gateway session timeout.
    pub fn keepalive(session_id: u64, transaction: String) -> Self {
        let mut envelope = Self::bare("keepalive", transaction);
        envelope.session_id = Some(session_id);
        envelope
    }

    /// `{janus:"destroy", session_id, transaction}`, the session teardown.
    pub fn destroy(session_id: u64, transaction: String) -> Self {
        let mut envelope = Self::bare("destroy", transaction);
        envelope.session_id = Some(session_id);
        envelope
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

/// Read-only view over a parsed inbound message.
///
/// The gateway sends untyped JSON; this wrapper centralizes the field
/// conventions (`janus`, `transaction`, `session_id`, `sender`,
/// `plugindata.data`, `jsep`, `error.reason`) so the routing code never
/// touches raw paths.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    value: Value,
}

impl IncomingMessage {
    pub fn parse(text: &str) -> crate::error::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self { value })
    }

    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    /// The `janus` message kind, or "" when absent.
    pub fn janus(&self) -> &str {
        self.value["janus"].as_str().unwrap_or("")
    }

    pub fn transaction(&self) -> Option<&str> {
        self.value["transaction"].as_str()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.value["session_id"].as_u64()
    }

    /// Handle ID that produced an asynchronous event.
    pub fn sender(&self) -> Option<u64> {
        self.value["sender"].as_u64()
    }

    /// `data.id` of a `success` reply to `create`/`attach`.
    pub fn data_id(&self) -> Option<u64> {
        self.value["data"]["id"].as_u64()
    }

    /// `plugindata.data` of an event or plugin reply.
    pub fn plugin_data(&self) -> Option<&Value> {
        let data = &self.value["plugindata"]["data"];
        if data.is_null() {
            None
        } else {
            Some(data)
        }
    }

    pub fn jsep(&self) -> Option<&Value> {
        let jsep = &self.value["jsep"];
        if jsep.is_null() {
            None
        } else {
            Some(jsep)
        }
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.value["error"]["reason"].as_str()
    }

    /// A direct reply resolves a pending transaction; everything else is an
    /// asynchronous event or a notice. Janus events echo the originating
    /// transaction, so the kind check matters as much as the field check.
    /// `server_info` is the one reply kind with its own tag instead of
    /// `success`.
    pub fn is_direct_reply(&self) -> bool {
        self.transaction().is_some()
            && matches!(self.janus(), "success" | "error" | "ack" | "server_info")
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
