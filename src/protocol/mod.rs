pub mod envelope;
pub mod janus_client;
pub mod janus_handle;
pub mod janus_session;
pub mod transaction_manager;

pub use envelope::{Envelope, IncomingMessage};
pub use janus_client::{JanusClient, ServerInfo};
pub use janus_handle::{EventListener, HandleListener, JanusHandle, ListenerId};
pub use janus_session::JanusSession;
pub use transaction_manager::TransactionManager;
