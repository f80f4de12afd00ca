use crate::error::{JanusError, Result};
use crate::protocol::envelope::IncomingMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outcome delivered to the registered waiter: the full reply envelope on
/// success, the gateway-provided reason on `janus: "error"`.
pub type TransactionOutcome = std::result::Result<Value, JanusError>;

/// Correlates outbound requests with their direct replies.
///
/// Transaction identifiers are random 128-bit values, not counters: several
/// client instances may talk to the same gateway, and identifiers must not
/// collide across them. Each identifier maps to a single-resolution
/// completion handle; a transaction is resolved at most once, and completions
/// for unknown identifiers (late replies, duplicates, already timed out) are
/// dropped silently.
///
/// All operations are safe under arbitrary concurrent callers.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<TransactionOutcome>>>>,
    max_pending: usize,
}

impl TransactionManager {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            max_pending,
        }
    }

    /// Generate a fresh transaction identifier.
    ///
    /// UUIDv4 with the hyphens stripped, matching the opaque short strings
    /// the gateway echoes back verbatim.
    pub fn create_transaction(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Register a completion handle for `transaction` and return the
    /// receiving side.
    ///
    /// Must be called BEFORE the request is sent: registration-first ordering
    /// is what closes the race where a fast reply arrives before the caller
    /// is ready for it.
    pub fn register(&self, transaction: &str) -> Result<oneshot::Receiver<TransactionOutcome>> {
        let mut pending = self.pending.lock().unwrap();

        if pending.len() >= self.max_pending {
            return Err(JanusError::PendingLimit {
                max: self.max_pending,
            });
        }

        if pending.contains_key(transaction) {
            return Err(JanusError::DuplicateTransaction(transaction.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(transaction.to_string(), tx);
        Ok(rx)
    }

    /// Resolve the transaction named by `reply`, if it is still outstanding.
    ///
    /// Returns true when a waiter was resolved. An unknown identifier is a
    /// silent no-op; the waiter may have timed out and been reclaimed.
    pub fn complete(&self, transaction: &str, reply: &IncomingMessage) -> bool {
        let sender = self.pending.lock().unwrap().remove(transaction);

        match sender {
            Some(sender) => {
                let outcome = if reply.janus() == "error" {
                    let reason = reply.error_reason().unwrap_or("unknown error").to_string();
                    Err(JanusError::Gateway { reason })
                } else {
                    Ok(reply.value().clone())
                };
                // The waiter may have been dropped; that is not an error.
                let _ = sender.send(outcome);
                true
            }
            None => {
                log::debug!("Reply for unknown transaction '{}' dropped", transaction);
                false
            }
        }
    }

    /// Await the registered completion handle, bounded by `timeout`.
    ///
    /// On expiry the transaction is removed from the outstanding set so a
    /// very late reply cannot resurrect the abandoned call site.
    pub async fn wait_for_response(
        &self,
        transaction: &str,
        receiver: oneshot::Receiver<TransactionOutcome>,
        timeout: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without resolving: the map was cleared at
            // transport close.
            Ok(Err(_)) => Err(JanusError::TransportClosed),
            Err(_) => {
                self.pending.lock().unwrap().remove(transaction);
                Err(JanusError::Timeout {
                    transaction: transaction.to_string(),
                    elapsed: timeout,
                })
            }
        }
    }

    /// Abandon a single transaction without resolving it.
    pub fn forget(&self, transaction: &str) {
        self.pending.lock().unwrap().remove(transaction);
    }

    /// Fail every outstanding transaction with [`JanusError::TransportClosed`].
    ///
    /// Invoked when the transport closes so no waiter is left pending forever.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        let count = drained.len();
        for (_, sender) in drained {
            let _ = sender.send(Err(JanusError::TransportClosed));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}
