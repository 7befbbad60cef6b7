//! Session registry: lazily built client/memory pairs keyed by session.
//!
//! The registry is responsible for:
//! - Constructing at most one session per key, even under concurrent first access
//! - Looking up, resetting and evicting sessions
//! - Letting a failed construction be retried cleanly

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::llm::{LLMError, UpstreamClient};

use super::error::SessionError;
use super::key::{ModelRef, SessionKey};
use super::memory::ConversationMemory;

// ============================================================================
// Session
// ============================================================================

/// One live pairing of an upstream client and its conversation memory.
pub struct Session {
    key: SessionKey,
    binding: ModelRef,
    client: Box<dyn UpstreamClient>,
    memory: Mutex<ConversationMemory>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Provider and model the client was built for.
    pub fn binding(&self) -> &ModelRef {
        &self.binding
    }

    pub fn client(&self) -> &dyn UpstreamClient {
        self.client.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Take exclusive access to the memory.
    ///
    /// Holding the guard serializes all work on this session; waiters are
    /// admitted in arrival order.
    pub async fn lock(&self) -> MutexGuard<'_, ConversationMemory> {
        self.memory.lock().await
    }

    /// Turn count, or `None` while an exchange holds the session.
    pub fn try_len(&self) -> Option<usize> {
        self.memory.try_lock().ok().map(|m| m.len())
    }
}

/// What a new session needs besides its client.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub binding: ModelRef,
    pub memory_tokens: usize,
}

/// Listing entry for an active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub key: String,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns: Option<usize>,
}

// ============================================================================
// Session Registry
// ============================================================================

type Outcome = Result<Arc<Session>, SessionError>;

enum Slot {
    Ready(Arc<Session>),
    Pending(watch::Receiver<Option<Outcome>>),
}

/// Registry of sessions.
///
/// Map locks are held only for lookups and the check-then-insert of a pending
/// slot; client construction and chat exchanges run outside them. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<DashMap<SessionKey, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, constructing it on first use.
    ///
    /// The first caller for an unseen key runs `factory`; concurrent callers
    /// for the same key wait and receive the same session, or the same error.
    /// A failed construction leaves no trace, so the next caller retries.
    pub async fn get_or_create<F>(
        &self,
        key: &SessionKey,
        spec: SessionSpec,
        factory: F,
    ) -> Result<Arc<Session>, SessionError>
    where
        F: FnOnce(&ModelRef) -> Result<Box<dyn UpstreamClient>, LLMError>,
    {
        let claim = match self.slots.entry(key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(session) => return Ok(Arc::clone(session)),
                Slot::Pending(rx) => Err(rx.clone()),
            },
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::Pending(rx));
                Ok(tx)
            }
        };

        let tx = match claim {
            Ok(tx) => tx,
            Err(rx) => return wait_for_construction(rx, key).await,
        };

        let mut guard = PendingGuard {
            slots: &self.slots,
            key,
            armed: true,
        };

        let outcome = match factory(&spec.binding) {
            Ok(client) => {
                let session = Arc::new(Session {
                    key: key.clone(),
                    binding: spec.binding,
                    client,
                    memory: Mutex::new(ConversationMemory::new(spec.memory_tokens)),
                    created_at: Utc::now(),
                });
                self.slots
                    .insert(key.clone(), Slot::Ready(Arc::clone(&session)));
                info!(session = %key, "Created session");
                Ok(session)
            }
            Err(e) => {
                self.slots
                    .remove_if(key, |_, slot| matches!(slot, Slot::Pending(_)));
                warn!(session = %key, error = %e, "Failed to create session client");
                Err(SessionError::Construction(Arc::new(e)))
            }
        };
        guard.armed = false;

        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Look up a constructed session.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        match self.slots.get(key)?.value() {
            Slot::Ready(session) => Some(Arc::clone(session)),
            Slot::Pending(_) => None,
        }
    }

    /// Clear a session's memory, keeping its client.
    pub async fn reset_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        let session = self
            .get(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;
        session.lock().await.reset();
        debug!(session = %key, "Reset session memory");
        Ok(())
    }

    /// Remove a session entirely; the next `get_or_create` builds a new one.
    pub fn evict(&self, key: &SessionKey) -> Result<Arc<Session>, SessionError> {
        match self
            .slots
            .remove_if(key, |_, slot| matches!(slot, Slot::Ready(_)))
        {
            Some((_, Slot::Ready(session))) => {
                info!(session = %key, "Evicted session");
                Ok(session)
            }
            _ => Err(SessionError::NotFound(key.clone())),
        }
    }

    /// Summaries of all constructed sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .slots
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::Ready(session) => Some(SessionSummary {
                    key: session.key().to_string(),
                    provider: session.binding().provider.clone(),
                    model: session.binding().model.clone(),
                    created_at: session.created_at(),
                    turns: session.try_len(),
                }),
                Slot::Pending(_) => None,
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        summaries
    }

    /// Number of constructed sessions.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn wait_for_construction(
    mut rx: watch::Receiver<Option<Outcome>>,
    key: &SessionKey,
) -> Outcome {
    debug!(session = %key, "Waiting for in-flight session construction");
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    outcome.unwrap_or_else(|| Err(SessionError::Abandoned(key.clone())))
}

/// Clears a pending slot if its constructor never finished (panic or cancellation).
struct PendingGuard<'a> {
    slots: &'a DashMap<SessionKey, Slot>,
    key: &'a SessionKey,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slots
                .remove_if(self.key, |_, slot| matches!(slot, Slot::Pending(_)));
        }
    }
}
