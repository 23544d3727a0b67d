//! Session store — one conversation state per visitor session.
//!
//! Each state sits behind its own async mutex so requests for one session
//! serialize while different sessions proceed in parallel. Sessions are
//! evicted when idle past the TTL, and the least recently active session
//! makes room when the store is full. A session whose state is locked by an
//! in-flight request is never evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use biochat_core::conversation::{ConversationState, SessionId};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

/// A shared handle to one session's state.
pub type SessionHandle = Arc<Mutex<ConversationState>>;

struct SessionSlot {
    state: SessionHandle,
    last_active: Instant,
}

impl SessionSlot {
    /// A request currently holds this session's state.
    fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Fetch the session's state, creating it on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> SessionHandle {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        Self::drop_expired(&mut sessions, now, self.idle_ttl);

        if let Some(slot) = sessions.get_mut(id) {
            slot.last_active = now;
            return slot.state.clone();
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, slot)| !slot.is_busy())
                .min_by_key(|(_, slot)| slot.last_active)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!(session = %key, "Session store full, evicting least recently active");
                    sessions.remove(&key);
                }
                None => warn!(
                    max_sessions = self.max_sessions,
                    "Session store full and every session is busy, growing past the limit"
                ),
            }
        }

        debug!(session = %id, "Creating session");
        let state = Arc::new(Mutex::new(ConversationState::new(id.clone())));
        sessions.insert(
            id.clone(),
            SessionSlot {
                state: state.clone(),
                last_active: now,
            },
        );
        state
    }

    /// Forget a session. Returns whether it existed.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Evict sessions idle past the TTL. Returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::drop_expired(&mut sessions, Instant::now(), self.idle_ttl)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    fn drop_expired(
        sessions: &mut HashMap<SessionId, SessionSlot>,
        now: Instant,
        ttl: Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, slot| slot.is_busy() || now.duration_since(slot.last_active) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle sessions");
        }
        evicted
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(1800), 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biochat_core::message::Turn;

    #[tokio::test]
    async fn same_id_same_state() {
        let store = SessionStore::default();
        let id = SessionId::from("a");

        let first = store.get_or_create(&id).await;
        first.lock().await.append(Turn::visitor("hi")).unwrap();

        let again = store.get_or_create(&id).await;
        assert_eq!(again.lock().await.turns().len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::default();
        let a = store.get_or_create(&SessionId::from("a")).await;
        a.lock().await.extract_and_remember_name("my name is Ana");

        let b = store.get_or_create(&SessionId::from("b")).await;
        assert_eq!(b.lock().await.visitor_name(), None);
        assert!(b.lock().await.should_greet());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        store.get_or_create(&SessionId::from("old")).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        store.get_or_create(&SessionId::from("new")).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(store.evict_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.remove(&SessionId::from("new")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_evicts_least_recently_active() {
        let store = SessionStore::new(Duration::from_secs(3600), 2);
        store.get_or_create(&SessionId::from("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create(&SessionId::from("b")).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touch "a" so "b" becomes the least recently active.
        store.get_or_create(&SessionId::from("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create(&SessionId::from("c")).await;

        assert_eq!(store.len().await, 2);
        assert!(!store.remove(&SessionId::from("b")).await);
        assert!(store.remove(&SessionId::from("a")).await);
        assert!(store.remove(&SessionId::from("c")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_skips_sessions_in_use() {
        let store = SessionStore::new(Duration::from_secs(3600), 2);
        let a = store.get_or_create(&SessionId::from("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create(&SessionId::from("b")).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // "a" is the least recently active but a request is holding it.
        let mut guard = a.lock().await;
        store.get_or_create(&SessionId::from("c")).await;
        guard.extract_and_remember_name("my name is Ana");
        drop(guard);

        assert_eq!(store.len().await, 2);
        assert!(!store.remove(&SessionId::from("b")).await);
        let again = store.get_or_create(&SessionId::from("a")).await;
        assert_eq!(again.lock().await.visitor_name(), Some("Ana"));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_store_grows_past_limit() {
        let store = SessionStore::new(Duration::from_secs(3600), 1);
        let a = store.get_or_create(&SessionId::from("a")).await;
        let _guard = a.lock().await;

        store.get_or_create(&SessionId::from("b")).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_session_outlives_ttl() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        let a = store.get_or_create(&SessionId::from("a")).await;
        let guard = a.lock().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.evict_expired().await, 0);

        drop(guard);
        assert_eq!(store.evict_expired().await, 1);
    }

    #[tokio::test]
    async fn remove_forgets_state() {
        let store = SessionStore::default();
        let id = SessionId::from("gone");
        store
            .get_or_create(&id)
            .await
            .lock()
            .await
            .append(Turn::visitor("hi"))
            .unwrap();

        assert!(store.remove(&id).await);
        let fresh = store.get_or_create(&id).await;
        assert!(fresh.lock().await.turns().is_empty());
    }
}
