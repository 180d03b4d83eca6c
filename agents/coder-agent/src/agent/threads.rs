//! Thread Store
//!
//! In-process conversation memory: one transcript per thread, locked
//! individually so concurrent executions on different threads never
//! contend.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::xpander::types::ChatMessage;

/// One conversation thread.
#[derive(Debug)]
pub struct Thread {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

impl Thread {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }
}

/// Concurrent map of thread id to transcript.
pub struct ThreadStore {
    threads: DashMap<String, Arc<Mutex<Thread>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self {
            threads: DashMap::new(),
        }
    }

    /// Open a thread: reuse the existing transcript for a known id,
    /// otherwise create a fresh thread (generating an id when none is
    /// supplied).
    pub fn open(&self, thread_id: Option<&str>) -> (String, Arc<Mutex<Thread>>) {
        let id = thread_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let thread = self
            .threads
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Thread::new(id.clone()))))
            .clone();

        (id, thread)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_generates_unique_ids() {
        let store = ThreadStore::new();

        let (first, _) = store.open(None);
        let (second, _) = store.open(None);
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_open_reuses_existing_thread() {
        let store = ThreadStore::new();

        let (id, thread) = store.open(None);
        thread
            .lock()
            .await
            .messages
            .push(ChatMessage::user_text("hello"));

        let (same_id, same_thread) = store.open(Some(&id));
        assert_eq!(same_id, id);
        assert_eq!(same_thread.lock().await.messages.len(), 1);
        assert_eq!(store.len(), 1);
    }
}
