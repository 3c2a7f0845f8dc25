//! Collaborator boundary to the domain CRUD layer.
//!
//! The subsystem touches exactly one persisted field, `messagingToken` on
//! the user's profile document, and reads exactly one value from the auth
//! collaborator, the current user id. Both are traits so the hosting
//! application supplies its real document store and session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::constants::PROFILE_TOKEN_FIELD;
use crate::error::{profile_write_failed, MessagingResult};
use crate::platform::MaybeSendSync;

/// Profile-document write access, restricted to the one field this
/// subsystem owns.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait ProfileStore: MaybeSendSync {
    /// Field-merging write of `messagingToken`; must never replace the
    /// whole document or clobber unrelated fields.
    async fn merge_messaging_token(&self, user_id: &str, token: &str) -> MessagingResult<()>;
}

/// Session/auth collaborator.
pub trait AuthSession: MaybeSendSync {
    fn current_user_id(&self) -> Option<String>;
}

/// Fixed session, for the native target and tests.
pub struct FixedAuthSession {
    user_id: Option<String>,
}

impl FixedAuthSession {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl AuthSession for FixedAuthSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// In-memory document store with field-scoped merge writes and a write
/// counter, used by the native target and the write-count assertions in
/// the tests.
pub struct MemoryProfileStore {
    documents: Mutex<HashMap<String, Map<String, Value>>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Pre-seeds an unrelated profile field, as the CRUD layer would.
    pub fn set_field(&self, user_id: &str, key: &str, value: Value) {
        self.documents
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn document(&self, user_id: &str) -> Option<Map<String, Value>> {
        self.documents.lock().unwrap().get(user_id).cloned()
    }

    pub fn messaging_token(&self, user_id: &str) -> Option<String> {
        self.document(user_id)?
            .get(PROFILE_TOKEN_FIELD)?
            .as_str()
            .map(str::to_string)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl ProfileStore for MemoryProfileStore {
    async fn merge_messaging_token(&self, user_id: &str, token: &str) -> MessagingResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(profile_write_failed("Simulated document-store outage."));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(
                PROFILE_TOKEN_FIELD.to_string(),
                Value::String(token.to_string()),
            );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(flavor = "current_thread")]
    async fn merge_write_preserves_unrelated_fields() {
        let store = MemoryProfileStore::new();
        store.set_field("u1", "displayName", json!("Alma"));
        store.set_field("u1", "dailyCalorieGoal", json!(2100));

        store.merge_messaging_token("u1", "tok-1").await.unwrap();

        let document = store.document("u1").unwrap();
        assert_eq!(document.get("displayName"), Some(&json!("Alma")));
        assert_eq!(document.get("dailyCalorieGoal"), Some(&json!(2100)));
        assert_eq!(store.messaging_token("u1").as_deref(), Some("tok-1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn token_is_overwritten_not_appended() {
        let store = MemoryProfileStore::new();
        store.merge_messaging_token("u1", "tok-1").await.unwrap();
        store.merge_messaging_token("u1", "tok-2").await.unwrap();
        assert_eq!(store.messaging_token("u1").as_deref(), Some("tok-2"));
        assert_eq!(store.document("u1").unwrap().len(), 1);
    }
}
