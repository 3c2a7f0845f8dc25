//! Messaging-token acquisition and profile synchronization.
//!
//! Whenever permission is granted and a token is obtained, the persisted
//! copy in the user's profile must converge to the in-memory copy. The
//! consistency is eventual, not transactional: a lagging write self-heals
//! on the next sync trigger (permission change, app restart, registration
//! change). There is deliberately no retry timer here.

use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::permission::PermissionState;
use crate::platform::{PushService, Registration};
use crate::profile::ProfileStore;

pub struct TokenSynchronizer {
    push: Arc<dyn PushService>,
    profiles: Arc<dyn ProfileStore>,
    /// Last token obtained from the push service this session.
    current: Mutex<Option<String>>,
    /// Last token known to be mirrored into the profile document. Kept
    /// separate from `current` so a failed write is retried by the next
    /// sync instead of being skipped as already-persisted.
    persisted: Mutex<Option<String>>,
}

impl TokenSynchronizer {
    pub fn new(push: Arc<dyn PushService>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            push,
            profiles,
            current: Mutex::new(None),
            persisted: Mutex::new(None),
        }
    }

    /// Token held in memory for this session, if any.
    pub fn cached_token(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    /// Obtains a token for the given registration and mirrors it into the
    /// user's profile when it is new or has rotated.
    ///
    /// Unmet preconditions (permission not granted, no registration) are
    /// expected states, not errors: the call returns `None` without side
    /// effects. A token-fetch failure is logged and also surfaces as
    /// `None`; it is retried on the next natural trigger.
    pub async fn sync(
        &self,
        user_id: &str,
        permission: PermissionState,
        registration: Option<&Registration>,
    ) -> Option<String> {
        if permission != PermissionState::Granted {
            return None;
        }
        let registration = registration?;

        let token = match self.push.fetch_token(registration).await {
            Ok(token) => token,
            Err(err) => {
                warn!("messaging token fetch failed: {err}");
                return None;
            }
        };

        *self.current.lock().unwrap() = Some(token.clone());

        if self.persisted.lock().unwrap().as_deref() == Some(token.as_str()) {
            return Some(token);
        }

        match self.profiles.merge_messaging_token(user_id, &token).await {
            Ok(()) => {
                debug!("messaging token persisted for user {user_id}");
                *self.persisted.lock().unwrap() = Some(token.clone());
            }
            Err(err) => {
                // The in-memory token stays correct for the session; the
                // write is retried by whichever sync comes next.
                warn!("messaging token write failed: {err}");
            }
        }

        Some(token)
    }
}
