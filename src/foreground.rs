//! Foreground delivery path.
//!
//! Active only while the application is loaded and visible; the platform
//! routes a given push to exactly one of the two paths, never both. Output
//! must stay visually identical to the background path, which both achieve
//! by rendering through [`crate::types::notification_request`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;

use crate::platform::NotificationSystem;
use crate::types::{notification_request, MessageHandler, MessagePayload, Unsubscribe};

static NEXT_HANDLER_ID: AtomicUsize = AtomicUsize::new(1);

struct HandlerEntry {
    id: usize,
    handler: MessageHandler,
}

/// In-process channel for pushes that arrive while the app is visible.
#[derive(Clone)]
pub struct ForegroundChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    notifications: Arc<dyn NotificationSystem>,
    handler: Mutex<Option<HandlerEntry>>,
}

impl ForegroundChannel {
    pub fn new(notifications: Arc<dyn NotificationSystem>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                notifications,
                handler: Mutex::new(None),
            }),
        }
    }

    /// Registers the in-app message handler, replacing any previous one.
    /// The returned closure deregisters it; a stale unsubscribe from a
    /// superseded registration is a no-op.
    pub fn on_message(&self, handler: MessageHandler) -> Unsubscribe {
        let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::SeqCst);
        {
            let mut slot = self.inner.handler.lock().unwrap();
            *slot = Some(HandlerEntry { id, handler });
        }

        let inner = self.inner.clone();
        Box::new(move || {
            let mut slot = inner.handler.lock().unwrap();
            if slot.as_ref().map(|entry| entry.id) == Some(id) {
                *slot = None;
            }
        })
    }

    /// Invoked by the platform for every foreground push delivery: surfaces
    /// the payload to the in-app handler and displays the notification.
    pub async fn dispatch(&self, payload: MessagePayload) {
        let handler = {
            self.inner
                .handler
                .lock()
                .unwrap()
                .as_ref()
                .map(|entry| entry.handler.clone())
        };
        if let Some(handler) = handler {
            handler(payload.clone());
        }

        if let Some(request) = notification_request(&payload) {
            if let Err(err) = self.inner.notifications.show_notification(&request).await {
                warn!("foreground notification display failed: {err}");
            }
        }
    }
}
