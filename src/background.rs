//! Worker-context delivery path.
//!
//! Runs inside the background worker, independent of any open window, and
//! shares no memory with the application context: payloads come in as
//! typed messages and everything it does goes back out as a platform
//! command (show, focus, open). Rendering goes through the same builder as
//! the foreground path so both produce identical notifications.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::constants::{CLICK_URL_DATA_KEY, DEFAULT_CLICK_URL, NOTIFICATION_TAG};
use crate::platform::WorkerScope;
use crate::types::{notification_request, MessagePayload};

pub struct BackgroundHandler {
    scope: Arc<dyn WorkerScope>,
}

impl BackgroundHandler {
    pub fn new(scope: Arc<dyn WorkerScope>) -> Self {
        Self { scope }
    }

    /// Push event while the worker is active: render a system notification,
    /// or nothing at all for a data-only payload.
    pub async fn handle_push(&self, payload: MessagePayload) {
        let Some(request) = notification_request(&payload) else {
            debug!("data-only push, no visible notification");
            return;
        };
        if let Err(err) = self.scope.show_notification(&request).await {
            warn!("background notification display failed: {err}");
        }
    }

    /// Notification click: close the clicked notification, then focus an
    /// application window already showing the target URL, or open exactly
    /// one new window there.
    pub async fn handle_notification_click(&self, data: &HashMap<String, String>) {
        if let Err(err) = self.scope.close_notifications(NOTIFICATION_TAG).await {
            warn!("notification close failed: {err}");
        }

        let target = data
            .get(CLICK_URL_DATA_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CLICK_URL);

        let clients = match self.scope.window_clients().await {
            Ok(clients) => clients,
            Err(err) => {
                warn!("window enumeration failed: {err}");
                return;
            }
        };

        if let Some(open) = clients
            .iter()
            .find(|client| url_path(&client.url) == url_path(target))
        {
            if let Err(err) = self.scope.focus_client(&open.id).await {
                warn!("window focus failed: {err}");
            }
            return;
        }

        if let Err(err) = self.scope.open_window(target).await {
            warn!("window open failed: {err}");
        }
    }

    /// Install hook: skip the waiting phase so the fresh worker version is
    /// eligible immediately. Freshness over potential mid-session
    /// disruption, deliberately.
    pub async fn handle_install(&self) {
        if let Err(err) = self.scope.skip_waiting().await {
            warn!("skipWaiting failed: {err}");
        }
    }

    /// Activate hook: claim open pages for the new worker version.
    pub async fn handle_activate(&self) {
        if let Err(err) = self.scope.claim_clients().await {
            warn!("client claim failed: {err}");
        }
    }
}

/// Path component of a client or target URL, so absolute client URLs
/// compare equal to the relative targets carried in payload data.
fn url_path(url: &str) -> &str {
    let after_origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    };
    let end = after_origin
        .find(['?', '#'])
        .unwrap_or(after_origin.len());
    let path = &after_origin[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_NOTIFICATION_ICON, NOTIFICATION_TAG};
    use crate::platform::sim::SimWorkerScope;
    use crate::types::NotificationPayload;

    fn handler() -> (BackgroundHandler, Arc<SimWorkerScope>) {
        let scope = Arc::new(SimWorkerScope::new());
        (BackgroundHandler::new(scope.clone()), scope)
    }

    fn payload_with_url(url: &str) -> MessagePayload {
        MessagePayload {
            notification: Some(NotificationPayload {
                title: Some("T".to_string()),
                body: Some("B".to_string()),
            }),
            data: Some([(CLICK_URL_DATA_KEY.to_string(), url.to_string())].into()),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_renders_notification_with_fixed_tag_and_icon() {
        let (handler, scope) = handler();
        handler.handle_push(payload_with_url("/meals/lunch")).await;

        let shown = scope.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "T");
        assert_eq!(shown[0].body, "B");
        assert_eq!(shown[0].tag, NOTIFICATION_TAG);
        assert_eq!(shown[0].icon, DEFAULT_NOTIFICATION_ICON);
        assert!(!shown[0].vibrate.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn data_only_push_shows_nothing_and_does_not_fail() {
        let (handler, scope) = handler();
        handler
            .handle_push(MessagePayload {
                notification: None,
                data: Some([("kind".to_string(), "refresh".to_string())].into()),
            })
            .await;
        assert!(scope.shown().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_focuses_an_existing_window_at_the_target_url() {
        let (handler, scope) = handler();
        let id = scope.add_client("https://mealtrack.app/meals/lunch");
        scope.add_client("https://mealtrack.app/weekly");

        let data = [(CLICK_URL_DATA_KEY.to_string(), "/meals/lunch".to_string())].into();
        handler.handle_notification_click(&data).await;

        assert_eq!(scope.focused(), vec![id]);
        assert!(scope.opened().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_closes_the_tagged_notification_before_routing() {
        let (handler, scope) = handler();
        handler.handle_push(payload_with_url("/meals/lunch")).await;

        let data = [(CLICK_URL_DATA_KEY.to_string(), "/meals/lunch".to_string())].into();
        handler.handle_notification_click(&data).await;

        assert_eq!(scope.closed(), vec![NOTIFICATION_TAG.to_string()]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_opens_exactly_one_window_when_none_matches() {
        let (handler, scope) = handler();
        scope.add_client("https://mealtrack.app/weekly");

        let data = [(CLICK_URL_DATA_KEY.to_string(), "/meals/lunch".to_string())].into();
        handler.handle_notification_click(&data).await;

        assert!(scope.focused().is_empty());
        assert_eq!(scope.opened(), vec!["/meals/lunch".to_string()]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn click_without_url_defaults_to_root() {
        let (handler, scope) = handler();
        handler.handle_notification_click(&HashMap::new()).await;
        assert_eq!(scope.opened(), vec![DEFAULT_CLICK_URL.to_string()]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn root_target_matches_an_origin_only_client_url() {
        let (handler, scope) = handler();
        let id = scope.add_client("https://mealtrack.app");
        handler.handle_notification_click(&HashMap::new()).await;
        assert_eq!(scope.focused(), vec![id]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lifecycle_hooks_skip_waiting_and_claim_clients() {
        let (handler, scope) = handler();
        handler.handle_install().await;
        handler.handle_activate().await;
        assert_eq!(scope.skip_waiting_count(), 1);
        assert_eq!(scope.claim_count(), 1);
    }

    #[test]
    fn url_path_strips_origin_query_and_fragment() {
        assert_eq!(url_path("https://a.example/meals?day=mon#x"), "/meals");
        assert_eq!(url_path("https://a.example"), "/");
        assert_eq!(url_path("/meals/lunch"), "/meals/lunch");
        assert_eq!(url_path(""), "/");
    }
}
