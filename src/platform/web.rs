//! Browser bindings for the platform traits, available with the
//! `wasm-web` feature on wasm targets.
//!
//! The window context wires [`WebNotificationSystem`],
//! [`WebWorkerContainer`] and [`WebPushService`] into
//! [`crate::api::MessagingPlatform`]; the worker entry script wires
//! [`WebWorkerScope`] into [`crate::background::BackgroundHandler`].

use std::str::FromStr;

use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::device::PlatformSignals;
use crate::error::{
    internal_error, registration_failed, unsupported_platform, MessagingResult,
};
use crate::permission::PermissionState;
use crate::platform::{
    NotificationSystem, PushService, Registration, WindowClient, WorkerContainer,
    WorkerRegistration, WorkerScope,
};
use crate::registration::WorkerState;
use crate::types::ShowNotificationRequest;

fn format_js_error(operation: &str, err: JsValue) -> String {
    if let Some(message) = err.as_string() {
        format!("{operation} failed: {message}")
    } else if let Some(exception) = err.dyn_ref::<web_sys::DomException>() {
        format!(
            "{operation} failed: {}: {}",
            exception.name(),
            exception.message()
        )
    } else {
        format!("{operation} failed: {err:?}")
    }
}

fn window() -> MessagingResult<web_sys::Window> {
    web_sys::window().ok_or_else(|| internal_error("Not running in a Window context"))
}

/// Raw detection signals from the current window.
pub fn window_signals() -> PlatformSignals {
    let Some(window) = web_sys::window() else {
        return PlatformSignals::default();
    };
    let navigator = window.navigator();
    let user_agent = navigator.user_agent().unwrap_or_default();

    let display_mode_standalone = window
        .match_media("(display-mode: standalone)")
        .ok()
        .flatten()
        .map(|query| query.matches())
        .unwrap_or(false);
    // Legacy iOS Safari exposes the installed state on the navigator
    // instead of the media query.
    let navigator_standalone = Reflect::get(&navigator.into(), &JsValue::from_str("standalone"))
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    PlatformSignals {
        user_agent,
        standalone: display_mode_standalone || navigator_standalone,
    }
}

fn notification_options(request: &ShowNotificationRequest) -> web_sys::NotificationOptions {
    let options = web_sys::NotificationOptions::new();
    options.set_body(&request.body);
    options.set_icon(&request.icon);
    options.set_tag(&request.tag);

    let options_js: &JsValue = options.as_ref();
    let vibrate = js_sys::Array::new();
    for step in &request.vibrate {
        vibrate.push(&JsValue::from_f64(f64::from(*step)));
    }
    let _ = Reflect::set(options_js, &JsValue::from_str("vibrate"), &vibrate);

    let data = js_sys::Object::new();
    for (key, value) in &request.data {
        let _ = Reflect::set(
            &data,
            &JsValue::from_str(key),
            &JsValue::from_str(value),
        );
    }
    let _ = Reflect::set(options_js, &JsValue::from_str("data"), &data);

    options
}

/// The Web Notifications API as seen from the window context.
pub struct WebNotificationSystem;

#[async_trait::async_trait(?Send)]
impl NotificationSystem for WebNotificationSystem {
    fn permission(&self) -> PermissionState {
        match web_sys::Notification::permission() {
            web_sys::NotificationPermission::Granted => PermissionState::Granted,
            web_sys::NotificationPermission::Denied => PermissionState::Denied,
            _ => PermissionState::Unset,
        }
    }

    async fn request_permission(&self) -> MessagingResult<PermissionState> {
        let promise = web_sys::Notification::request_permission()
            .map_err(|err| internal_error(format_js_error("requestPermission", err)))?;
        let result = JsFuture::from(promise)
            .await
            .map_err(|err| internal_error(format_js_error("requestPermission", err)))?;

        Ok(result
            .as_string()
            .and_then(|status| PermissionState::from_str(&status).ok())
            .unwrap_or_else(|| self.permission()))
    }

    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()> {
        let options = notification_options(request);
        web_sys::Notification::new_with_options(&request.title, &options)
            .map_err(|err| internal_error(format_js_error("new Notification", err)))?;
        Ok(())
    }
}

struct WebRegistration {
    inner: web_sys::ServiceWorkerRegistration,
}

impl WorkerRegistration for WebRegistration {
    fn state(&self) -> WorkerState {
        if self.inner.active().is_some() {
            WorkerState::Activated
        } else if self.inner.waiting().is_some() {
            WorkerState::Activating
        } else {
            WorkerState::Installing
        }
    }

    fn scope(&self) -> String {
        self.inner.scope()
    }
}

fn service_worker_container() -> MessagingResult<web_sys::ServiceWorkerContainer> {
    let navigator = window()?.navigator();
    let navigator_js = JsValue::from(navigator);
    let container = Reflect::get(&navigator_js, &JsValue::from_str("serviceWorker"))
        .map_err(|_| unsupported_platform("Service workers are not available here."))?;
    if container.is_undefined() || container.is_null() {
        return Err(unsupported_platform(
            "Service workers are not available here.",
        ));
    }
    container
        .dyn_into()
        .map_err(|_| unsupported_platform("Service workers are not available here."))
}

/// `navigator.serviceWorker` as the worker registry.
pub struct WebWorkerContainer;

#[async_trait::async_trait(?Send)]
impl WorkerContainer for WebWorkerContainer {
    fn is_supported(&self) -> bool {
        service_worker_container().is_ok() && has_global("Notification") && has_global("PushManager")
    }

    async fn existing_registration(&self, scope: &str) -> MessagingResult<Option<Registration>> {
        let container = service_worker_container()?;
        let value = JsFuture::from(container.get_registration_with_document_url(scope))
            .await
            .map_err(|err| registration_failed(format_js_error("getRegistration", err)))?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        let registration: web_sys::ServiceWorkerRegistration = value
            .dyn_into()
            .map_err(|_| registration_failed("Unexpected value from getRegistration"))?;
        Ok(Some(std::sync::Arc::new(WebRegistration {
            inner: registration,
        })))
    }

    async fn register(&self, script_path: &str, scope: &str) -> MessagingResult<Registration> {
        let container = service_worker_container()?;
        let options = web_sys::RegistrationOptions::new();
        options.set_scope(scope);

        let promise = container.register_with_options(script_path, &options);
        let value = JsFuture::from(promise)
            .await
            .map_err(|err| registration_failed(format_js_error("serviceWorker.register", err)))?;
        let registration: web_sys::ServiceWorkerRegistration = value
            .dyn_into()
            .map_err(|_| registration_failed("Unexpected value from serviceWorker.register"))?;

        // Kick an update check so a stale cached worker script is replaced.
        if let Ok(update) = registration.update() {
            let _ = JsFuture::from(update).await;
        }

        Ok(std::sync::Arc::new(WebRegistration {
            inner: registration,
        }))
    }

    async fn check_for_update(&self, scope: &str) -> MessagingResult<()> {
        let container = service_worker_container()?;
        let value = JsFuture::from(container.get_registration_with_document_url(scope))
            .await
            .map_err(|err| registration_failed(format_js_error("getRegistration", err)))?;
        if value.is_undefined() || value.is_null() {
            return Ok(());
        }
        let registration: web_sys::ServiceWorkerRegistration = value
            .dyn_into()
            .map_err(|_| registration_failed("Unexpected value from getRegistration"))?;
        let promise = registration
            .update()
            .map_err(|err| registration_failed(format_js_error("registration.update", err)))?;
        JsFuture::from(promise)
            .await
            .map_err(|err| registration_failed(format_js_error("registration.update", err)))?;
        Ok(())
    }
}

fn has_global(property: &str) -> bool {
    Reflect::has(&js_sys::global(), &JsValue::from_str(property)).unwrap_or(false)
}

/// Push-subscription-backed token issuance.
pub struct WebPushService {
    application_server_key: Option<String>,
}

impl WebPushService {
    pub fn new(application_server_key: Option<String>) -> Self {
        Self {
            application_server_key,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl PushService for WebPushService {
    async fn fetch_token(&self, registration: &Registration) -> MessagingResult<String> {
        let container = service_worker_container()?;
        let value = JsFuture::from(
            container.get_registration_with_document_url(&registration.scope()),
        )
        .await
        .map_err(|err| internal_error(format_js_error("getRegistration", err)))?;
        let registration: web_sys::ServiceWorkerRegistration = value
            .dyn_into()
            .map_err(|_| internal_error("No registration for the messaging scope"))?;

        let push_manager = registration
            .push_manager()
            .map_err(|err| internal_error(format_js_error("pushManager", err)))?;

        let existing = JsFuture::from(
            push_manager
                .get_subscription()
                .map_err(|err| internal_error(format_js_error("getSubscription", err)))?,
        )
        .await
        .map_err(|err| internal_error(format_js_error("getSubscription", err)))?;

        let subscription: web_sys::PushSubscription =
            if existing.is_null() || existing.is_undefined() {
                let options = web_sys::PushSubscriptionOptionsInit::new();
                options.set_user_visible_only(true);
                if let Some(key) = &self.application_server_key {
                    options.set_application_server_key(Some(&JsValue::from_str(key)));
                }
                JsFuture::from(
                    push_manager
                        .subscribe_with_options(&options)
                        .map_err(|err| internal_error(format_js_error("subscribe", err)))?,
                )
                .await
                .map_err(|err| internal_error(format_js_error("subscribe", err)))?
                .dyn_into()
                .map_err(|_| internal_error("Unexpected value from subscribe"))?
            } else {
                existing
                    .dyn_into()
                    .map_err(|_| internal_error("Unexpected value from getSubscription"))?
            };

        Ok(subscription.endpoint())
    }
}

fn worker_global_scope() -> MessagingResult<web_sys::ServiceWorkerGlobalScope> {
    js_sys::global()
        .dyn_into()
        .map_err(|_| internal_error("Not running in a worker context"))
}

/// The service worker global scope as the worker-context platform.
pub struct WebWorkerScope;

#[async_trait::async_trait(?Send)]
impl WorkerScope for WebWorkerScope {
    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        let options = notification_options(request);
        let promise = scope
            .registration()
            .show_notification_with_options(&request.title, &options)
            .map_err(|err| internal_error(format_js_error("showNotification", err)))?;
        JsFuture::from(promise)
            .await
            .map_err(|err| internal_error(format_js_error("showNotification", err)))?;
        Ok(())
    }

    async fn close_notifications(&self, tag: &str) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        let promise = scope
            .registration()
            .get_notifications()
            .map_err(|err| internal_error(format_js_error("getNotifications", err)))?;
        let list = JsFuture::from(promise)
            .await
            .map_err(|err| internal_error(format_js_error("getNotifications", err)))?;
        for entry in js_sys::Array::from(&list).iter() {
            if let Some(notification) = entry.dyn_ref::<web_sys::Notification>() {
                if notification.tag() == tag {
                    notification.close();
                }
            }
        }
        Ok(())
    }

    async fn window_clients(&self) -> MessagingResult<Vec<WindowClient>> {
        let scope = worker_global_scope()?;
        let matched = JsFuture::from(scope.clients().match_all())
            .await
            .map_err(|err| internal_error(format_js_error("clients.matchAll", err)))?;
        let list = js_sys::Array::from(&matched);

        let mut clients = Vec::with_capacity(list.length() as usize);
        for entry in list.iter() {
            if let Some(client) = entry.dyn_ref::<web_sys::WindowClient>() {
                clients.push(WindowClient {
                    id: client.id(),
                    url: client.url(),
                });
            }
        }
        Ok(clients)
    }

    async fn focus_client(&self, id: &str) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        let matched = JsFuture::from(scope.clients().match_all())
            .await
            .map_err(|err| internal_error(format_js_error("clients.matchAll", err)))?;
        for entry in js_sys::Array::from(&matched).iter() {
            if let Some(client) = entry.dyn_ref::<web_sys::WindowClient>() {
                if client.id() == id {
                    let promise = client
                        .focus()
                        .map_err(|err| internal_error(format_js_error("client.focus", err)))?;
                    JsFuture::from(promise)
                        .await
                        .map_err(|err| internal_error(format_js_error("client.focus", err)))?;
                    return Ok(());
                }
            }
        }
        Err(internal_error(format!("No window client with id {id}")))
    }

    async fn open_window(&self, url: &str) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        let promise = scope
            .clients()
            .open_window(url)
            .map_err(|err| internal_error(format_js_error("clients.openWindow", err)))?;
        JsFuture::from(promise)
            .await
            .map_err(|err| internal_error(format_js_error("clients.openWindow", err)))?;
        Ok(())
    }

    async fn skip_waiting(&self) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        let promise = scope
            .skip_waiting()
            .map_err(|err| internal_error(format_js_error("skipWaiting", err)))?;
        JsFuture::from(promise)
            .await
            .map_err(|err| internal_error(format_js_error("skipWaiting", err)))?;
        Ok(())
    }

    async fn claim_clients(&self) -> MessagingResult<()> {
        let scope = worker_global_scope()?;
        JsFuture::from(scope.clients().claim())
            .await
            .map_err(|err| internal_error(format_js_error("clients.claim", err)))?;
        Ok(())
    }
}
