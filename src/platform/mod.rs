//! Platform seams.
//!
//! The subsystem spans two script contexts that never share memory: the
//! visible application (window) and the background worker. Each context
//! talks to its platform exclusively through the traits below, so the core
//! logic stays testable and the wasm bindings stay thin. The window context
//! uses [`NotificationSystem`], [`WorkerContainer`] and [`PushService`];
//! the worker context uses [`WorkerScope`].

pub mod runtime;
pub mod sim;
#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub mod web;

use std::sync::Arc;

use crate::error::MessagingResult;
use crate::permission::PermissionState;
use crate::registration::WorkerState;
use crate::types::ShowNotificationRequest;

/// `Send + Sync` everywhere except single-threaded wasm.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}

/// The platform's single global notification-permission flag and its
/// display primitive. The flag is only ever mutated through the platform's
/// own prompt, never assigned by this crate.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait NotificationSystem: MaybeSendSync {
    fn permission(&self) -> PermissionState;

    /// Issues the platform permission dialog. Must only be reached from a
    /// user gesture; the prompting policy above this trait enforces that.
    async fn request_permission(&self) -> MessagingResult<PermissionState>;

    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()>;
}

/// An active background worker registration for one scope.
pub trait WorkerRegistration: MaybeSendSync {
    fn state(&self) -> WorkerState;
    fn scope(&self) -> String;
}

pub type Registration = Arc<dyn WorkerRegistration>;

/// Window-context view of the platform's worker registry.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait WorkerContainer: MaybeSendSync {
    /// False when the platform has no worker support at all; callers treat
    /// that as "push unavailable", not as an error.
    fn is_supported(&self) -> bool;

    async fn existing_registration(&self, scope: &str) -> MessagingResult<Option<Registration>>;

    async fn register(&self, script_path: &str, scope: &str) -> MessagingResult<Registration>;

    /// Asks the platform to re-fetch the worker script for `scope` and
    /// install a new version if it changed. A no-op when nothing is
    /// registered there.
    async fn check_for_update(&self, scope: &str) -> MessagingResult<()>;
}

/// Token issuance by the push service, bound to a worker registration.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait PushService: MaybeSendSync {
    async fn fetch_token(&self, registration: &Registration) -> MessagingResult<String>;
}

/// An open application window as seen from the worker context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

/// Worker-context platform surface: everything the background handler may
/// do is expressed as one of these commands.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait WorkerScope: MaybeSendSync {
    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()>;

    /// Closes every displayed notification carrying `tag`.
    async fn close_notifications(&self, tag: &str) -> MessagingResult<()>;

    async fn window_clients(&self) -> MessagingResult<Vec<WindowClient>>;

    async fn focus_client(&self, id: &str) -> MessagingResult<()>;

    async fn open_window(&self, url: &str) -> MessagingResult<()>;

    /// Lets a freshly installed worker skip the waiting phase.
    async fn skip_waiting(&self) -> MessagingResult<()>;

    /// Claims open pages for the newly activated worker.
    async fn claim_clients(&self) -> MessagingResult<()>;
}
