//! Messaging facade.
//!
//! Wires the detector, permission state machine, worker manager and token
//! synchronizer into the two entry points the application calls: an
//! explicit user-gesture setup and a silent startup bootstrap. Every
//! failure inside the subsystem is absorbed here or below; a notification
//! problem must never break the hosting application.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;

use crate::constants::{
    AUTO_PROMPT_DELAY, PERMISSION_POLL_INTERVAL, REGISTRATION_POLL_INTERVAL, REGISTRATION_TIMEOUT,
    UPDATE_CHECK_INTERVAL,
};
use crate::device::{detect, DeviceProfile, PlatformSignals};
use crate::foreground::ForegroundChannel;
use crate::permission::{PermissionController, PermissionState};
use crate::platform::{
    runtime, NotificationSystem, PushService, WorkerContainer,
};
use crate::poller::{should_poll, PermissionPoller, PollerHandle, UpdateHandle, UpdatePoller};
use crate::profile::{AuthSession, ProfileStore};
use crate::registration::ServiceWorkerManager;
use crate::token::TokenSynchronizer;
use crate::types::{MessageHandler, MessagePayload, Unsubscribe};

/// Platform handles the application context runs against. Production wires
/// the web bindings in here; tests wire the simulated platform.
pub struct MessagingPlatform {
    pub signals: PlatformSignals,
    pub notifications: Arc<dyn NotificationSystem>,
    pub container: Arc<dyn WorkerContainer>,
    pub push: Arc<dyn PushService>,
    pub profiles: Arc<dyn ProfileStore>,
    pub session: Arc<dyn AuthSession>,
}

/// Timing knobs, defaulting to the production constants.
#[derive(Clone, Debug)]
pub struct MessagingOptions {
    pub auto_prompt_delay: Duration,
    pub registration_timeout: Duration,
    pub registration_poll_interval: Duration,
    pub permission_poll_interval: Duration,
    pub update_check_interval: Duration,
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            auto_prompt_delay: AUTO_PROMPT_DELAY,
            registration_timeout: REGISTRATION_TIMEOUT,
            registration_poll_interval: REGISTRATION_POLL_INTERVAL,
            permission_poll_interval: PERMISSION_POLL_INTERVAL,
            update_check_interval: UPDATE_CHECK_INTERVAL,
        }
    }
}

/// Outcome of a push-setup attempt. Only `Enabled` means deliveries will
/// arrive; everything else is an expected degraded state, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushSetup {
    /// The device cannot receive web push (e.g. iOS below 16.4).
    Unsupported,
    /// No authenticated user to attach the token to.
    SignedOut,
    /// The permission flag is still unset.
    PermissionPending,
    PermissionDenied,
    /// No activated worker registration could be obtained.
    WorkerUnavailable,
    /// Permission and worker are fine but no token came back.
    TokenUnavailable,
    Enabled { token: String },
}

#[derive(Clone)]
pub struct Messaging {
    inner: Arc<MessagingInner>,
}

struct MessagingInner {
    signals: PlatformSignals,
    notifications: Arc<dyn NotificationSystem>,
    container: Arc<dyn WorkerContainer>,
    permission: PermissionController,
    workers: ServiceWorkerManager,
    tokens: TokenSynchronizer,
    foreground: ForegroundChannel,
    session: Arc<dyn AuthSession>,
    poller: Mutex<Option<PollerHandle>>,
    updates: Mutex<Option<UpdateHandle>>,
    poll_interval: Duration,
    update_interval: Duration,
}

impl Messaging {
    pub fn new(platform: MessagingPlatform) -> Self {
        Self::with_options(platform, MessagingOptions::default())
    }

    pub fn with_options(platform: MessagingPlatform, options: MessagingOptions) -> Self {
        let permission = PermissionController::with_delay(
            platform.notifications.clone(),
            options.auto_prompt_delay,
        );
        let workers = ServiceWorkerManager::with_timeouts(
            platform.container.clone(),
            options.registration_timeout,
            options.registration_poll_interval,
        );
        let tokens = TokenSynchronizer::new(platform.push, platform.profiles);
        let foreground = ForegroundChannel::new(platform.notifications.clone());
        Self {
            inner: Arc::new(MessagingInner {
                signals: platform.signals,
                notifications: platform.notifications,
                container: platform.container,
                permission,
                workers,
                tokens,
                foreground,
                session: platform.session,
                poller: Mutex::new(None),
                updates: Mutex::new(None),
                poll_interval: options.permission_poll_interval,
                update_interval: options.update_check_interval,
            }),
        }
    }

    /// Recomputed on demand; the profile is derived state, never stored.
    pub fn device_profile(&self) -> DeviceProfile {
        detect(&self.inner.signals)
    }

    pub fn permission(&self) -> PermissionState {
        self.inner.permission.current()
    }

    pub fn cached_token(&self) -> Option<String> {
        self.inner.tokens.cached_token()
    }

    /// Registers the in-app handler for foreground deliveries.
    pub fn on_message(&self, handler: MessageHandler) -> Unsubscribe {
        self.inner.foreground.on_message(handler)
    }

    /// Entry point for the platform binding when a push arrives while the
    /// application is visible.
    pub async fn dispatch_foreground(&self, payload: MessagePayload) {
        self.inner.foreground.dispatch(payload).await;
    }

    /// User-gesture setup: prompt if needed, get the worker ready, sync
    /// the token. The gesture requirement for the prompt is the caller's
    /// obligation; this method assumes it holds.
    pub async fn setup_push(&self) -> PushSetup {
        let Some(user_id) = self.inner.session.current_user_id() else {
            return PushSetup::SignedOut;
        };
        let profile = self.device_profile();
        if !profile.is_compatible {
            info!("push unsupported on this device, skipping setup");
            return PushSetup::Unsupported;
        }

        match self.inner.permission.request().await {
            PermissionState::Granted => {}
            PermissionState::Denied => return PushSetup::PermissionDenied,
            PermissionState::Unset => return PushSetup::PermissionPending,
        }

        self.finish_setup(&user_id).await
    }

    /// Silent startup path: applies the first-run auto-prompt policy and,
    /// on platforms that need it, leaves the permission poller running so
    /// a later out-of-band grant still completes the token sync.
    pub async fn bootstrap(&self) -> PushSetup {
        let Some(user_id) = self.inner.session.current_user_id() else {
            return PushSetup::SignedOut;
        };
        let profile = self.device_profile();
        if !profile.is_compatible {
            info!("push unsupported on this device");
            return PushSetup::Unsupported;
        }

        // Installed apps rarely reload, so keep the worker script fresh for
        // as long as the session lives.
        if should_poll(&profile) {
            self.start_update_checks();
        }

        match self.inner.permission.current() {
            PermissionState::Granted => return self.finish_setup(&user_id).await,
            PermissionState::Denied => return PushSetup::PermissionDenied,
            PermissionState::Unset => {}
        }

        match self.inner.permission.maybe_auto_prompt(&profile).await {
            PermissionState::Granted => self.finish_setup(&user_id).await,
            PermissionState::Denied => PushSetup::PermissionDenied,
            PermissionState::Unset => {
                if should_poll(&profile) {
                    self.start_poller(user_id);
                }
                PushSetup::PermissionPending
            }
        }
    }

    /// Cancels any running poller and update loop; call on UI teardown.
    pub fn teardown(&self) {
        self.inner.poller.lock().unwrap().take();
        self.inner.updates.lock().unwrap().take();
    }

    async fn finish_setup(&self, user_id: &str) -> PushSetup {
        let Some(registration) = self.inner.workers.ensure_ready().await else {
            return PushSetup::WorkerUnavailable;
        };
        match self
            .inner
            .tokens
            .sync(user_id, PermissionState::Granted, Some(&registration))
            .await
        {
            Some(token) => PushSetup::Enabled { token },
            None => PushSetup::TokenUnavailable,
        }
    }

    fn start_update_checks(&self) {
        let handle = UpdatePoller::spawn(self.inner.container.clone(), self.inner.update_interval);
        *self.inner.updates.lock().unwrap() = Some(handle);
    }

    fn start_poller(&self, user_id: String) {
        let handle =
            PermissionPoller::spawn(self.inner.notifications.clone(), self.inner.poll_interval);
        let resolutions = handle.watch();
        // Replacing a previous handle drops and thereby cancels it.
        *self.inner.poller.lock().unwrap() = Some(handle);

        let messaging = self.clone();
        runtime::spawn_detached(async move {
            if let Ok(PermissionState::Granted) = resolutions.recv().await {
                let outcome = messaging.finish_setup(&user_id).await;
                info!("deferred push setup finished: {outcome:?}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::{SimNotificationSystem, SimPushService, SimWorkerContainer};
    use crate::profile::{FixedAuthSession, MemoryProfileStore};

    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36";

    fn platform(namespace: &str) -> (MessagingPlatform, Arc<SimNotificationSystem>) {
        let notifications = Arc::new(SimNotificationSystem::new());
        let platform = MessagingPlatform {
            signals: PlatformSignals {
                user_agent: ANDROID.to_string(),
                standalone: false,
            },
            notifications: notifications.clone(),
            container: Arc::new(SimWorkerContainer::new()),
            push: Arc::new(SimPushService::new(namespace)),
            profiles: Arc::new(MemoryProfileStore::new()),
            session: Arc::new(FixedAuthSession::signed_in("u1")),
        };
        (platform, notifications)
    }

    fn fast_options() -> MessagingOptions {
        MessagingOptions {
            auto_prompt_delay: Duration::ZERO,
            registration_timeout: Duration::from_millis(50),
            registration_poll_interval: Duration::from_millis(1),
            permission_poll_interval: Duration::from_millis(5),
            update_check_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn setup_without_a_session_is_signed_out() {
        let (mut platform, _) = platform("api-signed-out");
        platform.session = Arc::new(FixedAuthSession::signed_out());
        let messaging = Messaging::with_options(platform, fast_options());
        assert_eq!(messaging.setup_push().await, PushSetup::SignedOut);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn denied_permission_reports_denied_without_worker_work() {
        let (mut platform, _) = platform("api-denied");
        let notifications = Arc::new(SimNotificationSystem::resolved(PermissionState::Denied));
        platform.notifications = notifications.clone();
        let container = Arc::new(SimWorkerContainer::new());
        platform.container = container.clone();

        let messaging = Messaging::with_options(platform, fast_options());
        assert_eq!(messaging.setup_push().await, PushSetup::PermissionDenied);
        assert_eq!(notifications.prompt_count(), 0);
        assert_eq!(container.registration_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn worker_failure_degrades_to_worker_unavailable() {
        let (mut platform, _) = platform("api-no-worker");
        platform.container = Arc::new(SimWorkerContainer::never_activating());
        let messaging = Messaging::with_options(platform, fast_options());
        assert_eq!(messaging.setup_push().await, PushSetup::WorkerUnavailable);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn device_profile_is_recomputed_not_stored() {
        let (platform, _) = platform("api-profile");
        let messaging = Messaging::with_options(platform, fast_options());
        assert_eq!(messaging.device_profile(), messaging.device_profile());
    }
}
