//! Polling fallback for unreliable permission-change events.
//!
//! Installed-app Android does not dependably fire an event when the
//! permission flag flips from unset to a resolved value, so this one spot
//! in the subsystem polls instead of listening. It is kept behind a
//! capability gate ([`should_poll`]) and expressed as a cancellable task,
//! never a fire-and-forget timer: the interval stops the moment the flag
//! resolves or the owning component tears down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::constants::WORKER_SCOPE;
use crate::device::{DeviceProfile, PlatformFamily};
use crate::permission::PermissionState;
use crate::platform::{runtime, NotificationSystem, WorkerContainer};

/// True only where the workaround is proven necessary: the
/// Android-installed-app profile. Platforms with reliable change events
/// must never run the poller.
pub fn should_poll(profile: &DeviceProfile) -> bool {
    profile.family != PlatformFamily::Ios && profile.is_standalone && profile.is_mobile
}

pub struct PermissionPoller;

impl PermissionPoller {
    /// Starts the bounded re-check loop. The task re-reads the permission
    /// flag every `interval` and ends itself at the first resolved value,
    /// delivering it through the returned handle.
    pub fn spawn(notifications: Arc<dyn NotificationSystem>, interval: Duration) -> PollerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = async_channel::bounded(1);

        let flag = cancelled.clone();
        runtime::spawn_detached(async move {
            loop {
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                runtime::sleep(interval).await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let state = notifications.permission();
                if state.is_resolved() {
                    let _ = sender.send(state).await;
                    break;
                }
            }
            // Sender drops here; a waiting receiver observes closure
            // instead of hanging.
        });

        PollerHandle {
            cancelled,
            receiver,
        }
    }
}

/// Owning handle for a running poller. Dropping it cancels the loop, which
/// is what ties the task's lifetime to the owning UI component.
pub struct PollerHandle {
    cancelled: Arc<AtomicBool>,
    receiver: async_channel::Receiver<PermissionState>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Waits for the resolved permission value; `None` when the poller was
    /// cancelled before the flag resolved.
    pub async fn resolved(&self) -> Option<PermissionState> {
        self.receiver.recv().await.ok()
    }

    /// A receiver a detached task can hold on to while the handle itself
    /// stays with the owning component.
    pub fn watch(&self) -> async_channel::Receiver<PermissionState> {
        self.receiver.clone()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Recurring worker-update check for installed apps, which can stay open
/// for days without a reload that would pick up a new worker script.
pub struct UpdatePoller;

impl UpdatePoller {
    /// Asks the platform to re-check the worker script every `interval`
    /// until the handle is dropped. Failed checks are logged and the loop
    /// keeps going; the next tick retries.
    pub fn spawn(container: Arc<dyn WorkerContainer>, interval: Duration) -> UpdateHandle {
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        runtime::spawn_detached(async move {
            loop {
                runtime::sleep(interval).await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = container.check_for_update(WORKER_SCOPE).await {
                    warn!("worker update check failed: {err}");
                }
            }
        });

        UpdateHandle { cancelled }
    }
}

pub struct UpdateHandle {
    cancelled: Arc<AtomicBool>,
}

impl UpdateHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for UpdateHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{detect, PlatformSignals};
    use crate::platform::sim::SimNotificationSystem;

    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_4 like Mac OS X)";
    const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

    fn profile(agent: &str, standalone: bool) -> DeviceProfile {
        detect(&PlatformSignals {
            user_agent: agent.to_string(),
            standalone,
        })
    }

    #[test]
    fn only_the_android_installed_app_profile_polls() {
        assert!(should_poll(&profile(ANDROID, true)));
        assert!(!should_poll(&profile(ANDROID, false)));
        assert!(!should_poll(&profile(IPHONE, true)));
        assert!(!should_poll(&profile(DESKTOP, true)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn poller_fires_until_permission_resolves_then_stops() {
        let system = Arc::new(SimNotificationSystem::new());
        let handle = PermissionPoller::spawn(system.clone(), Duration::from_millis(5));

        let flipper = system.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flipper.set_permission(PermissionState::Granted);
        });

        assert_eq!(handle.resolved().await, Some(PermissionState::Granted));
        // The loop ended with the resolution: the channel is closed and no
        // further tick can ever fire.
        assert_eq!(handle.resolved().await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_poller_never_delivers() {
        let system = Arc::new(SimNotificationSystem::new());
        let handle = PermissionPoller::spawn(system.clone(), Duration::from_millis(5));

        handle.cancel();
        system.set_permission(PermissionState::Granted);

        assert_eq!(handle.resolved().await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_poller_checks_repeatedly_until_cancelled() {
        use crate::platform::sim::SimWorkerContainer;

        let container = Arc::new(SimWorkerContainer::new());
        let handle = UpdatePoller::spawn(container.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(40)).await;
        let checks = container.update_check_count();
        assert!(checks >= 2, "expected repeated checks, saw {checks}");

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_cancel = container.update_check_count();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(container.update_check_count(), after_cancel);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn denied_resolution_also_ends_the_loop() {
        let system = Arc::new(SimNotificationSystem::new());
        let handle = PermissionPoller::spawn(system.clone(), Duration::from_millis(5));
        system.set_permission(PermissionState::Denied);
        assert_eq!(handle.resolved().await, Some(PermissionState::Denied));
    }
}
