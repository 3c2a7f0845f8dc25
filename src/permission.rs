//! Notification-permission state machine and prompting policy.
//!
//! There is exactly one permission flag per session and it lives in the
//! platform, not here: this module reads it through the injected
//! [`NotificationSystem`] handle and only ever mutates it by issuing the
//! platform's own prompt. Once resolved the flag is terminal as far as this
//! subsystem is concerned: `granted` is never re-prompted and `denied` is
//! only reversible through browser-level controls outside our reach.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::constants::AUTO_PROMPT_DELAY;
use crate::device::DeviceProfile;
use crate::platform::{runtime, NotificationSystem};

/// Mirror of the platform's global notification-permission flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionState {
    /// The user has not decided yet.
    Unset,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionState::Unset => "default",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        }
    }

    pub fn is_resolved(self) -> bool {
        self != PermissionState::Unset
    }
}

impl FromStr for PermissionState {
    type Err = ();

    /// Accepts the Web Notifications API spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(PermissionState::Granted),
            "denied" => Ok(PermissionState::Denied),
            "default" | "prompt" => Ok(PermissionState::Unset),
            _ => Err(()),
        }
    }
}

/// Owns prompting policy over the platform's permission primitive.
pub struct PermissionController {
    notifications: Arc<dyn NotificationSystem>,
    auto_prompt_delay: Duration,
}

impl PermissionController {
    pub fn new(notifications: Arc<dyn NotificationSystem>) -> Self {
        Self::with_delay(notifications, AUTO_PROMPT_DELAY)
    }

    pub fn with_delay(notifications: Arc<dyn NotificationSystem>, delay: Duration) -> Self {
        Self {
            notifications,
            auto_prompt_delay: delay,
        }
    }

    /// Reads the current flag. No side effects.
    pub fn current(&self) -> PermissionState {
        self.notifications.permission()
    }

    /// Prompts the user, as a direct consequence of a user gesture.
    ///
    /// A no-op returning the current state when the flag is already
    /// resolved, so at most one prompt is ever issued per
    /// `unset → resolved` transition.
    pub async fn request(&self) -> PermissionState {
        let current = self.current();
        if current.is_resolved() {
            return current;
        }
        match self.notifications.request_permission().await {
            Ok(state) => state,
            Err(err) => {
                warn!("notification permission request failed: {err}");
                self.current()
            }
        }
    }

    /// First-run prompt for the installed-app case.
    ///
    /// Unsolicited prompts on a plain browser tab are disruptive and
    /// throttled by the platform itself, so the automatic prompt fires only
    /// when the app was just installed and never asked. The delay keeps the
    /// dialog from appearing before the UI is visible.
    pub async fn maybe_auto_prompt(&self, profile: &DeviceProfile) -> PermissionState {
        let current = self.current();
        if !profile.is_compatible || !profile.is_standalone || current.is_resolved() {
            return current;
        }
        runtime::sleep(self.auto_prompt_delay).await;
        // The user may have resolved the flag through an explicit gesture
        // while we were waiting.
        if self.current().is_resolved() {
            return self.current();
        }
        self.request().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{detect, PlatformSignals};
    use crate::platform::sim::SimNotificationSystem;

    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36";

    fn controller(system: Arc<SimNotificationSystem>) -> PermissionController {
        PermissionController::with_delay(system, Duration::ZERO)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn request_when_granted_is_a_no_op() {
        let system = Arc::new(SimNotificationSystem::resolved(PermissionState::Granted));
        let permission = controller(system.clone());
        assert_eq!(permission.request().await, PermissionState::Granted);
        assert_eq!(system.prompt_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn request_when_denied_never_reprompts() {
        let system = Arc::new(SimNotificationSystem::resolved(PermissionState::Denied));
        let permission = controller(system.clone());
        assert_eq!(permission.request().await, PermissionState::Denied);
        assert_eq!(permission.request().await, PermissionState::Denied);
        assert_eq!(system.prompt_count(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unset_transition_prompts_exactly_once() {
        let system = Arc::new(SimNotificationSystem::new());
        let permission = controller(system.clone());
        assert_eq!(permission.request().await, PermissionState::Granted);
        assert_eq!(permission.request().await, PermissionState::Granted);
        assert_eq!(system.prompt_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auto_prompt_only_fires_in_installed_app_mode() {
        let browser_tab = detect(&PlatformSignals {
            user_agent: ANDROID.to_string(),
            standalone: false,
        });
        let system = Arc::new(SimNotificationSystem::new());
        let permission = controller(system.clone());
        assert_eq!(
            permission.maybe_auto_prompt(&browser_tab).await,
            PermissionState::Unset
        );
        assert_eq!(system.prompt_count(), 0);

        let installed = detect(&PlatformSignals {
            user_agent: ANDROID.to_string(),
            standalone: true,
        });
        assert_eq!(
            permission.maybe_auto_prompt(&installed).await,
            PermissionState::Granted
        );
        assert_eq!(system.prompt_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auto_prompt_skips_incompatible_devices() {
        let old_iphone = detect(&PlatformSignals {
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 15_2 like Mac OS X)".to_string(),
            standalone: true,
        });
        let system = Arc::new(SimNotificationSystem::new());
        let permission = controller(system.clone());
        assert_eq!(
            permission.maybe_auto_prompt(&old_iphone).await,
            PermissionState::Unset
        );
        assert_eq!(system.prompt_count(), 0);
    }

    #[test]
    fn permission_state_round_trips_platform_spellings() {
        assert_eq!(
            "granted".parse::<PermissionState>(),
            Ok(PermissionState::Granted)
        );
        assert_eq!(
            "denied".parse::<PermissionState>(),
            Ok(PermissionState::Denied)
        );
        assert_eq!(
            "default".parse::<PermissionState>(),
            Ok(PermissionState::Unset)
        );
        assert_eq!(PermissionState::Unset.as_str(), "default");
    }
}
