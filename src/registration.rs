//! Worker registration lifecycle management.
//!
//! Ensures exactly one activated background worker governs the messaging
//! scope and hands out an awaitable "ready" registration. While a new
//! worker version installs, the old one keeps serving already-open pages;
//! that overlap window is intentional and not treated as a fault.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::constants::{
    REGISTRATION_POLL_INTERVAL, REGISTRATION_TIMEOUT, WORKER_SCOPE, WORKER_SCRIPT_PATH,
};
use crate::error::{registration_timeout, MessagingResult};
use crate::platform::{runtime, Registration, WorkerContainer};

/// Lifecycle of a worker registration. A newly installed worker does not
/// control existing pages until it reaches `Activated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Activating,
    Activated,
}

/// Coordinates worker registration for the messaging scope.
pub struct ServiceWorkerManager {
    container: Arc<dyn WorkerContainer>,
    cached: Mutex<Option<Registration>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl ServiceWorkerManager {
    pub fn new(container: Arc<dyn WorkerContainer>) -> Self {
        Self::with_timeouts(container, REGISTRATION_TIMEOUT, REGISTRATION_POLL_INTERVAL)
    }

    pub fn with_timeouts(
        container: Arc<dyn WorkerContainer>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            container,
            cached: Mutex::new(None),
            timeout,
            poll_interval,
        }
    }

    /// Resolves to an activated registration for the messaging scope, or
    /// `None` when push is unavailable: no worker support, a registration
    /// that failed, or one that never activated within the timeout. All of
    /// these degrade gracefully and retry on the next app load.
    pub async fn ensure_ready(&self) -> Option<Registration> {
        if let Some(registration) = self.cached_activated() {
            return Some(registration);
        }

        if !self.container.is_supported() {
            debug!("worker support missing, push unavailable");
            return None;
        }

        let registration = match self.lookup_or_register().await {
            Ok(registration) => registration,
            Err(err) => {
                warn!("worker registration failed: {err}");
                return None;
            }
        };

        if registration.state() != WorkerState::Activated {
            if let Err(err) = self.wait_for_activation(&registration).await {
                warn!("worker never activated: {err}");
                return None;
            }
        }

        *self.cached.lock().unwrap() = Some(registration.clone());
        Some(registration)
    }

    fn cached_activated(&self) -> Option<Registration> {
        let cached = self.cached.lock().unwrap();
        cached
            .as_ref()
            .filter(|registration| registration.state() == WorkerState::Activated)
            .cloned()
    }

    async fn lookup_or_register(&self) -> MessagingResult<Registration> {
        if let Some(existing) = self.container.existing_registration(WORKER_SCOPE).await? {
            return Ok(existing);
        }
        self.container
            .register(WORKER_SCRIPT_PATH, WORKER_SCOPE)
            .await
    }

    /// Bounded wait: a worker that installs but never activates (e.g. a
    /// conflicting script error) must not suspend the caller forever.
    async fn wait_for_activation(&self, registration: &Registration) -> MessagingResult<()> {
        let mut elapsed = Duration::ZERO;
        while elapsed < self.timeout {
            if registration.state() == WorkerState::Activated {
                return Ok(());
            }
            runtime::sleep(self.poll_interval).await;
            elapsed += self.poll_interval;
        }
        Err(registration_timeout(format!(
            "Worker not activated after {} ms",
            self.timeout.as_millis()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sim::SimWorkerContainer;

    fn manager(container: Arc<SimWorkerContainer>) -> ServiceWorkerManager {
        ServiceWorkerManager::with_timeouts(
            container,
            Duration::from_millis(50),
            Duration::from_millis(1),
        )
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_worker_support_resolves_to_none() {
        let container = Arc::new(SimWorkerContainer::unsupported());
        assert!(manager(container).ensure_ready().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn registration_that_never_activates_times_out_to_none() {
        let container = Arc::new(SimWorkerContainer::never_activating());
        assert!(manager(container).ensure_ready().await.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fresh_registration_is_awaited_until_activated() {
        let container = Arc::new(SimWorkerContainer::new());
        let manager = manager(container.clone());
        let registration = manager.ensure_ready().await.expect("activated worker");
        assert_eq!(registration.state(), WorkerState::Activated);
        assert_eq!(container.registration_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn second_call_reuses_the_cached_registration() {
        let container = Arc::new(SimWorkerContainer::new());
        let manager = manager(container.clone());
        manager.ensure_ready().await.expect("first");
        manager.ensure_ready().await.expect("second");
        assert_eq!(container.registration_count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn existing_activated_registration_is_reused_without_registering() {
        let container = Arc::new(SimWorkerContainer::with_existing_activated(WORKER_SCOPE));
        let manager = manager(container.clone());
        let registration = manager.ensure_ready().await.expect("existing worker");
        assert_eq!(registration.state(), WorkerState::Activated);
        assert_eq!(container.registration_count(), 0);
    }
}
