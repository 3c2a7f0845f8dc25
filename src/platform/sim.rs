//! Simulated platform used by the native target and the test suite.
//!
//! Every knob a real browser can turn (permission responses, worker
//! activation pace, token rotation, open windows) is scriptable here, so
//! the state machines above can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::error::{token_fetch_failed, unsupported_platform, MessagingResult};
use crate::permission::PermissionState;
use crate::platform::{
    NotificationSystem, PushService, Registration, WindowClient, WorkerContainer,
    WorkerRegistration, WorkerScope,
};
use crate::registration::WorkerState;
use crate::types::ShowNotificationRequest;

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(32)
        .collect()
}

/// Scriptable stand-in for the platform's notification permission flag and
/// display primitive.
pub struct SimNotificationSystem {
    state: Mutex<PermissionState>,
    prompt_response: PermissionState,
    prompts_issued: AtomicUsize,
    shown: Mutex<Vec<ShowNotificationRequest>>,
}

impl SimNotificationSystem {
    /// Unset flag; the simulated user answers the prompt with "allow".
    pub fn new() -> Self {
        Self::with_response(PermissionState::Granted)
    }

    /// Unset flag; the simulated user answers the prompt with `response`.
    pub fn with_response(response: PermissionState) -> Self {
        Self {
            state: Mutex::new(PermissionState::Unset),
            prompt_response: response,
            prompts_issued: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Already-resolved flag, as after a previous session.
    pub fn resolved(state: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            prompt_response: state,
            prompts_issued: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Flips the flag from outside, the way a browser-level settings change
    /// does. Used to drive the poller tests.
    pub fn set_permission(&self, state: PermissionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts_issued.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<ShowNotificationRequest> {
        self.shown.lock().unwrap().clone()
    }
}

impl Default for SimNotificationSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl NotificationSystem for SimNotificationSystem {
    fn permission(&self) -> PermissionState {
        *self.state.lock().unwrap()
    }

    async fn request_permission(&self) -> MessagingResult<PermissionState> {
        let mut state = self.state.lock().unwrap();
        if *state != PermissionState::Unset {
            return Ok(*state);
        }
        self.prompts_issued.fetch_add(1, Ordering::SeqCst);
        *state = self.prompt_response;
        Ok(*state)
    }

    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()> {
        self.shown.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct SimRegistration {
    scope: String,
    remaining_polls: Mutex<u32>,
    never_activates: bool,
}

impl WorkerRegistration for SimRegistration {
    fn state(&self) -> WorkerState {
        if self.never_activates {
            return WorkerState::Installing;
        }
        let mut remaining = self.remaining_polls.lock().unwrap();
        if *remaining == 0 {
            WorkerState::Activated
        } else {
            *remaining -= 1;
            if *remaining > 1 {
                WorkerState::Installing
            } else {
                WorkerState::Activating
            }
        }
    }

    fn scope(&self) -> String {
        self.scope.clone()
    }
}

/// Simulated worker registry. New registrations walk
/// `installing → activating → activated` over a configurable number of
/// state polls.
pub struct SimWorkerContainer {
    supported: bool,
    activation_polls: u32,
    never_activates: bool,
    existing: Mutex<Option<Registration>>,
    registrations_made: AtomicUsize,
    update_checks: AtomicUsize,
}

impl SimWorkerContainer {
    pub fn new() -> Self {
        Self {
            supported: true,
            activation_polls: 2,
            never_activates: false,
            existing: Mutex::new(None),
            registrations_made: AtomicUsize::new(0),
            update_checks: AtomicUsize::new(0),
        }
    }

    /// A platform with no worker support at all.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Registrations install but never reach `activated`, as with a
    /// conflicting script error.
    pub fn never_activating() -> Self {
        Self {
            never_activates: true,
            ..Self::new()
        }
    }

    /// Pre-seeds an already activated registration for `scope`.
    pub fn with_existing_activated(scope: &str) -> Self {
        let container = Self::new();
        let registration: Registration = Arc::new(SimRegistration {
            scope: scope.to_string(),
            remaining_polls: Mutex::new(0),
            never_activates: false,
        });
        *container.existing.lock().unwrap() = Some(registration);
        container
    }

    pub fn registration_count(&self) -> usize {
        self.registrations_made.load(Ordering::SeqCst)
    }

    pub fn update_check_count(&self) -> usize {
        self.update_checks.load(Ordering::SeqCst)
    }
}

impl Default for SimWorkerContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl WorkerContainer for SimWorkerContainer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn existing_registration(&self, scope: &str) -> MessagingResult<Option<Registration>> {
        let existing = self.existing.lock().unwrap();
        Ok(existing
            .as_ref()
            .filter(|registration| registration.scope() == scope)
            .cloned())
    }

    async fn register(&self, _script_path: &str, scope: &str) -> MessagingResult<Registration> {
        if !self.supported {
            return Err(unsupported_platform(
                "Simulated platform has no worker support.",
            ));
        }
        self.registrations_made.fetch_add(1, Ordering::SeqCst);
        let registration: Registration = Arc::new(SimRegistration {
            scope: scope.to_string(),
            remaining_polls: Mutex::new(self.activation_polls),
            never_activates: self.never_activates,
        });
        *self.existing.lock().unwrap() = Some(registration.clone());
        Ok(registration)
    }

    async fn check_for_update(&self, _scope: &str) -> MessagingResult<()> {
        self.update_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

static TOKEN_STORE: Lazy<Mutex<HashMap<String, String>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Simulated push service. Tokens are stable per namespace until rotated,
/// mirroring how the real service reuses a subscription.
pub struct SimPushService {
    namespace: String,
    failing: AtomicBool,
}

impl SimPushService {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every fetch fail, as during a push-service outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rotates the issued token, as the platform may do at any time.
    pub fn rotate_token(&self) -> String {
        let token = generate_token();
        TOKEN_STORE
            .lock()
            .unwrap()
            .insert(self.namespace.clone(), token.clone());
        token
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl PushService for SimPushService {
    async fn fetch_token(&self, _registration: &Registration) -> MessagingResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(token_fetch_failed("Simulated push service outage."));
        }
        let mut store = TOKEN_STORE.lock().unwrap();
        let token = store
            .entry(self.namespace.clone())
            .or_insert_with(generate_token);
        Ok(token.clone())
    }
}

/// Simulated worker global scope recording every command the background
/// handler issues.
pub struct SimWorkerScope {
    clients: Mutex<Vec<WindowClient>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    shown: Mutex<Vec<ShowNotificationRequest>>,
    closed: Mutex<Vec<String>>,
    skip_waiting_calls: AtomicUsize,
    claim_calls: AtomicUsize,
    next_client_id: AtomicUsize,
}

impl SimWorkerScope {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            focused: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            shown: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            skip_waiting_calls: AtomicUsize::new(0),
            claim_calls: AtomicUsize::new(0),
            next_client_id: AtomicUsize::new(1),
        }
    }

    pub fn add_client(&self, url: &str) -> String {
        let id = format!(
            "client-{}",
            self.next_client_id.fetch_add(1, Ordering::SeqCst)
        );
        self.clients.lock().unwrap().push(WindowClient {
            id: id.clone(),
            url: url.to_string(),
        });
        id
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<ShowNotificationRequest> {
        self.shown.lock().unwrap().clone()
    }

    /// Tags passed to `close_notifications`, in call order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn skip_waiting_count(&self) -> usize {
        self.skip_waiting_calls.load(Ordering::SeqCst)
    }

    pub fn claim_count(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }
}

impl Default for SimWorkerScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl WorkerScope for SimWorkerScope {
    async fn show_notification(&self, request: &ShowNotificationRequest) -> MessagingResult<()> {
        self.shown.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn close_notifications(&self, tag: &str) -> MessagingResult<()> {
        self.closed.lock().unwrap().push(tag.to_string());
        Ok(())
    }

    async fn window_clients(&self) -> MessagingResult<Vec<WindowClient>> {
        Ok(self.clients.lock().unwrap().clone())
    }

    async fn focus_client(&self, id: &str) -> MessagingResult<()> {
        self.focused.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> MessagingResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        self.add_client(url);
        Ok(())
    }

    async fn skip_waiting(&self) -> MessagingResult<()> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> MessagingResult<()> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
