use std::time::Duration;

pub const WORKER_SCRIPT_PATH: &str = "/mealtrack-sw.js";
pub const WORKER_SCOPE: &str = "/";

pub const REGISTRATION_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between page load and the automatic first-run permission prompt, so
/// the prompt never appears before the UI is visible.
pub const AUTO_PROMPT_DELAY: Duration = Duration::from_millis(2_000);

/// Interval for permission re-checks on installed-app Android, where the
/// platform does not reliably fire a permission-change event.
pub const PERMISSION_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for service worker update checks.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fixed tag so repeated notifications of the same class replace each other
/// instead of stacking.
pub const NOTIFICATION_TAG: &str = "mealtrack";

pub const DEFAULT_NOTIFICATION_ICON: &str = "/icons/icon-192.png";
pub const NOTIFICATION_VIBRATION_PATTERN: [u32; 3] = [200, 100, 200];

/// Payload data key carrying the navigation target of a notification click.
pub const CLICK_URL_DATA_KEY: &str = "url";
pub const DEFAULT_CLICK_URL: &str = "/";

/// Profile document field mirroring the current messaging token.
pub const PROFILE_TOKEN_FIELD: &str = "messagingToken";
