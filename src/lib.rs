//! Push-notification delivery and device-compatibility subsystem of the
//! MealTrack calorie-tracking PWA.
//!
//! The subsystem spans two script contexts that never share memory: the
//! visible application, which detects device capabilities, drives the
//! permission prompt, registers the background worker and keeps the
//! messaging token mirrored into the user's profile document; and the
//! background worker, which renders system notifications for pushes that
//! arrive while no window has focus and routes notification clicks back to
//! an application window.
//!
//! All platform access goes through the traits in [`platform`], with web
//! bindings behind the `wasm-web` feature and a scriptable simulation for
//! native builds and tests.

pub mod api;
pub mod background;
pub mod constants;
pub mod device;
pub mod error;
pub mod foreground;
pub mod permission;
pub mod platform;
pub mod poller;
pub mod profile;
pub mod registration;
pub mod token;
pub mod types;

pub use api::{Messaging, MessagingOptions, MessagingPlatform, PushSetup};
pub use background::BackgroundHandler;
pub use device::{detect, DeviceProfile, OsVersion, PlatformFamily, PlatformSignals};
pub use error::{MessagingError, MessagingErrorCode, MessagingResult};
pub use foreground::ForegroundChannel;
pub use permission::{PermissionController, PermissionState};
pub use poller::{should_poll, PermissionPoller, PollerHandle, UpdateHandle, UpdatePoller};
pub use profile::{AuthSession, ProfileStore};
pub use registration::{ServiceWorkerManager, WorkerState};
pub use token::TokenSynchronizer;
pub use types::{
    notification_request, MessageHandler, MessagePayload, NotificationPayload,
    ShowNotificationRequest, Unsubscribe,
};
