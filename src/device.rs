//! Device capability detection.
//!
//! Web push on iOS only works from 16.4 onwards and only for installed
//! web apps, so the rest of the subsystem gates itself on the profile
//! produced here. Detection is a pure function over raw platform signals;
//! any component may recompute it at will.

/// Raw inputs to detection, injected so tests can fabricate any device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformSignals {
    pub user_agent: String,
    /// True when launched in standalone/installed-app display mode.
    pub standalone: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformFamily {
    Other,
    Ios,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl OsVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// First iOS release with Web Push support.
pub const MIN_IOS_PUSH_VERSION: OsVersion = OsVersion::new(16, 4, 0);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    pub family: PlatformFamily,
    pub os_version: Option<OsVersion>,
    pub is_compatible: bool,
    pub is_standalone: bool,
    pub is_mobile: bool,
}

/// Computes a [`DeviceProfile`] from raw signals. Pure and idempotent;
/// absence of a signal is meaningful input, not an error.
pub fn detect(signals: &PlatformSignals) -> DeviceProfile {
    let agent = signals.user_agent.as_str();
    let family = if is_ios_agent(agent) {
        PlatformFamily::Ios
    } else {
        PlatformFamily::Other
    };
    let os_version = match family {
        PlatformFamily::Ios => parse_ios_version(agent),
        PlatformFamily::Other => None,
    };
    // iOS fails closed on an unparseable version; everything else is
    // compatible by definition.
    let is_compatible = match family {
        PlatformFamily::Ios => os_version.is_some_and(|version| version >= MIN_IOS_PUSH_VERSION),
        PlatformFamily::Other => true,
    };

    DeviceProfile {
        family,
        os_version,
        is_compatible,
        is_standalone: signals.standalone,
        is_mobile: is_mobile_agent(agent),
    }
}

fn is_ios_agent(agent: &str) -> bool {
    ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|marker| agent.contains(marker))
}

fn is_mobile_agent(agent: &str) -> bool {
    is_ios_agent(agent) || agent.contains("Android") || agent.contains("Mobile")
}

/// Parses the `OS 16_4_1` / `OS 16_4` token iOS agents carry. Underscore
/// separators are the historical Safari form; dots appear in some WebViews.
fn parse_ios_version(agent: &str) -> Option<OsVersion> {
    let start = agent.find("OS ")? + 3;
    let token: String = agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '_' || *c == '.')
        .collect();
    let mut parts = token.split(|c| c == '_' || c == '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(OsVersion::new(major, minor, patch))
}
