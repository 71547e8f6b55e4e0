use core::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use num_enum::{FromPrimitive, IntoPrimitive};

/// The single bound applied to steady-state waits, recreate polling,
/// helper-activity waits and activity-result waits.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(45_000);

pub const DEFAULT_TARGET_PACKAGE: &str = "androidx.test.app";

/// Platform API levels that change observable behavior.
///
/// See [Build.VERSION_CODES](https://developer.android.com/reference/android/os/Build.VERSION_CODES)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, IntoPrimitive)]
#[non_exhaustive]
#[repr(i32)]
pub enum VersionCode {
    N = 24,
    NMr1 = 25,
    /// `Activity#recreate()` is ignored while the activity is stopped.
    O = 26,
    OMr1 = 27,
    P = 28,
    /// `Intent#setIdentifier()` participates in `filterEquals()` from here on.
    Q = 29,
    R = 30,
    S = 31,
    SV2 = 32,
    Tiramisu = 33,
    UpsideDownCake = 34,

    #[num_enum(catch_all)]
    Other(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub timeout: Duration,
    pub sdk_int: i32,
    pub target_package: String,
    /// The "Don't keep activities" developer option
    pub always_finish_activities: bool,
    /// Allows scenario calls from the main thread, as host-side test
    /// environments with a cooperative main looper do.
    pub main_thread_exempt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            sdk_int: VersionCode::Tiramisu.into(),
            target_package: DEFAULT_TARGET_PACKAGE.to_string(),
            always_finish_activities: false,
            main_thread_exempt: false,
        }
    }
}

impl Config {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sdk_int(mut self, sdk_int: i32) -> Self {
        self.sdk_int = sdk_int;
        self
    }

    pub fn with_target_package(mut self, package: impl Into<String>) -> Self {
        self.target_package = package.into();
        self
    }

    pub fn with_always_finish_activities(mut self, enabled: bool) -> Self {
        self.always_finish_activities = enabled;
        self
    }

    pub fn with_main_thread_exempt(mut self, exempt: bool) -> Self {
        self.main_thread_exempt = exempt;
        self
    }
}

/// A (cheaply clonable) reference to the instrumentation [`Config`]
///
/// Changes made through [`ConfigRef::replace`] become visible via all
/// pre-existing references.
#[derive(Clone)]
pub struct ConfigRef {
    config: Arc<RwLock<Config>>,
}
impl PartialEq for ConfigRef {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.config, &other.config) {
            true
        } else {
            let other_guard = other.config.read().unwrap();
            self.config.read().unwrap().eq(&*other_guard)
        }
    }
}
impl Eq for ConfigRef {}

impl fmt::Debug for ConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.config.read().unwrap().fmt(f)
    }
}

impl ConfigRef {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn replace(&self, src: Config) {
        *self.config.write().unwrap() = src;
    }

    // Returns a deep copy of the full configuration
    pub fn copy(&self) -> Config {
        self.config.read().unwrap().clone()
    }

    pub fn timeout(&self) -> Duration {
        self.config.read().unwrap().timeout
    }

    pub fn sdk_int(&self) -> i32 {
        self.config.read().unwrap().sdk_int
    }

    pub fn version_code(&self) -> VersionCode {
        VersionCode::from(self.sdk_int())
    }

    pub fn target_package(&self) -> String {
        self.config.read().unwrap().target_package.clone()
    }

    pub fn always_finish_activities(&self) -> bool {
        self.config.read().unwrap().always_finish_activities
    }

    pub fn main_thread_exempt(&self) -> bool {
        self.config.read().unwrap().main_thread_exempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_codes_round_trip_known_and_unknown_levels() {
        assert_eq!(VersionCode::from(26), VersionCode::O);
        assert_eq!(VersionCode::from(19), VersionCode::Other(19));
        let level: i32 = VersionCode::Q.into();
        assert_eq!(level, 29);
        assert_eq!(VersionCode::from(33), VersionCode::Tiramisu);
    }

    #[test]
    fn replaced_config_is_visible_through_clones() {
        let config = ConfigRef::new(Config::default());
        let other = config.clone();
        assert_eq!(other.timeout(), DEFAULT_TIMEOUT);

        config.replace(Config::default().with_timeout(Duration::from_secs(1)));
        assert_eq!(other.timeout(), Duration::from_secs(1));
        assert_eq!(config, other);
    }
}
