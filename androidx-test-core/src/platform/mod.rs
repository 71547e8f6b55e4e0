//! A host-side stand-in for the pieces of the Android runtime that activity
//! tests interact with.

use std::sync::{Arc, Mutex};

use crate::config::{Config, ConfigRef};
use crate::error::Result;
use crate::intent::{Bundle, Intent};
use crate::invoker::{ActivityInvoker, InstrumentationActivityInvoker};
use crate::lifecycle::ActivityLifecycleMonitor;

pub mod activity;
pub mod activity_manager;
pub mod broadcast;
pub mod intent_monitor;
pub mod looper;
pub mod package_manager;

pub use activity::{
    Activity, ActivityBehavior, ActivityResult, NoopBehavior, RESULT_CANCELED, RESULT_FIRST_USER,
    RESULT_OK,
};
pub use activity_manager::{ActivityContext, ActivityManager};
pub use broadcast::{LocalBroadcastManager, ReceiverId};
pub use intent_monitor::{IntentCallback, IntentMonitor, IntentStubber, IntentStubberRegistry};
pub use looper::MainLooper;
pub use package_manager::{ActivityInfo, IntentFilter, PackageManager, ResolveInfo};

struct InstrumentationInner {
    config: ConfigRef,
    looper: MainLooper,
    broadcasts: LocalBroadcastManager,
    package_manager: PackageManager,
    lifecycle_monitor: ActivityLifecycleMonitor,
    activity_manager: ActivityManager,
    intent_monitor: IntentMonitor,
    intent_stubbers: IntentStubberRegistry,
    invoker: Mutex<Option<Arc<dyn ActivityInvoker>>>,
}

impl Drop for InstrumentationInner {
    fn drop(&mut self) {
        log::trace!("Instrumentation dropped, stopping main looper");
        self.looper.quit();
    }
}

/// Everything a test needs to reach the process it's instrumenting.
///
/// Stands in for the registries that are process-wide singletons on a device:
/// every scenario and every `Intents` session is scoped to one
/// `Instrumentation` and all clones share the same main thread, activity
/// stack and monitors. The main thread stops once the last clone is dropped.
#[derive(Clone)]
pub struct Instrumentation {
    inner: Arc<InstrumentationInner>,
}

impl PartialEq for Instrumentation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl Eq for Instrumentation {}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.inner.config)
            .field("activities", &self.inner.activity_manager)
            .finish()
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Instrumentation {
    pub fn new(config: Config) -> Self {
        let config = ConfigRef::new(config);
        let looper = MainLooper::start();
        let broadcasts = LocalBroadcastManager::new(looper.clone());
        let package_manager = PackageManager::new();
        let lifecycle_monitor = ActivityLifecycleMonitor::new(looper.clone());
        let intent_monitor = IntentMonitor::new();
        let intent_stubbers = IntentStubberRegistry::new();
        let activity_manager = ActivityManager::new(
            config.clone(),
            looper.clone(),
            broadcasts.clone(),
            package_manager.clone(),
            lifecycle_monitor.clone(),
            intent_monitor.clone(),
            intent_stubbers.clone(),
        );
        Self {
            inner: Arc::new(InstrumentationInner {
                config,
                looper,
                broadcasts,
                package_manager,
                lifecycle_monitor,
                activity_manager,
                intent_monitor,
                intent_stubbers,
                invoker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConfigRef {
        &self.inner.config
    }

    pub fn target_package(&self) -> String {
        self.inner.config.target_package()
    }

    pub fn looper(&self) -> &MainLooper {
        &self.inner.looper
    }

    pub fn broadcasts(&self) -> &LocalBroadcastManager {
        &self.inner.broadcasts
    }

    pub fn package_manager(&self) -> &PackageManager {
        &self.inner.package_manager
    }

    pub fn lifecycle_monitor(&self) -> &ActivityLifecycleMonitor {
        &self.inner.lifecycle_monitor
    }

    pub fn activity_manager(&self) -> &ActivityManager {
        &self.inner.activity_manager
    }

    pub fn intent_monitor(&self) -> &IntentMonitor {
        &self.inner.intent_monitor
    }

    pub fn intent_stubbers(&self) -> &IntentStubberRegistry {
        &self.inner.intent_stubbers
    }

    /// Installs an activity in the process.
    pub fn register_activity(&self, info: ActivityInfo) {
        self.inner.package_manager.register_activity(info);
    }

    pub fn is_main_thread(&self) -> bool {
        self.inner.looper.is_main_thread()
    }

    /// See [`MainLooper::run_on_main_sync`].
    pub fn run_on_main_sync<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.looper.run_on_main_sync(f)
    }

    /// See [`MainLooper::wait_for_idle_sync`].
    pub fn wait_for_idle_sync(&self) {
        self.inner.looper.wait_for_idle_sync();
    }

    /// Starts an activity directly, outside of any scenario.
    pub fn start_activity(&self, intent: Intent, options: Option<Bundle>) -> Result<()> {
        self.inner.activity_manager.start_activity(intent, options)
    }

    /// Overrides the invoker every scenario created after this call uses.
    pub fn set_activity_invoker(&self, invoker: Arc<dyn ActivityInvoker>) {
        *self.inner.invoker.lock().unwrap() = Some(invoker);
    }

    /// The overriding invoker if one was set, otherwise the
    /// [`InstrumentationActivityInvoker`], created on first use.
    pub fn activity_invoker(&self) -> Arc<dyn ActivityInvoker> {
        let mut guard = self.inner.invoker.lock().unwrap();
        guard
            .get_or_insert_with(|| Arc::new(InstrumentationActivityInvoker::new(self)))
            .clone()
    }
}
