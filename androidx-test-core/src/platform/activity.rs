use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::intent::{Bundle, ComponentName, Intent};

use super::activity_manager::ActivityContext;

/// Standard activity result: operation canceled.
pub const RESULT_CANCELED: i32 = 0;
/// Standard activity result: operation succeeded.
pub const RESULT_OK: i32 = -1;
/// Start of user-defined activity results.
pub const RESULT_FIRST_USER: i32 = 1;

/// The result an activity hands back to whoever started it for result.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityResult {
    result_code: i32,
    result_data: Option<Intent>,
}

impl ActivityResult {
    pub fn new(result_code: i32, result_data: Option<Intent>) -> Self {
        Self {
            result_code,
            result_data,
        }
    }

    pub fn canceled() -> Self {
        Self::new(RESULT_CANCELED, None)
    }

    pub fn result_code(&self) -> i32 {
        self.result_code
    }

    pub fn result_data(&self) -> Option<&Intent> {
        self.result_data.as_ref()
    }
}

impl Default for ActivityResult {
    fn default() -> Self {
        Self::canceled()
    }
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The application code of an activity.
///
/// Every callback runs on the main thread. While a callback runs the
/// behavior is borrowed, so it must not call [`Activity::with_behavior`] on
/// its own activity.
#[allow(unused_variables)]
pub trait ActivityBehavior: AsAny + Send {
    fn on_create(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_start(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_restart(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_resume(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_pause(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_stop(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_destroy(&mut self, ctx: &ActivityContext<'_>) {}
    fn on_activity_result(
        &mut self,
        ctx: &ActivityContext<'_>,
        request_code: i32,
        result: ActivityResult,
    ) {
    }
}

/// An activity that does nothing besides following its lifecycle.
#[derive(Debug, Default)]
pub struct NoopBehavior;

impl ActivityBehavior for NoopBehavior {}

static NEXT_ACTIVITY_ID: AtomicU64 = AtomicU64::new(1);

struct ActivityInner {
    id: u64,
    component: ComponentName,
    intent: Intent,
    options: Option<Bundle>,
    floating: bool,
    finishing: AtomicBool,
    result: Mutex<ActivityResult>,
    behavior: Mutex<Box<dyn ActivityBehavior>>,
}

/// A handle to one activity instance.
///
/// Handles compare by identity: two handles are equal only if they refer to
/// the same instance, even if both instances were started with the same
/// intent.
#[derive(Clone)]
pub struct Activity {
    inner: Arc<ActivityInner>,
}

impl PartialEq for Activity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl Eq for Activity {}

impl Hash for Activity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Activity{{#{} {}}}", self.inner.id, self.inner.component)
    }
}

impl Activity {
    pub(crate) fn new(
        component: ComponentName,
        intent: Intent,
        options: Option<Bundle>,
        floating: bool,
        behavior: Box<dyn ActivityBehavior>,
    ) -> Self {
        Self {
            inner: Arc::new(ActivityInner {
                id: NEXT_ACTIVITY_ID.fetch_add(1, Ordering::Relaxed),
                component,
                intent,
                options,
                floating,
                finishing: AtomicBool::new(false),
                result: Mutex::new(ActivityResult::canceled()),
                behavior: Mutex::new(behavior),
            }),
        }
    }

    /// An activity instance that isn't managed by any activity manager,
    /// started with `intent`.
    ///
    /// Useful for feeding synthetic lifecycle events to callbacks.
    pub fn detached_with_intent(intent: Intent, behavior: Box<dyn ActivityBehavior>) -> Self {
        let component = intent
            .component()
            .cloned()
            .unwrap_or_else(|| ComponentName::new("", ""));
        Self::new(component, intent, None, false, behavior)
    }

    pub fn detached(component: ComponentName, behavior: Box<dyn ActivityBehavior>) -> Self {
        Self::detached_with_intent(Intent::for_component(component), behavior)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn component(&self) -> &ComponentName {
        &self.inner.component
    }

    /// The intent this instance was started with, with its resolved component.
    pub fn intent(&self) -> &Intent {
        &self.inner.intent
    }

    pub fn options(&self) -> Option<&Bundle> {
        self.inner.options.as_ref()
    }

    /// Whether the window doesn't fill the screen, leaving whatever is below visible.
    pub fn is_floating(&self) -> bool {
        self.inner.floating
    }

    pub fn is_finishing(&self) -> bool {
        self.inner.finishing.load(Ordering::Acquire)
    }

    /// Returns `true` if this call is the one that marked the activity finishing.
    pub(crate) fn mark_finishing(&self) -> bool {
        !self.inner.finishing.swap(true, Ordering::AcqRel)
    }

    pub fn result(&self) -> ActivityResult {
        self.inner.result.lock().unwrap().clone()
    }

    pub(crate) fn set_result(&self, result: ActivityResult) {
        *self.inner.result.lock().unwrap() = result;
    }

    /// Runs `f` against the behavior if it is a `T`.
    pub fn with_behavior<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.behavior.lock().unwrap();
        let behavior: &mut (dyn ActivityBehavior + 'static) = &mut **guard;
        behavior.as_any_mut().downcast_mut::<T>().map(f)
    }

    pub(crate) fn dispatch(&self, f: impl FnOnce(&mut dyn ActivityBehavior)) {
        let mut guard = self.inner.behavior.lock().unwrap();
        f(&mut **guard)
    }

    pub(crate) fn downgrade(&self) -> WeakActivity {
        WeakActivity(Arc::downgrade(&self.inner))
    }
}

pub(crate) struct WeakActivity(Weak<ActivityInner>);

impl WeakActivity {
    pub fn upgrade(&self) -> Option<Activity> {
        self.0.upgrade().map(|inner| Activity { inner })
    }

    pub fn refers_to(&self, activity: &Activity) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&activity.inner))
    }
}
