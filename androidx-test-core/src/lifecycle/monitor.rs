use std::sync::{Arc, Mutex, Weak};

use crate::error::{Result, TestError};
use crate::platform::activity::{Activity, WeakActivity};
use crate::platform::looper::MainLooper;

use super::Stage;

/// Notified about every lifecycle transition of every activity in the process.
///
/// Always called on the main thread.
pub trait ActivityLifecycleCallback: Send + Sync {
    fn on_activity_lifecycle_changed(&self, activity: &Activity, stage: Stage);
}

struct ActivityStatus {
    activity: WeakActivity,
    stage: Stage,
}

struct Inner {
    looper: MainLooper,
    declaw_thread_check: bool,
    // Accessed from any thread.
    callbacks: Mutex<Vec<Weak<dyn ActivityLifecycleCallback>>>,
    // Only touched on the main thread, but shared with the test thread's
    // handle so still needs to be a mutex.
    statuses: Mutex<Vec<ActivityStatus>>,
}

/// The process-wide registry of activity lifecycle stages.
///
/// Callbacks and activities are both held weakly so neither a forgotten
/// callback nor a destroyed activity is kept alive by the monitor.
#[derive(Clone)]
pub struct ActivityLifecycleMonitor {
    inner: Arc<Inner>,
}

impl ActivityLifecycleMonitor {
    pub fn new(looper: MainLooper) -> Self {
        Self::with_thread_check(looper, true)
    }

    pub(crate) fn with_thread_check(looper: MainLooper, check_thread: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                looper,
                declaw_thread_check: !check_thread,
                callbacks: Mutex::new(Vec::new()),
                statuses: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registering the same callback twice is a no-op.
    pub fn add_lifecycle_callback(&self, callback: &Arc<dyn ActivityLifecycleCallback>) {
        let mut guard = self.inner.callbacks.lock().unwrap();
        guard.retain(|stored| stored.strong_count() > 0);
        let already = guard
            .iter()
            .any(|stored| stored.upgrade().map_or(false, |s| same_callback(&s, callback)));
        if !already {
            guard.push(Arc::downgrade(callback));
        }
    }

    pub fn remove_lifecycle_callback(&self, callback: &Arc<dyn ActivityLifecycleCallback>) {
        let mut guard = self.inner.callbacks.lock().unwrap();
        guard.retain(|stored| match stored.upgrade() {
            Some(s) => !same_callback(&s, callback),
            None => false,
        });
    }

    pub fn callback_count(&self) -> usize {
        let mut guard = self.inner.callbacks.lock().unwrap();
        guard.retain(|stored| stored.strong_count() > 0);
        guard.len()
    }

    pub fn lifecycle_stage_of(&self, activity: &Activity) -> Result<Stage> {
        self.check_main_thread()?;
        let mut guard = self.inner.statuses.lock().unwrap();
        guard.retain(|status| status.activity.upgrade().is_some());
        guard
            .iter()
            .find(|status| status.activity.refers_to(activity))
            .map(|status| status.stage)
            .ok_or_else(|| TestError::IllegalArgument(format!("Unknown activity: {:?}", activity)))
    }

    pub fn activities_in_stage(&self, stage: Stage) -> Result<Vec<Activity>> {
        self.check_main_thread()?;
        let mut guard = self.inner.statuses.lock().unwrap();
        guard.retain(|status| status.activity.upgrade().is_some());
        Ok(guard
            .iter()
            .filter(|status| status.stage == stage)
            .filter_map(|status| status.activity.upgrade())
            .collect())
    }

    /// Called by the runtime after a particular lifecycle method has been
    /// called on `activity`.
    pub fn signal_lifecycle_change(&self, stage: Stage, activity: &Activity) {
        log::debug!("Lifecycle status change: {:?} in: {}", activity, stage);

        {
            let mut guard = self.inner.statuses.lock().unwrap();
            guard.retain(|status| status.activity.upgrade().is_some());
            match guard
                .iter_mut()
                .find(|status| status.activity.refers_to(activity))
            {
                Some(status) => status.stage = stage,
                None => guard.push(ActivityStatus {
                    activity: activity.downgrade(),
                    stage,
                }),
            }
        }

        // Callbacks may (un)register callbacks themselves
        let callbacks: Vec<Arc<dyn ActivityLifecycleCallback>> = {
            let mut guard = self.inner.callbacks.lock().unwrap();
            guard.retain(|stored| stored.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in callbacks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback.on_activity_lifecycle_changed(activity, stage)
            }));
            if let Err(panic) = result {
                log::error!(
                    "Callback panicked! (activity: {:?} stage: {}): {}",
                    activity,
                    stage,
                    crate::util::panic_message(&*panic)
                );
            }
        }
    }

    fn check_main_thread(&self) -> Result<()> {
        if self.inner.declaw_thread_check {
            return Ok(());
        }
        self.inner
            .looper
            .check_main_thread("Querying activity state off main thread is not allowed.")
    }
}

fn same_callback(
    a: &Arc<dyn ActivityLifecycleCallback>,
    b: &Arc<dyn ActivityLifecycleCallback>,
) -> bool {
    // Compare data pointers only; vtable pointers for the same type may differ
    // between codegen units.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::ComponentName;
    use crate::platform::activity::{ActivityBehavior, NoopBehavior};

    struct Recorder {
        seen: Mutex<Vec<Stage>>,
    }

    impl ActivityLifecycleCallback for Recorder {
        fn on_activity_lifecycle_changed(&self, _activity: &Activity, stage: Stage) {
            self.seen.lock().unwrap().push(stage);
        }
    }

    struct Panicker;

    impl ActivityLifecycleCallback for Panicker {
        fn on_activity_lifecycle_changed(&self, _activity: &Activity, _stage: Stage) {
            panic!("callback failure");
        }
    }

    fn activity() -> Activity {
        let behavior: Box<dyn ActivityBehavior> = Box::new(NoopBehavior);
        Activity::detached(ComponentName::new("com.example", "com.example.A"), behavior)
    }

    fn monitor() -> (MainLooper, ActivityLifecycleMonitor) {
        let looper = MainLooper::start();
        let monitor = ActivityLifecycleMonitor::with_thread_check(looper.clone(), false);
        (looper, monitor)
    }

    #[test]
    fn tracks_stage_per_activity() {
        let (looper, monitor) = monitor();
        let a = activity();
        let b = activity();
        monitor.signal_lifecycle_change(Stage::Created, &a);
        monitor.signal_lifecycle_change(Stage::Resumed, &a);
        monitor.signal_lifecycle_change(Stage::Resumed, &b);
        monitor.signal_lifecycle_change(Stage::Paused, &b);

        assert_eq!(monitor.lifecycle_stage_of(&a).unwrap(), Stage::Resumed);
        assert_eq!(monitor.lifecycle_stage_of(&b).unwrap(), Stage::Paused);
        assert_eq!(monitor.activities_in_stage(Stage::Resumed).unwrap(), vec![a]);
        looper.quit();
    }

    #[test]
    fn unknown_and_dropped_activities_are_rejected() {
        let (looper, monitor) = monitor();
        let a = activity();
        assert!(matches!(
            monitor.lifecycle_stage_of(&a),
            Err(TestError::IllegalArgument(_))
        ));

        monitor.signal_lifecycle_change(Stage::Stopped, &a);
        drop(a);
        assert!(monitor.activities_in_stage(Stage::Stopped).unwrap().is_empty());
        looper.quit();
    }

    #[test]
    fn queries_are_main_thread_only_unless_declawed() {
        let looper = MainLooper::start();
        let monitor = ActivityLifecycleMonitor::new(looper.clone());
        assert!(matches!(
            monitor.activities_in_stage(Stage::Resumed),
            Err(TestError::NonMainThread(_))
        ));
        let remote = monitor.clone();
        let on_main = looper
            .run_on_main_sync(move || remote.activities_in_stage(Stage::Resumed).map(|v| v.len()))
            .unwrap();
        assert_eq!(on_main, Ok(0));
        looper.quit();
    }

    #[test]
    fn callbacks_are_deduplicated_removable_and_weak() {
        let (looper, monitor) = monitor();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let callback: Arc<dyn ActivityLifecycleCallback> = recorder.clone();
        monitor.add_lifecycle_callback(&callback);
        monitor.add_lifecycle_callback(&callback);
        assert_eq!(monitor.callback_count(), 1);

        let a = activity();
        monitor.signal_lifecycle_change(Stage::Created, &a);
        monitor.remove_lifecycle_callback(&callback);
        monitor.signal_lifecycle_change(Stage::Started, &a);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Stage::Created]);

        monitor.add_lifecycle_callback(&callback);
        drop(callback);
        drop(recorder);
        assert_eq!(monitor.callback_count(), 0);
        looper.quit();
    }

    #[test]
    fn panicking_callback_does_not_block_others() {
        let (looper, monitor) = monitor();
        let panicker: Arc<dyn ActivityLifecycleCallback> = Arc::new(Panicker);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let callback: Arc<dyn ActivityLifecycleCallback> = recorder.clone();
        monitor.add_lifecycle_callback(&panicker);
        monitor.add_lifecycle_callback(&callback);

        monitor.signal_lifecycle_change(Stage::Resumed, &activity());
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Stage::Resumed]);
        looper.quit();
    }
}
