use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ConfigRef;
use crate::error::{check_state, Result, TestError};
use crate::intent::{Bundle, ComponentName, Intent, IntentFlags};
use crate::lifecycle::{ActivityLifecycleMonitor, Stage};
use crate::platform::activity::{Activity, ActivityResult};
use crate::platform::activity_manager::ActivityManager;
use crate::platform::broadcast::{LocalBroadcastManager, ReceiverId};
use crate::platform::looper::MainLooper;
use crate::platform::package_manager::{ActivityInfo, PackageManager};
use crate::platform::Instrumentation;
use crate::util::Latch;

use super::helpers::*;
use super::ActivityInvoker;

/// Stages in which an activity has been started and not yet finished.
const STARTED_STAGES: &[Stage] = &[Stage::Resumed, Stage::Paused, Stage::Stopped];

#[derive(Default)]
struct WaiterState {
    result: Option<ActivityResult>,
    done: bool,
}

/// Captures the result the bootstrap activity forwards for one launch.
struct ActivityResultWaiter {
    latch: Latch,
    state: Mutex<WaiterState>,
}

impl ActivityResultWaiter {
    fn on_broadcast(&self, intent: &Intent) {
        let mut guard = self.state.lock().unwrap();
        if guard.done {
            return;
        }
        guard.done = true;
        if intent.action() == Some(BOOTSTRAP_ACTIVITY_RESULT_RECEIVED) {
            let result_code = intent
                .int_extra(EXTRA_BOOTSTRAP_ACTIVITY_RESULT_CODE)
                .and_then(|code| i32::try_from(code).ok())
                .unwrap_or_default();
            let result_data = intent.intent_extra(EXTRA_BOOTSTRAP_ACTIVITY_RESULT_DATA).cloned();
            guard.result = Some(ActivityResult::new(result_code, result_data));
            self.latch.count_down();
        } else {
            log::debug!("Activity result waiter cancelled");
        }
    }
}

/// The on-device [`ActivityInvoker`]: drives activities through the helper
/// activity broadcast protocol.
pub struct InstrumentationActivityInvoker {
    config: ConfigRef,
    looper: MainLooper,
    broadcasts: LocalBroadcastManager,
    package_manager: PackageManager,
    activity_manager: ActivityManager,
    lifecycle_monitor: ActivityLifecycleMonitor,
    waiter: Mutex<Option<(Arc<ActivityResultWaiter>, ReceiverId)>>,
}

impl InstrumentationActivityInvoker {
    /// Also installs the helper activities in the target package.
    pub fn new(instrumentation: &Instrumentation) -> Self {
        let invoker = Self {
            config: instrumentation.config().clone(),
            looper: instrumentation.looper().clone(),
            broadcasts: instrumentation.broadcasts().clone(),
            package_manager: instrumentation.package_manager().clone(),
            activity_manager: instrumentation.activity_manager().clone(),
            lifecycle_monitor: instrumentation.lifecycle_monitor().clone(),
            waiter: Mutex::new(None),
        };
        invoker.install_helper_activities();
        invoker
    }

    fn install_helper_activities(&self) {
        let package = self.config.target_package();
        self.package_manager.register_activity(
            ActivityInfo::new(ComponentName::new(&package, BOOTSTRAP_ACTIVITY), || {
                Box::<BootstrapActivity>::default()
            })
            .floating(true),
        );
        self.package_manager.register_activity(ActivityInfo::new(
            ComponentName::new(&package, EMPTY_ACTIVITY),
            || Box::new(EmptyActivity::opaque()),
        ));
        self.package_manager.register_activity(
            ActivityInfo::new(ComponentName::new(&package, EMPTY_FLOATING_ACTIVITY), || {
                Box::new(EmptyActivity::floating())
            })
            .floating(true),
        );
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Checks on the main thread that `activity` currently is in one of
    /// `expected`.
    fn check_activity_stage_is_in(&self, activity: &Activity, expected: &[Stage]) -> Result<()> {
        let monitor = self.lifecycle_monitor.clone();
        let remote = activity.clone();
        let stage = self
            .looper
            .run_on_main_sync(move || monitor.lifecycle_stage_of(&remote))??;
        check_state(expected.contains(&stage), || {
            let names: Vec<&str> = expected.iter().map(|s| s.name()).collect();
            format!(
                "Activity's stage must be [{}] but was {}",
                names.join(", "),
                stage
            )
        })
    }

    /// Waits for `latch`, or on the main thread runs whatever is pending and
    /// checks it once.
    fn await_latch(&self, latch: &Latch) -> bool {
        if self.looper.is_main_thread() {
            self.looper.drain();
            latch.wait_timeout(Duration::ZERO)
        } else {
            latch.wait_timeout(self.timeout())
        }
    }

    /// Starts a helper activity and blocks until it announces `resumed_action`.
    fn start_helper_activity_sync(&self, class_name: &str, resumed_action: &str) -> Result<()> {
        let latch = Arc::new(Latch::new(1));
        let remote = latch.clone();
        let id = self
            .broadcasts
            .register_receiver(&[resumed_action], move |_| remote.count_down());

        let intent = self
            .intent_for_activity(class_name)
            .with_flags(IntentFlags::ACTIVITY_NEW_TASK);
        let resumed = self
            .activity_manager
            .start_activity(intent, None)
            .map(|()| self.await_latch(&latch));
        self.broadcasts.unregister_receiver(id);

        if !resumed? {
            return Err(TestError::Timeout(format!(
                "{} was not resumed within {:?}",
                class_name,
                self.timeout()
            )));
        }
        Ok(())
    }

    fn start_empty_activity_sync(&self) -> Result<()> {
        self.start_helper_activity_sync(EMPTY_ACTIVITY, EMPTY_ACTIVITY_RESUMED)
    }

    fn start_floating_empty_activity_sync(&self) -> Result<()> {
        self.start_helper_activity_sync(EMPTY_FLOATING_ACTIVITY, EMPTY_FLOATING_ACTIVITY_RESUMED)
    }

    fn finish_on_main(&self, activity: &Activity) -> Result<()> {
        let manager = self.activity_manager.clone();
        let activity = activity.clone();
        self.looper.run_on_main_sync(move || manager.finish(&activity))
    }

    fn replace_waiter(&self, waiter: Option<(Arc<ActivityResultWaiter>, ReceiverId)>) {
        let previous = std::mem::replace(&mut *self.waiter.lock().unwrap(), waiter);
        if let Some((_, id)) = previous {
            self.broadcasts.unregister_receiver(id);
        }
    }
}

impl Drop for InstrumentationActivityInvoker {
    fn drop(&mut self) {
        self.replace_waiter(None);
    }
}

impl ActivityInvoker for InstrumentationActivityInvoker {
    fn intent_for_activity(&self, class_name: &str) -> Intent {
        Intent::make_main_activity(ComponentName::new(
            self.config.target_package(),
            class_name,
        ))
    }

    fn start_activity(&self, intent: Intent, options: Option<Bundle>) -> Result<()> {
        if self.package_manager.resolve_activity(&intent).is_none() {
            return Err(TestError::Unresolved(intent.to_string()));
        }

        // Leftovers of a previous test that crashed before cleaning up
        self.broadcasts
            .send_broadcast(Intent::new(FINISH_BOOTSTRAP_ACTIVITY));
        self.broadcasts
            .send_broadcast(Intent::new(FINISH_EMPTY_ACTIVITIES));

        let waiter = Arc::new(ActivityResultWaiter {
            latch: Latch::new(1),
            state: Mutex::new(WaiterState::default()),
        });
        let remote = waiter.clone();
        let id = self.broadcasts.register_receiver(
            &[BOOTSTRAP_ACTIVITY_RESULT_RECEIVED, CANCEL_ACTIVITY_RESULT_WAITER],
            move |intent| remote.on_broadcast(intent),
        );
        self.replace_waiter(Some((waiter, id)));

        let mut bootstrap = self
            .intent_for_activity(BOOTSTRAP_ACTIVITY)
            .with_flags(IntentFlags::TASK_MASK)
            .with_extra(TARGET_INTENT_KEY, intent);
        if let Some(options) = &options {
            bootstrap = bootstrap.with_extra(TARGET_INTENT_OPTIONS_KEY, options.clone());
        }
        self.activity_manager.start_activity(bootstrap, options)
    }

    fn activity_result(&self) -> Result<ActivityResult> {
        let waiter = self
            .waiter
            .lock()
            .unwrap()
            .as_ref()
            .map(|(waiter, _)| waiter.clone())
            .ok_or_else(|| {
                TestError::IllegalState("No activity has been started yet".to_string())
            })?;
        self.await_latch(&waiter.latch);
        let result = waiter.state.lock().unwrap().result.clone();
        result.ok_or_else(|| {
            TestError::Timeout(format!(
                "onActivityResult never be called after {:?}",
                self.timeout()
            ))
        })
    }

    fn resume_activity(&self, activity: &Activity) -> Result<()> {
        self.check_activity_stage_is_in(activity, STARTED_STAGES)?;
        self.broadcasts
            .send_broadcast(Intent::new(FINISH_EMPTY_ACTIVITIES));
        Ok(())
    }

    fn pause_activity(&self, activity: &Activity) -> Result<()> {
        self.check_activity_stage_is_in(activity, &[Stage::Resumed, Stage::Paused])?;
        self.start_floating_empty_activity_sync()
    }

    fn stop_activity(&self, activity: &Activity) -> Result<()> {
        self.check_activity_stage_is_in(activity, STARTED_STAGES)?;
        self.start_empty_activity_sync()
    }

    fn recreate_activity(&self, activity: &Activity) -> Result<()> {
        self.check_activity_stage_is_in(activity, STARTED_STAGES)?;
        let manager = self.activity_manager.clone();
        let activity = activity.clone();
        self.looper
            .run_on_main_sync(move || manager.recreate(&activity))?
    }

    fn finish_activity(&self, activity: &Activity) -> Result<()> {
        self.check_activity_stage_is_in(activity, STARTED_STAGES)?;

        // Stopping before finishing works around platforms that drop onStop
        // and onDestroy when a resumed activity is finished directly.
        self.start_empty_activity_sync()?;
        self.finish_on_main(activity)?;

        self.broadcasts
            .send_broadcast(Intent::new(FINISH_BOOTSTRAP_ACTIVITY));

        self.start_empty_activity_sync()?;
        self.finish_on_main(activity)?;

        self.broadcasts
            .send_broadcast(Intent::new(FINISH_EMPTY_ACTIVITIES));
        self.broadcasts
            .send_broadcast(Intent::new(CANCEL_ACTIVITY_RESULT_WAITER));
        Ok(())
    }
}
