//! A single back stack of activities driven on the main thread.
//!
//! The top activity is resumed. An activity only covered by floating
//! activities is paused, anything below an opaque activity is stopped and
//! finishing activities are destroyed and removed. Whenever the stack changes
//! the manager walks every record towards its goal one lifecycle step at a
//! time, calling into the activity's behavior and then notifying the
//! lifecycle monitor.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use crate::config::{ConfigRef, VersionCode};
use crate::error::{Result, TestError};
use crate::intent::{Bundle, Intent};
use crate::lifecycle::{ActivityLifecycleMonitor, Stage};
use crate::util::log_panic;

use super::activity::{Activity, ActivityResult};
use super::broadcast::{LocalBroadcastManager, ReceiverId};
use super::intent_monitor::{IntentMonitor, IntentStubberRegistry};
use super::looper::MainLooper;
use super::package_manager::{ActivityInfo, PackageManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Resumed,
    Paused,
    Stopped,
    Gone,
}

/// The next lifecycle step from `current` towards `goal`, if any.
fn next_stage(current: Stage, goal: Goal) -> Option<Stage> {
    use Stage::*;
    match (goal, current) {
        (_, Destroyed) => None,
        (Goal::Gone, Created) => Some(Destroyed),
        (Goal::Gone, Stopped) => Some(Destroyed),
        (_, PreOnCreate) => Some(Created),
        (_, Created) => Some(Started),
        (_, Restarted) => Some(Started),

        (Goal::Resumed, Started | Paused) => Some(Resumed),
        (Goal::Resumed, Stopped) => Some(Restarted),
        (Goal::Resumed, Resumed) => None,

        // Never rest in STARTED: an activity that becomes partially visible
        // goes through RESUMED and loses focus again.
        (Goal::Paused, Started) => Some(Resumed),
        (Goal::Paused, Resumed) => Some(Paused),
        (Goal::Paused, Stopped) => Some(Restarted),
        (Goal::Paused, Paused) => None,

        (Goal::Stopped | Goal::Gone, Started | Paused) => Some(Stopped),
        (Goal::Stopped | Goal::Gone, Resumed) => Some(Paused),
        (Goal::Stopped, Stopped) => None,
    }
}

fn is_upward(stage: Stage) -> bool {
    matches!(
        stage,
        Stage::Created | Stage::Started | Stage::Restarted | Stage::Resumed
    )
}

struct Record {
    activity: Activity,
    info: ActivityInfo,
    stage: Stage,
    /// The activity that started this one for result, with its request code
    caller: Option<(Activity, i32)>,
    recreating: bool,
    receivers: Vec<ReceiverId>,
}

/// Goals for every record, bottom to top.
fn goals(stack: &[Record]) -> Vec<Goal> {
    let mut covered = false;
    let mut obscured = false;
    let mut goals: Vec<Goal> = stack
        .iter()
        .rev()
        .map(|record| {
            let finishing = record.activity.is_finishing();
            let goal = if finishing || record.recreating {
                Goal::Gone
            } else if obscured {
                Goal::Stopped
            } else if covered {
                Goal::Paused
            } else {
                Goal::Resumed
            };
            // An instance being recreated keeps its window until the new one
            // takes over.
            if !finishing {
                covered = true;
                obscured |= !record.activity.is_floating();
            }
            goal
        })
        .collect();
    goals.reverse();
    goals
}

struct Inner {
    config: ConfigRef,
    looper: MainLooper,
    broadcasts: LocalBroadcastManager,
    package_manager: PackageManager,
    lifecycle_monitor: ActivityLifecycleMonitor,
    intent_monitor: IntentMonitor,
    stubbers: IntentStubberRegistry,
    stack: Mutex<Vec<Record>>,
}

#[derive(Clone)]
pub struct ActivityManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ActivityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stack = self.inner.stack.lock().unwrap();
        f.debug_list()
            .entries(stack.iter().map(|record| (&record.activity, record.stage)))
            .finish()
    }
}

impl ActivityManager {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ConfigRef,
        looper: MainLooper,
        broadcasts: LocalBroadcastManager,
        package_manager: PackageManager,
        lifecycle_monitor: ActivityLifecycleMonitor,
        intent_monitor: IntentMonitor,
        stubbers: IntentStubberRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                looper,
                broadcasts,
                package_manager,
                lifecycle_monitor,
                intent_monitor,
                stubbers,
                stack: Mutex::new(Vec::new()),
            }),
        }
    }

    fn resolve(&self, intent: &Intent) -> Result<ActivityInfo> {
        self.inner
            .package_manager
            .resolve_activity(intent)
            .and_then(|resolved| self.inner.package_manager.activity_info(resolved.component()))
            .ok_or_else(|| TestError::Unresolved(intent.to_string()))
    }

    /// Starts a new activity on behalf of the test process.
    ///
    /// Resolution happens immediately; the launch itself happens later on the
    /// main thread.
    pub fn start_activity(&self, intent: Intent, options: Option<Bundle>) -> Result<()> {
        let info = self.resolve(&intent)?;
        self.post_launch(info, intent, options, None);
        Ok(())
    }

    /// Starts an activity on behalf of `caller`. Must run on the main thread.
    ///
    /// The intent is reported to the intent monitor first and then offered to
    /// the loaded stubber. A stubbed intent never launches anything: the
    /// canned result is delivered to `caller` if it asked for one.
    fn start_from_activity(
        &self,
        caller: &Activity,
        intent: Intent,
        options: Option<Bundle>,
        request_code: Option<i32>,
    ) -> Result<()> {
        self.inner
            .looper
            .check_main_thread("Activities may only start activities on the main thread")?;
        self.inner.intent_monitor.signal_intent(&intent);

        if let Some(result) = self.inner.stubbers.activity_result_for_intent(&intent)? {
            log::debug!("Stubbed {} with result code {}", intent, result.result_code());
            if let Some(request_code) = request_code {
                let manager = self.clone();
                let caller = caller.clone();
                self.inner.looper.post(move || {
                    if manager.stage_of(&caller).is_some() {
                        manager.deliver_result(&caller, request_code, result);
                    }
                });
            }
            return Ok(());
        }

        let info = self.resolve(&intent)?;
        let caller = request_code.map(|code| (caller.clone(), code));
        self.post_launch(info, intent, options, caller);
        Ok(())
    }

    fn post_launch(
        &self,
        info: ActivityInfo,
        intent: Intent,
        options: Option<Bundle>,
        caller: Option<(Activity, i32)>,
    ) {
        let manager = self.clone();
        self.inner
            .looper
            .post(move || manager.launch(info, intent, options, caller));
    }

    fn launch(
        &self,
        info: ActivityInfo,
        intent: Intent,
        options: Option<Bundle>,
        caller: Option<(Activity, i32)>,
    ) {
        // The started instance sees the component the intent resolved to
        let intent = intent.with_component(info.component().clone());
        let activity = Activity::new(
            info.component().clone(),
            intent,
            options,
            info.is_floating(),
            info.instantiate(),
        );
        log::trace!("Launching {:?}", activity);
        self.inner.stack.lock().unwrap().push(Record {
            activity: activity.clone(),
            info,
            stage: Stage::PreOnCreate,
            caller,
            recreating: false,
            receivers: Vec::new(),
        });
        self.inner
            .lifecycle_monitor
            .signal_lifecycle_change(Stage::PreOnCreate, &activity);
        self.settle();
    }

    /// Marks `activity` finishing; it is destroyed on the main thread later.
    pub fn finish(&self, activity: &Activity) {
        if activity.mark_finishing() {
            log::trace!("Finishing {:?}", activity);
        }
        self.schedule_settle();
    }

    fn finish_started_by(&self, caller: &Activity, request_code: i32) {
        let started: Vec<Activity> = self
            .inner
            .stack
            .lock()
            .unwrap()
            .iter()
            .filter(|record| {
                record
                    .caller
                    .as_ref()
                    .map_or(false, |(c, code)| c == caller && *code == request_code)
            })
            .map(|record| record.activity.clone())
            .collect();
        for activity in &started {
            activity.mark_finishing();
        }
        if !started.is_empty() {
            self.schedule_settle();
        }
    }

    /// Destroys `activity` and starts a new instance in its place with the
    /// same intent. Must run on the main thread.
    ///
    /// On API 26 a stopped activity ignores the request.
    pub fn recreate(&self, activity: &Activity) -> Result<()> {
        self.inner
            .looper
            .check_main_thread("Activity recreation must happen on the main thread")?;
        {
            let mut stack = self.inner.stack.lock().unwrap();
            let record = stack
                .iter_mut()
                .find(|record| &record.activity == activity)
                .ok_or_else(|| {
                    TestError::IllegalArgument(format!("{:?} is not running", activity))
                })?;
            let api_26 = self.inner.config.version_code() == VersionCode::O;
            if api_26 && record.stage == Stage::Stopped {
                log::debug!("Ignoring recreate request for stopped {:?}", activity);
                return Ok(());
            }
            record.recreating = true;
        }
        self.schedule_settle();
        Ok(())
    }

    pub fn stage_of(&self, activity: &Activity) -> Option<Stage> {
        self.inner
            .stack
            .lock()
            .unwrap()
            .iter()
            .find(|record| &record.activity == activity)
            .map(|record| record.stage)
    }

    /// All running activities, bottom of the stack first.
    pub fn activities(&self) -> Vec<Activity> {
        self.inner
            .stack
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.activity.clone())
            .collect()
    }

    pub fn top_activity(&self) -> Option<Activity> {
        self.inner
            .stack
            .lock()
            .unwrap()
            .last()
            .map(|record| record.activity.clone())
    }

    fn schedule_settle(&self) {
        let manager = self.clone();
        self.inner.looper.post(move || manager.settle());
    }

    fn settle(&self) {
        while let Some((activity, stage)) = self.next_step() {
            self.apply(&activity, stage);
        }
    }

    /// Picks the next step: focus is given up first, then activities come
    /// up (top first), then whatever is left goes down.
    fn next_step(&self) -> Option<(Activity, Stage)> {
        let stack = self.inner.stack.lock().unwrap();
        let steps: Vec<(usize, Stage)> = stack
            .iter()
            .zip(goals(&stack))
            .enumerate()
            .rev()
            .filter_map(|(i, (record, goal))| next_stage(record.stage, goal).map(|next| (i, next)))
            .collect();
        steps
            .iter()
            .find(|(i, _)| stack[*i].stage == Stage::Resumed)
            .or_else(|| steps.iter().find(|(_, next)| is_upward(*next)))
            .or_else(|| steps.first())
            .map(|(i, next)| (stack[*i].activity.clone(), *next))
    }

    fn apply(&self, activity: &Activity, stage: Stage) {
        if let Some(record) = self
            .inner
            .stack
            .lock()
            .unwrap()
            .iter_mut()
            .find(|record| &record.activity == activity)
        {
            record.stage = stage;
        }

        let ctx = ActivityContext {
            activity,
            manager: self,
        };
        activity.dispatch(|behavior| {
            let result = catch_unwind(AssertUnwindSafe(|| match stage {
                Stage::PreOnCreate => {}
                Stage::Created => behavior.on_create(&ctx),
                Stage::Started => behavior.on_start(&ctx),
                Stage::Restarted => behavior.on_restart(&ctx),
                Stage::Resumed => behavior.on_resume(&ctx),
                Stage::Paused => behavior.on_pause(&ctx),
                Stage::Stopped => behavior.on_stop(&ctx),
                Stage::Destroyed => behavior.on_destroy(&ctx),
            }));
            if let Err(panic) = result {
                log::error!("{:?} panicked in {} callback", activity, stage);
                log_panic(panic);
            }
        });
        self.inner.lifecycle_monitor.signal_lifecycle_change(stage, activity);

        if stage == Stage::Destroyed {
            self.remove(activity);
        }
    }

    fn remove(&self, activity: &Activity) {
        let (index, record) = {
            let mut stack = self.inner.stack.lock().unwrap();
            let Some(index) = stack.iter().position(|record| &record.activity == activity) else {
                return;
            };
            (index, stack.remove(index))
        };
        for id in &record.receivers {
            self.inner.broadcasts.unregister_receiver(*id);
        }

        if record.recreating {
            let fresh = Activity::new(
                activity.component().clone(),
                activity.intent().clone(),
                activity.options().cloned(),
                record.info.is_floating(),
                record.info.instantiate(),
            );
            log::trace!("Recreating {:?} as {:?}", activity, fresh);
            {
                let mut stack = self.inner.stack.lock().unwrap();
                let index = index.min(stack.len());
                stack.insert(
                    index,
                    Record {
                        activity: fresh.clone(),
                        info: record.info,
                        stage: Stage::PreOnCreate,
                        caller: record.caller,
                        recreating: false,
                        receivers: Vec::new(),
                    },
                );
            }
            self.inner
                .lifecycle_monitor
                .signal_lifecycle_change(Stage::PreOnCreate, &fresh);
            return;
        }

        if let Some((caller, request_code)) = record.caller {
            if self.stage_of(&caller).is_some() && !caller.is_finishing() {
                self.deliver_result(&caller, request_code, activity.result());
            }
        }
    }

    fn deliver_result(&self, caller: &Activity, request_code: i32, result: ActivityResult) {
        log::trace!(
            "Delivering result {} to {:?}",
            result.result_code(),
            caller
        );
        let ctx = ActivityContext {
            activity: caller,
            manager: self,
        };
        caller.dispatch(|behavior| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                behavior.on_activity_result(&ctx, request_code, result)
            }));
            if let Err(panic) = result {
                log_panic(panic);
            }
        });
    }

    fn track_receiver(&self, activity: &Activity, id: ReceiverId) {
        let mut stack = self.inner.stack.lock().unwrap();
        if let Some(record) = stack.iter_mut().find(|record| &record.activity == activity) {
            record.receivers.push(id);
        }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }
}

/// What an activity's behavior can do while one of its callbacks runs.
pub struct ActivityContext<'a> {
    activity: &'a Activity,
    manager: &'a ActivityManager,
}

impl<'a> ActivityContext<'a> {
    pub fn activity(&self) -> &'a Activity {
        self.activity
    }

    pub fn target_package(&self) -> String {
        self.manager.inner.config.target_package()
    }

    pub fn finish(&self) {
        self.manager.finish(self.activity);
    }

    /// Finishes whatever this activity started for result with `request_code`.
    pub fn finish_activity(&self, request_code: i32) {
        self.manager.finish_started_by(self.activity, request_code);
    }

    pub fn set_result(&self, result_code: i32, result_data: Option<Intent>) {
        self.activity
            .set_result(ActivityResult::new(result_code, result_data));
    }

    pub fn start_activity(&self, intent: Intent) -> Result<()> {
        self.start_activity_with_options(intent, None)
    }

    pub fn start_activity_with_options(
        &self,
        intent: Intent,
        options: Option<Bundle>,
    ) -> Result<()> {
        self.manager
            .start_from_activity(self.activity, intent, options, None)
    }

    /// The started activity's result is handed to
    /// [`ActivityBehavior::on_activity_result`](super::activity::ActivityBehavior::on_activity_result)
    /// once it's destroyed.
    pub fn start_activity_for_result(
        &self,
        intent: Intent,
        request_code: i32,
        options: Option<Bundle>,
    ) -> Result<()> {
        self.manager
            .start_from_activity(self.activity, intent, options, Some(request_code))
    }

    pub fn send_broadcast(&self, intent: Intent) {
        self.manager.inner.broadcasts.send_broadcast(intent);
    }

    /// Registers a receiver that lives until it's unregistered or the
    /// activity is destroyed.
    pub fn register_receiver<A, F>(&self, actions: &[A], receiver: F) -> ReceiverId
    where
        A: AsRef<str>,
        F: Fn(&ActivityContext<'_>, &Intent) + Send + Sync + 'static,
    {
        let manager = self.manager.downgrade();
        let activity = self.activity.downgrade();
        let id = self
            .manager
            .inner
            .broadcasts
            .register_receiver(actions, move |intent| {
                let (Some(inner), Some(activity)) = (manager.upgrade(), activity.upgrade()) else {
                    return;
                };
                let manager = ActivityManager { inner };
                receiver(
                    &ActivityContext {
                        activity: &activity,
                        manager: &manager,
                    },
                    intent,
                );
            });
        self.manager.track_receiver(self.activity, id);
        id
    }

    pub fn unregister_receiver(&self, id: ReceiverId) {
        self.manager.inner.broadcasts.unregister_receiver(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_points_have_no_next_step() {
        assert_eq!(next_stage(Stage::Resumed, Goal::Resumed), None);
        assert_eq!(next_stage(Stage::Paused, Goal::Paused), None);
        assert_eq!(next_stage(Stage::Stopped, Goal::Stopped), None);
        assert_eq!(next_stage(Stage::Destroyed, Goal::Gone), None);
    }

    fn walk(mut stage: Stage, goal: Goal) -> Vec<Stage> {
        let mut path = Vec::new();
        while let Some(next) = next_stage(stage, goal) {
            path.push(next);
            stage = next;
            assert!(path.len() < 10, "no progress towards {:?}", goal);
        }
        path
    }

    #[test]
    fn paths_follow_the_platform_lifecycle() {
        use Stage::*;
        assert_eq!(walk(PreOnCreate, Goal::Resumed), vec![Created, Started, Resumed]);
        assert_eq!(walk(Stopped, Goal::Resumed), vec![Restarted, Started, Resumed]);
        assert_eq!(walk(Resumed, Goal::Stopped), vec![Paused, Stopped]);
        assert_eq!(walk(Stopped, Goal::Paused), vec![Restarted, Started, Resumed, Paused]);
        assert_eq!(walk(Resumed, Goal::Gone), vec![Paused, Stopped, Destroyed]);
        assert_eq!(walk(Created, Goal::Gone), vec![Destroyed]);
        assert_eq!(walk(PreOnCreate, Goal::Gone), vec![Created, Destroyed]);
    }

    #[test]
    fn every_goal_is_reachable_from_every_stage() {
        for raw in 0u8..8 {
            let stage = Stage::try_from(raw).unwrap();
            for goal in [Goal::Resumed, Goal::Paused, Goal::Stopped, Goal::Gone] {
                let end = walk(stage, goal).last().copied().unwrap_or(stage);
                if stage != Stage::Destroyed {
                    let expected = match goal {
                        Goal::Resumed => Stage::Resumed,
                        Goal::Paused => Stage::Paused,
                        Goal::Stopped => Stage::Stopped,
                        Goal::Gone => Stage::Destroyed,
                    };
                    assert_eq!(end, expected, "from {} towards {:?}", stage, goal);
                }
            }
        }
    }
}
