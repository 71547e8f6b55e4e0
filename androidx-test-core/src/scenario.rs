//! Drives one activity through its lifecycle from a test thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::config::ConfigRef;
use crate::error::{check_state, Result, TestError};
use crate::intent::{Bundle, Intent};
use crate::invoker::ActivityInvoker;
use crate::lifecycle::{ActivityLifecycleCallback, Stage, State};
use crate::platform::activity::{Activity, ActivityResult};
use crate::platform::Instrumentation;

pub(crate) struct ScenarioState {
    current_stage: Stage,
    /// `None` before the activity is created and after it's destroyed
    current_activity: Option<Activity>,
}

impl ScenarioState {
    pub(crate) fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub(crate) fn current_activity(&self) -> Option<&Activity> {
        self.current_activity.as_ref()
    }
}

/// The scenario state plus the condition variable waiters block on.
///
/// Only the lifecycle observer writes the state, always on the main thread,
/// and it never blocks while holding the lock.
pub(crate) struct WaitableScenarioState {
    start_intent: Intent,
    config: ConfigRef,
    pub(crate) mutex: Mutex<ScenarioState>,
    pub(crate) cond: Condvar,
}

impl WaitableScenarioState {
    fn new(start_intent: Intent, config: ConfigRef) -> Self {
        Self {
            start_intent,
            config,
            mutex: Mutex::new(ScenarioState {
                current_stage: Stage::PreOnCreate,
                current_activity: None,
            }),
            cond: Condvar::new(),
        }
    }
}

impl ActivityLifecycleCallback for WaitableScenarioState {
    fn on_activity_lifecycle_changed(&self, activity: &Activity, stage: Stage) {
        if !self
            .start_intent
            .filter_matches(activity.intent(), self.config.sdk_int())
        {
            log::trace!(
                "Activity lifecycle changed event received but ignored because the intent does not match. \
                 startActivityIntent={}, activity.intent={}, activity={:?}",
                self.start_intent,
                activity.intent(),
                activity
            );
            return;
        }

        let mut guard = self.mutex.lock().unwrap();
        match guard.current_stage {
            Stage::PreOnCreate | Stage::Destroyed => {
                // A new instance may only come in through onCreate
                if stage != Stage::Created {
                    log::debug!(
                        "Activity lifecycle changed event received but ignored because the reported \
                         transition was not ON_CREATE while the last known transition was {}",
                        guard.current_stage
                    );
                    return;
                }
            }
            _ => {
                if guard.current_activity.as_ref() != Some(activity) {
                    log::debug!(
                        "Activity lifecycle changed event received but ignored because the activity \
                         instance does not match. current={:?}, received={:?}",
                        guard.current_activity,
                        activity
                    );
                    return;
                }
            }
        }

        guard.current_stage = stage;
        guard.current_activity = if stage == Stage::Destroyed {
            None
        } else {
            Some(activity.clone())
        };
        log::trace!("Update currentActivityStage to {}, currentActivity={:?}", stage, activity);
        self.cond.notify_all();
    }
}

/// A snapshot of the current state, taken under the lock.
struct ActivityState {
    activity: Option<Activity>,
    state: Option<State>,
    stage: Stage,
}

fn describe(states: &[State]) -> String {
    let names: Vec<&str> = states.iter().map(|s| s.name()).collect();
    format!("[{}]", names.join(", "))
}

/// Launches an activity and drives it to the lifecycle state a test asks
/// for.
///
/// All calls block until the activity settles. They must be made from a
/// thread other than the main thread unless the configuration exempts it, in
/// which case pending main thread work is run inline instead of waited for.
///
/// Closing is mandatory; a scenario dropped without [`ActivityScenario::close`]
/// is closed on drop and a warning is logged.
///
/// ```no_run
/// use androidx_test_core::{ActivityScenario, Instrumentation, State};
///
/// let instrumentation = Instrumentation::default();
/// let scenario = ActivityScenario::launch_activity(&instrumentation, "com.example.MainActivity")?;
/// scenario.move_to_state(State::Created)?;
/// scenario.on_activity(|activity| println!("{:?}", activity))?;
/// scenario.close()?;
/// # Ok::<(), androidx_test_core::TestError>(())
/// ```
///
/// The state lock belongs to the main thread observer and can't be taken
/// from outside:
///
/// ```compile_fail
/// use androidx_test_core::ActivityScenario;
///
/// fn hold(scenario: &ActivityScenario) {
///     let _guard = scenario.mutex.lock();
/// }
/// ```
pub struct ActivityScenario {
    state: Arc<WaitableScenarioState>,
    instrumentation: Instrumentation,
    invoker: Arc<dyn ActivityInvoker>,
    closed: AtomicBool,
}

impl std::fmt::Debug for ActivityScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.mutex.lock().unwrap();
        f.debug_struct("ActivityScenario")
            .field("start_intent", &self.state.start_intent)
            .field("current_stage", &guard.current_stage())
            .field("current_activity", &guard.current_activity())
            .finish()
    }
}

impl ActivityScenario {
    fn new(instrumentation: &Instrumentation, start_intent: Intent) -> Result<Self> {
        let config = instrumentation.config().clone();
        check_state(!config.always_finish_activities(), || {
            "\"Don't keep activities\" developer options must be disabled for ActivityScenario"
                .to_string()
        })?;
        Ok(Self {
            state: Arc::new(WaitableScenarioState::new(start_intent, config)),
            instrumentation: instrumentation.clone(),
            invoker: instrumentation.activity_invoker(),
            closed: AtomicBool::new(false),
        })
    }

    /// Launches the activity class `class_name` of the target package and
    /// waits for it to settle in any state.
    pub fn launch_activity(instrumentation: &Instrumentation, class_name: &str) -> Result<Self> {
        let intent = instrumentation
            .activity_invoker()
            .intent_for_activity(class_name);
        Self::launch_with_options(instrumentation, intent, None)
    }

    /// Launches an activity with `start_intent` and waits for it to settle in
    /// any state, since an activity may finish itself straight away.
    pub fn launch(instrumentation: &Instrumentation, start_intent: Intent) -> Result<Self> {
        Self::launch_with_options(instrumentation, start_intent, None)
    }

    pub fn launch_with_options(
        instrumentation: &Instrumentation,
        start_intent: Intent,
        options: Option<Bundle>,
    ) -> Result<Self> {
        let scenario = Self::new(instrumentation, start_intent)?;
        match scenario.start(options) {
            Ok(()) => Ok(scenario),
            Err(err) => {
                scenario.unregister();
                scenario.closed.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    fn start(&self, options: Option<Bundle>) -> Result<()> {
        self.check_not_main_thread()?;
        self.instrumentation.wait_for_idle_sync();

        let observer: Arc<dyn ActivityLifecycleCallback> = self.state.clone();
        self.instrumentation
            .lifecycle_monitor()
            .add_lifecycle_callback(&observer);

        self.invoker
            .start_activity(self.state.start_intent.clone(), options)?;
        self.wait_for_activity_to_become_any_of(&State::ALL)
    }

    fn check_not_main_thread(&self) -> Result<()> {
        if self.state.config.main_thread_exempt() {
            return Ok(());
        }
        self.instrumentation
            .looper()
            .check_not_main_thread("ActivityScenario methods must not be called on the main thread")
    }

    fn unregister(&self) {
        let observer: Arc<dyn ActivityLifecycleCallback> = self.state.clone();
        self.instrumentation
            .lifecycle_monitor()
            .remove_lifecycle_callback(&observer);
    }

    fn wait_for_activity_to_become_any_of(&self, expected: &[State]) -> Result<()> {
        // Flush queued transitions so a transient stage isn't mistaken for
        // where the activity is heading.
        self.instrumentation.wait_for_idle_sync();

        let in_expected = |s: &mut ScenarioState| {
            s.current_stage
                .steady_state()
                .map_or(false, |state| expected.contains(&state))
        };

        let mut guard = self.state.mutex.lock().unwrap();
        let reached = if self.instrumentation.is_main_thread() {
            in_expected(&mut *guard)
        } else {
            let (waited, result) = self
                .state.cond
                .wait_timeout_while(guard, self.state.config.timeout(), |s| !in_expected(s))
                .unwrap();
            guard = waited;
            !result.timed_out()
        };
        if !reached {
            return Err(TestError::StateTimeout {
                expected: describe(expected),
                last_stage: guard.current_stage,
            });
        }
        Ok(())
    }

    fn current_activity_state(&self) -> ActivityState {
        self.instrumentation.wait_for_idle_sync();
        let guard = self.state.mutex.lock().unwrap();
        ActivityState {
            activity: guard.current_activity.clone(),
            state: guard.current_stage.steady_state(),
            stage: guard.current_stage,
        }
    }

    /// Moves the activity to `new_state`.
    ///
    /// Does nothing if it's already there. Fails if the activity has been
    /// destroyed.
    pub fn move_to_state(&self, new_state: State) -> Result<&Self> {
        self.check_not_main_thread()?;
        self.instrumentation.wait_for_idle_sync();

        let current = self.current_activity_state();
        let state = current.state.ok_or_else(|| {
            TestError::IllegalState(format!(
                "Current state was null unexpectedly. Last stage = {}",
                current.stage
            ))
        })?;
        if state == new_state {
            return Ok(self);
        }
        let activity = match current.activity {
            Some(activity) if state != State::Destroyed => activity,
            _ => {
                return Err(TestError::IllegalState(format!(
                    "Cannot move to state \"{}\" since the Activity has been destroyed already",
                    new_state
                )))
            }
        };

        match new_state {
            State::Created => self.invoker.stop_activity(&activity)?,
            State::Started => {
                // Pausing is only possible from RESUMED or PAUSED
                self.move_to_state(State::Resumed)?;
                self.invoker.pause_activity(&activity)?;
            }
            State::Resumed => self.invoker.resume_activity(&activity)?,
            State::Destroyed => self.invoker.finish_activity(&activity)?,
        }

        self.wait_for_activity_to_become_any_of(&[new_state])?;
        Ok(self)
    }

    /// Destroys the activity and creates a new instance, then brings the new
    /// instance back to the state the old one was in.
    ///
    /// Recreation is moved through RESUMED first since what a recreate
    /// request does elsewhere depends on the platform version.
    pub fn recreate(&self) -> Result<&Self> {
        self.check_not_main_thread()?;
        self.instrumentation.wait_for_idle_sync();

        let previous = self.current_activity_state();
        let (Some(prev_activity), Some(prev_state)) = (previous.activity, previous.state) else {
            return Err(TestError::IllegalState(
                "Cannot recreate the Activity since it has been destroyed already".to_string(),
            ));
        };

        self.move_to_state(State::Resumed)?;
        self.invoker.recreate_activity(&prev_activity)?;

        // The request may be ignored, so only a different instance reaching
        // RESUMED counts as done.
        let deadline = Instant::now() + self.state.config.timeout();
        loop {
            self.instrumentation.wait_for_idle_sync();
            let guard = self.state.mutex.lock().unwrap();
            let recreated = |s: &mut ScenarioState| {
                s.current_stage == Stage::Resumed
                    && s.current_activity.as_ref().map_or(false, |a| a != &prev_activity)
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut guard = if self.instrumentation.is_main_thread() {
                guard
            } else {
                self.state.cond
                    .wait_timeout_while(guard, remaining, |s| !recreated(s))
                    .unwrap()
                    .0
            };
            if recreated(&mut *guard) {
                break;
            }
            if remaining.is_zero() || self.instrumentation.is_main_thread() {
                return Err(TestError::IllegalState(
                    "Requested a re-creation of Activity but didn't happen".to_string(),
                ));
            }
        }

        self.move_to_state(prev_state)?;
        Ok(self)
    }

    /// Runs `action` on the main thread with the current activity instance.
    ///
    /// The instance may be replaced by any later lifecycle change, so don't
    /// hold on to it past the call.
    pub fn on_activity<F>(&self, action: F) -> Result<&Self>
    where
        F: FnOnce(&Activity) + Send + 'static,
    {
        let state = self.state.clone();
        let run = move || -> Result<()> {
            let activity = state.mutex.lock().unwrap().current_activity.clone();
            let activity = activity.ok_or_else(|| {
                TestError::IllegalState(
                    "Cannot run onActivity since Activity has been destroyed already".to_string(),
                )
            })?;
            action(&activity);
            Ok(())
        };

        if self.instrumentation.is_main_thread() {
            self.instrumentation.looper().drain();
            run()?;
        } else {
            self.instrumentation.wait_for_idle_sync();
            self.instrumentation.run_on_main_sync(run)??;
        }
        Ok(self)
    }

    /// The current state.
    pub fn state(&self) -> Result<State> {
        let current = self.current_activity_state();
        current.state.ok_or_else(|| {
            TestError::IllegalState(format!(
                "Could not get current state of activity. Last stage = {}",
                current.stage
            ))
        })
    }

    /// The result the activity finished with.
    ///
    /// Blocks until the activity is finished, so it usually follows either
    /// the activity finishing itself or [`ActivityScenario::close`].
    pub fn result(&self) -> Result<ActivityResult> {
        self.invoker.activity_result()
    }

    /// Finishes the activity and stops tracking it. Calling it again does
    /// nothing.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let moved = self.move_to_state(State::Destroyed).map(|_| ());
        self.unregister();
        moved
    }
}

impl Drop for ActivityScenario {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        log::warn!(
            "ActivityScenario for {} was not closed, closing it now",
            self.state.start_intent
        );
        if let Err(err) = self.close() {
            log::error!("Failed to close ActivityScenario: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::intent::ComponentName;
    use crate::platform::activity::NoopBehavior;

    fn observer() -> (Instrumentation, WaitableScenarioState) {
        let instrumentation = Instrumentation::default();
        let start = Intent::for_component(ComponentName::new("com.example", "com.example.A"));
        let state = WaitableScenarioState::new(start, instrumentation.config().clone());
        (instrumentation, state)
    }

    fn activity_for(intent: Intent) -> Activity {
        Activity::detached_with_intent(intent, Box::new(NoopBehavior))
    }

    fn stage(state: &WaitableScenarioState) -> Stage {
        state.mutex.lock().unwrap().current_stage
    }

    #[test]
    fn only_on_create_starts_tracking_an_instance() {
        let (_instrumentation, state) = observer();
        let a = activity_for(state.start_intent.clone());

        state.on_activity_lifecycle_changed(&a, Stage::Resumed);
        assert_eq!(stage(&state), Stage::PreOnCreate);

        state.on_activity_lifecycle_changed(&a, Stage::Created);
        state.on_activity_lifecycle_changed(&a, Stage::Started);
        assert_eq!(stage(&state), Stage::Started);
        assert_eq!(state.mutex.lock().unwrap().current_activity, Some(a));
    }

    #[test]
    fn events_from_other_instances_are_ignored() {
        let (_instrumentation, state) = observer();
        let tracked = activity_for(state.start_intent.clone());
        let stale = activity_for(state.start_intent.clone());
        let foreign = activity_for(Intent::for_component(ComponentName::new("x", "x.Y")));

        state.on_activity_lifecycle_changed(&tracked, Stage::Created);
        state.on_activity_lifecycle_changed(&stale, Stage::Destroyed);
        state.on_activity_lifecycle_changed(&foreign, Stage::Paused);
        assert_eq!(stage(&state), Stage::Created);
    }

    #[test]
    fn destroyed_clears_the_tracked_instance() {
        let (_instrumentation, state) = observer();
        let a = activity_for(state.start_intent.clone());
        state.on_activity_lifecycle_changed(&a, Stage::Created);
        state.on_activity_lifecycle_changed(&a, Stage::Destroyed);
        assert!(state.mutex.lock().unwrap().current_activity.is_none());

        let b = activity_for(state.start_intent.clone());
        state.on_activity_lifecycle_changed(&b, Stage::Created);
        assert_eq!(state.mutex.lock().unwrap().current_activity, Some(b));
    }

    #[test]
    fn dont_keep_activities_is_rejected() {
        let instrumentation =
            Instrumentation::new(Config::default().with_always_finish_activities(true));
        let err = ActivityScenario::launch_activity(&instrumentation, "com.example.A").unwrap_err();
        assert!(matches!(err, TestError::IllegalState(_)));
    }

    #[test]
    fn expected_states_are_described_as_a_set() {
        assert_eq!(describe(&[State::Resumed]), "[RESUMED]");
        assert_eq!(
            describe(&State::ALL),
            "[CREATED, STARTED, RESUMED, DESTROYED]"
        );
    }
}
