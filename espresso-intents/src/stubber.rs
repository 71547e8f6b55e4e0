use std::sync::{Arc, Mutex};

use androidx_test_core::platform::{IntentStubber, MainLooper, PackageManager};
use androidx_test_core::{check_state, ActivityResult, Intent, Result};

use crate::matcher::{Matcher, ResolvedIntent};

/// Computes the result an intercepted intent responds with.
pub type ActivityResultFunction = Arc<dyn Fn(&Intent) -> ActivityResult + Send + Sync>;

/// An [`IntentStubber`] whose stubs can be added to and wiped between tests.
///
/// Everything except [`ResettingStubber::initialize`] must be called on the
/// main thread, where intents are intercepted.
pub trait ResettingStubber: IntentStubber {
    fn initialize(&self);

    fn is_initialized(&self) -> bool;

    /// Drops every stub and returns to the uninitialized state.
    fn reset(&self) -> Result<()>;

    fn set_activity_result_for_intent(
        &self,
        matcher: Matcher,
        result: ActivityResult,
    ) -> Result<()> {
        self.set_activity_result_function_for_intent(
            matcher,
            Arc::new(move |_: &Intent| result.clone()),
        )
    }

    /// Adds a stub. Stubs are never replaced; when several match an intent
    /// the one added last wins.
    fn set_activity_result_function_for_intent(
        &self,
        matcher: Matcher,
        function: ActivityResultFunction,
    ) -> Result<()>;
}

#[derive(Default)]
struct StubberState {
    initialized: bool,
    responses: Vec<(Matcher, ActivityResultFunction)>,
}

pub struct ResettingStubberImpl {
    looper: MainLooper,
    package_manager: PackageManager,
    state: Mutex<StubberState>,
}

impl std::fmt::Debug for ResettingStubberImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.lock().unwrap();
        f.debug_struct("ResettingStubberImpl")
            .field("initialized", &guard.initialized)
            .field("stubs", &guard.responses.len())
            .finish()
    }
}

impl ResettingStubberImpl {
    pub fn new(looper: MainLooper, package_manager: PackageManager) -> Self {
        Self {
            looper,
            package_manager,
            state: Mutex::new(StubberState::default()),
        }
    }

    /// Resolves `intent` against the installed activities so that matchers
    /// like [`to_package`](crate::matcher::to_package) can see where it
    /// would go.
    pub fn resolve_intent(&self, intent: &Intent) -> ResolvedIntent {
        ResolvedIntent::resolve(intent, &self.package_manager)
    }

    fn check_initialized(&self, state: &StubberState) -> Result<()> {
        check_state(state.initialized, || {
            "ResettingStubber must be initialized before calling this method".to_string()
        })
    }

    fn check_main(&self) -> Result<()> {
        self.looper.check_main_thread("Must be called on main thread.")
    }
}

impl ResettingStubber for ResettingStubberImpl {
    fn initialize(&self) {
        self.state.lock().unwrap().initialized = true;
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    fn reset(&self) -> Result<()> {
        self.check_main()?;
        let mut guard = self.state.lock().unwrap();
        guard.responses.clear();
        guard.initialized = false;
        Ok(())
    }

    fn set_activity_result_function_for_intent(
        &self,
        matcher: Matcher,
        function: ActivityResultFunction,
    ) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        self.check_initialized(&guard)?;
        self.check_main()?;
        log::debug!("Stubbing intents matching: {}", matcher.describe());
        guard.responses.push((matcher, function));
        Ok(())
    }
}

impl IntentStubber for ResettingStubberImpl {
    fn activity_result_for_intent(&self, intent: &Intent) -> Result<Option<ActivityResult>> {
        let function = {
            let guard = self.state.lock().unwrap();
            self.check_initialized(&guard)?;
            self.check_main()?;
            let resolved = self.resolve_intent(intent);
            guard
                .responses
                .iter()
                .rev()
                .find(|(matcher, _)| matcher.matches(&resolved))
                .map(|(_, function)| function.clone())
        };
        Ok(function.map(|function| function(intent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{any_intent, has_action};
    use androidx_test_core::platform::{RESULT_CANCELED, RESULT_OK};
    use androidx_test_core::TestError;

    fn stubber() -> (MainLooper, Arc<ResettingStubberImpl>) {
        let looper = MainLooper::start();
        let stubber = Arc::new(ResettingStubberImpl::new(looper.clone(), PackageManager::new()));
        (looper, stubber)
    }

    #[test]
    fn stubbing_requires_initialization() {
        let (looper, stubber) = stubber();
        let remote = stubber.clone();
        let result = looper
            .run_on_main_sync(move || {
                remote.set_activity_result_for_intent(any_intent(), ActivityResult::canceled())
            })
            .unwrap();
        assert!(matches!(result, Err(TestError::IllegalState(_))));
        looper.quit();
    }

    #[test]
    fn stubs_are_only_touched_on_the_main_thread() {
        let (looper, stubber) = stubber();
        stubber.initialize();
        assert!(matches!(
            stubber.set_activity_result_for_intent(any_intent(), ActivityResult::canceled()),
            Err(TestError::NonMainThread(_))
        ));
        assert!(matches!(
            stubber.activity_result_for_intent(&Intent::new("a")),
            Err(TestError::NonMainThread(_))
        ));
        assert!(matches!(stubber.reset(), Err(TestError::NonMainThread(_))));
        looper.quit();
    }

    #[test]
    fn last_registered_stub_wins() {
        let (looper, stubber) = stubber();
        stubber.initialize();
        let remote = stubber.clone();
        let results = looper
            .run_on_main_sync(move || -> Result<_> {
                remote.set_activity_result_for_intent(
                    has_action("a"),
                    ActivityResult::new(RESULT_CANCELED, None),
                )?;
                remote.set_activity_result_for_intent(
                    any_intent(),
                    ActivityResult::new(RESULT_OK, None),
                )?;
                remote.set_activity_result_function_for_intent(
                    has_action("b"),
                    Arc::new(|intent: &Intent| {
                        ActivityResult::new(RESULT_OK, Some(intent.clone()))
                    }),
                )?;
                Ok((
                    remote.activity_result_for_intent(&Intent::new("a"))?,
                    remote.activity_result_for_intent(&Intent::new("b"))?,
                ))
            })
            .unwrap()
            .unwrap();
        assert_eq!(results.0, Some(ActivityResult::new(RESULT_OK, None)));
        assert_eq!(
            results.1,
            Some(ActivityResult::new(RESULT_OK, Some(Intent::new("b"))))
        );
        looper.quit();
    }

    #[test]
    fn reset_forgets_stubs() {
        let (looper, stubber) = stubber();
        stubber.initialize();
        let remote = stubber.clone();
        let after_reset = looper
            .run_on_main_sync(move || -> Result<_> {
                remote.set_activity_result_for_intent(any_intent(), ActivityResult::canceled())?;
                remote.reset()?;
                remote.initialize();
                remote.activity_result_for_intent(&Intent::new("a"))
            })
            .unwrap()
            .unwrap();
        assert_eq!(after_reset, None);
        looper.quit();
    }
}
