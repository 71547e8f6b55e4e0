use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use androidx_test_core::platform::{IntentCallback, IntentStubber, MainLooper, PackageManager};
use androidx_test_core::{
    check_state, ActivityResult, Instrumentation, Intent, Result, Stage, TestError,
};

use crate::matcher::{any_intent, Matcher, ResolvedIntent};
use crate::stubber::{ActivityResultFunction, ResettingStubber, ResettingStubberImpl};
use crate::verification::{VerifiableIntent, VerificationMode};

/// Runs a task on the main thread once the UI has nothing left to do.
///
/// Verifications go through this whenever an activity is resumed so they
/// don't race UI work that is about to send intents.
pub trait UiIdling: Send + Sync {
    fn run_when_idle(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<()>;
}

/// Waits for the main looper to drain and runs the task there.
#[derive(Debug, Clone)]
pub struct LooperIdling {
    looper: MainLooper,
}

impl LooperIdling {
    pub fn new(looper: MainLooper) -> Self {
        Self { looper }
    }
}

impl UiIdling for LooperIdling {
    fn run_when_idle(&self, task: Box<dyn FnOnce() + Send + 'static>) -> Result<()> {
        self.looper.wait_for_idle_sync();
        self.looper.run_on_main_sync(task)
    }
}

type RecordedIntents = Arc<Mutex<Vec<VerifiableIntent>>>;

struct IntentRecorder {
    package_manager: PackageManager,
    recorded: RecordedIntents,
}

impl IntentCallback for IntentRecorder {
    fn on_intent_sent(&self, intent: &Intent) {
        let resolved = ResolvedIntent::resolve(intent, &self.package_manager);
        log::trace!("Recording {}", resolved);
        self.recorded
            .lock()
            .unwrap()
            .push(VerifiableIntent::new(resolved));
    }
}

/// Records the intents activities send and lets tests stub and verify them.
///
/// Call [`Intents::init`] before the code under test sends anything and
/// [`Intents::release`] at the end of the test. A session that is still
/// initialized when dropped is released with a warning.
///
/// ```no_run
/// use androidx_test_core::platform::RESULT_OK;
/// use androidx_test_core::{ActivityResult, Instrumentation};
/// use espresso_intents::matcher::{has_action, to_package};
/// use espresso_intents::Intents;
///
/// let instrumentation = Instrumentation::default();
/// let intents = Intents::new(&instrumentation);
/// intents.init()?;
/// intents
///     .intending(to_package("com.android.camera"))
///     .respond_with(ActivityResult::new(RESULT_OK, None))?;
/// // ... exercise the activity under test ...
/// intents.intended(has_action("android.media.action.IMAGE_CAPTURE"))?;
/// intents.release()?;
/// # Ok::<(), androidx_test_core::TestError>(())
/// ```
pub struct Intents {
    instrumentation: Instrumentation,
    stubber: Arc<ResettingStubberImpl>,
    recorder: Arc<IntentRecorder>,
    idling: Arc<dyn UiIdling>,
    initialized: AtomicBool,
}

impl std::fmt::Debug for Intents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intents")
            .field("stubber", &self.stubber)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Intents {
    pub fn new(instrumentation: &Instrumentation) -> Self {
        let idling = Arc::new(LooperIdling::new(instrumentation.looper().clone()));
        Self::with_idling(instrumentation, idling)
    }

    pub fn with_idling(instrumentation: &Instrumentation, idling: Arc<dyn UiIdling>) -> Self {
        Self {
            instrumentation: instrumentation.clone(),
            stubber: Arc::new(ResettingStubberImpl::new(
                instrumentation.looper().clone(),
                instrumentation.package_manager().clone(),
            )),
            recorder: Arc::new(IntentRecorder {
                package_manager: instrumentation.package_manager().clone(),
                recorded: Arc::new(Mutex::new(Vec::new())),
            }),
            idling,
            initialized: AtomicBool::new(false),
        }
    }

    /// Starts recording intents and installs the stubber.
    pub fn init(&self) -> Result<()> {
        check_state(!self.initialized.load(Ordering::Acquire), || {
            "#init was called twice in a row. Make sure to call #release after every #init"
                .to_string()
        })?;
        let stubber: Arc<dyn IntentStubber> = self.stubber.clone();
        self.instrumentation.intent_stubbers().load(stubber)?;
        self.instrumentation
            .intent_monitor()
            .add_intent_callback(self.recorder.clone());
        self.stubber.initialize();
        self.initialized.store(true, Ordering::Release);
        log::debug!("Intents initialized");
        Ok(())
    }

    /// Stops recording, removes every stub and forgets the recorded intents.
    pub fn release(&self) -> Result<()> {
        self.check_initialized()?;
        let callback: Arc<dyn IntentCallback> = self.recorder.clone();
        self.instrumentation
            .intent_monitor()
            .remove_intent_callback(&callback);
        self.instrumentation.intent_stubbers().reset();

        let recorded = self.recorder.recorded.clone();
        let stubber = self.stubber.clone();
        let reset = self.on_main_sync(move || {
            recorded.lock().unwrap().clear();
            stubber.reset()
        });
        self.initialized.store(false, Ordering::Release);
        log::debug!("Intents released");
        reset
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Starts stubbing intents matched by `matcher`.
    pub fn intending(&self, matcher: Matcher) -> OngoingStubbing<'_> {
        OngoingStubbing {
            intents: self,
            matcher,
        }
    }

    /// Asserts exactly one recorded intent matches.
    pub fn intended(&self, matcher: Matcher) -> Result<()> {
        self.intended_with(matcher, times(1))
    }

    /// Asserts the recorded intents satisfy `mode` for `matcher`.
    ///
    /// Runs once the main thread is idle. If an activity is resumed the check
    /// waits for the UI to settle too.
    pub fn intended_with(&self, matcher: Matcher, mode: VerificationMode) -> Result<()> {
        self.check_initialized()?;
        self.instrumentation.wait_for_idle_sync();

        let recorded = self.recorder.recorded.clone();
        let check = move || -> Result<()> {
            let mut guard = recorded.lock().unwrap();
            mode.verify(&*matcher, &mut guard[..])
        };

        if self.resumed_activities_exist()? {
            let (tx, rx) = mpsc::channel();
            self.idling.run_when_idle(Box::new(move || {
                let _ = tx.send(check());
            }))?;
            rx.recv().map_err(|_| {
                TestError::IllegalState("the verification never ran".to_string())
            })?
        } else {
            let result = self.on_main_sync(check);
            self.instrumentation.wait_for_idle_sync();
            result
        }
    }

    /// Asserts that every recorded intent has been verified.
    pub fn assert_no_unverified_intents(&self) -> Result<()> {
        self.intended_with(any_intent(), no_unverified_intents())
    }

    /// The intents recorded since [`Intents::init`], oldest first.
    pub fn get_intents(&self) -> Result<Vec<Intent>> {
        let recorded = self.recorder.recorded.clone();
        self.on_main_sync(move || {
            Ok(recorded
                .lock()
                .unwrap()
                .iter()
                .map(|intent| intent.intent().clone())
                .collect())
        })
    }

    fn check_initialized(&self) -> Result<()> {
        check_state(self.is_initialized(), || {
            "init() must be called prior to using this method.".to_string()
        })
    }

    fn resumed_activities_exist(&self) -> Result<bool> {
        let monitor = self.instrumentation.lifecycle_monitor().clone();
        self.on_main_sync(move || Ok(!monitor.activities_in_stage(Stage::Resumed)?.is_empty()))
    }

    fn on_main_sync<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.instrumentation.run_on_main_sync(f)?
    }
}

impl Drop for Intents {
    fn drop(&mut self) {
        if !self.is_initialized() {
            return;
        }
        log::warn!("Intents was not released, releasing it now");
        if let Err(err) = self.release() {
            log::error!("Failed to release Intents: {}", err);
        }
    }
}

/// A stub waiting for its response, see [`Intents::intending`].
pub struct OngoingStubbing<'a> {
    intents: &'a Intents,
    matcher: Matcher,
}

impl OngoingStubbing<'_> {
    /// Responds to matching intents with `result` instead of launching them.
    pub fn respond_with(self, result: ActivityResult) -> Result<()> {
        self.respond_with_function(move |_: &Intent| result.clone())
    }

    /// Responds to matching intents with whatever `function` computes from
    /// the intent.
    pub fn respond_with_function<F>(self, function: F) -> Result<()>
    where
        F: Fn(&Intent) -> ActivityResult + Send + Sync + 'static,
    {
        self.intents.check_initialized()?;
        let stubber = self.intents.stubber.clone();
        let matcher = self.matcher;
        let function: ActivityResultFunction = Arc::new(function);
        self.intents
            .on_main_sync(move || {
                stubber.set_activity_result_function_for_intent(matcher, function)
            })
    }
}

/// Expects exactly `times` matching intents.
pub fn times(times: usize) -> VerificationMode {
    VerificationMode::Times(times)
}

/// Expects no matching intent to be left unverified.
pub fn no_unverified_intents() -> VerificationMode {
    VerificationMode::NoUnverifiedIntents
}
