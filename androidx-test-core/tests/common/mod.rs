#![allow(dead_code)]

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use androidx_test_core::config::DEFAULT_TARGET_PACKAGE;
use androidx_test_core::intent::Bundle;
use androidx_test_core::invoker::{ActivityInvoker, InstrumentationActivityInvoker};
use androidx_test_core::platform::{
    ActivityBehavior, ActivityContext, ActivityInfo, RESULT_FIRST_USER,
};
use androidx_test_core::{
    Activity, ActivityResult, ActivityScenario, ComponentName, Config, Instrumentation, Intent,
    Result, Stage,
};

pub const MAIN_ACTIVITY: &str = "androidx.test.app.MainActivity";
pub const FINISH_ON_CREATE_ACTIVITY: &str = "androidx.test.app.FinishOnCreateActivity";
pub const RESULT_ACTIVITY: &str = "androidx.test.app.ResultActivity";

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Remembers every lifecycle callback it received.
#[derive(Debug, Default)]
pub struct RecordingActivity {
    pub callbacks: Vec<Stage>,
}

impl ActivityBehavior for RecordingActivity {
    fn on_create(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Created);
    }
    fn on_start(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Started);
    }
    fn on_restart(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Restarted);
    }
    fn on_resume(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Resumed);
    }
    fn on_pause(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Paused);
    }
    fn on_stop(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Stopped);
    }
    fn on_destroy(&mut self, _ctx: &ActivityContext<'_>) {
        self.callbacks.push(Stage::Destroyed);
    }
}

pub struct FinishOnCreateActivity;

impl ActivityBehavior for FinishOnCreateActivity {
    fn on_create(&mut self, ctx: &ActivityContext<'_>) {
        ctx.finish();
    }
}

/// Finishes with a result as soon as it's resumed.
pub struct ResultActivity;

impl ActivityBehavior for ResultActivity {
    fn on_resume(&mut self, ctx: &ActivityContext<'_>) {
        ctx.set_result(
            RESULT_FIRST_USER,
            Some(Intent::new("androidx.test.app.RESULT").with_extra("answer", 42)),
        );
        ctx.finish();
    }
}

pub fn component(class_name: &str) -> ComponentName {
    ComponentName::new(DEFAULT_TARGET_PACKAGE, class_name)
}

/// The instance the scenario currently tracks.
pub fn current_activity(scenario: &ActivityScenario) -> Activity {
    let (tx, rx) = mpsc::channel();
    scenario
        .on_activity(move |activity| tx.send(activity.clone()).unwrap())
        .unwrap();
    rx.recv().unwrap()
}

pub fn recorded_callbacks(activity: &Activity) -> Vec<Stage> {
    activity
        .with_behavior(|recording: &mut RecordingActivity| recording.callbacks.clone())
        .unwrap_or_default()
}

pub fn test_config() -> Config {
    Config::default().with_timeout(TEST_TIMEOUT)
}

pub fn instrumentation() -> Instrumentation {
    instrumentation_with(test_config())
}

pub fn instrumentation_with(config: Config) -> Instrumentation {
    init_logging();
    let instrumentation = Instrumentation::new(config);
    instrumentation.register_activity(ActivityInfo::new(component(MAIN_ACTIVITY), || {
        Box::<RecordingActivity>::default()
    }));
    instrumentation.register_activity(ActivityInfo::new(
        component(FINISH_ON_CREATE_ACTIVITY),
        || Box::new(FinishOnCreateActivity),
    ));
    instrumentation.register_activity(ActivityInfo::new(component(RESULT_ACTIVITY), || {
        Box::new(ResultActivity)
    }));
    instrumentation
}

/// Delegates to the real invoker, recording every call and optionally
/// swallowing some of them.
pub struct ScriptedInvoker {
    inner: InstrumentationActivityInvoker,
    pub calls: Mutex<Vec<&'static str>>,
    pub swallow_start: bool,
    pub swallow_recreate: bool,
}

impl ScriptedInvoker {
    pub fn install(instrumentation: &Instrumentation) -> Arc<Self> {
        Self::install_with(instrumentation, false, false)
    }

    pub fn install_with(
        instrumentation: &Instrumentation,
        swallow_start: bool,
        swallow_recreate: bool,
    ) -> Arc<Self> {
        let invoker = Arc::new(Self {
            inner: InstrumentationActivityInvoker::new(instrumentation),
            calls: Mutex::new(Vec::new()),
            swallow_start,
            swallow_recreate,
        });
        instrumentation.set_activity_invoker(invoker.clone());
        invoker
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ActivityInvoker for ScriptedInvoker {
    fn intent_for_activity(&self, class_name: &str) -> Intent {
        self.inner.intent_for_activity(class_name)
    }

    fn start_activity(&self, intent: Intent, options: Option<Bundle>) -> Result<()> {
        self.record("start");
        if self.swallow_start {
            return Ok(());
        }
        self.inner.start_activity(intent, options)
    }

    fn activity_result(&self) -> Result<ActivityResult> {
        self.inner.activity_result()
    }

    fn resume_activity(&self, activity: &Activity) -> Result<()> {
        self.record("resume");
        self.inner.resume_activity(activity)
    }

    fn pause_activity(&self, activity: &Activity) -> Result<()> {
        self.record("pause");
        self.inner.pause_activity(activity)
    }

    fn stop_activity(&self, activity: &Activity) -> Result<()> {
        self.record("stop");
        self.inner.stop_activity(activity)
    }

    fn recreate_activity(&self, activity: &Activity) -> Result<()> {
        self.record("recreate");
        if self.swallow_recreate {
            return Ok(());
        }
        self.inner.recreate_activity(activity)
    }

    fn finish_activity(&self, activity: &Activity) -> Result<()> {
        self.record("finish");
        self.inner.finish_activity(activity)
    }
}
