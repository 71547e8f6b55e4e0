//! Short-lived activities used to steal or give back focus.
//!
//! They are installed in the target package alongside the application's own
//! activities and talk to the invoker through process-local broadcasts.

use crate::intent::{Intent, IntentFlags};
use crate::platform::activity::{ActivityBehavior, ActivityResult};
use crate::platform::activity_manager::ActivityContext;

pub const BOOTSTRAP_ACTIVITY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker$BootstrapActivity";
pub const EMPTY_ACTIVITY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker$EmptyActivity";
pub const EMPTY_FLOATING_ACTIVITY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker$EmptyFloatingActivity";

/// Sent by the bootstrap activity once the target activity delivered its result.
pub const BOOTSTRAP_ACTIVITY_RESULT_RECEIVED: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.BOOTSTRAP_ACTIVITY_RESULT_RECEIVED";
pub const EXTRA_BOOTSTRAP_ACTIVITY_RESULT_CODE: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.EXTRA_BOOTSTRAP_ACTIVITY_RESULT_CODE";
pub const EXTRA_BOOTSTRAP_ACTIVITY_RESULT_DATA: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.EXTRA_BOOTSTRAP_ACTIVITY_RESULT_DATA";
/// Makes the pending result waiter stop listening.
pub const CANCEL_ACTIVITY_RESULT_WAITER: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.CANCEL_ACTIVITY_RESULT_WAITER";
pub const EMPTY_ACTIVITY_RESUMED: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.EMPTY_ACTIVITY_RESUMED";
pub const EMPTY_FLOATING_ACTIVITY_RESUMED: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.EMPTY_FLOATING_ACTIVITY_RESUMED";
pub const FINISH_BOOTSTRAP_ACTIVITY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.FINISH_BOOTSTRAP_ACTIVITY";
pub const FINISH_EMPTY_ACTIVITIES: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.FINISH_EMPTY_ACTIVITIES";

pub(super) const TARGET_INTENT_KEY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.START_TARGET_INTENT_KEY";
pub(super) const TARGET_INTENT_OPTIONS_KEY: &str =
    "androidx.test.core.app.InstrumentationActivityInvoker.START_TARGET_INTENT_OPTIONS_KEY";

const TARGET_REQUEST_CODE: i32 = 0;

/// A translucent activity that starts the real target for result, so the
/// target's result can be captured, and forwards that result as a broadcast.
#[derive(Debug, Default)]
pub(super) struct BootstrapActivity {
    target_started: bool,
}

impl ActivityBehavior for BootstrapActivity {
    fn on_create(&mut self, ctx: &ActivityContext<'_>) {
        ctx.register_receiver(&[FINISH_BOOTSTRAP_ACTIVITY], |ctx, _| {
            ctx.finish_activity(TARGET_REQUEST_CODE);
            ctx.finish();
        });
    }

    fn on_resume(&mut self, ctx: &ActivityContext<'_>) {
        if self.target_started {
            return;
        }
        self.target_started = true;

        let intent = ctx.activity().intent();
        let Some(target) = intent.intent_extra(TARGET_INTENT_KEY).cloned() else {
            log::error!("{:?} was started without a target intent", ctx.activity());
            ctx.finish();
            return;
        };
        let options = intent.bundle_extra(TARGET_INTENT_OPTIONS_KEY).cloned();

        // The target has to stay in this task for its result to come back here
        let flags = target.flags() - IntentFlags::TASK_MASK;
        let started =
            ctx.start_activity_for_result(target.with_flags(flags), TARGET_REQUEST_CODE, options);
        if let Err(err) = started {
            log::error!("Failed to start target activity: {}", err);
        }
    }

    fn on_activity_result(
        &mut self,
        ctx: &ActivityContext<'_>,
        request_code: i32,
        result: ActivityResult,
    ) {
        if request_code != TARGET_REQUEST_CODE {
            return;
        }
        let mut broadcast = Intent::new(BOOTSTRAP_ACTIVITY_RESULT_RECEIVED)
            .with_extra(EXTRA_BOOTSTRAP_ACTIVITY_RESULT_CODE, result.result_code());
        if let Some(data) = result.result_data() {
            broadcast = broadcast.with_extra(EXTRA_BOOTSTRAP_ACTIVITY_RESULT_DATA, data.clone());
        }
        ctx.send_broadcast(broadcast);
        ctx.finish();
    }
}

/// An activity that announces being resumed and finishes on request.
///
/// Opaque to push whatever is below it to stopped, floating to only take
/// focus away.
#[derive(Debug)]
pub(super) struct EmptyActivity {
    resumed_action: &'static str,
}

impl EmptyActivity {
    pub fn opaque() -> Self {
        Self {
            resumed_action: EMPTY_ACTIVITY_RESUMED,
        }
    }

    pub fn floating() -> Self {
        Self {
            resumed_action: EMPTY_FLOATING_ACTIVITY_RESUMED,
        }
    }
}

impl ActivityBehavior for EmptyActivity {
    fn on_create(&mut self, ctx: &ActivityContext<'_>) {
        ctx.register_receiver(&[FINISH_EMPTY_ACTIVITIES], |ctx, _| ctx.finish());
    }

    fn on_resume(&mut self, ctx: &ActivityContext<'_>) {
        ctx.send_broadcast(Intent::new(self.resumed_action));
    }
}
