//! Primitives that make an activity change lifecycle state.
//!
//! The platform has no "pause this activity" call, so every operation here is
//! indirect: other activities are started on top or finished, and it's up to
//! the caller to wait for the lifecycle events that follow.

use crate::error::Result;
use crate::intent::{Bundle, Intent};
use crate::platform::activity::{Activity, ActivityResult};

mod helpers;
mod instrumentation;

pub use helpers::{
    BOOTSTRAP_ACTIVITY, BOOTSTRAP_ACTIVITY_RESULT_RECEIVED, CANCEL_ACTIVITY_RESULT_WAITER,
    EMPTY_ACTIVITY, EMPTY_ACTIVITY_RESUMED, EMPTY_FLOATING_ACTIVITY,
    EMPTY_FLOATING_ACTIVITY_RESUMED, EXTRA_BOOTSTRAP_ACTIVITY_RESULT_CODE,
    EXTRA_BOOTSTRAP_ACTIVITY_RESULT_DATA, FINISH_BOOTSTRAP_ACTIVITY, FINISH_EMPTY_ACTIVITIES,
};
pub use instrumentation::InstrumentationActivityInvoker;

/// Starts activities and induces lifecycle transitions on them.
///
/// Implementations must be callable from any thread other than the main
/// thread. Methods taking an [`Activity`] fail with
/// [`TestError::IllegalState`](crate::TestError::IllegalState) when the
/// activity isn't in a stage the operation supports.
pub trait ActivityInvoker: Send + Sync {
    /// The intent that starts the activity class `class_name` of the target
    /// package as a main entry point.
    fn intent_for_activity(&self, class_name: &str) -> Intent;

    /// Starts an activity with `intent` and returns without waiting for it.
    fn start_activity(&self, intent: Intent, options: Option<Bundle>) -> Result<()>;

    /// Blocks until the activity started by the last
    /// [`ActivityInvoker::start_activity`] has delivered its result.
    fn activity_result(&self) -> Result<ActivityResult>;

    /// Requires the activity to be resumed, paused or stopped.
    fn resume_activity(&self, activity: &Activity) -> Result<()>;

    /// Requires the activity to be resumed or paused. Returns once the
    /// activity has lost focus.
    fn pause_activity(&self, activity: &Activity) -> Result<()>;

    /// Requires the activity to be resumed, paused or stopped. Returns once
    /// the activity is fully obscured.
    fn stop_activity(&self, activity: &Activity) -> Result<()>;

    /// Requires the activity to be resumed, paused or stopped.
    ///
    /// The stage the new instance ends up in depends on the platform
    /// version; on API 26 a stopped activity ignores the request entirely.
    fn recreate_activity(&self, activity: &Activity) -> Result<()>;

    /// Requires the activity to be resumed, paused or stopped.
    fn finish_activity(&self, activity: &Activity) -> Result<()>;
}
