//! Deterministic control over activity lifecycles for tests.
//!
//! An [`ActivityScenario`] launches an activity and moves it between the
//! [`State`]s a test cares about, blocking the test thread until the main
//! thread has actually carried out each transition. The transitions are
//! induced indirectly, the same way they are on a device: helper activities
//! are started on top of the activity under test and finished again, see
//! [`invoker`].
//!
//! Everything runs against an [`Instrumentation`], a host-side model of the
//! instrumented process with its own main thread, activity stack, package
//! manager and lifecycle monitor.

pub mod config;
pub use config::{Config, ConfigRef, VersionCode};

mod error;
pub use error::{check_state, Result, TestError};

pub mod intent;
pub use intent::{ComponentName, Intent};

pub mod lifecycle;
pub use lifecycle::{Stage, State};

pub mod invoker;
pub mod platform;
pub use platform::{Activity, ActivityResult, Instrumentation};

mod scenario;
pub use scenario::ActivityScenario;

mod util;
