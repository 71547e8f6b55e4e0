use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

mod monitor;
pub use monitor::{ActivityLifecycleCallback, ActivityLifecycleMonitor};

/// A fine-grained lifecycle transition point, as signalled by the runtime for
/// every activity in the process.
///
/// Only [`Stage::Resumed`], [`Stage::Paused`], [`Stage::Stopped`] and
/// [`Stage::Destroyed`] are rest points; the others are transient and must
/// never be treated as a place to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Stage {
    PreOnCreate = 0,
    Created = 1,
    Started = 2,
    Resumed = 3,
    Paused = 4,
    Stopped = 5,
    Restarted = 6,
    Destroyed = 7,
}

impl Stage {
    /// The public state this stage rests in, if it is a steady stage.
    pub fn steady_state(self) -> Option<State> {
        match self {
            Stage::Resumed => Some(State::Resumed),
            Stage::Paused => Some(State::Started),
            Stage::Stopped => Some(State::Created),
            Stage::Destroyed => Some(State::Destroyed),
            Stage::PreOnCreate | Stage::Created | Stage::Started | Stage::Restarted => None,
        }
    }

    pub fn is_steady(self) -> bool {
        self.steady_state().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::PreOnCreate => "PRE_ON_CREATE",
            Stage::Created => "CREATED",
            Stage::Started => "STARTED",
            Stage::Resumed => "RESUMED",
            Stage::Paused => "PAUSED",
            Stage::Stopped => "STOPPED",
            Stage::Restarted => "RESTARTED",
            Stage::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coarse-grained steady lifecycle state, the contract exposed to tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Created,
    Started,
    Resumed,
    Destroyed,
}

impl State {
    pub const ALL: [State; 4] = [
        State::Created,
        State::Started,
        State::Resumed,
        State::Destroyed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            State::Created => "CREATED",
            State::Started => "STARTED",
            State::Resumed => "RESUMED",
            State::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
