//! Validation and stubbing of the intents an application under test sends.
//!
//! While an [`Intents`] session is initialized every intent an activity sends
//! to start another activity is recorded, and intents matching a stub never
//! reach their target: the sending activity gets the stubbed
//! [`ActivityResult`](androidx_test_core::ActivityResult) back instead.
//! Recorded intents are checked with [`Intents::intended`] and friends, using
//! the matchers in [`matcher`].

pub mod matcher;
pub use matcher::{IntentMatcher, Matcher, ResolvedIntent};

mod stubber;
pub use stubber::{ActivityResultFunction, ResettingStubber, ResettingStubberImpl};

mod verification;
pub use verification::{VerifiableIntent, VerificationMode};

mod intents;
pub use intents::{
    no_unverified_intents, times, Intents, LooperIdling, OngoingStubbing, UiIdling,
};
