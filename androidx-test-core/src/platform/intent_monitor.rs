use std::sync::{Arc, Mutex, RwLock};

use crate::error::{check_state, Result};
use crate::intent::Intent;

use super::activity::ActivityResult;

/// Notified about every intent an activity sends to start another activity.
///
/// Always called on the main thread, before the intent is resolved.
pub trait IntentCallback: Send + Sync {
    fn on_intent_sent(&self, intent: &Intent);
}

#[derive(Clone, Default)]
pub struct IntentMonitor {
    callbacks: Arc<Mutex<Vec<Arc<dyn IntentCallback>>>>,
}

impl IntentMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_intent_callback(&self, callback: Arc<dyn IntentCallback>) {
        let mut guard = self.callbacks.lock().unwrap();
        if !guard.iter().any(|stored| same_callback(stored, &callback)) {
            guard.push(callback);
        }
    }

    pub fn remove_intent_callback(&self, callback: &Arc<dyn IntentCallback>) {
        self.callbacks
            .lock()
            .unwrap()
            .retain(|stored| !same_callback(stored, callback));
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    pub fn signal_intent(&self, intent: &Intent) {
        log::trace!("Intent sent: {}", intent);
        let callbacks = self.callbacks.lock().unwrap().clone();
        for callback in callbacks {
            callback.on_intent_sent(intent);
        }
    }
}

fn same_callback(a: &Arc<dyn IntentCallback>, b: &Arc<dyn IntentCallback>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Supplies canned activity results for intents instead of launching them.
pub trait IntentStubber: Send + Sync {
    /// `Ok(None)` lets the intent through to the real activity.
    fn activity_result_for_intent(&self, intent: &Intent) -> Result<Option<ActivityResult>>;
}

/// Slot for the one process-wide [`IntentStubber`].
#[derive(Clone, Default)]
pub struct IntentStubberRegistry {
    stubber: Arc<RwLock<Option<Arc<dyn IntentStubber>>>>,
}

impl IntentStubberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, stubber: Arc<dyn IntentStubber>) -> Result<()> {
        let mut guard = self.stubber.write().unwrap();
        check_state(guard.is_none(), || {
            "Intent stubber already registered! Multiple stubbers are not allowed. \
             Are you calling init() more than once?"
                .to_string()
        })?;
        *guard = Some(stubber);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.stubber.read().unwrap().is_some()
    }

    pub fn reset(&self) {
        *self.stubber.write().unwrap() = None;
    }

    /// Consults the loaded stubber, if any.
    pub fn activity_result_for_intent(&self, intent: &Intent) -> Result<Option<ActivityResult>> {
        let stubber = self.stubber.read().unwrap().clone();
        match stubber {
            Some(stubber) => stubber.activity_result_for_intent(intent),
            None => Ok(None),
        }
    }
}
