//! Process-local broadcasts.
//!
//! Deliveries are asynchronous: [`LocalBroadcastManager::send_broadcast`]
//! returns immediately and the matching receivers run later on the main
//! thread. A receiver unregistered before delivery doesn't see the broadcast.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::intent::Intent;

use super::looper::MainLooper;

pub type Receiver = Arc<dyn Fn(&Intent) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

struct Registration {
    id: ReceiverId,
    actions: Vec<String>,
    receiver: Receiver,
}

struct Inner {
    looper: MainLooper,
    next_id: AtomicU64,
    receivers: Mutex<Vec<Registration>>,
}

#[derive(Clone)]
pub struct LocalBroadcastManager {
    inner: Arc<Inner>,
}

impl LocalBroadcastManager {
    pub fn new(looper: MainLooper) -> Self {
        Self {
            inner: Arc::new(Inner {
                looper,
                next_id: AtomicU64::new(1),
                receivers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn register_receiver<A, F>(&self, actions: &[A], receiver: F) -> ReceiverId
    where
        A: AsRef<str>,
        F: Fn(&Intent) + Send + Sync + 'static,
    {
        let id = ReceiverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let actions: Vec<String> = actions.iter().map(|a| a.as_ref().to_string()).collect();
        log::trace!("Registering receiver {:?} for {:?}", id, actions);
        self.inner.receivers.lock().unwrap().push(Registration {
            id,
            actions,
            receiver: Arc::new(receiver),
        });
        id
    }

    /// Returns `false` if `id` wasn't registered.
    pub fn unregister_receiver(&self, id: ReceiverId) -> bool {
        let mut guard = self.inner.receivers.lock().unwrap();
        let before = guard.len();
        guard.retain(|registration| registration.id != id);
        before != guard.len()
    }

    pub fn send_broadcast(&self, intent: Intent) {
        log::debug!("Sending broadcast: {}", intent);
        let inner = self.inner.clone();
        self.inner.looper.post(move || inner.deliver(&intent));
    }

    pub fn receiver_count(&self) -> usize {
        self.inner.receivers.lock().unwrap().len()
    }
}

impl Inner {
    fn deliver(&self, intent: &Intent) {
        let Some(action) = intent.action() else {
            return;
        };
        // Receivers commonly unregister themselves (or register others) while
        // handling a broadcast so we mustn't hold the lock while calling them.
        let matching: Vec<(ReceiverId, Receiver)> = self
            .receivers
            .lock()
            .unwrap()
            .iter()
            .filter(|registration| registration.actions.iter().any(|a| a == action))
            .map(|registration| (registration.id, registration.receiver.clone()))
            .collect();

        for (id, receiver) in matching {
            let still_registered = self
                .receivers
                .lock()
                .unwrap()
                .iter()
                .any(|registration| registration.id == id);
            if still_registered {
                receiver(intent);
            }
        }
    }
}
