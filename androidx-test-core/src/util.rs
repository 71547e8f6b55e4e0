use std::any::Any;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

pub(crate) fn log_panic(payload: Box<dyn Any + Send>) -> String {
    let msg = panic_message(&*payload);
    log::error!("Caught panic: {}", msg);
    msg
}

/// A one-shot countdown latch.
#[derive(Debug)]
pub(crate) struct Latch {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    pub fn count_down(&self) {
        let mut guard = self.count.lock().unwrap();
        if *guard > 0 {
            *guard -= 1;
            if *guard == 0 {
                self.cond.notify_all();
            }
        }
    }

    /// Returns `false` if the count didn't reach zero before `timeout` elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.count.lock().unwrap();
        while *guard > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self.cond.wait_timeout(guard, deadline - now).unwrap().0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn latch_releases_waiter_from_another_thread() {
        let latch = Arc::new(Latch::new(1));
        let remote = latch.clone();
        let handle = thread::spawn(move || remote.count_down());
        assert!(latch.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn latch_times_out_when_never_counted_down() {
        let latch = Latch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom 1");
    }
}
