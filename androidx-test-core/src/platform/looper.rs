//! The main (UI) thread of the host process.
//!
//! All lifecycle callbacks, broadcast deliveries, intent interception and
//! `on_activity` actions run here, one task at a time. Test threads hand work
//! over with [`MainLooper::post`] or [`MainLooper::run_on_main_sync`] and use
//! [`MainLooper::wait_for_idle_sync`] to flush whatever has been queued.

use std::collections::VecDeque;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use crate::error::{InternalError, InternalResult, TestError};
use crate::util::log_panic;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
pub struct LooperState {
    queue: VecDeque<Task>,
    /// Set while a task is running outside of the lock
    busy: bool,
    quit: bool,
}

pub struct WaitableLooperState {
    pub mutex: Mutex<LooperState>,
    pub cond: Condvar,
}

#[derive(Clone)]
pub struct MainLooper {
    inner: Arc<WaitableLooperState>,
    thread_id: ThreadId,
}

impl Deref for MainLooper {
    type Target = WaitableLooperState;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for MainLooper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLooper")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

impl MainLooper {
    /// Spawns the main thread and starts looping.
    pub fn start() -> Self {
        let inner = Arc::new(WaitableLooperState {
            mutex: Mutex::new(LooperState::default()),
            cond: Condvar::new(),
        });

        let thread_state = inner.clone();
        let handle = thread::Builder::new()
            .name("main".to_string())
            .spawn(move || thread_state.run_loop())
            .expect("Failed to spawn main looper thread");

        Self {
            inner,
            thread_id: handle.thread().id(),
        }
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn check_main_thread(&self, what: &str) -> crate::Result<()> {
        if self.is_main_thread() {
            Ok(())
        } else {
            Err(TestError::NonMainThread(what.to_string()))
        }
    }

    pub fn check_not_main_thread(&self, what: &str) -> crate::Result<()> {
        if self.is_main_thread() {
            Err(TestError::MainThread(what.to_string()))
        } else {
            Ok(())
        }
    }

    /// Queues `task` to run on the main thread after everything already queued.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        let mut guard = self.mutex.lock().unwrap();
        if guard.quit {
            log::debug!("Dropping task posted after the main looper quit");
            return;
        }
        guard.queue.push_back(Box::new(task));
        self.cond.notify_all();
    }

    /// Runs `f` on the main thread and blocks until it returns.
    ///
    /// When called on the main thread `f` runs inline. A panic inside `f` is
    /// caught and returned as [`TestError::MainThreadPanic`].
    pub fn run_on_main_sync<R, F>(&self, f: F) -> crate::Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return catch_unwind(AssertUnwindSafe(f))
                .map_err(|panic| TestError::MainThreadPanic(log_panic(panic)));
        }
        Ok(self.run_and_wait(f)?)
    }

    fn run_and_wait<R, F>(&self, f: F) -> InternalResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.post(move || {
            let result = catch_unwind(AssertUnwindSafe(f))
                .map_err(|panic| InternalError::Panicked(log_panic(panic)));
            let _ = tx.send(result);
        });
        rx.recv()?
    }

    /// Blocks until the queue is empty and no task is running.
    ///
    /// On the main thread this drains the queue inline instead.
    pub fn wait_for_idle_sync(&self) {
        if self.is_main_thread() {
            self.drain();
            return;
        }
        let mut guard = self.mutex.lock().unwrap();
        while !guard.quit && (guard.busy || !guard.queue.is_empty()) {
            guard = self.cond.wait(guard).unwrap();
        }
    }

    /// Runs every pending task on the calling thread. Only meaningful on the
    /// main thread, where it's how nested waits make progress.
    pub fn drain(&self) {
        debug_assert!(self.is_main_thread());
        loop {
            let task = self.mutex.lock().unwrap().queue.pop_front();
            match task {
                Some(task) => run_task(task),
                None => break,
            }
        }
        self.cond.notify_all();
    }

    pub fn is_idle(&self) -> bool {
        let guard = self.mutex.lock().unwrap();
        !guard.busy && guard.queue.is_empty()
    }

    /// Stops the main thread once the currently running task returns. Pending
    /// tasks are dropped.
    pub fn quit(&self) {
        let mut guard = self.mutex.lock().unwrap();
        guard.quit = true;
        let dropped = guard.queue.len();
        guard.queue.clear();
        self.cond.notify_all();
        if dropped > 0 {
            log::debug!("Main looper quit with {dropped} pending tasks");
        }
    }
}

impl WaitableLooperState {
    fn run_loop(&self) {
        log::trace!("Main looper running");
        loop {
            let task = {
                let mut guard = self.mutex.lock().unwrap();
                loop {
                    if guard.quit {
                        log::trace!("Main looper quit");
                        return;
                    }
                    if let Some(task) = guard.queue.pop_front() {
                        guard.busy = true;
                        break task;
                    }
                    guard = self.cond.wait(guard).unwrap();
                }
            };

            run_task(task);

            let mut guard = self.mutex.lock().unwrap();
            guard.busy = false;
            self.cond.notify_all();
        }
    }
}

fn run_task(task: Task) {
    // A panicking task must not take the main thread down with it
    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
        log_panic(panic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_on_main_sync_executes_on_main_thread() {
        let looper = MainLooper::start();
        let remote = looper.clone();
        let on_main = looper.run_on_main_sync(move || remote.is_main_thread()).unwrap();
        assert!(on_main);
        assert!(!looper.is_main_thread());
        looper.quit();
    }

    #[test]
    fn tasks_run_in_fifo_order_and_idle_waits_for_reposts() {
        let looper = MainLooper::start();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            let again = looper.clone();
            looper.post(move || {
                log.lock().unwrap().push(i);
                let log = log.clone();
                again.post(move || log.lock().unwrap().push(i + 10));
            });
        }
        looper.wait_for_idle_sync();
        assert_eq!(
            *log.lock().unwrap(),
            vec![0, 1, 2, 3, 4, 10, 11, 12, 13, 14]
        );
        looper.quit();
    }

    #[test]
    fn panics_are_reported_and_the_looper_survives() {
        let looper = MainLooper::start();
        let err = looper.run_on_main_sync(|| panic!("kaboom")).unwrap_err();
        assert_eq!(err, TestError::MainThreadPanic("kaboom".to_string()));

        let count = Arc::new(AtomicUsize::new(0));
        let remote = count.clone();
        looper
            .run_on_main_sync(move || remote.fetch_add(1, Ordering::SeqCst))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        looper.quit();
    }

    #[test]
    fn nested_run_on_main_sync_runs_inline() {
        let looper = MainLooper::start();
        let inner = looper.clone();
        let value = looper
            .run_on_main_sync(move || inner.run_on_main_sync(|| 7).unwrap())
            .unwrap();
        assert_eq!(value, 7);
        looper.quit();
    }

    #[test]
    fn posting_after_quit_is_dropped() {
        let looper = MainLooper::start();
        looper.quit();
        looper.post(|| panic!("should never run"));
        assert!(looper.is_idle());
        assert!(looper.run_on_main_sync(|| ()).is_err());
    }
}
