//! Active object: one worker thread draining one work queue.
//!
//! The worker takes items from its [`QueueBackend`], invokes and disposes
//! each one, and runs the configured background task whenever the queue
//! yields nothing within the backend's wait budget. Any thread may hand
//! work to the object through the invocation methods below; a caller that
//! already is the worker runs the work inline instead of queueing it, since
//! the worker cannot service its own queue while it waits on itself.
//!
//! Only self-calls are guarded: two workers making synchronous calls into
//! each other at the same time still deadlock.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel;
use once_cell::sync::OnceCell;

use crate::config::{ActiveObjectConfig, BackgroundTask};
use crate::error::{Result, ThreadingError};
use crate::future::{self, CallFuture};
use crate::item::WorkItem;
use crate::queue::QueueBackend;

/// Lifecycle of an active object. There is no stopped state: once running,
/// the worker lives until the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Unstarted,
    Starting,
    Running,
}

/// How [`ActiveObject::call`] hands a closure to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Block until the worker returns the closure's value.
    Sync,
    /// Queue the closure and return without its value.
    Async,
}

/// State touched by both the worker and its callers.
struct Shared {
    name: &'static str,
    queue: Box<dyn QueueBackend>,
    worker: OnceCell<ThreadId>,
    started: AtomicBool,
}

impl Shared {
    fn bootstrap(&self) {
        let _ = self.worker.set(thread::current().id());
        self.started.store(true, Ordering::Release);
    }

    fn run(&self, background: &BackgroundTask) {
        log::debug!("{}: entering run loop", self.name);
        loop {
            match self.queue.try_take() {
                Some(item) => self.dispatch(item),
                None => {
                    log::trace!("{}: idle", self.name);
                    if panic::catch_unwind(AssertUnwindSafe(|| background())).is_err() {
                        log::error!("{}: background task panicked", self.name);
                    }
                }
            }
        }
    }

    fn dispatch(&self, mut item: WorkItem) {
        log::trace!("{}: dispatching {:?}", self.name, item);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| item.invoke()));
        let released = panic::catch_unwind(AssertUnwindSafe(move || item.dispose()));
        if outcome.is_err() {
            // Fire-and-forget work has nobody to report to.
            log::error!("{}: queued work panicked", self.name);
        }
        if released.is_err() {
            log::error!("{}: releasing queued work panicked", self.name);
        }
    }
}

/// A worker thread plus the queue it services.
pub struct ActiveObject {
    config: ActiveObjectConfig,
    shared: Arc<Shared>,
    handle: OnceCell<JoinHandle<()>>,
    starting: AtomicBool,
}

impl ActiveObject {
    /// Creates an unstarted active object draining `queue`.
    pub fn new<Q>(config: ActiveObjectConfig, queue: Q) -> Self
    where
        Q: QueueBackend + 'static,
    {
        Self::with_backend(config, Box::new(queue))
    }

    pub fn with_backend(config: ActiveObjectConfig, queue: Box<dyn QueueBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                queue,
                worker: OnceCell::new(),
                started: AtomicBool::new(false),
            }),
            config,
            handle: OnceCell::new(),
            starting: AtomicBool::new(false),
        }
    }

    /// Spawns the worker thread and returns once it is running.
    pub fn start(&self) -> Result<()> {
        let name = self.config.name;
        if self.starting.swap(true, Ordering::AcqRel) {
            log::warn!("{name}: start requested twice");
            return Err(ThreadingError::AlreadyStarted { name });
        }

        let (ready_tx, ready_rx) = channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let background = Arc::clone(&self.config.background_task);
        let spawned = thread::Builder::new()
            .name(name.to_owned())
            .stack_size(self.config.stack_size)
            .spawn(move || {
                shared.bootstrap();
                let _ = ready_tx.send(());
                drop(ready_tx);
                shared.run(&background);
            });

        match spawned {
            Ok(handle) => {
                let _ = self.handle.set(handle);
                // Disconnects instead of blocking if the worker died early.
                let _ = ready_rx.recv();
                log::info!(
                    "{name}: worker started (stack {} bytes, queue capacity {})",
                    self.config.stack_size,
                    self.shared.queue.capacity()
                );
                Ok(())
            }
            Err(source) => {
                self.starting.store(false, Ordering::Release);
                log::error!("{name}: failed to spawn worker: {source}");
                Err(ThreadingError::Spawn { name, source })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn config(&self) -> &ActiveObjectConfig {
        &self.config
    }

    pub fn state(&self) -> ActiveState {
        if self.is_started() {
            ActiveState::Running
        } else if self.starting.load(Ordering::Acquire) {
            ActiveState::Starting
        } else {
            ActiveState::Unstarted
        }
    }

    /// Returns true once the worker thread has entered its run loop.
    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Returns true when called from this object's worker thread.
    pub fn is_current_thread(&self) -> bool {
        self.shared
            .worker
            .get()
            .map_or(false, |worker| *worker == thread::current().id())
    }

    /// Handle of the worker thread, if it was spawned.
    pub fn thread(&self) -> Option<&thread::Thread> {
        self.handle.get().map(JoinHandle::thread)
    }

    /// Number of items waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            log::warn!("{}: invocation rejected, worker not running", self.name());
            Err(ThreadingError::NotRunning { name: self.name() })
        }
    }

    /// Queues `item`, or runs it right away when called from the worker.
    pub fn post(&self, mut item: WorkItem) -> Result<()> {
        self.ensure_running()?;
        if self.is_current_thread() {
            item.invoke();
            item.dispose();
        } else {
            self.shared.queue.put(item);
        }
        Ok(())
    }

    /// Fire-and-forget call of `function` on the worker.
    pub fn invoke(&self, function: fn()) -> Result<()> {
        self.post(WorkItem::call(function))
    }

    /// Fire-and-forget call of `function` with `arg`, moved to the worker.
    ///
    /// The worker drops the argument right after `function` returns.
    pub fn invoke_with<A>(&self, function: fn(&mut A), arg: A) -> Result<()>
    where
        A: Send + 'static,
    {
        self.post(WorkItem::call_with(function, arg))
    }

    /// Fire-and-forget closure on the worker.
    pub fn invoke_task<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(WorkItem::task(task))
    }

    /// Runs `f` on the worker and returns the future of its value.
    ///
    /// From any other thread the packaged task is always queued. From the
    /// worker itself `f` runs inline and the returned future is ready.
    pub fn invoke_future<R, F>(&self, f: F) -> Result<CallFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        self.ensure_running()?;
        if self.is_current_thread() {
            return Ok(CallFuture::evaluate(f));
        }
        Ok(self.enqueue_future(f))
    }

    fn enqueue_future<R, F>(&self, f: F) -> CallFuture<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (task, future) = future::package(f);
        self.shared.queue.put(WorkItem::task(task));
        future
    }

    fn should_marshal(&self) -> bool {
        self.is_started() && !self.is_current_thread()
    }

    /// Evaluates `f` on the worker and blocks for its value.
    ///
    /// Falls back to evaluating `f` on the calling thread when the worker is
    /// not running or the caller is the worker. A panic in `f` reaches the
    /// caller either way.
    pub fn sync_call<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.should_marshal() {
            self.enqueue_future(f).get()
        } else {
            f()
        }
    }

    /// Queues `f` on the worker and returns `None`, or evaluates it here and
    /// returns its value when the worker is not running or is the caller.
    pub fn async_call<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.should_marshal() {
            self.shared.queue.put(WorkItem::task(move || {
                f();
            }));
            None
        } else {
            Some(f())
        }
    }

    /// Dispatches `f` according to `mode`.
    ///
    /// `Sync` always yields the value; `Async` yields it only when `f` ran
    /// on the calling thread.
    pub fn call<R, F>(&self, mode: CallMode, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        match mode {
            CallMode::Sync => Some(self.sync_call(f)),
            CallMode::Async => self.async_call(f),
        }
    }
}

impl fmt::Debug for ActiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeQueue;
    use crate::queue::ChannelQueue;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn napping_config(name: &'static str) -> ActiveObjectConfig {
        ActiveObjectConfig::builder()
            .name(name)
            .background_task(|| thread::sleep(Duration::from_millis(1)))
            .build()
    }

    fn started(name: &'static str) -> Arc<ActiveObject> {
        let ao = Arc::new(ActiveObject::new(napping_config(name), ChannelQueue::new()));
        ao.start().unwrap();
        ao
    }

    #[test]
    fn unstarted_object_rejects_invocations() {
        let ao = ActiveObject::new(napping_config("idle"), ChannelQueue::new());
        assert_eq!(ao.state(), ActiveState::Unstarted);
        assert!(!ao.is_current_thread());

        assert!(matches!(
            ao.invoke(|| {}),
            Err(ThreadingError::NotRunning { name: "idle" })
        ));
        assert!(ao.invoke_future(|| 1).is_err());
        assert_eq!(ao.pending(), 0);
    }

    #[test]
    fn start_reaches_running_once() {
        let ao = started("once");
        assert_eq!(ao.state(), ActiveState::Running);
        assert_eq!(ao.thread().and_then(|t| t.name()), Some("once"));
        assert!(matches!(
            ao.start(),
            Err(ThreadingError::AlreadyStarted { name: "once" })
        ));
    }

    #[test]
    fn unstarted_object_evaluates_calls_locally() {
        let ao = ActiveObject::new(napping_config("local"), ChannelQueue::new());
        let caller = thread::current().id();
        assert!(ao.sync_call(move || thread::current().id() == caller));
        assert_eq!(ao.async_call(|| 7), Some(7));
    }

    #[test]
    fn sync_round_trip_doubles_on_worker() {
        let ao = started("double");
        let x = 21;
        let future = ao.invoke_future(move || x * 2).unwrap();
        future.wait();
        assert_eq!(future.get(), 42);

        let worker = ao.thread().map(|t| t.id());
        assert_eq!(ao.sync_call(|| Some(thread::current().id())), worker);
    }

    #[test]
    fn items_run_in_enqueue_order() {
        let ao = started("fifo");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 0..20 {
            let seen = seen.clone();
            ao.invoke_task(move || seen.lock().unwrap().push(n)).unwrap();
        }
        ao.sync_call(|| ());
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn calls_from_worker_run_inline() {
        let ao = started("inline");
        let inner = Arc::clone(&ao);
        let (before, value, after) = ao.sync_call(move || {
            assert!(inner.is_current_thread());
            let before = inner.pending();
            let value = inner.sync_call(|| 5) + inner.invoke_future(|| 6).unwrap().get();
            let ran = Arc::new(AtomicBool::new(false));
            let flag = ran.clone();
            inner
                .invoke_task(move || flag.store(true, Ordering::SeqCst))
                .unwrap();
            assert!(ran.load(Ordering::SeqCst));
            (before, value, inner.pending())
        });
        assert_eq!(value, 11);
        assert_eq!(before, after);
    }

    #[test]
    fn argument_is_released_on_worker_after_call() {
        struct Reading {
            log: Arc<Mutex<Vec<(&'static str, ThreadId)>>>,
        }

        impl Drop for Reading {
            fn drop(&mut self) {
                self.log
                    .lock()
                    .unwrap()
                    .push(("release", thread::current().id()));
            }
        }

        fn consume(reading: &mut Reading) {
            reading
                .log
                .lock()
                .unwrap()
                .push(("invoke", thread::current().id()));
        }

        let ao = started("marshal");
        let log = Arc::new(Mutex::new(Vec::new()));
        ao.invoke_with(consume, Reading { log: log.clone() }).unwrap();
        ao.sync_call(|| ());

        let worker = ao.thread().map(|t| t.id()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![("invoke", worker), ("release", worker)]
        );
    }

    #[test]
    fn panicking_sync_call_reaches_caller_and_worker_survives() {
        let ao = started("panics");
        let future = ao
            .invoke_future(|| -> u8 { panic!("bad register") })
            .unwrap();
        assert!(future.try_get().is_err());

        ao.invoke_task(|| panic!("lost in the background")).unwrap();
        assert_eq!(ao.sync_call(|| 3), 3);
    }

    #[test]
    fn idle_worker_runs_background_task() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let config = ActiveObjectConfig::builder()
            .name("housekeeping")
            .background_task(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let ao = ActiveObject::new(config, NativeQueue::new());
        ao.start().unwrap();

        thread::sleep(Duration::from_millis(350));
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        assert_eq!(ao.sync_call(|| "work"), "work");
    }

    #[test]
    fn worker_survives_panicking_background_task() {
        let tripped = Arc::new(AtomicBool::new(false));
        let flag = tripped.clone();
        let config = ActiveObjectConfig::builder()
            .name("flaky-idle")
            .background_task(move || {
                if !flag.swap(true, Ordering::SeqCst) {
                    panic!("housekeeping failed");
                }
                thread::sleep(Duration::from_millis(1));
            })
            .build();
        let ao = ActiveObject::new(config, NativeQueue::new());
        ao.start().unwrap();

        thread::sleep(Duration::from_millis(300));
        assert!(tripped.load(Ordering::SeqCst));

        let future = ao.invoke_future(|| 42).unwrap();
        assert_eq!(future.get(), 42);
        assert_eq!(ao.sync_call(|| "alive"), "alive");
    }

    #[test]
    fn worker_survives_panicking_release() {
        struct Brittle;

        impl Drop for Brittle {
            fn drop(&mut self) {
                panic!("release failed");
            }
        }

        fn touch(_: &mut Brittle) {}

        let ao = started("brittle");
        ao.invoke_with(touch, Brittle).unwrap();
        assert_eq!(ao.sync_call(|| 4), 4);
    }

    #[test]
    fn call_mode_selects_sync_or_async() {
        let ao = started("modes");
        assert_eq!(ao.call(CallMode::Sync, || 9), Some(9));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let result = ao.call(CallMode::Async, move || flag.store(true, Ordering::SeqCst));
        assert_eq!(result, None);
        ao.sync_call(|| ());
        assert!(ran.load(Ordering::SeqCst));
    }
}
