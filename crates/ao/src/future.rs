//! Future/promise pairing for synchronous cross-thread calls.
//!
//! [`package`] wraps a closure into a task for the worker plus the
//! [`CallFuture`] the caller blocks on. The task catches a panic from the
//! closure and hands it to the future, so [`CallFuture::get`] fails on the
//! caller exactly as the closure would have failed locally.
//!
//! There is no timeout: a caller waits until the worker has processed the
//! task.

use core::fmt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::CallError;

type Outcome<R> = std::thread::Result<R>;

enum State<R> {
    Pending,
    Ready(Outcome<R>),
    Abandoned,
    Taken,
}

struct Shared<R> {
    state: Mutex<State<R>>,
    ready: Condvar,
}

impl<R> Shared<R> {
    fn complete(&self, next: State<R>) {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = next;
            self.ready.notify_all();
        }
    }
}

/// Producer half, moved into the packaged task.
struct Promise<R> {
    shared: Arc<Shared<R>>,
    fulfilled: bool,
}

impl<R> Promise<R> {
    fn fulfill(mut self, outcome: Outcome<R>) {
        self.fulfilled = true;
        self.shared.complete(State::Ready(outcome));
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.shared.complete(State::Abandoned);
        }
    }
}

/// Result of a synchronous call, delivered by the worker thread.
pub struct CallFuture<R> {
    shared: Arc<Shared<R>>,
}

impl<R> CallFuture<R> {
    /// Future that already holds the result of `f`, evaluated here.
    pub(crate) fn evaluate<F>(f: F) -> Self
    where
        F: FnOnce() -> R,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Ready(outcome)),
                ready: Condvar::new(),
            }),
        }
    }

    /// Returns true once the result (or failure) is available.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending)
    }

    /// Blocks until the worker has run the task.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending) {
            self.shared.ready.wait(&mut state);
        }
    }

    fn take(self) -> State<R> {
        self.wait();
        let mut state = self.shared.state.lock();
        core::mem::replace(&mut *state, State::Taken)
    }

    /// Waits for and returns the task's value.
    ///
    /// # Panics
    ///
    /// Resumes the task's panic on this thread if the task panicked, and
    /// panics if the task was dropped without running.
    pub fn get(self) -> R {
        match self.take() {
            State::Ready(Ok(value)) => value,
            State::Ready(Err(payload)) => panic::resume_unwind(payload),
            _ => panic!("{}", CallError::Abandoned),
        }
    }

    /// Waits for the task and reports a failure as an error.
    pub fn try_get(self) -> Result<R, CallError> {
        match self.take() {
            State::Ready(Ok(value)) => Ok(value),
            State::Ready(Err(payload)) => Err(CallError::Panicked(panic_message(&*payload))),
            _ => Err(CallError::Abandoned),
        }
    }
}

impl<R> fmt::Debug for CallFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Packages `f` as a worker task paired with the future of its result.
pub fn package<R, F>(f: F) -> (impl FnOnce() + Send + 'static, CallFuture<R>)
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        ready: Condvar::new(),
    });
    let promise = Promise {
        shared: Arc::clone(&shared),
        fulfilled: false,
    };
    let task = move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        promise.fulfill(outcome);
    };
    (task, CallFuture { shared })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
