//! Work items queued on an active object.
//!
//! An item is either a *direct call* (a function pointer plus the argument
//! moved into the item at enqueue time) or a *task* (a closure capturing its
//! state by value). Items are consumed exactly once by the worker that
//! dequeued them: [`WorkItem::invoke`] followed by [`WorkItem::dispose`].

use core::fmt;
use std::any::Any;

/// Closure payload of a task item.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Memory owned by an item and released on dispose.
pub type Companion = Box<dyn Any + Send + 'static>;

/// Object-safe view of a direct call, independent of its argument type.
trait DirectCall: Send {
    fn call(&mut self);
    fn release(&mut self);
}

/// Direct call without an argument.
struct Plain {
    function: Option<fn()>,
}

impl DirectCall for Plain {
    fn call(&mut self) {
        if let Some(function) = self.function.take() {
            function();
        }
    }

    fn release(&mut self) {
        self.function = None;
    }
}

/// Direct call whose argument was moved in by the producer.
struct Marshaled<A> {
    function: Option<fn(&mut A)>,
    arg: Option<Box<A>>,
}

impl<A: Send + 'static> DirectCall for Marshaled<A> {
    fn call(&mut self) {
        if let (Some(function), Some(arg)) = (self.function.take(), self.arg.as_deref_mut()) {
            function(arg);
        }
    }

    fn release(&mut self) {
        self.function = None;
        self.arg = None;
    }
}

enum Payload {
    Direct(Box<dyn DirectCall>),
    Task {
        task: Option<Task>,
        companion: Option<Companion>,
    },
}

/// A unit of work handed to an active object through its queue.
///
/// Not `Clone`: ownership moves from the producer into the queue and from
/// the queue into the worker.
pub struct WorkItem {
    payload: Payload,
    invoked: bool,
}

impl WorkItem {
    /// Direct call of a function taking no argument.
    pub fn call(function: fn()) -> Self {
        Self::direct(Plain {
            function: Some(function),
        })
    }

    /// Direct call of `function` with `arg`, which the item now owns.
    pub fn call_with<A: Send + 'static>(function: fn(&mut A), arg: A) -> Self {
        Self::direct(Marshaled {
            function: Some(function),
            arg: Some(Box::new(arg)),
        })
    }

    /// Task item running `task` once.
    pub fn task<F>(task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            payload: Payload::Task {
                task: Some(Box::new(task)),
                companion: None,
            },
            invoked: false,
        }
    }

    /// Attaches a buffer the task relies on; it lives until dispose.
    ///
    /// Only task items carry a companion; direct calls own their argument
    /// already. Attaching one to a direct call is a bug caught in debug
    /// builds and ignored in release builds.
    pub fn with_companion<C: Any + Send + 'static>(mut self, buffer: C) -> Self {
        debug_assert!(self.is_task(), "companion attached to a direct call");
        if let Payload::Task { companion, .. } = &mut self.payload {
            *companion = Some(Box::new(buffer) as Companion);
        }
        self
    }

    fn direct<D: DirectCall + 'static>(call: D) -> Self {
        Self {
            payload: Payload::Direct(Box::new(call)),
            invoked: false,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.payload, Payload::Direct(_))
    }

    pub fn is_task(&self) -> bool {
        matches!(self.payload, Payload::Task { .. })
    }

    /// Returns true once [`invoke`](Self::invoke) ran the held function.
    pub fn is_invoked(&self) -> bool {
        self.invoked
    }

    /// Runs the held function. A second call is a no-op.
    pub fn invoke(&mut self) {
        if self.invoked {
            return;
        }
        self.invoked = true;
        match &mut self.payload {
            Payload::Direct(call) => call.call(),
            Payload::Task { task, .. } => {
                if let Some(task) = task.take() {
                    task();
                }
            }
        }
    }

    /// Releases the argument and companion memory and consumes the item.
    pub fn dispose(mut self) {
        match &mut self.payload {
            Payload::Direct(call) => call.release(),
            Payload::Task { task, companion } => {
                *task = None;
                *companion = None;
            }
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.payload {
            Payload::Direct(_) => "direct",
            Payload::Task { .. } => "task",
        };
        f.debug_struct("WorkItem")
            .field("kind", &kind)
            .field("invoked", &self.invoked)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    struct Arg {
        log: Log,
    }

    impl Drop for Arg {
        fn drop(&mut self) {
            self.log.lock().unwrap().push("release");
        }
    }

    fn record(arg: &mut Arg) {
        arg.log.lock().unwrap().push("invoke");
    }

    #[test]
    fn argument_released_once_after_invoke() {
        let log: Log = Arc::default();
        let mut item = WorkItem::call_with(record, Arg { log: log.clone() });
        assert!(item.is_direct());
        assert!(log.lock().unwrap().is_empty());

        item.invoke();
        assert_eq!(*log.lock().unwrap(), vec!["invoke"]);

        item.dispose();
        assert_eq!(*log.lock().unwrap(), vec!["invoke", "release"]);
    }

    #[test]
    fn second_invoke_is_noop() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn bump() {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }

        let mut item = WorkItem::call(bump);
        item.invoke();
        item.invoke();
        assert!(item.is_invoked());
        item.dispose();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn task_companion_outlives_invoke() {
        let log: Log = Arc::default();
        let task_log = log.clone();
        let mut item = WorkItem::task(move || task_log.lock().unwrap().push("invoke"))
            .with_companion(Arg { log: log.clone() });
        assert!(item.is_task());

        item.invoke();
        assert_eq!(*log.lock().unwrap(), vec!["invoke"]);
        item.dispose();
        assert_eq!(*log.lock().unwrap(), vec!["invoke", "release"]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "companion attached to a direct call")]
    fn companion_on_direct_call_is_rejected() {
        fn noop() {}
        let _ = WorkItem::call(noop).with_companion(vec![0u8; 16]);
    }

    #[test]
    fn dropping_unrun_item_still_releases_argument() {
        let log: Log = Arc::default();
        drop(WorkItem::call_with(record, Arg { log: log.clone() }));
        assert_eq!(*log.lock().unwrap(), vec!["release"]);
    }
}
