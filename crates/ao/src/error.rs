//! Error types for active objects and the process threads.

use std::io;

use thiserror::Error;

use crate::process::ThreadName;

/// Errors reported by the invocation façade and thread lifecycle.
#[derive(Error, Debug)]
pub enum ThreadingError {
    #[error("active object `{name}` is not running")]
    NotRunning { name: &'static str },
    #[error("active object `{name}` was already started")]
    AlreadyStarted { name: &'static str },
    #[error("failed to spawn worker thread for `{name}`: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("process threads are already booted")]
    AlreadyInitialized,
    #[error("{0} thread is not booted")]
    NotInitialized(ThreadName),
}

pub type Result<T, E = ThreadingError> = core::result::Result<T, E>;

/// Failure of a synchronous call observed through its future.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was dropped before it ran")]
    Abandoned,
}
