//! # ao
//!
//! Active objects for a device runtime that keeps device management on a
//! *System* thread and user code on an *Application* thread, and lets either
//! side run functions on the other.
//!
//! ## Module Overview
//! - [`item`]    – Work items: direct calls with a moved argument, or tasks.
//! - [`queue`]   – Queue backend contract and the software channel backend.
//! - [`native`]  – RTOS message queue primitive and its backend.
//! - [`active`]  – Worker run loop and the invocation façade.
//! - [`future`]  – Future/promise pairing for synchronous calls.
//! - [`process`] – The System and Application process threads.
//!
//! Backends are injected into an [`ActiveObject`] at construction, so the
//! run loop never depends on a concrete queue.

pub mod active;
pub mod config;
pub mod error;
pub mod future;
pub mod item;
pub mod native;
pub mod process;
pub mod queue;

pub use active::{ActiveObject, ActiveState, CallMode};
pub use config::{ActiveObjectConfig, ActiveObjectConfigBuilder, DEFAULT_STACK_SIZE};
pub use error::{CallError, Result, ThreadingError};
pub use future::CallFuture;
pub use item::WorkItem;
pub use native::{HostQueue, NativeQueue, RtosQueue, Timeout};
pub use process::{BackendKind, ProcessThreads, ThreadName};
pub use queue::{ChannelQueue, QueueBackend, DEFAULT_QUEUE_CAPACITY};
