//! The two process-wide active objects: System and Application.
//!
//! Startup is an explicit step: the entry point calls [`boot`] once, which
//! builds and starts the System thread and then the Application thread.
//! Afterwards any code in the process reaches them by name.
//!
//! ```ignore
//! ao::process::boot(ProcessThreads::default())?;
//! let rssi = ao::process::system_sync(|| radio::rssi());
//! ```

use core::fmt;

use once_cell::sync::OnceCell;

use crate::active::ActiveObject;
use crate::config::ActiveObjectConfig;
use crate::error::{Result, ThreadingError};
use crate::native::NativeQueue;
use crate::queue::{ChannelQueue, QueueBackend, DEFAULT_QUEUE_CAPACITY};

/// Logical subsystem a process thread serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadName {
    /// Device and network management.
    System,
    /// User application logic.
    Application,
}

impl ThreadName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for ThreadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue backend used by a process thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// RTOS message queue with the default capacity.
    #[default]
    Native,
    /// Software channel with the given capacity.
    Channel(usize),
}

impl BackendKind {
    fn build(self) -> Box<dyn QueueBackend> {
        match self {
            Self::Native => Box::new(NativeQueue::new()),
            Self::Channel(capacity) => Box::new(ChannelQueue::with_capacity(capacity)),
        }
    }
}

/// Boot description of one process thread.
#[derive(Debug, Clone)]
pub struct ThreadSpec {
    pub config: ActiveObjectConfig,
    pub backend: BackendKind,
}

impl ThreadSpec {
    fn named(name: ThreadName) -> Self {
        Self {
            config: ActiveObjectConfig::builder().name(name.as_str()).build(),
            backend: BackendKind::default(),
        }
    }
}

/// Boot description of both process threads.
#[derive(Debug, Clone)]
pub struct ProcessThreads {
    pub system: ThreadSpec,
    pub application: ThreadSpec,
}

impl Default for ProcessThreads {
    fn default() -> Self {
        Self {
            system: ThreadSpec::named(ThreadName::System),
            application: ThreadSpec::named(ThreadName::Application),
        }
    }
}

impl ProcessThreads {
    /// Sets the System thread configuration.
    pub fn system(mut self, config: ActiveObjectConfig) -> Self {
        self.system.config = config;
        self
    }

    /// Sets the Application thread configuration.
    pub fn application(mut self, config: ActiveObjectConfig) -> Self {
        self.application.config = config;
        self
    }

    /// Uses `backend` for both threads.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.system.backend = backend;
        self.application.backend = backend;
        self
    }

    /// Uses software channels of the default capacity for both threads.
    pub fn channels(self) -> Self {
        self.backend(BackendKind::Channel(DEFAULT_QUEUE_CAPACITY))
    }
}

static SYSTEM: OnceCell<ActiveObject> = OnceCell::new();
static APPLICATION: OnceCell<ActiveObject> = OnceCell::new();

fn cell(name: ThreadName) -> &'static OnceCell<ActiveObject> {
    match name {
        ThreadName::System => &SYSTEM,
        ThreadName::Application => &APPLICATION,
    }
}

fn boot_one(name: ThreadName, spec: ThreadSpec) -> Result<()> {
    if cell(name).get().is_some() {
        log::debug!("{name} thread already running");
        return Ok(());
    }
    let ao = ActiveObject::with_backend(spec.config, spec.backend.build());
    ao.start()?;
    if cell(name).set(ao).is_err() {
        log::warn!("{name} thread booted twice");
        return Err(ThreadingError::AlreadyInitialized);
    }
    Ok(())
}

/// Creates and starts the System thread, then the Application thread.
///
/// Call once from the process entry point; a second call fails with
/// [`ThreadingError::AlreadyInitialized`]. A thread is registered only once
/// its worker is running, so after a failed boot the call can be retried
/// and threads that already started are kept.
pub fn boot(threads: ProcessThreads) -> Result<()> {
    if is_booted() {
        log::warn!("process threads booted twice");
        return Err(ThreadingError::AlreadyInitialized);
    }
    boot_one(ThreadName::System, threads.system)?;
    boot_one(ThreadName::Application, threads.application)?;
    log::info!("process threads running");
    Ok(())
}

/// Returns true once both process threads are running.
pub fn is_booted() -> bool {
    SYSTEM.get().is_some() && APPLICATION.get().is_some()
}

/// Looks up a process thread by name.
pub fn thread(name: ThreadName) -> Result<&'static ActiveObject> {
    cell(name).get().ok_or(ThreadingError::NotInitialized(name))
}

pub fn system_thread() -> Result<&'static ActiveObject> {
    thread(ThreadName::System)
}

pub fn application_thread() -> Result<&'static ActiveObject> {
    thread(ThreadName::Application)
}

fn sync_on<R, F>(name: ThreadName, f: F) -> R
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    match cell(name).get() {
        Some(ao) => ao.sync_call(f),
        None => f(),
    }
}

fn async_on<R, F>(name: ThreadName, f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    match cell(name).get() {
        Some(ao) => ao.async_call(f),
        None => Some(f()),
    }
}

/// Evaluates `f` on the System thread and returns its value.
///
/// Runs `f` on the caller when the System thread is not running or is the
/// caller.
pub fn system_sync<R, F>(f: F) -> R
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    sync_on(ThreadName::System, f)
}

/// Queues `f` on the System thread and returns `None`, or runs it here and
/// returns its value when the System thread is not running or is the caller.
pub fn system_async<R, F>(f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    async_on(ThreadName::System, f)
}

pub fn application_sync<R, F>(f: F) -> R
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    sync_on(ThreadName::Application, f)
}

pub fn application_async<R, F>(f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    async_on(ThreadName::Application, f)
}
