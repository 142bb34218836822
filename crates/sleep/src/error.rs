//! Error types for sleep requests.

use thiserror::Error;

/// Sleep request rejected before any power state changed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepError {
    #[error("wake pin {pin} is outside the board range (max {max})")]
    InvalidPin { pin: u16, max: u16 },
}

pub type SleepResult<T> = Result<T, SleepError>;
