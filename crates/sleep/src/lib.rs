//! # sleep
//!
//! Dispatch of a sleep request to the device's power collaborators.
//!
//! A request names a [`SleepMode`] and an optional wake delay. When the delay
//! is positive the real-time clock alarm is armed for `now + seconds` before
//! the mode is entered:
//! - [`SleepMode::Wlan`] switches the radio off and keeps the core running.
//! - [`SleepMode::Deep`] enters standby.
//! - [`SleepMode::Stop`] turns the status indicator off and enters stop mode,
//!   waking on the given pin edge.

mod error;

pub use error::{SleepError, SleepResult};

/// Highest wake pin accepted unless configured otherwise.
pub const DEFAULT_MAX_WAKE_PIN: u16 = 23;

/// Real-time clock used to schedule the wake alarm.
pub trait RealTimeClock {
    /// Current time as a unix timestamp in seconds.
    fn now(&self) -> u64;

    /// Arms the wake alarm at `unix_timestamp`.
    fn set_wake_alarm(&mut self, unix_timestamp: u64);
}

/// Low-power mode entry points of the core.
pub trait PowerControl {
    fn enter_standby(&mut self);
    fn enter_stop(&mut self, pin: u16, edge: WakeEdge);

    /// Switches the status indicator off before the core stops.
    fn indicator_off(&mut self) {}
}

/// Network collaborator.
pub trait NetworkControl {
    fn radio_off(&mut self);
}

/// Pin transition that wakes the core from stop mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeEdge {
    Rising,
    Falling,
    Change,
}

/// Requested sleep mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// Radio off, core keeps running.
    Wlan,
    /// Standby; the device resets on wake.
    Deep,
    /// Stop mode, woken by `edge` on `pin`.
    Stop { pin: u16, edge: WakeEdge },
}

/// Board limits for sleep requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepConfig {
    pub max_wake_pin: u16,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            max_wake_pin: DEFAULT_MAX_WAKE_PIN,
        }
    }
}

/// Routes sleep requests to the clock, power and network collaborators.
pub struct Sleeper<C, P, N> {
    config: SleepConfig,
    clock: C,
    power: P,
    network: N,
}

impl<C, P, N> Sleeper<C, P, N>
where
    C: RealTimeClock,
    P: PowerControl,
    N: NetworkControl,
{
    pub fn new(clock: C, power: P, network: N) -> Self {
        Self::with_config(SleepConfig::default(), clock, power, network)
    }

    pub fn with_config(config: SleepConfig, clock: C, power: P, network: N) -> Self {
        Self {
            config,
            clock,
            power,
            network,
        }
    }

    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    /// Enters `mode`, arming the wake alarm first when `seconds > 0`.
    pub fn sleep(&mut self, mode: SleepMode, seconds: i64) -> SleepResult<()> {
        if let SleepMode::Stop { pin, .. } = mode {
            if pin > self.config.max_wake_pin {
                log::warn!("rejecting stop mode on wake pin {pin}");
                return Err(SleepError::InvalidPin {
                    pin,
                    max: self.config.max_wake_pin,
                });
            }
        }

        if seconds > 0 {
            let wake_at = self.clock.now().saturating_add(seconds.unsigned_abs());
            log::debug!("wake alarm set for {wake_at}");
            self.clock.set_wake_alarm(wake_at);
        }

        log::info!("entering {mode:?}");
        match mode {
            SleepMode::Wlan => self.network.radio_off(),
            SleepMode::Deep => self.power.enter_standby(),
            SleepMode::Stop { pin, edge } => {
                self.power.indicator_off();
                self.power.enter_stop(pin, edge);
            }
        }
        Ok(())
    }

    /// Returns the collaborators.
    pub fn into_parts(self) -> (C, P, N) {
        (self.clock, self.power, self.network)
    }
}
