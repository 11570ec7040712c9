use once_cell::sync::Lazy;
use std::time::Duration;

use crate::link_define::{
    DEFAULT_DEBUG_FIRST_RESPONSE, DEFAULT_DEBUG_READ_POLL, DEFAULT_DEBUG_WRITE_INTERVAL, DEFAULT_TICK,
    DEFAULT_TRANSFER_TIMEOUT,
};

#[derive(Debug)]
pub struct Config {
    pub transfer_timeout_ms: u64,
    pub debug_write_interval_ms: u64,
    pub debug_first_response_ms: u64,
    pub debug_read_poll_ms: u64,
    pub tick_ms: u64,
    pub log_frames: bool,
}

fn env_ms(key: &str, default: Duration) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v: &u64| *v > 0)
        .unwrap_or(default.as_millis() as u64)
}

impl Config {
    fn from_env() -> Self {
        let transfer_timeout_ms =
            env_ms("MOTOR_LINK_TRANSFER_TIMEOUT_MS", DEFAULT_TRANSFER_TIMEOUT);
        let debug_write_interval_ms =
            env_ms("MOTOR_LINK_DEBUG_WRITE_INTERVAL_MS", DEFAULT_DEBUG_WRITE_INTERVAL);
        let debug_first_response_ms =
            env_ms("MOTOR_LINK_DEBUG_FIRST_RESPONSE_MS", DEFAULT_DEBUG_FIRST_RESPONSE);
        let debug_read_poll_ms = env_ms("MOTOR_LINK_DEBUG_READ_POLL_MS", DEFAULT_DEBUG_READ_POLL);
        let tick_ms = env_ms("MOTOR_LINK_TICK_MS", DEFAULT_TICK);
        let log_frames = std::env::var("MOTOR_LINK_LOG_FRAMES")
            .map(|v| v == "1")
            .unwrap_or(false);
        Self {
            transfer_timeout_ms,
            debug_write_interval_ms,
            debug_first_response_ms,
            debug_read_poll_ms,
            tick_ms,
            log_frames,
        }
    }
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}

/// Timer periods and timeout bounds used by one link instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkTiming {
    /// Transfer timer period and in-transition timeout.
    pub transfer_timeout: Duration,
    /// Debug write cadence and steady-state response bound.
    pub debug_write_interval: Duration,
    /// Debug read-timeout timer period.
    pub debug_read_poll: Duration,
    /// Debug bound while no response byte has arrived yet.
    pub debug_first_response: Duration,
    /// Runtime clock granularity.
    pub tick: Duration,
}

impl LinkTiming {
    /// Timing taken from the global environment config.
    #[must_use]
    pub fn from_config() -> Self {
        let c = config();
        Self {
            transfer_timeout: Duration::from_millis(c.transfer_timeout_ms),
            debug_write_interval: Duration::from_millis(c.debug_write_interval_ms),
            debug_read_poll: Duration::from_millis(c.debug_read_poll_ms),
            debug_first_response: Duration::from_millis(c.debug_first_response_ms),
            tick: Duration::from_millis(c.tick_ms),
        }
    }

    #[must_use]
    pub const fn with_transfer_timeout(mut self, d: Duration) -> Self {
        self.transfer_timeout = d;
        self
    }
    #[must_use]
    pub const fn with_debug_write_interval(mut self, d: Duration) -> Self {
        self.debug_write_interval = d;
        self
    }
    #[must_use]
    pub const fn with_debug_read_poll(mut self, d: Duration) -> Self {
        self.debug_read_poll = d;
        self
    }
    #[must_use]
    pub const fn with_debug_first_response(mut self, d: Duration) -> Self {
        self.debug_first_response = d;
        self
    }
    #[must_use]
    pub const fn with_tick(mut self, d: Duration) -> Self {
        self.tick = d;
        self
    }
}

impl Default for LinkTiming {
    /// Firmware-contract defaults, independent of the environment.
    fn default() -> Self {
        Self {
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            debug_write_interval: DEFAULT_DEBUG_WRITE_INTERVAL,
            debug_read_poll: DEFAULT_DEBUG_READ_POLL,
            debug_first_response: DEFAULT_DEBUG_FIRST_RESPONSE,
            tick: DEFAULT_TICK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_firmware_contract() {
        let t = LinkTiming::default();
        assert_eq!(t.transfer_timeout, Duration::from_millis(50));
        assert_eq!(t.debug_write_interval, Duration::from_millis(200));
        assert_eq!(t.debug_read_poll, Duration::from_millis(50));
        assert_eq!(t.debug_first_response, Duration::from_millis(1000));
    }

    #[test]
    fn env_ms_falls_back_on_garbage() {
        std::env::set_var("MOTOR_LINK_TEST_GARBAGE_MS", "abc");
        assert_eq!(env_ms("MOTOR_LINK_TEST_GARBAGE_MS", Duration::from_millis(7)), 7);
        std::env::set_var("MOTOR_LINK_TEST_ZERO_MS", "0");
        assert_eq!(env_ms("MOTOR_LINK_TEST_ZERO_MS", Duration::from_millis(9)), 9);
        std::env::set_var("MOTOR_LINK_TEST_OK_MS", "120");
        assert_eq!(env_ms("MOTOR_LINK_TEST_OK_MS", Duration::from_millis(9)), 120);
    }

    #[test]
    fn builder_overrides_fields() {
        let t = LinkTiming::default().with_transfer_timeout(Duration::from_millis(500));
        assert_eq!(t.transfer_timeout, Duration::from_millis(500));
        assert_eq!(t.tick, Duration::from_millis(10));
    }
}
