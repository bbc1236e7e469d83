/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Scheduler configuration.

use super::error::ConfigError;
use super::result::DispatchPolicy;
use serde::{Deserialize, Serialize};

/// Queue depth above which enqueueing logs a warning.
pub const DEFAULT_QUEUE_SANITY_LIMIT: usize = 10;

/// Microseconds between heartbeat broadcasts.
pub const DEFAULT_HEARTBEAT_INTERVAL_US: u64 = 1_000_000;

/// Longest the driver sleeps when nothing is scheduled.
pub const DEFAULT_IDLE_POLL_US: u64 = 50_000;

/// Tunables for a [`ThreadContext`].
///
/// Every field has a default, so a partial JSON document is accepted.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::{DispatchPolicy, SchedulerConfig};
///
/// let config = SchedulerConfig::from_json(r#"{ "queue_sanity_limit": 32 }"#).unwrap();
/// assert_eq!(config.queue_sanity_limit, 32);
/// assert_eq!(config.dispatch_policy, DispatchPolicy::StopTick);
/// ```
///
/// [`ThreadContext`]: super::ThreadContext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Queue depth above which a warning is logged. Events are never dropped.
    pub queue_sanity_limit: usize,

    /// Minimum spacing of heartbeat broadcasts, in microseconds.
    pub heartbeat_interval_us: u64,

    /// Behaviour of a dispatch tick after a callback requests destruction.
    pub dispatch_policy: DispatchPolicy,

    /// Upper bound on the driver's idle wait, in microseconds.
    pub idle_poll_us: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_sanity_limit: DEFAULT_QUEUE_SANITY_LIMIT,
            heartbeat_interval_us: DEFAULT_HEARTBEAT_INTERVAL_US,
            dispatch_policy: DispatchPolicy::default(),
            idle_poll_us: DEFAULT_IDLE_POLL_US,
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a JSON config document.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Parse`] if the document does not match the schema
    /// - [`ConfigError::InvalidValue`] if a field is out of range
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_sanity_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_sanity_limit",
                reason: "must be greater than zero",
            });
        }
        if self.heartbeat_interval_us == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_interval_us",
                reason: "must be greater than zero",
            });
        }
        if self.idle_poll_us == 0 {
            return Err(ConfigError::InvalidValue {
                field: "idle_poll_us",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}
