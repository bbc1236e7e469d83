/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Error types for sequencer operations and scheduler configuration.

use super::core::SequencerId;
use thiserror::Error;

/// Errors that can occur when interacting with a [`ThreadContext`].
///
/// [`ThreadContext`]: super::ThreadContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// The id does not denote a live sequencer (never existed, or already
    /// destroyed and its slot reused).
    #[error("unknown sequencer {0}")]
    UnknownSequencer(SequencerId),

    /// The sequencer is being destroyed and accepts no more events.
    #[error("sequencer {0} is shutting down")]
    ShuttingDown(SequencerId),

    /// Memory for the sequencer or its event could not be reserved.
    #[error("allocation failure")]
    AllocationFailure,
}

/// Errors raised while loading a [`SchedulerConfig`].
///
/// [`SchedulerConfig`]: super::SchedulerConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for the config schema.
    #[error("invalid scheduler config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the scheduler cannot run with.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}
