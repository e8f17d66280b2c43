//! Error types.
//!
//! Inconclusive estimates (no pitch candidate, a rejected pitch jump, a
//! skipped time registration search) are not errors. They are reported as
//! sentinel values in the returned [`Snapshot`](crate::Snapshot). The errors
//! below are reserved for input that cannot be processed at all and for
//! invalid configuration.

use thiserror::Error;

/// Input rejected before it reaches the estimator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidInput {
    /// The audio chunk contains no samples.
    #[error("audio chunk is empty")]
    EmptyChunk,

    /// An audio sample is NaN or infinite.
    #[error("audio sample {index} is not finite")]
    NonFiniteSample { index: usize },

    /// A timestamp is NaN or infinite.
    #[error("timestamp {timestamp_secs} is not finite")]
    NonFiniteTimestamp { timestamp_secs: f64 },

    /// A pressure reading is NaN or infinite.
    #[error("pressure reading at {timestamp_secs}s is not finite")]
    NonFiniteReading { timestamp_secs: f64 },

    /// An energy value is NaN or infinite.
    #[error("energy at {timestamp_secs}s is not finite")]
    NonFiniteEnergy { timestamp_secs: f64 },

    /// A timestamp precedes the newest timestamp already stored.
    #[error("timestamp {got:.3}s precedes the latest stored timestamp {previous:.3}s")]
    TimestampOutOfOrder { previous: f64, got: f64 },
}

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// A configuration value is outside its allowed range.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The cross-thread pressure feed has no free slots.
    #[error("pressure feed is full, reading at {timestamp_secs:.3}s dropped")]
    FeedFull { timestamp_secs: f64 },
}

impl Error {
    /// Returns true if the error was caused by invalid caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}
