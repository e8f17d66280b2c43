//! Time registration of the audio energy signal against pressure sensor
//! readings.
//!
//! The pressure sensor and the audio pipeline run on independent clocks.
//! [`TimeRegistrationEngine`] keeps the last few seconds of both signals and
//! searches for the time offset at which the audio energy best correlates
//! with the measured pressure. The offset is a diagnostic. It is not fed
//! back into the pitch pipeline.
//!
//! Readings from a sensor running on another thread are delivered through a
//! [`PressureFeed`], a wait free single producer, single consumer queue.

mod engine;
mod feed;
mod history;

pub use engine::{TimeRegistration, TimeRegistrationEngine};
pub use feed::PressureFeed;
pub(crate) use feed::pressure_feed;
pub use history::{EnergyPoint, PressureReading, TimedHistory, Timestamped};
