//! Real time estimation of the back pressure produced by an oscillating
//! positive expiratory pressure ([PEP](https://en.wikipedia.org/wiki/Positive_expiratory_pressure))
//! breathing device, from microphone audio alone.
//!
//! The device makes the exhaled air flutter at a rate between roughly 10 and
//! 40 Hz, which modulates the amplitude of the sound it makes. The rate
//! rises with the pressure the user breathes against, so the pressure can be
//! estimated from the modulation rate using a linear calibration.
//!
//! Each audio chunk goes through four stages:
//!
//! 1. [`ChunkPreprocessor`] turns the chunk into a downsampled energy envelope.
//! 2. [`PitchEstimator`] finds the envelope period using normalized
//!    autocorrelation, narrowing its search around the previously accepted
//!    period.
//! 3. [`StabilityTracker`] rejects implausible jumps and smooths the
//!    candidates into a stable pitch.
//! 4. [`PressureMapper`] converts the stable pitch into cmH2O.
//!
//! Alongside, a [`TimeRegistrationEngine`] estimates the clock offset
//! between the audio and readings from a reference pressure sensor.
//!
//! Features
//! * Explicit, constructible [`Session`] values returning an immutable
//!   [`Snapshot`] per chunk.
//! * Wait free hand off of pressure readings and snapshots between threads.
//! * Serde/TOML configuration with defaults for a 44.1 kHz input.
//!
//! # Examples
//!
//! ```
//! use pep_ear::{EstimatorConfig, Session};
//!
//! let sample_rate = 44100.0;
//! let mut session = Session::new(EstimatorConfig::default()).unwrap();
//!
//! // Breathing sound fluttering at 20 Hz.
//! let audio: Vec<f32> = (0..6 * 8820)
//!     .map(|i| {
//!         let t = i as f32 / sample_rate;
//!         let flutter = 1.0 + (2.0 * std::f32::consts::PI * 20.0 * t).sin();
//!         0.5 * flutter * (2.0 * std::f32::consts::PI * 980.0 * t).sin()
//!     })
//!     .collect();
//!
//! for chunk in audio.chunks(8820) {
//!     let snapshot = session.process_chunk(chunk).unwrap();
//!     println!("{:.1} Hz, {:.1} cmH2O", snapshot.pitch_hz, snapshot.pressure_cm_h2o);
//! }
//! assert_eq!(session.run_length(), 5);
//! assert!((session.pitch_hz() - 20.0).abs() < 0.5);
//! ```
//!
//! Pressure readings from a sensor thread:
//!
//! ```
//! use pep_ear::Session;
//!
//! let mut session = Session::default();
//! let mut feed = session.pressure_feed(256);
//! std::thread::spawn(move || {
//!     feed.push(12.5, 0.02).unwrap();
//! })
//! .join()
//! .unwrap();
//! assert_eq!(session.poll_pressure_feed(), 1);
//! ```

pub mod common;
pub mod config;
pub mod envelope;
pub mod error;
pub mod pitch;
pub mod pressure;
pub mod registration;
mod session;

pub use config::{EstimatorConfig, RegistrationConfig};
pub use envelope::ChunkPreprocessor;
pub use error::{Error, InvalidInput};
pub use pitch::{PitchEstimate, PitchEstimator, StabilityState, StabilityTracker, StabilityUpdate};
pub use pressure::{PressureCalibration, PressureMapper};
pub use registration::{PressureFeed, PressureReading, TimeRegistration, TimeRegistrationEngine};
pub use session::{Session, Snapshot, SnapshotReceiver, SILENCE_LEVEL_DB};
