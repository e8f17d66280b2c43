//! Expiratory pitch estimation from an energy envelope.
//!
//! [`PitchEstimator`] finds the envelope period using a normalized
//! autocorrelation search that is narrowed around the previously detected
//! period once a pitch has been found. Its per chunk candidates are noisy,
//! so [`StabilityTracker`] runs them through a run length state machine
//! and moving averages before a pitch is reported.
//!
//! ```
//! use pep_ear::{EstimatorConfig, PitchEstimator, StabilityTracker};
//!
//! let config = EstimatorConfig::default();
//! let mut estimator = PitchEstimator::new(&config);
//! let mut tracker = StabilityTracker::new(&config);
//!
//! // An envelope with a pulse every 49 samples, i.e 20 Hz at 980 Hz.
//! let envelope: Vec<f32> = (0..196)
//!     .map(|i| {
//!         let phase = 2.0 * core::f32::consts::PI * (i as f32) / 49.0;
//!         (0.5 + 0.5 * phase.cos()).powi(4)
//!     })
//!     .collect();
//!
//! for _ in 0..5 {
//!     let estimate = estimator.estimate(&envelope);
//!     tracker.update(&estimate);
//! }
//! assert!(tracker.is_locked());
//! assert!((tracker.final_pitch() - 20.0).abs() < 0.5);
//! ```

mod estimator;
mod stability;

pub use estimator::{PitchEstimate, PitchEstimator};
pub use stability::{StabilityState, StabilityTracker, StabilityUpdate};
