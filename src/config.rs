//! Estimator configuration.
//!
//! All values have defaults matching the reference device setup (44.1 kHz
//! input, 10-40 Hz expiratory pitch). Configurations can be deserialized
//! from TOML (or any other serde format). Missing fields fall back to their
//! defaults, so a document only needs to list the values it overrides.
//!
//! ```
//! use pep_ear::EstimatorConfig;
//!
//! let config = EstimatorConfig::from_toml_str(
//!     r#"
//!     sample_rate = 48000.0
//!
//!     [calibration]
//!     slope = 0.6
//!     intercept = 4.0
//!
//!     [registration]
//!     max_history_secs = 20.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.sample_rate, 48000.0);
//! assert_eq!(config.downsample_factor, 45);
//! assert_eq!(config.registration.max_history_secs, 20.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pressure::PressureCalibration;

/// Configuration shared by all stages of a [`Session`](crate::Session).
///
/// The sample rate and downsample factor are fixed for the lifetime of a
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: f32,
    /// Lowest detectable expiratory pitch in Hz.
    pub min_freq: f32,
    /// Highest detectable expiratory pitch in Hz.
    pub max_freq: f32,
    /// Number of squared samples averaged into one envelope sample.
    pub downsample_factor: usize,
    /// The baseline removal window spans one period of this frequency.
    pub lower_formant_freq: f32,
    /// Gaussian smoothing width, as a fraction of
    /// `downsample_factor * max_freq / sample_rate`.
    pub smoothing_sigma_scale: f32,
    /// Fine tuning factor applied on top of `smoothing_sigma_scale`.
    pub smoothing_fine_tune: f32,
    /// Normalized autocorrelation a candidate lag must exceed.
    pub min_correlation: f32,
    /// Half width, in envelope samples, of the lag window searched around
    /// the previously accepted lag.
    pub search_window_radius: usize,
    /// The coarse lag scan uses a stride of `range / coarse_step_divisions`.
    pub coarse_step_divisions: usize,
    /// Upper bound of the moving average blend factor.
    pub decay_rate: f32,
    /// Run length at which the pitch is considered locked.
    pub max_run_length: usize,
    /// Largest plausible ratio between consecutive accepted pitches.
    /// The lower bound is the reciprocal.
    pub max_pitch_jump_ratio: f32,
    /// Pitch to pressure calibration.
    pub calibration: PressureCalibration,
    /// Audio/pressure time registration.
    pub registration: RegistrationConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            min_freq: 10.0,
            max_freq: 40.0,
            downsample_factor: 45,
            lower_formant_freq: 250.0,
            smoothing_sigma_scale: 0.2,
            smoothing_fine_tune: 1.1,
            min_correlation: 0.6,
            search_window_radius: 10,
            coarse_step_divisions: 20,
            decay_rate: 0.8,
            max_run_length: 5,
            max_pitch_jump_ratio: 2.0,
            calibration: PressureCalibration::default(),
            registration: RegistrationConfig::default(),
        }
    }
}

/// Settings for aligning the audio energy history with pressure readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Histories only keep entries this many seconds older than the newest.
    pub max_history_secs: f64,
    /// Candidate offsets span `[-search_range_secs, search_range_secs]`.
    pub search_range_secs: f64,
    /// Distance between candidate offsets.
    pub search_step_secs: f64,
    /// A shifted energy point only matches a pressure reading this close.
    pub match_tolerance_secs: f64,
    /// Both histories must hold more than this many points before searching.
    pub min_history_points: usize,
    /// A search result must score above this to replace the current offset.
    pub acceptance_threshold: f32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_history_secs: 30.0,
            search_range_secs: 5.0,
            search_step_secs: 0.01,
            match_tolerance_secs: 0.1,
            min_history_points: 100,
            acceptance_threshold: 0.3,
        }
    }
}

fn invalid(field: &'static str, reason: &'static str) -> Error {
    Error::InvalidConfig { field, reason }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl EstimatorConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(document: &str) -> Result<Self, Error> {
        let config: EstimatorConfig = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// The envelope sample rate in Hz.
    pub fn downsampled_rate(&self) -> f32 {
        self.sample_rate / (self.downsample_factor as f32)
    }

    /// The range of autocorrelation lags, in envelope samples, that
    /// corresponds to `[max_freq, min_freq]`.
    pub fn lag_range(&self) -> (usize, usize) {
        let rate = self.downsampled_rate();
        let min_lag = (rate / self.max_freq).floor() as usize;
        let max_lag = (rate / self.min_freq).floor() as usize;
        (min_lag, max_lag)
    }

    /// Checks that all values are in range.
    pub fn validate(&self) -> Result<(), Error> {
        if !is_positive(self.sample_rate) {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if !is_positive(self.min_freq) {
            return Err(invalid("min_freq", "must be positive"));
        }
        if !self.max_freq.is_finite() || self.max_freq <= self.min_freq {
            return Err(invalid("max_freq", "must be greater than min_freq"));
        }
        if self.downsample_factor == 0 {
            return Err(invalid("downsample_factor", "must be greater than 0"));
        }
        if self.lag_range().0 == 0 {
            return Err(invalid(
                "max_freq",
                "must be below the downsampled sample rate",
            ));
        }
        if !is_positive(self.lower_formant_freq) {
            return Err(invalid("lower_formant_freq", "must be positive"));
        }
        if !self.smoothing_sigma_scale.is_finite() || self.smoothing_sigma_scale < 0.0 {
            return Err(invalid("smoothing_sigma_scale", "must not be negative"));
        }
        if !self.smoothing_fine_tune.is_finite() || self.smoothing_fine_tune < 0.0 {
            return Err(invalid("smoothing_fine_tune", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.min_correlation) {
            return Err(invalid("min_correlation", "must be in [0, 1]"));
        }
        if self.coarse_step_divisions == 0 {
            return Err(invalid("coarse_step_divisions", "must be greater than 0"));
        }
        if !(0.0..1.0).contains(&self.decay_rate) {
            return Err(invalid("decay_rate", "must be in [0, 1)"));
        }
        if self.max_run_length == 0 {
            return Err(invalid("max_run_length", "must be greater than 0"));
        }
        if !self.max_pitch_jump_ratio.is_finite() || self.max_pitch_jump_ratio < 1.0 {
            return Err(invalid("max_pitch_jump_ratio", "must be at least 1"));
        }
        if !self.calibration.slope.is_finite() || !self.calibration.intercept.is_finite() {
            return Err(invalid("calibration", "must be finite"));
        }
        self.registration.validate()
    }
}

impl RegistrationConfig {
    /// Checks that all values are in range.
    pub fn validate(&self) -> Result<(), Error> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.max_history_secs) {
            return Err(invalid("registration.max_history_secs", "must be positive"));
        }
        if !self.search_range_secs.is_finite() || self.search_range_secs < 0.0 {
            return Err(invalid(
                "registration.search_range_secs",
                "must not be negative",
            ));
        }
        if !positive(self.search_step_secs) {
            return Err(invalid("registration.search_step_secs", "must be positive"));
        }
        if !self.match_tolerance_secs.is_finite() || self.match_tolerance_secs < 0.0 {
            return Err(invalid(
                "registration.match_tolerance_secs",
                "must not be negative",
            ));
        }
        if !self.acceptance_threshold.is_finite() {
            return Err(invalid("registration.acceptance_threshold", "must be finite"));
        }
        Ok(())
    }

    /// The number of candidate offsets evaluated by one search.
    pub fn candidate_count(&self) -> usize {
        (2.0 * self.search_range_secs / self.search_step_secs).round() as usize + 1
    }
}
