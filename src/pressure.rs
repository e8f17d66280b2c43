//! Conversion of a stabilized expiratory pitch into an estimated back pressure.

use serde::{Deserialize, Serialize};

/// A linear pitch (Hz) to pressure (cmH2O) calibration.
///
/// Two coefficient sets are in circulation for the reference device and it
/// is not known which one is authoritative, so both are provided as named
/// presets. [`SET_A`](Self::SET_A) is the default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureCalibration {
    /// cmH2O per Hz.
    pub slope: f32,
    /// cmH2O at 0 Hz.
    pub intercept: f32,
}

impl PressureCalibration {
    /// slope 0.68, intercept -1.2.
    pub const SET_A: PressureCalibration = PressureCalibration {
        slope: 0.68,
        intercept: -1.2,
    };

    /// slope 0.6, intercept 4.0.
    pub const SET_B: PressureCalibration = PressureCalibration {
        slope: 0.6,
        intercept: 4.0,
    };

    pub const fn new(slope: f32, intercept: f32) -> Self {
        PressureCalibration { slope, intercept }
    }
}

impl Default for PressureCalibration {
    fn default() -> Self {
        PressureCalibration::SET_A
    }
}

/// Maps a pitch to a pressure, clamped to the calibrated frequency range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureMapper {
    min_freq: f32,
    max_freq: f32,
    calibration: PressureCalibration,
}

impl PressureMapper {
    pub fn new(min_freq: f32, max_freq: f32, calibration: PressureCalibration) -> Self {
        PressureMapper {
            min_freq,
            max_freq,
            calibration,
        }
    }

    /// Returns the estimated pressure in cmH2O, or 0 if `pitch_hz` is outside
    /// `[min_freq, max_freq]` (including the "no lock" pitch 0).
    /// Negative pressures are clamped to 0.
    pub fn pressure(&self, pitch_hz: f32) -> f32 {
        if !(self.min_freq..=self.max_freq).contains(&pitch_hz) {
            return 0.0;
        }
        let pressure = self.calibration.slope * pitch_hz + self.calibration.intercept;
        pressure.max(0.0)
    }

    pub fn calibration(&self) -> PressureCalibration {
        self.calibration
    }
}
