use log::debug;

use crate::config::RegistrationConfig;
use crate::error::InvalidInput;
use crate::registration::{EnergyPoint, PressureReading, TimedHistory};

/// An estimated offset between the audio clock and the pressure clock.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeRegistration {
    /// Seconds to add to an audio timestamp to get the matching pressure
    /// timestamp.
    pub offset_secs: f64,
    /// The correlation score of the offset, or 0 if no search has been
    /// accepted yet.
    pub confidence: f32,
}

/// Estimates the time offset between audio energy and measured pressure.
///
/// Candidate offsets from `-search_range_secs` to `+search_range_secs` in
/// steps of `search_step_secs` are scored by pairing each energy point with
/// the pressure reading nearest to its shifted timestamp. Pairs further apart
/// than `match_tolerance_secs` are ignored. The score of an offset is the
/// mean of `sqrt(energy) * pressure` over the matched pairs.
///
/// A search runs whenever a pressure reading is recorded and both histories
/// hold more than `min_history_points` entries. The best offset replaces the
/// current registration only if its score exceeds `acceptance_threshold`.
pub struct TimeRegistrationEngine {
    config: RegistrationConfig,
    energy: TimedHistory<EnergyPoint>,
    pressure: TimedHistory<PressureReading>,
    registration: TimeRegistration,
}

impl TimeRegistrationEngine {
    pub fn new(config: &RegistrationConfig) -> Self {
        TimeRegistrationEngine {
            config: config.clone(),
            energy: TimedHistory::new(config.max_history_secs),
            pressure: TimedHistory::new(config.max_history_secs),
            registration: TimeRegistration::default(),
        }
    }

    /// Appends an energy point. Never triggers a search.
    pub fn record_energy(&mut self, timestamp_secs: f64, energy: f32) -> Result<(), InvalidInput> {
        if !energy.is_finite() {
            return Err(InvalidInput::NonFiniteEnergy { timestamp_secs });
        }
        self.energy.push(EnergyPoint {
            timestamp_secs,
            energy,
        })
    }

    /// Appends a pressure reading and runs a search if enough history has
    /// accumulated. Returns true if the registration was updated.
    pub fn record_pressure(&mut self, reading: PressureReading) -> Result<bool, InvalidInput> {
        if !reading.value_cm_h2o.is_finite() {
            return Err(InvalidInput::NonFiniteReading {
                timestamp_secs: reading.timestamp_secs,
            });
        }
        self.pressure.push(reading)?;

        let min_points = self.config.min_history_points;
        if self.energy.len() > min_points && self.pressure.len() > min_points {
            Ok(self.update_registration())
        } else {
            Ok(false)
        }
    }

    fn update_registration(&mut self) -> bool {
        let best = self.search();
        if best.confidence > self.config.acceptance_threshold {
            debug!(
                "time registration accepted: offset {:.3}s, score {:.3}",
                best.offset_secs, best.confidence
            );
            self.registration = best;
            true
        } else {
            debug!(
                "time registration rejected: best offset {:.3}s, score {:.3}",
                best.offset_secs, best.confidence
            );
            false
        }
    }

    /// Scores every candidate offset against the current histories and
    /// returns the best one without committing it. Ties go to the most
    /// negative offset.
    pub fn search(&self) -> TimeRegistration {
        let mut best = TimeRegistration {
            offset_secs: -self.config.search_range_secs,
            confidence: 0.0,
        };
        let mut best_score = f64::NEG_INFINITY;

        for i in 0..self.config.candidate_count() {
            let offset_secs = -self.config.search_range_secs + (i as f64) * self.config.search_step_secs;
            let score = self.score(offset_secs);
            if score > best_score {
                best_score = score;
                best = TimeRegistration {
                    offset_secs,
                    confidence: score as f32,
                };
            }
        }
        best
    }

    /// Mean of `sqrt(energy) * pressure` over the energy points with a
    /// pressure reading within tolerance of their shifted timestamp.
    fn score(&self, offset_secs: f64) -> f64 {
        let tolerance = self.config.match_tolerance_secs;
        let mut sum = 0.0_f64;
        let mut matches = 0_usize;

        // Shifted energy timestamps are non-decreasing, so one cursor walks
        // the pressure history once per offset.
        let mut cursor = 0;
        for point in self.energy.iter() {
            let target = point.timestamp_secs + offset_secs;
            let reading = match self.pressure.nearest_from(target, &mut cursor) {
                Some(reading) => reading,
                None => break,
            };
            if (reading.timestamp_secs - target).abs() <= tolerance {
                let energy = f64::from(point.energy.max(0.0));
                sum += energy.sqrt() * f64::from(reading.value_cm_h2o);
                matches += 1;
            }
        }

        if matches == 0 {
            0.0
        } else {
            sum / (matches as f64)
        }
    }

    /// The most recently accepted registration.
    pub fn registration(&self) -> TimeRegistration {
        self.registration
    }

    pub fn energy_history(&self) -> &TimedHistory<EnergyPoint> {
        &self.energy
    }

    pub fn pressure_history(&self) -> &TimedHistory<PressureReading> {
        &self.pressure
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.energy.clear();
        self.pressure.clear();
        self.registration = TimeRegistration::default();
    }
}
