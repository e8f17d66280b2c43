use log::debug;

use crate::config::EstimatorConfig;
use crate::pitch::PitchEstimate;

/// The mutable state of a [`StabilityTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StabilityState {
    /// Number of consecutive plausible candidates, saturating at the
    /// configured maximum run length.
    pub run_length: usize,
    /// Moving average of the candidate period, in seconds.
    pub moving_average_period: f32,
    /// Moving average of the candidate frequency, in Hz.
    pub moving_average_amplitude: f32,
    /// The most recently accepted candidate frequency, or 0 if there is none.
    pub last_accepted_pitch: f32,
}

/// How a candidate affected the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilityUpdate {
    /// The estimate held no candidate. The run length was decremented by 1.
    NoCandidate,
    /// The candidate was too far from the previously accepted pitch.
    /// The run length was decremented by 2.
    ImplausibleJump,
    /// The candidate was blended into the moving averages.
    Accepted,
}

/// Turns a stream of noisy per chunk pitch candidates into a stable pitch.
///
/// Consecutive plausible candidates increase a run length counter, which
/// saturates at `max_run_length` ("locked"). Missing candidates decrease it
/// by one and implausible jumps (a ratio to the previously accepted pitch
/// outside `[1 / max_pitch_jump_ratio, max_pitch_jump_ratio]`) by two.
/// Accepted candidates are blended into a moving average of the period
/// using a blend factor of `min(decay_rate, 1 - 1 / run_length)`, so the
/// first candidate after losing lock replaces the average outright.
///
/// The reported pitch is the reciprocal of the averaged period while the
/// run length is positive, and 0 otherwise. Once the run length drains to
/// 0 the previously accepted pitch is forgotten, so that a new pitch far
/// from the old one can be acquired. This reset is not part of the plain
/// run length transitions; see the lock loss notes in DESIGN.md.
pub struct StabilityTracker {
    state: StabilityState,
    decay_rate: f32,
    max_run_length: usize,
    max_jump_ratio: f32,
}

impl StabilityTracker {
    pub fn new(config: &EstimatorConfig) -> Self {
        StabilityTracker {
            state: StabilityState::default(),
            decay_rate: config.decay_rate,
            max_run_length: config.max_run_length,
            max_jump_ratio: config.max_pitch_jump_ratio,
        }
    }

    /// Advances the state machine by one candidate.
    pub fn update(&mut self, estimate: &PitchEstimate) -> StabilityUpdate {
        let was_tracking = self.state.run_length > 0;
        let was_locked = self.is_locked();
        let update = self.apply(estimate);

        if self.state.run_length == 0 {
            // Lock loss, see DESIGN.md.
            self.state.last_accepted_pitch = 0.0;
            if was_tracking {
                debug!("pitch lock lost");
            }
        } else if !was_locked && self.is_locked() {
            debug!("pitch locked at {:.2} Hz", self.final_pitch());
        }

        update
    }

    fn apply(&mut self, estimate: &PitchEstimate) -> StabilityUpdate {
        let state = &mut self.state;

        if !estimate.is_candidate() {
            state.run_length = state.run_length.saturating_sub(1);
            return StabilityUpdate::NoCandidate;
        }

        let pitch = estimate.frequency_hz;
        if state.last_accepted_pitch > 0.0 {
            let ratio = pitch / state.last_accepted_pitch;
            if ratio < 1.0 / self.max_jump_ratio || ratio > self.max_jump_ratio {
                state.run_length = state.run_length.saturating_sub(2);
                return StabilityUpdate::ImplausibleJump;
            }
        }

        state.run_length = (state.run_length + 1).min(self.max_run_length);
        let mix = self
            .decay_rate
            .min(1.0 - 1.0 / (state.run_length.max(1) as f32));
        state.moving_average_period = state.moving_average_period * mix + (1.0 / pitch) * (1.0 - mix);
        state.moving_average_amplitude = state.moving_average_amplitude * mix + pitch * (1.0 - mix);
        state.last_accepted_pitch = pitch;
        StabilityUpdate::Accepted
    }

    /// The stabilized pitch in Hz, or 0 if there is no lock.
    pub fn final_pitch(&self) -> f32 {
        if self.state.run_length > 0 && self.state.moving_average_period > 0.0 {
            1.0 / self.state.moving_average_period
        } else {
            0.0
        }
    }

    pub fn run_length(&self) -> usize {
        self.state.run_length
    }

    /// Returns true if the run length has reached its maximum.
    pub fn is_locked(&self) -> bool {
        self.state.run_length >= self.max_run_length
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = StabilityState::default();
    }
}
