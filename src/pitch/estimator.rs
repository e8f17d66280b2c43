use crate::common::normalized_autocorr;
use crate::config::EstimatorConfig;

/// A sub-multiple of the best lag is preferred if it correlates at least
/// this fraction as well.
const SUB_MULTIPLE_THRESHOLD: f32 = 0.9;
/// Largest divisor checked for sub-multiples of the best lag.
const MAX_SUB_MULTIPLE_DIVISOR: usize = 3;
/// Half width of the refinement around a sub-multiple lag.
const SUB_MULTIPLE_RADIUS: usize = 2;

/// A raw, per chunk pitch candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchEstimate {
    /// The candidate pitch in Hz, or 0 if no candidate was found.
    pub frequency_hz: f32,
    /// The normalized autocorrelation at `lag_samples`, or 0 if no
    /// candidate was found.
    pub correlation: f32,
    /// The accepted lag in envelope samples, or 0 if no candidate was found.
    pub lag_samples: usize,
}

impl PitchEstimate {
    /// The "no candidate" estimate.
    pub const NONE: PitchEstimate = PitchEstimate {
        frequency_hz: 0.0,
        correlation: 0.0,
        lag_samples: 0,
    };

    /// Returns true if this estimate holds a pitch candidate.
    pub fn is_candidate(&self) -> bool {
        self.frequency_hz > 0.0
    }
}

/// Estimates the envelope period using a two resolution normalized
/// autocorrelation search.
///
/// The lag range `[floor(rate / max_freq), floor(rate / min_freq)]`, where
/// `rate` is the envelope sample rate, is first scanned with a coarse
/// stride of about 1/20 of the range. The best coarse lag is then refined
/// at unit resolution within one stride on either side.
///
/// A multiple of the period correlates about as well as the period itself,
/// so when it lands on the coarse grid and the period does not, it can win
/// the scan. The best lag `L` is therefore checked against `L / 3` and
/// `L / 2`, and the shortest of these that correlates at least 0.9 times
/// as well as `L` is selected.
///
/// Once a lag has been accepted it is used to predict the next one, and
/// the search is restricted to `search_window_radius` lags around it.
pub struct PitchEstimator {
    downsampled_rate: f32,
    min_lag: usize,
    max_lag: usize,
    min_correlation: f32,
    search_window_radius: usize,
    coarse_step_divisions: usize,
    /// The most recently accepted lag, if any.
    predicted_lag: Option<usize>,
    result: PitchEstimate,
}

impl PitchEstimator {
    pub fn new(config: &EstimatorConfig) -> Self {
        let (min_lag, max_lag) = config.lag_range();
        PitchEstimator {
            downsampled_rate: config.downsampled_rate(),
            min_lag,
            max_lag,
            min_correlation: config.min_correlation,
            search_window_radius: config.search_window_radius,
            coarse_step_divisions: config.coarse_step_divisions.max(1),
            predicted_lag: None,
            result: PitchEstimate::NONE,
        }
    }

    /// Estimates the pitch of `envelope`.
    ///
    /// Returns [`PitchEstimate::NONE`] if the envelope is shorter than the
    /// longest lag or if no lag correlates above the threshold. In that
    /// case the predicted lag is left unchanged.
    pub fn estimate(&mut self, envelope: &[f32]) -> PitchEstimate {
        self.result = self.compute(envelope);
        self.result
    }

    fn compute(&mut self, envelope: &[f32]) -> PitchEstimate {
        if envelope.len() < self.max_lag {
            return PitchEstimate::NONE;
        }

        let (start, end) = self.search_range();
        let stride = ((end - start) / self.coarse_step_divisions).max(1);

        // Coarse scan
        let (coarse_lag, _) = best_lag(envelope, (start..=end).step_by(stride));

        // Refine around the coarse maximum
        let refine_start = coarse_lag.saturating_sub(stride).max(start);
        let refine_end = (coarse_lag + stride).min(end);
        let (lag, correlation) = best_lag(envelope, refine_start..=refine_end);
        let (lag, correlation) = self.prefer_sub_multiple(envelope, lag, correlation, (start, end));

        if correlation > self.min_correlation {
            self.predicted_lag = Some(lag);
            PitchEstimate {
                frequency_hz: self.downsampled_rate / (lag as f32),
                correlation,
                lag_samples: lag,
            }
        } else {
            PitchEstimate::NONE
        }
    }

    /// Returns the shortest sub-multiple of `lag` within `range` correlating
    /// at least `SUB_MULTIPLE_THRESHOLD` times as well as `lag`, or `lag`
    /// itself.
    fn prefer_sub_multiple(
        &self,
        envelope: &[f32],
        lag: usize,
        correlation: f32,
        range: (usize, usize),
    ) -> (usize, f32) {
        let (start, end) = range;
        let threshold = SUB_MULTIPLE_THRESHOLD * correlation;
        for divisor in (2..=MAX_SUB_MULTIPLE_DIVISOR).rev() {
            let center = ((lag as f32) / (divisor as f32)).round() as usize;
            if center < start {
                continue;
            }
            let candidate_start = center.saturating_sub(SUB_MULTIPLE_RADIUS).max(start);
            let candidate_end = (center + SUB_MULTIPLE_RADIUS).min(end);
            if candidate_start > candidate_end {
                continue;
            }
            let candidate = best_lag(envelope, candidate_start..=candidate_end);
            if candidate.1 >= threshold && candidate.1 > self.min_correlation {
                return candidate;
            }
        }
        (lag, correlation)
    }

    /// The inclusive range of lags searched by the next call to
    /// [`estimate`](Self::estimate).
    pub fn search_range(&self) -> (usize, usize) {
        match self.predicted_lag {
            Some(center) => (
                center
                    .saturating_sub(self.search_window_radius)
                    .max(self.min_lag),
                (center + self.search_window_radius).min(self.max_lag),
            ),
            None => (self.min_lag, self.max_lag),
        }
    }

    /// The full range of valid lags, in envelope samples.
    pub fn lag_range(&self) -> (usize, usize) {
        (self.min_lag, self.max_lag)
    }

    /// The most recently accepted lag, around which the next search is
    /// centered.
    pub fn predicted_lag(&self) -> Option<usize> {
        self.predicted_lag
    }

    /// Forgets the predicted lag so that the next search covers the full
    /// lag range.
    pub fn clear_prediction(&mut self) {
        self.predicted_lag = None;
    }

    /// Returns the most recent estimate.
    pub fn result(&self) -> &PitchEstimate {
        &self.result
    }

    pub fn reset(&mut self) {
        self.predicted_lag = None;
        self.result = PitchEstimate::NONE;
    }
}

/// Returns the lag with the highest normalized autocorrelation. Ties go to
/// the earliest lag.
fn best_lag<I: Iterator<Item = usize>>(envelope: &[f32], lags: I) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for lag in lags {
        let correlation = normalized_autocorr(envelope, lag);
        if correlation > best.1 {
            best = (lag, correlation);
        }
    }
    best
}
