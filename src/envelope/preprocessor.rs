use crate::common::{block_average, centered_moving_average, convolve_normalized, gaussian_kernel};
use crate::config::EstimatorConfig;

/// Turns an audio chunk into an energy envelope in five steps:
///
/// 1. Compute a baseline using a centered moving average spanning one
///    period of the lower formant frequency.
/// 2. Subtract the baseline from the chunk.
/// 3. Square the result.
/// 4. Average non-overlapping blocks of `downsample_factor` samples.
/// 5. Smooth with a Gaussian kernel.
///
/// The output depends only on the input chunk and the configuration. The
/// preprocessor keeps its intermediate buffers between calls so that
/// processing chunks of a steady size does not allocate.
pub struct ChunkPreprocessor {
    /// Length of the baseline moving average window, in samples.
    baseline_window: usize,
    downsample_factor: usize,
    kernel: Vec<f32>,
    prefix_sums: Vec<f64>,
    baseline: Vec<f32>,
    downsampled: Vec<f32>,
    envelope: Vec<f32>,
}

impl ChunkPreprocessor {
    pub fn new(config: &EstimatorConfig) -> Self {
        let baseline_window = (config.sample_rate / config.lower_formant_freq).round() as usize;
        let sigma = config.smoothing_sigma_scale
            * (config.downsample_factor as f32)
            * config.max_freq
            / config.sample_rate
            * config.smoothing_fine_tune;

        ChunkPreprocessor {
            baseline_window: baseline_window.max(1),
            downsample_factor: config.downsample_factor.max(1),
            kernel: gaussian_kernel(sigma),
            prefix_sums: Vec::new(),
            baseline: Vec::new(),
            downsampled: Vec::new(),
            envelope: Vec::new(),
        }
    }

    /// Computes the envelope of `samples`. The returned slice holds
    /// `samples.len() / downsample_factor` values.
    pub fn process(&mut self, samples: &[f32]) -> &[f32] {
        centered_moving_average(
            samples,
            self.baseline_window,
            &mut self.prefix_sums,
            &mut self.baseline,
        );

        // Reuse the baseline buffer for the squared residual.
        for (value, sample) in self.baseline.iter_mut().zip(samples.iter()) {
            let residual = sample - *value;
            *value = residual * residual;
        }

        block_average(&self.baseline, self.downsample_factor, &mut self.downsampled);
        convolve_normalized(&self.downsampled, &self.kernel, &mut self.envelope);
        &self.envelope
    }

    /// Returns the most recently computed envelope.
    pub fn envelope(&self) -> &[f32] {
        &self.envelope
    }

    pub fn baseline_window(&self) -> usize {
        self.baseline_window
    }

    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(sample_rate: f32, frequency: f32, sample_count: usize) -> Vec<f32> {
        (0..sample_count)
            .map(|i| (2.0 * core::f32::consts::PI * frequency * (i as f32) / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_default_parameters() {
        let preprocessor = ChunkPreprocessor::new(&EstimatorConfig::default());
        assert_eq!(preprocessor.baseline_window(), 176);
        // The default smoothing width is well below one envelope sample.
        assert_eq!(preprocessor.kernel().len(), 3);
        assert!((preprocessor.kernel()[1] - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn test_envelope_length() {
        let mut preprocessor = ChunkPreprocessor::new(&EstimatorConfig::default());
        assert_eq!(preprocessor.process(&vec![0.1; 4499]).len(), 99);
        assert_eq!(preprocessor.process(&vec![0.1; 4500]).len(), 100);
        assert_eq!(preprocessor.process(&vec![0.1; 44]).len(), 0);
        assert_eq!(preprocessor.process(&[]).len(), 0);
    }

    #[test]
    fn test_constant_offset_is_removed() {
        let mut preprocessor = ChunkPreprocessor::new(&EstimatorConfig::default());
        let envelope = preprocessor.process(&vec![0.7; 9000]);
        for value in envelope.iter() {
            assert!(value.abs() <= 1e-9);
        }
    }

    #[test]
    fn test_tone_energy() {
        // A 980 Hz tone has exactly two periods of its squared value per
        // block of 45 samples at 44.1 kHz, so each block averages to 0.5.
        let mut preprocessor = ChunkPreprocessor::new(&EstimatorConfig::default());
        let tone = generate_sine(44100.0, 980.0, 9000);
        let envelope = preprocessor.process(&tone).to_vec();
        assert_eq!(envelope.len(), 200);
        // The 176 sample baseline window leaks about 2% of the tone, which
        // slightly raises the residual energy.
        for value in envelope[10..190].iter() {
            assert!((value - 0.5).abs() <= 0.05, "value {}", value);
        }
        assert_eq!(preprocessor.envelope(), &envelope[..]);
    }

    #[test]
    fn test_modulated_tone_follows_modulation() {
        let sample_rate = 44100.0;
        let mut preprocessor = ChunkPreprocessor::new(&EstimatorConfig::default());
        let chunk: Vec<f32> = (0..8820)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let modulation = 1.0 + (2.0 * core::f32::consts::PI * 20.0 * t).sin();
                modulation * (2.0 * core::f32::consts::PI * 980.0 * t).sin()
            })
            .collect();
        let envelope = preprocessor.process(&chunk);
        // 20 Hz modulation at an envelope rate of 980 Hz has a period of 49
        // envelope samples, peaking a quarter period in.
        let peak = envelope[12];
        let trough = envelope[37];
        assert!(peak > 1.5, "peak {}", peak);
        assert!(trough < 0.1, "trough {}", trough);
        assert!((envelope[12] - envelope[12 + 49]).abs() <= 0.1);
    }

    #[test]
    fn test_wide_smoothing_kernel() {
        let mut config = EstimatorConfig::default();
        config.smoothing_sigma_scale = 200.0;
        let mut preprocessor = ChunkPreprocessor::new(&config);
        assert!(preprocessor.kernel().len() > 3);
        let envelope = preprocessor.process(&vec![0.0; 4500]);
        assert!(envelope.iter().all(|value| *value == 0.0));
    }
}
