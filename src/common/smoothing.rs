//! Moving average, block downsampling and Gaussian smoothing of sample buffers.
//!
//! All functions write into a caller provided `Vec`, which is cleared first.
//! Reusing the same output buffers across calls avoids allocating once the
//! buffers have grown to the largest chunk size seen.

/// Computes a centered moving average of `input` over `window_len` samples.
///
/// Near the ends of the buffer the window is clipped to the samples that
/// exist, i.e the average is taken over fewer samples instead of padding
/// with zeros. For an even `window_len` the window extends one sample
/// further to the left than to the right.
///
/// `prefix_sums` is scratch storage.
pub fn centered_moving_average(
    input: &[f32],
    window_len: usize,
    prefix_sums: &mut Vec<f64>,
    output: &mut Vec<f32>,
) {
    output.clear();
    if input.is_empty() {
        return;
    }

    prefix_sums.clear();
    prefix_sums.push(0.0);
    let mut running_sum = 0.0_f64;
    for sample in input.iter() {
        running_sum += *sample as f64;
        prefix_sums.push(running_sum);
    }

    let window_len = window_len.max(1);
    let left = window_len / 2;
    let right = window_len - 1 - left;
    let last = input.len() - 1;
    output.extend((0..input.len()).map(|i| {
        let start = i.saturating_sub(left);
        let end = (i + right).min(last);
        let sum = prefix_sums[end + 1] - prefix_sums[start];
        (sum / ((end + 1 - start) as f64)) as f32
    }));
}

/// Averages contiguous, non-overlapping blocks of `factor` samples.
/// A trailing partial block is dropped.
pub fn block_average(input: &[f32], factor: usize, output: &mut Vec<f32>) {
    output.clear();
    if factor == 0 {
        return;
    }
    let scale = 1.0 / (factor as f32);
    output.extend(
        input
            .chunks_exact(factor)
            .map(|block| scale * block.iter().sum::<f32>()),
    );
}

/// Builds a Gaussian kernel with standard deviation `sigma` (in samples),
/// truncated at `ceil(3 * sigma)` samples on each side and normalized to
/// unit sum.
///
/// A non-positive or non-finite `sigma` gives the identity kernel `[1.0]`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }

    let half_width = (3.0 * sigma).ceil() as usize;
    let denominator = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * half_width)
        .map(|i| {
            let x = i as f32 - half_width as f32;
            (-x * x / denominator).exp()
        })
        .collect();

    let mass: f32 = kernel.iter().sum();
    for weight in kernel.iter_mut() {
        *weight /= mass;
    }
    kernel
}

/// Convolves `input` with a symmetric, odd length `kernel`.
///
/// Each output sample is divided by the kernel mass that actually
/// overlapped the input, so samples near the edges are not biased towards
/// zero.
pub fn convolve_normalized(input: &[f32], kernel: &[f32], output: &mut Vec<f32>) {
    output.clear();
    if kernel.is_empty() {
        output.extend_from_slice(input);
        return;
    }

    let half_width = kernel.len() / 2;
    let len = input.len();
    output.extend((0..len).map(|i| {
        // Kernel index k covers input index i + k - half_width.
        let k_start = half_width.saturating_sub(i);
        let k_end = kernel.len().min(len + half_width - i);
        let mut sum = 0.0;
        let mut mass = 0.0;
        for k in k_start..k_end {
            let weight = kernel[k];
            sum += weight * input[i + k - half_width];
            mass += weight;
        }
        if mass > 0.0 {
            sum / mass
        } else {
            0.0
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_clips_edges() {
        let input = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut scratch = Vec::new();
        let mut output = Vec::new();
        centered_moving_average(&input, 3, &mut scratch, &mut output);
        assert_eq!(output, vec![1.5, 2.0, 3.0, 4.0, 4.5]);
    }

    #[test]
    fn test_moving_average_even_window() {
        let input = [4.0, 0.0, 8.0, 0.0];
        let mut scratch = Vec::new();
        let mut output = Vec::new();
        // Window covers [i - 1, i]
        centered_moving_average(&input, 2, &mut scratch, &mut output);
        assert_eq!(output, vec![4.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn test_moving_average_of_constant_is_constant() {
        let input = [0.25_f32; 50];
        let mut scratch = Vec::new();
        let mut output = Vec::new();
        centered_moving_average(&input, 176, &mut scratch, &mut output);
        assert_eq!(output.len(), input.len());
        for value in output.iter() {
            assert!((value - 0.25).abs() <= 1e-7);
        }
    }

    #[test]
    fn test_block_average_drops_partial_block() {
        let input = [1.0, 3.0, 5.0, 7.0, 9.0];
        let mut output = Vec::new();
        block_average(&input, 2, &mut output);
        assert_eq!(output, vec![2.0, 6.0]);

        block_average(&input[..1], 2, &mut output);
        assert!(output.is_empty());
    }

    #[test]
    fn test_gaussian_kernel() {
        let kernel = gaussian_kernel(1.0);
        assert_eq!(kernel.len(), 7);
        let mass: f32 = kernel.iter().sum();
        assert!((mass - 1.0).abs() <= 1e-6);
        for i in 0..3 {
            assert_eq!(kernel[i], kernel[6 - i]);
            assert!(kernel[i] < kernel[i + 1]);
        }

        assert_eq!(gaussian_kernel(0.0), vec![1.0]);
        assert_eq!(gaussian_kernel(f32::NAN), vec![1.0]);
        // A sub sample sigma still yields a valid, centered kernel.
        let narrow = gaussian_kernel(0.01);
        assert_eq!(narrow.len(), 3);
        assert!((narrow[1] - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn test_convolution_has_no_edge_bias() {
        let input = [2.0_f32; 20];
        let kernel = gaussian_kernel(2.0);
        let mut output = Vec::new();
        convolve_normalized(&input, &kernel, &mut output);
        assert_eq!(output.len(), input.len());
        for value in output.iter() {
            assert!((value - 2.0).abs() <= 1e-5);
        }
    }

    #[test]
    fn test_convolution_smooths_impulse() {
        let mut input = [0.0_f32; 21];
        input[10] = 1.0;
        let kernel = gaussian_kernel(1.5);
        let mut output = Vec::new();
        convolve_normalized(&input, &kernel, &mut output);
        let mass: f32 = output.iter().sum();
        assert!((mass - 1.0).abs() <= 1e-5);
        assert!(output[10] < 1.0);
        assert!((output[9] - output[11]).abs() <= 1e-7);
    }

    #[test]
    fn test_identity_kernel() {
        let input = [1.0_f32, -2.0, 3.0];
        let mut output = Vec::new();
        convolve_normalized(&input, &[1.0], &mut output);
        assert_eq!(output, input.to_vec());
    }
}
