/// Computes the normalized [autocorrelation](https://en.wikipedia.org/wiki/Autocorrelation)
/// of `window` at a single lag using time domain summation over the
/// overlapping part of the window and its shifted copy:
///
/// `sum(x[i] * x[i + lag]) / sqrt(sum(x[i]^2) * sum(x[i + lag]^2))`
///
/// Returns 0 if the lag leaves no overlap or if either part has zero energy.
pub fn normalized_autocorr(window: &[f32], lag: usize) -> f32 {
    if lag >= window.len() {
        return 0.0;
    }

    let overlap = window.len() - lag;
    let mut sum: f32 = 0.0;
    let mut head_energy: f32 = 0.0;
    let mut tail_energy: f32 = 0.0;
    for (x, x_shifted) in window[..overlap].iter().zip(window[lag..].iter()) {
        sum += x * x_shifted;
        head_energy += x * x;
        tail_energy += x_shifted * x_shifted;
    }

    if head_energy <= 0.0 || tail_energy <= 0.0 {
        return 0.0;
    }

    // The product of the energies underflows for very quiet input.
    sum / (head_energy.sqrt() * tail_energy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::normalized_autocorr;

    // Naive reference implementation in double precision.
    fn reference(window: &[f32], lag: usize) -> f64 {
        let n = window.len() - lag;
        let mut sum = 0.0;
        let mut a = 0.0;
        let mut b = 0.0;
        for i in 0..n {
            let x = window[i] as f64;
            let y = window[i + lag] as f64;
            sum += x * y;
            a += x * x;
            b += y * y;
        }
        sum / (a * b).sqrt()
    }

    #[test]
    fn test_matches_reference() {
        let window: Vec<f32> = (0..64).map(|i| ((i * 7 % 11) as f32) - 3.0).collect();
        for lag in 0..32 {
            let expected = reference(&window, lag);
            let actual = normalized_autocorr(&window, lag) as f64;
            assert!((expected - actual).abs() <= 1e-5, "lag {}", lag);
        }
    }

    #[test]
    fn test_periodic_window() {
        let period = 12;
        let window: Vec<f32> = (0..120)
            .map(|i| (2.0 * core::f32::consts::PI * (i as f32) / (period as f32)).sin())
            .collect();
        assert!((normalized_autocorr(&window, period) - 1.0).abs() <= 1e-4);
        assert!((normalized_autocorr(&window, period / 2) + 1.0).abs() <= 1e-4);
        assert!(normalized_autocorr(&window, 0) > 0.9999);
    }

    #[test]
    fn test_degenerate_input() {
        let silence = [0.0_f32; 32];
        assert_eq!(normalized_autocorr(&silence, 4), 0.0);
        let window = [1.0_f32, 2.0, 3.0];
        assert_eq!(normalized_autocorr(&window, 3), 0.0);
        assert_eq!(normalized_autocorr(&window, 10), 0.0);
        assert_eq!(normalized_autocorr(&[], 0), 0.0);
    }
}
