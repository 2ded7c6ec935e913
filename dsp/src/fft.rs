/// Real FFT / inverse real FFT
///
/// Thin wrapper around `realfft` giving the unitary-scaling contract the
/// rest of the crate (band energies, spectral centroid, LUFS gating) relies
/// on: `irfft(rfft(x)) == x` within float32 epsilon, for `x.len()` a power
/// of two.
use num_complex::Complex64;
use realfft::RealFftPlanner;

/// Forward real FFT. `x.len()` must be a power of two and non-zero.
///
/// Returns `x.len() / 2 + 1` complex bins, DC first, Nyquist last.
pub fn rfft(x: &[f64]) -> Vec<Complex64> {
    assert!(!x.is_empty(), "rfft: empty buffer");
    assert!(x.len().is_power_of_two(), "rfft: length must be a power of two");

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(x.len());

    let mut input = fft.make_input_vec();
    input.copy_from_slice(x);
    let mut output = fft.make_output_vec();
    fft.process(&mut input, &mut output)
        .expect("rfft: realfft processing failed");

    output
}

/// Inverse real FFT. `spectrum` must have `n / 2 + 1` bins for the target
/// length `n`. Normalizes so that `irfft(rfft(x)) == x`.
pub fn irfft(spectrum: &[Complex64], n: usize) -> Vec<f64> {
    assert!(n.is_power_of_two(), "irfft: length must be a power of two");
    assert_eq!(spectrum.len(), n / 2 + 1, "irfft: spectrum length mismatch");

    let mut planner = RealFftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(n);

    let mut input = ifft.make_input_vec();
    input.copy_from_slice(spectrum);
    let mut output = ifft.make_output_vec();
    ifft.process(&mut input, &mut output)
        .expect("irfft: realfft processing failed");

    // realfft's inverse is unnormalized; scale by 1/n for round-trip identity.
    let scale = 1.0 / n as f64;
    output.iter_mut().for_each(|s| *s *= scale);
    output
}

/// Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Next power of two ≥ `n` (used to size analysis windows for arbitrary
/// chunk lengths, per the Content Analyzer's "Hann window, length matching
/// the input up to the next power of two" contract).
pub fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    1usize << (usize::BITS - (n - 1).leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_identity() {
        let x: Vec<f64> = (0..1024)
            .map(|i| (i as f64 * 0.05).sin() * 0.5)
            .collect();
        let spectrum = rfft(&x);
        let y = irfft(&spectrum, x.len());

        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn silence_round_trips_to_silence() {
        let x = vec![0.0; 512];
        let spectrum = rfft(&x);
        let y = irfft(&spectrum, x.len());
        assert!(y.iter().all(|&s| s.abs() < 1e-12));
    }

    #[test]
    fn bin_count_is_n_over_2_plus_1() {
        let x = vec![0.0; 256];
        let spectrum = rfft(&x);
        assert_eq!(spectrum.len(), 129);
    }

    #[test]
    fn next_pow2_rounds_up() {
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(2), 2);
        assert_eq!(next_pow2(513), 1024);
        assert_eq!(next_pow2(1024), 1024);
    }

    #[test]
    fn hann_window_edges_near_zero() {
        let w = hann_window(64);
        assert!(w[0] < 0.01);
        assert!(w[63] < 0.01);
        assert!(w[32] > 0.95);
    }
}
