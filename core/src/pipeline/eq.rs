/// Psychoacoustic EQ stage: per-band gain in the frequency domain via
/// weighted overlap-add (WOLA) — Hann analysis and synthesis windows,
/// 75% overlap, output normalized by the summed squared window so the
/// reconstruction stays flat regardless of edge effects.
use mastering_dsp::bands::bark_band_edges_hz;
use mastering_dsp::fft::hann_window;
use mastering_dsp::{irfft, rfft};

const FRAME_SIZE: usize = 4096;
const HOP: usize = FRAME_SIZE / 4;

/// Applies `gains_db` (one per Bark band) to a single channel. Returns the
/// reshaped signal and its post-EQ peak magnitude.
pub fn apply_eq(x: &[f32], gains_db: &[f32], sample_rate: u32) -> (Vec<f32>, f32) {
    if x.is_empty() || gains_db.is_empty() || sample_rate == 0 {
        return (x.to_vec(), x.iter().fold(0.0f32, |m, &s| m.max(s.abs())));
    }

    let n = x.len();
    let window = hann_window(FRAME_SIZE);
    let edges = bark_band_edges_hz();
    let nyquist = sample_rate as f64 / 2.0;
    let hz_to_bin = |hz: f64| ((hz.min(nyquist) * FRAME_SIZE as f64) / sample_rate as f64).floor() as usize;

    let gains_linear: Vec<f64> = gains_db.iter().map(|&g| 10f64.powf(g as f64 / 20.0)).collect();

    let mut output = vec![0.0f64; n];
    let mut norm = vec![0.0f64; n];

    let mut start = 0usize;
    while start < n {
        let end = (start + FRAME_SIZE).min(n);
        let mut frame = vec![0.0f64; FRAME_SIZE];
        for i in 0..(end - start) {
            frame[i] = x[start + i] as f64 * window[i];
        }

        let mut spectrum = rfft(&frame);
        for (b, &gain) in gains_linear.iter().enumerate() {
            if b + 1 >= edges.len() {
                break;
            }
            let lo = hz_to_bin(edges[b]).min(spectrum.len());
            let hi = hz_to_bin(edges[b + 1]).min(spectrum.len()).max(lo);
            for c in spectrum[lo..hi].iter_mut() {
                *c *= gain;
            }
        }

        let frame_out = irfft(&spectrum, FRAME_SIZE);
        for i in 0..(end - start) {
            output[start + i] += frame_out[i] * window[i];
            norm[start + i] += window[i] * window[i];
        }

        if end == n {
            break;
        }
        start += HOP;
    }

    let mut result = vec![0.0f32; n];
    let mut peak = 0.0f32;
    for i in 0..n {
        let v = if norm[i] > 1e-8 { (output[i] / norm[i]) as f32 } else { 0.0 };
        result[i] = v;
        peak = peak.max(v.abs());
    }

    (result, peak)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gains_are_near_identity() {
        let sr = 44100u32;
        let x: Vec<f32> = (0..sr as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.4)
            .collect();
        let gains = vec![0.0f32; mastering_dsp::BARK_BAND_COUNT];
        let (y, _) = apply_eq(&x, &gains, sr);
        assert_eq!(y.len(), x.len());
        let err: f32 = x.iter().zip(y.iter()).map(|(&a, &b)| (a - b).abs()).sum::<f32>() / x.len() as f32;
        assert!(err < 0.05, "mean abs error {}", err);
    }

    #[test]
    fn boosting_a_band_raises_its_energy() {
        let sr = 44100u32;
        let x: Vec<f32> = (0..sr as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 150.0 * i as f32 / sr as f32).sin() * 0.3)
            .collect();
        let mut gains = vec![0.0f32; mastering_dsp::BARK_BAND_COUNT];
        gains[1] = 6.0;
        let (boosted, _) = apply_eq(&x, &gains, sr);
        let (flat, _) = apply_eq(&x, &vec![0.0f32; mastering_dsp::BARK_BAND_COUNT], sr);

        let energy = |s: &[f32]| s.iter().map(|&v| v * v).sum::<f32>();
        assert!(energy(&boosted) > energy(&flat));
    }

    #[test]
    fn empty_input_is_safe() {
        let (y, peak) = apply_eq(&[], &[0.0; 25], 44100);
        assert!(y.is_empty());
        assert_eq!(peak, 0.0);
    }
}
