/// Bark-scale critical-band energy distribution
///
/// The Content Analyzer's `band_energy[B]` field needs ≈26 psychoacoustic
/// critical bands (not the coarser 7-band perceptual split in
/// `frequency_analysis`, which drives the parameter-space projection).
/// Band edges follow the standard Zwicker/Bark critical-band table.
use crate::fft::{hann_window, next_pow2, rfft};

/// Bark critical-band edges in Hz (Zwicker & Fastl), 25 bands.
const BARK_EDGES_HZ: [f64; 26] = [
    20.0, 100.0, 200.0, 300.0, 400.0, 510.0, 630.0, 770.0, 920.0, 1080.0, 1270.0, 1480.0, 1720.0,
    2000.0, 2320.0, 2700.0, 3150.0, 3700.0, 4400.0, 5300.0, 6400.0, 7700.0, 9500.0, 12000.0,
    15500.0, 20000.0,
];

pub const BARK_BAND_COUNT: usize = BARK_EDGES_HZ.len() - 1;
pub const PERCEPTUAL_BAND_COUNT: usize = 7;

/// The Bark critical-band edges themselves, for callers that need to map
/// a per-band value (e.g. an EQ gain) back onto frequency bins.
pub fn bark_band_edges_hz() -> [f64; BARK_BAND_COUNT + 1] {
    BARK_EDGES_HZ
}

/// The coarser 7-band split used for parameter-space projection and the
/// persisted fingerprint (sub_bass/bass/low_mid/mid/upper_mid/presence/air).
pub type PerceptualBands = crate::frequency_analysis::FrequencyBands;

/// Normalized energy in each of the ~26 Bark critical bands, summing to 1.0.
/// All-zero/silent input yields a uniform distribution (never NaN).
pub fn band_energies(x: &[f32], sample_rate: u32) -> [f32; BARK_BAND_COUNT] {
    let uniform = [1.0 / BARK_BAND_COUNT as f32; BARK_BAND_COUNT];
    if x.is_empty() || sample_rate == 0 {
        return uniform;
    }

    let n_fft = next_pow2(x.len()).max(2);
    let window = hann_window(x.len());
    let mut buf = vec![0.0f64; n_fft];
    for (i, (&s, &w)) in x.iter().zip(window.iter()).enumerate() {
        buf[i] = s as f64 * w;
    }

    let spectrum = rfft(&buf);
    let psd: Vec<f64> = spectrum.iter().map(|c| c.norm_sqr()).collect();

    let nyquist = sample_rate as f64 / 2.0;
    let hz_to_bin = |hz: f64| -> usize {
        ((hz.min(nyquist) * n_fft as f64) / sample_rate as f64).floor() as usize
    };

    let mut energies = [0.0f64; BARK_BAND_COUNT];
    for b in 0..BARK_BAND_COUNT {
        let start = hz_to_bin(BARK_EDGES_HZ[b]).min(psd.len());
        let end = hz_to_bin(BARK_EDGES_HZ[b + 1]).min(psd.len()).max(start);
        energies[b] = psd[start..end].iter().sum();
    }

    let total: f64 = energies.iter().sum();
    if total <= 1e-20 {
        return uniform;
    }

    let mut out = [0.0f32; BARK_BAND_COUNT];
    for (o, e) in out.iter_mut().zip(energies.iter()) {
        *o = (e / total) as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_uniform() {
        let x = vec![0.0f32; 4096];
        let bands = band_energies(&x, 44100);
        let expected = 1.0 / BARK_BAND_COUNT as f32;
        for b in bands {
            assert!((b - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_is_uniform() {
        let bands = band_energies(&[], 44100);
        assert!((bands.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sums_to_one() {
        let x: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.02).sin() * 0.5).collect();
        let bands = band_energies(&x, 44100);
        let sum: f32 = bands.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn low_tone_favors_low_bands() {
        let sr = 44100u32;
        let x: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f32::consts::PI * 150.0 * i as f32 / sr as f32).sin())
            .collect();
        let bands = band_energies(&x, sr);
        let low_energy: f32 = bands[0..3].iter().sum();
        let high_energy: f32 = bands[20..].iter().sum();
        assert!(low_energy > high_energy);
    }
}
