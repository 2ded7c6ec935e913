/// Content Analyzer: extracts a `ContentDescriptor` from an audio window.
///
/// All-zero input yields the canonical silence descriptor (RMS = 0,
/// peak = 0, crest = 0, band energies uniform, centroid at 0 Hz); every
/// other input runs the full nine-step algorithm below.
use mastering_dsp::{bands, envelope::envelope_follow, meters, spectral_features, stereo_analysis};

use crate::types::{AudioBuffer, ContentDescriptor};

/// Long-term history carried across chunks of the same track: the
/// previous frame's power spectrum (for spectral flux) and an
/// exponential moving average of the descriptor itself (alpha = 0.1).
pub struct AnalysisHistory {
    prev_psd: Vec<f32>,
    pub ema: Option<ContentDescriptor>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self { prev_psd: Vec::new(), ema: None }
    }
}

impl Default for AnalysisHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentAnalyzer;

impl ContentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, buffer: &AudioBuffer, history: Option<&mut AnalysisHistory>) -> ContentDescriptor {
        if buffer.is_empty() || buffer.is_silent() {
            let d = ContentDescriptor::silence();
            if let Some(h) = history {
                h.prev_psd.clear();
            }
            return d;
        }

        let sr = buffer.sample_rate;
        let mid = buffer.mid();

        // 3. Magnitude spectrum -> band energies via Bark-scale weights.
        let band_energy = bands::band_energies(&mid, sr).to_vec();

        // 2 & 4. Windowed FFT, spectral centroid / rolloff / flux.
        let (freqs, psd) = spectral_features::audio_to_freq_domain(&mid, sr);
        let spectral_centroid_hz = spectral_features::compute_spectral_centroid(&psd, &freqs);
        let spectral_rolloff_hz = spectral_features::compute_spectral_rolloff(&psd, &freqs, 0.85);
        let spectral_flux = history
            .as_ref()
            .map(|h| spectral_flux_l2(&psd, &h.prev_psd))
            .unwrap_or(0.0);

        // 5. Time-domain RMS/peak/crest.
        let rms_energy = meters::rms(&mid);
        let peak_energy = meters::peak(&mid);
        let crest_factor_db = meters::crest_factor_db(&mid);

        // 6. K-weighted integrated LUFS.
        let integrated_loudness_lufs = if buffer.num_channels() >= 2 {
            let interleaved = interleave(&buffer.channels[0], &buffer.channels[1]);
            meters::integrated_lufs(&interleaved, sr, 2)
        } else {
            meters::integrated_lufs(&mid, sr, 1)
        };

        // 1 & 7. Stereo width: correlation-based, width = 1 - correlation, remapped to [0,2].
        let stereo_width = if buffer.num_channels() >= 2 {
            let corr = stereo_analysis::compute_phase_correlation(&buffer.channels[0], &buffer.channels[1]);
            (1.0 - corr).clamp(0.0, 2.0)
        } else {
            1.0
        };

        // 8. Attack time and zero-crossing rate.
        let zero_crossing_rate = zero_crossing_rate(&mid);
        let attack_time_ms = estimate_attack_time_ms(&mid, sr);

        let descriptor = ContentDescriptor {
            rms_energy,
            peak_energy,
            integrated_loudness_lufs,
            crest_factor_db,
            spectral_centroid_hz,
            spectral_rolloff_hz,
            spectral_flux,
            band_energy,
            stereo_width,
            zero_crossing_rate,
            attack_time_ms,
        };

        debug_assert!(descriptor.is_finite(), "content descriptor must be finite");

        // 9. Update long-term history (EMA, alpha = 0.1).
        if let Some(h) = history {
            h.ema = Some(match h.ema.take() {
                Some(prev) => ema_blend(&prev, &descriptor, 0.1),
                None => descriptor.clone(),
            });
            h.prev_psd = psd;
        }

        descriptor
    }
}

fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    for (&l, &r) in left.iter().zip(right.iter()) {
        out.push(l);
        out.push(r);
    }
    out
}

fn spectral_flux_l2(current: &[f32], previous: &[f32]) -> f32 {
    if current.len() != previous.len() || previous.is_empty() {
        return 0.0;
    }
    current
        .iter()
        .zip(previous.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

fn zero_crossing_rate(x: &[f32]) -> f32 {
    if x.len() < 2 {
        return 0.0;
    }
    let crossings = x.windows(2).filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0)).count();
    crossings as f32 / x.len() as f32
}

/// Attack time: milliseconds for the envelope to rise from 10% to 90% of
/// its peak, following the signal's own envelope rise slope.
fn estimate_attack_time_ms(x: &[f32], sample_rate: u32) -> f32 {
    if x.len() < 2 || sample_rate == 0 {
        return 0.0;
    }
    let abs: Vec<f32> = x.iter().map(|s| s.abs()).collect();
    let env = envelope_follow(&abs, sample_rate as usize, 1.0, 50.0);
    let peak_val = env.iter().copied().fold(0.0f32, f32::max);
    if peak_val <= 1e-10 {
        return 0.0;
    }

    let low = 0.1 * peak_val;
    let high = 0.9 * peak_val;
    let idx_low = env.iter().position(|&v| v >= low);
    let idx_high = env.iter().position(|&v| v >= high);

    match (idx_low, idx_high) {
        (Some(lo), Some(hi)) if hi > lo => ((hi - lo) as f32 / sample_rate as f32) * 1000.0,
        _ => 0.0,
    }
}

/// Exponential moving average blend of two descriptors: `prev*(1-a) + cur*a`.
fn ema_blend(prev: &ContentDescriptor, cur: &ContentDescriptor, alpha: f32) -> ContentDescriptor {
    let l = |p: f32, c: f32| p * (1.0 - alpha) + c * alpha;
    let band_energy = if prev.band_energy.len() == cur.band_energy.len() {
        prev.band_energy
            .iter()
            .zip(cur.band_energy.iter())
            .map(|(&p, &c)| l(p, c))
            .collect()
    } else {
        cur.band_energy.clone()
    };

    ContentDescriptor {
        rms_energy: l(prev.rms_energy, cur.rms_energy),
        peak_energy: l(prev.peak_energy, cur.peak_energy),
        integrated_loudness_lufs: l(prev.integrated_loudness_lufs, cur.integrated_loudness_lufs),
        crest_factor_db: l(prev.crest_factor_db, cur.crest_factor_db),
        spectral_centroid_hz: l(prev.spectral_centroid_hz, cur.spectral_centroid_hz),
        spectral_rolloff_hz: l(prev.spectral_rolloff_hz, cur.spectral_rolloff_hz),
        spectral_flux: l(prev.spectral_flux, cur.spectral_flux),
        band_energy,
        stereo_width: l(prev.stereo_width, cur.stereo_width),
        zero_crossing_rate: l(prev.zero_crossing_rate, cur.zero_crossing_rate),
        attack_time_ms: l(prev.attack_time_ms, cur.attack_time_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_canonical_descriptor() {
        let buf = AudioBuffer::mono(vec![0.0; 4096], 44100);
        let d = ContentAnalyzer::new().analyze(&buf, None);
        assert_eq!(d.rms_energy, 0.0);
        assert_eq!(d.peak_energy, 0.0);
        assert_eq!(d.crest_factor_db, 0.0);
        assert_eq!(d.spectral_centroid_hz, 0.0);
    }

    #[test]
    fn tone_produces_finite_nonzero_descriptor() {
        let sr = 44100u32;
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.5)
            .collect();
        let buf = AudioBuffer::mono(samples, sr);
        let d = ContentAnalyzer::new().analyze(&buf, None);
        assert!(d.is_finite());
        assert!(d.rms_energy > 0.0);
        assert!(d.peak_energy > 0.0);
        let sum: f32 = d.band_energy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-2);
    }

    #[test]
    fn stereo_opposite_channels_report_full_width() {
        let sr = 44100u32;
        let left = vec![0.4f32; 4096];
        let right = vec![-0.4f32; 4096];
        let buf = AudioBuffer::new(vec![left, right], sr);
        let d = ContentAnalyzer::new().analyze(&buf, None);
        assert!(d.stereo_width > 1.5);
    }

    #[test]
    fn history_accumulates_spectral_flux_and_ema() {
        let sr = 44100u32;
        let mut history = AnalysisHistory::new();
        let analyzer = ContentAnalyzer::new();

        let quiet: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.01).sin() * 0.1).collect();
        let loud: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.2).sin() * 0.8).collect();

        let d1 = analyzer.analyze(&AudioBuffer::mono(quiet, sr), Some(&mut history));
        assert_eq!(d1.spectral_flux, 0.0);

        let d2 = analyzer.analyze(&AudioBuffer::mono(loud, sr), Some(&mut history));
        assert!(d2.spectral_flux >= 0.0);
        assert!(history.ema.is_some());
    }

    #[test]
    fn single_sample_input_is_safe() {
        let buf = AudioBuffer::mono(vec![0.3], 44100);
        let d = ContentAnalyzer::new().analyze(&buf, None);
        assert!(d.is_finite());
    }
}
