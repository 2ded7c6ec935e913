/// Loudness / peak / crest meters
///
/// `rms`/`peak`/`crest_factor_db` are the numerically-safe scalar meters the
/// rest of the crate builds on. `integrated_lufs` implements K-weighted
/// gated integrated loudness (ITU-R BS.1770 style): a two-stage K-weighting
/// filter, 400 ms blocks at 75% overlap, an absolute gate at -70 LUFS and a
/// relative gate at -10 LU below the absolute-gated mean.
use crate::biquad::{BiquadCoeffs, BiquadState};

/// Root-mean-square level. `peak = 0 ⇒ crest = 0`, never NaN.
pub fn rms(x: &[f32]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    (x.iter().map(|&s| s * s).sum::<f32>() / x.len() as f32).sqrt()
}

/// Peak absolute sample value.
pub fn peak(x: &[f32]) -> f32 {
    x.iter().map(|&s| s.abs()).fold(0.0f32, f32::max)
}

/// Crest factor in dB (peak / RMS). Numerically safe: silence yields 0 dB,
/// never a division by zero or NaN.
pub fn crest_factor_db(x: &[f32]) -> f32 {
    let p = peak(x);
    let r = rms(x);
    if r <= 1e-10 || p <= 1e-10 {
        return 0.0;
    }
    20.0 * (p / r).log10()
}

/// K-weighting pre-filter: a high-shelf stage followed by a high-pass
/// stage, approximating the ITU-R BS.1770 "K" response.
struct KWeightingFilter {
    shelf: BiquadCoeffs,
    shelf_state: BiquadState,
    highpass: BiquadCoeffs,
    highpass_state: BiquadState,
}

impl KWeightingFilter {
    fn new(sample_rate: f64) -> Self {
        Self {
            shelf: BiquadCoeffs::peaking(sample_rate, 1500.0, std::f64::consts::FRAC_1_SQRT_2, 4.0),
            shelf_state: BiquadState::default(),
            highpass: BiquadCoeffs::highpass(sample_rate, 38.0, 0.5),
            highpass_state: BiquadState::default(),
        }
    }

    fn process(&mut self, x: f64) -> f64 {
        let y1 = self.shelf.process_sample(x, &mut self.shelf_state);
        self.highpass.process_sample(y1, &mut self.highpass_state)
    }
}

/// K-weighted integrated loudness in LUFS, with absolute (-70 LUFS) and
/// relative (-10 LU) gating per ITU-R BS.1770. Silence maps to `-70.0`
/// (the absolute gate floor) rather than `-inf`, so downstream consumers
/// never have to special-case a non-finite value.
///
/// `x` is interleaved or mono; `channels` selects how samples are grouped
/// for the mean-square block computation (mono: 1, stereo: 2 interleaved).
pub fn integrated_lufs(x: &[f32], sample_rate: u32, channels: usize) -> f32 {
    let channels = channels.max(1);
    if x.is_empty() || sample_rate == 0 {
        return -70.0;
    }

    let n_frames = x.len() / channels;
    if n_frames == 0 {
        return -70.0;
    }

    // K-weight each channel independently, then sum mean-square per frame.
    let mut filters: Vec<KWeightingFilter> = (0..channels)
        .map(|_| KWeightingFilter::new(sample_rate as f64))
        .collect();

    let mut weighted = vec![0.0f64; n_frames];
    for frame in 0..n_frames {
        let mut sum_sq = 0.0;
        for ch in 0..channels {
            let s = x[frame * channels + ch] as f64;
            let filtered = filters[ch].process(s);
            sum_sq += filtered * filtered;
        }
        weighted[frame] = sum_sq;
    }

    let block_samples = (0.4 * sample_rate as f64) as usize;
    let hop_samples = (block_samples as f64 * 0.25) as usize; // 75% overlap
    if block_samples == 0 || hop_samples == 0 || n_frames < block_samples {
        let mean_sq: f64 = weighted.iter().sum::<f64>() / n_frames as f64;
        return mean_square_to_lufs(mean_sq).max(-70.0);
    }

    let mut block_loudness = Vec::new();
    let mut start = 0;
    while start + block_samples <= n_frames {
        let mean_sq: f64 =
            weighted[start..start + block_samples].iter().sum::<f64>() / block_samples as f64;
        block_loudness.push(mean_square_to_lufs(mean_sq));
        start += hop_samples;
    }

    if block_loudness.is_empty() {
        return -70.0;
    }

    // Absolute gate: discard blocks below -70 LUFS.
    let absolute_gated: Vec<f64> = block_loudness.iter().copied().filter(|&l| l > -70.0).collect();
    if absolute_gated.is_empty() {
        return -70.0;
    }
    let absolute_mean = absolute_gated.iter().sum::<f64>() / absolute_gated.len() as f64;

    // Relative gate: discard blocks more than 10 LU below the absolute-gated mean.
    let relative_threshold = absolute_mean - 10.0;
    let relative_gated: Vec<f64> = absolute_gated
        .into_iter()
        .filter(|&l| l > relative_threshold)
        .collect();

    if relative_gated.is_empty() {
        return absolute_mean.max(-70.0) as f32;
    }

    let integrated = relative_gated.iter().sum::<f64>() / relative_gated.len() as f64;
    integrated.max(-70.0) as f32
}

fn mean_square_to_lufs(mean_sq: f64) -> f64 {
    if mean_sq <= 1e-20 {
        return -70.0;
    }
    -0.691 + 10.0 * mean_sq.log10()
}
