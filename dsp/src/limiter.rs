/// Peak-Normalizing Soft Limiter
///
/// Two-step normalization: an optional pre-boost toward a target loudness
/// when there's headroom, then a peak-normalizing scale with a tanh soft
/// knee in the last few dB before the ceiling so the output never hard
/// clips. Keeps the lookahead/ISR/oversampling machinery of the original
/// brick-wall limiter; the soft-knee final stage is new.
use crate::envelope::{EnvelopeConfig, EnvelopeFollower};
use crate::meters::{integrated_lufs, peak as peak_level};
use std::collections::VecDeque;

/// Configuration for limiter
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub sample_rate: usize,
    /// Final peak ceiling in dBFS (typically -0.1).
    pub threshold_db: f32,
    pub release_ms: f32,
    pub lookahead_ms: f32,
    pub isr_enabled: bool,
    pub oversampling: usize, // 1 (off), 2, or 4
    /// Width of the soft-knee region below `threshold_db`, in dB.
    pub knee_db: f32,
    /// If set, the limiter first tries to bring the buffer's integrated
    /// loudness up to this target (only when doing so doesn't already
    /// exceed the peak ceiling by more than the knee allows).
    pub pre_boost_target_lufs: Option<f32>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            threshold_db: -0.1,
            release_ms: 50.0,
            lookahead_ms: 5.0,
            isr_enabled: true,
            oversampling: 1,
            knee_db: 3.0,
            pre_boost_target_lufs: None,
        }
    }
}

/// Limiting statistics
#[derive(Debug, Clone)]
pub struct LimitingInfo {
    pub input_peak_db: f32,
    pub output_peak_db: f32,
    pub gain_reduction_db: f32,
    pub pre_boost_db: f32,
    pub threshold_db: f32,
    pub peak_hold_db: f32,
}

/// Adaptive Limiter
pub struct Limiter {
    config: LimiterConfig,
    gain_smoother: EnvelopeFollower,
    lookahead_buffer: VecDeque<f32>,
    lookahead_samples: usize,
    current_gain: f32,
    peak_hold: f32,
}

impl Limiter {
    pub fn new(config: LimiterConfig) -> Self {
        let gain_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: 0.1,
            release_ms: config.release_ms,
        };
        let gain_smoother = EnvelopeFollower::new(&gain_config);

        let lookahead_samples = (config.lookahead_ms * config.sample_rate as f32 / 1000.0) as usize;
        let lookahead_buffer = VecDeque::with_capacity(lookahead_samples);

        Self {
            config,
            gain_smoother,
            lookahead_buffer,
            lookahead_samples,
            current_gain: 1.0,
            peak_hold: 0.0,
        }
    }

    fn apply_lookahead_delay(&mut self, audio: &[f32]) -> Vec<f32> {
        let mut delayed_audio = Vec::with_capacity(audio.len());
        for &sample in audio {
            self.lookahead_buffer.push_back(sample);
            if self.lookahead_buffer.len() > self.lookahead_samples {
                delayed_audio.push(self.lookahead_buffer.pop_front().unwrap());
            } else {
                delayed_audio.push(0.0);
            }
        }
        delayed_audio
    }

    fn detect_isr_peaks(&self, audio: &[f32]) -> f32 {
        if audio.len() < 2 {
            return audio.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        }
        let sample_peaks = peak_level(audio);
        let mut interp_peaks = 0.0f32;
        for i in 0..audio.len() - 1 {
            let interpolated = (audio[i] + audio[i + 1]) / 2.0;
            interp_peaks = interp_peaks.max(interpolated.abs());
        }
        sample_peaks.max(interp_peaks)
    }

    fn oversample(&self, audio: &[f32]) -> Vec<f32> {
        let factor = self.config.oversampling;
        if factor <= 1 {
            return audio.to_vec();
        }
        let mut oversampled = vec![0.0; audio.len() * factor];
        for (i, &sample) in audio.iter().enumerate() {
            oversampled[i * factor] = sample;
        }
        let kernel_size = factor * 2 + 1;
        let kernel_weight = 1.0 / kernel_size as f32;
        let mut filtered = vec![0.0; oversampled.len()];
        for i in 0..oversampled.len() {
            let start = i.saturating_sub(kernel_size / 2);
            let end = (i + kernel_size / 2 + 1).min(oversampled.len());
            filtered[i] = oversampled[start..end].iter().sum::<f32>() * kernel_weight * factor as f32;
        }
        filtered
    }

    fn downsample(&self, audio_os: &[f32]) -> Vec<f32> {
        let factor = self.config.oversampling;
        if factor <= 1 {
            return audio_os.to_vec();
        }
        audio_os.iter().step_by(factor).copied().collect()
    }

    /// Pre-boost stage: if the buffer is more than 0.5 dB below the target
    /// loudness and boosting wouldn't itself exceed the ceiling, scale up
    /// toward the target first. Returns (buffer, applied_boost_db).
    fn apply_pre_boost(&self, audio: &[f32]) -> (Vec<f32>, f32) {
        let Some(target_lufs) = self.config.pre_boost_target_lufs else {
            return (audio.to_vec(), 0.0);
        };
        if audio.is_empty() {
            return (audio.to_vec(), 0.0);
        }

        let current_lufs = integrated_lufs(audio, self.config.sample_rate as u32, 1);
        let deficit = target_lufs - current_lufs;
        if deficit <= 0.5 {
            return (audio.to_vec(), 0.0);
        }

        let threshold_linear = 10.0f32.powf(self.config.threshold_db / 20.0);
        let current_peak = peak_level(audio).max(1e-10);
        let headroom_db = 20.0 * (threshold_linear / current_peak).log10();
        let boost_db = deficit.min(headroom_db.max(0.0));
        if boost_db <= 0.0 {
            return (audio.to_vec(), 0.0);
        }

        let gain = 10.0f32.powf(boost_db / 20.0);
        (audio.iter().map(|&s| s * gain).collect(), boost_db)
    }

    /// Tanh soft knee: samples within `knee_db` of the ceiling are shaped
    /// so the output asymptotically approaches, but never exceeds, the
    /// ceiling. C¹-continuous, monotone, odd, derivative 1 at the origin.
    fn soft_knee_sample(&self, x: f32, ceiling: f32) -> f32 {
        let knee_start = ceiling * 10.0f32.powf(-self.config.knee_db / 20.0);
        let ax = x.abs();
        if ax <= knee_start || knee_start <= 0.0 {
            return x;
        }
        let span = ceiling - knee_start;
        if span <= 0.0 {
            return x.signum() * ceiling;
        }
        let over = (ax - knee_start) / span;
        let shaped = knee_start + span * over.tanh();
        x.signum() * shaped.min(ceiling)
    }

    fn process_core(&mut self, audio: &[f32]) -> (Vec<f32>, LimitingInfo) {
        let threshold_linear = 10.0f32.powf(self.config.threshold_db / 20.0);

        let (boosted, pre_boost_db) = self.apply_pre_boost(audio);
        let delayed_audio = self.apply_lookahead_delay(&boosted);

        let peak_level_measured = if self.config.isr_enabled {
            self.detect_isr_peaks(&boosted)
        } else {
            peak_level(&boosted)
        };

        let required_gain = if peak_level_measured > threshold_linear {
            threshold_linear / peak_level_measured
        } else {
            1.0
        };

        let smoothed_gain = self.gain_smoother.process(required_gain);
        self.current_gain = smoothed_gain;

        let limited_audio: Vec<f32> = delayed_audio
            .iter()
            .map(|&sample| {
                let scaled = sample * smoothed_gain;
                self.soft_knee_sample(scaled, threshold_linear)
            })
            .collect();

        let output_peak = peak_level(&limited_audio);
        self.peak_hold = (self.peak_hold * 0.999).max(output_peak);

        let info = LimitingInfo {
            input_peak_db: 20.0 * peak_level_measured.max(1e-10).log10(),
            output_peak_db: 20.0 * output_peak.max(1e-10).log10(),
            gain_reduction_db: 20.0 * smoothed_gain.max(1e-10).log10(),
            pre_boost_db,
            threshold_db: self.config.threshold_db,
            peak_hold_db: 20.0 * self.peak_hold.max(1e-10).log10(),
        };

        (limited_audio, info)
    }

    /// Process audio through limiter.
    pub fn process(&mut self, audio: &[f32]) -> (Vec<f32>, LimitingInfo) {
        if audio.is_empty() {
            return (
                Vec::new(),
                LimitingInfo {
                    input_peak_db: -100.0,
                    output_peak_db: -100.0,
                    gain_reduction_db: 0.0,
                    pre_boost_db: 0.0,
                    threshold_db: self.config.threshold_db,
                    peak_hold_db: -100.0,
                },
            );
        }

        if self.config.oversampling > 1 {
            let audio_os = self.oversample(audio);
            let (processed_os, limit_info) = self.process_core(&audio_os);
            let processed_audio = self.downsample(&processed_os);
            (processed_audio, limit_info)
        } else {
            self.process_core(audio)
        }
    }

    pub fn reset(&mut self) {
        self.gain_smoother.reset();
        self.current_gain = 1.0;
        self.peak_hold = 0.0;
        self.lookahead_buffer.clear();
    }

    pub fn get_state(&self) -> (f32, f32) {
        (self.current_gain, self.peak_hold)
    }
}

/// Convenience function for one-shot limiting.
pub fn limit(audio: &[f32], config: &LimiterConfig) -> (Vec<f32>, LimitingInfo) {
    let mut limiter = Limiter::new(config.clone());
    limiter.process(audio)
}
