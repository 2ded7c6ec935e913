/// Adaptive Expander
///
/// Upward compression: samples above `threshold` are amplified rather than
/// attenuated, used for "de-mastering" heavily limited material back toward
/// a more dynamic target. Mirrors `Compressor`'s envelope-follower-driven
/// gain-smoothing design, inverted in sign.
use crate::envelope::{EnvelopeConfig, EnvelopeFollower};

/// Configuration for expander
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    pub sample_rate: usize,
    pub threshold_db: f32,
    /// Output dB gained per dB above threshold, beyond unity. `ratio = 1.4`
    /// means a sample 1 dB over threshold is boosted by 0.4 dB.
    pub ratio: f32,
    pub knee_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            threshold_db: -6.0,
            ratio: 1.4,
            knee_db: 6.0,
            attack_ms: 3.0,
            release_ms: 100.0,
        }
    }
}

/// Expansion statistics
#[derive(Debug, Clone)]
pub struct ExpansionInfo {
    pub input_level_db: f32,
    pub gain_boost_db: f32,
    pub output_gain: f32,
    pub threshold_db: f32,
    pub ratio: f32,
}

/// Adaptive Expander (upward compression)
pub struct Expander {
    config: ExpanderConfig,
    level_follower: EnvelopeFollower,
    gain_follower: EnvelopeFollower,
    gain_boost: f32,
}

impl Expander {
    pub fn new(config: ExpanderConfig) -> Self {
        let level_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: 0.1,
            release_ms: 1.0,
        };
        let gain_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: config.attack_ms,
            release_ms: config.release_ms,
        };

        Self {
            level_follower: EnvelopeFollower::new(&level_config),
            gain_follower: EnvelopeFollower::new(&gain_config),
            gain_boost: 0.0,
            config,
        }
    }

    /// Boost in dB for a given input level, soft-knee around the threshold.
    fn calculate_gain_boost(&self, level_db: f32) -> f32 {
        let threshold = self.config.threshold_db;
        let ratio = self.config.ratio;
        let knee = self.config.knee_db;

        if level_db <= threshold - knee / 2.0 {
            0.0
        } else if level_db >= threshold + knee / 2.0 {
            let over_threshold = level_db - threshold;
            over_threshold * (ratio - 1.0)
        } else {
            let over_threshold = level_db - threshold + knee / 2.0;
            let knee_ratio = over_threshold / knee;
            let soft_ratio = 1.0 + knee_ratio * (ratio - 1.0);
            over_threshold * (soft_ratio - 1.0)
        }
    }

    /// Process audio through the expander.
    pub fn process(&mut self, audio: &[f32]) -> (Vec<f32>, ExpansionInfo) {
        if audio.is_empty() {
            return (
                Vec::new(),
                ExpansionInfo {
                    input_level_db: -100.0,
                    gain_boost_db: 0.0,
                    output_gain: 1.0,
                    threshold_db: self.config.threshold_db,
                    ratio: self.config.ratio,
                },
            );
        }

        let peak_level = audio.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        let smoothed_level = self.level_follower.process(peak_level);
        let input_level_db = 20.0 * smoothed_level.max(1e-10).log10();

        let target_boost = self.calculate_gain_boost(input_level_db);
        let smoothed_boost = self.gain_follower.process(target_boost);
        self.gain_boost = smoothed_boost;

        let gain_linear = 10.0f32.powf(smoothed_boost / 20.0);
        let processed: Vec<f32> = audio.iter().map(|&s| s * gain_linear).collect();

        let info = ExpansionInfo {
            input_level_db,
            gain_boost_db: smoothed_boost,
            output_gain: gain_linear,
            threshold_db: self.config.threshold_db,
            ratio: self.config.ratio,
        };

        (processed, info)
    }

    /// Updates tunable parameters in place, leaving both envelope
    /// followers untouched so gain-boost state carries over the chunk
    /// boundary that triggered the retune.
    pub fn set_config(&mut self, config: ExpanderConfig) {
        self.gain_follower.set_times(config.attack_ms, config.release_ms, config.sample_rate);
        self.config = config;
    }

    pub fn reset(&mut self) {
        self.level_follower.reset();
        self.gain_follower.reset();
        self.gain_boost = 0.0;
    }

    pub fn get_state(&self) -> f32 {
        self.gain_boost
    }
}

/// Convenience function for one-shot expansion.
pub fn expand(audio: &[f32], config: &ExpanderConfig) -> (Vec<f32>, ExpansionInfo) {
    let mut expander = Expander::new(config.clone());
    expander.process(audio)
}
