/// Dynamics stage: compressor, expander, or passthrough, chosen once per
/// chunk and never switched mid-chunk. Envelope and gain state carry over
/// chunk boundaries (via the context-sample overlap) so there is no
/// audible attack transient at a chunk join.
use mastering_dsp::compressor::{Compressor, CompressorConfig, DetectionMode};
use mastering_dsp::expander::{Expander, ExpanderConfig};

use crate::types::ProcessingTargets;

pub enum DynamicsChoice {
    Compress,
    Expand,
    Passthrough,
}

impl DynamicsChoice {
    pub fn select(targets: &ProcessingTargets) -> Self {
        if targets.compression_amount > 0.0 {
            Self::Compress
        } else if targets.expansion_amount > 0.0 {
            Self::Expand
        } else {
            Self::Passthrough
        }
    }
}

/// Per-track dynamics state, carried across chunk boundaries. Holds both
/// a compressor and an expander so switching choice between chunks never
/// loses the other path's envelope history mid-track.
pub struct DynamicsState {
    sample_rate: usize,
    compressor: Compressor,
    expander: Expander,
}

impl DynamicsState {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as usize;
        Self {
            sample_rate,
            compressor: Compressor::new(CompressorConfig { sample_rate, ..Default::default() }),
            expander: Expander::new(ExpanderConfig { sample_rate, ..Default::default() }),
        }
    }

    pub fn reset(&mut self) {
        self.compressor.reset();
        self.expander.reset();
    }

    /// Applies the chosen dynamics stage to a (possibly stereo) buffer.
    /// Detection runs on the mid (mono-sum) signal and the resulting gain
    /// is applied identically to every channel so the stereo image never
    /// shifts under gain reduction. Reconfigures the active processor's
    /// parameters from `targets` before running; the envelope state
    /// itself, not the config, is what's carried over chunk to chunk.
    pub fn process(&mut self, channels: &[Vec<f32>], targets: &ProcessingTargets) -> Vec<Vec<f32>> {
        if channels.is_empty() {
            return Vec::new();
        }
        let choice = DynamicsChoice::select(targets);
        if matches!(choice, DynamicsChoice::Passthrough) {
            return channels.to_vec();
        }

        let mid = mix_down(channels);
        let gain = match choice {
            DynamicsChoice::Compress => {
                self.compressor_config_from(targets);
                let (_out, info) = self.compressor.process(&mid, DetectionMode::Hybrid);
                10f32.powf(info.gain_reduction_db / 20.0) * 10f32.powf(targets.makeup_gain_db / 20.0)
            }
            DynamicsChoice::Expand => {
                self.expander_config_from(targets);
                let (_out, info) = self.expander.process(&mid);
                10f32.powf(info.gain_boost_db / 20.0)
            }
            DynamicsChoice::Passthrough => unreachable!(),
        };

        channels.iter().map(|c| c.iter().map(|&s| s * gain).collect()).collect()
    }

    fn compressor_config_from(&mut self, targets: &ProcessingTargets) {
        let ratio = targets.compression_ratio.max(1.0);
        self.compressor.set_config(CompressorConfig {
            sample_rate: self.sample_rate,
            threshold_db: targets.threshold_dbfs,
            ratio,
            knee_db: 6.0,
            attack_ms: targets.attack_ms,
            release_ms: targets.release_ms,
            makeup_gain_db: targets.makeup_gain_db,
            enable_lookahead: true,
            lookahead_ms: 5.0,
        });
    }

    fn expander_config_from(&mut self, targets: &ProcessingTargets) {
        let ratio = 1.0 + targets.expansion_amount;
        self.expander.set_config(ExpanderConfig {
            sample_rate: self.sample_rate,
            threshold_db: targets.threshold_dbfs,
            ratio,
            knee_db: 6.0,
            attack_ms: targets.attack_ms,
            release_ms: targets.release_ms,
        });
    }
}

fn mix_down(channels: &[Vec<f32>]) -> Vec<f32> {
    if channels.len() == 1 {
        return channels[0].clone();
    }
    let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    (0..len)
        .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / channels.len() as f32)
        .collect()
}
