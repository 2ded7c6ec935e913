/// Adaptive Pipeline: applies a `ProcessingTargets` to an `AudioBuffer` in
/// the fixed stage order (EQ, Dynamics, Stereo Width, Limiter). Silence
/// short-circuits every stage except the limiter's final scale, which is
/// itself skipped for silence (silence stays silence). A stage producing
/// a non-finite or out-of-range sample is soft-clipped to `[-1, 1]` with a
/// warning rather than aborting the chunk.
mod dynamics;
mod eq;
mod limiter_stage;
mod stereo_width;

pub use dynamics::{DynamicsChoice, DynamicsState};

use crate::types::{AudioBuffer, ProcessingTargets};

pub struct AdaptivePipeline {
    dynamics: DynamicsState,
}

impl AdaptivePipeline {
    pub fn new(sample_rate: u32) -> Self {
        Self { dynamics: DynamicsState::new(sample_rate) }
    }

    /// Resets the carried-over dynamics envelope state, e.g. when starting
    /// a new track in a reused pipeline instance.
    pub fn reset(&mut self) {
        self.dynamics.reset();
    }

    pub fn process(&mut self, buffer: &AudioBuffer, targets: &ProcessingTargets) -> AudioBuffer {
        if buffer.is_empty() || buffer.is_silent() {
            return buffer.clone();
        }

        let mut eq_channels = Vec::with_capacity(buffer.channels.len());
        let mut peak_after_eq = 0.0f32;
        for ch in &buffer.channels {
            let (y, peak) = eq::apply_eq(ch, &targets.eq_gains_db, buffer.sample_rate);
            peak_after_eq = peak_after_eq.max(peak);
            eq_channels.push(soft_clip(y, "eq"));
        }
        tracing::debug!(peak_after_eq, "psychoacoustic EQ stage complete");

        let dyn_channels: Vec<Vec<f32>> = self
            .dynamics
            .process(&eq_channels, targets)
            .into_iter()
            .map(|c| soft_clip(c, "dynamics"))
            .collect();

        let width_channels = if dyn_channels.len() >= 2 {
            let (l, r) = stereo_width::apply_stereo_width(&dyn_channels[0], &dyn_channels[1], targets.target_stereo_width);
            let mut out = vec![soft_clip(l, "stereo_width"), soft_clip(r, "stereo_width")];
            out.extend(dyn_channels.into_iter().skip(2));
            out
        } else {
            dyn_channels
        };

        let limited_channels: Vec<Vec<f32>> = width_channels
            .iter()
            .map(|c| {
                let (out, output_peak_db) = limiter_stage::apply_limiter(c, targets.target_lufs, targets.target_peak_dbfs, buffer.sample_rate);
                tracing::trace!(output_peak_db, "limiter stage complete for channel");
                soft_clip(out, "limiter")
            })
            .collect();

        AudioBuffer::new(limited_channels, buffer.sample_rate)
    }
}

fn soft_clip(x: Vec<f32>, stage: &'static str) -> Vec<f32> {
    let mut clipped = false;
    let out = x
        .into_iter()
        .map(|s| {
            if !s.is_finite() {
                clipped = true;
                0.0
            } else if s > 1.0 || s < -1.0 {
                clipped = true;
                s.clamp(-1.0, 1.0)
            } else {
                s
            }
        })
        .collect();
    if clipped {
        tracing::warn!(stage, "numerical overflow soft-clipped to [-1, 1]");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessingTargets;

    fn identity_targets() -> ProcessingTargets {
        ProcessingTargets {
            target_lufs: -14.0,
            target_peak_dbfs: -0.1,
            eq_gains_db: vec![0.0; mastering_dsp::BARK_BAND_COUNT],
            compression_amount: 0.0,
            expansion_amount: 0.0,
            compression_ratio: 1.0,
            threshold_dbfs: -18.0,
            attack_ms: 3.0,
            release_ms: 100.0,
            makeup_gain_db: 0.0,
            target_stereo_width: 1.0,
            preserve_character: 0.7,
        }
    }

    #[test]
    fn silence_stays_silence() {
        let buf = AudioBuffer::mono(vec![0.0; 4096], 44100);
        let mut pipeline = AdaptivePipeline::new(44100);
        let out = pipeline.process(&buf, &identity_targets());
        assert!(out.channels[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tone_survives_the_full_chain_finite_and_bounded() {
        let sr = 44100u32;
        let samples: Vec<f32> = (0..sr as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.5)
            .collect();
        let buf = AudioBuffer::new(vec![samples.clone(), samples], sr);
        let mut pipeline = AdaptivePipeline::new(sr);
        let out = pipeline.process(&buf, &identity_targets());

        assert_eq!(out.num_channels(), 2);
        for ch in &out.channels {
            assert!(ch.iter().all(|s| s.is_finite()));
            let peak = ch.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
            assert!(peak <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn reset_clears_dynamics_envelope_state() {
        let mut pipeline = AdaptivePipeline::new(44100);
        let buf = AudioBuffer::mono(vec![0.7; 4096], 44100);
        let mut t = identity_targets();
        t.compression_amount = 0.5;
        t.compression_ratio = 3.0;
        let _ = pipeline.process(&buf, &t);
        pipeline.reset();
        // Should not panic and should produce a finite result from fresh state.
        let out = pipeline.process(&buf, &t);
        assert!(out.channels[0].iter().all(|s| s.is_finite()));
    }
}
