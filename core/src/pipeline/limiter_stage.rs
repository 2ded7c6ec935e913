/// Peak-normalizing soft-limiter stage: pre-boost toward `target_lufs`
/// when there's headroom, then scale so the final peak lands at
/// `target_peak_dbfs`, with a tanh soft knee in the last 3 dB.
use mastering_dsp::limiter::{Limiter, LimiterConfig};

pub fn apply_limiter(x: &[f32], target_lufs: f32, target_peak_dbfs: f32, sample_rate: u32) -> (Vec<f32>, f32) {
    let config = LimiterConfig {
        sample_rate: sample_rate as usize,
        threshold_db: target_peak_dbfs,
        release_ms: 50.0,
        lookahead_ms: 5.0,
        isr_enabled: true,
        oversampling: 1,
        knee_db: 3.0,
        pre_boost_target_lufs: Some(target_lufs),
    };
    let mut limiter = Limiter::new(config);
    let (out, info) = limiter.process(x);
    (out, info.output_peak_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_stays_silence() {
        let x = vec![0.0f32; 2000];
        let (out, _) = apply_limiter(&x, -14.0, -0.1, 44100);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn output_never_exceeds_ceiling() {
        let x = vec![1.3f32; 2000];
        let (out, _) = apply_limiter(&x, -14.0, -0.1, 44100);
        let threshold_linear = 10f32.powf(-0.1 / 20.0);
        let peak = out.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak <= threshold_linear + 0.001);
    }
}
