/// Stereo Width stage: mid/side decomposition, side channel scaled by
/// `target_width / current_width` (already hard-capped upstream by the
/// target generator for loud material), L/R recomposed. Mono input (or a
/// buffer with fewer than two channels) passes through untouched.
use mastering_dsp::compute_phase_correlation;

pub fn apply_stereo_width(left: &[f32], right: &[f32], target_width: f32) -> (Vec<f32>, Vec<f32>) {
    if left.len() != right.len() || left.is_empty() {
        return (left.to_vec(), right.to_vec());
    }

    let corr = compute_phase_correlation(left, right);
    let current_width = (1.0 - corr).clamp(0.0, 2.0);

    // Current width near zero (mono/fully correlated) can't be scaled
    // multiplicatively toward a wider target; treat as already-minimal.
    if current_width < 1e-3 {
        return (left.to_vec(), right.to_vec());
    }

    let side_scale = (target_width / current_width).clamp(0.0, 4.0);

    let mut out_l = Vec::with_capacity(left.len());
    let mut out_r = Vec::with_capacity(left.len());
    for (&l, &r) in left.iter().zip(right.iter()) {
        let mid = (l + r) * 0.5;
        let side = (l - r) * 0.5 * side_scale;
        out_l.push(mid + side);
        out_r.push(mid - side);
    }
    (out_l, out_r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_signal_is_unchanged_by_narrowing() {
        let l = vec![0.3f32; 1000];
        let r = vec![0.3f32; 1000];
        let (out_l, out_r) = apply_stereo_width(&l, &r, 1.5);
        assert_eq!(out_l, l);
        assert_eq!(out_r, r);
    }

    #[test]
    fn mismatched_lengths_pass_through() {
        let l = vec![0.1f32; 10];
        let r = vec![0.1f32; 5];
        let (out_l, out_r) = apply_stereo_width(&l, &r, 1.0);
        assert_eq!(out_l, l);
        assert_eq!(out_r, r);
    }

    #[test]
    fn narrowing_reduces_channel_difference() {
        let l: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let r: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.05 + 0.3).sin() * 0.5).collect();
        let (nl, nr) = apply_stereo_width(&l, &r, 0.3);

        let diff_before: f32 = l.iter().zip(r.iter()).map(|(&a, &b)| (a - b).abs()).sum();
        let diff_after: f32 = nl.iter().zip(nr.iter()).map(|(&a, &b)| (a - b).abs()).sum();
        assert!(diff_after < diff_before);
    }

    #[test]
    fn outputs_stay_finite() {
        let l: Vec<f32> = (0..500).map(|i| (i as f32 * 0.1).sin()).collect();
        let r: Vec<f32> = (0..500).map(|i| (i as f32 * 0.13).cos()).collect();
        let (nl, nr) = apply_stereo_width(&l, &r, 1.8);
        assert!(nl.iter().all(|s| s.is_finite()));
        assert!(nr.iter().all(|s| s.is_finite()));
    }
}
