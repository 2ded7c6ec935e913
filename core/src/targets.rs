/// Continuous Target Generator: maps a `ContentDescriptor` into
/// `ProcessingTargets` without any categorical/genre decision.
///
/// Pure function of its inputs — identical input produces identical
/// output. Any invalid descriptor (NaN, out-of-range) is a caller bug;
/// debug builds assert on it rather than silently coping.
use crate::fingerprint::MasteringFingerprint;
use crate::paramspace::Calibration;
use crate::types::{ContentDescriptor, ParameterSpaceOffset, ParameterSpacePoint, ProcessingTargets};

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub preserve_character: f32,
    pub intent: ParameterSpaceOffset,
    /// How strongly a track-level fingerprint stabilizes the per-chunk
    /// position, 0 = ignore fingerprint entirely.
    pub fingerprint_weight: f32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self { preserve_character: 0.7, intent: ParameterSpaceOffset::default(), fingerprint_weight: 0.3 }
    }
}

pub struct ContinuousTargetGenerator {
    calibration: Calibration,
}

impl ContinuousTargetGenerator {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn generate(
        &self,
        descriptor: &ContentDescriptor,
        fingerprint: Option<&MasteringFingerprint>,
        options: &GeneratorOptions,
    ) -> ProcessingTargets {
        debug_assert!(descriptor.is_finite(), "target generator requires a finite descriptor");

        let mut source = self.calibration.project(descriptor);
        if let (Some(fp), w) = (fingerprint, options.fingerprint_weight.clamp(0.0, 1.0)) {
            if w > 0.0 {
                source = source.lerp(&fingerprint_position(fp), w);
            }
        }

        // Step 1 of the target-position computation: inverse loudness-
        // dynamics relation (Pearson ~ -0.85; endpoints fixed, interior
        // monotone by construction).
        let mut target = inverse_loudness_dynamics(source);

        // Mid-dominance preservation.
        if source.mid_pct > 0.55 && source.dynamic_range > 0.65 {
            let lo = source.bass_mid_ratio - 0.2;
            let hi = source.bass_mid_ratio + 0.2;
            target.bass_mid_ratio = target.bass_mid_ratio.clamp(lo, hi);
        }

        // Hard content rules (first match wins).
        let rule = HardRule::select(source);
        target.input_level = (target.input_level + rule.lufs_bias).clamp(0.0, 1.0);
        target.dynamic_range = (target.dynamic_range + rule.crest_bias).clamp(0.0, 1.0);

        // Blend with source, then apply the intent offset.
        let blended = source.lerp(&target, 1.0 - options.preserve_character.clamp(0.0, 1.0));
        let final_point = blended.add_offset(&options.intent);

        let target_lufs = self.calibration.unproject_lufs(final_point.input_level);

        let eq_gains_db = eq_gains(&descriptor.band_energy, final_point);

        let compression_amount = rule.compression_amount;
        let expansion_amount = rule.expansion_amount;

        let (compression_ratio, threshold_dbfs, attack_ms, release_ms, makeup_gain_db) = if compression_amount > 0.0 {
            let ratio = 1.0 + 3.0 * compression_amount;
            let threshold = target_lufs - 4.0;
            let makeup = threshold.abs() * (1.0 - 1.0 / ratio);
            (ratio, threshold, 3.0, 100.0, makeup)
        } else if expansion_amount > 0.0 {
            let ratio = 1.0 + expansion_amount;
            let threshold = target_lufs + 3.0;
            (ratio, threshold, 3.0, 100.0, 0.0)
        } else {
            (1.0, target_lufs - 4.0, 3.0, 100.0, 0.0)
        };

        let target_stereo_width = stereo_width_target(descriptor.stereo_width, source.input_level, options.preserve_character);

        ProcessingTargets {
            target_lufs,
            target_peak_dbfs: -0.1,
            eq_gains_db,
            compression_amount,
            expansion_amount,
            compression_ratio,
            threshold_dbfs,
            attack_ms,
            release_ms,
            makeup_gain_db,
            target_stereo_width,
            preserve_character: options.preserve_character.clamp(0.0, 1.0),
        }
    }
}

fn fingerprint_position(fp: &MasteringFingerprint) -> ParameterSpacePoint {
    let d = &fp.dimensions;
    let cal = Calibration::default();
    let mut descriptor = ContentDescriptor::silence();
    descriptor.integrated_loudness_lufs = d.lufs;
    descriptor.crest_factor_db = d.crest_db;
    descriptor.band_energy = vec![
        d.sub_bass, d.sub_bass, d.bass, d.low_mid, d.mid, d.mid, d.mid, d.mid, d.upper_mid, d.upper_mid,
        d.presence, d.presence, d.air, d.air, d.air, d.air, d.air, d.air, d.air, d.air, d.air, d.air, d.air,
        d.air, d.air,
    ];
    let total: f32 = descriptor.band_energy.iter().sum();
    if total > 1e-6 {
        for b in descriptor.band_energy.iter_mut() {
            *b /= total;
        }
    }
    cal.project(&descriptor)
}

fn inverse_loudness_dynamics(source: ParameterSpacePoint) -> ParameterSpacePoint {
    let dr_push = (0.5 - source.input_level) * 0.4;
    let lufs_push = (source.dynamic_range - 0.5) * 0.4;
    ParameterSpacePoint {
        input_level: (source.input_level + lufs_push).clamp(0.0, 1.0),
        dynamic_range: (source.dynamic_range + dr_push).clamp(0.0, 1.0),
        ..source
    }
}

struct HardRule {
    compression_amount: f32,
    expansion_amount: f32,
    lufs_bias: f32,
    crest_bias: f32,
}

impl HardRule {
    fn select(source: ParameterSpacePoint) -> Self {
        let il = source.input_level;
        let dr = source.dynamic_range;

        if il < 0.5 && dr >= 0.5 {
            Self { compression_amount: 0.0, expansion_amount: 0.0, lufs_bias: 0.15, crest_bias: 0.05 }
        } else if il > 0.85 && (0.45..0.6).contains(&dr) {
            Self { compression_amount: 0.42, expansion_amount: 0.0, lufs_bias: 0.05, crest_bias: 0.0 }
        } else if il > 0.85 && dr < 0.45 {
            Self { compression_amount: 0.0, expansion_amount: 0.7, lufs_bias: -0.05, crest_bias: 0.08 }
        } else if il > 0.7 && il <= 0.85 && dr >= 0.6 {
            Self { compression_amount: 0.0, expansion_amount: 0.4, lufs_bias: 0.0, crest_bias: 0.03 }
        } else if dr > 0.9 {
            Self { compression_amount: 0.85, expansion_amount: 0.0, lufs_bias: 0.1, crest_bias: 0.0 }
        } else {
            Self { compression_amount: 0.3, expansion_amount: 0.0, lufs_bias: 0.02, crest_bias: 0.0 }
        }
    }
}

/// Per-band EQ gains, clamped to +/-12 dB, with a psychoacoustic masking
/// guard: bands whose source energy falls below a simplified Zwicker
/// spreading threshold (neighbors masking them) get half the computed
/// gain, since the ear can't resolve a correction there anyway.
fn eq_gains(source_band_energy: &[f32], target: ParameterSpacePoint) -> Vec<f32> {
    let n = source_band_energy.len();
    if n == 0 {
        return Vec::new();
    }
    let bass_bands = 3.min(n);
    let mid_bands_end = 12.min(n);

    let source_bass: f32 = source_band_energy[..bass_bands].iter().sum();
    let source_mid: f32 = source_band_energy[bass_bands..mid_bands_end].iter().sum();
    let source_other = (1.0 - source_bass - source_mid).max(0.0);

    let target_bass = target.bass_pct;
    let target_mid = target.mid_pct;
    let target_other = (1.0 - target_bass - target_mid).max(0.0);

    let scale = |src: f32, dst: f32| if src > 1e-6 { dst / src } else { 1.0 };
    let bass_scale = scale(source_bass, target_bass);
    let mid_scale = scale(source_mid, target_mid);
    let other_scale = scale(source_other, target_other);

    let target_band_energy: Vec<f32> = source_band_energy
        .iter()
        .enumerate()
        .map(|(i, &e)| {
            let s = if i < bass_bands {
                bass_scale
            } else if i < mid_bands_end {
                mid_scale
            } else {
                other_scale
            };
            e * s
        })
        .collect();

    (0..n)
        .map(|b| {
            let src = source_band_energy[b].max(1e-6);
            let dst = target_band_energy[b].max(1e-6);
            let mut gain_db = (20.0 * (dst / src).log10()).clamp(-12.0, 12.0);

            let left = if b > 0 { source_band_energy[b - 1] } else { 0.0 };
            let right = if b + 1 < n { source_band_energy[b + 1] } else { 0.0 };
            let masking_threshold = 0.25 * left.max(right);
            if source_band_energy[b] < masking_threshold {
                gain_db *= 0.5;
            }
            gain_db
        })
        .collect()
}

/// Target stereo width: nudges toward a touch wider than source when the
/// generator isn't mostly preserving character, clamped to [0.5, 1.5] and
/// capped at +0.3 over current width for already-loud material (a large
/// side-channel boost on loud material would itself risk clipping).
fn stereo_width_target(current_width: f32, input_level: f32, preserve_character: f32) -> f32 {
    let nominal = 1.0 + 0.1 * (1.0 - preserve_character.clamp(0.0, 1.0));
    let mut target = nominal.clamp(0.5, 1.5);
    if input_level > 0.8 && target > current_width {
        target = target.min(current_width + 0.3);
    }
    target.clamp(0.5, 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with(lufs: f32, crest_db: f32) -> ContentDescriptor {
        let mut d = ContentDescriptor::silence();
        d.integrated_loudness_lufs = lufs;
        d.crest_factor_db = crest_db;
        d.rms_energy = 0.2;
        d.peak_energy = 0.5;
        d
    }

    #[test]
    fn is_pure_function_of_its_inputs() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let d = descriptor_with(-14.0, 10.0);
        let opts = GeneratorOptions::default();
        let t1 = gen.generate(&d, None, &opts);
        let t2 = gen.generate(&d, None, &opts);
        assert_eq!(t1.target_lufs, t2.target_lufs);
        assert_eq!(t1.eq_gains_db, t2.eq_gains_db);
    }

    #[test]
    fn quiet_dynamic_content_is_lifted_with_no_dynamics_processing() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let d = descriptor_with(-26.0, 18.0); // input_level low, dynamic_range high
        let t = gen.generate(&d, None, &GeneratorOptions::default());
        assert_eq!(t.compression_amount, 0.0);
        assert_eq!(t.expansion_amount, 0.0);
    }

    #[test]
    fn heavily_compressed_loud_input_triggers_expansion() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let d = descriptor_with(-9.0, 7.0); // loud, low dynamic range
        let t = gen.generate(&d, None, &GeneratorOptions::default());
        assert!(t.expansion_amount > 0.0);
        assert_eq!(t.compression_amount, 0.0);
    }

    #[test]
    fn extreme_dynamic_range_triggers_heavy_compression() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let mut d = descriptor_with(-18.0, 24.0);
        d.crest_factor_db = 24.0;
        let t = gen.generate(&d, None, &GeneratorOptions::default());
        assert!(t.compression_amount >= 0.6);
    }

    #[test]
    fn preserve_character_one_keeps_target_lufs_close_to_source() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let d = descriptor_with(-14.0, 10.0);
        let opts = GeneratorOptions { preserve_character: 1.0, ..GeneratorOptions::default() };
        let t = gen.generate(&d, None, &opts);
        let cal = Calibration::default();
        let source_lufs = cal.unproject_lufs(cal.project(&d).input_level);
        assert!((t.target_lufs - source_lufs).abs() < 0.5);
    }

    #[test]
    fn eq_gains_are_bounded() {
        let gen = ContinuousTargetGenerator::new(Calibration::default());
        let mut d = descriptor_with(-10.0, 6.0);
        d.band_energy = {
            let mut v = vec![0.001; 25];
            v[0] = 1.0 - 0.001 * 24.0;
            v
        };
        let t = gen.generate(&d, None, &GeneratorOptions::default());
        assert!(t.eq_gains_db.iter().all(|&g| (-12.0..=12.0).contains(&g)));
    }

    #[test]
    fn stereo_width_never_exceeds_cap_for_loud_material() {
        let w = stereo_width_target(0.9, 0.95, 0.2);
        assert!(w <= 0.9 + 0.3 + 1e-6);
    }
}
