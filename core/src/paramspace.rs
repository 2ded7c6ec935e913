/// Projection between `ContentDescriptor` and the 5-D continuous
/// parameter space `(input_level, dynamic_range, bass_mid_ratio, bass_pct,
/// mid_pct)`.
///
/// Bounds are not hard-coded constants: `Calibration::default()` encodes
/// the endpoint values named in the data model (-30/-7 LUFS, 6/20 dB
/// crest), but `Calibration::from_references` derives them from a small
/// set of reference descriptors observed at generator construction, per
/// the calibration note in the data model.
use crate::types::{ContentDescriptor, ParameterSpacePoint};

#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub lufs_quiet: f32,
    pub lufs_loud: f32,
    pub crest_compressed_db: f32,
    pub crest_extreme_db: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            lufs_quiet: -30.0,
            lufs_loud: -7.0,
            crest_compressed_db: 6.0,
            crest_extreme_db: 20.0,
        }
    }
}

impl Calibration {
    /// Derive bounds from a small calibration set of reference
    /// descriptors: quiet/loud endpoints are the 10th/90th-percentile
    /// LUFS, compressed/extreme endpoints the 10th/90th-percentile crest.
    /// Falls back to `Calibration::default()` if fewer than 2 references
    /// are supplied.
    pub fn from_references(refs: &[ContentDescriptor]) -> Self {
        if refs.len() < 2 {
            return Self::default();
        }
        let mut lufs: Vec<f32> = refs.iter().map(|d| d.integrated_loudness_lufs).collect();
        let mut crest: Vec<f32> = refs.iter().map(|d| d.crest_factor_db).collect();
        lufs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        crest.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let pct = |v: &[f32], p: f32| -> f32 {
            let idx = ((v.len() - 1) as f32 * p).round() as usize;
            v[idx]
        };

        let lufs_quiet = pct(&lufs, 0.1);
        let lufs_loud = pct(&lufs, 0.9);
        let crest_compressed_db = pct(&crest, 0.1);
        let crest_extreme_db = pct(&crest, 0.9);

        if lufs_loud <= lufs_quiet || crest_extreme_db <= crest_compressed_db {
            return Self::default();
        }

        Self { lufs_quiet, lufs_loud, crest_compressed_db, crest_extreme_db }
    }

    fn normalize(v: f32, lo: f32, hi: f32) -> f32 {
        ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    fn denormalize(t: f32, lo: f32, hi: f32) -> f32 {
        lo + t.clamp(0.0, 1.0) * (hi - lo)
    }

    pub fn project(&self, d: &ContentDescriptor) -> ParameterSpacePoint {
        let input_level = Self::normalize(d.integrated_loudness_lufs, self.lufs_quiet, self.lufs_loud);
        let dynamic_range = Self::normalize(d.crest_factor_db, self.crest_compressed_db, self.crest_extreme_db);

        let bass_pct = d.band_energy.iter().take(3).sum::<f32>().clamp(0.0, 1.0);
        let mid_pct = d
            .band_energy
            .get(3..d.band_energy.len().min(12))
            .map(|s| s.iter().sum::<f32>())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        let bass_mid_ratio = if bass_pct + mid_pct > 1e-6 {
            ((bass_pct - mid_pct) / (bass_pct + mid_pct)).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        ParameterSpacePoint { input_level, dynamic_range, bass_mid_ratio, bass_pct, mid_pct }
    }

    pub fn unproject_lufs(&self, input_level: f32) -> f32 {
        Self::denormalize(input_level, self.lufs_quiet, self.lufs_loud)
    }

    pub fn unproject_crest_db(&self, dynamic_range: f32) -> f32 {
        Self::denormalize(dynamic_range, self.crest_compressed_db, self.crest_extreme_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_monotone_in_lufs() {
        let cal = Calibration::default();
        let mut quiet = ContentDescriptor::silence();
        quiet.integrated_loudness_lufs = -25.0;
        let mut loud = ContentDescriptor::silence();
        loud.integrated_loudness_lufs = -10.0;

        let p_quiet = cal.project(&quiet);
        let p_loud = cal.project(&loud);
        assert!(p_loud.input_level > p_quiet.input_level);
    }

    #[test]
    fn projection_is_monotone_in_crest() {
        let cal = Calibration::default();
        let mut compressed = ContentDescriptor::silence();
        compressed.crest_factor_db = 7.0;
        let mut dynamic = ContentDescriptor::silence();
        dynamic.crest_factor_db = 18.0;

        assert!(cal.project(&dynamic).dynamic_range > cal.project(&compressed).dynamic_range);
    }

    #[test]
    fn round_trip_unprojection_recovers_endpoints() {
        let cal = Calibration::default();
        assert!((cal.unproject_lufs(0.0) - cal.lufs_quiet).abs() < 1e-6);
        assert!((cal.unproject_lufs(1.0) - cal.lufs_loud).abs() < 1e-6);
    }

    #[test]
    fn calibration_from_too_few_references_falls_back_to_default() {
        let cal = Calibration::from_references(&[ContentDescriptor::silence()]);
        assert_eq!(cal.lufs_quiet, Calibration::default().lufs_quiet);
    }

    #[test]
    fn calibration_from_references_tracks_percentiles() {
        let mut refs = Vec::new();
        for lufs in [-28.0, -24.0, -20.0, -16.0, -12.0, -9.0] {
            let mut d = ContentDescriptor::silence();
            d.integrated_loudness_lufs = lufs;
            d.crest_factor_db = 10.0;
            refs.push(d);
        }
        let cal = Calibration::from_references(&refs);
        assert!(cal.lufs_quiet > -30.0 && cal.lufs_quiet < -12.0);
        assert!(cal.lufs_loud < -7.0 && cal.lufs_loud > cal.lufs_quiet);
    }
}
