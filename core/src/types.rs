/// Shared record types passed between the Content Analyzer, Target
/// Generator, Adaptive Pipeline, and Chunked Orchestrator.
use serde::{Deserialize, Serialize};

use mastering_dsp::bands::BARK_BAND_COUNT;

/// Planar float32 audio. Samples are expected in `[-1.0, 1.0]` at stage
/// inputs; a stage may transiently exceed that but the limiter guarantees
/// `|sample| <= target_peak` on the way out.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { channels: vec![samples], sample_rate }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn len(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mid-channel (mono downmix) used for spectral analysis on stereo input.
    pub fn mid(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            _ => self.channels[0]
                .iter()
                .zip(self.channels[1].iter())
                .map(|(&l, &r)| (l + r) * 0.5)
                .collect(),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.channels.iter().all(|c| c.iter().all(|&s| s == 0.0))
    }
}

/// Per-chunk extracted features. All fields finite, non-NaN by construction;
/// digital silence yields the canonical silence descriptor (rms = peak =
/// crest = 0, band energies uniform, centroid at 0 Hz).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub rms_energy: f32,
    pub peak_energy: f32,
    pub integrated_loudness_lufs: f32,
    pub crest_factor_db: f32,
    pub spectral_centroid_hz: f32,
    pub spectral_rolloff_hz: f32,
    pub spectral_flux: f32,
    pub band_energy: Vec<f32>,
    pub stereo_width: f32,
    pub zero_crossing_rate: f32,
    pub attack_time_ms: f32,
}

impl ContentDescriptor {
    pub fn silence() -> Self {
        Self {
            rms_energy: 0.0,
            peak_energy: 0.0,
            integrated_loudness_lufs: -70.0,
            crest_factor_db: 0.0,
            spectral_centroid_hz: 0.0,
            spectral_rolloff_hz: 0.0,
            spectral_flux: 0.0,
            band_energy: vec![1.0 / BARK_BAND_COUNT as f32; BARK_BAND_COUNT],
            stereo_width: 1.0,
            zero_crossing_rate: 0.0,
            attack_time_ms: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.rms_energy.is_finite()
            && self.peak_energy.is_finite()
            && self.integrated_loudness_lufs.is_finite()
            && self.crest_factor_db.is_finite()
            && self.spectral_centroid_hz.is_finite()
            && self.spectral_rolloff_hz.is_finite()
            && self.spectral_flux.is_finite()
            && self.band_energy.iter().all(|b| b.is_finite())
            && self.stereo_width.is_finite()
            && self.zero_crossing_rate.is_finite()
            && self.attack_time_ms.is_finite()
    }
}

/// The 5-D position derived from a `ContentDescriptor`. Space bounds are
/// calibrated at generator construction, not hard-coded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpacePoint {
    pub input_level: f32,
    pub dynamic_range: f32,
    pub bass_mid_ratio: f32,
    pub bass_pct: f32,
    pub mid_pct: f32,
}

impl ParameterSpacePoint {
    pub fn zero() -> Self {
        Self {
            input_level: 0.0,
            dynamic_range: 0.0,
            bass_mid_ratio: 0.0,
            bass_pct: 0.0,
            mid_pct: 0.0,
        }
    }

    /// Component-wise blend: `self * (1-w) + other * w`.
    pub fn lerp(&self, other: &Self, w: f32) -> Self {
        let w = w.clamp(0.0, 1.0);
        let l = |a: f32, b: f32| a * (1.0 - w) + b * w;
        Self {
            input_level: l(self.input_level, other.input_level),
            dynamic_range: l(self.dynamic_range, other.dynamic_range),
            bass_mid_ratio: l(self.bass_mid_ratio, other.bass_mid_ratio),
            bass_pct: l(self.bass_pct, other.bass_pct),
            mid_pct: l(self.mid_pct, other.mid_pct),
        }
    }

    pub fn add_offset(&self, offset: &ParameterSpaceOffset) -> Self {
        Self {
            input_level: (self.input_level + offset.input_level).clamp(0.0, 1.0),
            dynamic_range: (self.dynamic_range + offset.dynamic_range).clamp(0.0, 1.0),
            bass_mid_ratio: (self.bass_mid_ratio + offset.bass_mid_ratio).clamp(-1.0, 1.0),
            bass_pct: (self.bass_pct + offset.bass_pct).clamp(0.0, 1.0),
            mid_pct: (self.mid_pct + offset.mid_pct).clamp(0.0, 1.0),
        }
    }
}

/// An intent-vector offset in parameter space (one per preset name).
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterSpaceOffset {
    pub input_level: f32,
    pub dynamic_range: f32,
    pub bass_mid_ratio: f32,
    pub bass_pct: f32,
    pub mid_pct: f32,
}

/// Per-chunk output of the Target Generator, consumed by the Adaptive
/// Pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingTargets {
    pub target_lufs: f32,
    pub target_peak_dbfs: f32,
    pub eq_gains_db: Vec<f32>,
    pub compression_amount: f32,
    pub expansion_amount: f32,
    pub compression_ratio: f32,
    pub threshold_dbfs: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_gain_db: f32,
    pub target_stereo_width: f32,
    pub preserve_character: f32,
}

/// A segment of audio with its position in the track. `audio` carries
/// `context_samples` of padding on each side for analysis accuracy, and
/// `overlap_samples` reserved for crossfading with its neighbor.
#[derive(Debug, Clone)]
pub struct ProcessingChunk {
    pub start_sample: u64,
    pub end_sample: u64,
    pub sample_rate: u32,
    pub channels: usize,
    pub audio: AudioBuffer,
    pub context_samples: usize,
    pub overlap_samples: usize,
    pub index: u64,
    pub total_chunks: u64,
}

/// Cache key for a processed chunk. Intensity is quantized so the cache
/// stays finite in size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub track_id: String,
    pub preset_name: String,
    pub intensity_quantum: u32,
    pub chunk_index: u64,
}

impl CacheKey {
    pub fn new(track_id: impl Into<String>, preset_name: impl Into<String>, intensity: f32, chunk_index: u64, quantum: f32) -> Self {
        let q = quantum.max(1e-6);
        let intensity_quantum = (intensity.clamp(0.0, 1.0) / q).round() as u32;
        Self {
            track_id: track_id.into(),
            preset_name: preset_name.into(),
            intensity_quantum,
            chunk_index,
        }
    }

    pub fn session_key(&self) -> (String, String, u32) {
        (self.track_id.clone(), self.preset_name.clone(), self.intensity_quantum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_descriptor_is_finite_and_canonical() {
        let d = ContentDescriptor::silence();
        assert!(d.is_finite());
        assert_eq!(d.rms_energy, 0.0);
        assert_eq!(d.peak_energy, 0.0);
        let sum: f32 = d.band_energy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cache_key_quantizes_intensity() {
        let a = CacheKey::new("t1", "adaptive", 0.44, 3, 0.1);
        let b = CacheKey::new("t1", "adaptive", 0.46, 3, 0.1);
        assert_eq!(a, b);
        let c = CacheKey::new("t1", "adaptive", 0.55, 3, 0.1);
        assert_ne!(a, c);
    }

    #[test]
    fn lerp_at_zero_and_one_returns_endpoints() {
        let a = ParameterSpacePoint { input_level: 0.2, dynamic_range: 0.3, bass_mid_ratio: -0.1, bass_pct: 0.4, mid_pct: 0.5 };
        let b = ParameterSpacePoint { input_level: 0.8, dynamic_range: 0.9, bass_mid_ratio: 0.5, bass_pct: 0.1, mid_pct: 0.2 };
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }

    #[test]
    fn mid_channel_averages_stereo() {
        let buf = AudioBuffer::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 44100);
        assert_eq!(buf.mid(), vec![0.5, 0.5]);
    }
}
