/// Per-track fingerprint: persistence, extraction, and the aggregated
/// record itself.
///
/// `MasteringFingerprint` wraps `mastering_dsp`'s 25-dimensional
/// `AudioFingerprint` with a schema version and track identity so it can
/// be persisted as a `FingerprintBlob` (first byte = schema version, per
/// the fingerprint-persistence interface) and tolerate version skew by
/// falling back to descriptor-only targeting.
use std::collections::HashMap;
use std::sync::Arc;

use mastering_dsp::fingerprint_compute::{self, AudioFingerprint};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::AudioBuffer;

pub const FINGERPRINT_SCHEMA_VERSION: u8 = 1;

/// Serializable mirror of `mastering_dsp::AudioFingerprint` (which is not
/// itself `Serialize`, since it lives in a no-I/O DSP crate).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FingerprintDimensions {
    pub sub_bass: f32,
    pub bass: f32,
    pub low_mid: f32,
    pub mid: f32,
    pub upper_mid: f32,
    pub presence: f32,
    pub air: f32,
    pub lufs: f32,
    pub crest_db: f32,
    pub bass_mid_ratio: f32,
    pub tempo_bpm: f32,
    pub rhythm_stability: f32,
    pub transient_density: f32,
    pub silence_ratio: f32,
    pub spectral_centroid: f32,
    pub spectral_rolloff: f32,
    pub spectral_flatness: f32,
    pub harmonic_ratio: f32,
    pub pitch_stability: f32,
    pub chroma_energy: f32,
    pub dynamic_range_variation: f32,
    pub loudness_variation: f32,
    pub peak_consistency: f32,
    pub stereo_width: f32,
    pub phase_correlation: f32,
}

impl From<AudioFingerprint> for FingerprintDimensions {
    fn from(f: AudioFingerprint) -> Self {
        Self {
            sub_bass: f.sub_bass,
            bass: f.bass,
            low_mid: f.low_mid,
            mid: f.mid,
            upper_mid: f.upper_mid,
            presence: f.presence,
            air: f.air,
            lufs: f.lufs,
            crest_db: f.crest_db,
            bass_mid_ratio: f.bass_mid_ratio,
            tempo_bpm: f.tempo_bpm,
            rhythm_stability: f.rhythm_stability,
            transient_density: f.transient_density,
            silence_ratio: f.silence_ratio,
            spectral_centroid: f.spectral_centroid,
            spectral_rolloff: f.spectral_rolloff,
            spectral_flatness: f.spectral_flatness,
            harmonic_ratio: f.harmonic_ratio,
            pitch_stability: f.pitch_stability,
            chroma_energy: f.chroma_energy,
            dynamic_range_variation: f.dynamic_range_variation,
            loudness_variation: f.loudness_variation,
            peak_consistency: f.peak_consistency,
            stereo_width: f.stereo_width,
            phase_correlation: f.phase_correlation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteringFingerprint {
    pub version: u8,
    pub track_id: String,
    pub dimensions: FingerprintDimensions,
}

/// Opaque versioned blob for persistence. First byte is the schema
/// version; the remainder is an implementation detail.
#[derive(Debug, Clone)]
pub struct FingerprintBlob(pub Vec<u8>);

impl MasteringFingerprint {
    pub fn to_blob(&self) -> FingerprintBlob {
        let mut bytes = vec![self.version];
        bytes.extend(serde_json::to_vec(&self.dimensions).expect("fingerprint dimensions always serialize"));
        FingerprintBlob(bytes)
    }

    /// Parses a blob. Unknown schema versions return `None` rather than
    /// erroring, per the interface's tolerance for version skew.
    pub fn from_blob(track_id: &str, blob: &FingerprintBlob) -> Option<Self> {
        let (&version, rest) = blob.0.split_first()?;
        if version != FINGERPRINT_SCHEMA_VERSION {
            return None;
        }
        let dimensions: FingerprintDimensions = serde_json::from_slice(rest).ok()?;
        Some(Self { version, track_id: track_id.to_string(), dimensions })
    }
}

/// Abstract fingerprint persistence the orchestrator requires from the
/// host's library layer: non-blocking reads, idempotent last-writer-wins
/// writes.
pub trait FingerprintStore: Send + Sync {
    fn get_fingerprint(&self, track_id: &str) -> Option<FingerprintBlob>;
    fn put_fingerprint(&self, track_id: &str, blob: FingerprintBlob);
}

/// Read-mostly, single-writer-per-key in-memory store. Suitable as the
/// default L1-adjacent store and for tests; a host may substitute a
/// disk-backed implementation satisfying the same trait.
#[derive(Default)]
pub struct InMemoryFingerprintStore {
    inner: RwLock<HashMap<String, FingerprintBlob>>,
}

impl InMemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for InMemoryFingerprintStore {
    fn get_fingerprint(&self, track_id: &str) -> Option<FingerprintBlob> {
        self.inner.read().get(track_id).cloned().map(|b| FingerprintBlob(b.0.clone()))
    }

    fn put_fingerprint(&self, track_id: &str, blob: FingerprintBlob) {
        self.inner.write().insert(track_id.to_string(), blob);
    }
}

impl Clone for FingerprintBlob {
    fn clone(&self) -> Self {
        FingerprintBlob(self.0.clone())
    }
}

/// On-demand fingerprint extraction, used as the fallback when no
/// persisted or sidecar fingerprint is available. A real deployment's
/// remote extractor satisfies the same trait; this one computes locally
/// from the decoded buffer so the core never needs a network hop to make
/// forward progress.
#[async_trait::async_trait]
pub trait FingerprintExtractor: Send + Sync {
    async fn extract_fingerprint(&self, track_id: &str, audio: &AudioBuffer) -> Result<MasteringFingerprint, CoreError>;
}

pub struct LocalFingerprintExtractor;

#[async_trait::async_trait]
impl FingerprintExtractor for LocalFingerprintExtractor {
    async fn extract_fingerprint(&self, track_id: &str, audio: &AudioBuffer) -> Result<MasteringFingerprint, CoreError> {
        if audio.is_empty() {
            return Err(CoreError::InvalidInput("empty buffer for fingerprint extraction".into()));
        }
        let channels = audio.num_channels().max(1) as u32;
        let interleaved: Vec<f32> = match channels {
            1 => audio.channels[0].clone(),
            _ => audio.channels[0]
                .iter()
                .zip(audio.channels[1].iter())
                .flat_map(|(&l, &r)| [l, r])
                .collect(),
        };

        let fp = fingerprint_compute::compute_complete_fingerprint(&interleaved, audio.sample_rate, channels.min(2))
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?;

        Ok(MasteringFingerprint {
            version: FINGERPRINT_SCHEMA_VERSION,
            track_id: track_id.to_string(),
            dimensions: fp.into(),
        })
    }
}

/// Shared handle type used by the orchestrator.
pub type SharedFingerprintStore = Arc<dyn FingerprintStore>;
pub type SharedFingerprintExtractor = Arc<dyn FingerprintExtractor>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dimensions() -> FingerprintDimensions {
        FingerprintDimensions {
            sub_bass: 0.1,
            bass: 0.15,
            low_mid: 0.15,
            mid: 0.25,
            upper_mid: 0.2,
            presence: 0.1,
            air: 0.05,
            lufs: -18.0,
            crest_db: 10.0,
            bass_mid_ratio: 0.4,
            tempo_bpm: 120.0,
            rhythm_stability: 0.8,
            transient_density: 0.3,
            silence_ratio: 0.0,
            spectral_centroid: 2000.0,
            spectral_rolloff: 8000.0,
            spectral_flatness: 0.3,
            harmonic_ratio: 0.7,
            pitch_stability: 0.6,
            chroma_energy: 0.5,
            dynamic_range_variation: 0.2,
            loudness_variation: 1.0,
            peak_consistency: 0.8,
            stereo_width: 0.4,
            phase_correlation: 0.9,
        }
    }

    #[test]
    fn blob_round_trips() {
        let fp = MasteringFingerprint {
            version: FINGERPRINT_SCHEMA_VERSION,
            track_id: "track-1".to_string(),
            dimensions: sample_dimensions(),
        };
        let blob = fp.to_blob();
        let restored = MasteringFingerprint::from_blob("track-1", &blob).unwrap();
        assert_eq!(restored.dimensions.lufs, fp.dimensions.lufs);
        assert_eq!(restored.track_id, "track-1");
    }

    #[test]
    fn unknown_schema_version_is_tolerated_as_none() {
        let mut bytes = vec![99u8];
        bytes.extend(serde_json::to_vec(&sample_dimensions()).unwrap());
        let blob = FingerprintBlob(bytes);
        assert!(MasteringFingerprint::from_blob("t", &blob).is_none());
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryFingerprintStore::new();
        assert!(store.get_fingerprint("missing").is_none());

        let fp = MasteringFingerprint {
            version: FINGERPRINT_SCHEMA_VERSION,
            track_id: "t1".to_string(),
            dimensions: sample_dimensions(),
        };
        store.put_fingerprint("t1", fp.to_blob());
        let fetched = store.get_fingerprint("t1").unwrap();
        let restored = MasteringFingerprint::from_blob("t1", &fetched).unwrap();
        assert_eq!(restored.dimensions.tempo_bpm, 120.0);
    }

    #[tokio::test]
    async fn local_extractor_computes_a_fingerprint() {
        let sr = 44100u32;
        let samples: Vec<f32> = (0..sr).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        let buf = AudioBuffer::mono(samples, sr);
        let extractor = LocalFingerprintExtractor;
        let fp = extractor.extract_fingerprint("t1", &buf).await.unwrap();
        assert_eq!(fp.track_id, "t1");
        assert!(fp.dimensions.lufs <= 0.0);
    }

    #[tokio::test]
    async fn local_extractor_rejects_empty_buffer() {
        let buf = AudioBuffer::mono(Vec::new(), 44100);
        let extractor = LocalFingerprintExtractor;
        let err = extractor.extract_fingerprint("t1", &buf).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }
}
