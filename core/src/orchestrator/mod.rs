/// Chunked Orchestrator: turns the per-chunk Content Analyzer / Target
/// Generator / Adaptive Pipeline into a streamable, cached, concurrency-
/// bounded service.
mod cache;
mod codec;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use crate::analyzer::{AnalysisHistory, ContentAnalyzer};
use crate::config::OrchestratorConfig;
use crate::error::CoreError;
use crate::fingerprint::{MasteringFingerprint, SharedFingerprintExtractor, SharedFingerprintStore};
use crate::paramspace::Calibration;
use crate::pipeline::AdaptivePipeline;
use crate::presets;
use crate::targets::{ContinuousTargetGenerator, GeneratorOptions};
use crate::types::{AudioBuffer, CacheKey, ProcessingTargets};

use cache::TieredCache;

/// Host-supplied decoded-audio access. The orchestrator never touches a
/// file directly; it asks for arbitrary sample ranges and lets the host's
/// library layer own decoding, seeking, and format support.
#[async_trait::async_trait]
pub trait AudioSource: Send + Sync {
    async fn sample_rate(&self, track_id: &str) -> Result<u32, CoreError>;
    async fn num_channels(&self, track_id: &str) -> Result<usize, CoreError>;
    async fn total_samples(&self, track_id: &str) -> Result<u64, CoreError>;
    async fn load_range(&self, track_id: &str, start_sample: u64, end_sample: u64) -> Result<AudioBuffer, CoreError>;
}

pub type SharedAudioSource = Arc<dyn AudioSource>;

type PipelineKey = (String, String, u32);

pub struct ChunkedOrchestrator {
    config: OrchestratorConfig,
    audio_source: SharedAudioSource,
    fingerprint_store: SharedFingerprintStore,
    fingerprint_extractor: SharedFingerprintExtractor,
    calibration: Calibration,
    cache: TieredCache,
    histories: Arc<Mutex<HashMap<String, AnalysisHistory>>>,
    pipelines: Arc<Mutex<HashMap<PipelineKey, AdaptivePipeline>>>,
    session_semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ChunkedOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        audio_source: SharedAudioSource,
        fingerprint_store: SharedFingerprintStore,
        fingerprint_extractor: SharedFingerprintExtractor,
        calibration: Calibration,
    ) -> Self {
        let cache = TieredCache::new(config.l1_capacity, config.l2_capacity);
        Self {
            config,
            audio_source,
            fingerprint_store,
            fingerprint_extractor,
            calibration,
            cache,
            histories: Arc::new(Mutex::new(HashMap::new())),
            pipelines: Arc::new(Mutex::new(HashMap::new())),
            session_semaphores: Mutex::new(HashMap::new()),
        }
    }

    /// Resolution order: persisted store, then on-demand extraction within
    /// the configured deadline, then a null fingerprint (descriptor-only
    /// targeting). Only fails if extraction itself errors within the
    /// deadline window; a timeout falls back to the null fingerprint too.
    pub async fn ensure_fingerprint(&self, track_id: &str) -> Result<MasteringFingerprint, CoreError> {
        if let Some(blob) = self.fingerprint_store.get_fingerprint(track_id) {
            if let Some(fp) = MasteringFingerprint::from_blob(track_id, &blob) {
                return Ok(fp);
            }
        }

        let audio = self
            .audio_source
            .load_range(track_id, 0, self.audio_source.total_samples(track_id).await?)
            .await?;

        let extraction = tokio::time::timeout(self.config.fingerprint_deadline, self.fingerprint_extractor.extract_fingerprint(track_id, &audio)).await;

        match extraction {
            Ok(Ok(fp)) => {
                self.fingerprint_store.put_fingerprint(track_id, fp.to_blob());
                Ok(fp)
            }
            Ok(Err(e)) => {
                tracing::info!(track_id, error = %e, "fingerprint extraction failed, falling back to descriptor-only targeting");
                Err(CoreError::FingerprintUnavailable { track_id: track_id.to_string() })
            }
            Err(_timeout) => {
                tracing::info!(track_id, "fingerprint extraction timed out, falling back to descriptor-only targeting");
                Err(CoreError::FingerprintUnavailable { track_id: track_id.to_string() })
            }
        }
    }

    /// Cache lookup, then single-flight build under the key's async lock.
    pub async fn get_chunk(&self, track_id: &str, preset: &str, intensity: f32, chunk_index: u64) -> Result<Arc<Vec<u8>>, CoreError> {
        let key = CacheKey::new(track_id, preset, intensity, chunk_index, self.config.intensity_quantum);

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let lock = self.cache.build_lock(&key);
        let _guard = lock.lock().await;

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let bytes = self.build_chunk(track_id, preset, intensity, chunk_index).await?;
        self.cache.put(key, bytes.clone());
        Ok(bytes)
    }

    async fn total_chunks(&self, track_id: &str) -> Result<u64, CoreError> {
        let sr = self.audio_source.sample_rate(track_id).await?;
        let total_samples = self.audio_source.total_samples(track_id).await?;
        let hop = self.config.hop_samples(sr).max(1) as u64;
        Ok(if total_samples == 0 { 0 } else { (total_samples + hop - 1) / hop })
    }

    async fn build_chunk(&self, track_id: &str, preset: &str, intensity: f32, chunk_index: u64) -> Result<Arc<Vec<u8>>, CoreError> {
        let intensity_quantum = (intensity.clamp(0.0, 1.0) / self.config.intensity_quantum.max(1e-6)).round() as u32;
        let _span = tracing::debug_span!("build_chunk", track_id, preset, intensity_quantum, chunk_index).entered();

        let sr = self.audio_source.sample_rate(track_id).await?;
        let total_samples = self.audio_source.total_samples(track_id).await?;
        let chunk_samples = self.config.chunk_samples(sr) as u64;
        let hop_samples = self.config.hop_samples(sr) as u64;
        let context_samples = self.config.context_samples(sr) as u64;

        let start = chunk_index * hop_samples;
        if start >= total_samples {
            return Err(CoreError::InvalidInput(format!("chunk_index {chunk_index} beyond track length for {track_id}")));
        }
        let end = (start + chunk_samples).min(total_samples);

        let extract_start = start.saturating_sub(context_samples);
        let extract_end = (end + context_samples).min(total_samples);

        let raw = tokio::time::timeout(self.config.chunk_deadline, self.audio_source.load_range(track_id, extract_start, extract_end))
            .await
            .map_err(|_| CoreError::ProcessingTimeout { track_id: track_id.to_string(), chunk_index })??;

        let fingerprint = self.fingerprint_store.get_fingerprint(track_id).and_then(|blob| MasteringFingerprint::from_blob(track_id, &blob));
        let preset_offset = presets::resolve(preset)?;
        let cache_key = CacheKey::new(track_id, preset, intensity, chunk_index, self.config.intensity_quantum);
        let pipeline_key = cache_key.session_key();

        let histories = self.histories.clone();
        let pipelines = self.pipelines.clone();
        let calibration = self.calibration;
        let track_id_owned = track_id.to_string();
        let trim_front = (start - extract_start) as usize;
        let keep_len = (end - start) as usize;

        let build_started = std::time::Instant::now();
        let trimmed = tokio::task::spawn_blocking(move || -> Vec<Vec<f32>> {
            let analyzer = ContentAnalyzer::new();
            let descriptor = {
                let mut histories = histories.lock();
                let history = histories.entry(track_id_owned).or_insert_with(AnalysisHistory::new);
                analyzer.analyze(&raw, Some(history))
            };

            let generator = ContinuousTargetGenerator::new(calibration);
            let options = GeneratorOptions { preserve_character: 0.7, intent: preset_offset, fingerprint_weight: 0.3 };
            let targets = generator.generate(&descriptor, fingerprint.as_ref(), &options);
            let targets = scale_targets_by_intensity(targets, intensity);

            let processed = {
                let mut pipelines = pipelines.lock();
                let pipeline = pipelines.entry(pipeline_key).or_insert_with(|| AdaptivePipeline::new(raw.sample_rate));
                pipeline.process(&raw, &targets)
            };

            processed
                .channels
                .iter()
                .map(|c| {
                    let end_idx = (trim_front + keep_len).min(c.len());
                    c.get(trim_front..end_idx).unwrap_or(&[]).to_vec()
                })
                .collect()
        })
        .await
        .map_err(|_| CoreError::NumericalInstability { stage: "pipeline".to_string() })?;

        let elapsed = build_started.elapsed();
        let real_time = std::time::Duration::from_secs_f64(keep_len as f64 / sr.max(1) as f64);
        if elapsed > real_time.saturating_mul(self.config.chunk_warning_multiple) {
            tracing::warn!(track_id, chunk_index, ?elapsed, ?real_time, "chunk build far exceeded real-time budget");
        }

        Ok(Arc::new(codec::encode_pcm_f32(&trimmed)))
    }

    fn session_semaphore(&self, track_id: &str) -> Arc<Semaphore> {
        self.session_semaphores
            .lock()
            .entry(track_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_concurrent_chunks_per_session)))
            .clone()
    }

    /// Emits chunks strictly in index order, crossfading each chunk
    /// boundary's overlap region with an equal-power curve. After each
    /// chunk, speculatively triggers the next two chunks of this key so
    /// the stream rarely blocks on a cache miss.
    pub fn stream_track(self: &Arc<Self>, track_id: String, preset: String, intensity: f32) -> mpsc::Receiver<Result<Vec<u8>, CoreError>> {
        let (tx, rx) = mpsc::channel(4);
        let this = self.clone();

        tokio::spawn(async move {
            let total = match this.total_chunks(&track_id).await {
                Ok(t) => t,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let sr = match this.audio_source.sample_rate(&track_id).await {
                Ok(sr) => sr,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            let overlap_samples = this.config.overlap_samples(sr);
            let semaphore = this.session_semaphore(&track_id);

            let mut prev_tail: Option<Vec<Vec<f32>>> = None;

            for index in 0..total {
                let _permit = semaphore.acquire().await.expect("session semaphore is never closed");
                let bytes = match this.get_chunk(&track_id, &preset, intensity, index).await {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                let Some(channels) = codec::decode_pcm_f32(&bytes) else {
                    let _ = tx.send(Err(CoreError::CacheIoFailure("corrupt cached chunk".to_string()))).await;
                    return;
                };
                drop(_permit);

                let is_last = index + 1 == total;
                let chunk_len = channels.first().map(|c| c.len()).unwrap_or(0);

                if let Some(tail) = prev_tail.take() {
                    let head_len = tail.first().map(|c| c.len()).unwrap_or(0).min(chunk_len);
                    let joined: Vec<Vec<f32>> = channels
                        .iter()
                        .zip(tail.iter())
                        .map(|(ch, t)| mastering_dsp::crossfade_join(&t[..head_len.min(t.len())], &ch[..head_len]))
                        .collect();
                    if tx.send(Ok(codec::encode_pcm_f32(&joined))).await.is_err() {
                        return;
                    }

                    let remainder_end = if is_last { chunk_len } else { chunk_len.saturating_sub(overlap_samples) };
                    let remainder: Vec<Vec<f32>> = channels.iter().map(|c| c.get(head_len..remainder_end).unwrap_or(&[]).to_vec()).collect();
                    if tx.send(Ok(codec::encode_pcm_f32(&remainder))).await.is_err() {
                        return;
                    }
                } else {
                    let emit_end = if is_last { chunk_len } else { chunk_len.saturating_sub(overlap_samples) };
                    let head: Vec<Vec<f32>> = channels.iter().map(|c| c.get(..emit_end).unwrap_or(c).to_vec()).collect();
                    if tx.send(Ok(codec::encode_pcm_f32(&head))).await.is_err() {
                        return;
                    }
                }

                if !is_last {
                    prev_tail = Some(channels.iter().map(|c| c.get(c.len().saturating_sub(overlap_samples)..).unwrap_or(c).to_vec()).collect());
                }

                for lookahead in [index + 1, index + 2] {
                    if lookahead < total {
                        let this = this.clone();
                        let track_id = track_id.clone();
                        let preset = preset.clone();
                        tokio::spawn(async move {
                            let _ = this.get_chunk(&track_id, &preset, intensity, lookahead).await;
                        });
                    }
                }
            }
        });

        rx
    }

    pub fn clear_cache(&self, track_id: &str) {
        self.cache.clear_track(track_id);
        self.histories.lock().remove(track_id);
        self.pipelines.lock().retain(|k, _| k.0 != track_id);
    }
}

/// User-facing intensity in `[0, 1]` scales how strongly the generated
/// targets deviate from a neutral pass (0 = bypass dynamics/EQ/width
/// shaping, 1 = the generator's full recommendation). `target_lufs` is
/// left untouched — intensity shapes character, not loudness.
fn scale_targets_by_intensity(mut targets: ProcessingTargets, intensity: f32) -> ProcessingTargets {
    let i = intensity.clamp(0.0, 1.0);
    targets.compression_amount *= i;
    targets.expansion_amount *= i;
    for g in targets.eq_gains_db.iter_mut() {
        *g *= i;
    }
    targets.target_stereo_width = 1.0 + (targets.target_stereo_width - 1.0) * i;
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{FingerprintStore, InMemoryFingerprintStore, LocalFingerprintExtractor};
    use std::sync::Mutex as StdMutex;

    struct SineSource {
        sample_rate: u32,
        total_samples: u64,
    }

    #[async_trait::async_trait]
    impl AudioSource for SineSource {
        async fn sample_rate(&self, _track_id: &str) -> Result<u32, CoreError> {
            Ok(self.sample_rate)
        }
        async fn num_channels(&self, _track_id: &str) -> Result<usize, CoreError> {
            Ok(1)
        }
        async fn total_samples(&self, _track_id: &str) -> Result<u64, CoreError> {
            Ok(self.total_samples)
        }
        async fn load_range(&self, _track_id: &str, start: u64, end: u64) -> Result<AudioBuffer, CoreError> {
            let samples: Vec<f32> = (start..end)
                .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / self.sample_rate as f32).sin() * 0.3)
                .collect();
            Ok(AudioBuffer::mono(samples, self.sample_rate))
        }
    }

    fn test_orchestrator(total_seconds: u64) -> Arc<ChunkedOrchestrator> {
        let sr = 44100u32;
        let audio_source: SharedAudioSource = Arc::new(SineSource { sample_rate: sr, total_samples: sr as u64 * total_seconds });
        let fingerprint_store: SharedFingerprintStore = Arc::new(InMemoryFingerprintStore::new());
        let extractor: SharedFingerprintExtractor = Arc::new(LocalFingerprintExtractor);
        Arc::new(ChunkedOrchestrator::new(OrchestratorConfig::default(), audio_source, fingerprint_store, extractor, Calibration::default()))
    }

    #[tokio::test]
    async fn get_chunk_caches_and_is_idempotent() {
        let orch = test_orchestrator(20);
        let a = orch.get_chunk("t1", "adaptive", 0.5, 0).await.unwrap();
        let b = orch.get_chunk("t1", "adaptive", 0.5, 0).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected() {
        let orch = test_orchestrator(20);
        let err = orch.get_chunk("t1", "nonexistent", 0.5, 0).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownPreset(_)));
    }

    #[tokio::test]
    async fn out_of_range_chunk_index_errs() {
        let orch = test_orchestrator(5);
        let err = orch.get_chunk("t1", "adaptive", 0.5, 100).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn stream_track_emits_in_order_and_completes() {
        let orch = test_orchestrator(30);
        let mut rx = orch.clone().stream_track("t1".to_string(), "adaptive".to_string(), 0.5);
        let collected = Arc::new(StdMutex::new(Vec::new()));
        while let Some(chunk) = rx.recv().await {
            collected.lock().unwrap().push(chunk.is_ok());
        }
        let results = collected.lock().unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|&ok| ok));
    }

    #[tokio::test]
    async fn clear_cache_forces_rebuild() {
        let orch = test_orchestrator(20);
        let a = orch.get_chunk("t1", "adaptive", 0.5, 0).await.unwrap();
        orch.clear_cache("t1");
        let b = orch.get_chunk("t1", "adaptive", 0.5, 0).await.unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn intensity_zero_yields_unity_stereo_width_and_no_dynamics() {
        let targets = ProcessingTargets {
            target_lufs: -14.0,
            target_peak_dbfs: -0.1,
            eq_gains_db: vec![3.0, -2.0],
            compression_amount: 0.6,
            expansion_amount: 0.0,
            compression_ratio: 3.0,
            threshold_dbfs: -18.0,
            attack_ms: 3.0,
            release_ms: 100.0,
            makeup_gain_db: 2.0,
            target_stereo_width: 1.4,
            preserve_character: 0.7,
        };
        let scaled = scale_targets_by_intensity(targets, 0.0);
        assert_eq!(scaled.compression_amount, 0.0);
        assert!(scaled.eq_gains_db.iter().all(|&g| g == 0.0));
        assert!((scaled.target_stereo_width - 1.0).abs() < 1e-6);
    }
}
