/// Explicit replacement for a module-level processor singleton: callers
/// hold a `ProcessorFactory` handle and ask it for the orchestrator that
/// matches a given configuration, instead of reaching into hidden global
/// state. The factory's map is the only place that state lives.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::OrchestratorConfig;
use crate::fingerprint::{SharedFingerprintExtractor, SharedFingerprintStore};
use crate::orchestrator::{ChunkedOrchestrator, SharedAudioSource};
use crate::paramspace::Calibration;

/// Distinguishes orchestrator instances that should not share a cache or
/// session state, e.g. two libraries open in the same process, or a test
/// harness running alongside the live one.
pub type ProcessorKey = String;

#[derive(Default)]
pub struct ProcessorFactory {
    processors: Mutex<HashMap<ProcessorKey, Arc<ChunkedOrchestrator>>>,
}

impl ProcessorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the orchestrator registered for `key`, constructing and
    /// storing one via `build` if this is the first request for it.
    /// `build` is only invoked on a miss.
    pub fn get_or_create<F>(&self, key: &str, build: F) -> Arc<ChunkedOrchestrator>
    where
        F: FnOnce() -> ChunkedOrchestrator,
    {
        let mut processors = self.processors.lock();
        processors.entry(key.to_string()).or_insert_with(|| Arc::new(build())).clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<ChunkedOrchestrator>> {
        self.processors.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<ChunkedOrchestrator>> {
        self.processors.lock().remove(key)
    }
}

/// Convenience constructor matching the orchestrator's own `new`, for
/// callers that don't need to customize the build closure.
pub fn build_orchestrator(
    config: OrchestratorConfig,
    audio_source: SharedAudioSource,
    fingerprint_store: SharedFingerprintStore,
    fingerprint_extractor: SharedFingerprintExtractor,
    calibration: Calibration,
) -> ChunkedOrchestrator {
    ChunkedOrchestrator::new(config, audio_source, fingerprint_store, fingerprint_extractor, calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::fingerprint::{InMemoryFingerprintStore, LocalFingerprintExtractor};
    use crate::orchestrator::AudioSource;
    use crate::types::AudioBuffer;

    struct EmptySource;

    #[async_trait::async_trait]
    impl AudioSource for EmptySource {
        async fn sample_rate(&self, _track_id: &str) -> Result<u32, CoreError> {
            Ok(44100)
        }
        async fn num_channels(&self, _track_id: &str) -> Result<usize, CoreError> {
            Ok(1)
        }
        async fn total_samples(&self, _track_id: &str) -> Result<u64, CoreError> {
            Ok(0)
        }
        async fn load_range(&self, _track_id: &str, _start: u64, _end: u64) -> Result<AudioBuffer, CoreError> {
            Ok(AudioBuffer::mono(Vec::new(), 44100))
        }
    }

    fn build() -> ChunkedOrchestrator {
        build_orchestrator(
            OrchestratorConfig::default(),
            Arc::new(EmptySource),
            Arc::new(InMemoryFingerprintStore::new()),
            Arc::new(LocalFingerprintExtractor),
            Calibration::default(),
        )
    }

    #[test]
    fn second_request_for_the_same_key_reuses_the_instance() {
        let factory = ProcessorFactory::new();
        let a = factory.get_or_create("lib-1", build);
        let b = factory.get_or_create("lib-1", build);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_keys_get_distinct_instances() {
        let factory = ProcessorFactory::new();
        let a = factory.get_or_create("lib-1", build);
        let b = factory.get_or_create("lib-2", build);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn remove_drops_the_factory_handle() {
        let factory = ProcessorFactory::new();
        let _ = factory.get_or_create("lib-1", build);
        assert!(factory.remove("lib-1").is_some());
        assert!(factory.get("lib-1").is_none());
    }
}
