/// mastering-core — Content Analyzer, Continuous Target Generator, Adaptive
/// Pipeline, and Chunked Orchestrator for the adaptive audio mastering
/// engine. No file I/O, HTTP, or playback control lives here; those are
/// host responsibilities reached through the traits in `fingerprint` and
/// `orchestrator`.
pub mod analyzer;
pub mod config;
pub mod error;
pub mod factory;
pub mod fingerprint;
pub mod orchestrator;
pub mod paramspace;
pub mod pipeline;
pub mod presets;
pub mod targets;
pub mod types;

pub use analyzer::{AnalysisHistory, ContentAnalyzer};
pub use config::OrchestratorConfig;
pub use error::CoreError;
pub use factory::{ProcessorFactory, ProcessorKey};
pub use fingerprint::{
    FingerprintBlob, FingerprintDimensions, FingerprintExtractor, FingerprintStore, LocalFingerprintExtractor, MasteringFingerprint,
    SharedFingerprintExtractor, SharedFingerprintStore,
};
pub use orchestrator::{AudioSource, ChunkedOrchestrator, SharedAudioSource};
pub use paramspace::Calibration;
pub use pipeline::AdaptivePipeline;
pub use presets::PRESET_NAMES;
pub use targets::{ContinuousTargetGenerator, GeneratorOptions};
pub use types::{AudioBuffer, CacheKey, ContentDescriptor, ParameterSpaceOffset, ParameterSpacePoint, ProcessingChunk, ProcessingTargets};
