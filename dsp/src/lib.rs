/// mastering-dsp — pure numerical DSP kernels for the adaptive mastering engine
///
/// No I/O, no async: every function here is a deterministic transform over
/// in-memory buffers. Higher-level orchestration (fingerprint persistence,
/// caching, streaming) lives in the `core` crate.
#![forbid(unsafe_code)]

pub mod fft;
pub mod biquad;
pub mod bands;
pub mod meters;
pub mod envelope;
pub mod compressor;
pub mod expander;
pub mod limiter;
pub mod chunking;

// Fingerprint-dimension estimators (frequency/dynamics/temporal/spectral/
// harmonic/variation/stereo), kept close to their original shape.
pub mod frequency_analysis;
pub mod spectral_features;
pub mod variation_analysis;
pub mod stereo_analysis;
pub mod fingerprint_compute;

pub use fft::{rfft, irfft, hann_window};
pub use biquad::{BiquadCoeffs, BiquadState, BiquadCascade, MultiBandEQ};
pub use bands::{band_energies, BARK_BAND_COUNT, PERCEPTUAL_BAND_COUNT, PerceptualBands};
pub use meters::{rms, peak, crest_factor_db, integrated_lufs};
pub use envelope::{envelope_follow, EnvelopeFollower, EnvelopeConfig};
pub use compressor::{compress, Compressor, CompressorConfig, DetectionMode, CompressionInfo};
pub use expander::{expand, Expander, ExpanderConfig, ExpansionInfo};
pub use limiter::{limit, Limiter, LimiterConfig, LimitingInfo};
pub use chunking::{EqualPowerCrossfade, crossfade_join};

pub use frequency_analysis::compute_frequency_distribution;
pub use spectral_features::{compute_spectral_centroid, compute_spectral_rolloff, compute_spectral_flatness, audio_to_freq_domain};
pub use variation_analysis::{compute_dynamic_range_variation, compute_loudness_variation, compute_peak_consistency};
pub use stereo_analysis::{compute_stereo_width, compute_phase_correlation, is_stereo};
pub use fingerprint_compute::{AudioFingerprint, compute_complete_fingerprint};
