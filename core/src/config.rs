/// Orchestrator configuration, with the defaults given in the component
/// design.
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub chunk_duration: Duration,
    pub overlap_duration: Duration,
    pub context_duration: Duration,
    pub chunk_interval: Duration,
    pub max_concurrent_chunks_per_session: usize,
    pub intensity_quantum: f32,
    /// L1 budget in chunks held per active key (current + next).
    pub l1_capacity: usize,
    /// L2 budget in chunks (predicted next 3-5).
    pub l2_capacity: usize,
    /// Fingerprint extraction deadline.
    pub fingerprint_deadline: Duration,
    /// Hard per-chunk processing deadline.
    pub chunk_deadline: Duration,
    /// Soft per-chunk processing warning threshold (10x real-time).
    pub chunk_warning_multiple: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(15),
            overlap_duration: Duration::from_secs(5),
            context_duration: Duration::from_secs(5),
            chunk_interval: Duration::from_secs(10),
            max_concurrent_chunks_per_session: 2,
            intensity_quantum: 0.1,
            l1_capacity: 2,
            l2_capacity: 5,
            fingerprint_deadline: Duration::from_secs(60),
            chunk_deadline: Duration::from_secs(60),
            chunk_warning_multiple: 10,
        }
    }
}

impl OrchestratorConfig {
    pub fn overlap_samples(&self, sample_rate: u32) -> usize {
        (self.overlap_duration.as_secs_f64() * sample_rate as f64).round() as usize
    }

    pub fn context_samples(&self, sample_rate: u32) -> usize {
        (self.context_duration.as_secs_f64() * sample_rate as f64).round() as usize
    }

    pub fn chunk_samples(&self, sample_rate: u32) -> usize {
        (self.chunk_duration.as_secs_f64() * sample_rate as f64).round() as usize
    }

    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        (self.chunk_interval.as_secs_f64() * sample_rate as f64).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.chunk_duration.as_secs(), 15);
        assert_eq!(cfg.overlap_duration.as_secs(), 5);
        assert_eq!(cfg.context_duration.as_secs(), 5);
        assert_eq!(cfg.chunk_interval.as_secs(), 10);
        assert_eq!(cfg.max_concurrent_chunks_per_session, 2);
        assert!((cfg.intensity_quantum - 0.1).abs() < 1e-6);
    }

    #[test]
    fn hop_is_chunk_minus_overlap_in_samples() {
        let cfg = OrchestratorConfig::default();
        let sr = 44100;
        assert_eq!(cfg.chunk_samples(sr) - cfg.hop_samples(sr), cfg.overlap_samples(sr));
    }
}
